//! Exhale CLI - database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! exhale-cli migrate
//!
//! # Create a staff account (password read from STAFF_PASSWORD or stdin)
//! exhale-cli staff create -e pharmacist@exhale.health -n "Alex"
//!
//! # Give an existing customer profile the staff role
//! exhale-cli staff promote -e pharmacist@exhale.health
//!
//! # Show the catalog and price a basket
//! exhale-cli catalog list --approved
//! exhale-cli catalog quote ntell-gum-mint-4:2 lana-mint-20:1
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "exhale-cli")]
#[command(author, version, about = "Exhale CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage staff accounts
    Staff {
        #[command(subcommand)]
        action: StaffAction,
    },
    /// Inspect the product catalog
    Catalog {
        #[command(subcommand)]
        action: CatalogAction,
    },
}

#[derive(Subcommand)]
enum StaffAction {
    /// Create a new staff account
    Create {
        /// Staff email address
        #[arg(short, long)]
        email: String,

        /// Staff first name
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Give an existing profile the staff role
    Promote {
        /// Profile email address
        #[arg(short, long)]
        email: String,
    },
    /// List staff accounts
    List,
}

#[derive(Subcommand)]
enum CatalogAction {
    /// List products
    List {
        /// Include products that require an approved assessment
        #[arg(long)]
        approved: bool,
    },
    /// Price a basket of `product_id:quantity` pairs
    Quote {
        /// Items as `product_id:quantity`
        #[arg(required = true)]
        items: Vec<String>,

        /// Price as an approved customer
        #[arg(long)]
        approved: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Staff { action } => match action {
            StaffAction::Create { email, name } => {
                commands::staff::create(&email, name.as_deref()).await?;
            }
            StaffAction::Promote { email } => commands::staff::promote(&email).await?,
            StaffAction::List => commands::staff::list().await?,
        },
        Commands::Catalog { action } => match action {
            CatalogAction::List { approved } => commands::catalog::list(approved),
            CatalogAction::Quote { items, approved } => {
                commands::catalog::quote(&items, approved)?;
            }
        },
    }
    Ok(())
}

//! Staff account commands.
//!
//! # Usage
//!
//! ```bash
//! STAFF_PASSWORD='...' exhale-cli staff create -e pharmacist@exhale.health -n "Alex"
//! exhale-cli staff promote -e pharmacist@exhale.health
//! exhale-cli staff list
//! ```
//!
//! # Environment Variables
//!
//! - `ADMIN_DATABASE_URL` or `DATABASE_URL` - `PostgreSQL` connection string
//! - `STAFF_PASSWORD` - Password for `staff create`; read from stdin if unset

use std::io::BufRead;

use exhale_admin::db::{RepositoryError, StaffRepository};
use exhale_admin::services::auth::{AuthError, MIN_PASSWORD_LENGTH, hash_password};
use exhale_core::{Email, EmailError};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use thiserror::Error;

use super::{DatabaseUrlError, database_url};

/// Errors that can occur during staff operations.
#[derive(Debug, Error)]
pub enum StaffError {
    #[error(transparent)]
    Config(#[from] DatabaseUrlError),

    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("Password must be at least {MIN_PASSWORD_LENGTH} characters")]
    WeakPassword,

    #[error("Could not read password: {0}")]
    Io(#[from] std::io::Error),

    #[error("A profile already exists with email: {0}")]
    UserExists(String),

    #[error("No profile with email: {0}")]
    NotFound(String),

    #[error("Repository error: {0}")]
    Repository(RepositoryError),

    #[error("Password hashing failed: {0}")]
    Hash(#[from] AuthError),
}

async fn connect() -> Result<PgPool, StaffError> {
    let url = database_url()?;
    tracing::info!("Connecting to database...");
    Ok(PgPool::connect(url.expose_secret()).await?)
}

fn read_password() -> Result<String, StaffError> {
    if let Ok(password) = std::env::var("STAFF_PASSWORD") {
        return Ok(password);
    }
    tracing::info!("Enter password for the new staff account:");
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Create a new staff account.
///
/// # Errors
///
/// Returns `StaffError` if the email is invalid, the password is too short,
/// or the email is already registered.
pub async fn create(email: &str, first_name: Option<&str>) -> Result<(), StaffError> {
    let email = Email::parse(email)?;
    let password = read_password()?;
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(StaffError::WeakPassword);
    }
    let hash = hash_password(&password)?;

    let pool = connect().await?;
    let member = StaffRepository::new(&pool)
        .create(&email, &hash, first_name)
        .await
        .map_err(|e| match e {
            RepositoryError::Conflict(_) => StaffError::UserExists(email.to_string()),
            other => StaffError::Repository(other),
        })?;

    tracing::info!(
        "Staff account created! ID: {}, Email: {}",
        member.id,
        member.email
    );
    Ok(())
}

/// Give an existing profile the staff role.
///
/// # Errors
///
/// Returns `StaffError::NotFound` if no profile has this email.
pub async fn promote(email: &str) -> Result<(), StaffError> {
    let email = Email::parse(email)?;

    let pool = connect().await?;
    let member = StaffRepository::new(&pool)
        .promote(&email)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => StaffError::NotFound(email.to_string()),
            other => StaffError::Repository(other),
        })?;

    tracing::info!("{} ({}) is now staff", member.display_name(), member.id);
    Ok(())
}

/// List staff accounts.
///
/// # Errors
///
/// Returns `StaffError` if the database is unreachable.
pub async fn list() -> Result<(), StaffError> {
    let pool = connect().await?;
    let staff = StaffRepository::new(&pool)
        .list()
        .await
        .map_err(StaffError::Repository)?;

    if staff.is_empty() {
        tracing::warn!("No staff accounts. Create one with `exhale-cli staff create`.");
    }
    for member in staff {
        tracing::info!(
            "{:>6}  {:<32}  {}",
            member.id,
            member.email,
            member.display_name()
        );
    }
    Ok(())
}

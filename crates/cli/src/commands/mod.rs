//! CLI subcommands.

pub mod catalog;
pub mod migrate;
pub mod staff;

use secrecy::SecretString;

/// Errors shared by commands that need the database.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseUrlError {
    #[error("Missing environment variable: ADMIN_DATABASE_URL or DATABASE_URL")]
    Missing,
}

/// Database URL from `ADMIN_DATABASE_URL`, falling back to `DATABASE_URL`.
///
/// # Errors
///
/// Returns `DatabaseUrlError::Missing` if neither is set.
pub fn database_url() -> Result<SecretString, DatabaseUrlError> {
    dotenvy::dotenv().ok();

    std::env::var("ADMIN_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| DatabaseUrlError::Missing)
}

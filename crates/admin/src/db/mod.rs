//! Database operations for the review console.
//!
//! The console shares the storefront's `PostgreSQL` database.
//!
//! ## Tables
//!
//! - `orders`, `order_items` - Status changes only; orders are never deleted
//! - `assessments` - Pharmacist decisions
//! - `consultations` - Scheduling of paid phone consultations
//! - `profiles` - Access status mirror, staff accounts
//! - `tower_sessions.session` - Console session storage
//!
//! # Migrations
//!
//! Migrations live in the workspace `migrations/` directory and run via:
//! ```bash
//! cargo run -p exhale-cli -- migrate
//! ```

pub mod assessments;
pub mod consultations;
pub mod orders;
pub mod staff;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use assessments::{AssessmentRepository, AssessmentWithCustomer};
pub use consultations::ConsultationRepository;
pub use orders::{OrderDetail, OrderRepository, OrderSummary};
pub use staff::StaffRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map a unique violation on insert to `Conflict`.
    pub(crate) fn from_insert(err: sqlx::Error, what: &str) -> Self {
        if let sqlx::Error::Database(db_err) = &err
            && db_err.is_unique_violation()
        {
            return Self::Conflict(format!("{what} already exists"));
        }
        Self::Database(err)
    }
}

/// A locked read-modify-write rejected by a domain rule or by the database.
///
/// Nothing is written when either happens.
#[derive(Debug, Error)]
pub enum GuardedError<E: std::error::Error + 'static> {
    #[error(transparent)]
    Rejected(E),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl<E: std::error::Error + 'static> From<sqlx::Error> for GuardedError<E> {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(err))
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(5)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

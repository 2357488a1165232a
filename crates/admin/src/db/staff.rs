//! Staff account repository.
//!
//! Staff are ordinary profiles with the `admin` role. Accounts are created
//! and promoted from the CLI; the console only reads them.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use exhale_core::{Email, Role, UserId};

use super::RepositoryError;
use crate::models::StaffMember;

const STAFF_COLUMNS: &str = "id, email, first_name, last_name, role, created_at";

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct StaffRow {
    id: i64,
    email: String,
    first_name: Option<String>,
    last_name: Option<String>,
    role: Role,
    created_at: DateTime<Utc>,
}

impl TryFrom<StaffRow> for StaffMember {
    type Error = RepositoryError;

    fn try_from(row: StaffRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: UserId::new(row.id),
            email,
            first_name: row.first_name,
            last_name: row.last_name,
            role: row.role,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CredentialsRow {
    #[sqlx(flatten)]
    staff: StaffRow,
    password_hash: String,
}

/// Repository for staff accounts.
pub struct StaffRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> StaffRepository<'a> {
    /// Create a new staff repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// A profile and its password hash, whatever its role.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_credentials(
        &self,
        email: &Email,
    ) -> Result<Option<(StaffMember, String)>, RepositoryError> {
        let row = sqlx::query_as::<_, CredentialsRow>(&format!(
            "SELECT {STAFF_COLUMNS}, password_hash FROM profiles WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(self.pool)
        .await?;

        row.map(|r| -> Result<_, RepositoryError> { Ok((r.staff.try_into()?, r.password_hash)) })
            .transpose()
    }

    /// Current role of a profile, `None` if it no longer exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn role(&self, id: UserId) -> Result<Option<Role>, RepositoryError> {
        let role = sqlx::query_scalar::<_, Role>("SELECT role FROM profiles WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(role)
    }

    /// Create a staff account.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(
        &self,
        email: &Email,
        password_hash: &str,
        first_name: Option<&str>,
    ) -> Result<StaffMember, RepositoryError> {
        let row = sqlx::query_as::<_, StaffRow>(&format!(
            "INSERT INTO profiles (email, password_hash, first_name, role) \
             VALUES ($1, $2, $3, $4) RETURNING {STAFF_COLUMNS}"
        ))
        .bind(email)
        .bind(password_hash)
        .bind(first_name)
        .bind(Role::Admin)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_insert(e, "email"))?;

        row.try_into()
    }

    /// Give an existing profile the staff role.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no profile has this email.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn promote(&self, email: &Email) -> Result<StaffMember, RepositoryError> {
        let row = sqlx::query_as::<_, StaffRow>(&format!(
            "UPDATE profiles SET role = $2, updated_at = NOW() WHERE email = $1 \
             RETURNING {STAFF_COLUMNS}"
        ))
        .bind(email)
        .bind(Role::Admin)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    /// All staff accounts.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<StaffMember>, RepositoryError> {
        let rows = sqlx::query_as::<_, StaffRow>(&format!(
            "SELECT {STAFF_COLUMNS} FROM profiles WHERE role = $1 ORDER BY created_at"
        ))
        .bind(Role::Admin)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

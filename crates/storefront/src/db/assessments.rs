//! Assessment repository (submission side).

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;

use exhale_core::assessment::{Assessment, Intake};
use exhale_core::{AccessStatus, AssessmentId, AssessmentStatus, UserId};

use super::RepositoryError;

#[derive(sqlx::FromRow)]
struct AssessmentRow {
    id: i64,
    user_id: i64,
    smoking_years: i32,
    cigarettes_per_day: i32,
    previous_quit_attempts: Option<String>,
    current_nicotine_use: Option<String>,
    health_conditions: Json<Vec<String>>,
    medications: Option<String>,
    pregnancy_status: bool,
    cardiovascular_conditions: bool,
    quit_motivation: Option<String>,
    flavour_preference: Option<String>,
    status: AssessmentStatus,
    pharmacist_notes: Option<String>,
    decline_reason: Option<String>,
    reviewed_by: Option<i64>,
    reviewed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

fn small(value: i32, column: &str) -> Result<u16, RepositoryError> {
    u16::try_from(value)
        .map_err(|_| RepositoryError::DataCorruption(format!("{column} out of range: {value}")))
}

impl TryFrom<AssessmentRow> for Assessment {
    type Error = RepositoryError;

    fn try_from(row: AssessmentRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: AssessmentId::new(row.id),
            user_id: UserId::new(row.user_id),
            intake: Intake {
                smoking_years: small(row.smoking_years, "smoking_years")?,
                cigarettes_per_day: small(row.cigarettes_per_day, "cigarettes_per_day")?,
                previous_quit_attempts: row.previous_quit_attempts,
                current_nicotine_use: row.current_nicotine_use,
                health_conditions: row.health_conditions.0,
                medications: row.medications,
                pregnancy_status: row.pregnancy_status,
                cardiovascular_conditions: row.cardiovascular_conditions,
                quit_motivation: row.quit_motivation,
                flavour_preference: row.flavour_preference,
            },
            status: row.status,
            pharmacist_notes: row.pharmacist_notes,
            decline_reason: row.decline_reason,
            reviewed_by: row.reviewed_by.map(UserId::new),
            reviewed_at: row.reviewed_at,
            created_at: row.created_at,
        })
    }
}

/// Repository for assessment submissions.
pub struct AssessmentRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AssessmentRepository<'a> {
    /// Create a new assessment repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a `submitted` assessment and mark the profile `pending`.
    ///
    /// Both writes happen in one transaction. Every call creates a new
    /// record; earlier submissions are kept.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the profile already has a pending
    /// submission or an approval, `RepositoryError::NotFound` for an unknown
    /// profile, and `RepositoryError::Database` if a query fails.
    pub async fn submit(&self, user_id: UserId, intake: &Intake) -> Result<Assessment, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_scalar::<_, AccessStatus>(
            "SELECT assessment_status FROM profiles WHERE id = $1 FOR UPDATE",
        )
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;
        if !current.accepts_submission() {
            return Err(RepositoryError::Conflict(format!(
                "an assessment is already {current}"
            )));
        }

        let row = sqlx::query_as::<_, AssessmentRow>(
            "INSERT INTO assessments (user_id, smoking_years, cigarettes_per_day, \
                 previous_quit_attempts, current_nicotine_use, health_conditions, medications, \
                 pregnancy_status, cardiovascular_conditions, quit_motivation, flavour_preference) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING *",
        )
        .bind(user_id)
        .bind(i32::from(intake.smoking_years))
        .bind(i32::from(intake.cigarettes_per_day))
        .bind(intake.previous_quit_attempts.as_deref())
        .bind(intake.current_nicotine_use.as_deref())
        .bind(Json(&intake.health_conditions))
        .bind(intake.medications.as_deref())
        .bind(intake.pregnancy_status)
        .bind(intake.cardiovascular_conditions)
        .bind(intake.quit_motivation.as_deref())
        .bind(intake.flavour_preference.as_deref())
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE profiles SET assessment_status = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(user_id)
        .bind(AccessStatus::Pending)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        row.try_into()
    }
}

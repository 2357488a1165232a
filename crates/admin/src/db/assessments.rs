//! Assessment repository (review side).

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use sqlx::types::Json;

use exhale_core::assessment::{Assessment, Intake, ReviewError, ReviewRequest};
use exhale_core::events::AssessmentReviewed;
use exhale_core::{AccessStatus, AssessmentId, AssessmentStatus, Email, UserId};

use super::{GuardedError, RepositoryError};
use crate::models::Customer;

const ASSESSMENT_COLUMNS: &str = "a.id, a.user_id, a.smoking_years, a.cigarettes_per_day, \
     a.previous_quit_attempts, a.current_nicotine_use, a.health_conditions, a.medications, \
     a.pregnancy_status, a.cardiovascular_conditions, a.quit_motivation, a.flavour_preference, \
     a.status, a.pharmacist_notes, a.decline_reason, a.reviewed_by, a.reviewed_at, a.created_at, \
     p.email AS customer_email, p.first_name AS customer_first_name, \
     p.last_name AS customer_last_name";

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
    customer_email: String,
    customer_first_name: Option<String>,
    customer_last_name: Option<String>,
}

fn small(value: i32, column: &str) -> Result<u16, RepositoryError> {
    u16::try_from(value)
        .map_err(|_| RepositoryError::DataCorruption(format!("{column} out of range: {value}")))
}

/// An assessment with the customer who submitted it.
#[derive(Debug, Clone, Serialize)]
pub struct AssessmentWithCustomer {
    #[serde(flatten)]
    pub assessment: Assessment,
    pub customer: Customer,
}

impl TryFrom<AssessmentRow> for AssessmentWithCustomer {
    type Error = RepositoryError;

    fn try_from(row: AssessmentRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.customer_email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;
        let user_id = UserId::new(row.user_id);

        Ok(Self {
            assessment: Assessment {
                id: AssessmentId::new(row.id),
                user_id,
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
            },
            customer: Customer {
                id: user_id,
                email,
                first_name: row.customer_first_name,
                last_name: row.customer_last_name,
            },
        })
    }
}

/// Repository for assessment review operations.
pub struct AssessmentRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AssessmentRepository<'a> {
    /// Create a new assessment repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Assessments oldest first, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        status: Option<AssessmentStatus>,
    ) -> Result<Vec<AssessmentWithCustomer>, RepositoryError> {
        let rows = sqlx::query_as::<_, AssessmentRow>(&format!(
            "SELECT {ASSESSMENT_COLUMNS} \
             FROM assessments a JOIN profiles p ON p.id = a.user_id \
             WHERE ($1::assessment_status IS NULL OR a.status = $1) \
             ORDER BY a.created_at, a.id"
        ))
        .bind(status)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// One assessment with its customer.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        &self,
        id: AssessmentId,
    ) -> Result<Option<AssessmentWithCustomer>, RepositoryError> {
        let row = sqlx::query_as::<_, AssessmentRow>(&format!(
            "SELECT {ASSESSMENT_COLUMNS} \
             FROM assessments a JOIN profiles p ON p.id = a.user_id WHERE a.id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Record a pharmacist decision and mirror it onto the customer's profile.
    ///
    /// The assessment row is locked while the decision is checked. The
    /// assessment and profile are updated in the same transaction, so the
    /// profile's access status always matches the latest review.
    ///
    /// # Errors
    ///
    /// Returns `GuardedError::Rejected` if the assessment was already
    /// reviewed or a decline has no reason (nothing is written),
    /// `RepositoryError::NotFound` for an unknown assessment and
    /// `RepositoryError::Database` if a query fails.
    pub async fn review(
        &self,
        id: AssessmentId,
        reviewer: UserId,
        request: &ReviewRequest,
        now: DateTime<Utc>,
    ) -> Result<(AssessmentWithCustomer, AssessmentReviewed), GuardedError<ReviewError>> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, AssessmentRow>(&format!(
            "SELECT {ASSESSMENT_COLUMNS} \
             FROM assessments a JOIN profiles p ON p.id = a.user_id \
             WHERE a.id = $1 FOR UPDATE OF a"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;
        let mut record: AssessmentWithCustomer = row.try_into()?;

        let event = record
            .assessment
            .review(reviewer, request, now)
            .map_err(GuardedError::Rejected)?;
        let assessment = &record.assessment;

        sqlx::query(
            "UPDATE assessments SET status = $2, pharmacist_notes = $3, decline_reason = $4, \
                 reviewed_by = $5, reviewed_at = $6 \
             WHERE id = $1",
        )
        .bind(assessment.id)
        .bind(assessment.status)
        .bind(assessment.pharmacist_notes.as_deref())
        .bind(assessment.decline_reason.as_deref())
        .bind(assessment.reviewed_by)
        .bind(assessment.reviewed_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE profiles SET assessment_status = $2, updated_at = $3 WHERE id = $1",
        )
        .bind(assessment.user_id)
        .bind(AccessStatus::from(event.decision))
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok((record, event))
    }

    /// Number of assessments waiting for review.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_pending(&self) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM assessments WHERE status = $1",
        )
        .bind(AssessmentStatus::Submitted)
        .fetch_one(self.pool)
        .await?;
        Ok(count)
    }
}

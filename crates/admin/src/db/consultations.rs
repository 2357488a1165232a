//! Consultation repository (scheduling side).

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;

use exhale_core::consultation::{Booking, Consultation, ScheduleError, ScheduleUpdate};
use exhale_core::{ConsultationId, ConsultationStatus, Email, PaymentStatus, UserId};

use super::{GuardedError, RepositoryError};

const CONSULTATION_COLUMNS: &str = "id, user_id, first_name, last_name, email, phone, \
     date_of_birth, smoking_status, years_using, daily_usage, preferred_call_time, \
     previous_quit_attempts, current_nrt, medical_conditions, status, payment_status, \
     stripe_session_id, stripe_payment_intent_id, scheduled_at, created_at";

#[derive(sqlx::FromRow)]
struct ConsultationRow {
    id: i64,
    user_id: Option<i64>,
    first_name: String,
    last_name: String,
    email: Email,
    phone: String,
    date_of_birth: Option<NaiveDate>,
    smoking_status: String,
    years_using: String,
    daily_usage: String,
    preferred_call_time: Option<String>,
    previous_quit_attempts: Option<String>,
    current_nrt: Option<String>,
    medical_conditions: Option<String>,
    status: ConsultationStatus,
    payment_status: PaymentStatus,
    stripe_session_id: Option<String>,
    stripe_payment_intent_id: Option<String>,
    scheduled_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<ConsultationRow> for Consultation {
    fn from(row: ConsultationRow) -> Self {
        Self {
            id: ConsultationId::new(row.id),
            user_id: row.user_id.map(UserId::new),
            booking: Booking {
                first_name: row.first_name,
                last_name: row.last_name,
                email: row.email,
                phone: row.phone,
                date_of_birth: row.date_of_birth,
                smoking_status: row.smoking_status,
                years_using: row.years_using,
                daily_usage: row.daily_usage,
                preferred_call_time: row.preferred_call_time,
                previous_quit_attempts: row.previous_quit_attempts,
                current_nrt: row.current_nrt,
                medical_conditions: row.medical_conditions,
            },
            status: row.status,
            payment_status: row.payment_status,
            stripe_session_id: row.stripe_session_id,
            stripe_payment_intent_id: row.stripe_payment_intent_id,
            scheduled_at: row.scheduled_at,
            created_at: row.created_at,
        }
    }
}

/// Repository for consultation scheduling.
pub struct ConsultationRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ConsultationRepository<'a> {
    /// Create a new consultation repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Bookings newest first, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        status: Option<ConsultationStatus>,
    ) -> Result<Vec<Consultation>, RepositoryError> {
        let rows = sqlx::query_as::<_, ConsultationRow>(&format!(
            "SELECT {CONSULTATION_COLUMNS} FROM consultations \
             WHERE ($1::consultation_status IS NULL OR status = $1) \
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(status)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Consultation::from).collect())
    }

    /// One booking.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ConsultationId) -> Result<Option<Consultation>, RepositoryError> {
        let row = sqlx::query_as::<_, ConsultationRow>(&format!(
            "SELECT {CONSULTATION_COLUMNS} FROM consultations WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Consultation::from))
    }

    /// Schedule, complete or cancel a booking under a row lock.
    ///
    /// # Errors
    ///
    /// Returns `GuardedError::Rejected` when the change is not allowed
    /// (nothing is written), `RepositoryError::NotFound` for an unknown
    /// booking and `RepositoryError::Database` if a query fails.
    pub async fn update(
        &self,
        id: ConsultationId,
        update: &ScheduleUpdate,
    ) -> Result<Consultation, GuardedError<ScheduleError>> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, ConsultationRow>(&format!(
            "SELECT {CONSULTATION_COLUMNS} FROM consultations WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;
        let mut consultation = Consultation::from(row);

        consultation.apply(update).map_err(GuardedError::Rejected)?;

        sqlx::query(
            "UPDATE consultations SET status = $2, scheduled_at = $3, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(consultation.id)
        .bind(consultation.status)
        .bind(consultation.scheduled_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(consultation)
    }
}

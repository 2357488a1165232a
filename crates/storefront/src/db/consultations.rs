//! Consultation repository (booking and payment side).

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;

use exhale_core::consultation::{Booking, Consultation};
use exhale_core::{ConsultationId, ConsultationStatus, Email, PaymentStatus, UserId};

use super::RepositoryError;

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

/// Outcome of recording a consultation payment.
#[derive(Debug)]
pub enum MarkedPaid {
    /// This delivery moved the booking to `paid`.
    Paid(Consultation),
    /// The booking was already paid; nothing changed.
    AlreadyPaid(ConsultationId),
}

/// Repository for consultation bookings.
pub struct ConsultationRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ConsultationRepository<'a> {
    /// Create a new consultation repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert an unpaid `pending` booking.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &self,
        booking: &Booking,
        user_id: Option<UserId>,
    ) -> Result<Consultation, RepositoryError> {
        let row = sqlx::query_as::<_, ConsultationRow>(
            "INSERT INTO consultations (user_id, first_name, last_name, email, phone, \
                 date_of_birth, smoking_status, years_using, daily_usage, preferred_call_time, \
                 previous_quit_attempts, current_nrt, medical_conditions) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             RETURNING *",
        )
        .bind(user_id)
        .bind(&booking.first_name)
        .bind(&booking.last_name)
        .bind(&booking.email)
        .bind(&booking.phone)
        .bind(booking.date_of_birth)
        .bind(&booking.smoking_status)
        .bind(&booking.years_using)
        .bind(&booking.daily_usage)
        .bind(booking.preferred_call_time.as_deref())
        .bind(booking.previous_quit_attempts.as_deref())
        .bind(booking.current_nrt.as_deref())
        .bind(booking.medical_conditions.as_deref())
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }

    /// Remember the payment session opened for a booking.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for an unknown booking.
    pub async fn attach_session(
        &self,
        id: ConsultationId,
        stripe_session_id: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE consultations SET stripe_session_id = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(stripe_session_id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Mark a booking paid. Repeated deliveries change nothing.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for an unknown booking.
    pub async fn mark_paid(
        &self,
        id: ConsultationId,
        stripe_session_id: &str,
        stripe_payment_intent_id: Option<&str>,
    ) -> Result<MarkedPaid, RepositoryError> {
        let updated = sqlx::query_as::<_, ConsultationRow>(
            "UPDATE consultations \
             SET payment_status = 'paid', \
                 stripe_session_id = COALESCE(stripe_session_id, $2), \
                 stripe_payment_intent_id = $3, \
                 updated_at = NOW() \
             WHERE id = $1 AND payment_status = 'unpaid' \
             RETURNING *",
        )
        .bind(id)
        .bind(stripe_session_id)
        .bind(stripe_payment_intent_id)
        .fetch_optional(self.pool)
        .await?;

        if let Some(row) = updated {
            return Ok(MarkedPaid::Paid(row.into()));
        }

        let exists = sqlx::query_scalar::<_, i64>("SELECT id FROM consultations WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        match exists {
            Some(_) => Ok(MarkedPaid::AlreadyPaid(id)),
            None => Err(RepositoryError::NotFound),
        }
    }
}

//! Paid pharmacist phone consultations.
//!
//! Anyone may book: the form is validated here, stored as an unpaid
//! `pending` record, and paid through a one-line hosted payment session. The
//! payment confirmation marks it paid; staff then schedule, complete or
//! cancel it.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Cents, ConsultationId, ConsultationStatus, Email, PaymentStatus, UserId};

/// Fee for one consultation ($29.95).
pub const CONSULTATION_FEE: Cents = Cents::new(2995);

/// Line name on the hosted payment page.
pub const CONSULTATION_LINE_NAME: &str = "Pharmacist Consultation";

/// Line description on the hosted payment page.
pub const CONSULTATION_LINE_DESCRIPTION: &str =
    "15-20 minute phone consultation with AHPRA-registered pharmacist";

pub const SMOKING_STATUSES: [&str; 3] = ["smoker", "vape", "both"];
pub const YEARS_USING: [&str; 5] = ["less-than-1", "1-5", "5-10", "10-20", "20+"];
pub const DAILY_USAGE: [&str; 5] = ["1-5", "5-10", "10-20", "20-30", "30+"];

const MAX_NAME: usize = 100;
const MAX_TEXT_ANSWER: usize = 2000;

/// Errors raised when a booking cannot be accepted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BookingError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid {field}: {value}")]
    InvalidChoice { field: &'static str, value: String },

    #[error("Invalid email address")]
    InvalidEmail,

    #[error("Invalid phone number")]
    InvalidPhone,

    #[error("Invalid date of birth")]
    InvalidDateOfBirth,

    #[error("{0} is too long")]
    TooLong(&'static str),
}

/// Booking form as submitted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookingForm {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<String>,
    #[serde(default)]
    pub smoking_status: Option<String>,
    #[serde(default)]
    pub years_using: Option<String>,
    #[serde(default)]
    pub daily_usage: Option<String>,
    #[serde(default)]
    pub preferred_call_time: Option<String>,
    #[serde(default)]
    pub previous_quit_attempts: Option<String>,
    #[serde(default)]
    pub current_nrt: Option<String>,
    #[serde(default)]
    pub medical_conditions: Option<String>,
}

/// A validated booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub first_name: String,
    pub last_name: String,
    pub email: Email,
    pub phone: String,
    pub date_of_birth: Option<NaiveDate>,
    pub smoking_status: String,
    pub years_using: String,
    pub daily_usage: String,
    pub preferred_call_time: Option<String>,
    pub previous_quit_attempts: Option<String>,
    pub current_nrt: Option<String>,
    pub medical_conditions: Option<String>,
}

fn optional(value: Option<String>, field: &'static str, max: usize) -> Result<Option<String>, BookingError> {
    let Some(value) = value else {
        return Ok(None);
    };
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.len() > max {
        return Err(BookingError::TooLong(field));
    }
    Ok(Some(trimmed.to_string()))
}

fn required(value: Option<String>, field: &'static str, max: usize) -> Result<String, BookingError> {
    optional(value, field, max)?.ok_or(BookingError::MissingField(field))
}

fn choice(
    value: Option<String>,
    field: &'static str,
    options: &[&str],
) -> Result<String, BookingError> {
    let value = required(value, field, MAX_NAME)?;
    if options.contains(&value.as_str()) {
        Ok(value)
    } else {
        Err(BookingError::InvalidChoice { field, value })
    }
}

/// Digits with optional `+`, spaces, dashes and parentheses; 8 to 15 digits.
fn phone(value: Option<String>) -> Result<String, BookingError> {
    let value = required(value, "phone", MAX_NAME)?;
    let allowed = value
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | ' ' | '-' | '(' | ')'));
    let digits = value.chars().filter(char::is_ascii_digit).count();
    if allowed && (8..=15).contains(&digits) {
        Ok(value)
    } else {
        Err(BookingError::InvalidPhone)
    }
}

impl BookingForm {
    /// Validate the booking. `today` bounds the date of birth.
    ///
    /// # Errors
    ///
    /// Returns a [`BookingError`] describing the first invalid field.
    pub fn validate(self, today: NaiveDate) -> Result<Booking, BookingError> {
        let first_name = required(self.first_name, "first_name", MAX_NAME)?;
        let last_name = required(self.last_name, "last_name", MAX_NAME)?;
        let email = required(self.email, "email", MAX_NAME)?;
        let email = Email::parse(&email).map_err(|_| BookingError::InvalidEmail)?;
        let phone = phone(self.phone)?;

        let date_of_birth = optional(self.date_of_birth, "date_of_birth", MAX_NAME)?
            .map(|raw| {
                NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                    .ok()
                    .filter(|dob| *dob < today)
                    .ok_or(BookingError::InvalidDateOfBirth)
            })
            .transpose()?;

        Ok(Booking {
            first_name,
            last_name,
            email,
            phone,
            date_of_birth,
            smoking_status: choice(self.smoking_status, "smoking_status", &SMOKING_STATUSES)?,
            years_using: choice(self.years_using, "years_using", &YEARS_USING)?,
            daily_usage: choice(self.daily_usage, "daily_usage", &DAILY_USAGE)?,
            preferred_call_time: optional(self.preferred_call_time, "preferred_call_time", MAX_NAME)?,
            previous_quit_attempts: optional(
                self.previous_quit_attempts,
                "previous_quit_attempts",
                MAX_TEXT_ANSWER,
            )?,
            current_nrt: optional(self.current_nrt, "current_nrt", MAX_TEXT_ANSWER)?,
            medical_conditions: optional(
                self.medical_conditions,
                "medical_conditions",
                MAX_TEXT_ANSWER,
            )?,
        })
    }
}

/// A stored consultation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Consultation {
    pub id: ConsultationId,
    pub user_id: Option<UserId>,
    #[serde(flatten)]
    pub booking: Booking,
    pub status: ConsultationStatus,
    pub payment_status: PaymentStatus,
    pub stripe_session_id: Option<String>,
    pub stripe_payment_intent_id: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A staff change to a consultation.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleUpdate {
    pub status: ConsultationStatus,
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
}

/// Errors from [`Consultation::apply`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    #[error("Cannot move a consultation from {from} to {to}")]
    InvalidTransition {
        from: ConsultationStatus,
        to: ConsultationStatus,
    },

    #[error("Consultation has not been paid")]
    Unpaid,

    #[error("A call time is required to schedule a consultation")]
    TimeRequired,
}

/// Whether `from → to` is a legal consultation move.
#[must_use]
pub const fn can_transition(from: ConsultationStatus, to: ConsultationStatus) -> bool {
    use ConsultationStatus::{Cancelled, Completed, Pending, Scheduled};
    matches!(
        (from, to),
        (Pending, Scheduled | Cancelled) | (Scheduled, Scheduled | Completed | Cancelled)
    )
}

impl Consultation {
    /// Apply a staff update. The record is untouched on error.
    ///
    /// Rescheduling a `scheduled` consultation is allowed.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError`] for an illegal move, for scheduling an
    /// unpaid booking, or for scheduling without a call time.
    pub fn apply(&mut self, update: &ScheduleUpdate) -> Result<(), ScheduleError> {
        if !can_transition(self.status, update.status) {
            return Err(ScheduleError::InvalidTransition {
                from: self.status,
                to: update.status,
            });
        }
        if update.status == ConsultationStatus::Scheduled {
            if self.payment_status != PaymentStatus::Paid {
                return Err(ScheduleError::Unpaid);
            }
            let at = update.scheduled_at.ok_or(ScheduleError::TimeRequired)?;
            self.scheduled_at = Some(at);
        }
        self.status = update.status;
        Ok(())
    }
}

//! Health assessment intake and pharmacist review.
//!
//! A customer submits an intake form, which creates a `submitted` record and
//! moves their profile to `pending`. A pharmacist then approves, asks for more
//! information, or declines. Only `submitted` records can be reviewed; a
//! customer who was asked for more information or declined submits a new
//! record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::events::AssessmentReviewed;
use crate::types::{AccessStatus, AssessmentId, AssessmentStatus, UserId};

pub const CARDIOVASCULAR: &str = "Heart disease or cardiovascular conditions";
pub const PREGNANCY: &str = "Pregnancy or breastfeeding";
pub const NONE_OF_THE_ABOVE: &str = "None of the above";

/// Conditions offered on the intake form.
pub const HEALTH_CONDITIONS: [&str; 9] = [
    CARDIOVASCULAR,
    "High blood pressure",
    "Diabetes",
    "Asthma or COPD",
    PREGNANCY,
    "Depression or anxiety",
    "Kidney or liver disease",
    "Recent surgery",
    NONE_OF_THE_ABOVE,
];

const MAX_SMOKING_YEARS: u16 = 90;
const MAX_CIGARETTES_PER_DAY: u16 = 200;
const MAX_TEXT_ANSWER: usize = 2000;

/// Errors raised when an intake cannot be accepted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntakeError {
    #[error("Please answer: {0}")]
    MissingAnswer(&'static str),

    #[error("{0} is out of range")]
    OutOfRange(&'static str),

    #[error("{0} is too long")]
    TooLong(&'static str),

    #[error("Unknown health condition: {0}")]
    UnknownCondition(String),

    #[error("\"None of the above\" cannot be combined with other conditions")]
    ConflictingConditions,

    #[error("An assessment is already {0}")]
    NotAccepting(AccessStatus),
}

/// Intake form as submitted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IntakeForm {
    pub smoking_years: Option<i64>,
    pub cigarettes_per_day: Option<i64>,
    #[serde(default)]
    pub previous_quit_attempts: Option<String>,
    #[serde(default)]
    pub current_nicotine_use: Option<String>,
    #[serde(default)]
    pub health_conditions: Vec<String>,
    #[serde(default)]
    pub medications: Option<String>,
    #[serde(default)]
    pub quit_motivation: Option<String>,
    #[serde(default)]
    pub flavour_preference: Option<String>,
}

/// A validated intake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intake {
    pub smoking_years: u16,
    pub cigarettes_per_day: u16,
    pub previous_quit_attempts: Option<String>,
    pub current_nicotine_use: Option<String>,
    pub health_conditions: Vec<String>,
    pub medications: Option<String>,
    pub pregnancy_status: bool,
    pub cardiovascular_conditions: bool,
    pub quit_motivation: Option<String>,
    pub flavour_preference: Option<String>,
}

fn bounded(value: Option<i64>, field: &'static str, max: u16) -> Result<u16, IntakeError> {
    let value = value.ok_or(IntakeError::MissingAnswer(field))?;
    u16::try_from(value)
        .ok()
        .filter(|v| *v <= max)
        .ok_or(IntakeError::OutOfRange(field))
}

fn text(value: Option<String>, field: &'static str) -> Result<Option<String>, IntakeError> {
    let Some(value) = value else {
        return Ok(None);
    };
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.len() > MAX_TEXT_ANSWER {
        return Err(IntakeError::TooLong(field));
    }
    Ok(Some(trimmed.to_string()))
}

impl IntakeForm {
    /// Validate answers and derive the pregnancy and cardiovascular flags.
    ///
    /// # Errors
    ///
    /// Returns an [`IntakeError`] describing the first invalid answer.
    pub fn validate(self) -> Result<Intake, IntakeError> {
        let smoking_years = bounded(self.smoking_years, "smoking_years", MAX_SMOKING_YEARS)?;
        let cigarettes_per_day = bounded(
            self.cigarettes_per_day,
            "cigarettes_per_day",
            MAX_CIGARETTES_PER_DAY,
        )?;

        let mut conditions: Vec<String> = Vec::with_capacity(self.health_conditions.len());
        for condition in self.health_conditions {
            let condition = condition.trim();
            if !HEALTH_CONDITIONS.contains(&condition) {
                return Err(IntakeError::UnknownCondition(condition.to_string()));
            }
            if !conditions.iter().any(|c| c == condition) {
                conditions.push(condition.to_string());
            }
        }
        if conditions.is_empty() {
            return Err(IntakeError::MissingAnswer("health_conditions"));
        }
        if conditions.len() > 1 && conditions.iter().any(|c| c == NONE_OF_THE_ABOVE) {
            return Err(IntakeError::ConflictingConditions);
        }

        Ok(Intake {
            smoking_years,
            cigarettes_per_day,
            previous_quit_attempts: text(self.previous_quit_attempts, "previous_quit_attempts")?,
            current_nicotine_use: text(self.current_nicotine_use, "current_nicotine_use")?,
            pregnancy_status: conditions.iter().any(|c| c == PREGNANCY),
            cardiovascular_conditions: conditions.iter().any(|c| c == CARDIOVASCULAR),
            health_conditions: conditions,
            medications: text(self.medications, "medications")?,
            quit_motivation: text(self.quit_motivation, "quit_motivation")?,
            flavour_preference: text(self.flavour_preference, "flavour_preference")?,
        })
    }
}

/// Check the profile may submit a new assessment.
///
/// # Errors
///
/// Returns [`IntakeError::NotAccepting`] while a submission is pending or
/// after approval.
pub const fn ensure_can_submit(access: AccessStatus) -> Result<(), IntakeError> {
    if access.accepts_submission() {
        Ok(())
    } else {
        Err(IntakeError::NotAccepting(access))
    }
}

/// A stored assessment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assessment {
    pub id: AssessmentId,
    pub user_id: UserId,
    #[serde(flatten)]
    pub intake: Intake,
    pub status: AssessmentStatus,
    pub pharmacist_notes: Option<String>,
    pub decline_reason: Option<String>,
    pub reviewed_by: Option<UserId>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Pharmacist outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    #[serde(rename = "approved")]
    Approve,
    #[serde(rename = "needs_info")]
    RequestInfo,
    #[serde(rename = "declined")]
    Decline,
}

impl From<Decision> for AssessmentStatus {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Approve => Self::Approved,
            Decision::RequestInfo => Self::NeedsInfo,
            Decision::Decline => Self::Declined,
        }
    }
}

/// A review submitted from the console.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReviewRequest {
    pub decision: Decision,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Errors from [`Assessment::review`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReviewError {
    #[error("Assessment has already been reviewed ({0})")]
    AlreadyReviewed(AssessmentStatus),

    #[error("A reason is required to decline an assessment")]
    ReasonRequired,
}

impl Assessment {
    /// Record a pharmacist decision.
    ///
    /// The record is untouched on error. The returned event's `decision` is
    /// also the value to mirror onto the profile's access status.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::AlreadyReviewed`] unless the record is
    /// `submitted`, and [`ReviewError::ReasonRequired`] when declining
    /// without a reason.
    pub fn review(
        &mut self,
        reviewer: UserId,
        request: &ReviewRequest,
        now: DateTime<Utc>,
    ) -> Result<AssessmentReviewed, ReviewError> {
        if self.status != AssessmentStatus::Submitted {
            return Err(ReviewError::AlreadyReviewed(self.status));
        }
        let reason = request
            .reason
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(ToString::to_string);
        if request.decision == Decision::Decline && reason.is_none() {
            return Err(ReviewError::ReasonRequired);
        }

        let decision = AssessmentStatus::from(request.decision);
        self.status = decision;
        self.reviewed_by = Some(reviewer);
        self.reviewed_at = Some(now);
        if decision == AssessmentStatus::Declined {
            self.decline_reason.clone_from(&reason);
        }
        if let Some(notes) = request.notes.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            self.pharmacist_notes = Some(notes.to_string());
        }

        Ok(AssessmentReviewed {
            assessment: self.id,
            user: self.user_id,
            decision,
            reason,
        })
    }
}

//! Status enums persisted as Postgres enum types.
//!
//! Each enum serializes as `snake_case` in JSON and matches the labels of the
//! corresponding Postgres type created in the migrations.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Error returned when a status label is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind}: {value}")]
pub struct InvalidStatus {
    /// Which enum was being parsed.
    pub kind: &'static str,
    /// The rejected label.
    pub value: String,
}

/// Generates `as_str`, `Display`, and `FromStr` from one label table.
macro_rules! status_labels {
    ($ty:ident, $kind:literal, { $($variant:ident => $label:literal),+ $(,)? }) => {
        impl $ty {
            /// Every variant, in lifecycle order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// The database / wire label for this status.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $label),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $ty {
            type Err = InvalidStatus;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($label => Ok(Self::$variant),)+
                    _ => Err(InvalidStatus {
                        kind: $kind,
                        value: s.to_string(),
                    }),
                }
            }
        }
    };
}

/// Lifecycle status of an order.
///
/// ```text
/// pending → pharmacist_review → dispensed → shipped → delivered
///    └──────────┴──────────────────┴──────────┴──→ cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    PharmacistReview,
    Dispensed,
    Shipped,
    Delivered,
    Cancelled,
}

status_labels!(OrderStatus, "order status", {
    Pending => "pending",
    PharmacistReview => "pharmacist_review",
    Dispensed => "dispensed",
    Shipped => "shipped",
    Delivered => "delivered",
    Cancelled => "cancelled",
});

impl OrderStatus {
    /// Terminal statuses accept no further transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }
}

/// Review status of a single assessment record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "assessment_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentStatus {
    Submitted,
    Approved,
    NeedsInfo,
    Declined,
}

status_labels!(AssessmentStatus, "assessment status", {
    Submitted => "submitted",
    Approved => "approved",
    NeedsInfo => "needs_info",
    Declined => "declined",
});

/// Profile-level gating attribute derived from the latest assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "access_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum AccessStatus {
    #[default]
    None,
    Pending,
    Approved,
    NeedsInfo,
    Declined,
}

status_labels!(AccessStatus, "access status", {
    None => "none",
    Pending => "pending",
    Approved => "approved",
    NeedsInfo => "needs_info",
    Declined => "declined",
});

impl AccessStatus {
    /// Whether gated (assessment-only) products may be shown and sold.
    #[must_use]
    pub const fn grants_gated_access(self) -> bool {
        matches!(self, Self::Approved)
    }

    /// Whether a new assessment may be submitted from this state.
    #[must_use]
    pub const fn accepts_submission(self) -> bool {
        matches!(self, Self::None | Self::NeedsInfo | Self::Declined)
    }
}

impl From<AssessmentStatus> for AccessStatus {
    fn from(status: AssessmentStatus) -> Self {
        match status {
            AssessmentStatus::Submitted => Self::Pending,
            AssessmentStatus::Approved => Self::Approved,
            AssessmentStatus::NeedsInfo => Self::NeedsInfo,
            AssessmentStatus::Declined => Self::Declined,
        }
    }
}

/// Role of a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "profile_role", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Shopper.
    #[default]
    Customer,
    /// Pharmacist staff with access to the review console.
    Admin,
}

status_labels!(Role, "role", {
    Customer => "customer",
    Admin => "admin",
});

impl Role {
    /// Whether this role may use the admin console.
    #[must_use]
    pub const fn is_staff(self) -> bool {
        matches!(self, Self::Admin)
    }
}

/// Scheduling status of a pharmacist consultation.
///
/// ```text
/// pending → scheduled → completed
///    └──────────┴──→ cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "consultation_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum ConsultationStatus {
    #[default]
    Pending,
    Scheduled,
    Completed,
    Cancelled,
}

status_labels!(ConsultationStatus, "consultation status", {
    Pending => "pending",
    Scheduled => "scheduled",
    Completed => "completed",
    Cancelled => "cancelled",
});

/// Whether the consultation fee has been collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "payment_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Unpaid,
    Paid,
}

status_labels!(PaymentStatus, "payment status", {
    Unpaid => "unpaid",
    Paid => "paid",
});

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_status_labels_round_trip() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), *status);
        }
    }

    #[test]
    fn test_order_status_serde_matches_label() {
        let json = serde_json::to_string(&OrderStatus::PharmacistReview).unwrap();
        assert_eq!(json, "\"pharmacist_review\"");
    }

    #[test]
    fn test_unknown_label_rejected() {
        let err = "refunded".parse::<OrderStatus>().unwrap_err();
        assert_eq!(err.to_string(), "invalid order status: refunded");
    }

    #[test]
    fn test_terminal_states() {
        assert!(OrderStatus::Delivered.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(!OrderStatus::Shipped.is_terminal());
    }

    #[test]
    fn test_access_status_from_assessment() {
        assert_eq!(
            AccessStatus::from(AssessmentStatus::Submitted),
            AccessStatus::Pending
        );
        assert_eq!(
            AccessStatus::from(AssessmentStatus::Approved),
            AccessStatus::Approved
        );
    }

    #[test]
    fn test_consultation_labels() {
        for status in ConsultationStatus::ALL {
            assert_eq!(status.as_str().parse::<ConsultationStatus>().unwrap(), *status);
        }
        assert_eq!("paid".parse::<PaymentStatus>().unwrap(), PaymentStatus::Paid);
        assert!("refunded".parse::<PaymentStatus>().is_err());
    }

    #[test]
    fn test_submission_allowed_states() {
        assert!(AccessStatus::None.accepts_submission());
        assert!(AccessStatus::Declined.accepts_submission());
        assert!(!AccessStatus::Pending.accepts_submission());
        assert!(!AccessStatus::Approved.accepts_submission());
    }
}

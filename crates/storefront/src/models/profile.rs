//! Customer profile domain type.

use chrono::{DateTime, Utc};
use serde::Serialize;

use exhale_core::{AccessStatus, Email, Role, UserId};

/// A customer (or staff) profile.
///
/// The password hash never leaves the repository.
#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    pub id: UserId,
    pub email: Email,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Gates access to assessment-only products.
    pub assessment_status: AccessStatus,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// First name when known, otherwise the email address.
    #[must_use]
    pub fn greeting_name(&self) -> &str {
        self.first_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| self.email.as_str())
    }
}

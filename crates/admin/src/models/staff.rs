//! Staff account domain type.

use chrono::{DateTime, Utc};
use serde::Serialize;

use exhale_core::{Email, Role, UserId};

/// A profile that may hold the staff role.
///
/// The password hash never leaves the repository.
#[derive(Debug, Clone, Serialize)]
pub struct StaffMember {
    pub id: UserId,
    pub email: Email,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl StaffMember {
    /// Display name for audit fields.
    #[must_use]
    pub fn display_name(&self) -> String {
        match (self.first_name.as_deref(), self.last_name.as_deref()) {
            (Some(first), Some(last)) => format!("{first} {last}"),
            (Some(name), None) | (None, Some(name)) => name.to_string(),
            (None, None) => self.email.to_string(),
        }
    }
}

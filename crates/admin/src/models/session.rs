//! Session-related types for console authentication.

use serde::{Deserialize, Serialize};

use exhale_core::{Email, UserId};

/// Session-stored staff identity.
///
/// The role is re-read from the profile on every request, so a demotion
/// takes effect immediately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentStaff {
    /// Profile ID.
    pub id: UserId,
    /// Profile email address.
    pub email: Email,
    /// Display name.
    pub name: String,
}

/// Session keys for console authentication data.
pub mod keys {
    /// Key for storing the signed-in staff member.
    pub const CURRENT_STAFF: &str = "current_staff";
}

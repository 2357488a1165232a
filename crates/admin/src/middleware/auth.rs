//! Staff authentication extractor.
//!
//! The session only proves who signed in. The role is read from the profile
//! on every request, so revoking staff access takes effect immediately.

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use serde_json::json;
use tower_sessions::Session;

use crate::db::StaffRepository;
use crate::models::session::{CurrentStaff, keys};
use crate::state::AppState;

/// Extractor that requires a signed-in staff member.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(RequireStaff(staff): RequireStaff) -> impl IntoResponse {
///     format!("Hello, {}!", staff.name)
/// }
/// ```
pub struct RequireStaff(pub CurrentStaff);

/// Rejection for [`RequireStaff`].
#[derive(Debug)]
pub enum StaffRejection {
    /// No signed-in staff member.
    Unauthorized,
    /// Signed in, but the profile is not staff (any more).
    Forbidden,
    /// The role lookup failed.
    Unavailable,
}

impl IntoResponse for StaffRejection {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "Please sign in to continue"),
            Self::Forbidden => (StatusCode::FORBIDDEN, "Staff access required"),
            Self::Unavailable => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error"),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl FromRequestParts<AppState> for RequireStaff {
    type Rejection = StaffRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .ok_or(StaffRejection::Unauthorized)?;

        let staff: CurrentStaff = session
            .get(keys::CURRENT_STAFF)
            .await
            .ok()
            .flatten()
            .ok_or(StaffRejection::Unauthorized)?;

        let role = StaffRepository::new(state.pool())
            .role(staff.id)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, staff_id = %staff.id, "Failed to load staff role");
                StaffRejection::Unavailable
            })?;

        if !role.is_some_and(|r| r.is_staff()) {
            tracing::warn!(staff_id = %staff.id, "Session holder no longer has staff access");
            return Err(StaffRejection::Forbidden);
        }

        Ok(Self(staff))
    }
}

/// Store the signed-in staff member in the session.
///
/// The session ID is cycled first so a pre-login ID cannot be fixated.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_staff(
    session: &Session,
    staff: &CurrentStaff,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(keys::CURRENT_STAFF, staff).await
}

/// End the console session.
///
/// # Errors
///
/// Returns an error if the session cannot be flushed.
pub async fn clear_current_staff(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}

//! Staff sign-in and sign-out.

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use exhale_core::{Email, UserId};

use crate::error::{AppError, clear_sentry_user, set_sentry_user};
use crate::middleware::{clear_current_staff, set_current_staff};
use crate::models::CurrentStaff;
use crate::services::auth::AuthService;
use crate::state::AppState;

/// Login request body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// The signed-in staff member.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub id: UserId,
    pub email: Email,
    pub name: String,
}

/// Sign in a staff member.
///
/// Customers with valid credentials get a 403 and no session.
#[instrument(skip(state, session, form))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let member = AuthService::new(state.pool())
        .login(&form.email, &form.password)
        .await
        .inspect_err(|e| tracing::warn!(error = %e, "Console login failed"))?;

    let current = CurrentStaff {
        id: member.id,
        email: member.email.clone(),
        name: member.display_name(),
    };
    set_current_staff(&session, &current).await?;
    set_sentry_user(&member.id, Some(member.email.as_str()));
    tracing::info!(staff_id = %member.id, "Staff signed in");

    Ok(Json(LoginResponse {
        id: current.id,
        email: current.email,
        name: current.name,
    }))
}

/// Sign out and destroy the console session.
#[instrument(skip(session))]
pub async fn logout(session: Session) -> Result<StatusCode, AppError> {
    clear_current_staff(&session).await?;
    clear_sentry_user();
    Ok(StatusCode::NO_CONTENT)
}

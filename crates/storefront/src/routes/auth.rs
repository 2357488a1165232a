//! Authentication route handlers.
//!
//! Email and password accounts. A successful register or login stores the
//! customer in the session; the session ID is cycled on the way in.

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{AppError, add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::middleware::{clear_current_user, set_current_user};
use crate::models::{CurrentUser, Profile};
use crate::services::auth::AuthService;
use crate::state::AppState;

/// Login request body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Registration request body.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub password_confirm: String,
}

async fn sign_in(session: &Session, profile: &Profile) -> Result<(), AppError> {
    let current = CurrentUser {
        id: profile.id,
        email: profile.email.clone(),
    };
    set_current_user(session, &current).await?;
    set_sentry_user(&profile.id, Some(profile.email.as_str()));
    Ok(())
}

/// Create an account, sign it in and send the welcome email.
#[instrument(skip(state, session, form))]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<Profile>), AppError> {
    if form.password != form.password_confirm {
        return Err(AppError::BadRequest("Passwords do not match".to_string()));
    }

    let profile = AuthService::new(state.pool())
        .register_with_password(&form.email, &form.password)
        .await?;
    sign_in(&session, &profile).await?;
    tracing::info!(user_id = %profile.id, "Customer registered");

    let email = state.email().clone();
    let to = profile.email.clone();
    let name = profile.greeting_name().to_string();
    tokio::spawn(async move {
        if let Err(e) = email.send_welcome_email(to.as_str(), &name).await {
            tracing::error!(error = %e, "Failed to send welcome email");
        }
    });

    Ok((StatusCode::CREATED, Json(profile)))
}

/// Sign in with email and password.
#[instrument(skip(state, session, form))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<LoginRequest>,
) -> Result<Json<Profile>, AppError> {
    let profile = AuthService::new(state.pool())
        .login_with_password(&form.email, &form.password)
        .await
        .inspect_err(|e| tracing::warn!(error = %e, "Login failed"))?;

    sign_in(&session, &profile).await?;
    add_breadcrumb("auth", "Signed in", None);

    Ok(Json(profile))
}

/// Sign out. The cart stays with the browser session.
#[instrument(skip(session))]
pub async fn logout(session: Session) -> Result<StatusCode, AppError> {
    clear_current_user(&session).await?;
    clear_sentry_user();
    Ok(StatusCode::NO_CONTENT)
}

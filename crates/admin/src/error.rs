//! Unified error handling for the review console.
//!
//! Every error body is `{ "error": "<message>" }`. Server errors are captured
//! to Sentry before responding.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use exhale_core::assessment::ReviewError;
use exhale_core::consultation::ScheduleError;
use exhale_core::order::TransitionError;
use serde_json::json;
use thiserror::Error;

use crate::db::{GuardedError, RepositoryError};
use crate::services::auth::AuthError;

/// Application-level error type for the console.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Order status change rejected by the lifecycle rules.
    #[error("Transition rejected: {0}")]
    Transition(#[from] TransitionError),

    /// Assessment review rejected.
    #[error("Review rejected: {0}")]
    Review(#[from] ReviewError),

    /// Consultation scheduling rejected.
    #[error("Scheduling rejected: {0}")]
    Schedule(#[from] ScheduleError),

    /// Sign-in failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Session store failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// User lacks permission.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl<E> From<GuardedError<E>> for AppError
where
    E: std::error::Error + 'static,
    Self: From<E>,
{
    fn from(err: GuardedError<E>) -> Self {
        match err {
            GuardedError::Rejected(e) => e.into(),
            GuardedError::Repository(e) => e.into(),
        }
    }
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Database(RepositoryError::NotFound) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Database(RepositoryError::Conflict(_)) => StatusCode::CONFLICT,
            Self::Database(_) | Self::Session(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Transition(TransitionError::NotAllowed { .. })
            | Self::Review(ReviewError::AlreadyReviewed(_))
            | Self::Schedule(ScheduleError::InvalidTransition { .. } | ScheduleError::Unpaid) => {
                StatusCode::CONFLICT
            }
            Self::Transition(_) | Self::Review(_) | Self::Schedule(_) | Self::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Auth(AuthError::NotStaff) | Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Auth(AuthError::InvalidCredentials | AuthError::InvalidEmail(_))
            | Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Auth(AuthError::Repository(_) | AuthError::PasswordHash) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn message(&self) -> String {
        // Don't expose internal error details to clients
        match self {
            Self::Database(RepositoryError::NotFound) => "Not found".to_string(),
            Self::Database(RepositoryError::Conflict(msg)) => msg.clone(),
            Self::Database(_) | Self::Session(_) | Self::Internal(_) => {
                "Internal server error".to_string()
            }
            Self::Transition(e) => e.to_string(),
            Self::Review(e) => e.to_string(),
            Self::Schedule(e) => e.to_string(),
            Self::Auth(AuthError::NotStaff) => "Staff access required".to_string(),
            Self::Auth(AuthError::InvalidCredentials | AuthError::InvalidEmail(_)) => {
                "Invalid credentials".to_string()
            }
            Self::Auth(_) => "Authentication error".to_string(),
            Self::NotFound(what) => format!("Not found: {what}"),
            Self::Unauthorized(msg) | Self::Forbidden(msg) | Self::BadRequest(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Console request error"
            );
        }

        (status, Json(json!({ "error": self.message() }))).into_response()
    }
}

/// Set the Sentry user context for a staff member.
pub fn set_sentry_user(staff_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(staff_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use exhale_core::{AssessmentStatus, OrderStatus};

    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("order 12".to_string());
        assert_eq!(err.to_string(), "Not found: order 12");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Forbidden("test".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(RepositoryError::NotFound.into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_rejections_map_to_client_errors() {
        let not_allowed: GuardedError<TransitionError> =
            GuardedError::Rejected(TransitionError::NotAllowed {
                from: OrderStatus::Delivered,
                to: OrderStatus::Cancelled,
            });
        assert_eq!(get_status(not_allowed.into()), StatusCode::CONFLICT);

        let tracking: GuardedError<TransitionError> =
            GuardedError::Rejected(TransitionError::TrackingRequired);
        assert_eq!(get_status(tracking.into()), StatusCode::BAD_REQUEST);

        let reviewed: GuardedError<ReviewError> =
            GuardedError::Rejected(ReviewError::AlreadyReviewed(AssessmentStatus::Approved));
        assert_eq!(get_status(reviewed.into()), StatusCode::CONFLICT);

        let missing: GuardedError<ReviewError> = RepositoryError::NotFound.into();
        assert_eq!(get_status(missing.into()), StatusCode::NOT_FOUND);

        let unpaid: GuardedError<ScheduleError> = GuardedError::Rejected(ScheduleError::Unpaid);
        assert_eq!(get_status(unpaid.into()), StatusCode::CONFLICT);
        assert_eq!(
            get_status(ScheduleError::TimeRequired.into()),
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn test_error_body_is_json() {
        let response = AppError::Review(ReviewError::ReasonRequired).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"], "A reason is required to decline an assessment");
    }
}

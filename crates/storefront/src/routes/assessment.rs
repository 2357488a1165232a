//! Assessment submission.

use axum::{Json, extract::State, http::StatusCode};
use tracing::instrument;

use exhale_core::assessment::{Assessment, IntakeForm, ensure_can_submit};

use super::access_for;
use crate::db::AssessmentRepository;
use crate::error::AppError;
use crate::middleware::RequireAuth;
use crate::state::AppState;

/// Submit a health intake for pharmacist review.
///
/// Accepted when the profile has no assessment yet or the last one was
/// declined or sent back for more information. The profile becomes
/// `pending` in the same transaction as the insert.
#[instrument(skip(state, user, form), fields(user_id = %user.id))]
pub async fn submit(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(form): Json<IntakeForm>,
) -> Result<(StatusCode, Json<Assessment>), AppError> {
    let access = access_for(&state, Some(&user)).await?;
    ensure_can_submit(access)?;
    let intake = form.validate()?;

    let assessment = AssessmentRepository::new(state.pool())
        .submit(user.id, &intake)
        .await?;
    tracing::info!(assessment_id = %assessment.id, "Assessment submitted");

    Ok((StatusCode::CREATED, Json(assessment)))
}

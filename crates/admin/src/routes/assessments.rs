//! Assessment review route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::Utc;
use serde::Deserialize;
use tracing::instrument;

use exhale_core::assessment::ReviewRequest;
use exhale_core::{AssessmentId, AssessmentStatus};

use crate::db::{AssessmentRepository, AssessmentWithCustomer};
use crate::error::AppError;
use crate::middleware::RequireStaff;
use crate::services::notifier::Context;
use crate::state::AppState;

/// Assessment queue filter.
#[derive(Debug, Default, Deserialize)]
pub struct AssessmentQuery {
    pub status: Option<AssessmentStatus>,
}

/// Assessment queue, oldest first.
#[instrument(skip(state, staff), fields(staff_id = %staff.id))]
pub async fn index(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Query(query): Query<AssessmentQuery>,
) -> Result<Json<Vec<AssessmentWithCustomer>>, AppError> {
    let assessments = AssessmentRepository::new(state.pool())
        .list(query.status)
        .await?;
    Ok(Json(assessments))
}

/// One assessment with its customer.
#[instrument(skip(state, staff), fields(staff_id = %staff.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Path(id): Path<i64>,
) -> Result<Json<AssessmentWithCustomer>, AppError> {
    AssessmentRepository::new(state.pool())
        .get(AssessmentId::new(id))
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("assessment {id}")))
}

/// Record a decision, update the customer's access and notify them.
#[instrument(skip(state, staff, request), fields(staff_id = %staff.id, decision = ?request.decision))]
pub async fn review(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Path(id): Path<i64>,
    Json(request): Json<ReviewRequest>,
) -> Result<Json<AssessmentWithCustomer>, AppError> {
    let (record, event) = AssessmentRepository::new(state.pool())
        .review(AssessmentId::new(id), staff.id, &request, Utc::now())
        .await?;

    tracing::info!(
        assessment_id = %record.assessment.id,
        user_id = %record.customer.id,
        decision = %event.decision,
        "Assessment reviewed"
    );

    state
        .notifier()
        .dispatch(event.into(), record.customer.clone(), Context::default());

    Ok(Json(record))
}

//! Consultation scheduling route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use tracing::instrument;

use exhale_core::consultation::{Consultation, ScheduleUpdate};
use exhale_core::{ConsultationId, ConsultationStatus};

use crate::db::ConsultationRepository;
use crate::error::AppError;
use crate::middleware::RequireStaff;
use crate::state::AppState;

/// Consultation list filter.
#[derive(Debug, Default, Deserialize)]
pub struct ConsultationQuery {
    pub status: Option<ConsultationStatus>,
}

/// Bookings, newest first.
#[instrument(skip(state, staff), fields(staff_id = %staff.id))]
pub async fn index(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Query(query): Query<ConsultationQuery>,
) -> Result<Json<Vec<Consultation>>, AppError> {
    let consultations = ConsultationRepository::new(state.pool())
        .list(query.status)
        .await?;
    Ok(Json(consultations))
}

/// One booking.
#[instrument(skip(state, staff), fields(staff_id = %staff.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Path(id): Path<i64>,
) -> Result<Json<Consultation>, AppError> {
    ConsultationRepository::new(state.pool())
        .get(ConsultationId::new(id))
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("consultation {id}")))
}

/// Schedule, complete or cancel a paid booking.
#[instrument(skip(state, staff, update), fields(staff_id = %staff.id, to = %update.status))]
pub async fn update_status(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Path(id): Path<i64>,
    Json(update): Json<ScheduleUpdate>,
) -> Result<Json<Consultation>, AppError> {
    let consultation = ConsultationRepository::new(state.pool())
        .update(ConsultationId::new(id), &update)
        .await?;
    tracing::info!(
        consultation_id = %consultation.id,
        status = %consultation.status,
        "Consultation updated"
    );
    Ok(Json(consultation))
}

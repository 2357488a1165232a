//! Dashboard route handler.

use std::collections::BTreeMap;

use axum::{Json, extract::State};
use serde::Serialize;
use tracing::instrument;

use crate::db::{AssessmentRepository, OrderRepository};
use crate::error::AppError;
use crate::middleware::RequireStaff;
use crate::state::AppState;

/// Queue sizes for the landing page.
#[derive(Debug, Serialize)]
pub struct Dashboard {
    /// Orders per status; every status is present.
    pub orders: BTreeMap<&'static str, i64>,
    /// Assessments waiting for a decision.
    pub pending_assessments: i64,
}

/// Counts of work waiting for the pharmacist.
#[instrument(skip(state, staff), fields(staff_id = %staff.id))]
pub async fn index(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
) -> Result<Json<Dashboard>, AppError> {
    let mut orders: BTreeMap<&'static str, i64> = exhale_core::OrderStatus::ALL
        .iter()
        .map(|s| (s.as_str(), 0))
        .collect();
    for (status, count) in OrderRepository::new(state.pool()).count_by_status().await? {
        orders.insert(status.as_str(), count);
    }

    let pending_assessments = AssessmentRepository::new(state.pool())
        .count_pending()
        .await?;

    Ok(Json(Dashboard {
        orders,
        pending_assessments,
    }))
}

//! Order review route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::Utc;
use serde::Deserialize;
use tracing::instrument;

use exhale_core::order::{Order, StatusUpdate};
use exhale_core::{OrderId, OrderStatus};

use crate::db::{OrderDetail, OrderRepository, OrderSummary};
use crate::error::AppError;
use crate::middleware::RequireStaff;
use crate::services::notifier::Context;
use crate::state::AppState;

/// Order queue filter.
#[derive(Debug, Default, Deserialize)]
pub struct OrderQuery {
    pub status: Option<OrderStatus>,
}

/// Order queue, oldest first.
#[instrument(skip(state, staff), fields(staff_id = %staff.id))]
pub async fn index(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Query(query): Query<OrderQuery>,
) -> Result<Json<Vec<OrderSummary>>, AppError> {
    let orders = OrderRepository::new(state.pool()).list(query.status).await?;
    Ok(Json(orders))
}

/// One order with items, customer and the statuses it may move to.
#[instrument(skip(state, staff), fields(staff_id = %staff.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Path(id): Path<i64>,
) -> Result<Json<OrderDetail>, AppError> {
    OrderRepository::new(state.pool())
        .get(OrderId::new(id))
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("order {id}")))
}

/// Move an order to a new status.
///
/// The change is committed before the customer is notified; a failed email
/// never undoes it.
#[instrument(skip(state, staff, update), fields(staff_id = %staff.id, to = ?update.status))]
pub async fn update_status(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Path(id): Path<i64>,
    Json(update): Json<StatusUpdate>,
) -> Result<Json<Order>, AppError> {
    let (order, event, customer) = OrderRepository::new(state.pool())
        .update_status(OrderId::new(id), &update, Utc::now())
        .await?;

    tracing::info!(
        order_id = %order.id,
        from = %event.from,
        to = %event.to,
        "Order status changed"
    );

    state
        .notifier()
        .dispatch(event.into(), customer, Context::for_update(&update));

    Ok(Json(order))
}

//! Account route handlers (require authentication).

use axum::{Json, extract::State};
use tracing::instrument;

use crate::db::{OrderRepository, OrderWithItems};
use crate::error::AppError;
use crate::middleware::RequireAuth;
use crate::state::AppState;

/// Order history, newest first, with line items.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn orders(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<OrderWithItems>>, AppError> {
    let orders = OrderRepository::new(state.pool())
        .list_for_user(user.id)
        .await?;
    Ok(Json(orders))
}

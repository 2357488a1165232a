//! Checkout route handler.
//!
//! Client prices are never trusted: items are re-priced from the catalog,
//! the totals are computed here and the hosted payment page is opened with
//! exactly those lines. The priced snapshot rides along in session metadata
//! for the webhook.
//!
//! The hosted page returns the buyer to `/checkout/success`, which empties
//! the session cart. The order itself is only ever recorded by the webhook.

use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use exhale_core::cart::CartStore;
use exhale_core::checkout::{CheckoutError, RequestedItem, plan_checkout, price_items};

use super::access_for;
use crate::error::{AppError, add_breadcrumb};
use crate::middleware::OptionalAuth;
use crate::services::SessionCartStorage;
use crate::state::AppState;
use crate::stripe::{CheckoutSessionParams, StripeError};

/// Checkout request body.
#[derive(Debug, Default, Deserialize)]
pub struct CheckoutRequest {
    #[serde(default)]
    pub items: Vec<RequestedItem>,
}

/// Hosted payment page to redirect to.
#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub url: String,
}

/// Create a hosted checkout session for the submitted items.
///
/// An empty item list is rejected before the caller is authenticated.
#[instrument(skip(state, user, request), fields(items = request.items.len()))]
pub async fn create(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>, AppError> {
    if request.items.is_empty() {
        return Err(CheckoutError::EmptyCart.into());
    }
    let user = user.ok_or_else(|| AppError::Unauthorized("Please sign in to continue".to_string()))?;

    let access = access_for(&state, Some(&user)).await?;
    let lines = price_items(&request.items, &state.catalog(), access)?;
    let plan = plan_checkout(lines, &state.config().shipping)?;

    let total = plan.totals.total.to_string();
    add_breadcrumb(
        "checkout",
        "Creating checkout session",
        Some(&[("total", total.as_str())]),
    );

    let params = CheckoutSessionParams::new(
        &plan,
        user.id,
        user.email.as_str(),
        &state.config().base_url,
    );
    let session = state.stripe().create_checkout_session(&params).await?;

    let url = session.url.ok_or_else(|| {
        StripeError::Parse(format!("checkout session {} has no url", session.id))
    })?;

    Ok(Json(CheckoutResponse { url }))
}

/// Query string of the payment return URL.
#[derive(Debug, Default, Deserialize)]
pub struct SuccessQuery {
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Acknowledgement of a completed payment return.
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub cleared: bool,
    pub session_id: Option<String>,
}

/// Return point after a successful payment. Empties the session cart.
#[instrument(skip(state, session, query), fields(session_id = query.session_id.as_deref().unwrap_or("")))]
pub async fn success(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<SuccessQuery>,
) -> Result<Json<SuccessResponse>, AppError> {
    let mut cart = CartStore::load(SessionCartStorage::new(session), state.catalog()).await?;
    cart.clear().await?;
    tracing::info!("Cart cleared after payment");

    Ok(Json(SuccessResponse {
        cleared: true,
        session_id: query.session_id,
    }))
}

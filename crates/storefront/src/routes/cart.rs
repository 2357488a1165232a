//! Cart route handlers.
//!
//! The cart lives in the server-side session. Every mutation answers with
//! the fresh summary so clients never recompute totals themselves.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use exhale_core::cart::{CartStore, CartSummary};

use super::access_for;
use crate::error::AppError;
use crate::middleware::OptionalAuth;
use crate::services::SessionCartStorage;
use crate::state::AppState;

/// Add to cart request.
#[derive(Debug, Deserialize)]
pub struct AddToCartRequest {
    pub product_id: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

const fn default_quantity() -> u32 {
    1
}

/// Update quantity request. Zero or negative removes the line.
#[derive(Debug, Deserialize)]
pub struct UpdateCartRequest {
    pub product_id: String,
    pub quantity: i64,
}

/// Remove line request.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartRequest {
    pub product_id: String,
}

/// Cart badge count.
#[derive(Debug, Serialize)]
pub struct CartCount {
    pub count: u32,
}

async fn load(
    state: &AppState,
    session: Session,
    user: OptionalAuth,
) -> Result<CartStore<SessionCartStorage>, AppError> {
    let access = access_for(state, user.0.as_ref()).await?;
    let mut cart = CartStore::load(SessionCartStorage::new(session), state.catalog())
        .await?
        .with_access(access);
    cart.subscribe(|count| tracing::debug!(count, "Cart updated"));
    Ok(cart)
}

fn summary(state: &AppState, cart: &CartStore<SessionCartStorage>) -> Json<CartSummary> {
    Json(cart.summary(&state.config().shipping))
}

/// Display the cart.
#[instrument(skip(state, session, user))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    user: OptionalAuth,
) -> Result<Json<CartSummary>, AppError> {
    let cart = load(&state, session, user).await?;
    Ok(summary(&state, &cart))
}

/// Add a product to the cart.
///
/// Unknown products and products the caller may not buy are ignored.
#[instrument(skip(state, session, user), fields(product_id = %form.product_id))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    user: OptionalAuth,
    Json(form): Json<AddToCartRequest>,
) -> Result<Json<CartSummary>, AppError> {
    let mut cart = load(&state, session, user).await?;
    cart.add(&form.product_id, form.quantity).await?;
    Ok(summary(&state, &cart))
}

/// Overwrite the quantity of a line already in the cart.
#[instrument(skip(state, session, user), fields(product_id = %form.product_id))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    user: OptionalAuth,
    Json(form): Json<UpdateCartRequest>,
) -> Result<Json<CartSummary>, AppError> {
    let mut cart = load(&state, session, user).await?;
    cart.set_quantity(&form.product_id, form.quantity).await?;
    Ok(summary(&state, &cart))
}

/// Remove a line from the cart.
#[instrument(skip(state, session, user), fields(product_id = %form.product_id))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    user: OptionalAuth,
    Json(form): Json<RemoveFromCartRequest>,
) -> Result<Json<CartSummary>, AppError> {
    let mut cart = load(&state, session, user).await?;
    cart.remove(&form.product_id).await?;
    Ok(summary(&state, &cart))
}

/// Empty the cart.
#[instrument(skip(state, session, user))]
pub async fn clear(
    State(state): State<AppState>,
    session: Session,
    user: OptionalAuth,
) -> Result<Json<CartSummary>, AppError> {
    let mut cart = load(&state, session, user).await?;
    cart.clear().await?;
    Ok(summary(&state, &cart))
}

/// Get the cart item count.
#[instrument(skip(state, session, user))]
pub async fn count(
    State(state): State<AppState>,
    session: Session,
    user: OptionalAuth,
) -> Result<Json<CartCount>, AppError> {
    let cart = load(&state, session, user).await?;
    Ok(Json(CartCount {
        count: cart.count(),
    }))
}

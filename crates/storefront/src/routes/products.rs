//! Catalog route handlers.
//!
//! Gated products are invisible until the caller's assessment is approved:
//! they are left out of listings and their detail route answers 404.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use tracing::instrument;

use exhale_core::catalog::{Category, Product};

use super::access_for;
use crate::error::AppError;
use crate::middleware::OptionalAuth;
use crate::state::AppState;

/// Query parameters for the product listing.
#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub category: Option<Category>,
}

/// List products visible to the caller.
#[instrument(skip(state, user))]
pub async fn index(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Vec<&'static Product>>, AppError> {
    let access = access_for(&state, user.as_ref()).await?;

    let products = state
        .catalog()
        .visible_to(access)
        .filter(|p| query.category.is_none_or(|c| p.category == c))
        .collect();

    Ok(Json(products))
}

/// Show a single product.
#[instrument(skip(state, user))]
pub async fn show(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    Path(id): Path<String>,
) -> Result<Json<&'static Product>, AppError> {
    let access = access_for(&state, user.as_ref()).await?;

    state
        .catalog()
        .get(&id)
        .filter(|p| p.is_available_to(access))
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))
}

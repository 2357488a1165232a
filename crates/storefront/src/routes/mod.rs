//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Liveness check
//! GET  /health/ready           - Readiness check (database)
//!
//! # Catalog
//! GET  /products               - Products visible to the caller
//! GET  /products/{id}          - Product detail
//!
//! # Cart (session)
//! GET  /cart                   - Lines with subtotal, shipping and total
//! POST /cart/add               - Add a product
//! POST /cart/update            - Overwrite a line quantity
//! POST /cart/remove            - Remove a line
//! POST /cart/clear             - Empty the cart
//! GET  /cart/count             - Item count badge
//!
//! # Payment
//! POST /api/checkout           - Create a hosted checkout session
//! GET  /checkout/success       - Payment return; empties the cart
//! POST /api/consultation       - Book a paid pharmacist consultation
//! POST /api/webhook            - Stripe webhook (signature verified)
//!
//! # Customer (requires auth)
//! POST /assessment             - Submit a health assessment
//! GET  /account/orders         - Order history
//!
//! # Auth
//! POST /auth/register          - Create an account and sign in
//! POST /auth/login             - Sign in
//! POST /auth/logout            - Sign out
//! ```

pub mod account;
pub mod assessment;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod consultation;
pub mod products;
pub mod webhook;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    middleware::from_fn,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use exhale_core::AccessStatus;

use crate::db::ProfileRepository;
use crate::error::AppError;
use crate::middleware::{
    api_rate_limiter, auth_rate_limiter, create_session_layer, request_id_middleware,
    security_headers_middleware,
};
use crate::models::CurrentUser;
use crate::state::AppState;

/// Access status of the caller, read fresh from the profile.
///
/// Anonymous callers and unknown profiles have no access.
async fn access_for(state: &AppState, user: Option<&CurrentUser>) -> Result<AccessStatus, AppError> {
    match user {
        Some(user) => Ok(ProfileRepository::new(state.pool())
            .access_status(user.id)
            .await?),
        None => Ok(AccessStatus::None),
    }
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{id}", get(products::show))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/clear", post(cart::clear))
        .route("/count", get(cart::count))
}

/// Create the payment API routes router.
///
/// Checkout and booking are rate limited; webhook deliveries come from
/// Stripe's fixed address pool.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/checkout",
            post(checkout::create).layer(api_rate_limiter()),
        )
        .route(
            "/consultation",
            post(consultation::book).layer(api_rate_limiter()),
        )
        .route("/webhook", post(webhook::receive))
}

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .layer(auth_rate_limiter())
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/products", product_routes())
        .nest("/cart", cart_routes())
        .nest("/api", api_routes())
        .route("/checkout/success", get(checkout::success))
        .route(
            "/assessment",
            post(assessment::submit).layer(api_rate_limiter()),
        )
        .route("/account/orders", get(account::orders))
        .nest("/auth", auth_routes())
}

/// The complete storefront application with its middleware stack.
///
/// Sentry layers are added by the binary so tests can build the app without
/// a Sentry client.
pub fn app(state: AppState) -> Router {
    let session_layer = create_session_layer(state.pool(), state.config());

    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(routes())
        .layer(from_fn(security_headers_middleware))
        .layer(session_layer)
        .layer(from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Verifies database connectivity before returning OK.
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

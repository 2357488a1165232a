//! HTTP route handlers for the review console.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                     - Liveness check
//! GET  /health/ready               - Readiness check (database)
//!
//! # Auth
//! POST /auth/login                 - Staff sign-in
//! POST /auth/logout                - Sign out
//!
//! # Review (requires staff)
//! GET  /                           - Queue counts
//! GET  /orders?status=             - Order queue, oldest first
//! GET  /orders/{id}                - Order detail with items and customer
//! POST /orders/{id}/status         - Move an order through its lifecycle
//! GET  /assessments?status=        - Assessment queue, oldest first
//! GET  /assessments/{id}           - Assessment detail
//! POST /assessments/{id}/review    - Record a pharmacist decision
//! GET  /consultations?status=      - Consultation bookings, newest first
//! GET  /consultations/{id}         - Booking detail
//! POST /consultations/{id}/status  - Schedule, complete or cancel a booking
//! ```

pub mod assessments;
pub mod auth;
pub mod consultations;
pub mod dashboard;
pub mod orders;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    middleware::from_fn,
    routing::{get, post},
};
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::middleware::{
    create_session_layer, login_rate_limiter, request_id_middleware, security_headers_middleware,
};
use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(auth::login).layer(login_rate_limiter()))
        .route("/logout", post(auth::logout))
}

/// Create the order review routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index))
        .route("/{id}", get(orders::show))
        .route("/{id}/status", post(orders::update_status))
}

/// Create the assessment review routes router.
pub fn assessment_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(assessments::index))
        .route("/{id}", get(assessments::show))
        .route("/{id}/review", post(assessments::review))
}

/// Create the consultation scheduling routes router.
pub fn consultation_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(consultations::index))
        .route("/{id}", get(consultations::show))
        .route("/{id}/status", post(consultations::update_status))
}

/// Create all routes for the console.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(dashboard::index))
        .nest("/auth", auth_routes())
        .nest("/orders", order_routes())
        .nest("/assessments", assessment_routes())
        .nest("/consultations", consultation_routes())
}

/// The complete console application with its middleware stack.
///
/// Sentry layers are added by the binary.
pub fn app(state: AppState) -> Router {
    let session_layer = create_session_layer(state.pool(), state.config());

    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(routes())
        .layer(from_fn(security_headers_middleware))
        .layer(session_layer)
        .layer(from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
}

/// Liveness health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

//! Review console router tests.
//!
//! Unauthenticated requests are refused before any query runs, so the lazy
//! pool is never reached.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use exhale_integration_tests::{admin_app, body_json, get, json_request};
use serde_json::json;
use tower::ServiceExt;

#[tokio::test]
async fn test_health() {
    let response = admin_app().oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_console_responses_are_hardened() {
    let response = admin_app().oneshot(get("/health")).await.unwrap();
    let headers = response.headers();
    assert!(headers.contains_key("strict-transport-security"));
    assert_eq!(headers.get("cache-control").unwrap(), "no-store");
    assert!(headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn test_dashboard_requires_staff_session() {
    let response = admin_app().oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_order_routes_require_staff_session() {
    for uri in ["/orders", "/orders?status=shipped", "/orders/1"] {
        let response = admin_app().oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
    }

    let response = admin_app()
        .oneshot(json_request(
            "POST",
            "/orders/1/status",
            &json!({ "status": "cancelled" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_assessment_routes_require_staff_session() {
    let response = admin_app().oneshot(get("/assessments")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = admin_app()
        .oneshot(json_request(
            "POST",
            "/assessments/4/review",
            &json!({ "decision": "approved" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_consultation_routes_require_staff_session() {
    for uri in ["/consultations", "/consultations?status=pending", "/consultations/3"] {
        let response = admin_app().oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
    }

    let response = admin_app()
        .oneshot(json_request(
            "POST",
            "/consultations/3/status",
            &json!({ "status": "scheduled", "scheduled_at": "2025-03-04T01:30:00Z" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_rejects_malformed_email() {
    let response = admin_app()
        .oneshot(json_request(
            "POST",
            "/auth/login",
            &json!({ "email": "not-an-email", "password": "correct horse battery" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_is_rate_limited_per_client() {
    let app = admin_app();
    let attempt = || {
        json_request(
            "POST",
            "/auth/login",
            &json!({ "email": "nobody", "password": "guess" }),
        )
    };

    for _ in 0..3 {
        let response = app.clone().oneshot(attempt()).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
    let response = app.clone().oneshot(attempt()).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

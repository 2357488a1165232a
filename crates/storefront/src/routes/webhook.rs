//! Stripe webhook handler.
//!
//! The body is verified against `Stripe-Signature` before it is parsed.
//! A paid checkout session becomes exactly one order awaiting pharmacist
//! review, however many times Stripe delivers the event. A session carrying
//! a consultation id pays for a booking instead and marks it paid once.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::HeaderMap,
};
use chrono::Utc;
use secrecy::ExposeSecret;
use serde_json::{Value, json};
use tracing::instrument;

use exhale_core::UserId;
use exhale_core::ConsultationId;
use exhale_core::checkout::{charged_totals, compute_totals, decode_snapshot, lines_from_snapshot};

use crate::db::{
    ConsultationRepository, MarkedPaid, NewOrder, OrderRepository, ProfileRepository, Recorded,
};
use crate::error::AppError;
use crate::state::AppState;
use crate::stripe::webhook::{
    self, CHECKOUT_SESSION_ASYNC_PAYMENT_SUCCEEDED, CHECKOUT_SESSION_COMPLETED,
    CheckoutSessionObject, Event, PAYMENT_INTENT_FAILED, SIGNATURE_HEADER, SignatureError,
};
use crate::stripe::METADATA_USER_ID;

/// Receive a webhook delivery.
#[instrument(skip_all)]
pub async fn receive(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    let secret = state.config().stripe.webhook_secret.expose_secret();

    if let Err(err) = webhook::verify(signature, &body, secret, Utc::now().timestamp()) {
        tracing::warn!(error = %err, "Rejected webhook delivery");
        let message = match err {
            SignatureError::MissingHeader => "Missing Stripe signature",
            _ => "Invalid Stripe signature",
        };
        return Err(AppError::BadRequest(message.to_string()));
    }

    let event: Event = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid event payload: {e}")))?;
    tracing::info!(event_id = %event.id, kind = %event.kind, "Webhook received");

    match event.kind.as_str() {
        CHECKOUT_SESSION_COMPLETED | CHECKOUT_SESSION_ASYNC_PAYMENT_SUCCEEDED => {
            let session: CheckoutSessionObject = serde_json::from_value(event.data.object)
                .map_err(|e| AppError::BadRequest(format!("Invalid checkout session: {e}")))?;
            let consultation = session
                .consultation_id()
                .map_err(|raw| AppError::BadRequest(format!("Invalid consultation id: {raw}")))?;
            match consultation {
                Some(id) => record_consultation(&state, &session, id).await?,
                None => record_order(&state, &session).await?,
            }
        }
        PAYMENT_INTENT_FAILED => {
            tracing::warn!(event_id = %event.id, "Payment failed");
        }
        other => {
            tracing::debug!(kind = other, "Ignoring webhook event");
        }
    }

    Ok(Json(json!({ "received": true })))
}

/// Turn a paid checkout session into an order.
#[instrument(skip_all, fields(session_id = %session.id))]
async fn record_order(state: &AppState, session: &CheckoutSessionObject) -> Result<(), AppError> {
    if !session.is_paid() {
        tracing::info!(
            payment_status = session.payment_status.as_deref().unwrap_or("unknown"),
            "Checkout session not paid yet"
        );
        return Ok(());
    }

    let user_id = session
        .metadata
        .get(METADATA_USER_ID)
        .and_then(|v| v.parse::<i64>().ok())
        .map(UserId::new)
        .ok_or_else(|| AppError::BadRequest("Checkout session has no user".to_string()))?;
    let chunks = session.snapshot_chunks();
    if chunks.is_empty() {
        return Err(AppError::BadRequest(
            "Checkout session has no items".to_string(),
        ));
    }
    let snapshot = decode_snapshot(chunks)
        .map_err(|e| AppError::BadRequest(format!("Invalid item snapshot: {e}")))?;

    let lines = lines_from_snapshot(&snapshot, &state.catalog());
    if lines.is_empty() {
        return Err(AppError::BadRequest(
            "Checkout session has no items".to_string(),
        ));
    }
    let shipping = session
        .charged_shipping()
        .map_err(|raw| AppError::BadRequest(format!("Invalid shipping amount: {raw}")))?;
    let totals = match shipping {
        Some(shipping) => charged_totals(&lines, shipping)?,
        None => compute_totals(&lines, &state.config().shipping)?,
    };
    if let Some(charged) = session.amount_total
        && u64::try_from(charged).ok() != Some(totals.total.as_u64())
    {
        tracing::warn!(
            charged,
            computed = %totals.total,
            "Charged amount differs from computed total"
        );
    }

    let recorded = OrderRepository::new(state.pool())
        .create_from_checkout(&NewOrder {
            user_id,
            totals,
            lines,
            stripe_session_id: session.id.clone(),
            stripe_payment_intent_id: session.payment_intent.clone(),
            shipping_address: session.shipping_address(),
        })
        .await?;

    let order = match recorded {
        Recorded::Created(order) => order,
        Recorded::Duplicate(order_id) => {
            tracing::info!(order_id = %order_id, "Duplicate delivery, order already recorded");
            return Ok(());
        }
    };
    tracing::info!(order_id = %order.order.id, user_id = %user_id, total = %order.order.total, "Order created");

    let Some(profile) = ProfileRepository::new(state.pool()).get_by_id(user_id).await? else {
        tracing::warn!(user_id = %user_id, "Order owner has no profile, skipping confirmation");
        return Ok(());
    };

    let email = state.email().clone();
    tokio::spawn(async move {
        if let Err(e) = email
            .send_order_confirmation(
                profile.email.as_str(),
                profile.greeting_name(),
                &order,
            )
            .await
        {
            tracing::error!(order_id = %order.order.id, error = %e, "Failed to send order confirmation");
        }
    });

    Ok(())
}

/// Mark a consultation booking paid and confirm it to the customer.
#[instrument(skip_all, fields(session_id = %session.id, consultation_id = %id))]
async fn record_consultation(
    state: &AppState,
    session: &CheckoutSessionObject,
    id: ConsultationId,
) -> Result<(), AppError> {
    if !session.is_paid() {
        tracing::info!(
            payment_status = session.payment_status.as_deref().unwrap_or("unknown"),
            "Consultation session not paid yet"
        );
        return Ok(());
    }

    let marked = ConsultationRepository::new(state.pool())
        .mark_paid(id, &session.id, session.payment_intent.as_deref())
        .await?;
    let consultation = match marked {
        MarkedPaid::Paid(consultation) => consultation,
        MarkedPaid::AlreadyPaid(_) => {
            tracing::info!("Duplicate delivery, consultation already paid");
            return Ok(());
        }
    };
    tracing::info!("Consultation paid");

    let email = state.email().clone();
    tokio::spawn(async move {
        if let Err(e) = email.send_consultation_confirmation(&consultation).await {
            tracing::error!(consultation_id = %consultation.id, error = %e, "Failed to send consultation confirmation");
        }
    });

    Ok(())
}

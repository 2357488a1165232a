//! Pharmacist consultation booking.
//!
//! Booking needs no account. The form is stored as an unpaid `pending`
//! record first so the payment confirmation can find it by id; the webhook
//! marks it paid.

use axum::{Json, extract::State, http::StatusCode};
use chrono::Utc;
use serde::Serialize;
use tracing::instrument;

use exhale_core::ConsultationId;
use exhale_core::consultation::BookingForm;

use crate::db::ConsultationRepository;
use crate::error::{AppError, add_breadcrumb};
use crate::middleware::OptionalAuth;
use crate::state::AppState;
use crate::stripe::{ConsultationSessionParams, StripeError};

/// Hosted payment page for a new booking.
#[derive(Debug, Serialize)]
pub struct BookingResponse {
    pub consultation_id: ConsultationId,
    pub url: String,
}

/// Book a consultation and open its payment session.
#[instrument(skip(state, user, form))]
pub async fn book(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    Json(form): Json<BookingForm>,
) -> Result<(StatusCode, Json<BookingResponse>), AppError> {
    let booking = form.validate(Utc::now().date_naive())?;

    let repo = ConsultationRepository::new(state.pool());
    let consultation = repo.create(&booking, user.map(|u| u.id)).await?;
    tracing::info!(consultation_id = %consultation.id, "Consultation booked");

    let id = consultation.id.to_string();
    add_breadcrumb(
        "consultation",
        "Creating consultation payment session",
        Some(&[("consultation_id", id.as_str())]),
    );

    let params = ConsultationSessionParams::new(
        consultation.id,
        booking.email.as_str(),
        &state.config().base_url,
    );
    let session = state.stripe().create_consultation_session(&params).await?;
    repo.attach_session(consultation.id, &session.id).await?;

    let url = session.url.ok_or_else(|| {
        StripeError::Parse(format!("checkout session {} has no url", session.id))
    })?;

    Ok((
        StatusCode::CREATED,
        Json(BookingResponse {
            consultation_id: consultation.id,
            url,
        }),
    ))
}

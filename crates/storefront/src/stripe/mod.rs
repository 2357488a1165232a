//! Stripe Checkout client.
//!
//! Creates hosted Checkout Sessions with form-encoded `reqwest` calls and
//! verifies webhook deliveries ([`webhook`]). Only the two API surfaces the
//! storefront needs are modelled. Sessions are opened for product orders
//! ([`CheckoutSessionParams`]) and consultation bookings
//! ([`ConsultationSessionParams`]).
//!
//! # Example
//!
//! ```rust,ignore
//! let client = StripeClient::new(&config.stripe)?;
//! let plan = plan_checkout(lines, &config.shipping)?;
//! let session = client
//!     .create_checkout_session(&CheckoutSessionParams::new(&plan, user, &email, &base_url))
//!     .await?;
//! ```

pub mod webhook;

use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::instrument;

use exhale_core::checkout::CheckoutPlan;
use exhale_core::consultation::{
    CONSULTATION_FEE, CONSULTATION_LINE_DESCRIPTION, CONSULTATION_LINE_NAME,
};
use exhale_core::{ConsultationId, CurrencyCode, UserId};

use crate::config::StripeConfig;

/// Metadata key holding the buyer's profile id.
pub const METADATA_USER_ID: &str = "user_id";

/// Metadata key prefix of the `{id, qty, price}` line snapshot chunks.
pub const METADATA_ITEMS: &str = "items";

/// Metadata key holding the shipping charged, in cents.
pub const METADATA_SHIPPING: &str = "shipping";

/// Metadata key marking a consultation booking session.
pub const METADATA_CONSULTATION_ID: &str = "consultation_id";

/// Metadata key of the snapshot chunk at `index` (`items_0`, `items_1`, ...).
#[must_use]
pub fn snapshot_key(index: usize) -> String {
    format!("{METADATA_ITEMS}_{index}")
}

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Errors that can occur when calling Stripe.
#[derive(Debug, Error)]
pub enum StripeError {
    /// HTTP request failed (connection, timeout, TLS).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Stripe returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Rate limited by Stripe.
    #[error("Rate limited")]
    RateLimited,

    /// Response could not be understood.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// A created Checkout Session.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

/// Parameters for one Checkout Session.
#[derive(Debug, Clone)]
pub struct CheckoutSessionParams<'a> {
    pub plan: &'a CheckoutPlan,
    pub user_id: UserId,
    pub customer_email: &'a str,
    pub base_url: &'a str,
    pub currency: CurrencyCode,
}

impl<'a> CheckoutSessionParams<'a> {
    #[must_use]
    pub const fn new(
        plan: &'a CheckoutPlan,
        user_id: UserId,
        customer_email: &'a str,
        base_url: &'a str,
    ) -> Self {
        Self {
            plan,
            user_id,
            customer_email,
            base_url,
            currency: CurrencyCode::AUD,
        }
    }

    /// Form fields in Stripe's bracketed key syntax.
    #[must_use]
    pub fn to_form(&self) -> Vec<(String, String)> {
        let currency = self.currency.stripe_code();
        let mut form: Vec<(String, String)> = vec![
            ("mode".into(), "payment".into()),
            ("payment_method_types[0]".into(), "card".into()),
            (
                "success_url".into(),
                format!(
                    "{}/checkout/success?session_id={{CHECKOUT_SESSION_ID}}",
                    self.base_url
                ),
            ),
            ("cancel_url".into(), format!("{}/cart", self.base_url)),
            ("customer_email".into(), self.customer_email.to_string()),
            (
                "shipping_address_collection[allowed_countries][0]".into(),
                "AU".into(),
            ),
            (
                format!("metadata[{METADATA_USER_ID}]"),
                self.user_id.to_string(),
            ),
            (
                format!("metadata[{METADATA_SHIPPING}]"),
                self.plan.totals.shipping.as_u64().to_string(),
            ),
        ];

        for (i, chunk) in self.plan.snapshot.iter().enumerate() {
            form.push((format!("metadata[{}]", snapshot_key(i)), chunk.clone()));
        }

        for (i, line) in self.plan.payment_lines.iter().enumerate() {
            let prefix = format!("line_items[{i}]");
            form.push((
                format!("{prefix}[price_data][currency]"),
                currency.to_string(),
            ));
            form.push((
                format!("{prefix}[price_data][product_data][name]"),
                line.name.clone(),
            ));
            form.push((
                format!("{prefix}[price_data][unit_amount]"),
                line.unit_amount.as_u64().to_string(),
            ));
            form.push((format!("{prefix}[quantity]"), line.quantity.to_string()));
        }

        form
    }
}

/// Parameters for a consultation booking session.
#[derive(Debug, Clone)]
pub struct ConsultationSessionParams<'a> {
    pub consultation_id: ConsultationId,
    pub customer_email: &'a str,
    pub base_url: &'a str,
    pub currency: CurrencyCode,
}

impl<'a> ConsultationSessionParams<'a> {
    #[must_use]
    pub const fn new(
        consultation_id: ConsultationId,
        customer_email: &'a str,
        base_url: &'a str,
    ) -> Self {
        Self {
            consultation_id,
            customer_email,
            base_url,
            currency: CurrencyCode::AUD,
        }
    }

    /// Form fields for a single consultation line.
    #[must_use]
    pub fn to_form(&self) -> Vec<(String, String)> {
        vec![
            ("mode".into(), "payment".into()),
            ("payment_method_types[0]".into(), "card".into()),
            (
                "success_url".into(),
                format!(
                    "{}/book/success?session_id={{CHECKOUT_SESSION_ID}}",
                    self.base_url
                ),
            ),
            ("cancel_url".into(), format!("{}/book", self.base_url)),
            ("customer_email".into(), self.customer_email.to_string()),
            (
                format!("metadata[{METADATA_CONSULTATION_ID}]"),
                self.consultation_id.to_string(),
            ),
            (
                "line_items[0][price_data][currency]".into(),
                self.currency.stripe_code().to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]".into(),
                CONSULTATION_LINE_NAME.to_string(),
            ),
            (
                "line_items[0][price_data][product_data][description]".into(),
                CONSULTATION_LINE_DESCRIPTION.to_string(),
            ),
            (
                "line_items[0][price_data][unit_amount]".into(),
                CONSULTATION_FEE.as_u64().to_string(),
            ),
            ("line_items[0][quantity]".into(), "1".into()),
        ]
    }
}

/// Client for the Stripe API.
#[derive(Clone)]
pub struct StripeClient {
    inner: Arc<StripeClientInner>,
}

struct StripeClientInner {
    client: reqwest::Client,
    api_base: String,
    secret_key: SecretString,
}

impl StripeClient {
    /// Create a new Stripe client.
    ///
    /// # Errors
    ///
    /// Returns `StripeError::Http` if the HTTP client cannot be built.
    pub fn new(config: &StripeConfig) -> Result<Self, StripeError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            inner: Arc::new(StripeClientInner {
                client,
                api_base: config.api_base.clone(),
                secret_key: config.secret_key.clone(),
            }),
        })
    }

    /// Create a hosted Checkout Session.
    ///
    /// # Errors
    ///
    /// Returns `StripeError` if the request fails or Stripe rejects it.
    #[instrument(skip(self, params), fields(user_id = %params.user_id, total = %params.plan.totals.total))]
    pub async fn create_checkout_session(
        &self,
        params: &CheckoutSessionParams<'_>,
    ) -> Result<CheckoutSession, StripeError> {
        self.post_session(&params.to_form()).await
    }

    /// Create a hosted Checkout Session for a consultation booking.
    ///
    /// # Errors
    ///
    /// Returns `StripeError` if the request fails or Stripe rejects it.
    #[instrument(skip(self, params), fields(consultation_id = %params.consultation_id))]
    pub async fn create_consultation_session(
        &self,
        params: &ConsultationSessionParams<'_>,
    ) -> Result<CheckoutSession, StripeError> {
        self.post_session(&params.to_form()).await
    }

    async fn post_session(&self, form: &[(String, String)]) -> Result<CheckoutSession, StripeError> {
        let response = self
            .inner
            .client
            .post(format!("{}/v1/checkout/sessions", self.inner.api_base))
            .bearer_auth(self.inner.secret_key.expose_secret())
            .form(form)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(StripeError::RateLimited);
        }

        let body = response.text().await?;
        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorBody>(&body).map_or_else(
                |_| body.chars().take(200).collect(),
                |e| {
                    format!(
                        "{}: {}",
                        e.error.kind.unwrap_or_default(),
                        e.error.message.unwrap_or_default()
                    )
                },
            );
            return Err(StripeError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let session: CheckoutSession =
            serde_json::from_str(&body).map_err(|e| StripeError::Parse(e.to_string()))?;
        tracing::info!(session_id = %session.id, "Checkout session created");
        Ok(session)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use exhale_core::Cents;
    use exhale_core::catalog::ProductId;
    use exhale_core::checkout::{LineItem, ShippingPolicy, plan_checkout};

    use super::*;

    fn field<'a>(form: &'a [(String, String)], key: &str) -> Option<&'a str> {
        form.iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn plan(unit: u64, quantity: u32) -> CheckoutPlan {
        plan_checkout(
            vec![LineItem {
                product_id: ProductId::new("ntell-gum-4"),
                name: "Nicotine Gum 4mg".to_string(),
                unit_price: Cents::new(unit),
                quantity,
            }],
            &ShippingPolicy::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_form_includes_shipping_line_below_threshold() {
        let plan = plan(2995, 3);
        let params = CheckoutSessionParams::new(&plan, UserId::new(7), "sam@example.com", "https://exhale.health");
        let form = params.to_form();

        assert_eq!(field(&form, "mode"), Some("payment"));
        assert_eq!(field(&form, "line_items[0][price_data][unit_amount]"), Some("2995"));
        assert_eq!(field(&form, "line_items[0][quantity]"), Some("3"));
        assert_eq!(field(&form, "line_items[0][price_data][currency]"), Some("aud"));
        assert_eq!(
            field(&form, "line_items[1][price_data][product_data][name]"),
            Some("Standard Shipping (Australia Post)")
        );
        assert_eq!(field(&form, "line_items[1][price_data][unit_amount]"), Some("1290"));
        assert_eq!(field(&form, "metadata[user_id]"), Some("7"));
        assert_eq!(
            field(&form, "metadata[items_0]"),
            Some(r#"[{"id":"ntell-gum-4","qty":3,"price":2995}]"#)
        );
        assert!(field(&form, "metadata[items_1]").is_none());
        assert_eq!(field(&form, "metadata[shipping]"), Some("1290"));
        assert_eq!(
            field(&form, "success_url"),
            Some("https://exhale.health/checkout/success?session_id={CHECKOUT_SESSION_ID}")
        );
        assert_eq!(field(&form, "cancel_url"), Some("https://exhale.health/cart"));
    }

    #[test]
    fn test_form_omits_shipping_line_when_free() {
        let plan = plan(5000, 2);
        let params = CheckoutSessionParams::new(&plan, UserId::new(7), "sam@example.com", "https://exhale.health");
        let form = params.to_form();

        assert!(field(&form, "line_items[0][quantity]").is_some());
        assert!(field(&form, "line_items[1][quantity]").is_none());
        assert_eq!(field(&form, "metadata[shipping]"), Some("0"));
    }

    #[test]
    fn test_large_cart_spreads_snapshot_over_keys() {
        let lines: Vec<LineItem> = (0..14)
            .map(|i| LineItem {
                product_id: ProductId::new(format!("ntell-patch-{i}")),
                name: format!("Patch {i}"),
                unit_price: Cents::new(3299),
                quantity: 2,
            })
            .collect();
        let plan = plan_checkout(lines, &ShippingPolicy::default()).unwrap();
        let params = CheckoutSessionParams::new(&plan, UserId::new(7), "sam@example.com", "https://exhale.health");
        let form = params.to_form();

        let chunks: Vec<&str> = (0..plan.snapshot.len())
            .map(|i| field(&form, &format!("metadata[{}]", snapshot_key(i))).unwrap())
            .collect();
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.len() <= 500));
        assert!(field(&form, "metadata[items]").is_none());
        assert_eq!(chunks.concat(), plan.snapshot.concat());
    }

    #[test]
    fn test_consultation_form() {
        let params = ConsultationSessionParams::new(
            ConsultationId::new(31),
            "jordan@example.com",
            "https://exhale.health",
        );
        let form = params.to_form();

        assert_eq!(field(&form, "metadata[consultation_id]"), Some("31"));
        assert_eq!(field(&form, "line_items[0][price_data][unit_amount]"), Some("2995"));
        assert_eq!(field(&form, "line_items[0][quantity]"), Some("1"));
        assert_eq!(
            field(&form, "line_items[0][price_data][product_data][name]"),
            Some("Pharmacist Consultation")
        );
        assert!(field(&form, "line_items[1][quantity]").is_none());
        assert!(field(&form, "metadata[user_id]").is_none());
        assert_eq!(
            field(&form, "success_url"),
            Some("https://exhale.health/book/success?session_id={CHECKOUT_SESSION_ID}")
        );
        assert_eq!(field(&form, "cancel_url"), Some("https://exhale.health/book"));
        assert_eq!(field(&form, "customer_email"), Some("jordan@example.com"));
    }
}

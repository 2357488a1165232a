//! Stripe webhook verification and event payloads.
//!
//! The `Stripe-Signature` header has the form `t=<unix>,v1=<hex>[,v1=<hex>]`.
//! Each `v1` is an HMAC-SHA256 of `"{t}.{body}"` keyed with the endpoint
//! secret. Deliveries older than [`TOLERANCE_SECONDS`] are rejected.

use std::collections::HashMap;

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;

use exhale_core::order::ShippingAddress;
use exhale_core::{Cents, ConsultationId};

use super::{METADATA_CONSULTATION_ID, METADATA_SHIPPING, snapshot_key};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the signature.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Maximum accepted age (and clock skew) of a delivery.
pub const TOLERANCE_SECONDS: i64 = 300;

/// Event type for a finished Checkout Session.
pub const CHECKOUT_SESSION_COMPLETED: &str = "checkout.session.completed";

/// Event type for a delayed payment method that has now cleared.
pub const CHECKOUT_SESSION_ASYNC_PAYMENT_SUCCEEDED: &str =
    "checkout.session.async_payment_succeeded";

/// Event type for a failed payment attempt.
pub const PAYMENT_INTENT_FAILED: &str = "payment_intent.payment_failed";

/// Reasons a delivery is rejected as inauthentic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("missing Stripe-Signature header")]
    MissingHeader,

    #[error("malformed Stripe-Signature header")]
    Malformed,

    #[error("timestamp outside tolerance")]
    Expired,

    #[error("no signature matched")]
    Mismatch,
}

struct ParsedHeader<'a> {
    timestamp: i64,
    signatures: Vec<&'a str>,
}

fn parse_header(header: &str) -> Result<ParsedHeader<'_>, SignatureError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = value.parse::<i64>().ok(),
            "v1" => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
    if signatures.is_empty() {
        return Err(SignatureError::Malformed);
    }
    Ok(ParsedHeader {
        timestamp,
        signatures,
    })
}

/// Verify a delivery against the endpoint secret.
///
/// `now` is the current unix time in seconds.
///
/// # Errors
///
/// Returns [`SignatureError`] if the header is missing or malformed, the
/// timestamp is outside [`TOLERANCE_SECONDS`], or no `v1` signature matches.
pub fn verify(
    header: Option<&str>,
    payload: &[u8],
    secret: &str,
    now: i64,
) -> Result<(), SignatureError> {
    let header = header.ok_or(SignatureError::MissingHeader)?;
    let parsed = parse_header(header)?;

    let age = now.checked_sub(parsed.timestamp).map(i64::unsigned_abs);
    if !age.is_some_and(|age| age <= TOLERANCE_SECONDS.unsigned_abs()) {
        return Err(SignatureError::Expired);
    }

    let matched = parsed.signatures.iter().any(|candidate| {
        let Ok(expected) = hex::decode(candidate) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
            return false;
        };
        mac.update(parsed.timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        // verify_slice compares in constant time
        mac.verify_slice(&expected).is_ok()
    });

    if matched {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Build a `Stripe-Signature` header for a payload. Used to sign test deliveries.
#[must_use]
pub fn sign(payload: &[u8], secret: &str, timestamp: i64) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Some(format!(
        "t={timestamp},v1={}",
        hex::encode(mac.finalize().into_bytes())
    ))
}

/// A webhook event envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

/// The Checkout Session fields the order flow reads.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSessionObject {
    pub id: String,
    #[serde(default)]
    pub payment_intent: Option<String>,
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(default)]
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub customer_details: Option<CustomerDetails>,
    #[serde(default)]
    pub shipping_details: Option<ShippingDetails>,
}

impl CheckoutSessionObject {
    /// Whether funds have been captured for this session.
    #[must_use]
    pub fn is_paid(&self) -> bool {
        matches!(
            self.payment_status.as_deref(),
            Some("paid" | "no_payment_required")
        )
    }

    /// Snapshot chunks in key order, stopping at the first missing index.
    #[must_use]
    pub fn snapshot_chunks(&self) -> Vec<&str> {
        (0..)
            .map_while(|i| self.metadata.get(&snapshot_key(i)).map(String::as_str))
            .collect()
    }

    /// Shipping charged when the session was opened, if recorded.
    ///
    /// Returns `Err` with the raw value when it is present but unreadable.
    pub fn charged_shipping(&self) -> Result<Option<Cents>, &str> {
        self.metadata
            .get(METADATA_SHIPPING)
            .map(|raw| raw.parse::<u64>().map(Cents::new).map_err(|_| raw.as_str()))
            .transpose()
    }

    /// The consultation this session pays for, if it is a booking session.
    ///
    /// Returns `Err` with the raw value when it is present but unreadable.
    pub fn consultation_id(&self) -> Result<Option<ConsultationId>, &str> {
        self.metadata
            .get(METADATA_CONSULTATION_ID)
            .map(|raw| raw.parse::<ConsultationId>().map_err(|_| raw.as_str()))
            .transpose()
    }

    /// Delivery address, preferring collected shipping details.
    #[must_use]
    pub fn shipping_address(&self) -> Option<ShippingAddress> {
        if let Some(shipping) = &self.shipping_details {
            return shipping.address.to_shipping(shipping.name.as_deref());
        }
        let customer = self.customer_details.as_ref()?;
        customer.address.as_ref()?.to_shipping(customer.name.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomerDetails {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<StripeAddress>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShippingDetails {
    #[serde(default)]
    pub name: Option<String>,
    pub address: StripeAddress,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StripeAddress {
    #[serde(default)]
    pub line1: Option<String>,
    #[serde(default)]
    pub line2: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

impl StripeAddress {
    fn to_shipping(&self, name: Option<&str>) -> Option<ShippingAddress> {
        let line1 = self.line1.as_deref()?;
        let street_address = match self.line2.as_deref().filter(|l| !l.is_empty()) {
            Some(line2) => format!("{line1}, {line2}"),
            None => line1.to_string(),
        };
        Some(ShippingAddress {
            name: name.unwrap_or_default().to_string(),
            street_address,
            suburb: self.city.clone().unwrap_or_default(),
            state: self.state.clone().unwrap_or_default(),
            postcode: self.postal_code.clone().unwrap_or_default(),
            country: self.country.clone().unwrap_or_else(|| "AU".to_string()),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_Zq81nVx3";
    const NOW: i64 = 1_740_000_000;

    #[test]
    fn test_signed_payload_verifies() {
        let payload = br#"{"id":"evt_1"}"#;
        let header = sign(payload, SECRET, NOW).unwrap();
        assert_eq!(verify(Some(&header), payload, SECRET, NOW + 10), Ok(()));
    }

    #[test]
    fn test_missing_and_malformed_headers() {
        assert_eq!(
            verify(None, b"{}", SECRET, NOW),
            Err(SignatureError::MissingHeader)
        );
        assert_eq!(
            verify(Some("v1=abcd"), b"{}", SECRET, NOW),
            Err(SignatureError::Malformed)
        );
        assert_eq!(
            verify(Some(&format!("t={NOW}")), b"{}", SECRET, NOW),
            Err(SignatureError::Malformed)
        );
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let header = sign(br#"{"amount":100}"#, SECRET, NOW).unwrap();
        assert_eq!(
            verify(Some(&header), br#"{"amount":1}"#, SECRET, NOW),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let header = sign(b"{}", "whsec_other_Kd02", NOW).unwrap();
        assert_eq!(
            verify(Some(&header), b"{}", SECRET, NOW),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_stale_delivery_rejected() {
        let header = sign(b"{}", SECRET, NOW).unwrap();
        assert_eq!(
            verify(Some(&header), b"{}", SECRET, NOW + TOLERANCE_SECONDS + 1),
            Err(SignatureError::Expired)
        );
    }

    #[test]
    fn test_extreme_timestamps_rejected() {
        for timestamp in [i64::MIN, i64::MIN + 1, i64::MAX, -1] {
            let header = sign(b"{}", SECRET, timestamp).unwrap();
            assert_eq!(
                verify(Some(&header), b"{}", SECRET, NOW),
                Err(SignatureError::Expired),
                "t={timestamp}"
            );
        }
        let header = format!("t={},v1=00", i64::MIN);
        assert_eq!(
            verify(Some(&header), b"{}", SECRET, i64::MAX),
            Err(SignatureError::Expired)
        );
    }

    #[test]
    fn test_any_v1_may_match() {
        let good = sign(b"{}", SECRET, NOW).unwrap();
        let good_sig = good.split_once("v1=").unwrap().1;
        let header = format!("t={NOW},v1=deadbeef,v1={good_sig}");
        assert_eq!(verify(Some(&header), b"{}", SECRET, NOW), Ok(()));
    }

    #[test]
    fn test_checkout_session_parsing() {
        let event: Event = serde_json::from_str(
            r#"{
                "id": "evt_1",
                "type": "checkout.session.completed",
                "data": {"object": {
                    "id": "cs_test_1",
                    "payment_intent": "pi_1",
                    "payment_status": "paid",
                    "amount_total": 10275,
                    "metadata": {"user_id": "7", "items_0": "[{\"id\":\"a\",", "items_1": "\"qty\":1,\"price\":5}]", "shipping": "1290"},
                    "shipping_details": {
                        "name": "Sam Lee",
                        "address": {"line1": "1 George St", "line2": "Unit 4", "city": "Sydney",
                                    "state": "NSW", "postal_code": "2000", "country": "AU"}
                    }
                }}
            }"#,
        )
        .unwrap();
        assert_eq!(event.kind, CHECKOUT_SESSION_COMPLETED);

        let session: CheckoutSessionObject = serde_json::from_value(event.data.object).unwrap();
        assert!(session.is_paid());
        assert_eq!(session.metadata.get("user_id").map(String::as_str), Some("7"));
        assert_eq!(session.snapshot_chunks().concat(), r#"[{"id":"a","qty":1,"price":5}]"#);
        assert_eq!(session.charged_shipping(), Ok(Some(Cents::new(1290))));
        assert_eq!(session.consultation_id(), Ok(None));
        let address = session.shipping_address().unwrap();
        assert_eq!(address.street_address, "1 George St, Unit 4");
        assert_eq!(address.postcode, "2000");
        assert_eq!(address.name, "Sam Lee");
    }

    #[test]
    fn test_snapshot_chunks_stop_at_gap() {
        let session: CheckoutSessionObject = serde_json::from_str(
            r#"{"id":"cs_1","metadata":{"items_0":"[","items_2":"]","shipping":"x","consultation_id":"12"}}"#,
        )
        .unwrap();
        assert_eq!(session.snapshot_chunks(), vec!["["]);
        assert_eq!(session.charged_shipping(), Err("x"));
        assert_eq!(session.consultation_id(), Ok(Some(ConsultationId::new(12))));
    }

    #[test]
    fn test_unpaid_session() {
        let session: CheckoutSessionObject =
            serde_json::from_str(r#"{"id":"cs_1","payment_status":"unpaid"}"#).unwrap();
        assert!(!session.is_paid());
        assert!(session.shipping_address().is_none());
    }
}

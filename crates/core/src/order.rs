//! Order lifecycle.
//!
//! ```text
//! pending ─→ pharmacist_review ─→ dispensed ─→ shipped ─→ delivered
//!    └──────────────────────────────↗   (pending may skip review)
//! any non-terminal status ─→ cancelled
//! ```
//!
//! Orders are created by the payment confirmation webhook and only ever move
//! forward through [`Order::apply`]. There is no delete; cancelling sets a
//! status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::events::OrderStatusChanged;
use crate::types::{Cents, OrderId, OrderItemId, OrderStatus, UserId};

/// Errors from [`Order::apply`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("Cannot move order from {from} to {to}")]
    NotAllowed { from: OrderStatus, to: OrderStatus },

    #[error("A tracking number is required to mark an order as shipped")]
    TrackingRequired,

    #[error("A target status is required")]
    MissingStatus,
}

/// Whether `from → to` is a legal transition.
#[must_use]
pub const fn can_transition(from: OrderStatus, to: OrderStatus) -> bool {
    use OrderStatus::{Cancelled, Delivered, Dispensed, PharmacistReview, Pending, Shipped};
    matches!(
        (from, to),
        (Pending, PharmacistReview)
            | (Pending | PharmacistReview, Dispensed)
            | (Dispensed, Shipped)
            | (Shipped, Delivered)
            | (Pending | PharmacistReview | Dispensed | Shipped, Cancelled)
    )
}

/// Statuses reachable from `from`.
#[must_use]
pub fn next_statuses(from: OrderStatus) -> Vec<OrderStatus> {
    OrderStatus::ALL
        .iter()
        .copied()
        .filter(|to| can_transition(from, *to))
        .collect()
}

/// Delivery address captured when the order is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub name: String,
    pub street_address: String,
    pub suburb: String,
    pub state: String,
    pub postcode: String,
    #[serde(default = "default_country")]
    pub country: String,
}

fn default_country() -> String {
    "AU".to_string()
}

impl ShippingAddress {
    /// Single-line rendering for emails and the review console.
    #[must_use]
    pub fn one_line(&self) -> String {
        format!(
            "{}, {} {} {}",
            self.street_address, self.suburb, self.state, self.postcode
        )
    }
}

/// A server-owned order record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub subtotal: Cents,
    pub shipping_cost: Cents,
    pub total: Cents,
    pub stripe_session_id: Option<String>,
    pub stripe_payment_intent_id: Option<String>,
    pub shipping_address: Option<ShippingAddress>,
    pub tracking_number: Option<String>,
    pub pharmacist_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub shipped_at: Option<DateTime<Utc>>,
}

/// One purchased line, priced at the time of purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: String,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Cents,
}

impl OrderItem {
    /// `unit_price × quantity`, saturating.
    #[must_use]
    pub const fn line_total(&self) -> Cents {
        self.unit_price.saturating_mul(self.quantity)
    }
}

/// A staff request to move an order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct StatusUpdate {
    pub status: Option<OrderStatus>,
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl StatusUpdate {
    #[must_use]
    pub const fn to(status: OrderStatus) -> Self {
        Self {
            status: Some(status),
            tracking_number: None,
            notes: None,
        }
    }

    #[must_use]
    pub fn with_tracking(mut self, tracking_number: impl Into<String>) -> Self {
        self.tracking_number = Some(tracking_number.into());
        self
    }

    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}

impl Order {
    /// Apply a status change.
    ///
    /// On success the status, notes, tracking number, shipped time and
    /// updated time change together and the resulting event is returned. On
    /// error the order is left untouched.
    ///
    /// Notes replace any previous notes. A tracking number is only recorded
    /// on the move to `shipped`, where it is mandatory.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::NotAllowed`] for an illegal target,
    /// [`TransitionError::MissingStatus`] when no target is given and
    /// [`TransitionError::TrackingRequired`] when shipping without a tracking
    /// number.
    pub fn apply(
        &mut self,
        update: &StatusUpdate,
        now: DateTime<Utc>,
    ) -> Result<OrderStatusChanged, TransitionError> {
        let from = self.status;
        let to = update.status.ok_or(TransitionError::MissingStatus)?;
        if !can_transition(from, to) {
            return Err(TransitionError::NotAllowed { from, to });
        }

        let tracking = non_blank(update.tracking_number.as_deref());
        if to == OrderStatus::Shipped {
            let Some(tracking) = tracking.clone() else {
                return Err(TransitionError::TrackingRequired);
            };
            self.tracking_number = Some(tracking);
            self.shipped_at = Some(now);
        }
        if let Some(notes) = non_blank(update.notes.as_deref()) {
            self.pharmacist_notes = Some(notes);
        }
        self.status = to;
        self.updated_at = now;

        Ok(OrderStatusChanged {
            order: self.id,
            user: self.user_id,
            from,
            to,
            tracking_number: if to == OrderStatus::Shipped {
                tracking
            } else {
                None
            },
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn order(status: OrderStatus) -> Order {
        let created = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        Order {
            id: OrderId::new(10),
            user_id: UserId::new(3),
            status,
            subtotal: Cents::new(8985),
            shipping_cost: Cents::new(1290),
            total: Cents::new(10275),
            stripe_session_id: Some("cs_test_1".to_string()),
            stripe_payment_intent_id: None,
            shipping_address: None,
            tracking_number: None,
            pharmacist_notes: Some("first look".to_string()),
            created_at: created,
            updated_at: created,
            shipped_at: None,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 2, 12, 30, 0).unwrap()
    }

    #[test]
    fn test_transition_table() {
        use OrderStatus::*;
        let allowed = [
            (Pending, PharmacistReview),
            (Pending, Dispensed),
            (PharmacistReview, Dispensed),
            (Dispensed, Shipped),
            (Shipped, Delivered),
            (Pending, Cancelled),
            (PharmacistReview, Cancelled),
            (Dispensed, Cancelled),
            (Shipped, Cancelled),
        ];
        for from in OrderStatus::ALL {
            for to in OrderStatus::ALL {
                assert_eq!(
                    can_transition(*from, *to),
                    allowed.contains(&(*from, *to)),
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        assert!(next_statuses(OrderStatus::Delivered).is_empty());
        assert!(next_statuses(OrderStatus::Cancelled).is_empty());
    }

    #[test]
    fn test_rejected_transition_leaves_order_untouched() {
        for (from, to) in [
            (OrderStatus::Delivered, OrderStatus::PharmacistReview),
            (OrderStatus::Cancelled, OrderStatus::Shipped),
            (OrderStatus::Dispensed, OrderStatus::Dispensed),
            (OrderStatus::Delivered, OrderStatus::Cancelled),
        ] {
            let mut o = order(from);
            let before = o.clone();
            let err = o
                .apply(&StatusUpdate::to(to).with_tracking("AP123").with_notes("x"), now())
                .unwrap_err();
            assert_eq!(err, TransitionError::NotAllowed { from, to });
            assert_eq!(o, before);
        }
    }

    #[test]
    fn test_missing_target_rejected() {
        let mut o = order(OrderStatus::Pending);
        assert_eq!(
            o.apply(&StatusUpdate::default(), now()),
            Err(TransitionError::MissingStatus)
        );
        assert_eq!(o.status, OrderStatus::Pending);
    }

    #[test]
    fn test_shipping_requires_tracking() {
        let mut o = order(OrderStatus::Dispensed);
        let before = o.clone();
        for tracking in [None, Some("   ")] {
            let mut update = StatusUpdate::to(OrderStatus::Shipped);
            update.tracking_number = tracking.map(ToString::to_string);
            assert_eq!(o.apply(&update, now()), Err(TransitionError::TrackingRequired));
            assert_eq!(o, before);
        }
    }

    #[test]
    fn test_shipping_records_tracking_and_time() {
        let mut o = order(OrderStatus::Dispensed);
        let event = o
            .apply(
                &StatusUpdate::to(OrderStatus::Shipped).with_tracking(" 33AB0001 "),
                now(),
            )
            .unwrap();
        assert_eq!(o.status, OrderStatus::Shipped);
        assert_eq!(o.tracking_number.as_deref(), Some("33AB0001"));
        assert_eq!(o.shipped_at, Some(now()));
        assert_eq!(o.updated_at, now());
        assert_eq!(event.from, OrderStatus::Dispensed);
        assert_eq!(event.to, OrderStatus::Shipped);
        assert_eq!(event.tracking_number.as_deref(), Some("33AB0001"));
        assert_eq!(event.user, UserId::new(3));
    }

    #[test]
    fn test_notes_overwrite() {
        let mut o = order(OrderStatus::PharmacistReview);
        o.apply(
            &StatusUpdate::to(OrderStatus::Dispensed).with_notes("checked interactions"),
            now(),
        )
        .unwrap();
        assert_eq!(o.pharmacist_notes.as_deref(), Some("checked interactions"));

        o.apply(&StatusUpdate::to(OrderStatus::Cancelled), now())
            .unwrap();
        assert_eq!(o.pharmacist_notes.as_deref(), Some("checked interactions"));
    }

    #[test]
    fn test_tracking_ignored_before_shipping() {
        let mut o = order(OrderStatus::Pending);
        let event = o
            .apply(
                &StatusUpdate::to(OrderStatus::PharmacistReview).with_tracking("early"),
                now(),
            )
            .unwrap();
        assert!(o.tracking_number.is_none());
        assert!(event.tracking_number.is_none());
    }

    #[test]
    fn test_status_update_deserializes() {
        let update: StatusUpdate =
            serde_json::from_str(r#"{"status":"shipped","tracking_number":"AP1"}"#).unwrap();
        assert_eq!(update.status, Some(OrderStatus::Shipped));
        assert_eq!(update.tracking_number.as_deref(), Some("AP1"));
        assert!(update.notes.is_none());
    }

    #[test]
    fn test_address_one_line() {
        let address = ShippingAddress {
            name: "Sam Lee".to_string(),
            street_address: "1 George St".to_string(),
            suburb: "Sydney".to_string(),
            state: "NSW".to_string(),
            postcode: "2000".to_string(),
            country: default_country(),
        };
        assert_eq!(address.one_line(), "1 George St, Sydney NSW 2000");
    }
}

//! Domain events.
//!
//! State machines return an event for every accepted change. Handlers hand
//! the event to a notifier after the change is persisted; a failed
//! notification never undoes the change.

use serde::{Deserialize, Serialize};

use crate::types::{AssessmentId, AssessmentStatus, Cents, OrderId, OrderStatus, UserId};

/// A paid order was recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPlaced {
    pub order: OrderId,
    pub user: UserId,
    pub total: Cents,
    pub item_count: u32,
}

/// An order moved between two statuses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusChanged {
    pub order: OrderId,
    pub user: UserId,
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub tracking_number: Option<String>,
}

/// A pharmacist decided on an assessment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentReviewed {
    pub assessment: AssessmentId,
    pub user: UserId,
    pub decision: AssessmentStatus,
    pub reason: Option<String>,
}

/// Any event a notifier may act on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    OrderPlaced(OrderPlaced),
    OrderStatusChanged(OrderStatusChanged),
    AssessmentReviewed(AssessmentReviewed),
}

impl DomainEvent {
    /// The profile the event concerns.
    #[must_use]
    pub const fn user(&self) -> UserId {
        match self {
            Self::OrderPlaced(e) => e.user,
            Self::OrderStatusChanged(e) => e.user,
            Self::AssessmentReviewed(e) => e.user,
        }
    }

    /// Whether the customer should be told about this event.
    ///
    /// Internal steps (`pharmacist_review`, `dispensed`, `delivered`) are not
    /// announced.
    #[must_use]
    pub const fn is_customer_facing(&self) -> bool {
        match self {
            Self::OrderPlaced(_) | Self::AssessmentReviewed(_) => true,
            Self::OrderStatusChanged(e) => {
                matches!(e.to, OrderStatus::Shipped | OrderStatus::Cancelled)
            }
        }
    }
}

impl From<OrderPlaced> for DomainEvent {
    fn from(event: OrderPlaced) -> Self {
        Self::OrderPlaced(event)
    }
}

impl From<OrderStatusChanged> for DomainEvent {
    fn from(event: OrderStatusChanged) -> Self {
        Self::OrderStatusChanged(event)
    }
}

impl From<AssessmentReviewed> for DomainEvent {
    fn from(event: AssessmentReviewed) -> Self {
        Self::AssessmentReviewed(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn changed(to: OrderStatus) -> DomainEvent {
        OrderStatusChanged {
            order: OrderId::new(1),
            user: UserId::new(2),
            from: OrderStatus::PharmacistReview,
            to,
            tracking_number: None,
        }
        .into()
    }

    #[test]
    fn test_customer_facing_transitions() {
        assert!(changed(OrderStatus::Shipped).is_customer_facing());
        assert!(changed(OrderStatus::Cancelled).is_customer_facing());
        assert!(!changed(OrderStatus::Dispensed).is_customer_facing());
        assert!(!changed(OrderStatus::Delivered).is_customer_facing());
    }

    #[test]
    fn test_user_is_exposed() {
        assert_eq!(changed(OrderStatus::Shipped).user(), UserId::new(2));
    }
}

//! Order and assessment decisions, from state machine to customer email.

#![allow(clippy::unwrap_used)]

use chrono::{TimeZone, Utc};
use exhale_admin::models::Customer;
use exhale_admin::services::Notifier;
use exhale_admin::services::notifier::Context;
use exhale_core::assessment::{Assessment, Decision, Intake, ReviewRequest};
use exhale_core::events::DomainEvent;
use exhale_core::order::{Order, StatusUpdate, TransitionError, next_statuses};
use exhale_core::{
    AccessStatus, AssessmentId, AssessmentStatus, Cents, Email, OrderId, OrderStatus, UserId,
};

fn paid_order() -> Order {
    let placed = Utc.with_ymd_and_hms(2025, 4, 2, 10, 30, 0).unwrap();
    Order {
        id: OrderId::new(501),
        user_id: UserId::new(77),
        status: OrderStatus::PharmacistReview,
        subtotal: Cents::new(9397),
        shipping_cost: Cents::new(1290),
        total: Cents::new(10687),
        stripe_session_id: Some("cs_test_a1b2c3".to_string()),
        stripe_payment_intent_id: Some("pi_3PxYz".to_string()),
        shipping_address: None,
        tracking_number: None,
        pharmacist_notes: None,
        created_at: placed,
        updated_at: placed,
        shipped_at: None,
    }
}

fn submitted_assessment() -> Assessment {
    Assessment {
        id: AssessmentId::new(31),
        user_id: UserId::new(77),
        intake: Intake {
            smoking_years: 12,
            cigarettes_per_day: 15,
            previous_quit_attempts: Some("patches twice".to_string()),
            current_nicotine_use: None,
            health_conditions: Vec::new(),
            medications: None,
            pregnancy_status: false,
            cardiovascular_conditions: false,
            quit_motivation: Some("my kids".to_string()),
            flavour_preference: Some("Mint".to_string()),
        },
        status: AssessmentStatus::Submitted,
        pharmacist_notes: None,
        decline_reason: None,
        reviewed_by: None,
        reviewed_at: None,
        created_at: Utc.with_ymd_and_hms(2025, 4, 1, 8, 0, 0).unwrap(),
    }
}

fn customer() -> Customer {
    Customer {
        id: UserId::new(77),
        email: Email::parse("jordan@example.com").unwrap(),
        first_name: Some("Jordan".to_string()),
        last_name: None,
    }
}

fn notifier() -> Notifier {
    Notifier::log_only("https://exhale.example")
}

#[test]
fn test_order_walks_to_delivered() {
    let mut order = paid_order();
    let later = order.created_at + chrono::Duration::hours(4);

    order
        .apply(&StatusUpdate::to(OrderStatus::Dispensed), later)
        .unwrap();
    assert_eq!(next_statuses(order.status), [OrderStatus::Shipped, OrderStatus::Cancelled]);

    let shipped = order
        .apply(
            &StatusUpdate::to(OrderStatus::Shipped).with_tracking("  33QWE123456  "),
            later,
        )
        .unwrap();
    assert_eq!(shipped.tracking_number.as_deref(), Some("33QWE123456"));
    assert_eq!(order.shipped_at, Some(later));

    order
        .apply(&StatusUpdate::to(OrderStatus::Delivered), later)
        .unwrap();
    assert!(next_statuses(order.status).is_empty());
    assert_eq!(order.tracking_number.as_deref(), Some("33QWE123456"));
}

#[test]
fn test_rejected_changes_leave_the_order_alone() {
    let mut order = paid_order();
    let before = order.clone();
    let now = Utc::now();

    assert_eq!(
        order.apply(&StatusUpdate::to(OrderStatus::Delivered), now),
        Err(TransitionError::NotAllowed {
            from: OrderStatus::PharmacistReview,
            to: OrderStatus::Delivered,
        })
    );
    assert_eq!(
        order.apply(&StatusUpdate::to(OrderStatus::Pending), now),
        Err(TransitionError::NotAllowed {
            from: OrderStatus::PharmacistReview,
            to: OrderStatus::Pending,
        })
    );
    assert_eq!(order, before);

    order
        .apply(&StatusUpdate::to(OrderStatus::Dispensed), now)
        .unwrap();
    let dispensed = order.clone();
    assert_eq!(
        order.apply(
            &StatusUpdate::to(OrderStatus::Shipped).with_tracking("   "),
            now
        ),
        Err(TransitionError::TrackingRequired)
    );
    assert_eq!(order, dispensed);
}

#[test]
fn test_shipping_email_links_tracking() {
    let mut order = paid_order();
    let now = Utc::now();
    order
        .apply(&StatusUpdate::to(OrderStatus::Dispensed), now)
        .unwrap();
    let event: DomainEvent = order
        .apply(
            &StatusUpdate::to(OrderStatus::Shipped).with_tracking("33QWE123456"),
            now,
        )
        .unwrap()
        .into();
    assert!(event.is_customer_facing());

    let email = notifier()
        .render(&event, &customer(), &Context::default())
        .unwrap()
        .unwrap();
    assert!(email.text.contains("Jordan"));
    assert!(
        email
            .text
            .contains("https://auspost.com.au/mypost/track/#/details/33QWE123456")
    );
    assert!(email.html.contains("33QWE123456"));
}

#[test]
fn test_cancellation_email_carries_notes() {
    let mut order = paid_order();
    let cancel =
        StatusUpdate::to(OrderStatus::Cancelled).with_notes("Interacts with current medication");
    let changed = order.apply(&cancel, Utc::now()).unwrap();

    let email = notifier()
        .render(&changed.into(), &customer(), &Context::for_update(&cancel))
        .unwrap()
        .unwrap();
    assert!(email.text.contains("Interacts with current medication"));
}

#[test]
fn test_earlier_internal_notes_stay_out_of_cancellation() {
    let mut order = paid_order();
    order
        .apply(
            &StatusUpdate::to(OrderStatus::Dispensed).with_notes("Verify prescriber number before release"),
            Utc::now(),
        )
        .unwrap();

    let cancel = StatusUpdate::to(OrderStatus::Cancelled);
    let changed = order.apply(&cancel, Utc::now()).unwrap();
    assert_eq!(
        order.pharmacist_notes.as_deref(),
        Some("Verify prescriber number before release")
    );

    let email = notifier()
        .render(&changed.into(), &customer(), &Context::for_update(&cancel))
        .unwrap()
        .unwrap();
    assert!(!email.text.contains("prescriber number"));
    assert!(!email.html.contains("prescriber number"));
}

#[test]
fn test_internal_moves_send_nothing() {
    let mut order = paid_order();
    let event: DomainEvent = order
        .apply(&StatusUpdate::to(OrderStatus::Dispensed), Utc::now())
        .unwrap()
        .into();
    assert!(!event.is_customer_facing());
    assert!(notifier().dispatch(event, customer(), Context::default()).is_none());
}

#[test]
fn test_decline_needs_reason_and_is_final() {
    let mut assessment = submitted_assessment();
    let reviewer = UserId::new(2);
    let decline = ReviewRequest {
        decision: Decision::Decline,
        reason: None,
        notes: None,
    };
    assert!(assessment.review(reviewer, &decline, Utc::now()).is_err());
    assert_eq!(assessment.status, AssessmentStatus::Submitted);

    let decline = ReviewRequest {
        reason: Some("Unmanaged cardiovascular condition".to_string()),
        ..decline
    };
    let reviewed = assessment.review(reviewer, &decline, Utc::now()).unwrap();
    assert_eq!(AccessStatus::from(reviewed.decision), AccessStatus::Declined);
    assert!(assessment.review(reviewer, &decline, Utc::now()).is_err());

    let email = notifier()
        .render(&reviewed.into(), &customer(), &Context::default())
        .unwrap()
        .unwrap();
    assert!(email.text.contains("Unmanaged cardiovascular condition"));
}

#[test]
fn test_approval_opens_the_gated_catalog() {
    let mut assessment = submitted_assessment();
    let approve = ReviewRequest {
        decision: Decision::Approve,
        reason: None,
        notes: Some("Suitable for 20mg pods".to_string()),
    };
    let reviewed = assessment
        .review(UserId::new(2), &approve, Utc::now())
        .unwrap();

    let access = AccessStatus::from(reviewed.decision);
    assert!(access.grants_gated_access());
    assert!(
        exhale_core::catalog::Catalog::standard()
            .visible_to(access)
            .any(|p| p.id == "lana-device")
    );

    let email = notifier()
        .render(&reviewed.into(), &customer(), &Context::default())
        .unwrap()
        .unwrap();
    assert!(email.text.contains("https://exhale.example/products"));
}

#[test]
fn test_orders_cannot_be_deleted_in_storage() {
    let migration = include_str!("../../../migrations/20250301000003_orders.sql");
    assert!(migration.contains("BEFORE DELETE ON orders"));
    assert!(migration.contains("BEFORE DELETE ON order_items"));
}

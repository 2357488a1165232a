//! Storefront and console against one real database.
//!
//! Ignored by default. Run against a migrated database:
//!
//! ```bash
//! DATABASE_URL=postgres://localhost/exhale_test cargo test -p exhale-integration-tests -- --ignored
//! ```

#![allow(clippy::unwrap_used)]

use chrono::Utc;
use exhale_admin::db::{
    AssessmentRepository as ReviewQueue, ConsultationRepository as Scheduling, GuardedError,
    OrderRepository as Fulfilment, StaffRepository,
};
use exhale_core::assessment::{Decision, IntakeForm, ReviewRequest};
use exhale_core::catalog::Catalog;
use exhale_core::checkout::{RequestedItem, ShippingPolicy, compute_totals, price_items};
use exhale_core::consultation::{BookingForm, ScheduleError, ScheduleUpdate};
use exhale_core::order::{StatusUpdate, TransitionError};
use exhale_core::{AccessStatus, ConsultationStatus, Email, OrderStatus, PaymentStatus};
use exhale_integration_tests::live_pool;
use exhale_storefront::db::{
    AssessmentRepository, ConsultationRepository, MarkedPaid, NewOrder, OrderRepository,
    ProfileRepository, Recorded,
};
use sqlx::PgPool;

fn unique_email(prefix: &str) -> Email {
    Email::parse(&format!("{prefix}-{}@example.com", uuid::Uuid::new_v4().simple())).unwrap()
}

async fn customer(pool: &PgPool) -> exhale_core::UserId {
    ProfileRepository::new(pool)
        .create_with_password(&unique_email("customer"), "$argon2id$v=19$placeholder")
        .await
        .unwrap()
        .id
}

#[tokio::test]
#[ignore = "needs DATABASE_URL pointing at a migrated database"]
async fn test_approval_reaches_the_storefront() {
    let pool = live_pool().await;
    let user = customer(&pool).await;
    let reviewer = StaffRepository::new(&pool)
        .create(&unique_email("pharmacist"), "$argon2id$v=19$placeholder", Some("Priya"))
        .await
        .unwrap();

    let intake = IntakeForm {
        smoking_years: Some(8),
        cigarettes_per_day: Some(10),
        ..IntakeForm::default()
    }
    .validate()
    .unwrap();
    let submitted = AssessmentRepository::new(&pool)
        .submit(user, &intake)
        .await
        .unwrap();
    assert_eq!(
        ProfileRepository::new(&pool).access_status(user).await.unwrap(),
        AccessStatus::Pending
    );

    let approve = ReviewRequest {
        decision: Decision::Approve,
        reason: None,
        notes: None,
    };
    let (_, event) = ReviewQueue::new(&pool)
        .review(submitted.id, reviewer.id, &approve, Utc::now())
        .await
        .unwrap();
    assert_eq!(event.user, user);
    assert_eq!(
        ProfileRepository::new(&pool).access_status(user).await.unwrap(),
        AccessStatus::Approved
    );

    let again = ReviewQueue::new(&pool)
        .review(submitted.id, reviewer.id, &approve, Utc::now())
        .await;
    assert!(matches!(again, Err(GuardedError::Rejected(_))));
}

#[tokio::test]
#[ignore = "needs DATABASE_URL pointing at a migrated database"]
async fn test_webhook_order_is_recorded_once_and_kept() {
    let pool = live_pool().await;
    let user = customer(&pool).await;

    let lines = price_items(
        &[RequestedItem {
            product_id: "ntell-patch-14".to_string(),
            name: "Patch".to_string(),
            price: 0,
            quantity: 2,
        }],
        &Catalog::standard(),
        AccessStatus::None,
    )
    .unwrap();
    let new = NewOrder {
        user_id: user,
        totals: compute_totals(&lines, &ShippingPolicy::default()).unwrap(),
        lines,
        stripe_session_id: format!("cs_test_{}", uuid::Uuid::new_v4().simple()),
        stripe_payment_intent_id: None,
        shipping_address: None,
    };

    let orders = OrderRepository::new(&pool);
    let Recorded::Created(created) = orders.create_from_checkout(&new).await.unwrap() else {
        panic!("first delivery should create the order");
    };
    assert_eq!(created.order.status, OrderStatus::PharmacistReview);
    assert_eq!(created.items.len(), 1);

    let Recorded::Duplicate(id) = orders.create_from_checkout(&new).await.unwrap() else {
        panic!("second delivery should be a duplicate");
    };
    assert_eq!(id, created.order.id);

    let fulfilment = Fulfilment::new(&pool);
    fulfilment
        .update_status(id, &StatusUpdate::to(OrderStatus::Dispensed), Utc::now())
        .await
        .unwrap();
    let missing_tracking = fulfilment
        .update_status(id, &StatusUpdate::to(OrderStatus::Shipped), Utc::now())
        .await;
    assert!(matches!(
        missing_tracking,
        Err(GuardedError::Rejected(TransitionError::TrackingRequired))
    ));
    let detail = fulfilment.get(id).await.unwrap().unwrap();
    assert_eq!(detail.order.status, OrderStatus::Dispensed);

    let deleted = sqlx::query("DELETE FROM orders WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await;
    assert!(deleted.is_err());
}

#[tokio::test]
#[ignore = "needs DATABASE_URL pointing at a migrated database"]
async fn test_consultation_paid_once_then_scheduled() {
    let pool = live_pool().await;
    let booking = BookingForm {
        first_name: Some("Jordan".to_string()),
        last_name: Some("Reyes".to_string()),
        email: Some(unique_email("booking").to_string()),
        phone: Some("0412 345 678".to_string()),
        smoking_status: Some("smoker".to_string()),
        years_using: Some("10-20".to_string()),
        daily_usage: Some("10-20".to_string()),
        ..BookingForm::default()
    }
    .validate(Utc::now().date_naive())
    .unwrap();

    let bookings = ConsultationRepository::new(&pool);
    let created = bookings.create(&booking, None).await.unwrap();
    assert_eq!(created.status, ConsultationStatus::Pending);
    assert_eq!(created.payment_status, PaymentStatus::Unpaid);

    let scheduling = Scheduling::new(&pool);
    let at = Utc::now() + chrono::Duration::days(1);
    let early = scheduling
        .update(
            created.id,
            &ScheduleUpdate {
                status: ConsultationStatus::Scheduled,
                scheduled_at: Some(at),
            },
        )
        .await;
    assert!(matches!(early, Err(GuardedError::Rejected(ScheduleError::Unpaid))));

    let session_id = format!("cs_test_{}", uuid::Uuid::new_v4().simple());
    bookings.attach_session(created.id, &session_id).await.unwrap();
    let MarkedPaid::Paid(paid) = bookings
        .mark_paid(created.id, &session_id, Some("pi_consult"))
        .await
        .unwrap()
    else {
        panic!("first delivery should mark the booking paid");
    };
    assert_eq!(paid.payment_status, PaymentStatus::Paid);
    assert!(matches!(
        bookings.mark_paid(created.id, &session_id, Some("pi_consult")).await.unwrap(),
        MarkedPaid::AlreadyPaid(_)
    ));

    let scheduled = scheduling
        .update(
            created.id,
            &ScheduleUpdate {
                status: ConsultationStatus::Scheduled,
                scheduled_at: Some(at),
            },
        )
        .await
        .unwrap();
    assert_eq!(scheduled.status, ConsultationStatus::Scheduled);
    assert!(scheduled.scheduled_at.is_some());
}

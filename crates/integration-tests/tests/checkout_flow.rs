//! Cart to checkout to webhook, through the shared pricing rules.
//!
//! The cart, the checkout plan and the order written by the webhook must
//! agree on every amount.

#![allow(clippy::unwrap_used)]

use std::collections::HashMap;

use exhale_core::cart::{CartStore, MemoryCartStorage};
use exhale_core::catalog::Catalog;
use exhale_core::checkout::{
    CheckoutError, RequestedItem, ShippingPolicy, charged_totals, compute_totals,
    decode_snapshot, lines_from_snapshot, plan_checkout, price_items,
};
use exhale_core::{AccessStatus, Cents, UserId};
use exhale_storefront::stripe::CheckoutSessionParams;
use exhale_storefront::stripe::webhook::CheckoutSessionObject;

/// The session Stripe echoes back: the metadata sent in the create form.
fn echoed_session(form: &[(String, String)]) -> CheckoutSessionObject {
    let metadata: HashMap<String, String> = form
        .iter()
        .filter_map(|(key, value)| {
            key.strip_prefix("metadata[")
                .and_then(|k| k.strip_suffix(']'))
                .map(|k| (k.to_string(), value.clone()))
        })
        .collect();
    serde_json::from_value(serde_json::json!({
        "id": "cs_test_echo",
        "payment_status": "paid",
        "metadata": metadata,
    }))
    .unwrap()
}

fn item(product_id: &str, quantity: i64) -> RequestedItem {
    RequestedItem {
        product_id: product_id.to_string(),
        name: product_id.to_string(),
        price: 1,
        quantity,
    }
}

#[test]
fn test_client_prices_are_ignored() {
    let lines = price_items(
        &[item("ntell-gum-mint-4", 2), item("ntell-loz-mint-2", 1)],
        &Catalog::standard(),
        AccessStatus::None,
    )
    .unwrap();
    let totals = compute_totals(&lines, &ShippingPolicy::default()).unwrap();

    // 3699 × 2 + 1999
    assert_eq!(totals.subtotal, Cents::new(9397));
    assert_eq!(totals.shipping, Cents::new(1290));
    assert_eq!(totals.total, Cents::new(10687));
}

#[test]
fn test_free_shipping_at_threshold() {
    let policy = ShippingPolicy::default();
    let lines = price_items(
        &[
            item("ntell-gum-mint-4", 2),
            item("ntell-loz-mint-2", 1),
            item("ntell-patch-7", 1),
        ],
        &Catalog::standard(),
        AccessStatus::None,
    )
    .unwrap();
    let totals = compute_totals(&lines, &policy).unwrap();
    assert_eq!(totals.subtotal, Cents::new(12296));
    assert_eq!(totals.shipping, Cents::ZERO);
    assert_eq!(totals.total, totals.subtotal);
}

#[test]
fn test_total_never_drops_when_items_are_added() {
    let policy = ShippingPolicy::default();
    let catalog = Catalog::standard();
    let mut requested = Vec::new();
    let mut previous = Cents::ZERO;

    for product in catalog.visible_to(AccessStatus::None) {
        requested.push(item(product.id, 1));
        let lines = price_items(&requested, &catalog, AccessStatus::None).unwrap();
        let totals = compute_totals(&lines, &policy).unwrap();
        assert!(totals.subtotal > previous);
        assert_eq!(
            totals.total.as_u64(),
            totals.subtotal.as_u64() + totals.shipping.as_u64()
        );
        previous = totals.subtotal;
    }
}

#[test]
fn test_gated_items_need_approval() {
    let catalog = Catalog::standard();
    let requested = [item("lana-starter-bundle", 1)];

    for access in [AccessStatus::None, AccessStatus::Pending, AccessStatus::Declined] {
        assert!(matches!(
            price_items(&requested, &catalog, access),
            Err(CheckoutError::RequiresAssessment(_))
        ));
    }
    assert!(price_items(&requested, &catalog, AccessStatus::Approved).is_ok());
}

#[tokio::test]
async fn test_cart_plan_and_webhook_agree() {
    let policy = ShippingPolicy::default();
    let catalog = Catalog::standard();
    let storage = MemoryCartStorage::new();

    let mut cart = CartStore::load(storage.clone(), catalog)
        .await
        .unwrap()
        .with_access(AccessStatus::Approved);
    cart.add("lana-mint-20", 2).await.unwrap();
    cart.add("lana-device", 1).await.unwrap();
    cart.add("ntell-patch-21", 1).await.unwrap();
    let summary = cart.summary(&policy);

    let plan = plan_checkout(cart.line_items(), &policy).unwrap();
    assert_eq!(plan.totals, summary.totals);

    // What the webhook rebuilds from session metadata.
    let snapshot = decode_snapshot(plan.snapshot.iter().map(String::as_str)).unwrap();
    let rebuilt = lines_from_snapshot(&snapshot, &catalog);
    assert_eq!(rebuilt, plan.lines);
    assert_eq!(compute_totals(&rebuilt, &policy).unwrap(), plan.totals);
}

#[test]
fn test_whole_catalog_checks_out_in_one_order() {
    let policy = ShippingPolicy::default();
    let catalog = Catalog::standard();
    let requested: Vec<RequestedItem> = catalog
        .all()
        .iter()
        .map(|product| item(product.id, 2))
        .collect();

    let lines = price_items(&requested, &catalog, AccessStatus::Approved).unwrap();
    let plan = plan_checkout(lines, &policy).unwrap();
    assert_eq!(plan.lines.len(), catalog.all().len());

    let form = CheckoutSessionParams::new(
        &plan,
        UserId::new(77),
        "jordan@example.com",
        "https://exhale.health",
    )
    .to_form();
    assert!(
        form.iter()
            .filter(|(key, _)| key.starts_with("metadata["))
            .all(|(_, value)| value.len() <= 500)
    );

    let session = echoed_session(&form);
    let snapshot = decode_snapshot(session.snapshot_chunks()).unwrap();
    let rebuilt = lines_from_snapshot(&snapshot, &catalog);
    assert_eq!(rebuilt, plan.lines);
    let shipping = session.charged_shipping().unwrap().unwrap();
    assert_eq!(charged_totals(&rebuilt, shipping).unwrap(), plan.totals);
}

#[test]
fn test_recorded_totals_use_shipping_charged_at_checkout() {
    let catalog = Catalog::standard();
    let lines = price_items(&[item("ntell-patch-7", 1)], &catalog, AccessStatus::None).unwrap();
    let plan = plan_checkout(lines, &ShippingPolicy::default()).unwrap();
    assert_eq!(plan.totals.shipping, Cents::new(1290));

    let form = CheckoutSessionParams::new(
        &plan,
        UserId::new(77),
        "jordan@example.com",
        "https://exhale.health",
    )
    .to_form();
    let session = echoed_session(&form);

    // Shipping configuration changes between payment and confirmation.
    let cheaper = ShippingPolicy::new(Cents::new(2_000), Cents::new(500));
    let rebuilt = lines_from_snapshot(
        &decode_snapshot(session.snapshot_chunks()).unwrap(),
        &catalog,
    );
    assert_eq!(compute_totals(&rebuilt, &cheaper).unwrap().shipping, Cents::ZERO);

    let recorded = charged_totals(&rebuilt, session.charged_shipping().unwrap().unwrap()).unwrap();
    assert_eq!(recorded, plan.totals);
}

#[tokio::test]
async fn test_cart_survives_reload() {
    let storage = MemoryCartStorage::new();
    let catalog = Catalog::standard();

    let mut cart = CartStore::load(storage.clone(), catalog).await.unwrap();
    cart.add("ntell-gum-mint-2", 1).await.unwrap();
    cart.add("ntell-gum-mint-2", 2).await.unwrap();
    cart.add("ntell-gum-fruit-4", 1).await.unwrap();

    let reloaded = CartStore::load(storage.clone(), catalog).await.unwrap();
    assert_eq!(reloaded.count(), 4);
    assert_eq!(reloaded.quantity_of("ntell-gum-mint-2"), 3);
    assert_eq!(reloaded.total(), cart.total());
}

#[tokio::test]
async fn test_clearing_twice_is_harmless() {
    let storage = MemoryCartStorage::new();
    let mut cart = CartStore::load(storage.clone(), Catalog::standard())
        .await
        .unwrap();
    cart.add("ntell-loz-mint-4", 3).await.unwrap();

    cart.clear().await.unwrap();
    cart.clear().await.unwrap();
    assert_eq!(cart.count(), 0);
    assert!(storage.persisted().is_empty());
    assert_eq!(cart.summary(&ShippingPolicy::default()).totals.shipping, Cents::ZERO);
}

//! Checkout total computation.
//!
//! One pure pricing path shared by the cart summary, the checkout endpoint and
//! the payment confirmation webhook. All arithmetic is in integer cents.

use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, ProductId};
use crate::types::{AccessStatus, Cents};

/// Default subtotal at or above which shipping is free ($100.00).
pub const DEFAULT_FREE_SHIPPING_THRESHOLD: Cents = Cents::new(10_000);

/// Default flat shipping fee below the threshold ($12.90).
pub const DEFAULT_FLAT_SHIPPING_FEE: Cents = Cents::new(1290);

/// Name of the synthetic shipping line on the hosted payment page.
pub const SHIPPING_LINE_NAME: &str = "Standard Shipping (Australia Post)";

/// Maximum length of a single payment-session metadata value.
pub const METADATA_VALUE_LIMIT: usize = 500;

/// Maximum number of metadata values one snapshot may span.
///
/// Payment sessions accept 50 metadata keys; the rest are left for the user
/// id, the charged shipping and future use.
pub const MAX_SNAPSHOT_CHUNKS: usize = 40;

/// Errors raised before any payment collaborator is contacted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CheckoutError {
    #[error("No items provided")]
    EmptyCart,

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid quantity for {product_id}")]
    InvalidQuantity { product_id: String },

    #[error("Unknown product: {0}")]
    UnknownProduct(String),

    #[error("{0} is out of stock")]
    OutOfStock(String),

    #[error("{0} is only available after an approved assessment")]
    RequiresAssessment(String),

    #[error("Order total is too large")]
    Overflow,

    #[error("Too many distinct items for one order")]
    SnapshotTooLarge { len: usize, max: usize },
}

/// Free-shipping threshold and flat fee.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShippingPolicy {
    pub free_threshold: Cents,
    pub flat_fee: Cents,
}

impl ShippingPolicy {
    #[must_use]
    pub const fn new(free_threshold: Cents, flat_fee: Cents) -> Self {
        Self {
            free_threshold,
            flat_fee,
        }
    }

    /// Shipping charged for a subtotal.
    #[must_use]
    pub const fn shipping_for(&self, subtotal: Cents) -> Cents {
        if subtotal.as_u64() >= self.free_threshold.as_u64() {
            Cents::ZERO
        } else {
            self.flat_fee
        }
    }
}

impl Default for ShippingPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_FREE_SHIPPING_THRESHOLD, DEFAULT_FLAT_SHIPPING_FEE)
    }
}

/// Subtotal, shipping and grand total of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Totals {
    pub subtotal: Cents,
    pub shipping: Cents,
    pub total: Cents,
}

impl Totals {
    /// Totals for a known subtotal.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::Overflow`] if adding shipping overflows.
    pub fn for_subtotal(subtotal: Cents, policy: &ShippingPolicy) -> Result<Self, CheckoutError> {
        Self::with_shipping(subtotal, policy.shipping_for(subtotal))
    }

    /// Totals for a subtotal and an already-decided shipping charge.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::Overflow`] if adding shipping overflows.
    pub fn with_shipping(subtotal: Cents, shipping: Cents) -> Result<Self, CheckoutError> {
        let total = subtotal
            .checked_add(shipping)
            .ok_or(CheckoutError::Overflow)?;
        Ok(Self {
            subtotal,
            shipping,
            total,
        })
    }
}

/// A priced line ready for checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Cents,
    pub quantity: u32,
}

impl LineItem {
    /// `unit_price × quantity`, or `None` on overflow.
    #[must_use]
    pub const fn line_total(&self) -> Option<Cents> {
        self.unit_price.checked_mul(self.quantity)
    }
}

/// Compute totals for a non-empty list of lines.
///
/// # Errors
///
/// Returns [`CheckoutError::EmptyCart`] for an empty list and
/// [`CheckoutError::Overflow`] if any product or sum overflows.
pub fn compute_totals(lines: &[LineItem], policy: &ShippingPolicy) -> Result<Totals, CheckoutError> {
    Totals::for_subtotal(subtotal_of(lines)?, policy)
}

/// Totals for lines whose shipping was fixed when the payment session opened.
///
/// Used on payment confirmation so a later change to the shipping policy
/// cannot alter what is recorded for an order already charged.
///
/// # Errors
///
/// Same as [`compute_totals`].
pub fn charged_totals(lines: &[LineItem], shipping: Cents) -> Result<Totals, CheckoutError> {
    Totals::with_shipping(subtotal_of(lines)?, shipping)
}

fn subtotal_of(lines: &[LineItem]) -> Result<Cents, CheckoutError> {
    if lines.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }
    lines
        .iter()
        .try_fold(Cents::ZERO, |acc, line| {
            line.line_total().and_then(|t| acc.checked_add(t))
        })
        .ok_or(CheckoutError::Overflow)
}

/// An item as submitted by the client.
///
/// `price` is accepted for compatibility but never trusted; the catalog price
/// is always used.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestedItem {
    #[serde(default)]
    pub product_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub price: i64,
    #[serde(default)]
    pub quantity: i64,
}

/// Validate client items and re-price them from the catalog.
///
/// Duplicate product ids are merged into one line.
///
/// # Errors
///
/// Returns a validation error for an empty list, a blank id or name, a
/// non-positive quantity, an unknown or out-of-stock product, or a gated
/// product the buyer may not purchase.
pub fn price_items(
    items: &[RequestedItem],
    catalog: &Catalog,
    access: AccessStatus,
) -> Result<Vec<LineItem>, CheckoutError> {
    if items.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }

    let mut lines: Vec<LineItem> = Vec::with_capacity(items.len());
    for item in items {
        let id = item.product_id.trim();
        if id.is_empty() {
            return Err(CheckoutError::MissingField("product_id"));
        }
        if item.name.trim().is_empty() {
            return Err(CheckoutError::MissingField("name"));
        }
        let quantity = u32::try_from(item.quantity)
            .ok()
            .filter(|q| *q > 0)
            .ok_or_else(|| CheckoutError::InvalidQuantity {
                product_id: id.to_string(),
            })?;

        let product = catalog
            .get(id)
            .ok_or_else(|| CheckoutError::UnknownProduct(id.to_string()))?;
        if !product.in_stock {
            return Err(CheckoutError::OutOfStock(product.name.to_string()));
        }
        if !product.is_available_to(access) {
            return Err(CheckoutError::RequiresAssessment(product.name.to_string()));
        }

        if let Some(existing) = lines.iter_mut().find(|l| l.product_id.as_str() == id) {
            existing.quantity = existing
                .quantity
                .checked_add(quantity)
                .ok_or(CheckoutError::Overflow)?;
        } else {
            lines.push(LineItem {
                product_id: ProductId::new(product.id),
                name: product.name.to_string(),
                unit_price: product.price,
                quantity,
            });
        }
    }
    Ok(lines)
}

/// One itemised row on the hosted payment page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentLine {
    pub name: String,
    pub unit_amount: Cents,
    pub quantity: u32,
}

/// Compact per-line record stored in payment-session metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotLine {
    pub id: String,
    pub qty: u32,
    pub price: Cents,
}

/// Everything needed to open a hosted payment session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutPlan {
    pub lines: Vec<LineItem>,
    pub totals: Totals,
    pub payment_lines: Vec<PaymentLine>,
    /// JSON-encoded [`SnapshotLine`] list for the confirmation webhook, split
    /// into metadata-sized chunks.
    pub snapshot: Vec<String>,
}

/// Build the payment payload for priced lines.
///
/// # Errors
///
/// Propagates [`compute_totals`] and [`encode_snapshot`] errors.
pub fn plan_checkout(
    lines: Vec<LineItem>,
    policy: &ShippingPolicy,
) -> Result<CheckoutPlan, CheckoutError> {
    let totals = compute_totals(&lines, policy)?;

    let mut payment_lines: Vec<PaymentLine> = lines
        .iter()
        .map(|line| PaymentLine {
            name: line.name.clone(),
            unit_amount: line.unit_price,
            quantity: line.quantity,
        })
        .collect();
    if totals.shipping > Cents::ZERO {
        payment_lines.push(PaymentLine {
            name: SHIPPING_LINE_NAME.to_string(),
            unit_amount: totals.shipping,
            quantity: 1,
        });
    }

    let snapshot = encode_snapshot(&lines)?;

    Ok(CheckoutPlan {
        lines,
        totals,
        payment_lines,
        snapshot,
    })
}

/// Encode lines as a metadata snapshot.
///
/// The JSON is split into chunks of at most [`METADATA_VALUE_LIMIT`] bytes,
/// stored under consecutive metadata keys and joined again by
/// [`decode_snapshot`].
///
/// # Errors
///
/// Returns [`CheckoutError::SnapshotTooLarge`] when more than
/// [`MAX_SNAPSHOT_CHUNKS`] chunks would be needed.
pub fn encode_snapshot(lines: &[LineItem]) -> Result<Vec<String>, CheckoutError> {
    let snapshot: Vec<SnapshotLine> = lines
        .iter()
        .map(|line| SnapshotLine {
            id: line.product_id.to_string(),
            qty: line.quantity,
            price: line.unit_price,
        })
        .collect();
    // Serializing plain structs of strings and integers cannot fail.
    let encoded = serde_json::to_string(&snapshot).unwrap_or_default();
    let max = METADATA_VALUE_LIMIT * MAX_SNAPSHOT_CHUNKS;
    if encoded.len() > max {
        return Err(CheckoutError::SnapshotTooLarge {
            len: encoded.len(),
            max,
        });
    }
    Ok(split_chunks(&encoded, METADATA_VALUE_LIMIT))
}

/// Split on char boundaries into pieces of at most `limit` bytes.
fn split_chunks(encoded: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut rest = encoded;
    while !rest.is_empty() {
        let mut end = rest.len().min(limit);
        while !rest.is_char_boundary(end) {
            end -= 1;
        }
        if end == 0 {
            // A single char wider than the limit still forms its own chunk.
            end = rest.chars().next().map_or(rest.len(), char::len_utf8);
        }
        let (head, tail) = rest.split_at(end);
        chunks.push(head.to_string());
        rest = tail;
    }
    chunks
}

/// Decode a metadata snapshot from its chunks, in order.
///
/// # Errors
///
/// Returns the JSON error if the joined snapshot is malformed.
pub fn decode_snapshot<'a, I>(chunks: I) -> Result<Vec<SnapshotLine>, serde_json::Error>
where
    I: IntoIterator<Item = &'a str>,
{
    let joined: String = chunks.into_iter().collect();
    serde_json::from_str(&joined)
}

/// Rebuild priced lines from a snapshot at the prices that were charged.
///
/// Names come from the catalog; a product removed since checkout keeps its id
/// as its name.
#[must_use]
pub fn lines_from_snapshot(snapshot: &[SnapshotLine], catalog: &Catalog) -> Vec<LineItem> {
    snapshot
        .iter()
        .filter(|line| line.qty > 0)
        .map(|line| LineItem {
            product_id: ProductId::new(line.id.clone()),
            name: catalog
                .get(&line.id)
                .map_or_else(|| line.id.clone(), |p| p.name.to_string()),
            unit_price: line.price,
            quantity: line.qty,
        })
        .collect()
}

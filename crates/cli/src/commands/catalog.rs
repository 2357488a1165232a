//! Catalog inspection commands.
//!
//! Prices a basket with the same functions the storefront uses at checkout,
//! so support staff can check a customer's total without a database.

use exhale_core::AccessStatus;
use exhale_core::catalog::Catalog;
use exhale_core::checkout::{CheckoutError, RequestedItem, ShippingPolicy, compute_totals, price_items};
use thiserror::Error;

/// Errors that can occur while quoting.
#[derive(Debug, Error)]
pub enum QuoteError {
    #[error("Expected product_id:quantity, got {0:?}")]
    Malformed(String),

    #[error(transparent)]
    Checkout(#[from] CheckoutError),
}

const fn access(approved: bool) -> AccessStatus {
    if approved {
        AccessStatus::Approved
    } else {
        AccessStatus::None
    }
}

/// Print the products visible to an anonymous or approved customer.
pub fn list(approved: bool) {
    for product in Catalog::standard().visible_to(access(approved)) {
        tracing::info!(
            "{:<24} {:>8}  {}{}",
            product.id,
            product.price.to_string(),
            product.name,
            if product.in_stock { "" } else { " (out of stock)" }
        );
    }
}

/// Parse `product_id:quantity` arguments into checkout items.
fn parse_items(items: &[String]) -> Result<Vec<RequestedItem>, QuoteError> {
    let catalog = Catalog::standard();
    items
        .iter()
        .map(|raw| {
            let (id, qty) = raw
                .split_once(':')
                .ok_or_else(|| QuoteError::Malformed(raw.clone()))?;
            let quantity = qty
                .parse::<i64>()
                .map_err(|_| QuoteError::Malformed(raw.clone()))?;
            Ok(RequestedItem {
                product_id: id.to_string(),
                name: catalog
                    .get(id)
                    .map_or_else(|| id.to_string(), |p| p.name.to_string()),
                price: 0,
                quantity,
            })
        })
        .collect()
}

/// Price a basket and print each line with subtotal, shipping and total.
///
/// # Errors
///
/// Returns `QuoteError` for a malformed item or any checkout validation error.
pub fn quote(items: &[String], approved: bool) -> Result<(), QuoteError> {
    let requested = parse_items(items)?;
    let lines = price_items(&requested, &Catalog::standard(), access(approved))?;
    let totals = compute_totals(&lines, &ShippingPolicy::default())?;

    for line in &lines {
        tracing::info!(
            "{:>3} x {:<40} {:>8}",
            line.quantity,
            line.name,
            line.unit_price.to_string()
        );
    }
    tracing::info!("Subtotal: {}", totals.subtotal);
    tracing::info!("Shipping: {}", totals.shipping);
    tracing::info!("Total:    {}", totals.total);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_items() {
        let items = parse_items(&["ntell-gum-mint-4:3".to_string()]).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].product_id, "ntell-gum-mint-4");
        assert_eq!(items[0].quantity, 3);
    }

    #[test]
    fn test_parse_rejects_missing_quantity() {
        assert!(matches!(
            parse_items(&["ntell-gum-mint-4".to_string()]),
            Err(QuoteError::Malformed(_))
        ));
        assert!(matches!(
            parse_items(&["ntell-gum-mint-4:lots".to_string()]),
            Err(QuoteError::Malformed(_))
        ));
    }

    #[test]
    fn test_unknown_product_fails_quote() {
        assert!(matches!(
            quote(&["nope:1".to_string()], false),
            Err(QuoteError::Checkout(CheckoutError::UnknownProduct(_)))
        ));
    }
}

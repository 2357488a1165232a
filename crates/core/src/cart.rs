//! Session cart store.
//!
//! A [`CartStore`] holds the lines of one browsing session and persists every
//! mutation through a [`CartStorage`] port. The storefront backs the port with
//! the server-side session; tests use [`MemoryCartStorage`].
//!
//! Lines always have a quantity of at least one and there is at most one line
//! per product. Unknown products are ignored by mutations and are worth zero
//! in totals.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, ProductId};
use crate::checkout::{LineItem, ShippingPolicy, Totals};
use crate::types::{AccessStatus, Cents};

/// One product in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Storage port for cart lines.
pub trait CartStorage: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load persisted lines (empty when nothing was stored).
    fn get(&self) -> impl Future<Output = Result<Vec<CartLine>, Self::Error>> + Send;

    /// Replace persisted lines.
    fn set(&self, lines: &[CartLine]) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Remove persisted lines.
    fn clear(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// In-memory [`CartStorage`]; clones share the same lines.
#[derive(Debug, Clone, Default)]
pub struct MemoryCartStorage {
    lines: Arc<Mutex<Vec<CartLine>>>,
}

impl MemoryCartStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of what is currently persisted.
    #[must_use]
    pub fn persisted(&self) -> Vec<CartLine> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl CartStorage for MemoryCartStorage {
    type Error = std::convert::Infallible;

    async fn get(&self) -> Result<Vec<CartLine>, Self::Error> {
        Ok(self.persisted())
    }

    async fn set(&self, lines: &[CartLine]) -> Result<(), Self::Error> {
        *self.lines.lock().unwrap_or_else(PoisonError::into_inner) = lines.to_vec();
        Ok(())
    }

    async fn clear(&self) -> Result<(), Self::Error> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(())
    }
}

/// Errors from cart persistence.
#[derive(Debug, thiserror::Error)]
pub enum CartError<E: std::error::Error + 'static> {
    #[error("cart storage error: {0}")]
    Storage(#[source] E),
}

type Observer = Box<dyn Fn(u32) + Send + Sync>;

/// A display line with its resolved product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartItemView {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Cents,
    pub quantity: u32,
    pub line_total: Cents,
}

/// Cart contents with derived totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartSummary {
    pub items: Vec<CartItemView>,
    #[serde(flatten)]
    pub totals: Totals,
    pub count: u32,
}

/// Cart for one session, persisted through `S`.
pub struct CartStore<S: CartStorage> {
    storage: S,
    catalog: Catalog,
    access: AccessStatus,
    lines: Vec<CartLine>,
    observers: Vec<Observer>,
}

impl<S: CartStorage> std::fmt::Debug for CartStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartStore")
            .field("access", &self.access)
            .field("lines", &self.lines)
            .field("observers", &self.observers.len())
            .finish_non_exhaustive()
    }
}

impl<S: CartStorage> CartStore<S> {
    /// Load a cart from storage.
    ///
    /// Persisted state is normalised on load: zero-quantity lines are dropped
    /// and duplicate product ids are merged.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Storage`] if the storage port fails.
    pub async fn load(storage: S, catalog: Catalog) -> Result<Self, CartError<S::Error>> {
        let persisted = storage.get().await.map_err(CartError::Storage)?;
        let mut lines: Vec<CartLine> = Vec::with_capacity(persisted.len());
        for line in persisted.into_iter().filter(|l| l.quantity > 0) {
            match lines.iter_mut().find(|l| l.product_id == line.product_id) {
                Some(existing) => {
                    existing.quantity = existing.quantity.saturating_add(line.quantity);
                }
                None => lines.push(line),
            }
        }
        Ok(Self {
            storage,
            catalog,
            access: AccessStatus::None,
            lines,
            observers: Vec::new(),
        })
    }

    /// Restrict which gated products may be added.
    #[must_use]
    pub const fn with_access(mut self, access: AccessStatus) -> Self {
        self.access = access;
        self
    }

    /// Register a callback that receives the item count after each mutation.
    pub fn subscribe(&mut self, observer: impl Fn(u32) + Send + Sync + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Current lines, in insertion order.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Quantity of a product, zero when absent.
    #[must_use]
    pub fn quantity_of(&self, product_id: &str) -> u32 {
        self.lines
            .iter()
            .find(|l| l.product_id.as_str() == product_id)
            .map_or(0, |l| l.quantity)
    }

    /// Add `quantity` of a product.
    ///
    /// Does nothing when the product is unknown, not available to the
    /// buyer, or `quantity` is zero.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Storage`] if persisting fails.
    pub async fn add(&mut self, product_id: &str, quantity: u32) -> Result<(), CartError<S::Error>> {
        if quantity == 0 {
            return Ok(());
        }
        let Some(product) = self.catalog.get(product_id) else {
            return Ok(());
        };
        if !product.is_available_to(self.access) {
            return Ok(());
        }

        match self
            .lines
            .iter_mut()
            .find(|l| l.product_id.as_str() == product_id)
        {
            Some(line) => line.quantity = line.quantity.saturating_add(quantity),
            None => self.lines.push(CartLine {
                product_id: ProductId::new(product.id),
                quantity,
            }),
        }
        self.commit().await
    }

    /// Overwrite the quantity of an existing line.
    ///
    /// A quantity of zero or less removes the line. Never creates a line.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Storage`] if persisting fails.
    pub async fn set_quantity(
        &mut self,
        product_id: &str,
        quantity: i64,
    ) -> Result<(), CartError<S::Error>> {
        if quantity <= 0 {
            return self.remove(product_id).await;
        }
        let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
        let Some(line) = self
            .lines
            .iter_mut()
            .find(|l| l.product_id.as_str() == product_id)
        else {
            return Ok(());
        };
        if line.quantity == quantity {
            return Ok(());
        }
        line.quantity = quantity;
        self.commit().await
    }

    /// Remove a line if present.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Storage`] if persisting fails.
    pub async fn remove(&mut self, product_id: &str) -> Result<(), CartError<S::Error>> {
        let before = self.lines.len();
        self.lines.retain(|l| l.product_id.as_str() != product_id);
        if self.lines.len() == before {
            return Ok(());
        }
        self.commit().await
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Storage`] if the storage port fails.
    pub async fn clear(&mut self) -> Result<(), CartError<S::Error>> {
        self.lines.clear();
        self.storage.clear().await.map_err(CartError::Storage)?;
        self.notify();
        Ok(())
    }

    /// Sum of quantities.
    #[must_use]
    pub fn count(&self) -> u32 {
        self.lines
            .iter()
            .fold(0_u32, |acc, l| acc.saturating_add(l.quantity))
    }

    /// Sum of `quantity × price` over lines whose product resolves.
    #[must_use]
    pub fn total(&self) -> Cents {
        self.resolved()
            .map(|line| line.line_total().unwrap_or(Cents::new(u64::MAX)))
            .sum()
    }

    /// Priced lines for checkout, skipping unknown products.
    #[must_use]
    pub fn line_items(&self) -> Vec<LineItem> {
        self.resolved().collect()
    }

    /// Lines, subtotal, shipping and total for display.
    ///
    /// An empty cart owes no shipping.
    #[must_use]
    pub fn summary(&self, policy: &ShippingPolicy) -> CartSummary {
        let items: Vec<CartItemView> = self
            .resolved()
            .map(|line| {
                let line_total = line.line_total().unwrap_or(Cents::new(u64::MAX));
                CartItemView {
                    product_id: line.product_id,
                    name: line.name,
                    unit_price: line.unit_price,
                    quantity: line.quantity,
                    line_total,
                }
            })
            .collect();
        let subtotal = self.total();
        let totals = if items.is_empty() {
            Totals::default()
        } else {
            let shipping = policy.shipping_for(subtotal);
            Totals {
                subtotal,
                shipping,
                total: subtotal.saturating_add(shipping),
            }
        };
        CartSummary {
            items,
            totals,
            count: self.count(),
        }
    }

    fn resolved(&self) -> impl Iterator<Item = LineItem> + '_ {
        self.lines.iter().filter_map(|line| {
            self.catalog
                .get(line.product_id.as_str())
                .map(|product| LineItem {
                    product_id: line.product_id.clone(),
                    name: product.name.to_string(),
                    unit_price: product.price,
                    quantity: line.quantity,
                })
        })
    }

    async fn commit(&mut self) -> Result<(), CartError<S::Error>> {
        self.storage
            .set(&self.lines)
            .await
            .map_err(CartError::Storage)?;
        self.notify();
        Ok(())
    }

    fn notify(&self) {
        let count = self.count();
        for observer in &self.observers {
            observer(count);
        }
    }
}

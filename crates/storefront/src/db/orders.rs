//! Order repository.
//!
//! The storefront only creates orders (from the payment webhook) and reads
//! them back for the account page. Status changes belong to the admin
//! service.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use sqlx::types::Json;

use exhale_core::checkout::{LineItem, Totals};
use exhale_core::order::{Order, OrderItem, ShippingAddress};
use exhale_core::{Cents, OrderId, OrderItemId, OrderStatus, UserId};

use super::RepositoryError;

const ORDER_COLUMNS: &str = "id, user_id, status, subtotal, shipping_cost, total, \
     stripe_session_id, stripe_payment_intent_id, shipping_address, tracking_number, \
     pharmacist_notes, created_at, updated_at, shipped_at";

const ITEM_COLUMNS: &str = "id, order_id, product_id, product_name, quantity, unit_price";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: i64,
    user_id: i64,
    status: OrderStatus,
    subtotal: i64,
    shipping_cost: i64,
    total: i64,
    stripe_session_id: Option<String>,
    stripe_payment_intent_id: Option<String>,
    shipping_address: Option<Json<ShippingAddress>>,
    tracking_number: Option<String>,
    pharmacist_notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    shipped_at: Option<DateTime<Utc>>,
}

fn cents(value: i64, column: &str) -> Result<Cents, RepositoryError> {
    Cents::try_from(value)
        .map_err(|_| RepositoryError::DataCorruption(format!("negative {column}: {value}")))
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: OrderId::new(row.id),
            user_id: UserId::new(row.user_id),
            status: row.status,
            subtotal: cents(row.subtotal, "subtotal")?,
            shipping_cost: cents(row.shipping_cost, "shipping_cost")?,
            total: cents(row.total, "total")?,
            stripe_session_id: row.stripe_session_id,
            stripe_payment_intent_id: row.stripe_payment_intent_id,
            shipping_address: row.shipping_address.map(|a| a.0),
            tracking_number: row.tracking_number,
            pharmacist_notes: row.pharmacist_notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
            shipped_at: row.shipped_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    id: i64,
    order_id: i64,
    product_id: String,
    product_name: String,
    quantity: i32,
    unit_price: i64,
}

impl TryFrom<OrderItemRow> for OrderItem {
    type Error = RepositoryError;

    fn try_from(row: OrderItemRow) -> Result<Self, Self::Error> {
        let quantity = u32::try_from(row.quantity).map_err(|_| {
            RepositoryError::DataCorruption(format!("negative quantity: {}", row.quantity))
        })?;

        Ok(Self {
            id: OrderItemId::new(row.id),
            order_id: OrderId::new(row.order_id),
            product_id: row.product_id,
            product_name: row.product_name,
            quantity,
            unit_price: cents(row.unit_price, "unit_price")?,
        })
    }
}

/// An order with its line items.
#[derive(Debug, Clone, Serialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// A paid checkout session to record as an order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: UserId,
    pub totals: Totals,
    pub lines: Vec<LineItem>,
    pub stripe_session_id: String,
    pub stripe_payment_intent_id: Option<String>,
    pub shipping_address: Option<ShippingAddress>,
}

/// Outcome of recording a checkout session.
#[derive(Debug, Clone)]
pub enum Recorded {
    /// A new order was written.
    Created(OrderWithItems),
    /// The checkout session was already recorded by an earlier delivery.
    Duplicate(OrderId),
}

fn quantity(line: &LineItem) -> Result<i32, RepositoryError> {
    i32::try_from(line.quantity).map_err(|_| {
        RepositoryError::DataCorruption(format!("quantity too large: {}", line.quantity))
    })
}

fn amount(value: Cents) -> Result<i64, RepositoryError> {
    i64::try_from(value.as_u64())
        .map_err(|_| RepositoryError::DataCorruption(format!("amount too large: {value}")))
}

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Record a paid checkout session as an order awaiting pharmacist review.
    ///
    /// The order row and all item rows are written in one transaction. A
    /// second call for the same checkout session writes nothing and returns
    /// [`Recorded::Duplicate`].
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails; nothing is
    /// written in that case.
    pub async fn create_from_checkout(&self, new: &NewOrder) -> Result<Recorded, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "INSERT INTO orders (user_id, status, subtotal, shipping_cost, total, \
                 stripe_session_id, stripe_payment_intent_id, shipping_address) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (stripe_session_id) DO NOTHING \
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(new.user_id)
        .bind(OrderStatus::PharmacistReview)
        .bind(amount(new.totals.subtotal)?)
        .bind(amount(new.totals.shipping)?)
        .bind(amount(new.totals.total)?)
        .bind(&new.stripe_session_id)
        .bind(new.stripe_payment_intent_id.as_deref())
        .bind(new.shipping_address.as_ref().map(Json))
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            let existing = sqlx::query_scalar::<_, i64>(
                "SELECT id FROM orders WHERE stripe_session_id = $1",
            )
            .bind(&new.stripe_session_id)
            .fetch_one(self.pool)
            .await?;
            return Ok(Recorded::Duplicate(OrderId::new(existing)));
        };
        let order: Order = row.try_into()?;

        let mut items = Vec::with_capacity(new.lines.len());
        for line in &new.lines {
            let item = sqlx::query_as::<_, OrderItemRow>(&format!(
                "INSERT INTO order_items (order_id, product_id, product_name, quantity, unit_price) \
                 VALUES ($1, $2, $3, $4, $5) \
                 RETURNING {ITEM_COLUMNS}"
            ))
            .bind(order.id)
            .bind(line.product_id.as_str())
            .bind(&line.name)
            .bind(quantity(line)?)
            .bind(amount(line.unit_price)?)
            .fetch_one(&mut *tx)
            .await?;
            items.push(item.try_into()?);
        }

        tx.commit().await?;

        Ok(Recorded::Created(OrderWithItems { order, items }))
    }

    /// All orders for a customer, newest first, with their items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<OrderWithItems>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;
        let orders: Vec<Order> = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<_, _>>()?;

        let ids: Vec<i64> = orders.iter().map(|o| o.id.as_i64()).collect();
        let item_rows = sqlx::query_as::<_, OrderItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = ANY($1) ORDER BY id"
        ))
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;
        let mut items: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
        for row in item_rows {
            let item: OrderItem = row.try_into()?;
            items.entry(item.order_id).or_default().push(item);
        }

        Ok(orders
            .into_iter()
            .map(|order| OrderWithItems {
                items: items.remove(&order.id).unwrap_or_default(),
                order,
            })
            .collect())
    }
}

//! Order repository (review side).
//!
//! Orders are listed oldest first so the queue is worked in arrival order.
//! Status changes go through [`Order::apply`] under a row lock.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use sqlx::types::Json;

use exhale_core::events::OrderStatusChanged;
use exhale_core::order::{Order, OrderItem, ShippingAddress, StatusUpdate, TransitionError};
use exhale_core::{Cents, Email, OrderId, OrderItemId, OrderStatus, UserId};

use super::{GuardedError, RepositoryError};
use crate::models::Customer;

const ORDER_COLUMNS: &str = "o.id, o.user_id, o.status, o.subtotal, o.shipping_cost, o.total, \
     o.stripe_session_id, o.stripe_payment_intent_id, o.shipping_address, o.tracking_number, \
     o.pharmacist_notes, o.created_at, o.updated_at, o.shipped_at";

const ITEM_COLUMNS: &str = "id, order_id, product_id, product_name, quantity, unit_price";

const CUSTOMER_COLUMNS: &str = "p.email AS customer_email, p.first_name AS customer_first_name, \
     p.last_name AS customer_last_name";

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
struct CustomerColumns {
    customer_email: String,
    customer_first_name: Option<String>,
    customer_last_name: Option<String>,
}

impl CustomerColumns {
    fn into_customer(self, id: UserId) -> Result<Customer, RepositoryError> {
        let email = Email::parse(&self.customer_email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;
        Ok(Customer {
            id,
            email,
            first_name: self.customer_first_name,
            last_name: self.customer_last_name,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OrderWithCustomerRow {
    #[sqlx(flatten)]
    order: OrderRow,
    #[sqlx(flatten)]
    customer: CustomerColumns,
}

impl OrderWithCustomerRow {
    fn split(self) -> Result<(Order, Customer), RepositoryError> {
        let order: Order = self.order.try_into()?;
        let customer = self.customer.into_customer(order.user_id)?;
        Ok((order, customer))
    }
}

#[derive(sqlx::FromRow)]
struct SummaryRow {
    #[sqlx(flatten)]
    order: OrderRow,
    customer_email: String,
    item_count: i64,
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

/// A row in the order queue.
#[derive(Debug, Clone, Serialize)]
pub struct OrderSummary {
    #[serde(flatten)]
    pub order: Order,
    pub customer_email: String,
    pub item_count: u32,
}

/// An order with everything the detail view needs.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub customer: Customer,
    /// Statuses the order may move to next.
    pub next_statuses: Vec<OrderStatus>,
}

/// Repository for order review operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Orders oldest first, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        status: Option<OrderStatus>,
    ) -> Result<Vec<OrderSummary>, RepositoryError> {
        let rows = sqlx::query_as::<_, SummaryRow>(&format!(
            "SELECT {ORDER_COLUMNS}, p.email AS customer_email, \
                 (SELECT COALESCE(SUM(i.quantity), 0) FROM order_items i WHERE i.order_id = o.id) \
                     AS item_count \
             FROM orders o JOIN profiles p ON p.id = o.user_id \
             WHERE ($1::order_status IS NULL OR o.status = $1) \
             ORDER BY o.created_at, o.id"
        ))
        .bind(status)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let item_count = u32::try_from(row.item_count).map_err(|_| {
                    RepositoryError::DataCorruption(format!("item count: {}", row.item_count))
                })?;
                Ok(OrderSummary {
                    order: row.order.try_into()?,
                    customer_email: row.customer_email,
                    item_count,
                })
            })
            .collect()
    }

    /// One order with items and customer.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<OrderDetail>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderWithCustomerRow>(&format!(
            "SELECT {ORDER_COLUMNS}, {CUSTOMER_COLUMNS} \
             FROM orders o JOIN profiles p ON p.id = o.user_id WHERE o.id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let (order, customer) = row.split()?;

        let items = self.items(&[order.id]).await?.remove(&order.id).unwrap_or_default();

        Ok(Some(OrderDetail {
            next_statuses: exhale_core::order::next_statuses(order.status),
            order,
            items,
            customer,
        }))
    }

    async fn items(
        &self,
        ids: &[OrderId],
    ) -> Result<HashMap<OrderId, Vec<OrderItem>>, RepositoryError> {
        let ids: Vec<i64> = ids.iter().map(OrderId::as_i64).collect();
        let rows = sqlx::query_as::<_, OrderItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = ANY($1) ORDER BY id"
        ))
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;

        let mut items: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
        for row in rows {
            let item: OrderItem = row.try_into()?;
            items.entry(item.order_id).or_default().push(item);
        }
        Ok(items)
    }

    /// Move an order to a new status.
    ///
    /// The order row is locked, the transition is checked against its
    /// current status and the new state is written in the same transaction.
    /// Two concurrent requests therefore cannot both succeed from the same
    /// starting status.
    ///
    /// # Errors
    ///
    /// Returns `GuardedError::Rejected` for an illegal transition (nothing is
    /// written), `RepositoryError::NotFound` for an unknown order and
    /// `RepositoryError::Database` if a query fails.
    pub async fn update_status(
        &self,
        id: OrderId,
        update: &StatusUpdate,
        now: DateTime<Utc>,
    ) -> Result<(Order, OrderStatusChanged, Customer), GuardedError<TransitionError>> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, OrderWithCustomerRow>(&format!(
            "SELECT {ORDER_COLUMNS}, {CUSTOMER_COLUMNS} \
             FROM orders o JOIN profiles p ON p.id = o.user_id \
             WHERE o.id = $1 FOR UPDATE OF o"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;
        let (mut order, customer) = row.split()?;

        let event = order.apply(update, now).map_err(GuardedError::Rejected)?;

        sqlx::query(
            "UPDATE orders SET status = $2, tracking_number = $3, pharmacist_notes = $4, \
                 shipped_at = $5, updated_at = $6 \
             WHERE id = $1",
        )
        .bind(order.id)
        .bind(order.status)
        .bind(order.tracking_number.as_deref())
        .bind(order.pharmacist_notes.as_deref())
        .bind(order.shipped_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok((order, event, customer))
    }

    /// Number of orders in each status. Statuses with no orders are omitted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_by_status(&self) -> Result<Vec<(OrderStatus, i64)>, RepositoryError> {
        let rows = sqlx::query_as::<_, (OrderStatus, i64)>(
            "SELECT status, COUNT(*) FROM orders GROUP BY status ORDER BY status",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }
}

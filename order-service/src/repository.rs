use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::pooled_connection::bb8::{Pool, PooledConnection};
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use shared::{
    db_error, CommerceError, OperationContext, Order, OrderItem, OrderStatus, Payment, Result,
};
use uuid::Uuid;

use crate::models::*;
use crate::schema::*;

pub type DbPool = Pool<AsyncPgConnection>;

/// Durable store for orders, their line items and payments.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Persists the order and all of its items in one transaction.
    async fn insert_order(&self, order: &Order, items: &[OrderItem]) -> Result<()>;
    /// Fails with `NotFound` when the order does not exist or expired before `now`.
    async fn find_active_order(&self, id: Uuid, now: DateTime<Utc>) -> Result<Order>;
    async fn order_items(&self, order_id: Uuid) -> Result<Vec<OrderItem>>;
    /// Moves the order from pending to succeeded and records the payment, in
    /// one transaction. Fails with `BadRequest` and writes nothing when the
    /// order is no longer pending.
    async fn settle_order(&self, payment: &Payment) -> Result<()>;
    async fn payments_for_order(&self, order_id: Uuid) -> Result<Vec<Payment>>;
}

pub struct PgOrderRepository {
    pool: DbPool,
}

impl PgOrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn conn(&self) -> Result<PooledConnection<'_, AsyncPgConnection>> {
        self.pool.get().await.during("acquire database connection")
    }
}

pub(crate) fn already_settled(order_id: Uuid) -> CommerceError {
    CommerceError::bad_request(format!("pay order: order '{}' is already paid", order_id))
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn insert_order(&self, order: &Order, items: &[OrderItem]) -> Result<()> {
        let mut conn = self.conn().await?;
        let order = OrderRow::from(order);
        let items: Vec<OrderItemRow> = items.iter().map(OrderItemRow::from).collect();

        conn.transaction::<_, CommerceError, _>(|conn| {
            Box::pin(async move {
                diesel::insert_into(orders::table)
                    .values(&order)
                    .execute(conn)
                    .await
                    .map_err(db_error("insert order"))?;

                diesel::insert_into(order_items::table)
                    .values(&items)
                    .execute(conn)
                    .await
                    .map_err(db_error("insert order items"))?;
                Ok(())
            })
        })
        .await
    }

    async fn find_active_order(&self, id: Uuid, now: DateTime<Utc>) -> Result<Order> {
        let mut conn = self.conn().await?;
        let row = orders::table
            .filter(orders::id.eq(id))
            .filter(orders::expires_at.ge(now))
            .first::<OrderRow>(&mut conn)
            .await
            .optional()
            .map_err(db_error("get order by id"))?;

        match row {
            Some(row) => Order::try_from(row),
            None => Err(CommerceError::not_found(format!("order '{}'", id))),
        }
    }

    async fn order_items(&self, order_id: Uuid) -> Result<Vec<OrderItem>> {
        let mut conn = self.conn().await?;
        let rows = order_items::table
            .filter(order_items::order_id.eq(order_id))
            .order(order_items::product_id.asc())
            .load::<OrderItemRow>(&mut conn)
            .await
            .map_err(db_error("get order items"))?;
        Ok(rows.into_iter().map(OrderItem::from).collect())
    }

    async fn settle_order(&self, payment: &Payment) -> Result<()> {
        let mut conn = self.conn().await?;
        let order_id = payment.order_id;
        let payment = PaymentRow::from(payment);

        conn.transaction::<_, CommerceError, _>(|conn| {
            Box::pin(async move {
                let updated = diesel::update(
                    orders::table
                        .filter(orders::id.eq(order_id))
                        .filter(orders::status.eq(OrderStatus::Pending.as_str())),
                )
                .set(orders::status.eq(OrderStatus::Succeeded.as_str()))
                .execute(conn)
                .await
                .map_err(db_error("update order status"))?;

                if updated == 0 {
                    return Err(already_settled(order_id));
                }

                diesel::insert_into(payments::table)
                    .values(&payment)
                    .execute(conn)
                    .await
                    .map_err(db_error("insert payment"))?;
                Ok(())
            })
        })
        .await
    }

    async fn payments_for_order(&self, order_id: Uuid) -> Result<Vec<Payment>> {
        let mut conn = self.conn().await?;
        let rows = payments::table
            .filter(payments::order_id.eq(order_id))
            .select((
                payments::id,
                payments::order_id,
                payments::user_id,
                payments::amount,
                payments::status,
            ))
            .order(payments::created_at.asc())
            .load::<PaymentRow>(&mut conn)
            .await
            .map_err(db_error("get payments by order"))?;
        rows.into_iter().map(Payment::try_from).collect()
    }
}

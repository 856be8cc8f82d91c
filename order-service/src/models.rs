use chrono::{DateTime, Utc};
use diesel::prelude::*;
use shared::{CommerceError, Order, OrderItem, Payment, PaymentStatus};
use uuid::Uuid;

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = crate::schema::orders)]
pub struct OrderRow {
    pub id: Uuid,
    pub user_id: String,
    pub shop_id: String,
    pub amount: i64,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = crate::schema::order_items)]
pub struct OrderItemRow {
    pub order_id: Uuid,
    pub product_id: String,
    pub shop_id: String,
    pub warehouse_id: String,
    pub quantity: i32,
    pub unit_price: i64,
}

/// `created_at` is filled in by the database.
#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = crate::schema::payments)]
pub struct PaymentRow {
    pub id: Uuid,
    pub order_id: Uuid,
    pub user_id: String,
    pub amount: i64,
    pub status: String,
}

impl From<&Order> for OrderRow {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id,
            user_id: order.user_id.clone(),
            shop_id: order.shop_id.clone(),
            amount: order.amount,
            status: order.status.as_str().to_string(),
            created_at: order.created_at,
            expires_at: order.expires_at,
        }
    }
}

impl TryFrom<OrderRow> for Order {
    type Error = CommerceError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            shop_id: row.shop_id,
            amount: row.amount,
            status: row.status.parse()?,
            created_at: row.created_at,
            expires_at: row.expires_at,
        })
    }
}

impl From<&OrderItem> for OrderItemRow {
    fn from(item: &OrderItem) -> Self {
        Self {
            order_id: item.order_id,
            product_id: item.product_id.clone(),
            shop_id: item.shop_id.clone(),
            warehouse_id: item.warehouse_id.clone(),
            quantity: item.quantity,
            unit_price: item.unit_price,
        }
    }
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        Self {
            order_id: row.order_id,
            product_id: row.product_id,
            shop_id: row.shop_id,
            warehouse_id: row.warehouse_id,
            quantity: row.quantity,
            unit_price: row.unit_price,
        }
    }
}

impl From<&Payment> for PaymentRow {
    fn from(payment: &Payment) -> Self {
        Self {
            id: payment.id,
            order_id: payment.order_id,
            user_id: payment.user_id.clone(),
            amount: payment.amount,
            status: payment.status.as_str().to_string(),
        }
    }
}

impl TryFrom<PaymentRow> for Payment {
    type Error = CommerceError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        let status = match row.status.as_str() {
            "paid" => PaymentStatus::Paid,
            other => {
                return Err(CommerceError::internal(
                    "parse payment status",
                    anyhow::anyhow!("unknown payment status '{}'", other),
                ))
            }
        };

        Ok(Self {
            id: row.id,
            order_id: row.order_id,
            user_id: row.user_id,
            amount: row.amount,
            status,
        })
    }
}

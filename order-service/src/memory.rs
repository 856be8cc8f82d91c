use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{CommerceError, Order, OrderItem, OrderStatus, Payment, Result};
use uuid::Uuid;

use crate::repository::{already_settled, OrderRepository};

#[derive(Debug, Default)]
struct State {
    orders: HashMap<Uuid, Order>,
    items: Vec<OrderItem>,
    payments: Vec<Payment>,
}

/// In-memory order store for tests and local runs.
#[derive(Debug, Default)]
pub struct InMemoryOrderRepository {
    state: Mutex<State>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, State>> {
        self.state.lock().map_err(|_| {
            CommerceError::internal("lock order state", anyhow::anyhow!("lock poisoned"))
        })
    }

    /// Every stored order regardless of status or expiry.
    pub fn orders(&self) -> Result<Vec<Order>> {
        Ok(self.state()?.orders.values().cloned().collect())
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn insert_order(&self, order: &Order, items: &[OrderItem]) -> Result<()> {
        let mut state = self.state()?;
        if state.orders.contains_key(&order.id) {
            return Err(CommerceError::UniqueViolation);
        }
        state.orders.insert(order.id, order.clone());
        state.items.extend(items.iter().cloned());
        Ok(())
    }

    async fn find_active_order(&self, id: Uuid, now: DateTime<Utc>) -> Result<Order> {
        let state = self.state()?;
        state
            .orders
            .get(&id)
            .filter(|order| order.is_active_at(now))
            .cloned()
            .ok_or_else(|| CommerceError::not_found(format!("order '{}'", id)))
    }

    async fn order_items(&self, order_id: Uuid) -> Result<Vec<OrderItem>> {
        let state = self.state()?;
        let mut items: Vec<OrderItem> = state
            .items
            .iter()
            .filter(|item| item.order_id == order_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.product_id.cmp(&b.product_id));
        Ok(items)
    }

    async fn settle_order(&self, payment: &Payment) -> Result<()> {
        let mut state = self.state()?;
        match state.orders.get_mut(&payment.order_id) {
            Some(order) if order.status == OrderStatus::Pending => {
                order.status = OrderStatus::Succeeded;
            }
            _ => return Err(already_settled(payment.order_id)),
        }
        state.payments.push(payment.clone());
        Ok(())
    }

    async fn payments_for_order(&self, order_id: Uuid) -> Result<Vec<Payment>> {
        let state = self.state()?;
        Ok(state
            .payments
            .iter()
            .filter(|payment| payment.order_id == order_id)
            .cloned()
            .collect())
    }
}

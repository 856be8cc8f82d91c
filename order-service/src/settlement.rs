use std::sync::Arc;

use chrono::Utc;
use shared::{CommerceError, OrderStatus, PayOrderRequest, Payment, PaymentStatus, Result};
use tracing::info;
use uuid::Uuid;

use crate::reconcile::{ReconcileHandle, ReconcileJob};
use crate::repository::{already_settled, OrderRepository};

/// Takes payment for pending orders.
///
/// The order status change and the payment record commit together. Releasing
/// the reservations and decrementing the ledger happen afterwards on the
/// reconciler, so a successful payment does not wait for them and is not
/// undone when they fail.
pub struct SettlementEngine {
    orders: Arc<dyn OrderRepository>,
    reconciler: ReconcileHandle,
}

impl SettlementEngine {
    pub fn new(orders: Arc<dyn OrderRepository>, reconciler: ReconcileHandle) -> Self {
        Self { orders, reconciler }
    }

    /// Returns the id of the recorded payment.
    pub async fn pay_order(&self, request: &PayOrderRequest) -> Result<Uuid> {
        request.validate()?;

        let order = self
            .orders
            .find_active_order(request.order_id, Utc::now())
            .await?;
        if order.status != OrderStatus::Pending {
            return Err(already_settled(order.id));
        }
        if request.amount != order.amount {
            return Err(CommerceError::bad_request(format!(
                "pay order: amount {} does not match order amount {}",
                request.amount, order.amount
            )));
        }

        let payment = Payment {
            id: Uuid::new_v4(),
            order_id: order.id,
            user_id: request.user_id.clone(),
            amount: request.amount,
            status: PaymentStatus::Paid,
        };
        self.orders.settle_order(&payment).await?;
        info!(
            "Payment {} recorded for order {}, amount {}",
            payment.id, order.id, payment.amount
        );

        self.reconciler.dispatch(ReconcileJob {
            order_id: order.id,
            user_id: order.user_id,
        });
        Ok(payment.id)
    }
}

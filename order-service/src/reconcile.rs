use std::sync::Arc;

use inventory_service::InventoryRepository;
use shared::{CommerceError, OrderItem, ReservationKey, Result};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::repository::OrderRepository;
use crate::reservation::ReservationStore;

/// Post-settlement work for one paid order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileJob {
    pub order_id: Uuid,
    /// Owner of the reservations, i.e. the user who placed the order.
    pub user_id: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub released: usize,
    pub decremented: usize,
    pub failed: usize,
}

/// Sends jobs to a running [`Reconciler`]. Dispatch never blocks and never
/// fails the caller.
#[derive(Debug, Clone)]
pub struct ReconcileHandle {
    sender: mpsc::UnboundedSender<ReconcileJob>,
}

impl ReconcileHandle {
    pub fn dispatch(&self, job: ReconcileJob) {
        if let Err(e) = self.sender.send(job) {
            error!(
                "Reconciler is not running, order {} left unreconciled",
                e.0.order_id
            );
        }
    }
}

/// Releases the reservations of a paid order and takes its quantities off
/// the stock ledger.
///
/// Each item is handled independently: a failure is logged and the rest of
/// the order still proceeds. Nothing is retried.
pub struct Reconciler {
    orders: Arc<dyn OrderRepository>,
    inventory: Arc<dyn InventoryRepository>,
    reservations: Arc<dyn ReservationStore>,
}

impl Reconciler {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        inventory: Arc<dyn InventoryRepository>,
        reservations: Arc<dyn ReservationStore>,
    ) -> Self {
        Self {
            orders,
            inventory,
            reservations,
        }
    }

    /// Starts the worker on the current tokio runtime.
    pub fn spawn(self) -> ReconcileHandle {
        let (sender, receiver) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            self.run(receiver).await;
        });
        ReconcileHandle { sender }
    }

    pub async fn run(&self, mut receiver: mpsc::UnboundedReceiver<ReconcileJob>) {
        while let Some(job) = receiver.recv().await {
            self.reconcile(&job).await;
        }
        info!("Reconciler stopped");
    }

    pub async fn reconcile(&self, job: &ReconcileJob) -> ReconcileOutcome {
        let mut outcome = ReconcileOutcome::default();

        let items = match self.orders.order_items(job.order_id).await {
            Ok(items) => items,
            Err(e) => {
                error!("Error loading items of order {}: {}", job.order_id, e);
                outcome.failed += 1;
                return outcome;
            }
        };
        if items.is_empty() {
            warn!("Order {} has no items to reconcile", job.order_id);
        }

        for item in &items {
            match self.release(job, item).await {
                Ok(()) => outcome.released += 1,
                Err(e) => {
                    error!(
                        "Error releasing reservation of product {} in warehouse {} for order {}: {}",
                        item.product_id, item.warehouse_id, job.order_id, e
                    );
                    outcome.failed += 1;
                }
            }

            match self.decrement(item).await {
                Ok(()) => outcome.decremented += 1,
                Err(e) => {
                    error!(
                        "Error decrementing stock of product {} in warehouse {} for order {}: {}",
                        item.product_id, item.warehouse_id, job.order_id, e
                    );
                    outcome.failed += 1;
                }
            }
        }

        info!(
            "Order {} reconciled: {} released, {} decremented, {} failed",
            job.order_id, outcome.released, outcome.decremented, outcome.failed
        );
        outcome
    }

    /// Takes the item quantity off the ledger. A row that can no longer
    /// cover it, e.g. after a stock correction, is left untouched.
    async fn decrement(&self, item: &OrderItem) -> Result<()> {
        let total = self
            .inventory
            .find_stock(&item.product_id, &item.warehouse_id)
            .await?
            .map_or(0, |row| row.total_stock);
        if total < item.quantity {
            return Err(CommerceError::bad_request(format!(
                "reconcile order: warehouse '{}' holds {} unit(s) of product '{}', cannot take {}",
                item.warehouse_id, total, item.product_id, item.quantity
            )));
        }

        self.inventory
            .adjust_stock(&item.product_id, &item.warehouse_id, -item.quantity)
            .await
    }

    async fn release(&self, job: &ReconcileJob, item: &OrderItem) -> Result<()> {
        let key = ReservationKey::new(&item.product_id, &item.warehouse_id, &job.user_id);
        self.reservations.release(&key).await
    }
}

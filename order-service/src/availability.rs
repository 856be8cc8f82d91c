use std::sync::Arc;

use futures::future::try_join_all;
use inventory_service::InventoryRepository;
use shared::{CommerceError, Page, ProductDetail, ProductDetailsQuery, Result};

use crate::reservation::ReservationStore;

/// Computes sellable stock: the ledger total minus every live reservation.
///
/// Both reads happen without coordination, so the figure is a snapshot that
/// can be stale by the time a caller acts on it.
pub struct AvailabilityCalculator {
    inventory: Arc<dyn InventoryRepository>,
    reservations: Arc<dyn ReservationStore>,
}

impl AvailabilityCalculator {
    pub fn new(inventory: Arc<dyn InventoryRepository>, reservations: Arc<dyn ReservationStore>) -> Self {
        Self {
            inventory,
            reservations,
        }
    }

    /// Available quantity of a product in a warehouse. A missing ledger row
    /// counts as zero stock.
    pub async fn available(&self, product_id: &str, warehouse_id: &str) -> Result<i32> {
        let total = self
            .inventory
            .find_stock(product_id, warehouse_id)
            .await?
            .map_or(0, |row| row.total_stock);
        self.subtract_reserved(product_id, warehouse_id, total).await
    }

    /// Replaces the ledger total of each detail with its available quantity.
    pub async fn with_live_stock(&self, details: Vec<ProductDetail>) -> Result<Vec<ProductDetail>> {
        try_join_all(details.into_iter().map(|mut detail| async move {
            detail.total_stock = self
                .subtract_reserved(&detail.product_id, &detail.warehouse_id, detail.total_stock)
                .await?;
            Ok::<_, CommerceError>(detail)
        }))
        .await
    }

    /// Products a shop sells through its enabled warehouses, one entry per
    /// (product, warehouse), with available rather than ledger stock.
    pub async fn shop_products(&self, shop_id: &str, page: Page) -> Result<Vec<ProductDetail>> {
        let details = self
            .inventory
            .product_details_by_shop(&ProductDetailsQuery {
                shop_id: shop_id.to_string(),
                product_ids: Vec::new(),
                page: Some(page),
            })
            .await?;
        self.with_live_stock(details).await
    }

    async fn subtract_reserved(&self, product_id: &str, warehouse_id: &str, total: i32) -> Result<i32> {
        let reserved = self
            .reservations
            .reserved_quantity(product_id, warehouse_id)
            .await?;
        Ok(clamp_stock(i64::from(total) - reserved))
    }
}

fn clamp_stock(value: i64) -> i32 {
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

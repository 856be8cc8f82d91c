use shared::{CommerceError, Result, TransferProductRequest};
use tracing::info;

use crate::handlers::InventoryHandler;

impl InventoryHandler {
    /// Moves stock of one product between two warehouses.
    ///
    /// The source balance check and the two ledger deltas are not applied
    /// under one lock: a sale or transfer landing on the source row between
    /// them can still take it below the checked value. Both deltas commit
    /// together or not at all.
    pub async fn transfer_product(&self, request: &TransferProductRequest) -> Result<()> {
        request.validate()?;
        self.require_warehouses(
            &[
                request.source_warehouse_id.as_str(),
                request.destination_warehouse_id.as_str(),
            ],
            "transfer product",
        )
        .await?;

        let source = self
            .repo
            .find_stock(&request.product_id, &request.source_warehouse_id)
            .await?
            .ok_or_else(|| {
                CommerceError::bad_request(format!(
                    "transfer product: product '{}' has no stock in warehouse '{}'",
                    request.product_id, request.source_warehouse_id
                ))
            })?;

        if source.total_stock - request.quantity < 0 {
            return Err(CommerceError::bad_request(format!(
                "transfer product: warehouse '{}' holds {} unit(s), cannot transfer {}",
                request.source_warehouse_id, source.total_stock, request.quantity
            )));
        }

        self.repo
            .transfer_stock(
                &request.product_id,
                &request.source_warehouse_id,
                &request.destination_warehouse_id,
                request.quantity,
            )
            .await?;

        info!(
            "Transferred {} unit(s) of product {} from {} to {}",
            request.quantity,
            request.product_id,
            request.source_warehouse_id,
            request.destination_warehouse_id
        );
        Ok(())
    }
}

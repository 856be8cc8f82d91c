use std::sync::Arc;

use shared::serial::generate_id;
use shared::{
    BindShopWarehousesRequest, CommerceConfig, CommerceError, CreateProductRequest,
    CreateShopRequest, CreateWarehouseRequest, Product, ProductWarehouse, Result, Shop,
    UpdateStockRequest, UpdateWarehouseStatusRequest, Warehouse,
};
use tracing::info;

use crate::repository::{InventoryRepository, ShopQuery, WarehouseQuery};

/// Catalogue and ledger operations: warehouses, shops, their bindings,
/// products and stock corrections. Transfers live in [`crate::transfer`].
pub struct InventoryHandler {
    pub(crate) repo: Arc<dyn InventoryRepository>,
    config: CommerceConfig,
}

impl InventoryHandler {
    pub fn new(repo: Arc<dyn InventoryRepository>, config: CommerceConfig) -> Self {
        Self { repo, config }
    }

    /// Creates a disabled warehouse. A name that already exists resolves to
    /// the existing warehouse id.
    pub async fn create_warehouse(&self, request: &CreateWarehouseRequest) -> Result<String> {
        request.validate()?;

        let warehouse = Warehouse {
            id: generate_id(&self.config.warehouse_prefix),
            name: request.name.clone(),
            enabled: false,
        };

        match self.repo.insert_warehouse(&warehouse).await {
            Ok(()) => {
                info!("Warehouse {} created with name '{}'", warehouse.id, warehouse.name);
                Ok(warehouse.id)
            }
            Err(CommerceError::UniqueViolation) => self.warehouse_id_by_name(&request.name).await,
            Err(e) => Err(e),
        }
    }

    pub async fn update_warehouse_status(&self, request: &UpdateWarehouseStatusRequest) -> Result<()> {
        request.validate()?;

        if !self.repo.set_warehouse_status(&request.id, request.enabled).await? {
            return Err(CommerceError::bad_request(format!(
                "update warehouse status: warehouse '{}' is not found",
                request.id
            )));
        }
        info!("Warehouse {} enabled = {}", request.id, request.enabled);
        Ok(())
    }

    pub async fn create_shop(&self, request: &CreateShopRequest) -> Result<String> {
        request.validate()?;

        let shop = Shop {
            id: generate_id(&self.config.shop_prefix),
            name: request.name.clone(),
        };

        match self.repo.insert_shop(&shop).await {
            Ok(()) => {
                info!("Shop {} created with name '{}'", shop.id, shop.name);
                Ok(shop.id)
            }
            Err(CommerceError::UniqueViolation) => self.shop_id_by_name(&request.name).await,
            Err(e) => Err(e),
        }
    }

    pub async fn bind_shop_to_warehouses(&self, request: &BindShopWarehousesRequest) -> Result<()> {
        request.validate()?;

        let shops = self
            .repo
            .find_shops(&ShopQuery {
                ids: vec![request.shop_id.clone()],
                ..Default::default()
            })
            .await?;
        if shops.is_empty() {
            return Err(CommerceError::bad_request(format!(
                "bind shop to warehouses: shop '{}' is not found",
                request.shop_id
            )));
        }

        let warehouses = self
            .repo
            .find_warehouses(&WarehouseQuery {
                ids: request.warehouse_ids.clone(),
                ..Default::default()
            })
            .await?;
        if let Some(missing) = request
            .warehouse_ids
            .iter()
            .find(|id| !warehouses.iter().any(|w| &w.id == *id))
        {
            return Err(CommerceError::bad_request(format!(
                "bind shop to warehouses: warehouse '{}' is not found",
                missing
            )));
        }

        self.repo.upsert_shop_warehouses(request).await?;
        info!(
            "Shop {} bound to {} warehouse(s), enabled = {}",
            request.shop_id,
            request.warehouse_ids.len(),
            request.enabled
        );
        Ok(())
    }

    /// Creates a product with its initial stock in one warehouse. A product
    /// name that already exists resolves to the existing id and leaves the
    /// ledger untouched.
    pub async fn create_product(&self, request: &CreateProductRequest) -> Result<String> {
        request.validate()?;
        self.require_warehouses(&[request.warehouse_id.as_str()], "create product")
            .await?;

        let product = Product {
            id: generate_id(&self.config.product_prefix),
            name: request.name.clone(),
            price: request.price,
        };
        let initial = ProductWarehouse {
            product_id: product.id.clone(),
            warehouse_id: request.warehouse_id.clone(),
            total_stock: request.total_stock,
        };

        match self.repo.create_product(&product, &initial).await {
            Ok(()) => {
                info!(
                    "Product {} created with {} unit(s) in warehouse {}",
                    product.id, initial.total_stock, initial.warehouse_id
                );
                Ok(product.id)
            }
            Err(CommerceError::UniqueViolation) => {
                Ok(self.repo.find_product_by_name(&request.name).await?.id)
            }
            Err(e) => Err(e),
        }
    }

    /// Stock correction: overwrites the ledger total for one product in one
    /// warehouse.
    pub async fn update_product_stock(&self, request: &UpdateStockRequest) -> Result<()> {
        request.validate()?;

        if !self.repo.set_stock(request).await? {
            return Err(CommerceError::bad_request(format!(
                "update product stock: product '{}' has no stock in warehouse '{}'",
                request.product_id, request.warehouse_id
            )));
        }
        info!(
            "Stock of product {} in warehouse {} set to {}",
            request.product_id, request.warehouse_id, request.total_stock
        );
        Ok(())
    }

    pub(crate) async fn require_warehouses(&self, ids: &[&str], operation: &str) -> Result<()> {
        let found = self
            .repo
            .find_warehouses(&WarehouseQuery {
                ids: ids.iter().map(|id| id.to_string()).collect(),
                ..Default::default()
            })
            .await?;

        for id in ids {
            if !found.iter().any(|w| w.id == *id) {
                return Err(CommerceError::bad_request(format!(
                    "{}: warehouse '{}' is not found",
                    operation, id
                )));
            }
        }
        Ok(())
    }

    async fn warehouse_id_by_name(&self, name: &str) -> Result<String> {
        self.repo
            .find_warehouses(&WarehouseQuery {
                name: Some(name.to_string()),
                ..Default::default()
            })
            .await?
            .into_iter()
            .next()
            .map(|w| w.id)
            .ok_or_else(|| CommerceError::not_found(format!("warehouse with name '{}'", name)))
    }

    async fn shop_id_by_name(&self, name: &str) -> Result<String> {
        self.repo
            .find_shops(&ShopQuery {
                name: Some(name.to_string()),
                ..Default::default()
            })
            .await?
            .into_iter()
            .next()
            .map(|s| s.id)
            .ok_or_else(|| CommerceError::not_found(format!("shop with name '{}'", name)))
    }
}

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use shared::{
    BindShopWarehousesRequest, CommerceError, Product, ProductDetail, ProductDetailsQuery,
    ProductWarehouse, Result, Shop, UpdateStockRequest, Warehouse,
};

use crate::repository::{InventoryRepository, ShopQuery, WarehouseQuery};

#[derive(Debug, Default)]
struct State {
    warehouses: BTreeMap<String, Warehouse>,
    shops: BTreeMap<String, Shop>,
    bindings: BTreeMap<(String, String), bool>,
    products: BTreeMap<String, Product>,
    stock: BTreeMap<(String, String), i32>,
}

/// In-memory inventory store.
///
/// Intended for tests and local runs. Multi-row operations apply under one
/// lock, which gives them the same all-or-nothing behaviour as a transaction.
#[derive(Debug, Default)]
pub struct InMemoryInventoryRepository {
    state: Mutex<State>,
}

impl InMemoryInventoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, State>> {
        self.state.lock().map_err(|_| {
            CommerceError::internal("lock inventory state", anyhow::anyhow!("lock poisoned"))
        })
    }
}

impl State {
    fn total(&self, product_id: &str, warehouse_id: &str) -> i32 {
        self.stock
            .get(&(product_id.to_string(), warehouse_id.to_string()))
            .copied()
            .unwrap_or(0)
    }

    /// Same rule as the `total_stock >= 0` check on the ledger table.
    fn check_delta(&self, product_id: &str, warehouse_id: &str, delta: i32) -> Result<()> {
        let current = self.total(product_id, warehouse_id);
        match current.checked_add(delta) {
            Some(total) if total >= 0 => Ok(()),
            _ => Err(CommerceError::bad_request(format!(
                "adjust product warehouse stock: product '{}' in warehouse '{}' holds {}, cannot apply {}",
                product_id, warehouse_id, current, delta
            ))),
        }
    }

    fn apply_delta(&mut self, product_id: &str, warehouse_id: &str, delta: i32) {
        *self
            .stock
            .entry((product_id.to_string(), warehouse_id.to_string()))
            .or_insert(0) += delta;
    }
}

#[async_trait]
impl InventoryRepository for InMemoryInventoryRepository {
    async fn insert_warehouse(&self, warehouse: &Warehouse) -> Result<()> {
        let mut state = self.state()?;
        if state.warehouses.values().any(|w| w.name == warehouse.name)
            || state.warehouses.contains_key(&warehouse.id)
        {
            return Err(CommerceError::UniqueViolation);
        }
        state.warehouses.insert(warehouse.id.clone(), warehouse.clone());
        Ok(())
    }

    async fn set_warehouse_status(&self, id: &str, enabled: bool) -> Result<bool> {
        let mut state = self.state()?;
        match state.warehouses.get_mut(id) {
            Some(warehouse) => {
                warehouse.enabled = enabled;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn find_warehouses(&self, query: &WarehouseQuery) -> Result<Vec<Warehouse>> {
        let state = self.state()?;
        Ok(state
            .warehouses
            .values()
            .filter(|w| query.ids.is_empty() || query.ids.contains(&w.id))
            .filter(|w| query.name.as_ref().map_or(true, |name| &w.name == name))
            .filter(|w| query.enabled.map_or(true, |enabled| w.enabled == enabled))
            .cloned()
            .collect())
    }

    async fn insert_shop(&self, shop: &Shop) -> Result<()> {
        let mut state = self.state()?;
        if state.shops.values().any(|s| s.name == shop.name) || state.shops.contains_key(&shop.id) {
            return Err(CommerceError::UniqueViolation);
        }
        state.shops.insert(shop.id.clone(), shop.clone());
        Ok(())
    }

    async fn find_shops(&self, query: &ShopQuery) -> Result<Vec<Shop>> {
        let state = self.state()?;
        Ok(state
            .shops
            .values()
            .filter(|s| query.ids.is_empty() || query.ids.contains(&s.id))
            .filter(|s| query.name.as_ref().map_or(true, |name| &s.name == name))
            .cloned()
            .collect())
    }

    async fn upsert_shop_warehouses(&self, request: &BindShopWarehousesRequest) -> Result<()> {
        let mut state = self.state()?;
        for binding in request.bindings() {
            state
                .bindings
                .insert((binding.shop_id, binding.warehouse_id), binding.enabled);
        }
        Ok(())
    }

    async fn create_product(&self, product: &Product, initial: &ProductWarehouse) -> Result<()> {
        let mut state = self.state()?;
        if state.products.values().any(|p| p.name == product.name)
            || state.products.contains_key(&product.id)
        {
            return Err(CommerceError::UniqueViolation);
        }
        state.check_delta(&initial.product_id, &initial.warehouse_id, initial.total_stock)?;
        state.products.insert(product.id.clone(), product.clone());
        state.apply_delta(&initial.product_id, &initial.warehouse_id, initial.total_stock);
        Ok(())
    }

    async fn find_product_by_name(&self, name: &str) -> Result<Product> {
        let state = self.state()?;
        state
            .products
            .values()
            .find(|p| p.name == name)
            .cloned()
            .ok_or_else(|| CommerceError::not_found(format!("product with name '{}'", name)))
    }

    async fn product_details_by_shop(&self, query: &ProductDetailsQuery) -> Result<Vec<ProductDetail>> {
        let state = self.state()?;
        let details = state
            .stock
            .iter()
            .filter(|((product_id, _), _)| {
                query.product_ids.is_empty() || query.product_ids.contains(product_id)
            })
            .filter(|((_, warehouse_id), _)| {
                state
                    .bindings
                    .get(&(query.shop_id.clone(), warehouse_id.clone()))
                    .copied()
                    .unwrap_or(false)
            })
            .filter_map(|((product_id, warehouse_id), total_stock)| {
                state.products.get(product_id).map(|product| ProductDetail {
                    product_id: product.id.clone(),
                    name: product.name.clone(),
                    price: product.price,
                    total_stock: *total_stock,
                    warehouse_id: warehouse_id.clone(),
                })
            });

        Ok(match query.page {
            Some(page) => {
                let page = page.normalized();
                details
                    .skip(page.offset() as usize)
                    .take(page.page_size as usize)
                    .collect()
            }
            None => details.collect(),
        })
    }

    async fn find_stock(&self, product_id: &str, warehouse_id: &str) -> Result<Option<ProductWarehouse>> {
        let state = self.state()?;
        Ok(state
            .stock
            .get(&(product_id.to_string(), warehouse_id.to_string()))
            .map(|total_stock| ProductWarehouse {
                product_id: product_id.to_string(),
                warehouse_id: warehouse_id.to_string(),
                total_stock: *total_stock,
            }))
    }

    async fn adjust_stock(&self, product_id: &str, warehouse_id: &str, delta: i32) -> Result<()> {
        let mut state = self.state()?;
        state.check_delta(product_id, warehouse_id, delta)?;
        state.apply_delta(product_id, warehouse_id, delta);
        Ok(())
    }

    async fn set_stock(&self, request: &UpdateStockRequest) -> Result<bool> {
        let mut state = self.state()?;
        match state
            .stock
            .get_mut(&(request.product_id.clone(), request.warehouse_id.clone()))
        {
            Some(total_stock) => {
                *total_stock = request.total_stock;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn transfer_stock(
        &self,
        product_id: &str,
        source_warehouse_id: &str,
        destination_warehouse_id: &str,
        quantity: i32,
    ) -> Result<()> {
        let mut state = self.state()?;
        state.check_delta(product_id, source_warehouse_id, -quantity)?;
        state.check_delta(product_id, destination_warehouse_id, quantity)?;
        state.apply_delta(product_id, source_warehouse_id, -quantity);
        state.apply_delta(product_id, destination_warehouse_id, quantity);
        Ok(())
    }
}

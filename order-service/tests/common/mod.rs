#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use inventory_service::{InMemoryInventoryRepository, InventoryHandler, InventoryRepository};
use order_service::api::AppState;
use order_service::{
    AvailabilityCalculator, InMemoryOrderRepository, InMemoryReservationStore, OrderHandler,
    Reconciler, ReservationStore, SettlementEngine,
};
use shared::{
    BindShopWarehousesRequest, CommerceConfig, CreateProductRequest, CreateShopRequest,
    CreateWarehouseRequest, OrderItemRequest, PlaceOrderRequest, ReservationKey,
    UpdateWarehouseStatusRequest,
};

pub const PRICE: i64 = 50;
pub const INITIAL_STOCK: i32 = 10;

/// One shop bound to one enabled warehouse that stocks one product.
pub struct Fixture {
    pub inventory: Arc<InMemoryInventoryRepository>,
    pub order_repo: Arc<InMemoryOrderRepository>,
    pub reservations: Arc<InMemoryReservationStore>,
    pub inventory_handler: Arc<InventoryHandler>,
    pub orders: Arc<OrderHandler>,
    pub settlement: Arc<SettlementEngine>,
    pub availability: Arc<AvailabilityCalculator>,
    pub shop_id: String,
    pub warehouse_id: String,
    pub product_id: String,
}

impl Fixture {
    pub async fn new() -> Self {
        Self::with_ttl(Duration::from_secs(60)).await
    }

    pub async fn with_ttl(ttl: Duration) -> Self {
        let config = CommerceConfig::default().with_reservation_ttl(ttl);
        let inventory = Arc::new(InMemoryInventoryRepository::new());
        let order_repo = Arc::new(InMemoryOrderRepository::new());
        let reservations = Arc::new(InMemoryReservationStore::new(ttl));

        let inventory_handler = Arc::new(InventoryHandler::new(inventory.clone(), config.clone()));
        let availability = Arc::new(AvailabilityCalculator::new(inventory.clone(), reservations.clone()));
        let orders = Arc::new(OrderHandler::new(
            inventory.clone(),
            order_repo.clone(),
            reservations.clone(),
            availability.clone(),
            config.clone(),
        ));
        let reconciler =
            Reconciler::new(order_repo.clone(), inventory.clone(), reservations.clone()).spawn();
        let settlement = Arc::new(SettlementEngine::new(order_repo.clone(), reconciler));

        let warehouse_id = inventory_handler
            .create_warehouse(&CreateWarehouseRequest { name: "Jakarta".to_string() })
            .await
            .unwrap();
        inventory_handler
            .update_warehouse_status(&UpdateWarehouseStatusRequest {
                id: warehouse_id.clone(),
                enabled: true,
            })
            .await
            .unwrap();
        let shop_id = inventory_handler
            .create_shop(&CreateShopRequest { name: "Corner".to_string() })
            .await
            .unwrap();
        inventory_handler
            .bind_shop_to_warehouses(&BindShopWarehousesRequest {
                shop_id: shop_id.clone(),
                warehouse_ids: vec![warehouse_id.clone()],
                enabled: true,
            })
            .await
            .unwrap();
        let product_id = inventory_handler
            .create_product(&CreateProductRequest {
                name: "Kopi".to_string(),
                price: PRICE,
                total_stock: INITIAL_STOCK,
                warehouse_id: warehouse_id.clone(),
            })
            .await
            .unwrap();

        Self {
            inventory,
            order_repo,
            reservations,
            inventory_handler,
            orders,
            settlement,
            availability,
            shop_id,
            warehouse_id,
            product_id,
        }
    }

    pub fn app_state(&self) -> AppState {
        AppState {
            inventory: self.inventory_handler.clone(),
            orders: self.orders.clone(),
            settlement: self.settlement.clone(),
            availability: self.availability.clone(),
        }
    }

    pub fn order_request(&self, user_id: &str, quantity: i32) -> PlaceOrderRequest {
        PlaceOrderRequest {
            shop_id: self.shop_id.clone(),
            user_id: user_id.to_string(),
            items: vec![OrderItemRequest {
                product_id: self.product_id.clone(),
                quantity,
            }],
        }
    }

    /// Adds another product stocked in the fixture warehouse.
    pub async fn add_product(&self, name: &str, price: i64, stock: i32) -> String {
        self.inventory_handler
            .create_product(&CreateProductRequest {
                name: name.to_string(),
                price,
                total_stock: stock,
                warehouse_id: self.warehouse_id.clone(),
            })
            .await
            .unwrap()
    }

    pub async fn stock_of(&self, product_id: &str, warehouse_id: &str) -> i32 {
        self.inventory
            .find_stock(product_id, warehouse_id)
            .await
            .unwrap()
            .map_or(0, |row| row.total_stock)
    }

    pub async fn hold(&self, product_id: &str, warehouse_id: &str, user_id: &str) -> Option<i32> {
        self.reservations
            .get(&ReservationKey::new(product_id, warehouse_id, user_id))
            .await
            .unwrap()
    }

    pub fn reservation_key(&self, user_id: &str) -> ReservationKey {
        ReservationKey::new(&self.product_id, &self.warehouse_id, user_id)
    }

    pub async fn reservation(&self, user_id: &str) -> Option<i32> {
        self.reservations.get(&self.reservation_key(user_id)).await.unwrap()
    }

    pub async fn ledger(&self) -> i32 {
        self.stock_of(&self.product_id, &self.warehouse_id).await
    }

    pub async fn available(&self) -> i32 {
        self.availability
            .available(&self.product_id, &self.warehouse_id)
            .await
            .unwrap()
    }

    /// Polls until the reconciler has released the user's hold and the
    /// ledger reads `expected`.
    pub async fn wait_for_reconciliation(&self, user_id: &str, expected: i32) {
        let settled = async {
            loop {
                if self.reservation(user_id).await.is_none() && self.ledger().await == expected {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        };
        tokio::time::timeout(Duration::from_secs(2), settled)
            .await
            .expect("reconciliation did not finish in time");
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub mod config;
pub mod error;
pub mod serial;

pub use config::CommerceConfig;
pub use error::{db_error, CommerceError, OperationContext, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warehouse {
    pub id: String,
    pub name: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shop {
    pub id: String,
    pub name: String,
}

/// A shop only sells from the warehouses whose binding is enabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopWarehouse {
    pub shop_id: String,
    pub warehouse_id: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub price: i64,
}

/// Ledger row: authoritative total stock of a product in one warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductWarehouse {
    pub product_id: String,
    pub warehouse_id: String,
    pub total_stock: i32,
}

/// A product as sold by a shop through one of its warehouses.
///
/// `total_stock` holds the ledger value when read from the durable store and
/// the live-adjusted availability once reservations have been subtracted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDetail {
    pub product_id: String,
    pub name: String,
    pub price: i64,
    pub total_stock: i32,
    pub warehouse_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Succeeded,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Succeeded => "succeeded",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = CommerceError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "succeeded" => Ok(OrderStatus::Succeeded),
            other => Err(CommerceError::internal(
                "parse order status",
                anyhow::anyhow!("unknown order status '{}'", other),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub user_id: String,
    pub shop_id: String,
    pub amount: i64,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Order {
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at >= now
    }
}

/// Line item. `unit_price` is the product price captured when the order was placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub order_id: Uuid,
    pub product_id: String,
    pub shop_id: String,
    pub warehouse_id: String,
    pub quantity: i32,
    pub unit_price: i64,
}

impl OrderItem {
    /// `None` when the line total does not fit in an `i64`.
    pub fn subtotal(&self) -> Option<i64> {
        i64::from(self.quantity).checked_mul(self.unit_price)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Paid => "paid",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub user_id: String,
    pub amount: i64,
    pub status: PaymentStatus,
}

/// Identifies one user's hold on a product in a warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReservationKey {
    pub product_id: String,
    pub warehouse_id: String,
    pub user_id: String,
}

impl ReservationKey {
    pub fn new(
        product_id: impl Into<String>,
        warehouse_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            warehouse_id: warehouse_id.into(),
            user_id: user_id.into(),
        }
    }
}

const DEFAULT_PAGE: i64 = 1;
const DEFAULT_PAGE_SIZE: i64 = 10;
const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub page: i64,
    pub page_size: i64,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Page {
    /// Out-of-range values fall back to the defaults rather than failing.
    pub fn normalized(self) -> Self {
        if self.page <= 0 || self.page_size <= 0 || self.page_size > MAX_PAGE_SIZE {
            return Self::default();
        }
        if self.checked_offset().is_none() {
            return Self::default();
        }
        self
    }

    pub fn offset(&self) -> i64 {
        self.checked_offset().unwrap_or(0)
    }

    fn checked_offset(&self) -> Option<i64> {
        self.page.checked_sub(1)?.checked_mul(self.page_size)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateWarehouseRequest {
    pub name: String,
}

impl CreateWarehouseRequest {
    pub fn validate(&self) -> Result<()> {
        require(&self.name, "create warehouse", "name")
    }
}

#[derive(Debug, Clone)]
pub struct UpdateWarehouseStatusRequest {
    pub id: String,
    pub enabled: bool,
}

impl UpdateWarehouseStatusRequest {
    pub fn validate(&self) -> Result<()> {
        require(&self.id, "update warehouse status", "id")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateShopRequest {
    pub name: String,
}

impl CreateShopRequest {
    pub fn validate(&self) -> Result<()> {
        require(&self.name, "create shop", "name")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindShopWarehousesRequest {
    pub shop_id: String,
    pub warehouse_ids: Vec<String>,
    pub enabled: bool,
}

impl BindShopWarehousesRequest {
    pub fn validate(&self) -> Result<()> {
        require(&self.shop_id, "bind shop to warehouses", "shop id")?;
        if self.warehouse_ids.is_empty() {
            return Err(CommerceError::bad_request(
                "bind shop to warehouses: warehouse ids are mandatory",
            ));
        }
        Ok(())
    }

    pub fn bindings(&self) -> Vec<ShopWarehouse> {
        self.warehouse_ids
            .iter()
            .map(|warehouse_id| ShopWarehouse {
                shop_id: self.shop_id.clone(),
                warehouse_id: warehouse_id.clone(),
                enabled: self.enabled,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub price: i64,
    pub total_stock: i32,
    pub warehouse_id: String,
}

impl CreateProductRequest {
    pub fn validate(&self) -> Result<()> {
        require(&self.name, "create product", "name")?;
        if self.price <= 0 {
            return Err(CommerceError::bad_request(
                "create product: price must be more than zero",
            ));
        }
        if self.total_stock <= 0 {
            return Err(CommerceError::bad_request(
                "create product: total stock must be more than zero",
            ));
        }
        require(&self.warehouse_id, "create product", "warehouse id")
    }
}

/// Absolute stock correction for one ledger row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStockRequest {
    pub product_id: String,
    pub warehouse_id: String,
    pub total_stock: i32,
}

impl UpdateStockRequest {
    pub fn validate(&self) -> Result<()> {
        require(&self.product_id, "update product stock", "product id")?;
        require(&self.warehouse_id, "update product stock", "warehouse id")?;
        if self.total_stock < 0 {
            return Err(CommerceError::bad_request(
                "update product stock: total stock must not be negative",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferProductRequest {
    pub product_id: String,
    pub source_warehouse_id: String,
    pub destination_warehouse_id: String,
    pub quantity: i32,
}

impl TransferProductRequest {
    pub fn validate(&self) -> Result<()> {
        require(&self.product_id, "transfer product", "product id")?;
        require(&self.source_warehouse_id, "transfer product", "source warehouse id")?;
        require(
            &self.destination_warehouse_id,
            "transfer product",
            "destination warehouse id",
        )?;
        if self.source_warehouse_id == self.destination_warehouse_id {
            return Err(CommerceError::bad_request(
                "transfer product: source and destination warehouse must differ",
            ));
        }
        if self.quantity <= 0 {
            return Err(CommerceError::bad_request(
                "transfer product: quantity must be more than zero",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItemRequest {
    pub product_id: String,
    pub quantity: i32,
}

#[derive(Debug, Clone)]
pub struct PlaceOrderRequest {
    pub shop_id: String,
    pub user_id: String,
    pub items: Vec<OrderItemRequest>,
}

impl PlaceOrderRequest {
    pub fn validate(&self) -> Result<()> {
        require(&self.shop_id, "place order", "shop id")?;
        require(&self.user_id, "place order", "user id")?;
        if self.items.is_empty() {
            return Err(CommerceError::bad_request("place order: items are mandatory"));
        }

        let mut seen = HashSet::new();
        for item in &self.items {
            require(&item.product_id, "place order", "product id")?;
            if item.quantity <= 0 {
                return Err(CommerceError::bad_request(format!(
                    "place order: quantity of product '{}' must be more than zero",
                    item.product_id
                )));
            }
            // one reservation key per (product, warehouse, user), so a repeated
            // product would silently overwrite its own hold
            if !seen.insert(item.product_id.as_str()) {
                return Err(CommerceError::bad_request(format!(
                    "place order: product '{}' is listed more than once",
                    item.product_id
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct PayOrderRequest {
    pub order_id: Uuid,
    pub amount: i64,
    pub user_id: String,
}

impl PayOrderRequest {
    pub fn validate(&self) -> Result<()> {
        if self.order_id.is_nil() {
            return Err(CommerceError::bad_request("pay order: order id is mandatory"));
        }
        require(&self.user_id, "pay order", "user id")
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProductDetailsQuery {
    pub shop_id: String,
    pub product_ids: Vec<String>,
    pub page: Option<Page>,
}

fn require(value: &str, operation: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(CommerceError::bad_request(format!(
            "{}: {} is mandatory",
            operation, field
        )));
    }
    Ok(())
}

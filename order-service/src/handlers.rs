use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use inventory_service::InventoryRepository;
use shared::{
    CommerceConfig, CommerceError, Order, OrderItem, OrderStatus, PlaceOrderRequest,
    ProductDetail, ProductDetailsQuery, ReservationKey, Result,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::availability::AvailabilityCalculator;
use crate::repository::OrderRepository;
use crate::reservation::ReservationStore;

/// Places orders: picks a warehouse per item, holds the stock, prices the
/// order from the catalogue and persists it as pending.
pub struct OrderHandler {
    inventory: Arc<dyn InventoryRepository>,
    orders: Arc<dyn OrderRepository>,
    reservations: Arc<dyn ReservationStore>,
    availability: Arc<AvailabilityCalculator>,
    config: CommerceConfig,
}

impl OrderHandler {
    pub fn new(
        inventory: Arc<dyn InventoryRepository>,
        orders: Arc<dyn OrderRepository>,
        reservations: Arc<dyn ReservationStore>,
        availability: Arc<AvailabilityCalculator>,
        config: CommerceConfig,
    ) -> Self {
        Self {
            inventory,
            orders,
            reservations,
            availability,
            config,
        }
    }

    /// Returns the id of the new pending order.
    ///
    /// Items are reserved one at a time. When a later item fails, holds
    /// already written for earlier items stay in place until their TTL runs
    /// out; no order row exists for them.
    pub async fn place_order(&self, request: &PlaceOrderRequest) -> Result<Uuid> {
        request.validate()?;
        let ttl = self.config.reservation_ttl_chrono()?;

        let candidates = self.candidates(request).await?;
        let order_id = Uuid::new_v4();
        let mut items = Vec::with_capacity(request.items.len());
        let mut amount: i64 = 0;

        for item in &request.items {
            let options = candidates.get(&item.product_id).ok_or_else(|| {
                CommerceError::bad_request(format!(
                    "place order: product '{}' is not sold by shop '{}'",
                    item.product_id, request.shop_id
                ))
            })?;
            let chosen = self.pick_warehouse(options, item.quantity).await?;

            let line = OrderItem {
                order_id,
                product_id: chosen.product_id.clone(),
                shop_id: request.shop_id.clone(),
                warehouse_id: chosen.warehouse_id.clone(),
                quantity: item.quantity,
                unit_price: chosen.price,
            };
            // priced before the hold is written, so an oversized line leaves no hold
            amount = line
                .subtotal()
                .and_then(|subtotal| amount.checked_add(subtotal))
                .ok_or_else(|| {
                    CommerceError::bad_request(format!(
                        "place order: amount overflows at product '{}' x {}",
                        line.product_id, line.quantity
                    ))
                })?;

            let key = ReservationKey::new(&chosen.product_id, &chosen.warehouse_id, &request.user_id);
            self.reservations.reserve(&key, item.quantity).await?;
            items.push(line);
        }

        let now = Utc::now();
        let order = Order {
            id: order_id,
            user_id: request.user_id.clone(),
            shop_id: request.shop_id.clone(),
            amount,
            status: OrderStatus::Pending,
            created_at: now,
            expires_at: now + ttl,
        };

        self.orders.insert_order(&order, &items).await?;
        info!(
            "Order {} placed by user {} for {} item(s), amount {}",
            order.id,
            order.user_id,
            items.len(),
            order.amount
        );
        Ok(order.id)
    }

    /// Every (product, warehouse) the shop can sell each requested product
    /// from, ordered by warehouse id.
    async fn candidates(&self, request: &PlaceOrderRequest) -> Result<HashMap<String, Vec<ProductDetail>>> {
        let details = self
            .inventory
            .product_details_by_shop(&ProductDetailsQuery {
                shop_id: request.shop_id.clone(),
                product_ids: request.items.iter().map(|i| i.product_id.clone()).collect(),
                page: None,
            })
            .await?;

        let mut candidates: HashMap<String, Vec<ProductDetail>> = HashMap::new();
        for detail in details {
            candidates.entry(detail.product_id.clone()).or_default().push(detail);
        }
        for options in candidates.values_mut() {
            options.sort_by(|a, b| a.warehouse_id.cmp(&b.warehouse_id));
        }
        Ok(candidates)
    }

    /// First warehouse whose available stock covers the whole quantity.
    async fn pick_warehouse<'a>(&self, options: &'a [ProductDetail], quantity: i32) -> Result<&'a ProductDetail> {
        let mut best = 0;
        for option in options {
            let available = self
                .availability
                .available(&option.product_id, &option.warehouse_id)
                .await?;
            if available >= quantity {
                return Ok(option);
            }
            best = best.max(available);
        }

        let product_id = options.first().map_or("", |o| o.product_id.as_str());
        warn!(
            "Reservation rejected for product {}: requested {}, best warehouse has {}",
            product_id, quantity, best
        );
        Err(CommerceError::bad_request(format!(
            "place order: insufficient stock for product '{}', requested {} but only {} available",
            product_id, quantity, best
        )))
    }
}

use std::time::Duration;

use crate::error::{CommerceError, OperationContext, Result};

/// Settings handed to the inventory and order components at construction.
#[derive(Debug, Clone)]
pub struct CommerceConfig {
    /// How long a reservation holds stock, and how long an order stays payable.
    pub reservation_ttl: Duration,
    pub warehouse_prefix: String,
    pub shop_prefix: String,
    pub product_prefix: String,
}

impl Default for CommerceConfig {
    fn default() -> Self {
        Self {
            reservation_ttl: Duration::from_secs(60),
            warehouse_prefix: "WRH".to_string(),
            shop_prefix: "SHP".to_string(),
            product_prefix: "PRD".to_string(),
        }
    }
}

impl CommerceConfig {
    pub fn with_reservation_ttl(mut self, ttl: Duration) -> Self {
        self.reservation_ttl = ttl;
        self
    }

    pub fn reservation_ttl_chrono(&self) -> Result<chrono::Duration> {
        chrono::Duration::from_std(self.reservation_ttl).during("convert reservation ttl")
    }

    /// A zero TTL would make every reservation write fail, and the order
    /// expiry has to be expressible with the same TTL.
    pub fn validate(&self) -> Result<()> {
        if self.reservation_ttl.is_zero() {
            return Err(CommerceError::bad_request(
                "config: reservation ttl must be more than zero",
            ));
        }
        self.reservation_ttl_chrono().map(|_| ())
    }
}

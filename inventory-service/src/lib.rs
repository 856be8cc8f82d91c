pub mod handlers;
pub mod memory;
pub mod models;
pub mod repository;
pub mod schema;
pub mod transfer;

pub use handlers::InventoryHandler;
pub use memory::InMemoryInventoryRepository;
pub use repository::{DbPool, InventoryRepository, PgInventoryRepository, ShopQuery, WarehouseQuery};

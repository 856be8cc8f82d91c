pub mod api;
pub mod availability;
pub mod handlers;
pub mod memory;
pub mod models;
pub mod reconcile;
pub mod repository;
pub mod reservation;
pub mod schema;
pub mod settlement;

pub use availability::AvailabilityCalculator;
pub use handlers::OrderHandler;
pub use memory::InMemoryOrderRepository;
pub use reconcile::{ReconcileHandle, ReconcileJob, ReconcileOutcome, Reconciler};
pub use repository::{DbPool, OrderRepository, PgOrderRepository};
pub use reservation::{InMemoryReservationStore, RedisReservationStore, ReservationStore};
pub use settlement::SettlementEngine;

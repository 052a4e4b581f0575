// Roost - bounded thread pool with per-thread object affinity
//
// This crate implements the pool side of the roost-api contracts: a manager
// that houses long-lived objects on a bounded set of lazily spawned worker
// threads, balances load across them, and tears a worker down once its last
// object has been evicted.

pub mod config;
pub mod logging;
pub mod pool;

// Re-export commonly used types
pub use config::PoolConfig;
pub use pool::AffinityPool;
pub use roost_api::errors::{AdoptError, VisitError};
pub use roost_api::identity::{ResidentId, WorkerId};
pub use roost_api::resident::{BoxedResident, Resident};

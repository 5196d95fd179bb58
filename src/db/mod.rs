pub mod memory;
pub mod postgres;
pub mod store;
pub mod timeout;

pub use memory::MemoryCatalogStore;
pub use postgres::{create_pool, PgCatalogStore};
#[cfg(test)]
pub use store::MockCatalogStore;
pub use store::CatalogStore;
pub use timeout::TimeoutStore;

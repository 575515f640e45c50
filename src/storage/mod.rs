use async_trait::async_trait;

use crate::crawler::models::CarListing;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStorage;
pub use postgres::PgStorage;

/// Dedup-on-write persistence gateway. `save` returns whether a new row was
/// inserted; an already-stored natural key is a no-op, never an error.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn save(&self, listing: &CarListing) -> anyhow::Result<bool>;
}

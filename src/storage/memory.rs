use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::crawler::models::CarListing;
use crate::storage::Storage;

/// In-memory gateway with the same dedup-by-url contract as the Postgres
/// backend. Used by the integration tests.
#[derive(Default)]
pub struct MemoryStorage {
    rows: Mutex<Vec<CarListing>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn rows(&self) -> Vec<CarListing> {
        self.rows.lock().await.clone()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn save(&self, listing: &CarListing) -> anyhow::Result<bool> {
        let mut rows = self.rows.lock().await;
        if rows.iter().any(|row| row.url == listing.url) {
            return Ok(false);
        }
        rows.push(listing.clone());
        Ok(true)
    }
}

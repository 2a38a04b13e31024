//! Allocation policy over the inventory store.
//!
//! Translates a (duration tier, traffic) request into the bucket key and
//! takes exactly one token. A failed allocation is terminal for that
//! attempt; there are no retries, the caller must re-query availability.

use std::sync::Arc;

use super::store::{InventoryError, InventoryStore};

#[derive(Clone)]
pub struct Allocator {
    store: Arc<InventoryStore>,
}

impl Allocator {
    pub fn new(store: Arc<InventoryStore>) -> Self {
        Self { store }
    }

    /// Reserve the oldest token in the tier's bucket.
    pub async fn reserve(
        &self,
        duration_tier: u32,
        traffic_gb: u32,
    ) -> Result<String, InventoryError> {
        self.store.take_one(duration_tier, traffic_gb).await
    }

    /// Compensating release of a previously reserved token. Must be called
    /// at most once per failed reservation.
    pub async fn release(
        &self,
        token: &str,
        duration_tier: u32,
        traffic_gb: u32,
    ) -> Result<(), InventoryError> {
        self.store.put_back(token, duration_tier, traffic_gb).await
    }

    /// Tokens currently offered for a tier.
    pub async fn availability(&self, duration_tier: u32, traffic_gb: u32) -> usize {
        self.store.peek_available(duration_tier, traffic_gb).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reserve_and_release_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let store =
            Arc::new(InventoryStore::open(&dir.path().join("inventory.json")).unwrap());
        store.add_tokens(1, 30, vec!["tokA".into()]).await.unwrap();

        let allocator = Allocator::new(store);
        assert_eq!(allocator.availability(1, 30).await, 1);

        let token = allocator.reserve(1, 30).await.unwrap();
        assert_eq!(allocator.availability(1, 30).await, 0);
        assert!(allocator.reserve(1, 30).await.is_err());

        allocator.release(&token, 1, 30).await.unwrap();
        assert_eq!(allocator.availability(1, 30).await, 1);
    }
}

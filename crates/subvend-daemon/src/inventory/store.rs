//! JSON-file-backed inventory of unassigned access tokens.
//!
//! Buckets are keyed by stringified duration tier, then stringified
//! traffic quota, each holding a FIFO queue of opaque token strings.
//! All mutation goes through one in-process lock (the single-writer
//! serialization point), and every mutation is flushed to disk before
//! the call returns, so a crash can neither lose nor duplicate a token.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::io::Write;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use tracing::{debug, info};

type Buckets = HashMap<String, HashMap<String, VecDeque<String>>>;

/// Errors from the inventory store.
#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    /// The bucket for the requested tier is empty or absent.
    #[error("no tokens available for duration tier {duration_tier}, {traffic_gb}GB")]
    NotAvailable { duration_tier: u32, traffic_gb: u32 },

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for InventoryError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// Persistent store of unassigned tokens, one FIFO queue per tier.
pub struct InventoryStore {
    path: PathBuf,
    buckets: Mutex<Buckets>,
}

impl InventoryStore {
    /// Open the inventory file, starting empty when it does not exist.
    pub fn open(path: &Path) -> Result<Self, InventoryError> {
        let buckets: Buckets = if path.exists() {
            let data = std::fs::read_to_string(path)?;
            serde_json::from_str(&data).map_err(|e| {
                InventoryError::Serialization(format!("Failed to parse inventory file: {e}"))
            })?
        } else {
            Buckets::default()
        };

        info!(path = %path.display(), "Inventory opened");

        Ok(Self { path: path.to_path_buf(), buckets: Mutex::new(buckets) })
    }

    /// Tokens currently available for a tier. Read-only, but taken under
    /// the same lock the mutations use, so it never observes a torn state.
    pub async fn peek_available(&self, duration_tier: u32, traffic_gb: u32) -> usize {
        let buckets = self.buckets.lock().await;
        bucket(&buckets, duration_tier, traffic_gb).map_or(0, VecDeque::len)
    }

    /// Remove and return the oldest token in the tier's bucket.
    ///
    /// The removal is flushed to disk before the token is returned; if the
    /// flush fails the token is put back at the head so memory and disk
    /// stay in agreement.
    pub async fn take_one(
        &self,
        duration_tier: u32,
        traffic_gb: u32,
    ) -> Result<String, InventoryError> {
        let mut buckets = self.buckets.lock().await;

        let token = bucket_mut(&mut buckets, duration_tier, traffic_gb)
            .and_then(VecDeque::pop_front)
            .ok_or(InventoryError::NotAvailable { duration_tier, traffic_gb })?;

        if let Err(e) = self.persist(&buckets) {
            if let Some(queue) = bucket_mut(&mut buckets, duration_tier, traffic_gb) {
                queue.push_front(token);
            }
            return Err(e);
        }

        debug!(duration_tier, traffic_gb, "Token taken from inventory");
        Ok(token)
    }

    /// Re-append a token to the tail of its bucket (compensation after a
    /// failed purchase, or a refund). Callers must put a token back at
    /// most once per failed allocation; the store does not deduplicate.
    pub async fn put_back(
        &self,
        token: &str,
        duration_tier: u32,
        traffic_gb: u32,
    ) -> Result<(), InventoryError> {
        let mut buckets = self.buckets.lock().await;

        buckets
            .entry(duration_tier.to_string())
            .or_default()
            .entry(traffic_gb.to_string())
            .or_default()
            .push_back(token.to_string());

        if let Err(e) = self.persist(&buckets) {
            if let Some(queue) = bucket_mut(&mut buckets, duration_tier, traffic_gb) {
                queue.pop_back();
            }
            return Err(e);
        }

        debug!(duration_tier, traffic_gb, "Token returned to inventory");
        Ok(())
    }

    /// Restock a bucket with newly provisioned tokens (admin operation).
    pub async fn add_tokens(
        &self,
        duration_tier: u32,
        traffic_gb: u32,
        tokens: Vec<String>,
    ) -> Result<usize, InventoryError> {
        let mut buckets = self.buckets.lock().await;
        let added = tokens.len();

        buckets
            .entry(duration_tier.to_string())
            .or_default()
            .entry(traffic_gb.to_string())
            .or_default()
            .extend(tokens);

        self.persist(&buckets)?;
        info!(duration_tier, traffic_gb, added, "Inventory restocked");
        Ok(added)
    }

    /// Remove a specific token from a bucket (admin cull). Returns whether
    /// the token was present.
    pub async fn remove_token(
        &self,
        token: &str,
        duration_tier: u32,
        traffic_gb: u32,
    ) -> Result<bool, InventoryError> {
        let mut buckets = self.buckets.lock().await;

        let Some(queue) = bucket_mut(&mut buckets, duration_tier, traffic_gb) else {
            return Ok(false);
        };
        let Some(position) = queue.iter().position(|t| t == token) else {
            return Ok(false);
        };
        queue.remove(position);

        self.persist(&buckets)?;
        Ok(true)
    }

    /// Total tokens across all buckets.
    pub async fn total_tokens(&self) -> usize {
        let buckets = self.buckets.lock().await;
        buckets.values().flat_map(HashMap::values).map(VecDeque::len).sum()
    }

    /// Per-bucket counts, sorted by tier, for admin stat views.
    pub async fn bucket_counts(&self) -> BTreeMap<(String, String), usize> {
        let buckets = self.buckets.lock().await;
        buckets
            .iter()
            .flat_map(|(d, by_traffic)| {
                by_traffic.iter().map(move |(t, queue)| ((d.clone(), t.clone()), queue.len()))
            })
            .collect()
    }

    /// Write the bucket map to a temp file, fsync, then rename over the
    /// live file so a crash mid-write leaves the previous snapshot intact.
    fn persist(&self, buckets: &Buckets) -> Result<(), InventoryError> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(buckets).map_err(|e| {
            InventoryError::Serialization(format!("Failed to serialize inventory: {e}"))
        })?;

        let tmp = self.path.with_extension("json.tmp");
        let mut file = std::fs::File::create(&tmp)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

fn bucket<'a>(
    buckets: &'a Buckets,
    duration_tier: u32,
    traffic_gb: u32,
) -> Option<&'a VecDeque<String>> {
    buckets.get(&duration_tier.to_string())?.get(&traffic_gb.to_string())
}

fn bucket_mut<'a>(
    buckets: &'a mut Buckets,
    duration_tier: u32,
    traffic_gb: u32,
) -> Option<&'a mut VecDeque<String>> {
    buckets.get_mut(&duration_tier.to_string())?.get_mut(&traffic_gb.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_at(dir: &tempfile::TempDir) -> InventoryStore {
        InventoryStore::open(&dir.path().join("inventory.json")).unwrap()
    }

    #[tokio::test]
    async fn take_is_fifo() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_at(&dir);
        store
            .add_tokens(3, 30, vec!["tokA".into(), "tokB".into()])
            .await
            .unwrap();

        assert_eq!(store.take_one(3, 30).await.unwrap(), "tokA");
        assert_eq!(store.take_one(3, 30).await.unwrap(), "tokB");
        assert!(matches!(
            store.take_one(3, 30).await,
            Err(InventoryError::NotAvailable { duration_tier: 3, traffic_gb: 30 })
        ));
    }

    #[tokio::test]
    async fn take_from_absent_bucket_is_not_available() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_at(&dir);
        assert!(store.take_one(1, 10).await.is_err());
        assert_eq!(store.peek_available(1, 10).await, 0);
    }

    #[tokio::test]
    async fn put_back_appends_to_tail() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_at(&dir);
        store
            .add_tokens(3, 30, vec!["tokA".into(), "tokB".into()])
            .await
            .unwrap();

        let taken = store.take_one(3, 30).await.unwrap();
        store.put_back(&taken, 3, 30).await.unwrap();

        // tokB is now older than the returned tokA.
        assert_eq!(store.take_one(3, 30).await.unwrap(), "tokB");
        assert_eq!(store.take_one(3, 30).await.unwrap(), "tokA");
    }

    #[tokio::test]
    async fn mutations_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inventory.json");
        {
            let store = InventoryStore::open(&path).unwrap();
            store
                .add_tokens(3, 30, vec!["tokA".into(), "tokB".into()])
                .await
                .unwrap();
            store.take_one(3, 30).await.unwrap();
        }

        let reopened = InventoryStore::open(&path).unwrap();
        assert_eq!(reopened.peek_available(3, 30).await, 1);
        assert_eq!(reopened.take_one(3, 30).await.unwrap(), "tokB");
    }

    #[tokio::test]
    async fn file_layout_is_duration_then_traffic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inventory.json");
        std::fs::write(&path, r#"{"3": {"30": ["tokA", "tokB"]}}"#).unwrap();

        let store = InventoryStore::open(&path).unwrap();
        assert_eq!(store.peek_available(3, 30).await, 2);
        assert_eq!(store.take_one(3, 30).await.unwrap(), "tokA");
    }

    #[tokio::test]
    async fn remove_token_culls_specific_entry() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_at(&dir);
        store
            .add_tokens(3, 30, vec!["tokA".into(), "tokB".into()])
            .await
            .unwrap();

        assert!(store.remove_token("tokA", 3, 30).await.unwrap());
        assert!(!store.remove_token("tokA", 3, 30).await.unwrap());
        assert_eq!(store.take_one(3, 30).await.unwrap(), "tokB");
    }

    #[tokio::test]
    async fn totals_and_counts() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_at(&dir);
        store.add_tokens(1, 30, vec!["a".into()]).await.unwrap();
        store
            .add_tokens(3, 0, vec!["b".into(), "c".into()])
            .await
            .unwrap();

        assert_eq!(store.total_tokens().await, 3);
        let counts = store.bucket_counts().await;
        assert_eq!(counts[&("1".to_string(), "30".to_string())], 1);
        assert_eq!(counts[&("3".to_string(), "0".to_string())], 2);
    }

    #[tokio::test]
    async fn corrupted_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inventory.json");
        std::fs::write(&path, "{ not valid json !!!").unwrap();

        let result = InventoryStore::open(&path);
        assert!(matches!(result, Err(InventoryError::Serialization(_))));
    }
}

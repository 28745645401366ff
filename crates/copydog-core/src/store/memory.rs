// # Memory Store
//
// In-memory implementation of KeyValueStore.
//
// ## Purpose
//
// Provides a simple, fast store that doesn't persist across restarts.
// Useful for testing and for dry runs where losing the sync state is fine.
//
// ## Crash Behavior
//
// - All state is lost on restart/crash
// - The next sync pass treats every item as never synced and creates
//   duplicates on the opposite side
//
// ## When to Use
//
// - Testing environments
// - One-off dry runs against scratch boards

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{apply_ops, read_hash, read_string, Entry};
use crate::traits::{KeyValueStore, Transaction};
use crate::Error;

/// In-memory key-value store
///
/// All entries live in a HashMap protected by a RwLock. A transaction is
/// applied to a copy under the write lock and swapped in only if every
/// write succeeded.
///
/// # Example
///
/// ```rust,no_run
/// use copydog_core::store::MemoryStore;
/// use copydog_core::traits::{KeyValueStore, Transaction};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryStore::new();
///
///     store.commit(Transaction::new().set("trello:last_read_time", "2024-01-01T00:00:00Z")).await?;
///
///     let value = store.get("trello:last_read_time").await?;
///     assert_eq!(value.as_deref(), Some("2024-01-01T00:00:00Z"));
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<HashMap<String, Entry>>>,
}

impl MemoryStore {
    /// Create a new empty memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of keys in the store
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let guard = self.inner.read().await;
        read_string(&guard, key)
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, Error> {
        let guard = self.inner.read().await;
        Ok(read_hash(&guard, key)?.and_then(|fields| fields.get(field).cloned()))
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, Error> {
        let guard = self.inner.read().await;
        Ok(read_hash(&guard, key)?
            .map(|fields| fields.clone().into_iter().collect())
            .unwrap_or_default())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, Error> {
        let guard = self.inner.read().await;
        Ok(guard
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn commit(&self, tx: Transaction) -> Result<(), Error> {
        if tx.is_empty() {
            return Ok(());
        }

        let mut guard = self.inner.write().await;
        let mut next = guard.clone();
        apply_ops(&mut next, tx.ops())?;
        *guard = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_basic() {
        let store = MemoryStore::new();

        // Initially empty
        assert!(store.is_empty().await);

        store
            .commit(
                Transaction::new()
                    .set("redmine:last_read_time", "2024-01-01T00:00:00Z")
                    .hset("redmine:items:1", "opposite_id", "card-1"),
            )
            .await
            .unwrap();

        assert_eq!(store.len().await, 2);
        assert_eq!(
            store.hget("redmine:items:1", "opposite_id").await.unwrap(),
            Some("card-1".to_string())
        );
        assert_eq!(store.hget("redmine:items:1", "updated").await.unwrap(), None);

        store
            .commit(Transaction::new().del("redmine:items:1"))
            .await
            .unwrap();
        assert_eq!(store.len().await, 1);
        assert!(store.hgetall("redmine:items:1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_memory_store_failed_commit_applies_nothing() {
        let store = MemoryStore::new();
        store
            .commit(Transaction::new().set("trello:last_read_time", "t0"))
            .await
            .unwrap();

        // Second write is a type error; the first must not land either
        let result = store
            .commit(
                Transaction::new()
                    .hset("trello:items:1", "opposite_id", "7")
                    .hset("trello:last_read_time", "field", "x"),
            )
            .await;

        assert!(result.is_err());
        assert!(store.hgetall("trello:items:1").await.unwrap().is_empty());
        assert_eq!(
            store.get("trello:last_read_time").await.unwrap(),
            Some("t0".to_string())
        );
    }

    #[tokio::test]
    async fn test_memory_store_prefix_scan() {
        let store = MemoryStore::new();
        store
            .commit(
                Transaction::new()
                    .set("redmine:last_read_time", "t")
                    .hset("redmine:items:1", "updated", "t")
                    .set("other:key", "v"),
            )
            .await
            .unwrap();

        let mut keys = store.keys_with_prefix("redmine:").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["redmine:items:1", "redmine:last_read_time"]);
    }
}

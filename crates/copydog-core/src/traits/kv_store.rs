// # Key-Value Store Trait
//
// Defines the interface for the durable key-value backend under sync state.
//
// ## Purpose
//
// The store holds two value shapes, modelled on Redis:
// - Strings (e.g. `redmine:last_read_time`)
// - Hashes of string fields (e.g. `trello:items:{id}`)
//
// Reads are single round-trips. Writes only happen through [`Transaction`]
// batches, which a backend must apply atomically: after `commit` returns an
// error, no write of the batch is observable.
//
// ## Implementations
//
// - Memory: `HashMap` behind a lock (tests, throwaway runs)
// - File: JSON file with atomic rename (single-host deployments)
// - Redis: MULTI/EXEC pipelines (feature `redis`)
//
// ## Usage
//
// ```rust
// use copydog_core::traits::{KeyValueStore, Transaction};
//
// async fn link(store: &dyn KeyValueStore) -> copydog_core::Result<()> {
//     let tx = Transaction::new()
//         .hset("redmine:list_status_mapping", "1", "list-a")
//         .hset("trello:list_status_mapping", "list-a", "1");
//     store.commit(tx).await?;
//
//     let mapped = store.hget("redmine:list_status_mapping", "1").await?;
//     assert_eq!(mapped.as_deref(), Some("list-a"));
//     Ok(())
// }
// ```

use async_trait::async_trait;
use std::collections::HashMap;

/// A single write inside a [`Transaction`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    /// Set a string key, replacing any previous value
    Set { key: String, value: String },
    /// Upsert fields of a hash key, creating the hash if needed
    HashSet {
        key: String,
        fields: Vec<(String, String)>,
    },
    /// Remove fields of a hash key; a hash left without fields is removed
    HashDelete { key: String, fields: Vec<String> },
    /// Remove a key of any type; missing keys are ignored
    Delete { key: String },
}

impl WriteOp {
    /// The key this write touches
    pub fn key(&self) -> &str {
        match self {
            WriteOp::Set { key, .. }
            | WriteOp::HashSet { key, .. }
            | WriteOp::HashDelete { key, .. }
            | WriteOp::Delete { key } => key,
        }
    }
}

/// Ordered batch of writes committed as one unit
///
/// Built fluently and handed to [`KeyValueStore::commit`]. Writes are
/// applied in insertion order, so a later write to the same key wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transaction {
    ops: Vec<WriteOp>,
}

impl Transaction {
    /// Create an empty transaction
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a string write
    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.ops.push(WriteOp::Set {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    /// Queue a single hash field write
    pub fn hset(
        self,
        key: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.hset_multiple(key, [(field.into(), value.into())])
    }

    /// Queue several hash field writes on one key
    pub fn hset_multiple<I>(mut self, key: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.ops.push(WriteOp::HashSet {
            key: key.into(),
            fields: fields.into_iter().collect(),
        });
        self
    }

    /// Queue removal of one hash field
    pub fn hdel(mut self, key: impl Into<String>, field: impl Into<String>) -> Self {
        self.ops.push(WriteOp::HashDelete {
            key: key.into(),
            fields: vec![field.into()],
        });
        self
    }

    /// Queue a key deletion
    pub fn del(mut self, key: impl Into<String>) -> Self {
        self.ops.push(WriteOp::Delete { key: key.into() });
        self
    }

    /// Queued writes, in commit order
    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    /// Number of queued writes
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether nothing is queued
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Consume the batch into its writes
    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

/// Trait for key-value store implementations
///
/// Implementations must be thread-safe and usable across async tasks. The
/// connection or file handle behind a store is shared by every caller; no
/// locking beyond what `commit` guarantees is provided on top.
///
/// # Atomicity
///
/// `commit` is the only write path. A backend either applies every write of
/// the batch or none of them, and reports the failure. Readers never observe
/// half a batch.
///
/// # Durability
///
/// When `commit` returns `Ok`, the batch is persisted as far as the backend
/// persists anything. There is no deferred flush.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Get a string value
    ///
    /// # Returns
    ///
    /// - `Ok(Some(String))`: The stored value
    /// - `Ok(None)`: Key not present
    /// - `Err(Error)`: Backend error, or the key holds a hash
    async fn get(&self, key: &str) -> Result<Option<String>, crate::Error>;

    /// Get one field of a hash
    ///
    /// # Returns
    ///
    /// - `Ok(Some(String))`: The field value
    /// - `Ok(None)`: Key or field not present
    /// - `Err(Error)`: Backend error, or the key holds a string
    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, crate::Error>;

    /// Get every field of a hash
    ///
    /// Returns an empty map when the key is not present.
    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, crate::Error>;

    /// List every key starting with `prefix`
    ///
    /// Cost is proportional to the whole keyspace on every backend.
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, crate::Error>;

    /// Apply a batch of writes atomically
    ///
    /// An empty transaction is a no-op.
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Every write applied and persisted
    /// - `Err(Error)`: Nothing applied
    async fn commit(&self, tx: Transaction) -> Result<(), crate::Error>;
}

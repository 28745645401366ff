// # Key-Value Store Implementations
//
// This module provides implementations of the KeyValueStore trait for
// different persistence strategies, plus the shared in-process entry model
// that the memory and file stores apply transactions to.

pub mod file;
pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;

pub use file::FileStore;
pub use memory::MemoryStore;
#[cfg(feature = "redis")]
pub use self::redis::RedisStore;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::config::StoreConfig;
use crate::traits::{KeyValueStore, WriteOp};
use crate::Error;

/// A stored value
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Entry {
    String(String),
    Hash(BTreeMap<String, String>),
}

/// Build the backend described by `config`
pub async fn open(config: &StoreConfig) -> Result<Arc<dyn KeyValueStore>, Error> {
    config.validate()?;

    match config {
        StoreConfig::Memory => {
            tracing::debug!("Opening in-memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreConfig::File { path } => {
            tracing::debug!("Opening file store at {}", path);
            Ok(Arc::new(FileStore::new(path).await?))
        }
        #[cfg(feature = "redis")]
        StoreConfig::Redis { url } => {
            tracing::debug!("Opening redis store");
            Ok(Arc::new(RedisStore::connect(url).await?))
        }
        #[cfg(not(feature = "redis"))]
        StoreConfig::Redis { .. } => Err(Error::config(
            "redis store requested but copydog-core was built without the `redis` feature",
        )),
    }
}

/// Read a string entry, rejecting hashes
pub(crate) fn read_string(
    entries: &HashMap<String, Entry>,
    key: &str,
) -> Result<Option<String>, Error> {
    match entries.get(key) {
        None => Ok(None),
        Some(Entry::String(value)) => Ok(Some(value.clone())),
        Some(Entry::Hash(_)) => Err(wrong_type(key, "string")),
    }
}

/// Read a hash entry, rejecting strings
pub(crate) fn read_hash<'a>(
    entries: &'a HashMap<String, Entry>,
    key: &str,
) -> Result<Option<&'a BTreeMap<String, String>>, Error> {
    match entries.get(key) {
        None => Ok(None),
        Some(Entry::Hash(fields)) => Ok(Some(fields)),
        Some(Entry::String(_)) => Err(wrong_type(key, "hash")),
    }
}

/// Apply writes in order to `entries`
///
/// Stops at the first type error and leaves `entries` partly written, so
/// callers apply to a scratch copy and swap it in only on success.
pub(crate) fn apply_ops(entries: &mut HashMap<String, Entry>, ops: &[WriteOp]) -> Result<(), Error> {
    for op in ops {
        match op {
            WriteOp::Set { key, value } => {
                if let Some(Entry::Hash(_)) = entries.get(key) {
                    return Err(wrong_type(key, "string"));
                }
                entries.insert(key.clone(), Entry::String(value.clone()));
            }
            WriteOp::HashSet { key, fields } => {
                let entry = entries
                    .entry(key.clone())
                    .or_insert_with(|| Entry::Hash(BTreeMap::new()));
                match entry {
                    Entry::Hash(hash) => {
                        for (field, value) in fields {
                            hash.insert(field.clone(), value.clone());
                        }
                    }
                    Entry::String(_) => return Err(wrong_type(key, "hash")),
                }
            }
            WriteOp::HashDelete { key, fields } => {
                let emptied = match entries.get_mut(key) {
                    None => false,
                    Some(Entry::Hash(hash)) => {
                        for field in fields {
                            hash.remove(field);
                        }
                        hash.is_empty()
                    }
                    Some(Entry::String(_)) => return Err(wrong_type(key, "hash")),
                };
                if emptied {
                    entries.remove(key);
                }
            }
            WriteOp::Delete { key } => {
                entries.remove(key);
            }
        }
    }
    Ok(())
}

fn wrong_type(key: &str, expected: &str) -> Error {
    Error::corrupt_record(format!("key {} does not hold a {}", key, expected))
}

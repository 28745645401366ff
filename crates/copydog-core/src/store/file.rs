// # File Store
//
// File-based implementation of KeyValueStore with crash recovery.
//
// ## Purpose
//
// Provides persistent sync state across restarts on a single host without
// running a separate database. Every committed transaction is written to
// disk before `commit` returns.
//
// ## Crash Recovery
//
// - Atomic writes: Uses write-then-rename for atomicity
// - Corruption detection: Validates JSON on load
// - Automatic backup: Keeps .backup of last known good state
// - Recovery: Falls back to backup if corruption detected
// - No silent reset: if neither file parses, opening fails with
//   `CorruptRecord`; the operator restores or deletes the files by hand
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "entries": {
//     "redmine:last_read_time": { "type": "string", "value": "2024-01-09T12:00:00Z" },
//     "redmine:items:99": {
//       "type": "hash",
//       "value": { "opposite_id": "42", "updated": "2024-01-09T11:58:00Z" }
//     }
//   }
// }
// ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use super::{apply_ops, read_hash, read_string, Entry};
use crate::traits::{KeyValueStore, Transaction};
use crate::Error;

/// Store file format version
/// Used for future migration if format changes
const STORE_FILE_VERSION: &str = "1.0";

/// File-based key-value store with crash recovery
///
/// Entries are cached in memory and the whole map is rewritten on every
/// commit. A commit builds the next map on a copy, persists it, and swaps
/// the cache only after the rename succeeded, so a failed write leaves both
/// the file and the cache at the previous state.
///
/// # Example
///
/// ```rust,no_run
/// use copydog_core::store::FileStore;
/// use copydog_core::traits::{KeyValueStore, Transaction};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileStore::new("/var/lib/copydog/state.json").await?;
///
///     // Atomically written to disk
///     store.commit(Transaction::new().hset("redmine:list_status_mapping", "1", "list-a")).await?;
///
///     let mapped = store.hget("redmine:list_status_mapping", "1").await?;
///     assert_eq!(mapped.as_deref(), Some("list-a"));
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Arc<RwLock<HashMap<String, Entry>>>,
}

/// Serializable store file format
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct StoreFileFormat {
    version: String,
    entries: HashMap<String, Entry>,
}

impl FileStore {
    /// Create or load a file store
    ///
    /// This will:
    /// 1. Try to load existing store file
    /// 2. If corruption detected, try to load from backup
    /// 3. If both fail, return [`Error::CorruptRecord`]
    /// 4. Create parent directories if needed
    ///
    /// A missing store file is a fresh store, not an error.
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::config(format!(
                    "Failed to create store directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let entries = Self::load_with_recovery(&path).await?;

        Ok(Self {
            path,
            entries: Arc::new(RwLock::new(entries)),
        })
    }

    /// Load entries with automatic recovery
    ///
    /// Recovery strategy:
    /// 1. Try to load main store file
    /// 2. If it fails to parse, try loading backup
    /// 3. If there is no usable backup, fail with [`Error::CorruptRecord`]
    async fn load_with_recovery(path: &Path) -> Result<HashMap<String, Entry>, Error> {
        let error = match Self::load(path).await {
            Ok(entries) => {
                tracing::debug!("Loaded store file: {} keys", entries.len());
                return Ok(entries);
            }
            Err(e) => e,
        };

        // Read failures are real I/O problems; only parse failures are recoverable
        if !matches!(error, Error::CorruptRecord(_)) {
            return Err(error);
        }

        tracing::warn!(
            "Store file appears corrupted: {}. Attempting recovery from backup.",
            error
        );

        let backup_path = Self::backup_path(path);
        if !backup_path.exists() {
            tracing::error!("No backup file found for {}", path.display());
            return Err(Error::corrupt_record(format!(
                "{} (no backup at {}). Delete the file to start from empty state",
                error,
                backup_path.display()
            )));
        }

        match Self::load(&backup_path).await {
            Ok(entries) => {
                tracing::info!("Recovered store from backup: {} keys", entries.len());

                if let Err(restore_err) = Self::restore_from_backup(path, &backup_path).await {
                    tracing::error!("Failed to restore store file from backup: {}", restore_err);
                }

                Ok(entries)
            }
            Err(backup_err) => {
                tracing::error!("Backup also unreadable: {}", backup_err);
                Err(Error::corrupt_record(format!(
                    "{}; backup: {}. Delete both files to start from empty state",
                    error, backup_err
                )))
            }
        }
    }

    /// Load entries from file
    async fn load(path: &Path) -> Result<HashMap<String, Entry>, Error> {
        if !path.exists() {
            tracing::debug!("Store file does not exist: {}", path.display());
            return Ok(HashMap::new());
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            Error::store_unavailable(format!(
                "Failed to read store file {}: {}",
                path.display(),
                e
            ))
        })?;

        let file: StoreFileFormat = serde_json::from_str(&content).map_err(|e| {
            Error::corrupt_record(format!(
                "Failed to parse store file {}: {}",
                path.display(),
                e
            ))
        })?;

        if file.version != STORE_FILE_VERSION {
            tracing::warn!(
                "Store file version mismatch: expected {}, got {}. \
                Attempting to load anyway.",
                STORE_FILE_VERSION,
                file.version
            );
        }

        Ok(file.entries)
    }

    /// Write entries to file atomically
    async fn write(&self, entries: &HashMap<String, Entry>) -> Result<(), Error> {
        let file = StoreFileFormat {
            version: STORE_FILE_VERSION.to_string(),
            entries: entries.clone(),
        };

        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| Error::store_unavailable(format!("Failed to serialize store: {}", e)))?;

        let temp_path = self.temp_path();
        {
            let mut out = fs::File::create(&temp_path).await.map_err(|e| {
                Error::store_unavailable(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            out.write_all(json.as_bytes()).await.map_err(|e| {
                Error::store_unavailable(format!(
                    "Failed to write to temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            out.sync_all().await.map_err(|e| {
                Error::store_unavailable(format!(
                    "Failed to sync temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        if self.path.exists() {
            let backup_path = Self::backup_path(&self.path);
            if let Err(e) = fs::copy(&self.path, &backup_path).await {
                tracing::warn!("Failed to create backup: {}", e);
            }
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::store_unavailable(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::trace!("Store written to file: {}", self.path.display());
        Ok(())
    }

    /// Restore store file from backup
    async fn restore_from_backup(path: &Path, backup_path: &Path) -> Result<(), Error> {
        fs::copy(backup_path, path).await.map_err(|e| {
            Error::store_unavailable(format!(
                "Failed to restore from backup {} to {}: {}",
                backup_path.display(),
                path.display(),
                e
            ))
        })?;

        tracing::info!("Restored store file from backup");
        Ok(())
    }

    /// Get path to temporary file for atomic writes
    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    /// Get path to backup file
    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }

    /// Path of the main store file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let guard = self.entries.read().await;
        read_string(&guard, key)
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, Error> {
        let guard = self.entries.read().await;
        Ok(read_hash(&guard, key)?.and_then(|fields| fields.get(field).cloned()))
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, Error> {
        let guard = self.entries.read().await;
        Ok(read_hash(&guard, key)?
            .map(|fields| fields.clone().into_iter().collect())
            .unwrap_or_default())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, Error> {
        let guard = self.entries.read().await;
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

        // Held across the write so commits are serialized
        let mut guard = self.entries.write().await;
        let mut next = guard.clone();
        apply_ops(&mut next, tx.ops())?;
        self.write(&next).await?;
        *guard = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_file_store_basic() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");

        let store = FileStore::new(&path).await.unwrap();

        // Initially empty
        assert!(store.keys_with_prefix("").await.unwrap().is_empty());

        store
            .commit(Transaction::new().hset("trello:items:42", "opposite_id", "99"))
            .await
            .unwrap();

        assert_eq!(
            store.hget("trello:items:42", "opposite_id").await.unwrap(),
            Some("99".to_string())
        );

        // Verify file was written
        assert!(path.exists());

        // Load new instance and verify persistence
        let store2 = FileStore::new(&path).await.unwrap();
        assert_eq!(
            store2.hget("trello:items:42", "opposite_id").await.unwrap(),
            Some("99".to_string())
        );
    }

    #[tokio::test]
    async fn test_file_store_corruption_recovery() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");

        let store = FileStore::new(&path).await.unwrap();
        store
            .commit(Transaction::new().set("redmine:last_read_time", "first"))
            .await
            .unwrap();

        // Second write creates the backup of the first
        store
            .commit(Transaction::new().set("redmine:last_read_time", "second"))
            .await
            .unwrap();

        let backup_path = FileStore::backup_path(&path);
        assert!(backup_path.exists(), "Backup file should exist after write");

        fs::write(&path, b"corrupted json data").await.unwrap();

        let store2 = FileStore::new(&path)
            .await
            .expect("corrupted file should be recovered from backup");
        assert_eq!(
            store2.get("redmine:last_read_time").await.unwrap(),
            Some("first".to_string()),
            "Backup should contain previous state, not latest"
        );
    }

    #[tokio::test]
    async fn test_file_store_refuses_to_start_when_backup_is_also_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");

        let store = FileStore::new(&path).await.unwrap();
        store
            .commit(Transaction::new().hset("trello:items:42", "opposite_id", "99"))
            .await
            .unwrap();
        store
            .commit(Transaction::new().set("trello:last_read_time", "t1"))
            .await
            .unwrap();

        fs::write(&path, b"{garbage").await.unwrap();
        fs::write(FileStore::backup_path(&path), b"{garbage")
            .await
            .unwrap();

        let err = FileStore::new(&path).await.unwrap_err();
        assert!(matches!(err, Error::CorruptRecord(_)));

        // Nothing was overwritten while failing
        assert_eq!(fs::read(&path).await.unwrap(), b"{garbage");
    }

    #[tokio::test]
    async fn test_file_store_refuses_to_start_without_backup() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, b"not json").await.unwrap();

        let err = FileStore::new(&path).await.unwrap_err();
        assert!(matches!(err, Error::CorruptRecord(_)));
    }

    #[tokio::test]
    async fn test_file_store_failed_commit_leaves_file_untouched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");

        let store = FileStore::new(&path).await.unwrap();
        store
            .commit(Transaction::new().set("trello:last_read_time", "t0"))
            .await
            .unwrap();
        let before = fs::read_to_string(&path).await.unwrap();

        let result = store
            .commit(
                Transaction::new()
                    .hset("trello:items:1", "opposite_id", "7")
                    .hset("trello:last_read_time", "field", "x"),
            )
            .await;

        assert!(result.is_err());
        assert_eq!(fs::read_to_string(&path).await.unwrap(), before);
        assert!(store.hgetall("trello:items:1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_store_deletes_persist() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let store = FileStore::new(&path).await.unwrap();
        store
            .commit(
                Transaction::new()
                    .set("redmine:last_read_time", "t")
                    .hset("redmine:items:1", "updated", "t"),
            )
            .await
            .unwrap();
        store
            .commit(Transaction::new().del("redmine:items:1"))
            .await
            .unwrap();

        let reloaded = FileStore::new(&path).await.unwrap();
        assert_eq!(
            reloaded.keys_with_prefix("redmine:").await.unwrap(),
            vec!["redmine:last_read_time".to_string()]
        );
    }
}

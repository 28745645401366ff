//! Core traits for the copydog core
//!
//! This module defines the abstract interfaces the sync state layer is built on.
//!
//! - [`KeyValueStore`]: Durable key-value backend with atomic batches
//! - [`SyncItem`]: The identity and freshness every synced item exposes

pub mod kv_store;
pub mod sync_item;

pub use kv_store::{KeyValueStore, Transaction, WriteOp};
pub use sync_item::SyncItem;

// # copydog-core
//
// State and mapping core for Redmine <-> Trello synchronization.
//
// ## Architecture Overview
//
// This library provides the pieces a sync pass is built from:
// - **KeyValueStore**: Trait for the durable backend, with atomic write batches
// - **Storage**: Watermarks, cross-references and status/list mappings
// - **Mapper**: Issue <-> card translation through Storage lookups
// - **Model**: Typed records for each tracker
//
// A sync pass (owned by the caller) fetches items changed since
// `Storage::get_last_time_read`, calls `Storage::mark_read`, translates each
// item with the `Mapper`, pushes it to the other tracker, and records the
// result with `Storage::mark_written`.
//
// ## Design Principles
//
// 1. **Atomic state changes**: Every logical change is one store transaction
// 2. **Absent is not an error**: Missing mappings come back as `None`
// 3. **Fail fast on config**: Required settings are checked at construction
// 4. **Library-First**: HTTP clients and scheduling live outside this crate

pub mod config;
pub mod error;
pub mod mapper;
pub mod model;
pub mod storage;
pub mod store;
pub mod traits;

// Re-export core types for convenience
pub use config::{CopydogConfig, MapperConfig, StoreConfig};
pub use error::{Error, Result};
pub use mapper::Mapper;
pub use model::{Card, CrossReference, Issue, Service, TrackerItem};
pub use storage::Storage;
pub use store::{FileStore, MemoryStore};
pub use traits::{KeyValueStore, SyncItem, Transaction};

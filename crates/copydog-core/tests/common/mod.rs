//! Test doubles and common utilities for sync state contract tests
//!
//! This module provides a store wrapper that can be told to fail, plus
//! builders for realistic tracker items.

#![allow(dead_code)]

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use copydog_core::error::{Error, Result};
use copydog_core::traits::{KeyValueStore, Transaction};
use copydog_core::{Card, Issue, MapperConfig, MemoryStore, Storage};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// A store that delegates to memory but can refuse commits
pub struct FlakyStore {
    inner: MemoryStore,
    fail_commits: Arc<AtomicBool>,
    commit_count: Arc<AtomicUsize>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            fail_commits: Arc::new(AtomicBool::new(false)),
            commit_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Make every following commit fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.fail_commits.store(failing, Ordering::SeqCst);
    }

    /// Number of commits attempted, failed ones included
    pub fn commit_count(&self) -> usize {
        self.commit_count.load(Ordering::SeqCst)
    }

    /// Create a FlakyStore that shares state and switches with an existing one
    pub fn sharing_state_with(other: &Self) -> Self {
        Self {
            inner: other.inner.clone(),
            fail_commits: Arc::clone(&other.fail_commits),
            commit_count: Arc::clone(&other.commit_count),
        }
    }
}

#[async_trait::async_trait]
impl KeyValueStore for FlakyStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(key).await
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
        self.inner.hget(key, field).await
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>> {
        self.inner.hgetall(key).await
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        self.inner.keys_with_prefix(prefix).await
    }

    async fn commit(&self, tx: Transaction) -> Result<()> {
        self.commit_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(Error::store_unavailable("connection reset by peer"));
        }
        self.inner.commit(tx).await
    }
}

/// Storage over a fresh in-memory store
pub fn memory_storage() -> Storage {
    Storage::new(Arc::new(MemoryStore::new()))
}

/// Storage over a FlakyStore, plus a handle to flip it
pub fn flaky_storage() -> (Storage, FlakyStore) {
    let store = FlakyStore::new();
    let handle = FlakyStore::sharing_state_with(&store);
    (Storage::new(Arc::new(store)), handle)
}

pub fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
}

/// A Redmine issue as the API would return it
pub fn issue(id: &str, updated_on: DateTime<Utc>) -> Issue {
    Issue {
        id: Some(id.to_string()),
        subject: format!("Login page rejects valid passwords ({})", id),
        description: "Reproduced on staging.\n\n* open /login\n* submit".to_string(),
        status_id: Some("1".to_string()),
        project_id: Some("7".to_string()),
        assigned_to: Some("12".to_string()),
        due_date: NaiveDate::from_ymd_opt(2024, 6, 30),
        updated_on: Some(updated_on),
    }
}

/// A Trello card as the API would return it
pub fn card(id: &str, last_activity: DateTime<Utc>) -> Card {
    Card {
        id: Some(id.to_string()),
        name: format!("Export report as CSV ({})", id),
        desc: "Customers want spreadsheets.".to_string(),
        id_list: Some("list-todo".to_string()),
        id_board: Some("board-1".to_string()),
        id_members: vec!["member-1".to_string()],
        due: None,
        date_last_activity: Some(last_activity),
    }
}

pub fn mapper_config() -> MapperConfig {
    MapperConfig {
        trello_board_id: "board-1".to_string(),
        redmine_project_id: "7".to_string(),
        default_list_id: Some("list-todo".to_string()),
        default_status_id: Some("1".to_string()),
    }
}

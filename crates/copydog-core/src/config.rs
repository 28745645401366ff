//! Configuration types for the copydog core
//!
//! This module defines all configuration structures used throughout the crate.
//! Required values are checked when a component is constructed, never lazily
//! on first use.

use serde::{Deserialize, Serialize};

/// Main copydog configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CopydogConfig {
    /// Key-value store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Per-tracker settings
    #[serde(default)]
    pub clients: ClientsConfig,
}

impl CopydogConfig {
    /// Validate the configuration
    ///
    /// Checks the store settings and every required client key.
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.store.validate()?;
        MapperConfig::try_from(self)?;
        Ok(())
    }
}

/// Key-value store configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// In-memory store (not persistent)
    #[default]
    Memory,

    /// JSON file store
    File {
        /// Path to the store file
        path: String,
    },

    /// Redis store (requires the `redis` feature)
    Redis {
        /// Connection URL, e.g. `redis://127.0.0.1:6379/0`
        url: String,
    },
}

impl StoreConfig {
    /// Validate the store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            StoreConfig::Memory => Ok(()),
            StoreConfig::File { path } => {
                if path.trim().is_empty() {
                    return Err(crate::Error::config("File store path cannot be empty"));
                }
                Ok(())
            }
            StoreConfig::Redis { url } => {
                if !url.starts_with("redis://")
                    && !url.starts_with("rediss://")
                    && !url.starts_with("unix://")
                {
                    return Err(crate::Error::config(format!(
                        "Redis url must use redis://, rediss:// or unix://. Got: {}",
                        url
                    )));
                }
                Ok(())
            }
        }
    }

    /// Get the store type name
    pub fn type_name(&self) -> &'static str {
        match self {
            StoreConfig::Memory => "memory",
            StoreConfig::File { .. } => "file",
            StoreConfig::Redis { .. } => "redis",
        }
    }
}

/// Settings for both tracker clients
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientsConfig {
    #[serde(default)]
    pub redmine: RedmineClientConfig,
    #[serde(default)]
    pub trello: TrelloClientConfig,
}

/// Redmine side settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RedmineClientConfig {
    /// Project new issues are created in (required)
    pub project_id: Option<String>,

    /// Status used when a card's list has no mapping
    pub default_status_id: Option<String>,
}

/// Trello side settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrelloClientConfig {
    /// Board new cards are created on (required)
    pub board_id: Option<String>,

    /// List used when an issue's status has no mapping
    pub default_list_id: Option<String>,
}

/// Validated settings the mapper needs
///
/// Built from [`CopydogConfig`]; construction fails with
/// [`crate::Error::MissingConfig`] naming the first absent key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapperConfig {
    pub trello_board_id: String,
    pub redmine_project_id: String,
    pub default_list_id: Option<String>,
    pub default_status_id: Option<String>,
}

impl MapperConfig {
    /// Reject blank required values
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.trello_board_id.trim().is_empty() {
            return Err(crate::Error::missing_config("clients.trello.board_id"));
        }
        if self.redmine_project_id.trim().is_empty() {
            return Err(crate::Error::missing_config("clients.redmine.project_id"));
        }
        Ok(())
    }
}

impl TryFrom<&CopydogConfig> for MapperConfig {
    type Error = crate::Error;

    fn try_from(config: &CopydogConfig) -> Result<Self, Self::Error> {
        let clients = &config.clients;
        Ok(Self {
            trello_board_id: require(&clients.trello.board_id, "clients.trello.board_id")?,
            redmine_project_id: require(
                &clients.redmine.project_id,
                "clients.redmine.project_id",
            )?,
            default_list_id: non_empty(&clients.trello.default_list_id),
            default_status_id: non_empty(&clients.redmine.default_status_id),
        })
    }
}

fn require(value: &Option<String>, key: &str) -> Result<String, crate::Error> {
    non_empty(value).ok_or_else(|| crate::Error::missing_config(key))
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

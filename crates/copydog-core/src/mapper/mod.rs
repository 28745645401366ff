//! Translation between Redmine issues and Trello cards
//!
//! The mapper only reads from [`Storage`]: it resolves the mirror id and the
//! status/list mapping, copies the content fields, and fills in the
//! configured board or project. Recording the result is the caller's job
//! (`Storage::mark_written` once the opposite tracker accepted the write).
//!
//! An absent mirror id on the output means "create"; an absent list or
//! status means neither a mapping nor a configured default exists.

use chrono::{DateTime, NaiveDate, Utc};
use tracing::trace;

use crate::config::{CopydogConfig, MapperConfig};
use crate::error::{Error, Result};
use crate::model::{Card, Issue, Service, TrackerItem};
use crate::storage::Storage;

/// Stateless issue/card translator
#[derive(Clone)]
pub struct Mapper {
    storage: Storage,
    config: MapperConfig,
}

impl Mapper {
    /// Create a mapper, rejecting a config with blank required values
    pub fn new(storage: Storage, config: MapperConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { storage, config })
    }

    /// Create a mapper from the full configuration
    pub fn from_config(storage: Storage, config: &CopydogConfig) -> Result<Self> {
        Self::new(storage, MapperConfig::try_from(config)?)
    }

    /// Settings this mapper fills into translated items
    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    /// Translate a Redmine issue into the Trello card that mirrors it
    pub async fn issue_to_card(&self, issue: &Issue) -> Result<Card> {
        let source_id = source_id(Service::Redmine, issue.id.as_deref())?;

        let id = self
            .storage
            .get_opposite_item_id(Service::Redmine, source_id)
            .await?;
        let id_list = self
            .lookup_mapping(Service::Redmine, issue.status_id.as_deref())
            .await?
            .or_else(|| self.config.default_list_id.clone());

        trace!("Issue {} -> card {:?} in list {:?}", source_id, id, id_list);

        Ok(Card {
            id,
            name: issue.subject.clone(),
            desc: issue.description.clone(),
            id_list,
            id_board: Some(self.config.trello_board_id.clone()),
            id_members: Vec::new(),
            due: issue.due_date.and_then(start_of_day),
            date_last_activity: None,
        })
    }

    /// Translate a Trello card into the Redmine issue that mirrors it
    pub async fn card_to_issue(&self, card: &Card) -> Result<Issue> {
        let source_id = source_id(Service::Trello, card.id.as_deref())?;

        let id = self
            .storage
            .get_opposite_item_id(Service::Trello, source_id)
            .await?;
        let status_id = self
            .lookup_mapping(Service::Trello, card.id_list.as_deref())
            .await?
            .or_else(|| self.config.default_status_id.clone());

        trace!("Card {} -> issue {:?} with status {:?}", source_id, id, status_id);

        Ok(Issue {
            id,
            subject: card.name.clone(),
            description: card.desc.clone(),
            status_id,
            project_id: Some(self.config.redmine_project_id.clone()),
            assigned_to: None,
            due_date: card.due.map(|due| due.date_naive()),
            updated_on: None,
        })
    }

    /// Translate an item read from `source` into the opposite service's shape
    ///
    /// Fails with [`Error::SchemaMismatch`] if `item` is not shaped like a
    /// `source` item.
    pub async fn translate(&self, source: Service, item: &TrackerItem) -> Result<TrackerItem> {
        item.expect_service(source)?;
        match item {
            TrackerItem::Issue(issue) => Ok(self.issue_to_card(issue).await?.into()),
            TrackerItem::Card(card) => Ok(self.card_to_issue(card).await?.into()),
        }
    }

    async fn lookup_mapping(&self, service: Service, id: Option<&str>) -> Result<Option<String>> {
        match id {
            Some(id) => self.storage.get_list_or_status_id(service, id).await,
            None => Ok(None),
        }
    }
}

fn source_id(service: Service, id: Option<&str>) -> Result<&str> {
    id.filter(|id| !id.is_empty())
        .ok_or_else(|| Error::schema_mismatch(format!("{} item with an id", service), "no id"))
}

fn start_of_day(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0).map(|midnight| midnight.and_utc())
}

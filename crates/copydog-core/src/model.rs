//! Typed item records for both trackers
//!
//! Each tracker gets its own record with the fields the sync core reads or
//! writes. Field names follow each tracker's JSON so records deserialize
//! straight from API payloads.
//!
//! Redmine reads and writes references differently: `GET /issues/{id}.json`
//! nests them (`"status": {"id": 2, "name": "In Progress"}`) while writes
//! take flat ids (`"status_id": 2`). [`Issue`] accepts both and serializes
//! the flat form.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::traits::SyncItem;

/// One of the two synchronized trackers
///
/// The namespace string doubles as the key prefix in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    /// Ticket tracker (service A)
    Redmine,
    /// Card board (service B)
    Trello,
}

impl Service {
    /// Both services, in key-prefix order
    pub const ALL: [Service; 2] = [Service::Redmine, Service::Trello];

    /// Key namespace of this service
    pub fn as_str(&self) -> &'static str {
        match self {
            Service::Redmine => "redmine",
            Service::Trello => "trello",
        }
    }

    /// The service on the other side of the sync
    pub fn opposite(&self) -> Service {
        match self {
            Service::Redmine => Service::Trello,
            Service::Trello => Service::Redmine,
        }
    }

    fn item_kind(&self) -> &'static str {
        match self {
            Service::Redmine => "redmine issue",
            Service::Trello => "trello card",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Service {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "redmine" => Ok(Service::Redmine),
            "trello" => Ok(Service::Trello),
            other => Err(Error::invalid_input(format!(
                "unknown service '{}', expected redmine or trello",
                other
            ))),
        }
    }
}

/// Redmine issue
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Issue {
    /// Issue id; `None` on a translated issue that has never been synced
    #[serde(default, deserialize_with = "optional_id")]
    pub id: Option<String>,
    pub subject: String,
    /// Redmine sends `null` for issues created without one
    #[serde(default, deserialize_with = "null_as_empty")]
    pub description: String,
    #[serde(default, alias = "status", deserialize_with = "optional_id")]
    pub status_id: Option<String>,
    #[serde(default, alias = "project", deserialize_with = "optional_id")]
    pub project_id: Option<String>,
    /// User id; always `None` on translated issues, identities are not mapped
    #[serde(
        default,
        rename = "assigned_to_id",
        alias = "assigned_to",
        deserialize_with = "optional_id"
    )]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub updated_on: Option<DateTime<Utc>>,
}

/// Trello card
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    /// Card id; `None` on a translated card that has never been synced
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub id_list: Option<String>,
    #[serde(default)]
    pub id_board: Option<String>,
    #[serde(default)]
    pub id_members: Vec<String>,
    #[serde(default)]
    pub due: Option<DateTime<Utc>>,
    #[serde(default)]
    pub date_last_activity: Option<DateTime<Utc>>,
}

/// An item from either tracker, tagged by its shape
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerItem {
    Issue(Issue),
    Card(Card),
}

impl TrackerItem {
    /// The service this item's shape belongs to
    pub fn service(&self) -> Service {
        match self {
            TrackerItem::Issue(_) => Service::Redmine,
            TrackerItem::Card(_) => Service::Trello,
        }
    }

    /// Decode a raw API payload as the record of `service`
    ///
    /// A payload that does not fit the declared service's record is a
    /// [`Error::SchemaMismatch`]; it is never coerced.
    pub fn from_json(service: Service, value: serde_json::Value) -> Result<Self> {
        let decoded = match service {
            Service::Redmine => serde_json::from_value(value).map(TrackerItem::Issue),
            Service::Trello => serde_json::from_value(value).map(TrackerItem::Card),
        };
        decoded.map_err(|e| Error::schema_mismatch(service.item_kind(), e.to_string()))
    }

    /// Ensure this item has the shape of `service`
    pub fn expect_service(&self, service: Service) -> Result<()> {
        if self.service() == service {
            Ok(())
        } else {
            Err(Error::schema_mismatch(
                service.item_kind(),
                self.service().item_kind(),
            ))
        }
    }
}

impl From<Issue> for TrackerItem {
    fn from(issue: Issue) -> Self {
        TrackerItem::Issue(issue)
    }
}

impl From<Card> for TrackerItem {
    fn from(card: Card) -> Self {
        TrackerItem::Card(card)
    }
}

impl SyncItem for Issue {
    fn item_id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.updated_on
    }

    fn source_service(&self) -> Option<Service> {
        Some(Service::Redmine)
    }
}

impl SyncItem for Card {
    fn item_id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.date_last_activity
    }

    fn source_service(&self) -> Option<Service> {
        Some(Service::Trello)
    }
}

impl SyncItem for TrackerItem {
    fn item_id(&self) -> Option<&str> {
        match self {
            TrackerItem::Issue(issue) => issue.item_id(),
            TrackerItem::Card(card) => card.item_id(),
        }
    }

    fn last_updated(&self) -> Option<DateTime<Utc>> {
        match self {
            TrackerItem::Issue(issue) => issue.last_updated(),
            TrackerItem::Card(card) => card.last_updated(),
        }
    }

    fn source_service(&self) -> Option<Service> {
        Some(self.service())
    }
}

/// Decoded `{service}:items:{id}` record
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CrossReference {
    /// Id of the mirrored item in the opposite service
    pub opposite_id: Option<String>,
    /// Last-seen update time of this item
    pub updated: Option<DateTime<Utc>>,
}

/// Redmine sends numeric ids, bare or as `{"id": .., "name": ..}`
/// references; they are kept as opaque strings here.
fn optional_id<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IdOrRef {
        Id(RawId),
        Ref { id: RawId },
    }

    Ok(Option::<IdOrRef>::deserialize(deserializer)?.map(|raw| {
        let (IdOrRef::Id(id) | IdOrRef::Ref { id }) = raw;
        match id {
            RawId::Text(s) => s,
            RawId::Number(n) => n.to_string(),
        }
    }))
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn service_round_trips_through_its_namespace() {
        for service in Service::ALL {
            assert_eq!(service.as_str().parse::<Service>().unwrap(), service);
            assert_eq!(service.opposite().opposite(), service);
        }
        assert!("jira".parse::<Service>().is_err());
    }

    #[test]
    fn issue_decodes_numeric_ids() {
        let item = TrackerItem::from_json(
            Service::Redmine,
            json!({
                "id": 99,
                "subject": "Broken login",
                "status_id": 2,
                "due_date": "2024-03-01",
                "updated_on": "2024-02-10T08:30:00Z"
            }),
        )
        .unwrap();

        let TrackerItem::Issue(issue) = item else {
            panic!("expected an issue");
        };
        assert_eq!(issue.id.as_deref(), Some("99"));
        assert_eq!(issue.status_id.as_deref(), Some("2"));
        assert_eq!(issue.description, "");
        assert_eq!(issue.due_date, NaiveDate::from_ymd_opt(2024, 3, 1));
    }

    #[test]
    fn issue_decodes_redmine_show_payload() {
        // Shape of GET /issues/{id}.json
        let item = TrackerItem::from_json(
            Service::Redmine,
            json!({
                "id": 4521,
                "project": { "id": 7, "name": "Web shop" },
                "tracker": { "id": 1, "name": "Bug" },
                "status": { "id": 2, "name": "In Progress" },
                "priority": { "id": 4, "name": "Normal" },
                "author": { "id": 3, "name": "Sam Doe" },
                "assigned_to": { "id": 5, "name": "Kim Roe" },
                "subject": "Checkout button unresponsive",
                "description": null,
                "start_date": "2024-02-01",
                "due_date": null,
                "done_ratio": 0,
                "is_private": false,
                "estimated_hours": null,
                "created_on": "2024-02-01T09:12:44Z",
                "updated_on": "2024-02-10T08:30:00Z",
                "closed_on": null
            }),
        )
        .unwrap();

        let TrackerItem::Issue(issue) = item else {
            panic!("expected an issue");
        };
        assert_eq!(issue.id.as_deref(), Some("4521"));
        assert_eq!(issue.status_id.as_deref(), Some("2"));
        assert_eq!(issue.project_id.as_deref(), Some("7"));
        assert_eq!(issue.assigned_to.as_deref(), Some("5"));
        assert_eq!(issue.description, "");
        assert_eq!(issue.due_date, None);
    }

    #[test]
    fn issue_serializes_redmine_write_fields() {
        let issue = Issue {
            subject: "Broken login".to_string(),
            status_id: Some("2".to_string()),
            project_id: Some("7".to_string()),
            ..Default::default()
        };

        let value = serde_json::to_value(&issue).unwrap();
        assert_eq!(value["status_id"], "2");
        assert_eq!(value["project_id"], "7");
        assert!(value["assigned_to_id"].is_null());

        // Its own output reads back unchanged
        assert_eq!(serde_json::from_value::<Issue>(value).unwrap(), issue);
    }

    #[test]
    fn card_decodes_trello_field_names() {
        let item = TrackerItem::from_json(
            Service::Trello,
            json!({
                "id": "5f1a",
                "name": "Broken login",
                "desc": "Steps to reproduce",
                "idList": "list-1",
                "idBoard": "board-1",
                "due": null,
                "dateLastActivity": "2024-02-10T08:30:00.000Z"
            }),
        )
        .unwrap();

        assert_eq!(item.service(), Service::Trello);
        assert_eq!(item.item_id(), Some("5f1a"));
        assert!(item.last_updated().is_some());
    }

    #[test]
    fn payload_of_the_other_service_is_a_schema_mismatch() {
        let card_payload = json!({ "id": "5f1a", "name": "Broken login" });
        let err = TrackerItem::from_json(Service::Redmine, card_payload).unwrap_err();
        assert!(matches!(err, Error::SchemaMismatch { .. }));
    }

    #[test]
    fn expect_service_rejects_wrong_variant() {
        let item = TrackerItem::from(Card::default());
        assert!(item.expect_service(Service::Trello).is_ok());
        assert!(matches!(
            item.expect_service(Service::Redmine),
            Err(Error::SchemaMismatch { .. })
        ));
    }
}

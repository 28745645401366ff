//! Key layout of the sync state
//!
//! ```text
//! {service}:items:{id}            hash   opposite_id, updated
//! {service}:list_status_mapping   hash   local id -> opposite id
//! {service}:last_read_time        string RFC 3339 UTC timestamp
//! ```

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::{Error, Result};
use crate::model::Service;

pub const OPPOSITE_ID_FIELD: &str = "opposite_id";
pub const UPDATED_FIELD: &str = "updated";

pub fn item(service: Service, id: &str) -> String {
    format!("{}:items:{}", service.as_str(), id)
}

pub fn list_status_mapping(service: Service) -> String {
    format!("{}:list_status_mapping", service.as_str())
}

pub fn last_read_time(service: Service) -> String {
    format!("{}:last_read_time", service.as_str())
}

/// Every key of `service` starts with this
pub fn namespace(service: Service) -> String {
    format!("{}:", service.as_str())
}

pub fn encode_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Parse a stored timestamp
///
/// Accepts RFC 3339 and the space-separated ISO form older writers used.
pub fn decode_time(key: &str, raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%:z"))
        .map(|time| time.with_timezone(&Utc))
        .map_err(|e| {
            Error::corrupt_record(format!("{} holds an invalid timestamp '{}': {}", key, raw, e))
        })
}

//! Durable sync state
//!
//! [`Storage`] keeps, per service:
//! - the last successful read time (the watermark)
//! - a cross-reference from each item to its mirror in the other service
//! - the status/list mapping table
//!
//! Every logically atomic change is a single [`Transaction`] on the
//! underlying [`KeyValueStore`]. The layer assumes one writer per service;
//! concurrent sync passes for the same service must be serialized by the
//! caller.

pub mod keys;

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::model::{CrossReference, Service};
use crate::traits::{KeyValueStore, SyncItem, Transaction};

/// Sync state on top of a key-value store
///
/// Cheap to clone; clones share the store handle.
#[derive(Clone)]
pub struct Storage {
    store: Arc<dyn KeyValueStore>,
}

impl Storage {
    /// Wrap an existing store handle
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Open the store described by `config`
    pub async fn open(config: &StoreConfig) -> Result<Self> {
        Ok(Self::new(crate::store::open(config).await?))
    }

    /// Id of the mirror of `id` in the opposite service
    ///
    /// `Ok(None)` means the item has never been synced.
    pub async fn get_opposite_item_id(&self, service: Service, id: &str) -> Result<Option<String>> {
        self.store
            .hget(&keys::item(service, id), keys::OPPOSITE_ID_FIELD)
            .await
    }

    /// Full cross-reference record of `id`, if any field was ever written
    pub async fn get_item_record(
        &self,
        service: Service,
        id: &str,
    ) -> Result<Option<CrossReference>> {
        let key = keys::item(service, id);
        let mut fields = self.store.hgetall(&key).await?;
        if fields.is_empty() {
            return Ok(None);
        }

        let updated = fields
            .remove(keys::UPDATED_FIELD)
            .map(|raw| keys::decode_time(&key, &raw))
            .transpose()?;

        Ok(Some(CrossReference {
            opposite_id: fields.remove(keys::OPPOSITE_ID_FIELD),
            updated,
        }))
    }

    /// Opposite-service status or list id mapped to `id`
    ///
    /// `Ok(None)` means no mapping is configured; the caller picks a default.
    pub async fn get_list_or_status_id(
        &self,
        service: Service,
        id: &str,
    ) -> Result<Option<String>> {
        self.store
            .hget(&keys::list_status_mapping(service), id)
            .await
    }

    /// Map a Redmine status to a Trello list, in both directions at once
    ///
    /// Replaces any earlier mapping of either id. The reverse entries of
    /// the replaced mappings are removed in the same transaction, so no
    /// lookup ever sees a one-sided pair.
    pub async fn set_list_or_status_id(&self, redmine_id: &str, trello_id: &str) -> Result<()> {
        let redmine_map = keys::list_status_mapping(Service::Redmine);
        let trello_map = keys::list_status_mapping(Service::Trello);

        let mut tx = Transaction::new();
        let old_list = self.store.hget(&redmine_map, redmine_id).await?;
        if let Some(old_list) = old_list.filter(|old| old != trello_id) {
            tx = self.unlink_stale(tx, &trello_map, &old_list, redmine_id).await?;
        }
        let old_status = self.store.hget(&trello_map, trello_id).await?;
        if let Some(old_status) = old_status.filter(|old| old != redmine_id) {
            tx = self.unlink_stale(tx, &redmine_map, &old_status, trello_id).await?;
        }

        let tx = tx
            .hset(redmine_map, redmine_id, trello_id)
            .hset(trello_map, trello_id, redmine_id);
        self.store.commit(tx).await?;

        debug!("Mapped redmine status {} <-> trello list {}", redmine_id, trello_id);
        Ok(())
    }

    /// Watermark of `service`, `Ok(None)` if it was never read
    pub async fn get_last_time_read(
        &self,
        service: Service,
    ) -> Result<Option<chrono::DateTime<Utc>>> {
        let key = keys::last_read_time(service);
        self.store
            .get(&key)
            .await?
            .map(|raw| keys::decode_time(&key, &raw))
            .transpose()
    }

    /// Record a successful read of `items` from `service`
    ///
    /// In one transaction: advances the watermark to now (never backwards,
    /// even if the clock was) and stores each item's last-updated time.
    /// Every item must carry an id and a last-updated time and, when its
    /// type knows its service, belong to `service`; otherwise nothing is
    /// written.
    pub async fn mark_read<I>(&self, service: Service, items: &[I]) -> Result<()>
    where
        I: SyncItem + Sync,
    {
        let mut updates = Vec::with_capacity(items.len());
        for item in items {
            let (id, updated) = identify(service, item)?;
            updates.push((keys::item(service, id), keys::encode_time(updated)));
        }

        let now = Utc::now();
        let watermark = match self.get_last_time_read(service).await? {
            Some(previous) if previous > now => previous,
            _ => now,
        };

        let mut tx =
            Transaction::new().set(keys::last_read_time(service), keys::encode_time(watermark));
        for (key, updated) in updates {
            tx = tx.hset(key, keys::UPDATED_FIELD, updated);
        }
        self.store.commit(tx).await?;

        debug!(
            "Marked {} {} item(s) read, watermark {}",
            items.len(),
            service,
            watermark
        );
        Ok(())
    }

    /// Record that `item` from `service` now exists as `foreign_id` on the other side
    ///
    /// Writes both halves of the cross-reference in one transaction. If
    /// either item was linked to something else before, that item's back
    /// reference is dropped in the same transaction.
    pub async fn mark_written<I>(&self, service: Service, item: &I, foreign_id: &str) -> Result<()>
    where
        I: SyncItem + Sync,
    {
        if foreign_id.is_empty() {
            return Err(Error::invalid_input("foreign id cannot be empty"));
        }
        let (id, updated) = identify(service, item)?;
        let other = service.opposite();

        let mut tx = Transaction::new();
        let old_foreign = self.get_opposite_item_id(service, id).await?;
        if let Some(old_foreign) = old_foreign.filter(|old| old != foreign_id) {
            let key = keys::item(other, &old_foreign);
            tx = self
                .unlink_stale(tx, &key, keys::OPPOSITE_ID_FIELD, id)
                .await?;
        }
        let old_local = self.get_opposite_item_id(other, foreign_id).await?;
        if let Some(old_local) = old_local.filter(|old| old != id) {
            let key = keys::item(service, &old_local);
            tx = self
                .unlink_stale(tx, &key, keys::OPPOSITE_ID_FIELD, foreign_id)
                .await?;
        }

        let tx = tx
            .hset_multiple(
                keys::item(service, id),
                [
                    (keys::OPPOSITE_ID_FIELD.to_string(), foreign_id.to_string()),
                    (keys::UPDATED_FIELD.to_string(), keys::encode_time(updated)),
                ],
            )
            .hset(keys::item(other, foreign_id), keys::OPPOSITE_ID_FIELD, id);
        self.store.commit(tx).await?;

        debug!("Linked {} {} <-> {} {}", service, id, other, foreign_id);
        Ok(())
    }

    /// Queue removal of `key[field]` if it still points back at `owner`
    ///
    /// Used for the reverse half of a link that is being replaced. A reverse
    /// entry that already points elsewhere belongs to another link and stays.
    async fn unlink_stale(
        &self,
        tx: Transaction,
        key: &str,
        field: &str,
        owner: &str,
    ) -> Result<Transaction> {
        match self.store.hget(key, field).await? {
            Some(back) if back == owner => {
                debug!("Dropping stale link {}[{}] -> {}", key, field, owner);
                Ok(tx.hdel(key, field))
            }
            _ => Ok(tx),
        }
    }

    /// Delete every key of both services
    ///
    /// Returns the number of keys removed; an empty store is not an error.
    pub async fn flush(&self) -> Result<usize> {
        let mut doomed = Vec::new();
        for service in Service::ALL {
            doomed.extend(self.store.keys_with_prefix(&keys::namespace(service)).await?);
        }

        if doomed.is_empty() {
            info!("Storage is empty");
            return Ok(0);
        }

        debug!("Deleting keys: {:?}", doomed);
        let count = doomed.len();
        let tx = doomed
            .into_iter()
            .fold(Transaction::new(), |tx, key| tx.del(key));
        self.store.commit(tx).await?;

        info!("Deleted {} keys", count);
        Ok(count)
    }
}

/// Id and last-updated time of an item about to be recorded
fn identify<I: SyncItem + ?Sized>(
    service: Service,
    item: &I,
) -> Result<(&str, chrono::DateTime<Utc>)> {
    if let Some(actual) = item.source_service()
        && actual != service
    {
        return Err(Error::schema_mismatch(
            format!("{} item", service),
            format!("{} item", actual),
        ));
    }
    let id = item
        .item_id()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| Error::schema_mismatch(format!("{} item with an id", service), "no id"))?;
    let updated = item.last_updated().ok_or_else(|| {
        Error::schema_mismatch(
            format!("{} item with a last-updated time", service),
            format!("item {} without one", id),
        )
    })?;
    Ok((id, updated))
}

// # Sync Item Trait
//
// The two facts the state layer needs from any tracker item: its id in the
// tracker it came from, and when that tracker last saw it change.

use chrono::{DateTime, Utc};

use crate::model::Service;

/// An item that can be recorded in sync state
pub trait SyncItem {
    /// Id in the item's own service, `None` if the item was never created there
    fn item_id(&self) -> Option<&str>;

    /// Last modification time reported by the item's own service
    fn last_updated(&self) -> Option<DateTime<Utc>>;

    /// Service whose record shape this item has, if the type knows it
    ///
    /// Storage rejects items recorded under the other service's namespace.
    fn source_service(&self) -> Option<Service> {
        None
    }
}

impl<T: SyncItem + ?Sized> SyncItem for &T {
    fn item_id(&self) -> Option<&str> {
        (**self).item_id()
    }

    fn last_updated(&self) -> Option<DateTime<Utc>> {
        (**self).last_updated()
    }

    fn source_service(&self) -> Option<Service> {
        (**self).source_service()
    }
}

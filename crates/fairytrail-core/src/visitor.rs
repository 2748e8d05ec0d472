use std::sync::Mutex;

use tracing::warn;
use uuid::Uuid;

use crate::storage::{KeyValueStore, VISITOR_ID_KEY};

/// Generate-once, persist-forever visitor identifier.
///
/// The id is a random UUIDv4 created lazily on first access. If storage is
/// unavailable, a generated id is kept in memory for the lifetime of this
/// value so callers still get a stable answer.
pub struct VisitorIdentity<S> {
    storage: S,
    ephemeral: Mutex<Option<String>>,
}

impl<S: KeyValueStore> VisitorIdentity<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            ephemeral: Mutex::new(None),
        }
    }

    pub fn get_or_create(&self) -> String {
        match self.storage.get(VISITOR_ID_KEY) {
            Ok(Some(id)) if !id.trim().is_empty() => return id,
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "visitor id storage unreadable; using ephemeral id");
                return self.ephemeral_id();
            }
        }

        let id = self.ephemeral_id();
        if let Err(e) = self.storage.set(VISITOR_ID_KEY, &id) {
            warn!(error = %e, "failed to persist visitor id");
        }
        id
    }

    pub fn clear(&self) {
        if let Ok(mut guard) = self.ephemeral.lock() {
            *guard = None;
        }
        if let Err(e) = self.storage.remove(VISITOR_ID_KEY) {
            warn!(error = %e, "failed to clear visitor id");
        }
    }

    fn ephemeral_id(&self) -> String {
        match self.ephemeral.lock() {
            Ok(mut guard) => guard
                .get_or_insert_with(|| Uuid::new_v4().to_string())
                .clone(),
            Err(_) => Uuid::new_v4().to_string(),
        }
    }
}

//! Compute-if-absent cache for slowly-changing service metadata.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::Mutex;

use crate::{Error, Result};

/// A process-local cache for slowly-changing metadata such as region lists,
/// supported-platform flags or default engine versions.
///
/// Owned by the [`Context`](crate::Context) rather than living in a static,
/// so invalidation is explicit and scoped to one client.
///
/// Values are computed outside the lock: two concurrent callers may both run
/// the initializer for the same key and one result is discarded, but a
/// partially written entry is never visible.
#[derive(Default)]
pub struct MetadataCache {
    entries: Mutex<HashMap<String, Arc<dyn Any + Send + Sync>>>,
}

impl std::fmt::Debug for MetadataCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let len = self.entries.lock().expect("lock poisoned").len();
        f.debug_struct("MetadataCache").field("entries", &len).finish()
    }
}

impl MetadataCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the cached value for `key`, computing and storing it if absent.
    ///
    /// The initializer only runs on a miss. If another caller stored a value
    /// while the initializer was running, the stored value wins so all
    /// readers observe one consistent entry.
    pub async fn get_or_try_init<T, F, Fut>(&self, key: &str, init: F) -> Result<Arc<T>>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(hit) = self.get::<T>(key)? {
            return Ok(hit);
        }

        let computed: Arc<dyn Any + Send + Sync> = Arc::new(init().await?);

        let mut entries = self.entries.lock().expect("lock poisoned");
        let stored = entries
            .entry(key.to_string())
            .or_insert_with(|| computed)
            .clone();
        drop(entries);

        stored
            .downcast::<T>()
            .map_err(|_| Error::unexpected(format!("metadata cache entry `{key}` has a different type")))
    }

    /// Get the cached value for `key` without computing.
    pub fn get<T: Send + Sync + 'static>(&self, key: &str) -> Result<Option<Arc<T>>> {
        let entries = self.entries.lock().expect("lock poisoned");
        match entries.get(key) {
            None => Ok(None),
            Some(v) => v
                .clone()
                .downcast::<T>()
                .map(Some)
                .map_err(|_| {
                    Error::unexpected(format!("metadata cache entry `{key}` has a different type"))
                }),
        }
    }

    /// Drop the entry for `key`, if present.
    pub fn invalidate(&self, key: &str) {
        self.entries.lock().expect("lock poisoned").remove(key);
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.lock().expect("lock poisoned").clear();
    }
}

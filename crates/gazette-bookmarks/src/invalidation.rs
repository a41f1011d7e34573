//! Tag-based cache invalidation signals.
//!
//! Downstream caches partition the bookmarks list by edition and collection.
//! Each mutation fires exactly one notification, after counters are applied,
//! naming every partition the change touched.

use std::collections::BTreeSet;
use std::sync::Mutex;

use gazette_core::{BookmarkRow, CollectionId};

/// Cache partitions touched by one mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvalidationScope {
    pub user_id: String,
    pub editions: BTreeSet<String>,
    pub collections: BTreeSet<CollectionId>,
}

impl InvalidationScope {
    pub fn new(user_id: &str) -> InvalidationScope {
        InvalidationScope {
            user_id: user_id.to_string(),
            ..Default::default()
        }
    }

    /// Fold in the partitions a row belongs to. Called with both the before
    /// and after snapshot of an update so a move invalidates both sides.
    pub fn add_row(&mut self, row: &BookmarkRow) {
        if let Some(edition) = &row.edition_code {
            self.editions.insert(edition.clone());
        }
        if let Some(collection) = row.collection_id {
            self.collections.insert(collection);
        }
    }

    /// Caller-supplied edition hints widen the scope beyond what the rows
    /// themselves carry (e.g. a shared front page rendered per edition).
    pub fn add_edition_hints(&mut self, hints: &[String]) {
        self.editions
            .extend(hints.iter().filter(|h| !h.is_empty()).cloned());
    }
}

/// Receives one notification per mutation.
pub trait CacheInvalidator: Send + Sync {
    fn invalidate(&self, scope: &InvalidationScope);
}

/// Default: nobody to notify.
pub struct NoopInvalidator;

impl CacheInvalidator for NoopInvalidator {
    fn invalidate(&self, _scope: &InvalidationScope) {}
}

/// Test helper that records every scope it receives.
#[derive(Default)]
pub struct RecordingInvalidator {
    scopes: Mutex<Vec<InvalidationScope>>,
}

impl RecordingInvalidator {
    pub fn take(&self) -> Vec<InvalidationScope> {
        std::mem::take(&mut self.scopes.lock().unwrap_or_else(|p| p.into_inner()))
    }
}

impl CacheInvalidator for RecordingInvalidator {
    fn invalidate(&self, scope: &InvalidationScope) {
        self.scopes
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(scope.clone());
    }
}

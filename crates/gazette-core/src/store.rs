use serde::{Deserialize, Serialize};

use crate::bookmark::{BookmarkRow, Collection, CollectionId, NewBookmark, ReadState};
use crate::query::BookmarkQuery;
use crate::stats::{AggregateStats, StatsDelta};

/// Typed mutation to one of a bookmark's writable fields.
///
/// `post_id`, `edition_code`, and `created_at` are immutable once set; there
/// is deliberately no mutation for them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BookmarkMutation {
    SetTitle(String),
    SetExcerpt(Option<String>),
    SetFeaturedImage(Option<serde_json::Value>),
    SetCategory(Option<String>),
    SetTags(Option<Vec<String>>),
    SetReadState(ReadState),
    SetNote(Option<String>),
    SetCollection(Option<CollectionId>),
}

/// The contract the bookmarks subsystem consumes from its datastore.
///
/// Counter maintenance is part of the contract: `apply_stats_delta` must be
/// an atomic read-modify-write inside the store, so two concurrent callers
/// for the same user both land (no lost update at the application layer).
pub trait BookmarkStore: Send + Sync {
    /// Insert a new row. `AlreadyExists` when the `(user, post)` pair is
    /// already saved; duplicate saves are rejected, never upserted.
    fn insert_bookmark(&self, user_id: &str, bookmark: NewBookmark)
        -> Result<BookmarkRow, StoreError>;

    fn get_bookmark(&self, user_id: &str, post_id: &str)
        -> Result<Option<BookmarkRow>, StoreError>;

    /// Apply mutations to an existing row and return the updated row.
    /// `NotFound` when no row matches.
    fn update_bookmark(
        &self,
        user_id: &str,
        post_id: &str,
        mutations: Vec<BookmarkMutation>,
    ) -> Result<BookmarkRow, StoreError>;

    /// Delete by one or many post ids, returning the rows that were deleted.
    /// Missing ids are simply absent from the result.
    fn delete_bookmarks(
        &self,
        user_id: &str,
        post_ids: &[String],
    ) -> Result<Vec<BookmarkRow>, StoreError>;

    /// Run a fully-specified query: predicates, order with id tie-break,
    /// limit.
    fn query(&self, query: &BookmarkQuery) -> Result<Vec<BookmarkRow>, StoreError>;

    /// Count matching rows without fetching them.
    fn count(&self, query: &BookmarkQuery) -> Result<usize, StoreError>;

    /// Read the denormalized counters. An absent record is the all-zero
    /// default, not an error.
    fn fetch_stats(&self, user_id: &str) -> Result<AggregateStats, StoreError>;

    /// Full recompute from the rows, rewriting the persisted counters.
    /// Drift repair only, never part of the mutation hot path.
    fn recompute_stats(&self, user_id: &str) -> Result<AggregateStats, StoreError>;

    /// Atomically merge a signed delta into the persisted counters,
    /// creating the record at zero if absent.
    fn apply_stats_delta(&self, user_id: &str, delta: &StatsDelta) -> Result<(), StoreError>;

    fn get_collection(
        &self,
        user_id: &str,
        id: CollectionId,
    ) -> Result<Option<Collection>, StoreError>;

    fn list_collections(&self, user_id: &str) -> Result<Vec<Collection>, StoreError>;

    fn create_collection(
        &self,
        user_id: &str,
        name: &str,
        edition_code: Option<&str>,
    ) -> Result<Collection, StoreError>;

    /// Find-or-create the default collection for `(user, edition)`.
    /// Idempotent: concurrent first-bookmark calls resolve to the same row.
    fn find_or_create_default_collection(
        &self,
        user_id: &str,
        edition_code: Option<&str>,
    ) -> Result<Collection, StoreError>;
}

/// Errors from the bookmark store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Bookmark not found: {0}")]
    NotFound(String),

    #[error("Bookmark already exists: {0}")]
    AlreadyExists(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

//! The mutation pipeline and list endpoint behind the saved-items view.
//!
//! Every mutation runs the same shape: validate, resolve the collection,
//! mutate the row, compute the signed counter delta from the before/after
//! snapshots, merge it into the persisted counters, then notify caches. The
//! row mutation is authoritative: if the counter merge fails afterwards the
//! row change stands and the failure surfaces as `CounterDrift` rather than
//! being rolled back or swallowed.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use gazette_core::{
    combine_stats_deltas, compute_stats_delta, AggregateStats, BookmarkMutation, BookmarkQuery,
    BookmarkRow, BookmarkStore, ListRequest, NewBookmark, Page, ReadState, StatsDelta,
};

use crate::collections::ensure_collection_assignment;
use crate::error::BookmarksError;
use crate::invalidation::{CacheInvalidator, InvalidationScope, NoopInvalidator};
use crate::patch::BookmarkPatch;

/// Pagination envelope returned with every list response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageInfo {
    pub limit: usize,
    pub has_more: bool,
    pub next_cursor: Option<String>,
}

/// One page of the saved-items list. `stats` is populated only on a cold
/// load (no cursor); continuation pages skip the extra round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookmarkPage {
    pub bookmarks: Vec<BookmarkRow>,
    pub stats: Option<AggregateStats>,
    pub pagination: PageInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddOutcome {
    pub added: Vec<BookmarkRow>,
    pub stats_delta: StatsDelta,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateOutcome {
    pub updated: Vec<BookmarkRow>,
    pub stats_delta: StatsDelta,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoveOutcome {
    pub removed: Vec<BookmarkRow>,
    pub stats_delta: StatsDelta,
}

/// The service boundary consumed by the action layer.
pub struct BookmarksService<S: BookmarkStore> {
    store: S,
    invalidator: Arc<dyn CacheInvalidator>,
}

impl<S: BookmarkStore> BookmarksService<S> {
    pub fn new(store: S) -> Self {
        Self::with_invalidator(store, Arc::new(NoopInvalidator))
    }

    pub fn with_invalidator(store: S, invalidator: Arc<dyn CacheInvalidator>) -> Self {
        BookmarksService { store, invalidator }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// One page of the user's list. A malformed or stale cursor silently
    /// falls back to the first page; stats are fetched only on a cold load,
    /// and a zero-row first page short-circuits to the all-zero default
    /// without touching the counters at all.
    pub fn list_bookmarks(
        &self,
        user_id: &str,
        request: &ListRequest,
    ) -> Result<BookmarkPage, BookmarksError> {
        let limit = request.effective_limit();
        let query = BookmarkQuery::from_request(user_id, request);
        let rows = self
            .store
            .query(&query)
            .map_err(|e| BookmarksError::dependency("listing bookmarks", e))?;
        let page = Page::derive(limit, rows, query.sort_by, query.sort_order);

        let stats = if request.cursor.is_none() {
            if page.rows.is_empty() {
                Some(AggregateStats::default())
            } else {
                Some(self.stats_or_zero(user_id))
            }
        } else {
            None
        };

        Ok(BookmarkPage {
            bookmarks: page.rows,
            stats,
            pagination: PageInfo {
                limit,
                has_more: page.has_more,
                next_cursor: page.next_cursor,
            },
        })
    }

    /// Explicit stats refresh: a full recompute from the rows that also
    /// rewrites the persisted counters. This is the repair path for counter
    /// drift left behind by a partial failure; unlike passive stats reads it
    /// does not degrade to zeros.
    pub fn refresh_stats(&self, user_id: &str) -> Result<AggregateStats, BookmarksError> {
        self.store
            .recompute_stats(user_id)
            .map_err(|e| BookmarksError::dependency("recomputing stats", e))
    }

    /// Save a new item. Duplicate `(user, post)` pairs are rejected, never
    /// upserted.
    pub fn add_bookmark(
        &self,
        user_id: &str,
        mut bookmark: NewBookmark,
        edition_hints: &[String],
    ) -> Result<AddOutcome, BookmarksError> {
        if bookmark.post_id.trim().is_empty() {
            return Err(BookmarksError::Validation("postId is required".into()));
        }
        let collection = ensure_collection_assignment(
            &self.store,
            user_id,
            bookmark.collection_id,
            bookmark.edition_code.as_deref(),
        )?;
        bookmark.collection_id = Some(collection);

        let row = self.store.insert_bookmark(user_id, bookmark)?;
        let stats_delta = compute_stats_delta(None, Some(&row));
        self.apply_counters(user_id, &stats_delta)?;
        self.notify(user_id, [Some(&row), None], edition_hints);
        Ok(AddOutcome {
            added: vec![row],
            stats_delta,
        })
    }

    /// Apply a patch to an existing item. A patch that changes nothing is
    /// rejected rather than silently succeeding, so clients can distinguish
    /// a stale form from a real write.
    pub fn update_bookmark(
        &self,
        user_id: &str,
        post_id: &str,
        updates: &BookmarkPatch,
        edition_hints: &[String],
    ) -> Result<UpdateOutcome, BookmarksError> {
        let before = self
            .store
            .get_bookmark(user_id, post_id)
            .map_err(|e| BookmarksError::dependency("loading bookmark", e))?
            .ok_or_else(|| BookmarksError::NotFound(format!("{post_id} is not saved")))?;

        let mut mutations = updates.diff(&before);
        if mutations.is_empty() {
            return Err(BookmarksError::Validation("no updates provided".into()));
        }
        for mutation in &mut mutations {
            if let BookmarkMutation::SetCollection(target) = mutation {
                let resolved = ensure_collection_assignment(
                    &self.store,
                    user_id,
                    *target,
                    before.edition_code.as_deref(),
                )?;
                *mutation = BookmarkMutation::SetCollection(Some(resolved));
            }
        }

        let after = self.store.update_bookmark(user_id, post_id, mutations)?;
        let stats_delta = compute_stats_delta(Some(&before), Some(&after));
        self.apply_counters(user_id, &stats_delta)?;
        self.notify(user_id, [Some(&before), Some(&after)], edition_hints);
        Ok(UpdateOutcome {
            updated: vec![after],
            stats_delta,
        })
    }

    /// Convenience wrapper for the most common update.
    pub fn set_read_state(
        &self,
        user_id: &str,
        post_id: &str,
        read_state: ReadState,
    ) -> Result<UpdateOutcome, BookmarksError> {
        let patch = BookmarkPatch {
            read_state: Some(read_state),
            ..Default::default()
        };
        self.update_bookmark(user_id, post_id, &patch, &[])
    }

    pub fn remove_bookmark(
        &self,
        user_id: &str,
        post_id: &str,
        edition_hints: &[String],
    ) -> Result<RemoveOutcome, BookmarksError> {
        let trimmed = post_id.trim();
        if trimmed.is_empty() {
            return Err(BookmarksError::Validation("postId is required".into()));
        }
        let outcome = self.remove_rows(user_id, &[trimmed.to_string()], edition_hints)?;
        if outcome.removed.is_empty() {
            return Err(BookmarksError::NotFound(format!("{trimmed} is not saved")));
        }
        Ok(outcome)
    }

    /// Remove many items with one combined counter write. Ids that are not
    /// saved are skipped; an id list that is empty after trimming is a
    /// validation error.
    pub fn bulk_remove_bookmarks(
        &self,
        user_id: &str,
        post_ids: &[String],
        edition_hints: &[String],
    ) -> Result<RemoveOutcome, BookmarksError> {
        let ids: Vec<String> = post_ids
            .iter()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();
        if ids.is_empty() {
            return Err(BookmarksError::Validation(
                "at least one postId is required".into(),
            ));
        }
        self.remove_rows(user_id, &ids, edition_hints)
    }

    fn remove_rows(
        &self,
        user_id: &str,
        post_ids: &[String],
        edition_hints: &[String],
    ) -> Result<RemoveOutcome, BookmarksError> {
        let removed = self
            .store
            .delete_bookmarks(user_id, post_ids)
            .map_err(|e| BookmarksError::dependency("removing bookmarks", e))?;
        let per_row: Vec<StatsDelta> = removed
            .iter()
            .map(|row| compute_stats_delta(Some(row), None))
            .collect();
        let stats_delta = combine_stats_deltas(&per_row);
        self.apply_counters(user_id, &stats_delta)?;
        if !removed.is_empty() {
            let mut scope = InvalidationScope::new(user_id);
            for row in &removed {
                scope.add_row(row);
            }
            scope.add_edition_hints(edition_hints);
            self.invalidator.invalidate(&scope);
        }
        Ok(RemoveOutcome {
            removed,
            stats_delta,
        })
    }

    /// Merge a delta into the persisted counters. The zero delta is skipped.
    /// A failure here arrives *after* the row mutation committed: report it,
    /// leave the row change in effect, and let an out-of-band recompute
    /// repair the counters.
    fn apply_counters(&self, user_id: &str, delta: &StatsDelta) -> Result<(), BookmarksError> {
        if delta.is_zero() {
            return Ok(());
        }
        self.store.apply_stats_delta(user_id, delta).map_err(|e| {
            tracing::error!(user = user_id, error = %e, "counter merge failed after row mutation");
            BookmarksError::CounterDrift { source: e }
        })
    }

    fn stats_or_zero(&self, user_id: &str) -> AggregateStats {
        match self.store.fetch_stats(user_id) {
            Ok(stats) => stats,
            Err(e) => {
                tracing::warn!(user = user_id, error = %e, "stats read failed, serving zeros");
                AggregateStats::default()
            }
        }
    }

    fn notify(&self, user_id: &str, rows: [Option<&BookmarkRow>; 2], edition_hints: &[String]) {
        let mut scope = InvalidationScope::new(user_id);
        for row in rows.into_iter().flatten() {
            scope.add_row(row);
        }
        scope.add_edition_hints(edition_hints);
        self.invalidator.invalidate(&scope);
    }
}

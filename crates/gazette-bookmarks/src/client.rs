//! Client-side optimistic state for the saved-items view.
//!
//! Mutation responses carry the changed rows plus the server-computed stats
//! delta. The reducer merges rows by `post_id` and folds the delta into the
//! cached stats element-wise; it never replaces stats wholesale from a
//! mutation, so one round trip is all an interaction costs. A full stats
//! value arrives only with a cold-load page.

use serde::{Deserialize, Serialize};

use gazette_core::{AggregateStats, BookmarkRow};

use crate::service::{AddOutcome, BookmarkPage, RemoveOutcome, UpdateOutcome};

/// In-memory mirror of one user's list and counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookmarkListState {
    pub rows: Vec<BookmarkRow>,
    pub stats: AggregateStats,
}

impl BookmarkListState {
    /// Merge a fetched page. The first page (no prior rows or a page
    /// carrying stats) replaces state; continuation pages append, deduped by
    /// `post_id` in case a row shifted across page boundaries.
    pub fn hydrate(&mut self, page: &BookmarkPage) {
        if let Some(stats) = &page.stats {
            // Cold load: server state replaces whatever we had.
            self.rows = page.bookmarks.clone();
            self.stats = stats.clone();
            return;
        }
        for row in &page.bookmarks {
            if !self.rows.iter().any(|r| r.post_id == row.post_id) {
                self.rows.push(row.clone());
            }
        }
    }

    pub fn apply_add(&mut self, outcome: &AddOutcome) {
        for row in &outcome.added {
            self.rows.retain(|r| r.post_id != row.post_id);
            self.rows.insert(0, row.clone());
        }
        self.stats.apply_delta(&outcome.stats_delta);
    }

    pub fn apply_update(&mut self, outcome: &UpdateOutcome) {
        for row in &outcome.updated {
            // Replace in place; a row not currently visible stays invisible.
            if let Some(slot) = self.rows.iter_mut().find(|r| r.post_id == row.post_id) {
                *slot = row.clone();
            }
        }
        self.stats.apply_delta(&outcome.stats_delta);
    }

    pub fn apply_remove(&mut self, outcome: &RemoveOutcome) {
        self.rows
            .retain(|r| !outcome.removed.iter().any(|gone| gone.post_id == r.post_id));
        self.stats.apply_delta(&outcome.stats_delta);
    }
}

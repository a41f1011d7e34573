//! Aggregate counters and the signed deltas that maintain them.
//!
//! The persisted counters are never recomputed from a table scan on the hot
//! path; every mutation produces a minimal signed delta from the before/after
//! row snapshots, and the store merges that delta atomically. A full
//! recompute exists only for cold drift repair.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::bookmark::{BookmarkRow, CollectionId, ReadState};

/// Reserved collections-map key for rows with no collection, so that the
/// collections map always sums to the total.
pub const UNASSIGNED_COLLECTION_KEY: &str = "unassigned";

/// The collections-map key for a row: its collection id, or the reserved
/// unassigned sentinel.
pub fn collection_key(id: Option<&CollectionId>) -> String {
    match id {
        Some(id) => id.to_string(),
        None => UNASSIGNED_COLLECTION_KEY.to_string(),
    }
}

/// Denormalized aggregate counters for one user's saved items.
///
/// Invariants: `unread <= total`, `sum(read_states) == total`,
/// `sum(collections) == total`, `sum(categories) <= total` (uncategorized
/// rows carry no category bucket). Map entries are always positive; an
/// absent key means zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateStats {
    pub total: u64,
    pub unread: u64,
    pub categories: BTreeMap<String, u64>,
    pub read_states: BTreeMap<ReadState, u64>,
    pub collections: BTreeMap<String, u64>,
}

impl AggregateStats {
    /// Fold a signed delta into these counters, saturating at zero and
    /// dropping buckets that empty out. Used by the client reducer; the
    /// server-side merge happens inside the store.
    pub fn apply_delta(&mut self, delta: &StatsDelta) {
        self.total = add_signed(self.total, delta.total);
        self.unread = add_signed(self.unread, delta.unread);
        merge_map(&mut self.categories, &delta.categories);
        merge_map(&mut self.read_states, &delta.read_states);
        merge_map(&mut self.collections, &delta.collections);
    }
}

fn add_signed(base: u64, delta: i64) -> u64 {
    if delta >= 0 {
        base.saturating_add(delta as u64)
    } else {
        base.saturating_sub(delta.unsigned_abs())
    }
}

fn merge_map<K: Ord + Clone>(counts: &mut BTreeMap<K, u64>, deltas: &BTreeMap<K, i64>) {
    for (key, delta) in deltas {
        let next = add_signed(counts.get(key).copied().unwrap_or(0), *delta);
        if next == 0 {
            counts.remove(key);
        } else {
            counts.insert(key.clone(), next);
        }
    }
}

/// Signed, field-wise change to `AggregateStats` caused by one mutation.
/// Ephemeral: computed per request, merged into the persisted counters, and
/// echoed to the client; never stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsDelta {
    pub total: i64,
    pub unread: i64,
    pub categories: BTreeMap<String, i64>,
    pub read_states: BTreeMap<ReadState, i64>,
    pub collections: BTreeMap<String, i64>,
}

impl StatsDelta {
    pub fn is_zero(&self) -> bool {
        self.total == 0
            && self.unread == 0
            && self.categories.is_empty()
            && self.read_states.is_empty()
            && self.collections.is_empty()
    }

    /// Count a whole row in (`sign = 1`) or out (`sign = -1`).
    fn tally_row(&mut self, row: &BookmarkRow, sign: i64) {
        self.total += sign;
        if row.read_state == ReadState::Unread {
            self.unread += sign;
        }
        if let Some(category) = &row.category {
            bump(&mut self.categories, category.clone(), sign);
        }
        bump(&mut self.read_states, row.read_state, sign);
        bump(&mut self.collections, collection_key(row.collection_id.as_ref()), sign);
    }
}

fn bump<K: Ord>(map: &mut BTreeMap<K, i64>, key: K, delta: i64) {
    let entry = map.entry(key);
    match entry {
        std::collections::btree_map::Entry::Occupied(mut slot) => {
            let next = *slot.get() + delta;
            if next == 0 {
                slot.remove();
            } else {
                *slot.get_mut() = next;
            }
        }
        std::collections::btree_map::Entry::Vacant(slot) => {
            if delta != 0 {
                slot.insert(delta);
            }
        }
    }
}

/// Compute the minimal signed delta for one mutation from its before/after
/// row snapshots: add (`next` only), remove (`previous` only), or a
/// per-field update diff (both). An update that changes no counted field
/// returns an all-zero delta the caller may skip applying.
pub fn compute_stats_delta(
    previous: Option<&BookmarkRow>,
    next: Option<&BookmarkRow>,
) -> StatsDelta {
    let mut delta = StatsDelta::default();
    match (previous, next) {
        (None, Some(added)) => delta.tally_row(added, 1),
        (Some(removed), None) => delta.tally_row(removed, -1),
        (Some(before), Some(after)) => {
            if before.category != after.category {
                if let Some(old) = &before.category {
                    bump(&mut delta.categories, old.clone(), -1);
                }
                if let Some(new) = &after.category {
                    bump(&mut delta.categories, new.clone(), 1);
                }
            }
            if before.read_state != after.read_state {
                bump(&mut delta.read_states, before.read_state, -1);
                bump(&mut delta.read_states, after.read_state, 1);
                if before.read_state == ReadState::Unread {
                    delta.unread -= 1;
                }
                if after.read_state == ReadState::Unread {
                    delta.unread += 1;
                }
            }
            if before.collection_id != after.collection_id {
                bump(
                    &mut delta.collections,
                    collection_key(before.collection_id.as_ref()),
                    -1,
                );
                bump(
                    &mut delta.collections,
                    collection_key(after.collection_id.as_ref()),
                    1,
                );
            }
        }
        (None, None) => {}
    }
    delta
}

/// Element-wise sum of deltas; bulk removal folds N per-row deltas into one
/// counter write with this.
pub fn combine_stats_deltas(deltas: &[StatsDelta]) -> StatsDelta {
    let mut combined = StatsDelta::default();
    for delta in deltas {
        combined.total += delta.total;
        combined.unread += delta.unread;
        for (key, value) in &delta.categories {
            bump(&mut combined.categories, key.clone(), *value);
        }
        for (key, value) in &delta.read_states {
            bump(&mut combined.read_states, *key, *value);
        }
        for (key, value) in &delta.collections {
            bump(&mut combined.collections, key.clone(), *value);
        }
    }
    combined
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn row(category: Option<&str>, state: ReadState, collection: Option<CollectionId>) -> BookmarkRow {
        BookmarkRow {
            id: Uuid::new_v4(),
            user_id: "u".into(),
            post_id: Uuid::new_v4().to_string(),
            edition_code: None,
            collection_id: collection,
            title: "t".into(),
            slug: "t".into(),
            excerpt: None,
            featured_image: None,
            category: category.map(String::from),
            tags: None,
            read_state: state,
            note: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn add_counts_every_bucket() {
        let added = row(Some("News"), ReadState::Unread, None);
        let delta = compute_stats_delta(None, Some(&added));
        assert_eq!(delta.total, 1);
        assert_eq!(delta.unread, 1);
        assert_eq!(delta.categories.get("News"), Some(&1));
        assert_eq!(delta.read_states.get(&ReadState::Unread), Some(&1));
        assert_eq!(delta.collections.get(UNASSIGNED_COLLECTION_KEY), Some(&1));
    }

    #[test]
    fn remove_is_the_negation_of_add() {
        let target = row(Some("Sport"), ReadState::Read, Some(Uuid::new_v4()));
        let add = compute_stats_delta(None, Some(&target));
        let remove = compute_stats_delta(Some(&target), None);
        let cancelled = combine_stats_deltas(&[add, remove]);
        assert!(cancelled.is_zero());
    }

    #[test]
    fn update_read_state_leaves_total_unchanged() {
        let before = row(Some("News"), ReadState::Unread, None);
        let mut after = before.clone();
        after.read_state = ReadState::Read;
        let delta = compute_stats_delta(Some(&before), Some(&after));
        assert_eq!(delta.total, 0);
        assert_eq!(delta.unread, -1);
        assert_eq!(delta.read_states.get(&ReadState::Unread), Some(&-1));
        assert_eq!(delta.read_states.get(&ReadState::Read), Some(&1));
        assert!(delta.categories.is_empty());
        assert!(delta.collections.is_empty());
    }

    #[test]
    fn update_with_no_watched_change_is_zero() {
        let before = row(Some("News"), ReadState::Unread, None);
        let mut after = before.clone();
        after.note = Some("annotated".into());
        after.title = "Edited headline".into();
        assert!(compute_stats_delta(Some(&before), Some(&after)).is_zero());
    }

    #[test]
    fn update_moving_between_same_named_buckets_cancels() {
        // Category change onto itself must not leave a residual entry.
        let before = row(Some("News"), ReadState::Unread, None);
        let mut after = before.clone();
        after.category = Some("Culture".into());
        let forward = compute_stats_delta(Some(&before), Some(&after));
        let backward = compute_stats_delta(Some(&after), Some(&before));
        assert!(combine_stats_deltas(&[forward, backward]).is_zero());
    }

    #[test]
    fn bulk_combination_sums_per_row_removals() {
        // p1 News/unread, p2 Sport/read, both removed.
        let p1 = row(Some("News"), ReadState::Unread, None);
        let p2 = row(Some("Sport"), ReadState::Read, None);
        let deltas = vec![
            compute_stats_delta(Some(&p1), None),
            compute_stats_delta(Some(&p2), None),
        ];
        let combined = combine_stats_deltas(&deltas);
        assert_eq!(combined.total, -2);
        assert_eq!(combined.unread, -1);
        assert_eq!(combined.categories.get("News"), Some(&-1));
        assert_eq!(combined.categories.get("Sport"), Some(&-1));
        assert_eq!(combined.read_states.get(&ReadState::Unread), Some(&-1));
        assert_eq!(combined.read_states.get(&ReadState::Read), Some(&-1));
    }

    #[test]
    fn apply_delta_saturates_and_drops_empty_buckets() {
        let mut stats = AggregateStats::default();
        let added = row(Some("News"), ReadState::Unread, None);
        stats.apply_delta(&compute_stats_delta(None, Some(&added)));
        assert_eq!(stats.total, 1);
        assert_eq!(stats.categories.get("News"), Some(&1));

        stats.apply_delta(&compute_stats_delta(Some(&added), None));
        assert_eq!(stats.total, 0);
        assert!(stats.categories.is_empty());
        assert!(stats.read_states.is_empty());
        assert!(stats.collections.is_empty());

        // A stray over-negative delta must clamp, not wrap.
        stats.apply_delta(&compute_stats_delta(Some(&added), None));
        assert_eq!(stats.total, 0);
        assert_eq!(stats.unread, 0);
    }
}

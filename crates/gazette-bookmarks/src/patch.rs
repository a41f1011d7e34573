//! Writable-field patches and before/after diffing.
//!
//! A patch distinguishes "leave the field alone" (`None`) from "set it",
//! and, for nullable fields, "set it to null" (`Some(None)`). Diffing
//! against the current row yields only the mutations that would actually
//! change something, which is how the pipeline detects no-op updates.

use gazette_core::{BookmarkMutation, BookmarkRow, CollectionId, ReadState};

/// Requested changes to a bookmark's writable fields. `post_id`,
/// `edition_code`, and `created_at` are immutable and have no patch field.
#[derive(Debug, Clone, Default)]
pub struct BookmarkPatch {
    pub title: Option<String>,
    pub excerpt: Option<Option<String>>,
    pub featured_image: Option<Option<serde_json::Value>>,
    pub category: Option<Option<String>>,
    pub tags: Option<Option<Vec<String>>>,
    pub read_state: Option<ReadState>,
    pub note: Option<Option<String>>,
    /// `Some(None)` asks the collection resolver to re-assign the default
    /// collection; `Some(Some(id))` targets a specific one.
    pub collection_id: Option<Option<CollectionId>>,
}

impl BookmarkPatch {
    /// The mutations that would change `current`. Requested values equal to
    /// the row's are dropped, so an echo of the current state diffs to
    /// nothing.
    pub fn diff(&self, current: &BookmarkRow) -> Vec<BookmarkMutation> {
        let mut mutations = Vec::new();
        if let Some(title) = &self.title {
            if *title != current.title {
                mutations.push(BookmarkMutation::SetTitle(title.clone()));
            }
        }
        if let Some(excerpt) = &self.excerpt {
            if *excerpt != current.excerpt {
                mutations.push(BookmarkMutation::SetExcerpt(excerpt.clone()));
            }
        }
        if let Some(image) = &self.featured_image {
            if *image != current.featured_image {
                mutations.push(BookmarkMutation::SetFeaturedImage(image.clone()));
            }
        }
        if let Some(category) = &self.category {
            if *category != current.category {
                mutations.push(BookmarkMutation::SetCategory(category.clone()));
            }
        }
        if let Some(tags) = &self.tags {
            if *tags != current.tags {
                mutations.push(BookmarkMutation::SetTags(tags.clone()));
            }
        }
        if let Some(read_state) = self.read_state {
            if read_state != current.read_state {
                mutations.push(BookmarkMutation::SetReadState(read_state));
            }
        }
        if let Some(note) = &self.note {
            if *note != current.note {
                mutations.push(BookmarkMutation::SetNote(note.clone()));
            }
        }
        if let Some(collection) = &self.collection_id {
            if *collection != current.collection_id {
                mutations.push(BookmarkMutation::SetCollection(*collection));
            }
        }
        mutations
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.excerpt.is_none()
            && self.featured_image.is_none()
            && self.category.is_none()
            && self.tags.is_none()
            && self.read_state.is_none()
            && self.note.is_none()
            && self.collection_id.is_none()
    }
}

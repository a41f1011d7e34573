//! Collection assignment for incoming bookmarks.

use gazette_core::{BookmarkStore, CollectionId};

use crate::error::BookmarksError;

/// Resolve the collection a bookmark should land in.
///
/// An explicit id passes through once ownership is confirmed; no id resolves
/// to the default collection for `(user, edition)`, created lazily. The
/// find-or-create lives in the store and is idempotent, so concurrent
/// first-bookmark calls converge on one default collection.
pub fn ensure_collection_assignment<S: BookmarkStore>(
    store: &S,
    user_id: &str,
    requested: Option<CollectionId>,
    edition_code: Option<&str>,
) -> Result<CollectionId, BookmarksError> {
    match requested {
        Some(id) => match store.get_collection(user_id, id) {
            Ok(Some(_)) => Ok(id),
            Ok(None) => Err(BookmarksError::Validation(format!(
                "unknown collection {id}"
            ))),
            Err(e) => Err(BookmarksError::dependency("resolving collection", e)),
        },
        None => store
            .find_or_create_default_collection(user_id, edition_code)
            .map(|collection| collection.id)
            .map_err(|e| BookmarksError::dependency("resolving default collection", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gazette_core::SqliteBookmarkStore;
    use uuid::Uuid;

    #[test]
    fn explicit_valid_collection_passes_through() {
        let store = SqliteBookmarkStore::open_in_memory().unwrap();
        let owned = store.create_collection("u1", "Long reads", None).unwrap();
        let resolved =
            ensure_collection_assignment(&store, "u1", Some(owned.id), None).unwrap();
        assert_eq!(resolved, owned.id);
    }

    #[test]
    fn unknown_or_foreign_collection_is_rejected() {
        let store = SqliteBookmarkStore::open_in_memory().unwrap();
        let err =
            ensure_collection_assignment(&store, "u1", Some(Uuid::new_v4()), None).unwrap_err();
        assert_eq!(err.status_code(), 400);

        // Another user's collection is invisible here.
        let foreign = store.create_collection("u2", "Theirs", None).unwrap();
        let err =
            ensure_collection_assignment(&store, "u1", Some(foreign.id), None).unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn absent_collection_resolves_to_the_same_default_every_time() {
        let store = SqliteBookmarkStore::open_in_memory().unwrap();
        let first = ensure_collection_assignment(&store, "u1", None, Some("en-GB")).unwrap();
        let second = ensure_collection_assignment(&store, "u1", None, Some("en-GB")).unwrap();
        assert_eq!(first, second);

        let other_edition = ensure_collection_assignment(&store, "u1", None, None).unwrap();
        assert_ne!(first, other_edition);
    }
}

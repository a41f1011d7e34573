use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Globally unique bookmark row identifier (UUID v4).
pub type BookmarkId = Uuid;

/// Identifier of a user-owned bookmark collection.
pub type CollectionId = Uuid;

/// Opaque user identifier, assigned by the auth layer.
pub type UserId = String;

/// Opaque CMS post identifier.
pub type PostId = String;

/// Name given to a lazily created default collection.
pub const DEFAULT_COLLECTION_NAME: &str = "Saved";

/// Read progress of a saved item.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ReadState {
    #[default]
    Unread,
    InProgress,
    Read,
}

impl ReadState {
    pub const ALL: [ReadState; 3] = [ReadState::Unread, ReadState::InProgress, ReadState::Read];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReadState::Unread => "unread",
            ReadState::InProgress => "in_progress",
            ReadState::Read => "read",
        }
    }

    /// Parse a wire/storage name. Unknown names return `None`; callers that
    /// read legacy rows fall back to the default instead.
    pub fn parse(name: &str) -> Option<ReadState> {
        match name {
            "unread" => Some(ReadState::Unread),
            "in_progress" => Some(ReadState::InProgress),
            "read" => Some(ReadState::Read),
            _ => None,
        }
    }
}

impl std::fmt::Display for ReadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One saved item. At most one row exists per `(user_id, post_id)`.
///
/// Content fields (`title`, `slug`, `excerpt`, `featured_image`) are a
/// snapshot taken at save time; the CMS remains the source of truth for the
/// post itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookmarkRow {
    pub id: BookmarkId,
    pub user_id: UserId,
    pub post_id: PostId,
    /// Locale/edition partition the item was saved under.
    pub edition_code: Option<String>,
    pub collection_id: Option<CollectionId>,
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    /// Opaque structured blob from the CMS, stored verbatim.
    pub featured_image: Option<serde_json::Value>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub read_state: ReadState,
    pub note: Option<String>,
    /// Immutable once set.
    pub created_at: DateTime<Utc>,
}

/// Payload for saving a new item; `id` and `created_at` are assigned by the
/// store, `collection_id` is normally filled in by the collection resolver.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewBookmark {
    pub post_id: PostId,
    pub edition_code: Option<String>,
    pub collection_id: Option<CollectionId>,
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub featured_image: Option<serde_json::Value>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub read_state: ReadState,
    pub note: Option<String>,
}

/// User-owned grouping of bookmarks, optionally scoped to an edition.
///
/// Each `(user, edition)` pair has at most one default collection, created
/// lazily the first time a bookmark arrives without an explicit collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub id: CollectionId,
    pub user_id: UserId,
    pub edition_code: Option<String>,
    pub name: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

/// Canonical textual representation of timestamps, shared by the storage
/// layer and cursor values. Fixed-width UTC so that lexicographic order
/// matches chronological order.
pub fn timestamp_repr(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_state_round_trip() {
        for state in ReadState::ALL {
            assert_eq!(ReadState::parse(state.as_str()), Some(state));
        }
        assert_eq!(ReadState::parse("archived"), None);
    }

    #[test]
    fn read_state_serde_uses_snake_case() {
        let json = serde_json::to_string(&ReadState::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
        let back: ReadState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ReadState::InProgress);
    }

    #[test]
    fn bookmark_serde_round_trip() {
        let row = BookmarkRow {
            id: Uuid::new_v4(),
            user_id: "user-1".into(),
            post_id: "post-abc".into(),
            edition_code: Some("en-GB".into()),
            collection_id: Some(Uuid::new_v4()),
            title: "A Headline".into(),
            slug: "a-headline".into(),
            excerpt: Some("First paragraph.".into()),
            featured_image: Some(serde_json::json!({"url": "https://img", "w": 640})),
            category: Some("News".into()),
            tags: Some(vec!["politics".into()]),
            read_state: ReadState::Read,
            note: None,
            created_at: Utc::now(),
        };
        let json = serde_json::to_string_pretty(&row).unwrap();
        let back: BookmarkRow = serde_json::from_str(&json).unwrap();
        assert_eq!(row, back);
    }

    #[test]
    fn timestamp_repr_orders_lexicographically() {
        let earlier = Utc::now();
        let later = earlier + chrono::Duration::microseconds(1);
        assert!(timestamp_repr(earlier) < timestamp_repr(later));
        assert_eq!(timestamp_repr(earlier).len(), timestamp_repr(later).len());
    }
}

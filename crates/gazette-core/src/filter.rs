//! List filters for the saved-items view.
//!
//! The tri-state filters are tagged enums rather than overloaded string
//! sentinels: "all" vs null vs a concrete value decode to distinct variants,
//! so the query builder can match exhaustively.

use serde::{Deserialize, Serialize};

use crate::bookmark::{CollectionId, PostId, ReadState};
use crate::query::{SortColumn, SortOrder};

/// Page size applied when the caller does not specify one.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Filter over a nullable column: skip it, match only NULL rows, or match a
/// concrete value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScopeFilter<T> {
    #[default]
    Unfiltered,
    IsNull,
    Equals(T),
}

/// Read-state filter. `Unread` is a compound alias covering not-yet-finished
/// items: `unread`, `in_progress`, and legacy rows with no recorded state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadStateFilter {
    #[default]
    Any,
    Unread,
    Exact(ReadState),
}

impl ReadStateFilter {
    /// `Exact(Unread)` means the same thing as the compound alias; collapse
    /// it so the query builder has a single unread arm.
    pub fn normalized(self) -> ReadStateFilter {
        match self {
            ReadStateFilter::Exact(ReadState::Unread) => ReadStateFilter::Unread,
            other => other,
        }
    }

    /// Parse a wire value: "all"/empty → `Any`, "unread" → the compound
    /// alias, anything else that names a state → `Exact`.
    pub fn parse(value: &str) -> ReadStateFilter {
        match value {
            "" | "all" => ReadStateFilter::Any,
            "unread" => ReadStateFilter::Unread,
            other => ReadState::parse(other)
                .map(ReadStateFilter::Exact)
                .unwrap_or_default(),
        }
    }
}

/// Parameters for one page of a user's saved-items list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListRequest {
    pub limit: usize,
    pub search: Option<String>,
    /// "all" and empty are treated as unfiltered.
    pub category: Option<String>,
    pub post_id: Option<PostId>,
    pub edition: ScopeFilter<String>,
    pub collection: ScopeFilter<CollectionId>,
    pub read_state: ReadStateFilter,
    pub sort_by: SortColumn,
    pub sort_order: SortOrder,
    /// Opaque continuation token from the previous page, if any.
    pub cursor: Option<String>,
}

impl Default for ListRequest {
    fn default() -> Self {
        ListRequest {
            limit: DEFAULT_PAGE_SIZE,
            search: None,
            category: None,
            post_id: None,
            edition: ScopeFilter::Unfiltered,
            collection: ScopeFilter::Unfiltered,
            read_state: ReadStateFilter::Any,
            sort_by: SortColumn::default(),
            sort_order: SortOrder::default(),
            cursor: None,
        }
    }
}

impl ListRequest {
    /// The page size actually applied; zero is clamped to one.
    pub fn effective_limit(&self) -> usize {
        self.limit.max(1)
    }
}

use serde::{Deserialize, Serialize};

use crate::bookmark::BookmarkRow;
use crate::cursor::Cursor;
use crate::query::{SortColumn, SortOrder};

/// One derived page of list results.
///
/// Built from a `limit + 1` over-fetch: the extra row only signals that more
/// rows exist and is never returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub rows: Vec<BookmarkRow>,
    pub has_more: bool,
    /// Continuation token naming the last retained row. `None` when the
    /// result set is exhausted, or when the last row has no value for the
    /// sort column (`has_more` stays truthful either way).
    pub next_cursor: Option<String>,
}

impl Page {
    pub fn derive(
        limit: usize,
        mut rows: Vec<BookmarkRow>,
        sort_by: SortColumn,
        sort_order: SortOrder,
    ) -> Page {
        let has_more = rows.len() > limit;
        rows.truncate(limit);
        let next_cursor = if has_more {
            rows.last()
                .and_then(|last| {
                    sort_by.value_of(last).map(|value| Cursor {
                        sort_by,
                        sort_order,
                        value,
                        id: last.id,
                    })
                })
                .and_then(|cursor| cursor.encode())
        } else {
            None
        };
        Page {
            rows,
            has_more,
            next_cursor,
        }
    }
}

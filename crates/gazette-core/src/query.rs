use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::bookmark::{timestamp_repr, BookmarkRow, ReadState, UserId};
use crate::cursor::Cursor;
use crate::filter::{ListRequest, ReadStateFilter, ScopeFilter};

/// Columns of the bookmarks table that predicates may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    Id,
    UserId,
    PostId,
    EditionCode,
    CollectionId,
    Title,
    Slug,
    Excerpt,
    Category,
    ReadState,
    Note,
    CreatedAt,
}

impl Column {
    pub fn as_str(&self) -> &'static str {
        match self {
            Column::Id => "id",
            Column::UserId => "user_id",
            Column::PostId => "post_id",
            Column::EditionCode => "edition_code",
            Column::CollectionId => "collection_id",
            Column::Title => "title",
            Column::Slug => "slug",
            Column::Excerpt => "excerpt",
            Column::Category => "category",
            Column::ReadState => "read_state",
            Column::Note => "note",
            Column::CreatedAt => "created_at",
        }
    }
}

/// Sortable columns: a fixed whitelist, never arbitrary column names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortColumn {
    #[default]
    CreatedAt,
    Title,
    Category,
    ReadState,
}

impl SortColumn {
    /// Parse a client-supplied sort name. Unrecognized names fall back to the
    /// default column rather than erroring.
    pub fn parse(name: &str) -> SortColumn {
        match name {
            "created_at" | "createdAt" => SortColumn::CreatedAt,
            "title" => SortColumn::Title,
            "category" => SortColumn::Category,
            "read_state" | "readState" => SortColumn::ReadState,
            _ => SortColumn::default(),
        }
    }

    pub fn column(&self) -> Column {
        match self {
            SortColumn::CreatedAt => Column::CreatedAt,
            SortColumn::Title => Column::Title,
            SortColumn::Category => Column::Category,
            SortColumn::ReadState => Column::ReadState,
        }
    }

    /// The row's value for this column, in its canonical storage
    /// representation. `None` when the row has no value (nullable column),
    /// in which case no continuation cursor can be formed.
    pub fn value_of(&self, row: &BookmarkRow) -> Option<Scalar> {
        match self {
            SortColumn::CreatedAt => Some(Scalar::Text(timestamp_repr(row.created_at))),
            SortColumn::Title => Some(Scalar::Text(row.title.clone())),
            SortColumn::Category => row.category.clone().map(Scalar::Text),
            SortColumn::ReadState => Some(Scalar::Text(row.read_state.as_str().to_string())),
        }
    }
}

/// Sort direction. The id tie-break always follows the same direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// A scalar value a predicate compares against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Text(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::Text(s)
    }
}

impl From<Uuid> for Scalar {
    fn from(id: Uuid) -> Self {
        Scalar::Text(id.to_string())
    }
}

impl From<ReadState> for Scalar {
    fn from(state: ReadState) -> Self {
        Scalar::Text(state.as_str().to_string())
    }
}

/// Filter predicate over bookmark rows.
///
/// Queries are built as an AST and rendered by the storage backend with bound
/// parameters; user input never reaches the query text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    Eq(Column, Scalar),
    IsNull(Column),
    /// Substring match; the needle is escaped by the compiler.
    Like(Column, String),
    Gt(Column, Scalar),
    Lt(Column, Scalar),
    In(Column, Vec<Scalar>),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

/// A fully-specified, ordered, limited query against one user's bookmarks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookmarkQuery {
    pub user_id: UserId,
    /// Combined with implicit AND.
    pub predicates: Vec<Predicate>,
    pub sort_by: SortColumn,
    pub sort_order: SortOrder,
    /// Row cap as executed. `from_request` sets this to the page size plus
    /// one so the caller can detect a further page.
    pub limit: usize,
}

/// Columns searched by the free-text filter.
const SEARCH_COLUMNS: [Column; 6] = [
    Column::Title,
    Column::Excerpt,
    Column::Note,
    Column::PostId,
    Column::EditionCode,
    Column::CollectionId,
];

impl BookmarkQuery {
    /// Keyset query construction: filters plus an optional continuation
    /// cursor. The cursor is honored only when its sort signature matches the
    /// request's. A sort change silently restarts from the first page.
    pub fn from_request(user_id: &str, request: &ListRequest) -> BookmarkQuery {
        let sort_by = request.sort_by;
        let sort_order = request.sort_order;
        let mut predicates = Vec::new();

        if let Some(search) = request
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            predicates.push(Predicate::Or(
                SEARCH_COLUMNS
                    .iter()
                    .map(|col| Predicate::Like(*col, search.to_string()))
                    .collect(),
            ));
        }

        if let Some(category) = request
            .category
            .as_deref()
            .filter(|c| !c.is_empty() && *c != "all")
        {
            predicates.push(Predicate::Eq(Column::Category, category.into()));
        }

        if let Some(post_id) = request.post_id.as_deref() {
            predicates.push(Predicate::Eq(Column::PostId, post_id.into()));
        }

        match &request.edition {
            ScopeFilter::Unfiltered => {}
            ScopeFilter::IsNull => predicates.push(Predicate::IsNull(Column::EditionCode)),
            ScopeFilter::Equals(code) => {
                predicates.push(Predicate::Eq(Column::EditionCode, code.as_str().into()));
            }
        }

        match &request.collection {
            ScopeFilter::Unfiltered => {}
            ScopeFilter::IsNull => predicates.push(Predicate::IsNull(Column::CollectionId)),
            ScopeFilter::Equals(id) => {
                predicates.push(Predicate::Eq(Column::CollectionId, (*id).into()));
            }
        }

        match request.read_state.normalized() {
            ReadStateFilter::Any => {}
            ReadStateFilter::Unread => predicates.push(Predicate::Or(vec![
                Predicate::In(
                    Column::ReadState,
                    vec![ReadState::Unread.into(), ReadState::InProgress.into()],
                ),
                Predicate::IsNull(Column::ReadState),
            ])),
            ReadStateFilter::Exact(state) => {
                predicates.push(Predicate::Eq(Column::ReadState, state.into()));
            }
        }

        if let Some(cursor) = request.cursor.as_deref().and_then(Cursor::decode) {
            if cursor.sort_by == sort_by && cursor.sort_order == sort_order {
                predicates.push(keyset_predicate(&cursor));
            }
        }

        BookmarkQuery {
            user_id: user_id.to_string(),
            predicates,
            sort_by,
            sort_order,
            limit: request.effective_limit() + 1,
        }
    }
}

/// The keyset continuation predicate. Ascending:
/// `(col > v) OR (col = v AND id > cid)`; descending flips both comparators.
fn keyset_predicate(cursor: &Cursor) -> Predicate {
    let col = cursor.sort_by.column();
    let value = cursor.value.clone();
    let id: Scalar = cursor.id.into();
    match cursor.sort_order {
        SortOrder::Asc => Predicate::Or(vec![
            Predicate::Gt(col, value.clone()),
            Predicate::And(vec![
                Predicate::Eq(col, value),
                Predicate::Gt(Column::Id, id),
            ]),
        ]),
        SortOrder::Desc => Predicate::Or(vec![
            Predicate::Lt(col, value.clone()),
            Predicate::And(vec![
                Predicate::Eq(col, value),
                Predicate::Lt(Column::Id, id),
            ]),
        ]),
    }
}

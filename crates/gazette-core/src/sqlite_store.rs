//! SQLite-backed bookmark store.
//!
//! Counter maintenance note: `apply_stats_delta` merges deltas with a single
//! `INSERT .. ON CONFLICT DO UPDATE SET count = count + excluded.count` per
//! bucket inside one transaction. The read-modify-write happens in the
//! database, so concurrent mutations for the same user cannot lose updates.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use uuid::Uuid;

use crate::bookmark::{
    timestamp_repr, BookmarkRow, Collection, CollectionId, NewBookmark, ReadState,
    DEFAULT_COLLECTION_NAME,
};
use crate::query::BookmarkQuery;
use crate::sql_query::{count_sql, select_sql, BOOKMARK_COLUMNS};
use crate::stats::{AggregateStats, StatsDelta, UNASSIGNED_COLLECTION_KEY};
use crate::store::{BookmarkMutation, BookmarkStore, StoreError};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS bookmarks (
    id             TEXT PRIMARY KEY,
    user_id        TEXT NOT NULL,
    post_id        TEXT NOT NULL,
    edition_code   TEXT,
    collection_id  TEXT,
    title          TEXT NOT NULL DEFAULT '',
    slug           TEXT NOT NULL DEFAULT '',
    excerpt        TEXT,
    featured_image TEXT,
    category       TEXT,
    tags           TEXT,
    read_state     TEXT,
    note           TEXT,
    created_at     TEXT NOT NULL,
    UNIQUE (user_id, post_id)
);
CREATE INDEX IF NOT EXISTS idx_bookmarks_user_created
    ON bookmarks (user_id, created_at, id);

CREATE TABLE IF NOT EXISTS collections (
    id           TEXT PRIMARY KEY,
    user_id      TEXT NOT NULL,
    edition_code TEXT,
    name         TEXT NOT NULL,
    is_default   INTEGER NOT NULL DEFAULT 0,
    created_at   TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_collections_default
    ON collections (user_id, ifnull(edition_code, '')) WHERE is_default = 1;

CREATE TABLE IF NOT EXISTS bookmark_stats (
    user_id TEXT NOT NULL,
    kind    TEXT NOT NULL,
    key     TEXT NOT NULL,
    count   INTEGER NOT NULL,
    PRIMARY KEY (user_id, kind, key)
);
";

pub struct SqliteBookmarkStore {
    conn: Mutex<Connection>,
}

impl SqliteBookmarkStore {
    /// Open or create a store at the given database path.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Self::init(Connection::open(path)?)
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Storage(e.to_string())
    }
}

fn conv_err<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
}

/// Read one bookmark row from the shared `BOOKMARK_COLUMNS` projection.
fn read_bookmark(row: &rusqlite::Row) -> rusqlite::Result<BookmarkRow> {
    let id: String = row.get(0)?;
    let tags: Option<String> = row.get(10)?;
    let read_state: Option<String> = row.get(11)?;
    let created_at: String = row.get(13)?;
    Ok(BookmarkRow {
        id: Uuid::parse_str(&id).map_err(|e| conv_err(0, e))?,
        user_id: row.get(1)?,
        post_id: row.get(2)?,
        edition_code: row.get(3)?,
        collection_id: parse_opt_uuid(4, row.get(4)?)?,
        title: row.get(5)?,
        slug: row.get(6)?,
        excerpt: row.get(7)?,
        featured_image: row.get(8)?,
        category: row.get(9)?,
        tags: match tags {
            Some(json) => Some(serde_json::from_str(&json).map_err(|e| conv_err(10, e))?),
            None => None,
        },
        // Legacy rows may carry no state; they count as unread.
        read_state: read_state
            .as_deref()
            .and_then(ReadState::parse)
            .unwrap_or_default(),
        note: row.get(12)?,
        created_at: parse_timestamp(13, &created_at)?,
    })
}

fn parse_opt_uuid(idx: usize, value: Option<String>) -> rusqlite::Result<Option<Uuid>> {
    value
        .map(|s| Uuid::parse_str(&s).map_err(|e| conv_err(idx, e)))
        .transpose()
}

fn parse_timestamp(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conv_err(idx, e))
}

fn read_collection(row: &rusqlite::Row) -> rusqlite::Result<Collection> {
    let id: String = row.get(0)?;
    let created_at: String = row.get(5)?;
    Ok(Collection {
        id: Uuid::parse_str(&id).map_err(|e| conv_err(0, e))?,
        user_id: row.get(1)?,
        edition_code: row.get(2)?,
        name: row.get(3)?,
        is_default: row.get(4)?,
        created_at: parse_timestamp(5, &created_at)?,
    })
}

fn tags_json(tags: &Option<Vec<String>>) -> Result<Option<String>, StoreError> {
    tags.as_ref()
        .map(|t| serde_json::to_string(t).map_err(|e| StoreError::Storage(e.to_string())))
        .transpose()
}

fn image_json(image: &Option<serde_json::Value>) -> Result<Option<String>, StoreError> {
    image
        .as_ref()
        .map(|v| serde_json::to_string(v).map_err(|e| StoreError::Storage(e.to_string())))
        .transpose()
}

/// The SET-clause column and bound value for one typed mutation.
fn mutation_assignment(
    mutation: &BookmarkMutation,
) -> Result<(&'static str, rusqlite::types::Value), StoreError> {
    use rusqlite::types::Value;

    fn opt_text(value: Option<String>) -> Value {
        value.map(Value::Text).unwrap_or(Value::Null)
    }

    Ok(match mutation {
        BookmarkMutation::SetTitle(title) => ("title", Value::Text(title.clone())),
        BookmarkMutation::SetExcerpt(excerpt) => ("excerpt", opt_text(excerpt.clone())),
        BookmarkMutation::SetFeaturedImage(image) => {
            ("featured_image", opt_text(image_json(image)?))
        }
        BookmarkMutation::SetCategory(category) => ("category", opt_text(category.clone())),
        BookmarkMutation::SetTags(tags) => ("tags", opt_text(tags_json(tags)?)),
        BookmarkMutation::SetReadState(state) => {
            ("read_state", Value::Text(state.as_str().to_string()))
        }
        BookmarkMutation::SetNote(note) => ("note", opt_text(note.clone())),
        BookmarkMutation::SetCollection(id) => {
            ("collection_id", opt_text(id.map(|id| id.to_string())))
        }
    })
}

const COLLECTION_COLUMNS: &str = "id, user_id, edition_code, name, is_default, created_at";

impl BookmarkStore for SqliteBookmarkStore {
    fn insert_bookmark(
        &self,
        user_id: &str,
        bookmark: NewBookmark,
    ) -> Result<BookmarkRow, StoreError> {
        let row = BookmarkRow {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            post_id: bookmark.post_id,
            edition_code: bookmark.edition_code,
            collection_id: bookmark.collection_id,
            title: bookmark.title,
            slug: bookmark.slug,
            excerpt: bookmark.excerpt,
            featured_image: bookmark.featured_image,
            category: bookmark.category,
            tags: bookmark.tags,
            read_state: bookmark.read_state,
            note: bookmark.note,
            created_at: Utc::now(),
        };
        let conn = self.conn();
        let result = conn.execute(
            "INSERT INTO bookmarks (id, user_id, post_id, edition_code, collection_id, title, \
             slug, excerpt, featured_image, category, tags, read_state, note, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                row.id.to_string(),
                row.user_id,
                row.post_id,
                row.edition_code,
                row.collection_id.map(|id| id.to_string()),
                row.title,
                row.slug,
                row.excerpt,
                image_json(&row.featured_image)?,
                row.category,
                tags_json(&row.tags)?,
                row.read_state.as_str(),
                row.note,
                timestamp_repr(row.created_at),
            ],
        );
        match result {
            Ok(_) => Ok(row),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::AlreadyExists(row.post_id))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn get_bookmark(
        &self,
        user_id: &str,
        post_id: &str,
    ) -> Result<Option<BookmarkRow>, StoreError> {
        let conn = self.conn();
        let row = conn
            .query_row(
                &format!(
                    "SELECT {BOOKMARK_COLUMNS} FROM bookmarks \
                     WHERE user_id = ?1 AND post_id = ?2"
                ),
                params![user_id, post_id],
                read_bookmark,
            )
            .optional()?;
        Ok(row)
    }

    fn update_bookmark(
        &self,
        user_id: &str,
        post_id: &str,
        mutations: Vec<BookmarkMutation>,
    ) -> Result<BookmarkRow, StoreError> {
        if mutations.is_empty() {
            return Err(StoreError::Validation("no mutations provided".into()));
        }
        let mut sets = Vec::with_capacity(mutations.len());
        let mut values: Vec<rusqlite::types::Value> = Vec::with_capacity(mutations.len() + 2);
        for mutation in &mutations {
            let (column, value) = mutation_assignment(mutation)?;
            sets.push(format!("{column} = ?"));
            values.push(value);
        }
        values.push(rusqlite::types::Value::Text(user_id.to_string()));
        values.push(rusqlite::types::Value::Text(post_id.to_string()));
        let sql = format!(
            "UPDATE bookmarks SET {} WHERE user_id = ? AND post_id = ?",
            sets.join(", ")
        );

        let conn = self.conn();
        let changed = conn.execute(&sql, params_from_iter(values))?;
        if changed == 0 {
            return Err(StoreError::NotFound(post_id.to_string()));
        }
        let row = conn
            .query_row(
                &format!(
                    "SELECT {BOOKMARK_COLUMNS} FROM bookmarks \
                     WHERE user_id = ?1 AND post_id = ?2"
                ),
                params![user_id, post_id],
                read_bookmark,
            )
            .optional()?;
        row.ok_or_else(|| StoreError::NotFound(post_id.to_string()))
    }

    fn delete_bookmarks(
        &self,
        user_id: &str,
        post_ids: &[String],
    ) -> Result<Vec<BookmarkRow>, StoreError> {
        if post_ids.is_empty() {
            return Ok(Vec::new());
        }
        // Single delete keeps the common case on the simple equality plan;
        // bulk removal switches to an IN list.
        let sql = if post_ids.len() == 1 {
            format!(
                "DELETE FROM bookmarks WHERE user_id = ? AND post_id = ? \
                 RETURNING {BOOKMARK_COLUMNS}"
            )
        } else {
            let placeholders = vec!["?"; post_ids.len()].join(", ");
            format!(
                "DELETE FROM bookmarks WHERE user_id = ? AND post_id IN ({placeholders}) \
                 RETURNING {BOOKMARK_COLUMNS}"
            )
        };
        let mut values: Vec<rusqlite::types::Value> = Vec::with_capacity(post_ids.len() + 1);
        values.push(rusqlite::types::Value::Text(user_id.to_string()));
        values.extend(
            post_ids
                .iter()
                .map(|id| rusqlite::types::Value::Text(id.clone())),
        );

        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values), read_bookmark)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn query(&self, query: &BookmarkQuery) -> Result<Vec<BookmarkRow>, StoreError> {
        let (sql, sql_params) = select_sql(query);
        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(sql_params), read_bookmark)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn count(&self, query: &BookmarkQuery) -> Result<usize, StoreError> {
        let (sql, sql_params) = count_sql(query);
        let conn = self.conn();
        let count: i64 = conn.query_row(&sql, params_from_iter(sql_params), |row| row.get(0))?;
        Ok(count as usize)
    }

    fn fetch_stats(&self, user_id: &str) -> Result<AggregateStats, StoreError> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT kind, key, count FROM bookmark_stats WHERE user_id = ?1")?;
        let buckets = stmt
            .query_map(params![user_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut stats = AggregateStats::default();
        for (kind, key, count) in buckets {
            if count <= 0 {
                continue;
            }
            let count = count as u64;
            match kind.as_str() {
                "total" => stats.total = count,
                "unread" => stats.unread = count,
                "category" => {
                    stats.categories.insert(key, count);
                }
                "read_state" => {
                    if let Some(state) = ReadState::parse(&key) {
                        stats.read_states.insert(state, count);
                    }
                }
                "collection" => {
                    stats.collections.insert(key, count);
                }
                _ => {}
            }
        }
        Ok(stats)
    }

    fn recompute_stats(&self, user_id: &str) -> Result<AggregateStats, StoreError> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let total: i64 = tx.query_row(
            "SELECT COUNT(*) FROM bookmarks WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        let unread: i64 = tx.query_row(
            "SELECT COUNT(*) FROM bookmarks \
             WHERE user_id = ?1 AND (read_state = 'unread' OR read_state IS NULL)",
            params![user_id],
            |row| row.get(0),
        )?;

        let mut stats = AggregateStats {
            total: total as u64,
            unread: unread as u64,
            ..Default::default()
        };

        {
            let mut stmt = tx.prepare(
                "SELECT category, COUNT(*) FROM bookmarks \
                 WHERE user_id = ?1 AND category IS NOT NULL GROUP BY category",
            )?;
            let rows = stmt.query_map(params![user_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            for row in rows {
                let (category, count) = row?;
                stats.categories.insert(category, count as u64);
            }

            let mut stmt = tx.prepare(
                "SELECT COALESCE(read_state, 'unread'), COUNT(*) FROM bookmarks \
                 WHERE user_id = ?1 GROUP BY COALESCE(read_state, 'unread')",
            )?;
            let rows = stmt.query_map(params![user_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            for row in rows {
                let (state, count) = row?;
                let state = ReadState::parse(&state).unwrap_or_default();
                *stats.read_states.entry(state).or_insert(0) += count as u64;
            }

            let mut stmt = tx.prepare(
                "SELECT COALESCE(collection_id, ?2), COUNT(*) FROM bookmarks \
                 WHERE user_id = ?1 GROUP BY COALESCE(collection_id, ?2)",
            )?;
            let rows = stmt.query_map(params![user_id, UNASSIGNED_COLLECTION_KEY], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            for row in rows {
                let (key, count) = row?;
                stats.collections.insert(key, count as u64);
            }
        }

        // Rewrite the persisted counters from the recomputed truth.
        tx.execute(
            "DELETE FROM bookmark_stats WHERE user_id = ?1",
            params![user_id],
        )?;
        let mut buckets: Vec<(&str, String, i64)> = vec![
            ("total", String::new(), stats.total as i64),
            ("unread", String::new(), stats.unread as i64),
        ];
        buckets.extend(
            stats
                .categories
                .iter()
                .map(|(k, v)| ("category", k.clone(), *v as i64)),
        );
        buckets.extend(
            stats
                .read_states
                .iter()
                .map(|(k, v)| ("read_state", k.as_str().to_string(), *v as i64)),
        );
        buckets.extend(
            stats
                .collections
                .iter()
                .map(|(k, v)| ("collection", k.clone(), *v as i64)),
        );
        for (kind, key, count) in buckets {
            if count != 0 {
                tx.execute(
                    "INSERT INTO bookmark_stats (user_id, kind, key, count) \
                     VALUES (?1, ?2, ?3, ?4)",
                    params![user_id, kind, key, count],
                )?;
            }
        }

        tx.commit()?;
        Ok(stats)
    }

    fn apply_stats_delta(&self, user_id: &str, delta: &StatsDelta) -> Result<(), StoreError> {
        if delta.is_zero() {
            return Ok(());
        }
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let mut buckets: Vec<(&str, String, i64)> = Vec::new();
        if delta.total != 0 {
            buckets.push(("total", String::new(), delta.total));
        }
        if delta.unread != 0 {
            buckets.push(("unread", String::new(), delta.unread));
        }
        collect_map_buckets(&mut buckets, "category", &delta.categories);
        buckets.extend(
            delta
                .read_states
                .iter()
                .filter(|(_, v)| **v != 0)
                .map(|(k, v)| ("read_state", k.as_str().to_string(), *v)),
        );
        collect_map_buckets(&mut buckets, "collection", &delta.collections);

        for (kind, key, count) in buckets {
            tx.execute(
                "INSERT INTO bookmark_stats (user_id, kind, key, count) \
                 VALUES (?1, ?2, ?3, ?4) \
                 ON CONFLICT (user_id, kind, key) \
                 DO UPDATE SET count = count + excluded.count",
                params![user_id, kind, key, count],
            )?;
        }
        // Emptied buckets disappear; absent keys mean zero.
        tx.execute(
            "DELETE FROM bookmark_stats WHERE user_id = ?1 AND count <= 0",
            params![user_id],
        )?;

        tx.commit()?;
        Ok(())
    }

    fn get_collection(
        &self,
        user_id: &str,
        id: CollectionId,
    ) -> Result<Option<Collection>, StoreError> {
        let conn = self.conn();
        let row = conn
            .query_row(
                &format!(
                    "SELECT {COLLECTION_COLUMNS} FROM collections \
                     WHERE user_id = ?1 AND id = ?2"
                ),
                params![user_id, id.to_string()],
                read_collection,
            )
            .optional()?;
        Ok(row)
    }

    fn list_collections(&self, user_id: &str) -> Result<Vec<Collection>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLLECTION_COLUMNS} FROM collections \
             WHERE user_id = ?1 ORDER BY created_at ASC, id ASC"
        ))?;
        let rows = stmt
            .query_map(params![user_id], read_collection)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn create_collection(
        &self,
        user_id: &str,
        name: &str,
        edition_code: Option<&str>,
    ) -> Result<Collection, StoreError> {
        let collection = Collection {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            edition_code: edition_code.map(String::from),
            name: name.to_string(),
            is_default: false,
            created_at: Utc::now(),
        };
        let conn = self.conn();
        conn.execute(
            "INSERT INTO collections (id, user_id, edition_code, name, is_default, created_at) \
             VALUES (?1, ?2, ?3, ?4, 0, ?5)",
            params![
                collection.id.to_string(),
                collection.user_id,
                collection.edition_code,
                collection.name,
                timestamp_repr(collection.created_at),
            ],
        )?;
        Ok(collection)
    }

    fn find_or_create_default_collection(
        &self,
        user_id: &str,
        edition_code: Option<&str>,
    ) -> Result<Collection, StoreError> {
        let conn = self.conn();
        // The partial unique index on (user, edition) WHERE is_default makes
        // the insert a no-op when the default already exists, so concurrent
        // first-bookmark calls converge on one row.
        conn.execute(
            "INSERT OR IGNORE INTO collections \
             (id, user_id, edition_code, name, is_default, created_at) \
             VALUES (?1, ?2, ?3, ?4, 1, ?5)",
            params![
                Uuid::new_v4().to_string(),
                user_id,
                edition_code,
                DEFAULT_COLLECTION_NAME,
                timestamp_repr(Utc::now()),
            ],
        )?;
        let row = conn
            .query_row(
                &format!(
                    "SELECT {COLLECTION_COLUMNS} FROM collections \
                     WHERE user_id = ?1 AND ifnull(edition_code, '') = ifnull(?2, '') \
                     AND is_default = 1"
                ),
                params![user_id, edition_code],
                read_collection,
            )
            .optional()?;
        row.ok_or_else(|| {
            StoreError::Storage("default collection missing after find-or-create".into())
        })
    }
}

fn collect_map_buckets<'a>(
    buckets: &mut Vec<(&'a str, String, i64)>,
    kind: &'a str,
    map: &BTreeMap<String, i64>,
) {
    buckets.extend(
        map.iter()
            .filter(|(_, v)| **v != 0)
            .map(|(k, v)| (kind, k.clone(), *v)),
    );
}

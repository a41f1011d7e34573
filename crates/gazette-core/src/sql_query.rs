//! Renders bookmark query ASTs to parameterized SQLite SQL.
//!
//! Every comparison value is bound as a parameter; predicate text is built
//! only from the fixed column-name whitelist. Grouping parentheses are
//! emitted around every logical node so AND-of-ORs precedence survives
//! rendering exactly.

use rusqlite::types::Value as SqlValue;

use crate::query::{BookmarkQuery, Column, Predicate, Scalar};

/// Column list shared by SELECT and RETURNING clauses.
pub(crate) const BOOKMARK_COLUMNS: &str = "id, user_id, post_id, edition_code, collection_id, \
     title, slug, excerpt, featured_image, category, tags, read_state, note, created_at";

/// Full row-fetch statement: WHERE, ORDER BY with id tie-break, LIMIT.
pub fn select_sql(query: &BookmarkQuery) -> (String, Vec<SqlValue>) {
    let (where_sql, mut params) = where_clause(query);
    let dir = query.sort_order.as_sql();
    let sql = format!(
        "SELECT {BOOKMARK_COLUMNS} FROM bookmarks WHERE {where_sql} \
         ORDER BY {sort} {dir}, id {dir} LIMIT ?",
        sort = query.sort_by.column().as_str(),
    );
    params.push(SqlValue::Integer(query.limit as i64));
    (sql, params)
}

/// Matching-row count over the same WHERE clause.
pub fn count_sql(query: &BookmarkQuery) -> (String, Vec<SqlValue>) {
    let (where_sql, params) = where_clause(query);
    (
        format!("SELECT COUNT(*) FROM bookmarks WHERE {where_sql}"),
        params,
    )
}

fn where_clause(query: &BookmarkQuery) -> (String, Vec<SqlValue>) {
    let mut sql = String::from("user_id = ?");
    let mut params = vec![SqlValue::Text(query.user_id.clone())];
    for predicate in &query.predicates {
        sql.push_str(" AND ");
        render(predicate, &mut sql, &mut params);
    }
    (sql, params)
}

fn render(predicate: &Predicate, sql: &mut String, params: &mut Vec<SqlValue>) {
    match predicate {
        Predicate::Eq(col, value) => {
            sql.push_str(col.as_str());
            sql.push_str(" = ?");
            params.push(scalar_param(value));
        }
        Predicate::IsNull(col) => {
            sql.push_str(col.as_str());
            sql.push_str(" IS NULL");
        }
        Predicate::Like(col, needle) => {
            sql.push_str(col.as_str());
            sql.push_str(" LIKE ? ESCAPE '\\'");
            params.push(SqlValue::Text(format!("%{}%", escape_like(needle))));
        }
        Predicate::Gt(col, value) => {
            sql.push_str(col.as_str());
            sql.push_str(" > ?");
            params.push(scalar_param(value));
        }
        Predicate::Lt(col, value) => {
            sql.push_str(col.as_str());
            sql.push_str(" < ?");
            params.push(scalar_param(value));
        }
        Predicate::In(col, values) => {
            if values.is_empty() {
                // IN () is a syntax error; an empty set matches nothing.
                sql.push_str("1 = 0");
                return;
            }
            sql.push_str(col.as_str());
            sql.push_str(" IN (");
            for (i, value) in values.iter().enumerate() {
                if i > 0 {
                    sql.push_str(", ");
                }
                sql.push('?');
                params.push(scalar_param(value));
            }
            sql.push(')');
        }
        Predicate::And(parts) => render_group(parts, " AND ", "1 = 1", sql, params),
        Predicate::Or(parts) => render_group(parts, " OR ", "1 = 0", sql, params),
    }
}

fn render_group(
    parts: &[Predicate],
    joiner: &str,
    empty: &str,
    sql: &mut String,
    params: &mut Vec<SqlValue>,
) {
    if parts.is_empty() {
        sql.push_str(empty);
        return;
    }
    sql.push('(');
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            sql.push_str(joiner);
        }
        render(part, sql, params);
    }
    sql.push(')');
}

fn scalar_param(value: &Scalar) -> SqlValue {
    match value {
        Scalar::Null => SqlValue::Null,
        Scalar::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Scalar::Int(i) => SqlValue::Integer(*i),
        Scalar::Text(s) => SqlValue::Text(s.clone()),
    }
}

/// Escape LIKE wildcards in user input; the statement declares `ESCAPE '\'`.
fn escape_like(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len());
    for c in needle.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

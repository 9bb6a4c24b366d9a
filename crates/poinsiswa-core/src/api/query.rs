//! PostgREST query-string helpers.
//!
//! Filters are `(column, "op.value")` pairs passed straight to
//! `RequestBuilder::query`, which takes care of URL encoding.

use chrono::{DateTime, SecondsFormat, Utc};

pub type QueryParam = (String, String);

pub fn select(columns: &str) -> QueryParam {
    ("select".to_string(), columns.to_string())
}

pub fn eq(column: &str, value: impl AsRef<str>) -> QueryParam {
    (column.to_string(), format!("eq.{}", value.as_ref()))
}

pub fn gte_time(column: &str, at: DateTime<Utc>) -> QueryParam {
    (
        column.to_string(),
        format!("gte.{}", at.to_rfc3339_opts(SecondsFormat::Micros, true)),
    )
}

pub fn order_desc(column: &str) -> QueryParam {
    ("order".to_string(), format!("{}.desc", column))
}

pub fn limit(n: usize) -> QueryParam {
    ("limit".to_string(), n.to_string())
}

/// Total row count from a `Content-Range` header such as `0-24/3573` or `*/0`.
pub fn parse_content_range(header: &str) -> Option<u64> {
    let (_, total) = header.trim().rsplit_once('/')?;
    total.parse().ok()
}

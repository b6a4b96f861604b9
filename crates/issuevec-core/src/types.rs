//! Row types flowing from the source query, through embedding, into the sink.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

pub type EmbeddingVector = Vec<f32>;

/// Latest-state view of one GitHub issue as produced by the source query.
///
/// - `id`: issue number (`number` column)
/// - `labels`: distinct labels, order irrelevant
/// - `text`: title plus all comment bodies, concatenated by the query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRow {
    #[serde(rename = "number")]
    pub id: u32,
    #[serde(alias = "title_text")]
    pub title: String,
    pub state: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(with = "clickhouse_datetime")]
    pub created_at: NaiveDateTime,
    #[serde(with = "clickhouse_datetime")]
    pub updated_at: NaiveDateTime,
    pub text: String,
}

/// A `SourceRow` re-zipped with its embedding. Field order follows the
/// target table's insert column list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputRow {
    #[serde(rename = "number")]
    pub id: u32,
    pub state: String,
    pub labels: Vec<String>,
    #[serde(with = "clickhouse_datetime")]
    pub created_at: NaiveDateTime,
    #[serde(with = "clickhouse_datetime")]
    pub updated_at: NaiveDateTime,
    pub composite_vec: EmbeddingVector,
    pub title: String,
}

impl OutputRow {
    /// Consumes the source row; the concatenated `text` is not persisted.
    pub fn from_source(row: SourceRow, composite_vec: EmbeddingVector) -> Self {
        Self {
            id: row.id,
            state: row.state,
            labels: row.labels,
            created_at: row.created_at,
            updated_at: row.updated_at,
            composite_vec,
            title: row.title,
        }
    }
}

/// Columns written by the sink, in insert order.
pub const INSERT_COLUMNS: [&str; 7] = [
    "number",
    "state",
    "labels",
    "created_at",
    "updated_at",
    "composite_vec",
    "title",
];

/// ClickHouse renders `DateTime` as `YYYY-MM-DD hh:mm:ss` in JSON formats.
pub mod clickhouse_datetime {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&value.format(FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, FORMAT).map_err(serde::de::Error::custom)
    }
}

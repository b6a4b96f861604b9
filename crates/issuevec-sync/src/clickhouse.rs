//! ClickHouse over its HTTP interface: the issue source query and the
//! vector table insert, both as `JSONEachRow`.

use reqwest::blocking::{Client, RequestBuilder};
use std::time::Duration;
use tracing::{debug, info};

use issuevec_core::config::ClickHouseConfig;
use issuevec_core::profile::ConnectionProfile;
use issuevec_core::traits::RowSink;
use issuevec_core::types::{OutputRow, SourceRow, INSERT_COLUMNS};
use issuevec_core::{Error, Result};

/// Latest state of every issue in `repo`, one row per issue number.
///
/// Events are deduplicated per (issue, comment) keeping the newest, then
/// grouped per issue; `text` is the title twice followed by all bodies.
pub fn source_query(table: &str, repo: &str) -> String {
    format!(
        "SELECT number,
       any(title) AS title_text,
       min(created_at) AS created_at,
       max(updated_at) AS updated_at,
       max(state) AS state,
       arrayDistinct(arrayFlatten(groupArray(labels))) AS labels,
       any(title) || ' ' || any(title) || '\\n' || arrayStringConcat(groupArray(body), ' ') AS text
FROM (
    SELECT number, created_at, updated_at, state, labels, title, body
    FROM {table}
    WHERE repo_name = '{repo}'
    ORDER BY updated_at DESC
    LIMIT 1 BY (number, comment_id)
)
GROUP BY number
FORMAT JSONEachRow",
        table = table,
        repo = repo.replace('\\', "\\\\").replace('\'', "\\'"),
    )
}

pub fn insert_statement(table: &str) -> String {
    format!("INSERT INTO {table} ({}) FORMAT JSONEachRow", INSERT_COLUMNS.join(","))
}

/// One JSON object per line, keys in insert column order.
pub fn encode_rows(rows: &[OutputRow]) -> Result<String> {
    let mut body = String::new();
    for row in rows {
        let line = serde_json::to_string(row).map_err(|e| Error::Store(format!("cannot encode row {}: {e}", row.id)))?;
        body.push_str(&line);
        body.push('\n');
    }
    Ok(body)
}

pub fn decode_rows(body: &str) -> Result<Vec<SourceRow>> {
    body.lines()
        .filter(|l| !l.trim().is_empty())
        .enumerate()
        .map(|(i, line)| {
            serde_json::from_str(line).map_err(|e| Error::Store(format!("cannot decode source row {}: {e}", i + 1)))
        })
        .collect()
}

pub struct ClickHouseClient {
    client: Client,
    url: String,
    username: String,
    password: String,
    database: String,
    source_table: String,
    target_table: String,
}

impl ClickHouseClient {
    pub fn new(profile: &ConnectionProfile, config: &ClickHouseConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| Error::Configuration(format!("failed to build HTTP client: {e}")))?;
        let url = profile.base_url(config.http_port);
        info!(url = %url, database = %profile.database, user = %profile.username, "clickhouse client ready");
        Ok(Self {
            client,
            url,
            username: profile.username.clone(),
            password: profile.password.clone(),
            database: profile.database.clone(),
            source_table: config.source_table.clone(),
            target_table: config.target_table.clone(),
        })
    }

    fn post(&self) -> RequestBuilder {
        self.client
            .post(&self.url)
            .header("X-ClickHouse-User", &self.username)
            .header("X-ClickHouse-Key", &self.password)
            .query(&[("database", self.database.as_str())])
    }

    fn execute(&self, request: RequestBuilder, what: &str) -> Result<String> {
        let resp = request.send().map_err(|e| Error::Store(format!("{what} failed: {e}")))?;
        let status = resp.status();
        let text = resp.text().map_err(|e| Error::Store(format!("{what} failed reading response: {e}")))?;
        if !status.is_success() {
            return Err(Error::Store(format!("{what} failed ({status}): {}", text.trim())));
        }
        Ok(text)
    }

    /// Runs the source query for `repo` and returns every issue row.
    pub fn fetch_source_rows(&self, repo: &str) -> Result<Vec<SourceRow>> {
        let query = source_query(&self.source_table, repo);
        debug!(table = %self.source_table, repo, "running source query");
        let body = self.execute(self.post().body(query), "source query")?;
        let rows = decode_rows(&body)?;
        info!(rows = rows.len(), "fetched source rows");
        Ok(rows)
    }
}

impl RowSink for ClickHouseClient {
    fn insert(&self, rows: &[OutputRow]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let body = encode_rows(rows)?;
        let request = self.post().query(&[("query", insert_statement(&self.target_table))]).body(body);
        self.execute(request, "insert")?;
        debug!(rows = rows.len(), table = %self.target_table, "inserted rows");
        Ok(())
    }
}

//! ClickHouse HTTP interface client.
//!
//! Spots stream in as `JSONEachRow` lines, one insert per spool entry, so
//! a batch is acknowledged or rejected as a unit. The watermark seed query
//! asks for `max(seq)` as tab-separated text.

use std::time::Duration;

use tracing::{debug, info};

use super::{SinkError, SpotSink};
use crate::spot::Spot;

/// Connection parameters for the ClickHouse HTTP interface.
#[derive(Debug, Clone)]
pub struct ClickHouseConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub table: String,
    /// Username for the X-ClickHouse-User header; empty uses the server's
    /// default user with no header sent.
    pub user: String,
    pub password: String,
    pub request_timeout_secs: u64,
}

impl From<&crate::config::ClickHouseSettings> for ClickHouseConfig {
    fn from(settings: &crate::config::ClickHouseSettings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
            database: settings.database.clone(),
            table: settings.table.clone(),
            user: settings.user.clone(),
            password: settings.password.clone(),
            request_timeout_secs: settings.request_timeout_secs,
        }
    }
}

/// Spot sink backed by ClickHouse over HTTP.
pub struct ClickHouseSink {
    client: reqwest::Client,
    url: String,
    config: ClickHouseConfig,
}

impl ClickHouseSink {
    pub fn new(config: ClickHouseConfig) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| SinkError::Http(format!("Failed to create HTTP client: {}", e)))?;
        let url = format!("http://{}:{}/", config.host, config.port);

        Ok(Self {
            client,
            url,
            config,
        })
    }

    fn insert_query(&self) -> String {
        format!(
            "INSERT INTO {}.{} FORMAT JSONEachRow",
            self.config.database, self.config.table
        )
    }

    fn max_sequence_query(&self) -> String {
        format!(
            "SELECT max(seq) FROM {}.{} FORMAT TabSeparated",
            self.config.database, self.config.table
        )
    }

    async fn execute(&self, query: &str, body: String) -> Result<String, SinkError> {
        debug!(query, bytes = body.len(), "ClickHouse request");

        let mut request = self
            .client
            .post(&self.url)
            .query(&[("query", query)])
            .body(body);
        if !self.config.user.is_empty() {
            request = request
                .header("X-ClickHouse-User", &self.config.user)
                .header("X-ClickHouse-Key", &self.config.password);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SinkError::Http(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| SinkError::Http(e.to_string()))?;

        if !status.is_success() {
            let excerpt: String = text.chars().take(300).collect();
            return Err(SinkError::Rejected(format!("HTTP {}: {}", status, excerpt)));
        }
        Ok(text)
    }
}

impl SpotSink for ClickHouseSink {
    async fn insert(&self, spots: &[Spot]) -> Result<(), SinkError> {
        if spots.is_empty() {
            return Ok(());
        }

        let body = rows_body(spots)?;
        self.execute(&self.insert_query(), body).await?;
        info!(
            count = spots.len(),
            table = %format_args!("{}.{}", self.config.database, self.config.table),
            "Inserted spots"
        );
        Ok(())
    }

    async fn max_sequence(&self) -> Result<u64, SinkError> {
        let text = self.execute(&self.max_sequence_query(), String::new()).await?;
        parse_max_sequence(&text)
    }
}

/// Serialize spots as JSONEachRow lines.
fn rows_body(spots: &[Spot]) -> Result<String, SinkError> {
    let mut body = String::new();
    for spot in spots {
        let line = serde_json::to_string(spot).map_err(|e| SinkError::Rejected(e.to_string()))?;
        body.push_str(&line);
        body.push('\n');
    }
    Ok(body)
}

/// Interpret the `max(seq)` response. An empty table reports 0, and a
/// Nullable column prints `\N`.
fn parse_max_sequence(text: &str) -> Result<u64, SinkError> {
    let value = text.trim();
    if value.is_empty() || value == "\\N" {
        return Ok(0);
    }
    value
        .parse()
        .map_err(|_| SinkError::Rejected(format!("unexpected max(seq) response: {value:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wsprnet::RawSpot;

    fn sample_spots() -> Vec<Spot> {
        let raw = RawSpot {
            spotnum: "42".to_string(),
            date: "1700000400".to_string(),
            reporter: "W1ABC".to_string(),
            reporter_grid: "FN42".to_string(),
            grid: "JO65".to_string(),
            mhz: "14.097".to_string(),
            ..Default::default()
        };
        vec![Spot::from_raw(&raw).unwrap().0]
    }

    fn test_sink() -> ClickHouseSink {
        // Port 1 is never listening; tests must not reach the network
        ClickHouseSink::new(ClickHouseConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            database: "wsprnet".to_string(),
            table: "spots".to_string(),
            user: String::new(),
            password: String::new(),
            request_timeout_secs: 1,
        })
        .unwrap()
    }

    #[test]
    fn test_queries_name_the_configured_table() {
        let sink = test_sink();
        assert_eq!(
            sink.insert_query(),
            "INSERT INTO wsprnet.spots FORMAT JSONEachRow"
        );
        assert_eq!(
            sink.max_sequence_query(),
            "SELECT max(seq) FROM wsprnet.spots FORMAT TabSeparated"
        );
    }

    #[test]
    fn test_rows_body_is_one_json_object_per_line() {
        let body = rows_body(&sample_spots()).unwrap();
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 1);

        let row: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(row["seq"], 42);
        assert_eq!(row["reporter"], "W1ABC");
        assert!(body.ends_with('\n'));
    }

    #[test]
    fn test_parse_max_sequence_values() {
        assert_eq!(parse_max_sequence("12345\n").unwrap(), 12345);
        assert_eq!(parse_max_sequence("0\n").unwrap(), 0);
        assert_eq!(parse_max_sequence("").unwrap(), 0);
        assert_eq!(parse_max_sequence("\\N\n").unwrap(), 0);
        assert!(parse_max_sequence("DB::Exception").is_err());
    }

    #[tokio::test]
    async fn test_empty_insert_skips_the_network() {
        let sink = test_sink();
        sink.insert(&[]).await.unwrap();
    }
}

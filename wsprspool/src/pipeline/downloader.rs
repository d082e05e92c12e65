//! Download tick: fetch, verify, spool, advance the watermark.
//!
//! The watermark, the highest sequence number ever handed to the spool,
//! lives here and only here. It advances when a batch is durably enqueued,
//! never on insert, so a sink outage cannot stall downloads. Gaps are
//! logged and skipped over; upstream will not return pruned records, and
//! waiting for them would wedge the cursor forever.

use std::collections::BTreeMap;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::gap;
use crate::session::{SessionError, SessionStore};
use crate::spool::{RawBatch, Spool, SpoolError};
use crate::wsprnet::{AsyncHttpClient, FetchOutcome, RawSpot, WsprnetClient, WsprnetError};

/// Failures that abandon a single download tick.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("session: {0}")]
    Session(#[from] SessionError),

    #[error("upstream: {0}")]
    Wsprnet(#[from] WsprnetError),

    #[error("spool: {0}")]
    Spool(#[from] SpoolError),
}

/// Producer half of the pipeline.
pub struct Downloader<C> {
    client: WsprnetClient<C>,
    sessions: SessionStore,
    watermark: u64,
}

impl<C: AsyncHttpClient> Downloader<C> {
    pub fn new(client: WsprnetClient<C>, sessions: SessionStore, initial_watermark: u64) -> Self {
        Self {
            client,
            sessions,
            watermark: initial_watermark,
        }
    }

    /// Highest sequence number handed to the spool so far.
    pub fn watermark(&self) -> u64 {
        self.watermark
    }

    /// Run one download tick.
    ///
    /// Returns the number of spots spooled. An error covers only this tick;
    /// the caller simply retries on the next interval.
    pub async fn tick(&mut self, spool: &Spool) -> Result<usize, DownloadError> {
        let outcome = self.fetch_with_auth_retry().await?;
        let FetchOutcome { mut spots, repaired } = outcome;

        if spots.is_empty() {
            debug!(watermark = self.watermark, "No new spots");
            return Ok(0);
        }

        spots.sort_by_cached_key(|s| s.seq());
        let seqs: Vec<u64> = spots.iter().map(|s| s.seq()).collect();
        let first = seqs[0];
        let last = seqs[seqs.len() - 1];

        info!(
            count = spots.len(),
            first,
            last,
            watermark = self.watermark,
            repaired,
            "Batch received"
        );
        self.verify_first(first);

        for g in gap::detect_gaps(self.watermark, &seqs) {
            warn!(
                first_missing = g.first_missing,
                last_missing = g.last_missing,
                missing = g.missing_count(),
                "Sequence gap detected"
            );
        }
        summarize_by_time(&spots);

        let batch = RawBatch::new(Utc::now(), spots);
        let entry = spool.enqueue(&batch).await?;
        info!(entry = entry.name(), count = batch.count, "Batch spooled");

        self.watermark = self.watermark.max(last);
        Ok(batch.count)
    }

    /// Fetch once; on a session rejection, log in again and retry once.
    async fn fetch_with_auth_retry(&mut self) -> Result<FetchOutcome, DownloadError> {
        let token = self.sessions.get_token(self.client.http()).await?;
        match self.client.fetch_since(&token, self.watermark).await {
            Err(WsprnetError::AuthRejected) => {
                warn!("Session rejected by upstream, logging in again");
                self.sessions.invalidate().await?;
                let token = self.sessions.get_token(self.client.http()).await?;
                Ok(self.client.fetch_since(&token, self.watermark).await?)
            }
            other => Ok(other?),
        }
    }

    /// Check the first sequence of a batch against the watermark.
    ///
    /// A batch starting above `watermark + 1` shows up as a leading gap, so
    /// only the remaining cases are reported here.
    fn verify_first(&self, first: u64) {
        if self.watermark == 0 {
            info!(first, "First download, no watermark to check against");
        } else if first == self.watermark + 1 {
            debug!(first, "Batch starts exactly after the watermark");
        } else if first <= self.watermark {
            error!(
                first,
                watermark = self.watermark,
                "Batch starts at or below the watermark, upstream resent old records"
            );
        }
    }
}

/// Log how the batch distributes over event times. A healthy batch covers
/// one or two transmit cycles; a wide span means a backlog is being drained.
fn summarize_by_time(spots: &[RawSpot]) {
    let mut counts: BTreeMap<u64, usize> = BTreeMap::new();
    for spot in spots {
        *counts.entry(spot.date_epoch()).or_default() += 1;
    }
    for (epoch, count) in &counts {
        debug!(epoch, count, "Spots at event time");
    }
    if counts.len() > 1 {
        if let (Some(first), Some(last)) = (counts.keys().next(), counts.keys().next_back()) {
            debug!(
                distinct_times = counts.len(),
                span_minutes = (last - first) / 60,
                "Batch spans multiple event times"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Credentials, SessionToken};
    use crate::wsprnet::{MockHttpClient, WsprnetConfig};
    use serde_json::json;

    fn spot_body(seqs: &[u64]) -> String {
        let values: Vec<_> = seqs
            .iter()
            .map(|seq| {
                json!({
                    "Spotnum": seq.to_string(),
                    "Date": "1700000400",
                    "Reporter": "W1ABC",
                    "ReporterGrid": "FN42",
                    "CallSign": "SM7XYZ",
                    "Grid": "JO65",
                    "MHz": "14.097",
                    "dB": "-21",
                    "Band": "14",
                    "code": "1",
                })
            })
            .collect();
        serde_json::to_string(&values).unwrap()
    }

    fn write_session_file(dir: &tempfile::TempDir) -> std::path::PathBuf {
        let file = dir.path().join("session.json");
        let token = SessionToken {
            sessid: "cached0".to_string(),
            session_name: "SESS42".to_string(),
            username: "w1abc".to_string(),
            login_time: 1_700_000_000,
        };
        std::fs::write(&file, serde_json::to_vec(&token).unwrap()).unwrap();
        file
    }

    fn downloader_with(
        dir: &tempfile::TempDir,
        http: MockHttpClient,
        watermark: u64,
    ) -> Downloader<MockHttpClient> {
        let sessions = SessionStore::new(
            write_session_file(dir),
            "http://example.test/login".to_string(),
            Some(Credentials {
                username: "w1abc".to_string(),
                password: "secret".to_string(),
            }),
        );
        let client = WsprnetClient::new(
            http,
            WsprnetConfig {
                spots_url: "http://example.test/spots/json".to_string(),
                band: "All".to_string(),
                exclude_special: 0,
            },
        );
        Downloader::new(client, sessions, watermark)
    }

    async fn open_spool(dir: &tempfile::TempDir) -> Spool {
        Spool::open(dir.path().join("spool")).await.unwrap()
    }

    #[tokio::test]
    async fn test_empty_fetch_is_a_no_op() {
        let dir = tempfile::TempDir::new().unwrap();
        let http = MockHttpClient::new();
        http.push_body("[]");

        let mut downloader = downloader_with(&dir, http, 500);
        let spool = open_spool(&dir).await;

        assert_eq!(downloader.tick(&spool).await.unwrap(), 0);
        assert_eq!(downloader.watermark(), 500);
        assert!(spool.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_batch_is_sorted_spooled_and_watermark_advances() {
        let dir = tempfile::TempDir::new().unwrap();
        let http = MockHttpClient::new();
        // Out of order on purpose
        http.push_body(&spot_body(&[10, 9]));

        let mut downloader = downloader_with(&dir, http, 8);
        let spool = open_spool(&dir).await;

        assert_eq!(downloader.tick(&spool).await.unwrap(), 2);
        assert_eq!(downloader.watermark(), 10);

        let entry = spool.oldest().await.unwrap().unwrap();
        let batch = spool.read(&entry).await.unwrap();
        assert_eq!(batch.first_seq, 9);
        assert_eq!(batch.last_seq, 10);
        assert_eq!(batch.spots[0].seq(), 9);
        assert_eq!(batch.spots[1].seq(), 10);
    }

    #[tokio::test]
    async fn test_gap_batch_still_advances_watermark() {
        let dir = tempfile::TempDir::new().unwrap();
        let http = MockHttpClient::new();
        http.push_body(&spot_body(&[103, 104, 105]));

        let mut downloader = downloader_with(&dir, http, 100);
        let spool = open_spool(&dir).await;

        assert_eq!(downloader.tick(&spool).await.unwrap(), 3);
        assert_eq!(downloader.watermark(), 105);
        assert_eq!(spool.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_auth_rejection_triggers_relogin_and_retry() {
        let dir = tempfile::TempDir::new().unwrap();
        let http = MockHttpClient::new();
        http.push_body("<html>You are not authorized to access this page.</html>");
        http.push_body(r#"{"sessid": "fresh1", "session_name": "SESS42"}"#);
        http.push_body(&spot_body(&[201]));

        let mut downloader = downloader_with(&dir, http, 200);
        let spool = open_spool(&dir).await;

        assert_eq!(downloader.tick(&spool).await.unwrap(), 1);
        assert_eq!(downloader.watermark(), 201);

        // Rejected fetch, login, retried fetch
        let requests = downloader.client.http().requests.lock().unwrap();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].headers[0].1, "SESS42=cached0");
        assert!(requests[1].url.ends_with("/login"));
        assert_eq!(requests[2].headers[0].1, "SESS42=fresh1");

        // The fresh session replaced the cached one
        let saved: SessionToken =
            serde_json::from_slice(&std::fs::read(dir.path().join("session.json")).unwrap())
                .unwrap();
        assert_eq!(saved.sessid, "fresh1");
    }

    #[tokio::test]
    async fn test_second_auth_rejection_propagates() {
        let dir = tempfile::TempDir::new().unwrap();
        let http = MockHttpClient::new();
        http.push_body("<html>You are not authorized to access this page.</html>");
        http.push_body(r#"{"sessid": "fresh1", "session_name": "SESS42"}"#);
        http.push_body("<html>You are not authorized to access this page.</html>");

        let mut downloader = downloader_with(&dir, http, 300);
        let spool = open_spool(&dir).await;

        assert!(matches!(
            downloader.tick(&spool).await,
            Err(DownloadError::Wsprnet(WsprnetError::AuthRejected))
        ));
        assert_eq!(downloader.watermark(), 300);
        assert!(spool.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_malformed_payload_fails_the_tick() {
        let dir = tempfile::TempDir::new().unwrap();
        let http = MockHttpClient::new();
        http.push_body("<html>Service temporarily unavailable, please try again.</html>");

        let mut downloader = downloader_with(&dir, http, 400);
        let spool = open_spool(&dir).await;

        assert!(matches!(
            downloader.tick(&spool).await,
            Err(DownloadError::Wsprnet(WsprnetError::Malformed(_)))
        ));
        assert_eq!(downloader.watermark(), 400);
        assert!(spool.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_truncated_payload_spools_recovered_prefix() {
        let dir = tempfile::TempDir::new().unwrap();
        let http = MockHttpClient::new();
        let body = format!("{}garbage tail", spot_body(&[501, 502]));
        http.push_body(&body);

        let mut downloader = downloader_with(&dir, http, 500);
        let spool = open_spool(&dir).await;

        assert_eq!(downloader.tick(&spool).await.unwrap(), 2);
        assert_eq!(downloader.watermark(), 502);
        assert_eq!(spool.len().await.unwrap(), 1);
    }
}

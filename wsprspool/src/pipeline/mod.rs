//! Pipeline supervision: two independent loops around one durable spool.
//!
//! ```text
//!  wsprnet.org ──► Downloader ──► spool directory ──► InsertWorker ──► ClickHouse
//!                  (producer)    one file per batch    (consumer)
//! ```
//!
//! The loops share nothing in memory; the spool's atomic-rename visibility
//! is the entire hand-off. The downloader's watermark is seeded from the
//! sink once at startup and then advances on its own successful fetches, so
//! a sink outage grows the spool on disk without stalling downloads.

pub mod downloader;
pub mod gap;
pub mod worker;

pub use downloader::{DownloadError, Downloader};
pub use worker::{BatchStats, DrainOutcome, InsertError, InsertWorker};

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::session::SessionStore;
use crate::sink::SpotSink;
use crate::spool::Spool;
use crate::wsprnet::{AsyncHttpClient, WsprnetClient};

/// Loop pacing. The two intervals are independent on purpose.
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    /// Delay between download ticks.
    pub poll_interval: Duration,
    /// Delay between polls of an empty spool.
    pub idle_interval: Duration,
}

impl From<&crate::config::ConfigFile> for PipelineConfig {
    fn from(config: &crate::config::ConfigFile) -> Self {
        Self {
            poll_interval: Duration::from_secs(config.wsprnet.poll_interval_secs),
            idle_interval: Duration::from_secs(config.pipeline.idle_interval_secs),
        }
    }
}

/// A failure that ends a one-shot run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("download failed: {0}")]
    Download(#[from] DownloadError),

    #[error("insert failed: {0}")]
    Insert(#[from] InsertError),
}

/// Ask the sink for the highest stored sequence number.
///
/// A failed query seeds zero. Re-downloading records the sink already holds
/// is safe because rows are keyed by sequence number; waiting for the sink
/// to come back would hold up ingestion for no gain.
pub async fn seed_watermark<S: SpotSink>(sink: &S) -> u64 {
    match sink.max_sequence().await {
        Ok(seq) => {
            info!(watermark = seq, "Watermark seeded from the sink");
            seq
        }
        Err(e) => {
            warn!(error = %e, "Sink watermark query failed, starting from zero");
            0
        }
    }
}

/// Owns both halves of the pipeline and the spool between them.
pub struct Pipeline<C, S> {
    downloader: Downloader<C>,
    worker: InsertWorker<S>,
    spool: Arc<Spool>,
    config: PipelineConfig,
}

impl<C, S> Pipeline<C, S>
where
    C: AsyncHttpClient + 'static,
    S: SpotSink + 'static,
{
    /// Wire up a pipeline, seeding the downloader's watermark from the sink.
    pub async fn new(
        client: WsprnetClient<C>,
        sessions: SessionStore,
        sink: S,
        spool: Spool,
        config: PipelineConfig,
    ) -> Self {
        let watermark = seed_watermark(&sink).await;
        Self {
            downloader: Downloader::new(client, sessions, watermark),
            worker: InsertWorker::new(sink),
            spool: Arc::new(spool),
            config,
        }
    }

    /// One download tick followed by a full drain of the spool.
    ///
    /// The drain stops at the first sink failure; undelivered entries stay
    /// on disk for the next invocation. A failed tick still drains whatever
    /// earlier runs left behind before its error is reported.
    pub async fn run_once(&mut self) -> Result<(), PipelineError> {
        let tick = self.downloader.tick(&self.spool).await;
        if let Err(e) = &tick {
            error!(error = %e, "Download tick failed");
        }

        while !matches!(
            self.worker.drain_one(&self.spool).await?,
            DrainOutcome::Empty
        ) {}

        tick?;
        Ok(())
    }

    /// Run both loops until `cancel` fires.
    ///
    /// Each loop finishes its current tick or entry before exiting; there is
    /// no mid-batch cancellation.
    pub async fn run(self, cancel: CancellationToken) {
        let Self {
            mut downloader,
            worker,
            spool,
            config,
        } = self;

        let download_spool = Arc::clone(&spool);
        let download_cancel = cancel.clone();
        let download_loop = tokio::spawn(async move {
            info!(
                interval_secs = config.poll_interval.as_secs(),
                "Downloader started"
            );
            loop {
                if let Err(e) = downloader.tick(&download_spool).await {
                    error!(error = %e, "Download tick failed");
                }
                tokio::select! {
                    _ = download_cancel.cancelled() => break,
                    _ = tokio::time::sleep(config.poll_interval) => {}
                }
            }
            info!(watermark = downloader.watermark(), "Downloader stopped");
        });

        let insert_loop = tokio::spawn(async move {
            info!(
                idle_secs = config.idle_interval.as_secs(),
                "Insert worker started"
            );
            loop {
                let idle = match worker.drain_one(&spool).await {
                    Ok(DrainOutcome::Empty) => true,
                    Ok(_) => false,
                    Err(e) => {
                        warn!(error = %e, "Insert pass failed, entry retained for retry");
                        true
                    }
                };
                if cancel.is_cancelled() {
                    break;
                }
                if idle {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(config.idle_interval) => {}
                    }
                }
            }
            info!("Insert worker stopped");
        });

        let _ = tokio::join!(download_loop, insert_loop);
        info!("Pipeline stopped");
    }
}

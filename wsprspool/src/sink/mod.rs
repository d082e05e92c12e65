//! Analytical sink contract.
//!
//! The pipeline only ever needs two things from its destination: write a
//! batch of enriched spots, and report the highest stored sequence number
//! so the download cursor can be re-derived at startup. One implementation
//! speaks to ClickHouse over its HTTP interface; tests substitute an
//! in-memory recorder.

mod clickhouse;

pub use clickhouse::{ClickHouseConfig, ClickHouseSink};

use std::future::Future;

use thiserror::Error;

use crate::spot::Spot;

/// Sink failures.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The sink could not be reached or did not answer in time.
    #[error("sink request failed: {0}")]
    Http(String),

    /// The sink answered with an error.
    #[error("sink rejected the request: {0}")]
    Rejected(String),
}

/// Destination for enriched spots.
pub trait SpotSink: Send + Sync {
    /// Write all spots as one atomic batch.
    ///
    /// An error means nothing may be assumed about what was stored; the
    /// caller retries the whole batch.
    fn insert(&self, spots: &[Spot]) -> impl Future<Output = Result<(), SinkError>> + Send;

    /// Highest stored sequence number, or 0 for an empty table.
    fn max_sequence(&self) -> impl Future<Output = Result<u64, SinkError>> + Send;
}

/// A shared handle to a sink is itself a sink.
impl<S: SpotSink> SpotSink for std::sync::Arc<S> {
    async fn insert(&self, spots: &[Spot]) -> Result<(), SinkError> {
        (**self).insert(spots).await
    }

    async fn max_sequence(&self) -> Result<u64, SinkError> {
        (**self).max_sequence().await
    }
}

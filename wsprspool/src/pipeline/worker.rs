//! Insert worker: drain the spool into the sink, oldest entry first.
//!
//! An entry is removed only after the sink confirms the whole batch, so a
//! crash between insert and removal re-delivers the batch on the next run.
//! The sink keys rows by sequence number, which makes that re-delivery
//! harmless. A sink failure leaves the entry in place; there is no retry
//! ceiling because the spool on disk is the backpressure.

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::sink::{SinkError, SpotSink};
use crate::spool::{RawBatch, Spool, SpoolError};
use crate::spot::Spot;
use crate::timing::Validation;

/// Per-batch enrichment tally, logged after every insert.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchStats {
    /// Records whose timestamp matched their mode's cadence.
    pub valid: usize,
    /// Records shifted forward to the next even minute.
    pub corrected: usize,
    /// Records kept with an off-cycle timestamp.
    pub ambiguous: usize,
    /// Records dropped because a field did not parse.
    pub skipped: usize,
}

impl BatchStats {
    /// How many records reached the sink.
    pub fn inserted(&self) -> usize {
        self.valid + self.corrected + self.ambiguous
    }
}

/// What one pass over the spool accomplished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// The spool was empty; nothing to do.
    Empty,
    /// The oldest entry was inserted and removed.
    Inserted(BatchStats),
    /// The oldest entry did not decode and was set aside.
    Quarantined,
}

/// Failures that end one drain pass. The entry involved stays in the spool.
#[derive(Debug, Error)]
pub enum InsertError {
    #[error("spool: {0}")]
    Spool(#[from] SpoolError),

    #[error("sink: {0}")]
    Sink(#[from] SinkError),
}

/// Consumer half of the pipeline.
pub struct InsertWorker<S> {
    sink: S,
}

impl<S: SpotSink> InsertWorker<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    /// Process the oldest spool entry, if any.
    ///
    /// The entry is removed only after the sink acknowledges the insert; on
    /// any error it stays put and the caller retries on its next pass.
    pub async fn drain_one(&self, spool: &Spool) -> Result<DrainOutcome, InsertError> {
        let Some(entry) = spool.oldest().await? else {
            return Ok(DrainOutcome::Empty);
        };

        let batch = match spool.read(&entry).await {
            Ok(batch) => batch,
            Err(SpoolError::Corrupt { name, source }) => {
                error!(entry = %name, error = %source, "Entry does not decode as a batch");
                spool.quarantine(&entry).await?;
                return Ok(DrainOutcome::Quarantined);
            }
            Err(e) => return Err(e.into()),
        };

        let (spots, stats) = enrich_batch(&batch);
        self.sink.insert(&spots).await?;
        spool.remove(&entry).await?;

        info!(
            entry = entry.name(),
            inserted = stats.inserted(),
            corrected = stats.corrected,
            ambiguous = stats.ambiguous,
            skipped = stats.skipped,
            "Batch inserted"
        );
        Ok(DrainOutcome::Inserted(stats))
    }
}

/// Enrich every record of a batch, skipping the ones that do not parse.
fn enrich_batch(batch: &RawBatch) -> (Vec<Spot>, BatchStats) {
    let mut spots = Vec::with_capacity(batch.spots.len());
    let mut stats = BatchStats::default();

    for raw in &batch.spots {
        match Spot::from_raw(raw) {
            Ok((spot, validation)) => {
                match validation {
                    Validation::Valid => stats.valid += 1,
                    Validation::Corrected { .. } => {
                        debug!(seq = spot.seq, time = spot.time, "Timestamp shifted to the next even minute");
                        stats.corrected += 1;
                    }
                    Validation::Ambiguous => {
                        warn!(
                            seq = spot.seq,
                            time = spot.time,
                            mode = spot.mode_code,
                            "Timestamp off-cycle for its mode, kept as reported"
                        );
                        stats.ambiguous += 1;
                    }
                }
                spots.push(spot);
            }
            Err(e) => {
                warn!(error = %e, "Skipping unparseable record");
                stats.skipped += 1;
            }
        }
    }

    (spots, stats)
}

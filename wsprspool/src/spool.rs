//! Durable on-disk batch queue between the downloader and the insert worker.
//!
//! Each downloaded batch is one JSON file. File names sort lexically in
//! arrival order, so the directory listing is the queue. Entries become
//! visible only through an atomic rename, which means a reader can never
//! observe a half-written batch; a consumer removes an entry only after its
//! records are safely in the sink. Anything on disk when the process starts
//! is simply pending work.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

use crate::wsprnet::RawSpot;

/// File suffix marking visible spool entries.
const ENTRY_SUFFIX: &str = ".batch.json";

/// One downloaded batch, exactly as fetched, plus arrival metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBatch {
    /// When the batch arrived, UTC.
    pub fetched_at: DateTime<Utc>,
    /// Lowest sequence number in the batch.
    pub first_seq: u64,
    /// Highest sequence number in the batch.
    pub last_seq: u64,
    /// Number of records.
    pub count: usize,
    /// The records as received upstream, sorted by sequence number.
    pub spots: Vec<RawSpot>,
}

impl RawBatch {
    /// Package spots fetched at `fetched_at`. The slice is expected to be
    /// sorted by sequence number already.
    pub fn new(fetched_at: DateTime<Utc>, spots: Vec<RawSpot>) -> Self {
        let first_seq = spots.first().map(|s| s.seq()).unwrap_or(0);
        let last_seq = spots.last().map(|s| s.seq()).unwrap_or(0);
        Self {
            fetched_at,
            first_seq,
            last_seq,
            count: spots.len(),
            spots,
        }
    }
}

/// Handle to one visible spool entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpoolEntry {
    path: PathBuf,
}

impl SpoolEntry {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Entry file name, for logs.
    pub fn name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }
}

/// Spool failures.
#[derive(Debug, Error)]
pub enum SpoolError {
    /// The spool directory could not be created.
    #[error("spool directory error: {0}")]
    Directory(std::io::Error),

    /// An entry could not be read, written, renamed, or removed.
    #[error("spool I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An entry's bytes do not decode as a batch.
    #[error("spool entry {name} is not decodable: {source}")]
    Corrupt {
        name: String,
        source: serde_json::Error,
    },

    /// A batch could not be encoded for writing.
    #[error("failed to encode batch: {0}")]
    Encode(serde_json::Error),
}

/// File-per-batch queue rooted at one directory.
pub struct Spool {
    directory: PathBuf,
    counter: AtomicU64,
}

impl Spool {
    /// Open a spool rooted at `directory`, creating the directory if needed.
    ///
    /// Entries left behind by a previous process are visible immediately.
    pub async fn open(directory: PathBuf) -> Result<Self, SpoolError> {
        tokio::fs::create_dir_all(&directory)
            .await
            .map_err(SpoolError::Directory)?;
        Ok(Self {
            directory,
            counter: AtomicU64::new(0),
        })
    }

    /// Write a batch as a new entry. The entry becomes visible atomically.
    pub async fn enqueue(&self, batch: &RawBatch) -> Result<SpoolEntry, SpoolError> {
        let name = self.next_entry_name(batch.fetched_at);
        let path = self.directory.join(&name);
        let json = serde_json::to_vec(batch).map_err(SpoolError::Encode)?;

        // Write-then-rename: the suffix filter hides the temp file, so the
        // entry appears to readers all at once
        let temp_path = path.with_extension("tmp");
        tokio::fs::write(&temp_path, &json).await?;
        tokio::fs::rename(&temp_path, &path).await?;

        Ok(SpoolEntry { path })
    }

    /// Oldest visible entry, or `None` when the queue is empty.
    pub async fn oldest(&self) -> Result<Option<SpoolEntry>, SpoolError> {
        Ok(self.list_ordered().await?.into_iter().next())
    }

    /// All visible entries in arrival order.
    pub async fn list_ordered(&self) -> Result<Vec<SpoolEntry>, SpoolError> {
        let mut names = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.directory).await?;
        while let Some(dir_entry) = dir.next_entry().await? {
            let file_name = dir_entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if name.ends_with(ENTRY_SUFFIX) {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names
            .into_iter()
            .map(|n| SpoolEntry {
                path: self.directory.join(n),
            })
            .collect())
    }

    /// Number of visible entries.
    pub async fn len(&self) -> Result<usize, SpoolError> {
        Ok(self.list_ordered().await?.len())
    }

    pub async fn is_empty(&self) -> Result<bool, SpoolError> {
        Ok(self.len().await? == 0)
    }

    /// Decode an entry's batch.
    pub async fn read(&self, entry: &SpoolEntry) -> Result<RawBatch, SpoolError> {
        let bytes = tokio::fs::read(entry.path()).await?;
        serde_json::from_slice(&bytes).map_err(|e| SpoolError::Corrupt {
            name: entry.name().to_string(),
            source: e,
        })
    }

    /// Remove a fully processed entry.
    pub async fn remove(&self, entry: &SpoolEntry) -> Result<(), SpoolError> {
        tokio::fs::remove_file(entry.path()).await?;
        Ok(())
    }

    /// Move an undecodable entry aside so the queue can advance.
    ///
    /// The bytes stay on disk under a `.corrupt` name for inspection.
    pub async fn quarantine(&self, entry: &SpoolEntry) -> Result<(), SpoolError> {
        let target = entry.path().with_extension("corrupt");
        tokio::fs::rename(entry.path(), &target).await?;
        error!(entry = entry.name(), "Spool entry quarantined");
        Ok(())
    }

    /// Next entry file name: time-ordered, with a serial to break ties
    /// within one microsecond.
    fn next_entry_name(&self, fetched_at: DateTime<Utc>) -> String {
        let serial = self.counter.fetch_add(1, Ordering::Relaxed) % 10_000;
        format!(
            "{}-{:04}{}",
            fetched_at.format("%Y%m%dT%H%M%S%.6f"),
            serial,
            ENTRY_SUFFIX
        )
    }
}

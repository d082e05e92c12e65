//! wsprspool - WSPR spot ingestion from wsprnet.org into ClickHouse.
//!
//! This library implements a producer/consumer pipeline around a durable
//! on-disk spool: a downloader polls wsprnet.org for newly published
//! propagation spots and writes every batch to the spool before any
//! interpretation, and an insert worker enriches the records and loads them
//! into ClickHouse, removing each batch only after a confirmed write. The
//! two loops share nothing but the spool directory, so a sink outage never
//! blocks ingestion and a crash never loses a downloaded batch.
//!
//! # High-Level API
//!
//! The [`pipeline`] module wires everything together:
//!
//! ```ignore
//! use wsprspool::pipeline::{Pipeline, PipelineConfig};
//!
//! let pipeline = Pipeline::new(client, sessions, sink, spool, config).await;
//! pipeline.run(cancel_token).await;
//! ```

pub mod config;
pub mod grid;
pub mod logging;
pub mod pipeline;
pub mod session;
pub mod sink;
pub mod spool;
pub mod spot;
pub mod timing;
pub mod wsprnet;

/// Version of the wsprspool library and CLI.
///
/// This is synchronized across all components in the workspace.
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

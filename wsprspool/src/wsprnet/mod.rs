//! Upstream wsprnet.org protocol: HTTP transport, session-cookie fetches,
//! and payload parsing with truncation recovery.

mod client;
mod http;
mod payload;

pub use client::{FetchOutcome, WsprnetClient, WsprnetConfig};
pub use http::{AsyncHttpClient, ReqwestClient};
pub use payload::{parse_payload, recover_truncated, Payload, RawSpot};

#[cfg(test)]
pub use http::tests::MockHttpClient;

use thiserror::Error;

/// Errors from the upstream service.
#[derive(Debug, Error)]
pub enum WsprnetError {
    /// Transport-level failure: connection, DNS, or a non-success status.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// The request exceeded its deadline.
    #[error("request timed out after {0} seconds")]
    Timeout(u64),

    /// Upstream rejected the session cookie.
    #[error("session rejected by upstream")]
    AuthRejected,

    /// The response body could not be parsed, even after truncation
    /// recovery.
    #[error("malformed payload: {0}")]
    Malformed(String),
}

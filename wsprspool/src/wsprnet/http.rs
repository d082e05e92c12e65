//! HTTP client abstraction for testability

use super::WsprnetError;
use std::future::Future;
use tracing::{debug, trace, warn};

/// Trait for asynchronous HTTP client operations.
///
/// This abstraction allows for dependency injection and easier testing
/// by enabling mock HTTP clients in tests. The upstream service only ever
/// takes POST requests, with or without a session cookie.
pub trait AsyncHttpClient: Send + Sync {
    /// Performs an async HTTP POST request with JSON body.
    ///
    /// # Arguments
    ///
    /// * `url` - The URL to request
    /// * `json_body` - JSON body as a string
    ///
    /// # Returns
    ///
    /// The response body as bytes or an error.
    fn post_json(
        &self,
        url: &str,
        json_body: &str,
    ) -> impl Future<Output = Result<Vec<u8>, WsprnetError>> + Send;

    /// Performs an async HTTP POST request with JSON body and custom headers.
    ///
    /// # Arguments
    ///
    /// * `url` - The URL to request
    /// * `json_body` - JSON body as a string
    /// * `headers` - Slice of (header_name, header_value) tuples
    ///
    /// # Returns
    ///
    /// The response body as bytes or an error.
    fn post_json_with_headers(
        &self,
        url: &str,
        json_body: &str,
        headers: &[(&str, &str)],
    ) -> impl Future<Output = Result<Vec<u8>, WsprnetError>> + Send;
}

/// Default User-Agent string for HTTP requests.
/// The upstream Drupal frontend rejects clients without a browser User-Agent.
const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

/// Real HTTP client implementation using reqwest.
#[derive(Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
    timeout_secs: u64,
}

impl ReqwestClient {
    /// Creates a new ReqwestClient with the given request timeout.
    pub fn with_timeout(timeout_secs: u64) -> Result<Self, WsprnetError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .user_agent(DEFAULT_USER_AGENT)
            .tcp_keepalive(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| WsprnetError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            timeout_secs,
        })
    }

    fn map_send_error(&self, url: &str, e: reqwest::Error) -> WsprnetError {
        warn!(
            url = url,
            error = %e,
            is_connect = e.is_connect(),
            is_timeout = e.is_timeout(),
            "HTTP request failed"
        );
        if e.is_timeout() {
            WsprnetError::Timeout(self.timeout_secs)
        } else {
            WsprnetError::Http(format!("POST request failed: {}", e))
        }
    }
}

impl AsyncHttpClient for ReqwestClient {
    async fn post_json(&self, url: &str, json_body: &str) -> Result<Vec<u8>, WsprnetError> {
        self.post_json_with_headers(url, json_body, &[]).await
    }

    async fn post_json_with_headers(
        &self,
        url: &str,
        json_body: &str,
        headers: &[(&str, &str)],
    ) -> Result<Vec<u8>, WsprnetError> {
        trace!(url = url, bytes = json_body.len(), "HTTP POST request starting");

        let mut request = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .body(json_body.to_string());

        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| self.map_send_error(url, e))?;

        debug!(
            url = url,
            status = response.status().as_u16(),
            "HTTP response received"
        );

        // Check HTTP status
        if !response.status().is_success() {
            return Err(WsprnetError::Http(format!(
                "HTTP {} from POST {}",
                response.status(),
                url
            )));
        }

        // Read response body
        match response.bytes().await {
            Ok(bytes) => {
                trace!(url = url, bytes = bytes.len(), "HTTP response body read");
                Ok(bytes.to_vec())
            }
            Err(e) => {
                warn!(url = url, error = %e, "Failed to read response body");
                if e.is_timeout() {
                    Err(WsprnetError::Timeout(self.timeout_secs))
                } else {
                    Err(WsprnetError::Http(format!("Failed to read response: {}", e)))
                }
            }
        }
    }
}

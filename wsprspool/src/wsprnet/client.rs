//! Spot download client.

use tracing::{debug, info, warn};

use super::http::AsyncHttpClient;
use super::payload::{self, Payload, RawSpot};
use super::WsprnetError;
use crate::session::SessionToken;

/// Upstream endpoint and filter parameters.
#[derive(Debug, Clone)]
pub struct WsprnetConfig {
    /// Spots endpoint URL
    pub spots_url: String,
    /// Band filter ("All" or a band name)
    pub band: String,
    /// Exclude special-event callsigns (0 or 1)
    pub exclude_special: u8,
}

impl From<&crate::config::WsprnetSettings> for WsprnetConfig {
    fn from(settings: &crate::config::WsprnetSettings) -> Self {
        Self {
            spots_url: settings.spots_url.clone(),
            band: settings.band.clone(),
            exclude_special: settings.exclude_special,
        }
    }
}

/// Outcome of one spot fetch.
#[derive(Debug)]
pub struct FetchOutcome {
    /// Records as returned upstream, in upstream order.
    pub spots: Vec<RawSpot>,
    /// True when the body was damaged and only a leading prefix survived.
    pub repaired: bool,
}

/// Client for the wsprnet.org spots endpoint.
///
/// Generic over the HTTP transport so tests can script responses.
pub struct WsprnetClient<C> {
    http: C,
    config: WsprnetConfig,
}

impl<C: AsyncHttpClient> WsprnetClient<C> {
    pub fn new(http: C, config: WsprnetConfig) -> Self {
        Self { http, config }
    }

    /// The underlying HTTP transport, shared with the login flow.
    pub fn http(&self) -> &C {
        &self.http
    }

    /// Fetch all spots with sequence numbers above `cursor`.
    ///
    /// Upstream returns records strictly after the given sequence number, so
    /// passing the current watermark yields exactly the unseen tail.
    pub async fn fetch_since(
        &self,
        token: &SessionToken,
        cursor: u64,
    ) -> Result<FetchOutcome, WsprnetError> {
        let url = format!(
            "{}?band={}&spotnum_start={}&exclude_special={}",
            self.config.spots_url, self.config.band, cursor, self.config.exclude_special
        );
        let request_body = serde_json::json!({
            "spotnum_start": cursor.to_string(),
            "band": self.config.band,
            "callsign": "",
            "reporter": "",
            "exclude_special": self.config.exclude_special.to_string(),
        })
        .to_string();

        debug!(cursor, band = %self.config.band, "Downloading spots");
        let started = std::time::Instant::now();

        let cookie = token.cookie();
        let response = self
            .http
            .post_json_with_headers(&url, &request_body, &[("Cookie", cookie.as_str())])
            .await?;

        let elapsed_secs = started.elapsed().as_secs_f64();
        let text = String::from_utf8_lossy(&response);

        match payload::parse_payload(&text)? {
            Payload::Valid(spots) => {
                info!(
                    count = spots.len(),
                    bytes = response.len(),
                    elapsed_secs,
                    "Downloaded spots"
                );
                Ok(FetchOutcome {
                    spots,
                    repaired: false,
                })
            }
            Payload::Repaired(spots) => {
                warn!(
                    count = spots.len(),
                    bytes = response.len(),
                    elapsed_secs,
                    "Response body was damaged, recovered leading records"
                );
                Ok(FetchOutcome {
                    spots,
                    repaired: true,
                })
            }
        }
    }
}

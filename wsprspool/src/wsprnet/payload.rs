//! Spot payload parsing and truncation recovery.
//!
//! The upstream endpoint streams a JSON list of records and is known to cut
//! responses off mid-stream under load. A damaged body is not discarded
//! outright: the longest leading prefix that still parses as a non-empty
//! record list is recovered, and the missing tail simply arrives with the
//! next fetch.

use serde::{Deserialize, Deserializer, Serialize};

use super::WsprnetError;

/// One spot exactly as upstream serializes it.
///
/// Fields stay as strings at this stage; numeric interpretation happens at
/// insert time so that one malformed value cannot reject a whole batch.
/// Upstream is inconsistent about quoting numbers, so scalars of any type
/// are accepted and carried as their string form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSpot {
    #[serde(rename = "Spotnum", default, deserialize_with = "scalar_string")]
    pub spotnum: String,
    #[serde(rename = "Date", default, deserialize_with = "scalar_string")]
    pub date: String,
    #[serde(rename = "Reporter", default, deserialize_with = "scalar_string")]
    pub reporter: String,
    #[serde(rename = "ReporterGrid", default, deserialize_with = "scalar_string")]
    pub reporter_grid: String,
    #[serde(rename = "dB", default, deserialize_with = "scalar_string")]
    pub db: String,
    #[serde(rename = "MHz", default, deserialize_with = "scalar_string")]
    pub mhz: String,
    #[serde(rename = "CallSign", default, deserialize_with = "scalar_string")]
    pub callsign: String,
    #[serde(rename = "Grid", default, deserialize_with = "scalar_string")]
    pub grid: String,
    #[serde(rename = "Power", default, deserialize_with = "scalar_string")]
    pub power: String,
    #[serde(rename = "Drift", default, deserialize_with = "scalar_string")]
    pub drift: String,
    #[serde(rename = "distance", default, deserialize_with = "scalar_string")]
    pub distance: String,
    #[serde(rename = "azimuth", default, deserialize_with = "scalar_string")]
    pub azimuth: String,
    #[serde(rename = "Band", default, deserialize_with = "scalar_string")]
    pub band: String,
    #[serde(rename = "version", default, deserialize_with = "scalar_string")]
    pub version: String,
    #[serde(rename = "code", default, deserialize_with = "scalar_string")]
    pub code: String,
}

impl RawSpot {
    /// Sequence number, or 0 when the field does not parse.
    ///
    /// Batch bookkeeping tolerates bad records; strict parsing happens at
    /// insert time.
    pub fn seq(&self) -> u64 {
        self.spotnum.trim().parse().unwrap_or(0)
    }

    /// Raw event epoch, or 0 when the field does not parse.
    pub fn date_epoch(&self) -> u64 {
        self.date.trim().parse().unwrap_or(0)
    }
}

/// Accept any JSON scalar and carry it as a string.
fn scalar_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Outcome of parsing a fetch response body.
#[derive(Debug, PartialEq)]
pub enum Payload {
    /// The body parsed cleanly. May be empty.
    Valid(Vec<RawSpot>),
    /// The body was damaged; only the leading records were recovered.
    Repaired(Vec<RawSpot>),
}

/// Parse a spots response body.
///
/// Authentication rejections are detected before parsing because upstream
/// reports them as an HTML page, not JSON. A body that fails to parse goes
/// through truncation recovery before being declared malformed.
pub fn parse_payload(body: &str) -> Result<Payload, WsprnetError> {
    if body.contains("You are not authorized") {
        return Err(WsprnetError::AuthRejected);
    }

    match serde_json::from_str::<Vec<RawSpot>>(body) {
        Ok(spots) => {
            if let (Some(first), Some(last)) = (spots.first(), spots.last()) {
                if !has_required_fields(first) || !has_required_fields(last) {
                    return Err(WsprnetError::Malformed(
                        "record is missing required fields".to_string(),
                    ));
                }
            }
            Ok(Payload::Valid(spots))
        }
        Err(e) => {
            if body.len() < 10 {
                return Err(WsprnetError::Malformed(
                    "response shorter than any spot payload".to_string(),
                ));
            }
            match recover_truncated(body) {
                Some(spots) => Ok(Payload::Repaired(spots)),
                None => Err(WsprnetError::Malformed(e.to_string())),
            }
        }
    }
}

/// The fields every usable record must carry.
fn has_required_fields(spot: &RawSpot) -> bool {
    !spot.spotnum.is_empty()
        && !spot.date.is_empty()
        && !spot.reporter.is_empty()
        && !spot.grid.is_empty()
        && !spot.mhz.is_empty()
}

/// Longest-valid-prefix recovery for a damaged body.
///
/// Scans `]` positions from the end and accepts the first prefix that
/// parses as a non-empty record list.
pub fn recover_truncated(body: &str) -> Option<Vec<RawSpot>> {
    for (i, byte) in body.bytes().enumerate().rev() {
        if byte != b']' {
            continue;
        }
        if let Ok(spots) = serde_json::from_str::<Vec<RawSpot>>(&body[..=i]) {
            if !spots.is_empty() {
                return Some(spots);
            }
        }
    }
    None
}

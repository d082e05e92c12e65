//! Enriched, sink-ready spot records.
//!
//! Raw records carry every field as text. Enrichment parses them into
//! typed columns, validates the timestamp against the mode cadence, decodes
//! both locators, and derives the reverse bearing. One bad record is
//! skipped; it never rejects its batch.

use serde::Serialize;
use thiserror::Error;

use crate::grid;
use crate::timing::{self, Validation};
use crate::wsprnet::RawSpot;

/// One fully enriched spot, in sink column order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Spot {
    /// Upstream sequence number, the record's identity.
    pub seq: u64,
    /// Event time as Unix seconds, after timing validation.
    pub time: u32,
    pub band: i16,
    pub reporter: String,
    pub reporter_grid: String,
    pub reporter_lat: f32,
    pub reporter_lon: f32,
    pub tx_call: String,
    pub tx_grid: String,
    pub tx_lat: f32,
    pub tx_lon: f32,
    pub distance_km: u32,
    /// Bearing as reported upstream.
    pub azimuth: u16,
    /// Derived reporter-to-transmitter bearing.
    pub rev_azimuth: u16,
    pub frequency_mhz: f64,
    pub power_dbm: i16,
    pub snr_db: i16,
    pub drift_hz: i16,
    pub version: String,
    pub mode_code: i16,
}

/// A record whose fields cannot be interpreted.
#[derive(Debug, Error)]
#[error("spot {seq}: field {field} does not parse: {value:?}")]
pub struct SpotParseError {
    /// Raw sequence field, possibly itself the problem.
    pub seq: String,
    pub field: &'static str,
    pub value: String,
}

impl Spot {
    /// Enrich one raw record.
    ///
    /// Returns the spot together with its timing outcome so the caller can
    /// tally corrections.
    pub fn from_raw(raw: &RawSpot) -> Result<(Spot, Validation), SpotParseError> {
        let seq: u64 = parse_required(raw, "Spotnum", &raw.spotnum)?;
        let raw_time: u32 = parse_required(raw, "Date", &raw.date)?;

        // A record without a mode code predates FST4W and is plain WSPR
        let mode_code: i16 = parse_or(raw, "code", &raw.code, 1)?;

        let validation = timing::validate(raw_time, mode_code);
        let time = validation.event_time(raw_time);

        let reporter_loc = grid::locator_to_lat_lon(&raw.reporter_grid);
        let tx_loc = grid::locator_to_lat_lon(&raw.grid);
        let rev_azimuth = grid::azimuth(reporter_loc, tx_loc).round() as u16 % 360;

        let spot = Spot {
            seq,
            time,
            band: parse_or(raw, "Band", &raw.band, 0)?,
            reporter: raw.reporter.clone(),
            reporter_grid: raw.reporter_grid.clone(),
            reporter_lat: round3(reporter_loc.lat),
            reporter_lon: round3(reporter_loc.lon),
            tx_call: raw.callsign.clone(),
            tx_grid: raw.grid.clone(),
            tx_lat: round3(tx_loc.lat),
            tx_lon: round3(tx_loc.lon),
            distance_km: parse_or(raw, "distance", &raw.distance, 0)?,
            azimuth: parse_or(raw, "azimuth", &raw.azimuth, 0)?,
            rev_azimuth,
            frequency_mhz: parse_or(raw, "MHz", &raw.mhz, 0.0)?,
            power_dbm: parse_or(raw, "Power", &raw.power, 0)?,
            snr_db: parse_or(raw, "dB", &raw.db, 0)?,
            drift_hz: parse_or(raw, "Drift", &raw.drift, 0)?,
            version: raw.version.clone(),
            mode_code,
        };
        Ok((spot, validation))
    }
}

/// Parse a field that must be present for the record to mean anything.
fn parse_required<T: std::str::FromStr>(
    raw: &RawSpot,
    field: &'static str,
    value: &str,
) -> Result<T, SpotParseError> {
    value.trim().parse().map_err(|_| SpotParseError {
        seq: raw.spotnum.clone(),
        field,
        value: value.to_string(),
    })
}

/// Parse an optional field, defaulting when absent but rejecting garbage.
fn parse_or<T: std::str::FromStr>(
    raw: &RawSpot,
    field: &'static str,
    value: &str,
    default: T,
) -> Result<T, SpotParseError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(default);
    }
    trimmed.parse().map_err(|_| SpotParseError {
        seq: raw.spotnum.clone(),
        field,
        value: value.to_string(),
    })
}

/// Coordinates are stored to three decimal places, about 100 m.
fn round3(value: f64) -> f32 {
    ((value * 1000.0).round() / 1000.0) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_raw() -> RawSpot {
        RawSpot {
            spotnum: "3000000001".to_string(),
            date: "1700000400".to_string(), // minute 20, valid for WSPR-2
            reporter: "W1ABC".to_string(),
            reporter_grid: "FN42".to_string(),
            db: "-21".to_string(),
            mhz: "14.097158".to_string(),
            callsign: "SM7XYZ".to_string(),
            grid: "JO65".to_string(),
            power: "37".to_string(),
            drift: "-1".to_string(),
            distance: "5930".to_string(),
            azimuth: "292".to_string(),
            band: "14".to_string(),
            version: "2.6.1".to_string(),
            code: "1".to_string(),
        }
    }

    #[test]
    fn test_enrichment_of_a_clean_record() {
        let (spot, validation) = Spot::from_raw(&full_raw()).unwrap();

        assert_eq!(validation, Validation::Valid);
        assert_eq!(spot.seq, 3_000_000_001);
        assert_eq!(spot.time, 1_700_000_400);
        assert_eq!(spot.band, 14);
        assert_eq!(spot.snr_db, -21);
        assert_eq!(spot.power_dbm, 37);
        assert_eq!(spot.drift_hz, -1);
        assert_eq!(spot.distance_km, 5930);
        assert_eq!(spot.azimuth, 292);
        assert_eq!(spot.frequency_mhz, 14.097158);
        assert_eq!(spot.version, "2.6.1");
        assert_eq!(spot.mode_code, 1);
    }

    #[test]
    fn test_enrichment_decodes_both_locators() {
        let (spot, _) = Spot::from_raw(&full_raw()).unwrap();

        assert_eq!(spot.reporter_lat, 42.5);
        assert_eq!(spot.reporter_lon, -71.0);
        assert_eq!(spot.tx_lat, 55.5);
        assert_eq!(spot.tx_lon, 13.0);

        // Reporter in New England looking northeast toward southern Sweden
        assert_eq!(spot.rev_azimuth, 45);
    }

    #[test]
    fn test_six_char_locator_rounds_to_three_decimals() {
        let mut raw = full_raw();
        raw.reporter_grid = "JN58td".to_string();

        let (spot, _) = Spot::from_raw(&raw).unwrap();
        assert_eq!(spot.reporter_lat, 48.146);
        assert_eq!(spot.reporter_lon, 11.625);
    }

    #[test]
    fn test_undecodable_locator_yields_sentinel_zeros() {
        let mut raw = full_raw();
        raw.grid = "/A".to_string();

        let (spot, _) = Spot::from_raw(&raw).unwrap();
        assert_eq!(spot.tx_lat, 0.0);
        assert_eq!(spot.tx_lon, 0.0);
    }

    #[test]
    fn test_odd_minute_correction_shifts_stored_time() {
        let mut raw = full_raw();
        raw.date = "1700000460".to_string(); // minute 21

        let (spot, validation) = Spot::from_raw(&raw).unwrap();
        assert_eq!(
            validation,
            Validation::Corrected {
                epoch: 1_700_000_520
            }
        );
        assert_eq!(spot.time, 1_700_000_520);
    }

    #[test]
    fn test_ambiguous_timing_keeps_raw_time() {
        let mut raw = full_raw();
        raw.code = "2".to_string(); // FST4W-900, minute 20 is off-cycle

        let (spot, validation) = Spot::from_raw(&raw).unwrap();
        assert_eq!(validation, Validation::Ambiguous);
        assert_eq!(spot.time, 1_700_000_400);
    }

    #[test]
    fn test_empty_optional_fields_take_defaults() {
        let raw = RawSpot {
            spotnum: "17".to_string(),
            date: "1700000400".to_string(),
            reporter: "W1ABC".to_string(),
            grid: "JO65".to_string(),
            ..Default::default()
        };

        let (spot, _) = Spot::from_raw(&raw).unwrap();
        assert_eq!(spot.band, 0);
        assert_eq!(spot.snr_db, 0);
        assert_eq!(spot.frequency_mhz, 0.0);
        assert_eq!(spot.mode_code, 1);
        assert_eq!(spot.version, "");
    }

    #[test]
    fn test_missing_sequence_number_is_rejected() {
        let mut raw = full_raw();
        raw.spotnum = String::new();

        let err = Spot::from_raw(&raw).unwrap_err();
        assert_eq!(err.field, "Spotnum");
    }

    #[test]
    fn test_garbage_numeric_field_is_rejected() {
        let mut raw = full_raw();
        raw.db = "loud".to_string();

        let err = Spot::from_raw(&raw).unwrap_err();
        assert_eq!(err.field, "dB");
        assert_eq!(err.seq, "3000000001");
    }

    #[test]
    fn test_serializes_with_sink_column_names() {
        let (spot, _) = Spot::from_raw(&full_raw()).unwrap();
        let value = serde_json::to_value(&spot).unwrap();

        assert_eq!(value["seq"], 3_000_000_001u64);
        assert_eq!(value["time"], 1_700_000_400u32);
        assert_eq!(value["reporter"], "W1ABC");
        assert_eq!(value["tx_call"], "SM7XYZ");
        assert_eq!(value["rev_azimuth"], 45);
    }
}

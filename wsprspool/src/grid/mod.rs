//! Maidenhead locator decoding and great-circle bearings.
//!
//! A locator names a rectangular cell on the earth: the leading letter pair
//! selects a 20°x10° field, the digit pair a 2°x1° square within it, and an
//! optional trailing letter pair a 5'x2.5' subsquare. Decoding returns the
//! centre of the smallest cell given.
//!
//! Both functions are pure. Bad input never raises an error: a locator that
//! cannot be decoded yields [`LatLon::UNKNOWN`], so one malformed field
//! cannot reject the record that carries it.

mod types;


pub use types::LatLon;

/// Decode a 4- or 6-character Maidenhead locator to the centre of its cell.
///
/// Field letters are accepted in either case; characters beyond the sixth
/// are ignored. Locators that are too short or contain out-of-range
/// characters decode to [`LatLon::UNKNOWN`].
pub fn locator_to_lat_lon(locator: &str) -> LatLon {
    let loc = locator.trim().as_bytes();
    if loc.len() < 4 {
        return LatLon::UNKNOWN;
    }

    let field_lon = loc[0].to_ascii_uppercase();
    let field_lat = loc[1].to_ascii_uppercase();
    let square_lon = loc[2];
    let square_lat = loc[3];

    if !(b'A'..=b'R').contains(&field_lon)
        || !(b'A'..=b'R').contains(&field_lat)
        || !square_lon.is_ascii_digit()
        || !square_lat.is_ascii_digit()
    {
        return LatLon::UNKNOWN;
    }

    let mut lat = (field_lat - b'A') as f64 * 10.0 + (square_lat - b'0') as f64 + 0.5 - 90.0;
    let mut lon = (field_lon - b'A') as f64 * 20.0 + (square_lon - b'0') as f64 * 2.0 + 1.0 - 180.0;

    if loc.len() >= 6 {
        let sub_lon = loc[4].to_ascii_lowercase();
        let sub_lat = loc[5].to_ascii_lowercase();
        if !(b'a'..=b'x').contains(&sub_lon) || !(b'a'..=b'x').contains(&sub_lat) {
            return LatLon::UNKNOWN;
        }
        // Subsquares index from 1; the square centre offset is removed first.
        let idx_lon = (sub_lon - b'a') as f64 + 1.0;
        let idx_lat = (sub_lat - b'a') as f64 + 1.0;
        lat = lat - 0.5 + idx_lat / 24.0 - 1.0 / 48.0;
        lon = lon - 1.0 + idx_lon / 12.0 - 1.0 / 24.0;
    }

    LatLon::new(lat, lon)
}

/// Initial great-circle bearing from one position toward another, in degrees
/// clockwise from north, normalized to `[0, 360)`.
pub fn azimuth(from: LatLon, to: LatLon) -> f64 {
    let phi_from = from.lat.to_radians();
    let phi_to = to.lat.to_radians();
    let delta_lambda = (to.lon - from.lon).to_radians();

    let y = delta_lambda.sin() * phi_to.cos();
    let x = phi_from.cos() * phi_to.sin() - phi_from.sin() * phi_to.cos() * delta_lambda.cos();

    y.atan2(x).to_degrees().rem_euclid(360.0)
}

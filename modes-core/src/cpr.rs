//! Compact Position Reporting — global decode of airborne positions.
//!
//! An aircraft alternates between even and odd encoded positions. Once one
//! leg of each parity is known the pair resolves to an unambiguous position;
//! the more recently captured leg anchors the result.
//!
//! Coordinates are 17-bit fractions of a zone. Even legs divide the globe
//! into 60 latitude zones, odd legs into 59.

use serde::Serialize;

/// Latitude zones between equator and pole.
const NZ: f64 = 15.0;

/// Maximum CPR value (2^17).
const CPR_MAX: f64 = (1u32 << 17) as f64;

/// Parity of an encoded position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Parity {
    Even,
    Odd,
}

/// One raw encoded position leg with its capture time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CprLeg {
    pub lat: u32,
    pub lon: u32,
    pub timestamp: f64,
}

/// Longitude zone count at `lat`: 59 at the equator down to 1 past 87°.
pub fn nl(lat: f64) -> i32 {
    use std::f64::consts::PI;

    let lat = lat.abs();
    if lat >= 87.0 {
        return 1;
    }
    let cos_lat = lat.to_radians().cos();
    let zone = 1.0 - (PI / (2.0 * NZ)).cos();
    let zones = 2.0 * PI / (1.0 - zone / (cos_lat * cos_lat)).acos();
    (zones.floor() as i32).max(1)
}

/// Euclidean remainder on floats.
fn modulo(x: f64, y: f64) -> f64 {
    x.rem_euclid(y)
}

/// Resolve an even/odd pair into `(latitude, longitude)` degrees.
///
/// The leg with the later timestamp anchors the decode (ties go to even).
/// Returns `None` when the two legs straddle a longitude zone boundary.
pub fn global_decode(even: &CprLeg, odd: &CprLeg) -> Option<(f64, f64)> {
    let dlat_even = 360.0 / (4.0 * NZ);
    let dlat_odd = 360.0 / (4.0 * NZ - 1.0);

    let lat_even_cpr = even.lat as f64 / CPR_MAX;
    let lon_even_cpr = even.lon as f64 / CPR_MAX;
    let lat_odd_cpr = odd.lat as f64 / CPR_MAX;
    let lon_odd_cpr = odd.lon as f64 / CPR_MAX;

    // Latitude zone index
    let j = (59.0 * lat_even_cpr - 60.0 * lat_odd_cpr + 0.5).floor();

    let mut lat_e = dlat_even * (modulo(j, 60.0) + lat_even_cpr);
    let mut lat_o = dlat_odd * (modulo(j, 59.0) + lat_odd_cpr);
    if lat_e >= 270.0 {
        lat_e -= 360.0;
    }
    if lat_o >= 270.0 {
        lat_o -= 360.0;
    }

    if nl(lat_e) != nl(lat_o) {
        return None;
    }

    let odd_anchor = odd.timestamp > even.timestamp;
    let (lat, nl_val) = if odd_anchor {
        (lat_o, nl(lat_o))
    } else {
        (lat_e, nl(lat_e))
    };

    let n_lon = if odd_anchor { nl_val - 1 } else { nl_val }.max(1);
    let dlon = 360.0 / n_lon as f64;
    let m = (lon_even_cpr * (nl_val - 1) as f64 - lon_odd_cpr * nl_val as f64 + 0.5).floor();
    let anchor_lon_cpr = if odd_anchor { lon_odd_cpr } else { lon_even_cpr };
    let mut lon = dlon * (modulo(m, n_lon as f64) + anchor_lon_cpr);
    if lon >= 180.0 {
        lon -= 360.0;
    }

    Some((round6(lat), round6(lon)))
}

/// Round to 6 decimal places.
fn round6(val: f64) -> f64 {
    (val * 1_000_000.0).round() / 1_000_000.0
}

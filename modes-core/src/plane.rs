//! The per-aircraft record kept by the registry, and its wire snapshot.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::cpr::{self, CprLeg, Parity};
use crate::message::DecodeContext;
use crate::types::{IcaoAddress, ModesError};

/// Mean Earth radius in meters.
const EARTH_RADIUS_M: f64 = 6_371_008.8;

// ---------------------------------------------------------------------------
// Compliance level
// ---------------------------------------------------------------------------

/// ADS-B version the transponder is known (or assumed) to comply with.
///
/// The `OrMore` variants are lower bounds used until an operational status
/// message reports the exact version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdsbLevel {
    Level0,
    Level0OrMore,
    Level1,
    Level1OrMore,
    Level2,
}

impl AdsbLevel {
    pub fn label(self) -> &'static str {
        match self {
            AdsbLevel::Level0 => "level 0",
            AdsbLevel::Level0OrMore => "level 0 or more",
            AdsbLevel::Level1 => "level 1",
            AdsbLevel::Level1OrMore => "level 1 or more",
            AdsbLevel::Level2 => "level 2",
        }
    }

    /// Exact level announced by an operational status message.
    pub fn from_version(version: u8) -> AdsbLevel {
        match version {
            0 => AdsbLevel::Level0,
            1 => AdsbLevel::Level1,
            _ => AdsbLevel::Level2,
        }
    }

    /// Level after seeing a message that version 0 transponders never send.
    pub fn at_least_level1(self) -> AdsbLevel {
        match self {
            AdsbLevel::Level0OrMore => AdsbLevel::Level1OrMore,
            other => other,
        }
    }

    /// NIC supplement bits are undefined for version 0 transponders.
    pub fn has_nic_supplements(self) -> bool {
        self != AdsbLevel::Level0
    }
}

impl fmt::Display for AdsbLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for AdsbLevel {
    type Err = ModesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "level0" | "level_0" => Ok(AdsbLevel::Level0),
            "level0_or_more" | "level_0_or_more" => Ok(AdsbLevel::Level0OrMore),
            "level1" | "level_1" => Ok(AdsbLevel::Level1),
            "level1_or_more" | "level_1_or_more" => Ok(AdsbLevel::Level1OrMore),
            "level2" | "level_2" => Ok(AdsbLevel::Level2),
            _ => Err(ModesError::Config(format!("unknown ADS-B level: {s}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Plane
// ---------------------------------------------------------------------------

/// Mutable state of one observed aircraft.
///
/// Position is never stored: it is resolved on demand from the latest even
/// and odd CPR legs.
#[derive(Debug, Clone, PartialEq)]
pub struct Plane {
    pub address: IcaoAddress,
    pub level: AdsbLevel,
    pub identification: String,
    pub altitude_ft: i32,
    pub even: Option<CprLeg>,
    pub odd: Option<CprLeg>,
    pub air_speed: i32,
    pub air_speed_valid: bool,
    pub vertical_rate: i32,
    pub vertical_rate_valid: bool,
    pub nic_supplement_a: bool,
    pub nic_supplement_c: bool,
    /// Navigation integrity category of the last position message.
    pub nic: Option<u8>,
    pub first_seen: f64,
    pub last_seen: f64,
}

impl Plane {
    pub fn new(address: IcaoAddress, level: AdsbLevel, timestamp: f64) -> Self {
        Plane {
            address,
            level,
            identification: String::new(),
            altitude_ft: 0,
            even: None,
            odd: None,
            air_speed: 0,
            air_speed_valid: false,
            vertical_rate: 0,
            vertical_rate_valid: false,
            nic_supplement_a: false,
            nic_supplement_c: false,
            nic: None,
            first_seen: timestamp,
            last_seen: timestamp,
        }
    }

    /// Store a position leg, replacing the previous one of the same parity.
    pub fn store_leg(&mut self, parity: Parity, leg: CprLeg) {
        match parity {
            Parity::Even => self.even = Some(leg),
            Parity::Odd => self.odd = Some(leg),
        }
    }

    /// Set the identification unless one is already known. Returns true if set.
    pub fn set_identification(&mut self, identification: &str) -> bool {
        if !self.identification.is_empty() || identification.is_empty() {
            return false;
        }
        self.identification = identification.to_string();
        true
    }

    /// Resolved position, once a leg of each parity has been seen.
    pub fn position(&self) -> Option<(f64, f64)> {
        match (&self.even, &self.odd) {
            (Some(even), Some(odd)) => cpr::global_decode(even, odd),
            _ => None,
        }
    }

    /// Context the decoder needs to interpret this plane's next message.
    pub fn decode_context(&self) -> DecodeContext {
        DecodeContext {
            level: self.level,
            nic_supplement_a: self.nic_supplement_a,
            nic_supplement_c: self.nic_supplement_c,
        }
    }

    pub fn age(&self, now: f64) -> f64 {
        now - self.last_seen
    }

    pub fn snapshot(&self) -> PlaneSnapshot {
        let (latitude, longitude) = self.position().unwrap_or((0.0, 0.0));
        PlaneSnapshot {
            address: self.address,
            adsb_level: self.level.label(),
            altitude: self.altitude_ft,
            identification: self.identification.clone(),
            air_speed: self.air_speed,
            air_speed_valid: self.air_speed_valid,
            vertical_rate: self.vertical_rate,
            vertical_rate_valid: self.vertical_rate_valid,
            latitude,
            longitude,
        }
    }

    /// One-line description, with the ground distance to `reference` when given.
    pub fn summary(&self, reference: Option<(f64, f64)>) -> String {
        let mut parts = vec![
            format!("Plane: {}", self.address),
            format!("ADSB Level: {}", self.level),
        ];

        if !self.identification.is_empty() {
            parts.push(format!("Flight Identification: {}", self.identification));
        }

        if let Some((lat, lon)) = self.position() {
            parts.push(format!("Latitude: {lat}"));
            parts.push(format!("Longitude: {lon}"));
            if let Some((ref_lat, ref_lon)) = reference {
                let distance = ground_distance_m(ref_lat, ref_lon, lat, lon);
                parts.push(format!("Ground distance: {distance:.0} m"));
            }
        }

        if self.altitude_ft > 0 {
            parts.push(format!("Altitude: {} feet", self.altitude_ft));
        }
        if self.air_speed_valid {
            parts.push(format!("Air speed: {} knot", self.air_speed));
        }
        if self.vertical_rate_valid {
            parts.push(format!("Vertical rate: {} ft/min", self.vertical_rate));
        }

        parts.join(", ")
    }
}

/// Great-circle distance in meters (haversine).
pub fn ground_distance_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().asin()
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// The externally visible state of a plane, as pushed to viewers.
///
/// Raw CPR legs, capability flags and timestamps stay internal. An unknown
/// position is reported as (0, 0).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaneSnapshot {
    pub address: IcaoAddress,
    pub adsb_level: &'static str,
    pub altitude: i32,
    pub identification: String,
    pub air_speed: i32,
    pub air_speed_valid: bool,
    pub vertical_rate: i32,
    pub vertical_rate_valid: bool,
    pub latitude: f64,
    pub longitude: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plane() -> Plane {
        Plane::new(IcaoAddress::new(0x40621D), AdsbLevel::Level2, 100.0)
    }

    fn leg(lat: u32, lon: u32, timestamp: f64) -> CprLeg {
        CprLeg { lat, lon, timestamp }
    }

    #[test]
    fn test_new_plane_is_zeroed() {
        let p = plane();
        assert_eq!(p.first_seen, 100.0);
        assert_eq!(p.last_seen, 100.0);
        assert!(p.identification.is_empty());
        assert_eq!(p.altitude_ft, 0);
        assert!(!p.air_speed_valid && !p.vertical_rate_valid);
        assert!(p.position().is_none());
    }

    #[test]
    fn test_position_uses_most_recent_leg() {
        let mut p = plane();
        p.store_leg(Parity::Even, leg(93000, 51372, 100.0));
        p.store_leg(Parity::Odd, leg(74158, 50194, 105.0));

        let (lat, lon) = p.position().unwrap();
        assert!((lat - 52.2658).abs() < 0.001, "odd-anchored lat {lat}");
        assert!((lon - 3.9389).abs() < 0.001, "odd-anchored lon {lon}");
        assert_ne!(lat, 0.0);
        assert_ne!(lon, 0.0);
    }

    #[test]
    fn test_single_leg_reports_zero_position() {
        let mut p = plane();
        p.store_leg(Parity::Even, leg(93000, 51372, 100.0));
        assert!(p.position().is_none());

        let snap = p.snapshot();
        assert_eq!(snap.latitude, 0.0);
        assert_eq!(snap.longitude, 0.0);
    }

    #[test]
    fn test_leg_overwrite_by_parity() {
        let mut p = plane();
        p.store_leg(Parity::Even, leg(1, 2, 100.0));
        p.store_leg(Parity::Even, leg(3, 4, 101.0));
        assert_eq!(p.even, Some(leg(3, 4, 101.0)));
        assert!(p.odd.is_none());
    }

    #[test]
    fn test_identification_first_write_wins() {
        let mut p = plane();
        assert!(p.set_identification("AB123"));
        assert!(!p.set_identification("CD456"));
        assert_eq!(p.identification, "AB123");
    }

    #[test]
    fn test_empty_identification_ignored() {
        let mut p = plane();
        assert!(!p.set_identification(""));
        assert!(p.set_identification("AB123"));
    }

    #[test]
    fn test_snapshot_fields() {
        let mut p = plane();
        p.altitude_ft = 38000;
        p.air_speed = 159;
        p.air_speed_valid = true;
        p.set_identification("KLM1023");

        let snap = p.snapshot();
        assert_eq!(snap.address.to_string(), "40621D");
        assert_eq!(snap.adsb_level, "level 2");
        assert_eq!(snap.altitude, 38000);
        assert_eq!(snap.identification, "KLM1023");
        assert_eq!(snap.air_speed, 159);
        assert!(snap.air_speed_valid);
        assert!(!snap.vertical_rate_valid);
    }

    #[test]
    fn test_summary() {
        let mut p = plane();
        p.altitude_ft = 38000;
        p.store_leg(Parity::Even, leg(93000, 51372, 100.0));
        p.store_leg(Parity::Odd, leg(74158, 50194, 101.0));

        let text = p.summary(Some((52.0, 4.0)));
        assert!(text.starts_with("Plane: 40621D, ADSB Level: level 2"));
        assert!(text.contains("Ground distance:"));
        assert!(text.contains("Altitude: 38000 feet"));
        assert!(!text.contains("Air speed"));
    }

    #[test]
    fn test_ground_distance() {
        // One degree of latitude is ~111.2 km
        let d = ground_distance_m(0.0, 0.0, 1.0, 0.0);
        assert!((d - 111_195.0).abs() < 100.0, "got {d}");
        assert_eq!(ground_distance_m(34.67, 33.03, 34.67, 33.03), 0.0);
    }

    #[test]
    fn test_level_transitions() {
        assert_eq!(AdsbLevel::from_version(0), AdsbLevel::Level0);
        assert_eq!(AdsbLevel::from_version(2), AdsbLevel::Level2);
        assert_eq!(
            AdsbLevel::Level0OrMore.at_least_level1(),
            AdsbLevel::Level1OrMore
        );
        assert_eq!(AdsbLevel::Level2.at_least_level1(), AdsbLevel::Level2);
        assert!(!AdsbLevel::Level0.has_nic_supplements());
    }

    #[test]
    fn test_level_parse() {
        assert_eq!("level2".parse::<AdsbLevel>().unwrap(), AdsbLevel::Level2);
        assert_eq!(
            "level-0-or-more".parse::<AdsbLevel>().unwrap(),
            AdsbLevel::Level0OrMore
        );
        assert!("level9".parse::<AdsbLevel>().is_err());
    }
}

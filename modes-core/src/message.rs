//! Decode extended squitters into typed ADS-B messages.
//!
//! Handles DF17 and DF18 (control field 0/1) by Type Code:
//! - TC 1-4:   Aircraft identification
//! - TC 5-8:   Surface position
//! - TC 9-18:  Airborne position (barometric altitude)
//! - TC 19:    Airborne velocity
//! - TC 20-22: Airborne position (GNSS height)
//! - TC 29:    Target state and status
//! - TC 31:    Aircraft operational status
//!
//! Some fields depend on what is already known about the transponder, so
//! decoding takes a [`DecodeContext`] built from the plane record.

use crate::cpr::Parity;
use crate::frame::Frame;
use crate::plane::AdsbLevel;
use crate::types::CALLSIGN_CHARSET;

/// What the decoder needs to know about the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeContext {
    pub level: AdsbLevel,
    pub nic_supplement_a: bool,
    pub nic_supplement_c: bool,
}

/// TC 1-4: callsign and emitter category.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentificationMsg {
    pub callsign: String,
    pub category: u8,
}

/// TC 5-8 / 9-18 / 20-22: one CPR-encoded position leg.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionMsg {
    pub parity: Parity,
    pub lat_cpr: u32,
    pub lon_cpr: u32,
    pub altitude_ft: Option<i32>,
    pub surface: bool,
    pub nic: u8,
}

/// TC 19. `None` marks a component reported as unavailable.
#[derive(Debug, Clone, PartialEq)]
pub struct VelocityMsg {
    pub speed_kts: Option<i32>,
    pub vertical_rate_fpm: Option<i32>,
}

/// TC 31.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationalStatusMsg {
    pub version: u8,
    pub surface: bool,
    pub nic_supplement_a: bool,
    pub nic_supplement_c: bool,
}

/// Closed set of message families the registry merges.
#[derive(Debug, Clone, PartialEq)]
pub enum AdsbMessage {
    Identification(IdentificationMsg),
    Position(PositionMsg),
    Velocity(VelocityMsg),
    /// Only version 1+ transponders send these; the content is not used.
    TargetState,
    OperationalStatus(OperationalStatusMsg),
}

/// Extract ME bits `start..start + len`, numbered from 1 at the MSB.
fn field(me: u64, start: u32, len: u32) -> u64 {
    (me >> (57 - start - len)) & ((1u64 << len) - 1)
}

fn flag(me: u64, bit: u32) -> bool {
    field(me, bit, 1) == 1
}

/// Decode the ADS-B content of a frame.
///
/// Returns `None` for frames that are not ADS-B extended squitters and for
/// type codes this decoder does not use.
pub fn decode(frame: &Frame, ctx: &DecodeContext) -> Option<AdsbMessage> {
    match frame.df {
        17 => {}
        // Control field 2+ is TIS-B / ADS-R relay
        18 if frame.first_field() <= 1 => {}
        _ => return None,
    }

    let me = frame.me()?;
    match field(me, 1, 5) as u8 {
        1..=4 => Some(AdsbMessage::Identification(decode_identification(me))),
        tc @ (5..=18 | 20..=22) => Some(AdsbMessage::Position(decode_position(me, tc, ctx))),
        19 => decode_velocity(me).map(AdsbMessage::Velocity),
        29 => Some(AdsbMessage::TargetState),
        31 => decode_operational_status(me).map(AdsbMessage::OperationalStatus),
        _ => None,
    }
}

fn decode_identification(me: u64) -> IdentificationMsg {
    let callsign: String = (0..8)
        .map(|i| CALLSIGN_CHARSET[field(me, 9 + i * 6, 6) as usize] as char)
        .collect();

    IdentificationMsg {
        callsign: callsign.trim_end_matches([' ', '#']).to_string(),
        category: field(me, 6, 3) as u8,
    }
}

fn decode_position(me: u64, tc: u8, ctx: &DecodeContext) -> PositionMsg {
    let surface = (5..=8).contains(&tc);
    let altitude_ft = match tc {
        5..=8 => None,
        20..=22 => decode_gnss_height(field(me, 9, 12) as u32),
        _ => decode_altitude(field(me, 9, 12) as u32),
    };

    // NIC-B is only defined from version 2 on
    let nic_b = ctx.level == AdsbLevel::Level2 && flag(me, 8);

    PositionMsg {
        parity: if flag(me, 22) { Parity::Odd } else { Parity::Even },
        lat_cpr: field(me, 23, 17) as u32,
        lon_cpr: field(me, 40, 17) as u32,
        altitude_ft,
        surface,
        nic: nic_for(tc, ctx, nic_b),
    }
}

/// Navigation integrity category from the type code and supplements.
fn nic_for(tc: u8, ctx: &DecodeContext, nic_b: bool) -> u8 {
    let supplements = ctx.level.has_nic_supplements();
    let a = supplements && ctx.nic_supplement_a;
    let c = supplements && ctx.nic_supplement_c;

    match tc {
        5 | 9 | 20 => 11,
        6 | 10 | 21 => 10,
        7 => {
            if a {
                9
            } else {
                8
            }
        }
        8 => match (a, c) {
            (true, true) => 7,
            (true, false) | (false, true) => 6,
            (false, false) => 0,
        },
        11 => {
            if a && nic_b {
                9
            } else {
                8
            }
        }
        12 => 7,
        13 => 6,
        14 => 5,
        15 => 4,
        16 => {
            if a && nic_b {
                3
            } else {
                2
            }
        }
        17 => 1,
        _ => 0,
    }
}

/// Decode the 12-bit altitude field. Only the 25 ft (Q-bit) encoding is
/// supported; Gillham-coded altitudes yield `None`.
pub fn decode_altitude(code: u32) -> Option<i32> {
    if code == 0 || (code >> 4) & 1 == 0 {
        return None;
    }
    let n = ((code >> 5) << 4) | (code & 0x0F);
    Some(n as i32 * 25 - 1000)
}

/// GNSS height above the ellipsoid: plain 12-bit meters, reported in feet.
fn decode_gnss_height(meters: u32) -> Option<i32> {
    if meters == 0 {
        return None;
    }
    Some((meters as f64 * 3.28084).round() as i32)
}

fn decode_velocity(me: u64) -> Option<VelocityMsg> {
    let subtype = field(me, 6, 3);
    let scale = if matches!(subtype, 2 | 4) { 4 } else { 1 };

    let speed_kts = match subtype {
        1 | 2 => {
            let ew = field(me, 15, 10) as i32;
            let ns = field(me, 26, 10) as i32;
            if ew == 0 || ns == 0 {
                None
            } else {
                let vx = ((ew - 1) * scale) as f64;
                let vy = ((ns - 1) * scale) as f64;
                Some(vx.hypot(vy).floor() as i32)
            }
        }
        3 | 4 => match field(me, 26, 10) as i32 {
            0 => None,
            raw => Some((raw - 1) * scale),
        },
        _ => return None,
    };

    let vertical_rate_fpm = match field(me, 38, 9) as i32 {
        0 => None,
        raw => {
            let rate = (raw - 1) * 64;
            Some(if flag(me, 37) { -rate } else { rate })
        }
    };

    Some(VelocityMsg {
        speed_kts,
        vertical_rate_fpm,
    })
}

fn decode_operational_status(me: u64) -> Option<OperationalStatusMsg> {
    let surface = match field(me, 6, 3) {
        0 => false,
        1 => true,
        _ => return None,
    };
    let version = field(me, 41, 3) as u8;

    Some(OperationalStatusMsg {
        version,
        surface,
        nic_supplement_a: version >= 1 && flag(me, 44),
        // Part of the surface capability class from version 2
        nic_supplement_c: version >= 2 && surface && flag(me, 20),
    })
}

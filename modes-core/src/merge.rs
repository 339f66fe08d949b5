//! Merge decoded messages into plane records.

use crate::cpr::CprLeg;
use crate::message::{AdsbMessage, OperationalStatusMsg, PositionMsg, VelocityMsg};
use crate::plane::{AdsbLevel, Plane};

/// Apply `msg`, captured at `timestamp`, to `plane`.
///
/// Returns true when the change is visible to viewers and a snapshot should
/// be published.
pub fn merge_message(plane: &mut Plane, msg: &AdsbMessage, timestamp: f64) -> bool {
    match msg {
        AdsbMessage::Position(pos) => merge_position(plane, pos, timestamp),
        AdsbMessage::Velocity(vel) => {
            merge_velocity(plane, vel);
            true
        }
        AdsbMessage::Identification(id) => plane.set_identification(&id.callsign),
        AdsbMessage::TargetState => {
            let level = plane.level.at_least_level1();
            set_level(plane, level)
        }
        AdsbMessage::OperationalStatus(status) => {
            merge_status(plane, status);
            true
        }
    }
}

fn merge_position(plane: &mut Plane, pos: &PositionMsg, timestamp: f64) -> bool {
    plane.nic = Some(pos.nic);

    // Surface legs use a different zone size; airborne legs only
    if pos.surface {
        return false;
    }

    plane.store_leg(
        pos.parity,
        CprLeg {
            lat: pos.lat_cpr,
            lon: pos.lon_cpr,
            timestamp,
        },
    );
    if let Some(alt) = pos.altitude_ft {
        plane.altitude_ft = alt;
    }
    true
}

fn merge_velocity(plane: &mut Plane, vel: &VelocityMsg) {
    (plane.air_speed, plane.air_speed_valid) = match vel.speed_kts {
        Some(speed) => (speed, true),
        None => (0, false),
    };
    (plane.vertical_rate, plane.vertical_rate_valid) = match vel.vertical_rate_fpm {
        Some(rate) => (rate, true),
        None => (0, false),
    };
}

fn merge_status(plane: &mut Plane, status: &OperationalStatusMsg) {
    plane.level = AdsbLevel::from_version(status.version);
    if status.version >= 1 {
        plane.nic_supplement_a = status.nic_supplement_a;
    }
    if status.version >= 2 && status.surface {
        plane.nic_supplement_c = status.nic_supplement_c;
    }
}

fn set_level(plane: &mut Plane, level: AdsbLevel) -> bool {
    let changed = plane.level != level;
    plane.level = level;
    changed
}

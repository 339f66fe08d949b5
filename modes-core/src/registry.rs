//! Registry of observed planes, keyed by transponder address.
//!
//! Single-threaded by contract: the registry takes `&mut self` and has no
//! internal locking. Exactly one ingestion task owns it; if several feeds
//! are ever combined they must be funneled through that task.

use std::collections::HashMap;

use crate::plane::{AdsbLevel, Plane};
use crate::types::IcaoAddress;

/// At most one [`Plane`] per address. Records are created lazily on first
/// observation and only removed by an explicit [`prune_stale`] sweep.
///
/// [`prune_stale`]: PlaneRegistry::prune_stale
#[derive(Debug)]
pub struct PlaneRegistry {
    planes: HashMap<IcaoAddress, Plane>,
    default_level: AdsbLevel,
}

impl PlaneRegistry {
    /// `default_level` is the compliance level assumed for new planes.
    pub fn new(default_level: AdsbLevel) -> Self {
        PlaneRegistry {
            planes: HashMap::new(),
            default_level,
        }
    }

    pub fn default_level(&self) -> AdsbLevel {
        self.default_level
    }

    /// Get the record for `address`, creating it if needed.
    ///
    /// An existing record has its last-seen time refreshed to `timestamp`;
    /// a new one starts with first-seen = last-seen = `timestamp`.
    pub fn checkout(&mut self, timestamp: f64, address: IcaoAddress) -> &mut Plane {
        let default_level = self.default_level;
        let plane = self
            .planes
            .entry(address)
            .or_insert_with(|| Plane::new(address, default_level, timestamp));
        plane.last_seen = timestamp;
        plane
    }

    pub fn get(&self, address: &IcaoAddress) -> Option<&Plane> {
        self.planes.get(address)
    }

    pub fn contains(&self, address: &IcaoAddress) -> bool {
        self.planes.contains_key(address)
    }

    pub fn len(&self) -> usize {
        self.planes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.planes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Plane> {
        self.planes.values()
    }

    /// Remove planes silent for longer than `max_age` seconds. Returns count removed.
    pub fn prune_stale(&mut self, now: f64, max_age: f64) -> usize {
        let before = self.planes.len();
        self.planes.retain(|_, plane| plane.age(now) <= max_age);
        let removed = before - self.planes.len();
        if removed > 0 {
            tracing::debug!(removed, remaining = self.planes.len(), "pruned stale planes");
        }
        removed
    }
}

impl Default for PlaneRegistry {
    fn default() -> Self {
        PlaneRegistry::new(AdsbLevel::Level0OrMore)
    }
}

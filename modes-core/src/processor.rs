//! Feed line → registry update → snapshot.
//!
//! Pure logic, no I/O: the caller reads lines from wherever they come from
//! and publishes the returned snapshots.

use crate::frame::{AddressSource, Frame};
use crate::line::parse_line;
use crate::merge::merge_message;
use crate::message::decode;
use crate::plane::PlaneSnapshot;
use crate::registry::PlaneRegistry;
use crate::types::{ModesError, Result};

/// Running counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessorStats {
    pub lines: u64,
    pub frames: u64,
    pub messages: u64,
    pub updates: u64,
    pub rejected: u64,
}

/// Owns the registry and applies one feed line at a time.
pub struct LineProcessor {
    registry: PlaneRegistry,
    reference: Option<(f64, f64)>,
    stats: ProcessorStats,
}

impl LineProcessor {
    pub fn new(registry: PlaneRegistry) -> Self {
        LineProcessor {
            registry,
            reference: None,
            stats: ProcessorStats::default(),
        }
    }

    /// Reference point used for ground distances in plane summaries.
    pub fn with_reference(mut self, reference: Option<(f64, f64)>) -> Self {
        self.reference = reference;
        self
    }

    pub fn registry(&self) -> &PlaneRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut PlaneRegistry {
        &mut self.registry
    }

    pub fn stats(&self) -> ProcessorStats {
        self.stats
    }

    /// Process one line captured at `timestamp`.
    ///
    /// Returns the plane's snapshot when the line changed something viewers
    /// see, `Ok(None)` when it was valid but not worth publishing, and an
    /// error when the line was discarded.
    pub fn process_line(&mut self, line: &str, timestamp: f64) -> Result<Option<PlaneSnapshot>> {
        self.stats.lines += 1;
        let result = self.apply(line, timestamp);
        if result.is_err() {
            self.stats.rejected += 1;
        }
        result
    }

    fn apply(&mut self, line: &str, timestamp: f64) -> Result<Option<PlaneSnapshot>> {
        let feed = parse_line(line)?;
        let frame = Frame::parse(feed.frame)?;

        if frame.source == AddressSource::Residual && !self.registry.contains(&frame.address) {
            return Err(ModesError::UnknownResidualAddress(frame.address));
        }
        self.stats.frames += 1;

        // Every valid frame refreshes last-seen, whatever its content
        let plane = self.registry.checkout(timestamp, frame.address);

        let Some(msg) = decode(&frame, &plane.decode_context()) else {
            return Ok(None);
        };
        self.stats.messages += 1;

        if !merge_message(plane, &msg, timestamp) {
            return Ok(None);
        }
        self.stats.updates += 1;

        tracing::debug!("{}", plane.summary(self.reference));
        Ok(Some(plane.snapshot()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plane::AdsbLevel;
    use crate::test_support::{to_hex, with_parity};
    use crate::types::IcaoAddress;

    const KLM_IDENT: &str = "*8D4840D6202CC371C32CE0576098;1D5D32D0;0A;32AB;";
    const EVEN: &str = "*8D40621D58C382D690C8AC2863A7;";
    const ODD: &str = "*8D40621D58C386435CC412692AD6;";

    fn processor() -> LineProcessor {
        LineProcessor::new(PlaneRegistry::new(AdsbLevel::Level2))
    }

    fn df4_line(address: u32) -> String {
        to_hex(&with_parity(vec![0x20, 0x00, 0x17, 0x18], address))
    }

    #[test]
    fn test_identification_published_once() {
        let mut p = processor();

        let snap = p.process_line(KLM_IDENT, 1.0).unwrap().unwrap();
        assert_eq!(snap.address.to_string(), "4840D6");
        assert_eq!(snap.identification, "KLM1023");

        assert!(p.process_line(KLM_IDENT, 2.0).unwrap().is_none());
        let plane = p.registry().get(&IcaoAddress::new(0x4840D6)).unwrap();
        assert_eq!(plane.last_seen, 2.0);
        assert_eq!(plane.first_seen, 1.0);
    }

    #[test]
    fn test_position_pair() {
        let mut p = processor();

        let first = p.process_line(EVEN, 100.0).unwrap().unwrap();
        assert_eq!(first.altitude, 38000);
        assert_eq!((first.latitude, first.longitude), (0.0, 0.0));

        let second = p.process_line(ODD, 105.0).unwrap().unwrap();
        assert!((second.latitude - 52.2658).abs() < 0.001);
        assert!((second.longitude - 3.9389).abs() < 0.001);
    }

    #[test]
    fn test_malformed_line_rejected() {
        let mut p = processor();
        assert!(p.process_line("not a frame", 1.0).is_err());
        assert!(p.process_line("*8D4840D6202CC371C32CE0576099;", 1.0).is_err());
        assert!(p.process_line("", 1.0).is_err());

        let stats = p.stats();
        assert_eq!(stats.lines, 3);
        assert_eq!(stats.rejected, 3);
        assert_eq!(stats.frames, 0);
        assert!(p.registry().is_empty());
    }

    #[test]
    fn test_residual_address_needs_known_plane() {
        let mut p = processor();
        let line = df4_line(0x4840D6);

        assert!(matches!(
            p.process_line(&line, 1.0),
            Err(ModesError::UnknownResidualAddress(_))
        ));
        assert!(p.registry().is_empty());

        p.process_line(KLM_IDENT, 2.0).unwrap();
        assert!(p.process_line(&line, 3.0).unwrap().is_none());
        let plane = p.registry().get(&IcaoAddress::new(0x4840D6)).unwrap();
        assert_eq!(plane.last_seen, 3.0);
    }

    #[test]
    fn test_df11_creates_plane_without_update() {
        let mut p = processor();
        let line = to_hex(&with_parity(vec![0x5D, 0x48, 0x40, 0xD6], 0));
        assert!(p.process_line(&line, 1.0).unwrap().is_none());
        assert!(p.registry().contains(&IcaoAddress::new(0x4840D6)));
    }

    #[test]
    fn test_counters() {
        let mut p = processor().with_reference(Some((52.0, 4.0)));
        p.process_line(KLM_IDENT, 1.0).unwrap();
        p.process_line(KLM_IDENT, 2.0).unwrap();
        p.process_line(EVEN, 3.0).unwrap();

        assert_eq!(
            p.stats(),
            ProcessorStats {
                lines: 3,
                frames: 3,
                messages: 3,
                updates: 2,
                rejected: 0,
            }
        );
    }
}

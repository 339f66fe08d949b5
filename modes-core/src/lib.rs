//! modes-core: Mode S / ADS-B decoding and the live plane registry.
//!
//! No async, no I/O: algorithms and state only. The `modes-viewer` binary
//! feeds lines in and fans the resulting snapshots out to viewers.

pub mod cpr;
pub mod crc;
pub mod frame;
pub mod line;
pub mod merge;
pub mod message;
pub mod plane;
pub mod processor;
pub mod registry;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types at crate root
pub use frame::Frame;
pub use message::{decode, AdsbMessage, DecodeContext};
pub use plane::{AdsbLevel, Plane, PlaneSnapshot};
pub use processor::{LineProcessor, ProcessorStats};
pub use registry::PlaneRegistry;
pub use types::*;

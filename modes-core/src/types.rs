//! Shared types, error enum and hex helpers for modes-core.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};
use thiserror::Error;

/// All errors produced by modes-core.
#[derive(Debug, Error)]
pub enum ModesError {
    #[error("not a hex frame: {0:?}")]
    InvalidHex(String),
    #[error("frame is {actual} bits, downlink format needs {expected}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("downlink format {0} not handled")]
    UnknownDf(u8),
    #[error("CRC validation failed (residual {0:06X})")]
    CrcFailed(u32),
    #[error("address {0} recovered from CRC residual is not a known plane")]
    UnknownResidualAddress(IcaoAddress),
    #[error("unsupported feed line: {0:?}")]
    UnsupportedLine(String),
    #[error("bad setting: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ModesError>;

// ---------------------------------------------------------------------------
// Downlink formats
// ---------------------------------------------------------------------------

/// Name and frame length of a downlink format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DfInfo {
    pub name: &'static str,
    pub bits: usize,
}

const fn df(name: &'static str, bits: usize) -> DfInfo {
    DfInfo { name, bits }
}

/// Downlink formats accepted by the frame parser.
pub const DF_TABLE: &[(u8, DfInfo)] = &[
    (0, df("Short air-air surveillance", 56)),
    (4, df("Surveillance altitude reply", 56)),
    (5, df("Surveillance identity reply", 56)),
    (11, df("All-call reply", 56)),
    (16, df("Long air-air surveillance", 112)),
    (17, df("ADS-B extended squitter", 112)),
    (18, df("Extended squitter / non-transponder", 112)),
    (20, df("Comm-B altitude reply", 112)),
    (21, df("Comm-B identity reply", 112)),
];

pub fn df_info(df: u8) -> Option<&'static DfInfo> {
    DF_TABLE
        .iter()
        .find_map(|(known, info)| (*known == df).then_some(info))
}

// ---------------------------------------------------------------------------
// ICAO address
// ---------------------------------------------------------------------------

/// 24-bit transponder address, unique per aircraft.
///
/// Serialized as the usual 6-char uppercase hex string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IcaoAddress(u32);

impl IcaoAddress {
    pub const fn new(value: u32) -> Self {
        IcaoAddress(value & 0xFF_FFFF)
    }

    pub fn from_bytes(bytes: [u8; 3]) -> Self {
        IcaoAddress(((bytes[0] as u32) << 16) | ((bytes[1] as u32) << 8) | bytes[2] as u32)
    }

    pub const fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for IcaoAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06X}", self.0)
    }
}

impl FromStr for IcaoAddress {
    type Err = ModesError;

    fn from_str(s: &str) -> Result<Self> {
        if s.len() != 6 {
            return Err(ModesError::InvalidHex(s.to_string()));
        }
        u32::from_str_radix(s, 16)
            .map(IcaoAddress::new)
            .map_err(|_| ModesError::InvalidHex(s.to_string()))
    }
}

impl Serialize for IcaoAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ---------------------------------------------------------------------------
// Hex
// ---------------------------------------------------------------------------

/// Bytes from a hex string, either case. `None` on odd length or a non-hex
/// character.
pub fn hex_decode(hex: &str) -> Option<Vec<u8>> {
    let digits: Option<Vec<u8>> = hex
        .trim()
        .chars()
        .map(|c| c.to_digit(16).map(|d| d as u8))
        .collect();
    let digits = digits?;
    if digits.len() % 2 != 0 {
        return None;
    }
    Some(digits.chunks(2).map(|p| (p[0] << 4) | p[1]).collect())
}

/// ADS-B character set for callsign encoding (6 bits per character).
pub const CALLSIGN_CHARSET: &[u8; 64] =
    b"#ABCDEFGHIJKLMNOPQRSTUVWXYZ##### ###############0123456789######";

//! Parse raw Mode S bytes into validated frames.
//!
//! Responsibilities:
//! - Classify Downlink Format (DF) from the first 5 bits
//! - Check the length against the DF
//! - Validate parity and resolve the aircraft address, either announced in
//!   bytes 1-3 (DF11/17/18) or recovered from the CRC residual

use crate::crc;
use crate::types::{df_info, hex_decode, IcaoAddress, ModesError, Result};

/// Mask of the interrogator identifier a DF11 reply may leave in its parity.
const DF11_INTERROGATOR_MASK: u32 = 0x7F;

/// Where the frame's address came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressSource {
    /// Transmitted in clear and covered by a zero parity residual.
    Announced,
    /// Recovered from the parity residual. Noise produces such addresses too,
    /// so callers should only trust ones they have already seen announced.
    Residual,
}

/// A parity-checked Mode S frame.
#[derive(Debug, Clone)]
pub struct Frame {
    pub df: u8,
    pub address: IcaoAddress,
    pub source: AddressSource,
    pub raw: Vec<u8>,
}

impl Frame {
    /// Validate raw frame bytes.
    pub fn parse(raw: Vec<u8>) -> Result<Frame> {
        let actual = raw.len() * 8;
        if actual != 56 && actual != 112 {
            return Err(ModesError::InvalidLength {
                expected: if actual < 56 { 56 } else { 112 },
                actual,
            });
        }

        let df = (raw[0] >> 3) & 0x1F;
        let info = df_info(df).ok_or(ModesError::UnknownDf(df))?;
        if actual != info.bits {
            return Err(ModesError::InvalidLength {
                expected: info.bits,
                actual,
            });
        }

        let residual = crc::residual(&raw);
        let (address, source) = match df {
            11 => {
                if residual & !DF11_INTERROGATOR_MASK != 0 {
                    return Err(ModesError::CrcFailed(residual));
                }
                (announced(&raw), AddressSource::Announced)
            }
            17 | 18 => {
                if residual != 0 {
                    return Err(ModesError::CrcFailed(residual));
                }
                (announced(&raw), AddressSource::Announced)
            }
            _ => (IcaoAddress::new(residual), AddressSource::Residual),
        };

        Ok(Frame {
            df,
            address,
            source,
            raw,
        })
    }

    /// Decode a hex string, then validate it.
    pub fn from_hex(hex: &str) -> Result<Frame> {
        let raw = hex_decode(hex).ok_or_else(|| ModesError::InvalidHex(hex.to_string()))?;
        Frame::parse(raw)
    }

    pub fn df_name(&self) -> &'static str {
        df_info(self.df).map(|info| info.name).unwrap_or("Unknown")
    }

    /// Low 3 bits of the first byte: capability (DF11/17) or control field (DF18).
    pub fn first_field(&self) -> u8 {
        self.raw[0] & 0x07
    }

    /// The 56-bit extended squitter payload (ME field) of DF17/18 frames,
    /// right-aligned in a u64.
    pub fn me(&self) -> Option<u64> {
        if !matches!(self.df, 17 | 18) || self.raw.len() < 11 {
            return None;
        }
        Some(self.raw[4..11].iter().fold(0u64, |acc, &b| (acc << 8) | b as u64))
    }

    /// ADS-B Type Code (first 5 bits of ME). None for non-squitters.
    pub fn type_code(&self) -> Option<u8> {
        self.me().map(|me| (me >> 51) as u8 & 0x1F)
    }
}

fn announced(raw: &[u8]) -> IcaoAddress {
    IcaoAddress::from_bytes([raw[1], raw[2], raw[3]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::with_parity;

    #[test]
    fn test_parse_df17_identification() {
        let frame = Frame::from_hex("8D4840D6202CC371C32CE0576098").unwrap();
        assert_eq!(frame.df, 17);
        assert_eq!(frame.address.to_string(), "4840D6");
        assert_eq!(frame.source, AddressSource::Announced);
        assert_eq!(frame.type_code(), Some(4));
        assert_eq!(frame.df_name(), "ADS-B extended squitter");
    }

    #[test]
    fn test_parse_df17_velocity_type_code() {
        let frame = Frame::from_hex("8D485020994409940838175B284F").unwrap();
        assert_eq!(frame.type_code(), Some(19));
    }

    #[test]
    fn test_parse_rejects_bad_crc() {
        let err = Frame::from_hex("8D4840D6202CC371C32CE0576099").unwrap_err();
        assert!(matches!(err, ModesError::CrcFailed(_)));
    }

    #[test]
    fn test_parse_invalid_length() {
        assert!(matches!(
            Frame::from_hex("8D4840D6"),
            Err(ModesError::InvalidLength { .. })
        ));
        // DF17 announced as a short frame
        assert!(matches!(
            Frame::from_hex("8D4840D6202CC3"),
            Err(ModesError::InvalidLength { expected: 112, actual: 56 })
        ));
    }

    #[test]
    fn test_parse_invalid_hex() {
        assert!(matches!(
            Frame::from_hex("ZZZZZZZZZZZZZZ"),
            Err(ModesError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_parse_unknown_df() {
        // DF 3 is not assigned
        let raw = with_parity(vec![0x18, 0, 0, 0], 0);
        assert!(matches!(Frame::parse(raw), Err(ModesError::UnknownDf(3))));
    }

    #[test]
    fn test_parse_df11_with_interrogator_code() {
        let raw = with_parity(vec![0x5D, 0x48, 0x40, 0xD6], 0x05);
        let frame = Frame::parse(raw).unwrap();
        assert_eq!(frame.df, 11);
        assert_eq!(frame.address, IcaoAddress::new(0x4840D6));
        assert_eq!(frame.source, AddressSource::Announced);
        assert_eq!(frame.me(), None);
    }

    #[test]
    fn test_parse_df4_residual_address() {
        let raw = with_parity(vec![0x20, 0x00, 0x17, 0x18], 0x40621D);
        let frame = Frame::parse(raw).unwrap();
        assert_eq!(frame.df, 4);
        assert_eq!(frame.address, IcaoAddress::new(0x40621D));
        assert_eq!(frame.source, AddressSource::Residual);
        assert_eq!(frame.type_code(), None);
    }
}

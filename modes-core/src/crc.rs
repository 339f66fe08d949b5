//! CRC-24 parity for Mode S messages.
//!
//! Generator polynomial 0xFFF409. The last 24 bits of every frame carry the
//! parity field: for DF11/17/18 the remainder over the whole frame is zero
//! (DF11 may leave the interrogator code in the low 7 bits); for
//! DF0/4/5/16/20/21 the remainder is the aircraft address.

const GENERATOR: u32 = 0xFFF409;

const fn build_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u32) << 16;
        let mut bit = 0;
        while bit < 8 {
            if crc & 0x80_0000 != 0 {
                crc = (crc << 1) ^ GENERATOR;
            } else {
                crc <<= 1;
            }
            crc &= 0xFF_FFFF;
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

static TABLE: [u32; 256] = build_table();

/// Polynomial division over every byte of `data`.
pub fn checksum(data: &[u8]) -> u32 {
    data.iter().fold(0u32, |crc, &byte| {
        ((crc << 8) ^ TABLE[(((crc >> 16) ^ byte as u32) & 0xFF) as usize]) & 0xFF_FFFF
    })
}

/// Residual of a full frame: checksum of the payload XORed with the parity field.
///
/// Zero for a clean DF17/18 frame, the address for DF0/4/5/16/20/21.
pub fn residual(frame: &[u8]) -> u32 {
    if frame.len() <= 3 {
        return 0;
    }
    let split = frame.len() - 3;
    let parity =
        (frame[split] as u32) << 16 | (frame[split + 1] as u32) << 8 | frame[split + 2] as u32;
    checksum(&frame[..split]) ^ parity
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::hex_decode;

    #[test]
    fn test_valid_df17_has_zero_residual() {
        for hex in [
            "8D4840D6202CC371C32CE0576098",
            "8D40621D58C382D690C8AC2863A7",
            "8D485020994409940838175B284F",
        ] {
            let data = hex_decode(hex).unwrap();
            assert_eq!(residual(&data), 0, "{hex}");
        }
    }

    #[test]
    fn test_corrupted_frame_has_nonzero_residual() {
        let mut data = hex_decode("8D4840D6202CC371C32CE0576098").unwrap();
        data[6] ^= 0x10;
        assert_ne!(residual(&data), 0);
    }

    #[test]
    fn test_residual_recovers_address() {
        // Build a DF4 frame whose parity field is CRC XOR address.
        let mut data = vec![0x20, 0x00, 0x17, 0x18];
        let parity = checksum(&data) ^ 0x4840D6;
        data.extend_from_slice(&[(parity >> 16) as u8, (parity >> 8) as u8, parity as u8]);
        assert_eq!(residual(&data), 0x4840D6);
    }

    #[test]
    fn test_short_input() {
        assert_eq!(residual(&[0x01, 0x02]), 0);
    }
}

//! Frame builders for unit tests.

use crate::crc::checksum;

/// Append a parity field so the frame residual equals `residual`.
pub fn with_parity(mut payload: Vec<u8>, residual: u32) -> Vec<u8> {
    let parity = checksum(&payload) ^ residual;
    payload.extend_from_slice(&[(parity >> 16) as u8, (parity >> 8) as u8, parity as u8]);
    payload
}

/// A clean DF17 frame carrying the given 56-bit ME field.
pub fn squitter(address: u32, me: u64) -> Vec<u8> {
    let mut payload = vec![0x8D, (address >> 16) as u8, (address >> 8) as u8, address as u8];
    payload.extend_from_slice(&me.to_be_bytes()[1..]);
    with_parity(payload, 0)
}

pub fn to_hex(data: &[u8]) -> String {
    data.iter().map(|b| format!("{b:02X}")).collect()
}

/// Place `value` at ME bits `start..start + len` (1-indexed from the MSB).
pub fn me_field(start: u32, len: u32, value: u64) -> u64 {
    value << (57 - start - len)
}

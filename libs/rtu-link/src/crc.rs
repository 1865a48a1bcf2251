//! CRC-16 checksum engine (RTU standard)
//!
//! Reflected polynomial 0xA001, seed 0xFFFF, no final XOR. The 256-entry
//! lookup table is generated at compile time so each byte costs one shift,
//! one XOR and one table load.

use crate::constants::CRC_LEN;

/// Reflected form of the 0x8005 generator polynomial
pub const POLYNOMIAL: u16 = 0xA001;

/// Initial register value; also the checksum of an empty input
pub const SEED: u16 = 0xFFFF;

/// Precomputed per-byte remainders
pub static CRC16_TABLE: [u16; 256] = build_table();

const fn build_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u16;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ POLYNOMIAL
            } else {
                crc >> 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// Calculate the CRC-16 of `data`
#[inline]
pub fn checksum(data: &[u8]) -> u16 {
    data.iter().fold(SEED, |crc, &byte| {
        (crc >> 8) ^ CRC16_TABLE[usize::from((crc ^ u16::from(byte)) as u8)]
    })
}

/// Append the checksum of `frame` low byte first
pub fn append_checksum(frame: &mut Vec<u8>) {
    let crc = checksum(frame);
    frame.extend_from_slice(&crc.to_le_bytes());
}

/// Read the trailing checksum of a complete frame (low byte first)
///
/// Returns `None` when the frame is too short to carry one.
#[inline]
pub fn trailing_checksum(frame: &[u8]) -> Option<u16> {
    let len = frame.len();
    if len < CRC_LEN {
        return None;
    }
    Some(u16::from_le_bytes([frame[len - 2], frame[len - 1]]))
}

/// Check that the last two bytes of `frame` match the checksum of the rest
pub fn verify_checksum(frame: &[u8]) -> bool {
    match trailing_checksum(frame) {
        Some(received) => checksum(&frame[..frame.len() - CRC_LEN]) == received,
        None => false,
    }
}

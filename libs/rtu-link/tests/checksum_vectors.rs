//! Checksum engine against an independent CRC-16/MODBUS implementation

#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

use crc::{Crc, CRC_16_MODBUS};
use rtu_link::crc::{append_checksum, verify_checksum};
use rtu_link::{build_frame, checksum};

const REFERENCE: Crc<u16> = Crc::<u16>::new(&CRC_16_MODBUS);

#[test]
fn test_catalogue_check_value() {
    assert_eq!(REFERENCE.checksum(b"123456789"), 0x4B37);
    assert_eq!(checksum(b"123456789"), 0x4B37);
}

#[test]
fn test_matches_reference_for_all_prefix_lengths() {
    // Deterministic pseudo-random bytes (LCG)
    let mut state: u32 = 0x1234_5678;
    let data: Vec<u8> = (0..300)
        .map(|_| {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            (state >> 16) as u8
        })
        .collect();

    for len in 0..=data.len() {
        let slice = &data[..len];
        assert_eq!(checksum(slice), REFERENCE.checksum(slice), "len {len}");
    }
}

#[test]
fn test_matches_reference_for_single_bytes() {
    for byte in 0..=255u8 {
        assert_eq!(checksum(&[byte]), REFERENCE.checksum(&[byte]));
    }
}

#[test]
fn test_empty_input_is_seed() {
    assert_eq!(checksum(&[]), 0xFFFF);
    assert_eq!(REFERENCE.checksum(&[]), 0xFFFF);
}

#[test]
fn test_known_frames() {
    let frames: [&[u8]; 6] = [
        &[0x01, 0x03, 0x00, 0x00, 0x00, 0x02, 0xC4, 0x0B],
        &[0x01, 0x03, 0x04, 0x00, 0x14, 0x00, 0x50, 0xBA, 0x0B],
        &[0x01, 0x06, 0x00, 0x03, 0x00, 0x64, 0x78, 0x21],
        &[0x01, 0x83, 0x02, 0xC0, 0xF1],
        &[0x01, 0x10, 0x00, 0x00, 0x00, 0x02, 0x41, 0xC8],
        &[0x01, 0x10, 0x00, 0x00, 0x00, 0x02, 0x04, 0x00, 0x0A, 0x01, 0x02, 0x53, 0xFC],
    ];

    for frame in frames {
        assert!(verify_checksum(frame), "{frame:02X?}");
        let body = &frame[..frame.len() - 2];
        assert_eq!(
            checksum(body).to_le_bytes(),
            REFERENCE.checksum(body).to_le_bytes()
        );

        let mut rebuilt = body.to_vec();
        append_checksum(&mut rebuilt);
        assert_eq!(rebuilt, frame);
    }
}

#[test]
fn test_built_frames_verify_against_reference() {
    for slave in [1u8, 17, 247] {
        let frame = build_frame(slave, 0x10, &[0x00, 0x01, 0x00, 0x01, 0x02, 0xAB, 0xCD]).unwrap();
        let bytes = frame.as_slice();
        let body = &bytes[..bytes.len() - 2];
        let expected = REFERENCE.checksum(body).to_le_bytes();
        assert_eq!(&bytes[bytes.len() - 2..], &expected);
    }
}

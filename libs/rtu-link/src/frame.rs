//! RTU frame codec
//!
//! ```text
//! [slave_addr:1][function_code:1][payload:N][crc_lo:1][crc_hi:1]
//! ```
//!
//! Frames are assembled in a fixed [`MAX_FRAME_SIZE`] buffer; building one that
//! would not fit is an error rather than a truncation.

use tracing::debug;

use crate::constants::{
    is_valid_slave_address, CRC_LEN, EXCEPTION_FLAG, HEADER_LEN, MAX_FRAME_SIZE, MAX_PAYLOAD_LEN,
    MIN_FRAME_LEN,
};
use crate::crc::{checksum, trailing_checksum};
use crate::error::{Result, RtuError};

/// Complete frame in a bounded stack buffer
#[derive(Clone)]
pub struct RtuFrame {
    data: [u8; MAX_FRAME_SIZE],
    len: usize,
}

impl RtuFrame {
    /// Wire bytes, CRC included
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn address(&self) -> u8 {
        self.data[0]
    }

    #[inline]
    pub fn function_code(&self) -> u8 {
        self.data[1]
    }

    /// Bytes between header and CRC
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.data[HEADER_LEN..self.len - CRC_LEN]
    }
}

impl std::fmt::Debug for RtuFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RtuFrame({:02X?})", self.as_slice())
    }
}

impl AsRef<[u8]> for RtuFrame {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

/// Build `[addr][fc][payload][crc_lo][crc_hi]`
pub fn build_frame(slave_address: u8, function_code: u8, payload: &[u8]) -> Result<RtuFrame> {
    if !is_valid_slave_address(slave_address) {
        return Err(RtuError::InvalidAddress(slave_address));
    }
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(RtuError::invalid_parameter(format!(
            "frame would be {} bytes (max {})",
            HEADER_LEN + payload.len() + CRC_LEN,
            MAX_FRAME_SIZE
        )));
    }

    let mut frame = RtuFrame {
        data: [0; MAX_FRAME_SIZE],
        len: HEADER_LEN + payload.len(),
    };
    frame.data[0] = slave_address;
    frame.data[1] = function_code;
    frame.data[HEADER_LEN..frame.len].copy_from_slice(payload);

    let crc = checksum(&frame.data[..frame.len]);
    frame.data[frame.len..frame.len + CRC_LEN].copy_from_slice(&crc.to_le_bytes());
    frame.len += CRC_LEN;

    debug!(
        "Building RTU frame: unit_id={}, FC={:02X}, payload_len={}, CRC={:04X}",
        slave_address,
        function_code,
        payload.len(),
        crc
    );

    Ok(frame)
}

/// Build an exception reply `[addr][fc|0x80][code][crc]`
pub fn build_exception_frame(slave_address: u8, function_code: u8, code: u8) -> Result<RtuFrame> {
    build_frame(slave_address, function_code | EXCEPTION_FLAG, &[code])
}

/// Check the trailing CRC of a complete frame
pub fn verify_frame(frame: &[u8]) -> Result<()> {
    let received = trailing_checksum(frame).ok_or_else(|| {
        RtuError::invalid_response(format!("frame too short: {} bytes", frame.len()))
    })?;
    let expected = checksum(&frame[..frame.len() - CRC_LEN]);
    if received != expected {
        debug!(
            "CRC mismatch: expected 0x{:04X}, got 0x{:04X}",
            expected, received
        );
        return Err(RtuError::ChecksumError { expected, received });
    }
    Ok(())
}

/// Validated response body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFrame<'a> {
    /// Function code echoed; bytes between header and CRC
    Normal { payload: &'a [u8] },
    /// `fc | 0x80` reply with its exception code
    Exception { code: u8 },
}

impl ResponseFrame<'_> {
    pub fn is_exception(&self) -> bool {
        matches!(self, ResponseFrame::Exception { .. })
    }

    /// Copy a normal payload into `buffer`, returning its length
    pub fn copy_payload(&self, buffer: &mut [u8]) -> Result<usize> {
        match self {
            ResponseFrame::Normal { payload } => {
                if buffer.len() < payload.len() {
                    return Err(RtuError::invalid_parameter(format!(
                        "buffer of {} bytes cannot hold {} byte payload",
                        buffer.len(),
                        payload.len()
                    )));
                }
                buffer[..payload.len()].copy_from_slice(payload);
                Ok(payload.len())
            },
            ResponseFrame::Exception { .. } => Ok(0),
        }
    }
}

/// Validate a response against the request that produced it
///
/// Checks run in a fixed order: length, address, CRC, exception flag,
/// function code.
pub fn parse_response(
    frame: &[u8],
    expected_address: u8,
    expected_function: u8,
) -> Result<ResponseFrame<'_>> {
    debug!("Parsing RTU frame: {} bytes", frame.len());

    if frame.len() < MIN_FRAME_LEN {
        return Err(RtuError::invalid_response(format!(
            "frame too short: {} bytes",
            frame.len()
        )));
    }

    if frame[0] != expected_address {
        return Err(RtuError::invalid_response(format!(
            "address mismatch: expected {}, got {}",
            expected_address, frame[0]
        )));
    }

    verify_frame(frame)?;

    let function_code = frame[1];
    if function_code == expected_function | EXCEPTION_FLAG {
        if frame.len() == MIN_FRAME_LEN {
            return Err(RtuError::invalid_response(
                "exception frame carries no exception code",
            ));
        }
        let code = frame[HEADER_LEN];
        debug!(
            "RTU exception: unit_id={}, FC={:02X}, code={:02X}",
            frame[0], expected_function, code
        );
        return Ok(ResponseFrame::Exception { code });
    }

    if function_code != expected_function {
        return Err(RtuError::InvalidFunctionCode(function_code));
    }

    let payload = &frame[HEADER_LEN..frame.len() - CRC_LEN];
    debug!(
        "RTU frame: unit_id={}, FC={:02X}, payload_len={}",
        frame[0],
        function_code,
        payload.len()
    );
    Ok(ResponseFrame::Normal { payload })
}

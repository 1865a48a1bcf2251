//! Bounded payload buffer
//!
//! The payload is everything between the 2-byte header and the CRC. It lives
//! in a fixed stack array sized so that header + payload + CRC never exceeds
//! [`MAX_FRAME_SIZE`](crate::constants::MAX_FRAME_SIZE).

use tracing::debug;

use crate::constants::MAX_PAYLOAD_LEN;
use crate::error::{Result, RtuError};

/// Stack-allocated frame payload
#[derive(Debug, Clone)]
pub struct Payload {
    data: [u8; MAX_PAYLOAD_LEN],
    len: usize,
}

impl Payload {
    /// Create an empty payload
    #[inline]
    pub fn new() -> Self {
        Self {
            data: [0; MAX_PAYLOAD_LEN],
            len: 0,
        }
    }

    /// Copy a byte slice into a new payload
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        let mut payload = Self::new();
        payload.extend(data)?;
        Ok(payload)
    }

    /// Push a single byte
    #[inline]
    pub fn push(&mut self, byte: u8) -> Result<()> {
        if self.len >= MAX_PAYLOAD_LEN {
            return Err(RtuError::invalid_parameter("payload buffer full"));
        }
        self.data[self.len] = byte;
        self.len += 1;
        Ok(())
    }

    /// Push u16 in big-endian
    #[inline]
    pub fn push_u16(&mut self, value: u16) -> Result<()> {
        self.extend(&value.to_be_bytes())
    }

    /// Extend with a byte slice; leaves the payload untouched on overflow
    #[inline]
    pub fn extend(&mut self, data: &[u8]) -> Result<()> {
        if self.len + data.len() > MAX_PAYLOAD_LEN {
            return Err(RtuError::invalid_parameter(format!(
                "payload would exceed max size: {} + {} > {}",
                self.len,
                data.len(),
                MAX_PAYLOAD_LEN
            )));
        }
        self.data[self.len..self.len + data.len()].copy_from_slice(data);
        self.len += data.len();
        Ok(())
    }

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
}

impl Default for Payload {
    fn default() -> Self {
        Self::new()
    }
}

/// Payload builder - fluent API
pub struct PduBuilder {
    payload: Payload,
}

impl Default for PduBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PduBuilder {
    #[inline]
    pub fn new() -> Self {
        Self {
            payload: Payload::new(),
        }
    }

    /// Add a register address
    #[inline]
    pub fn address(mut self, addr: u16) -> Result<Self> {
        self.payload.push_u16(addr)?;
        Ok(self)
    }

    /// Add a register quantity
    #[inline]
    pub fn quantity(mut self, qty: u16) -> Result<Self> {
        self.payload.push_u16(qty)?;
        Ok(self)
    }

    /// Add a single register value
    #[inline]
    pub fn value(mut self, value: u16) -> Result<Self> {
        self.payload.push_u16(value)?;
        Ok(self)
    }

    /// Add a byte
    #[inline]
    pub fn byte(mut self, b: u8) -> Result<Self> {
        self.payload.push(b)?;
        Ok(self)
    }

    /// Add register values, each high byte first
    pub fn registers(mut self, values: &[u16]) -> Result<Self> {
        if values.len() * 2 > MAX_PAYLOAD_LEN - self.payload.len() {
            return Err(RtuError::invalid_parameter(format!(
                "{} registers do not fit the remaining {} payload bytes",
                values.len(),
                MAX_PAYLOAD_LEN - self.payload.len()
            )));
        }
        for &value in values {
            self.payload.push_u16(value)?;
        }
        Ok(self)
    }

    /// Build the payload
    #[inline]
    pub fn build(self) -> Payload {
        debug!("Payload built: len={}", self.payload.len());
        self.payload
    }
}

/// Unpack big-endian registers from an even-length slice
pub fn unpack_registers(data: &[u8]) -> Result<Vec<u16>> {
    if data.len() % 2 != 0 {
        return Err(RtuError::invalid_response(format!(
            "odd register data length {}",
            data.len()
        )));
    }
    Ok(data
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect())
}

//! Blocking transport seam
//!
//! The protocol layer never touches a serial port directly. It talks to a
//! [`Transport`] that can write a frame and read an exact number of bytes,
//! each bounded by a timeout.
//!
//! # Partial reads
//!
//! `receive` either fills the whole buffer or fails. When the deadline passes
//! after only part of the requested bytes arrived, implementations return
//! [`TransportError::Timeout`] and drop what they consumed. The stream position
//! is then unspecified; call [`drain_until_idle`] before the next transaction.

use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::debug;

/// Transport-level failure
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Deadline expired before the operation completed
    #[error("operation timed out")]
    Timeout,

    /// Any other link failure (port closed, I/O error, ...)
    #[error("link error: {0}")]
    Link(String),
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => {
                TransportError::Timeout
            },
            _ => TransportError::Link(err.to_string()),
        }
    }
}

/// Blocking, half-duplex byte link
pub trait Transport {
    /// Write all of `bytes` within `timeout`
    fn transmit(&mut self, bytes: &[u8], timeout: Duration) -> Result<(), TransportError>;

    /// Fill all of `buffer` within `timeout`
    fn receive(&mut self, buffer: &mut [u8], timeout: Duration) -> Result<(), TransportError>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn transmit(&mut self, bytes: &[u8], timeout: Duration) -> Result<(), TransportError> {
        (**self).transmit(bytes, timeout)
    }

    fn receive(&mut self, buffer: &mut [u8], timeout: Duration) -> Result<(), TransportError> {
        (**self).receive(buffer, timeout)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn transmit(&mut self, bytes: &[u8], timeout: Duration) -> Result<(), TransportError> {
        (**self).transmit(bytes, timeout)
    }

    fn receive(&mut self, buffer: &mut [u8], timeout: Duration) -> Result<(), TransportError> {
        (**self).receive(buffer, timeout)
    }
}

/// Discard input until the line stays quiet for `idle`
///
/// Reads one byte at a time with `idle` as the per-byte timeout. Gives up
/// after `limit` so a chattering line cannot stall the caller forever.
/// Returns the number of bytes thrown away.
pub fn drain_until_idle<T: Transport + ?Sized>(
    transport: &mut T,
    idle: Duration,
    limit: Duration,
) -> Result<usize, TransportError> {
    let started = Instant::now();
    let mut byte = [0u8; 1];
    let mut drained = 0usize;

    while started.elapsed() < limit {
        match transport.receive(&mut byte, idle) {
            Ok(()) => drained += 1,
            Err(TransportError::Timeout) => break,
            Err(e) => return Err(e),
        }
    }

    if drained > 0 {
        debug!("Drained {} stale bytes", drained);
    }
    Ok(drained)
}

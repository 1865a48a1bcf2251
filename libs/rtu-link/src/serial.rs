//! Serial port transport
//!
//! Blocking [`Transport`] over the `serialport` crate. Reads loop until the
//! requested byte count arrives or the overall deadline passes; bytes read
//! before a timeout are dropped.

use std::io::{ErrorKind, Read, Write};
use std::thread;
use std::time::{Duration, Instant};

use serialport::{ClearBuffer, DataBits, SerialPort, StopBits};
use tracing::{debug, error, info};

use crate::config::{Parity, SerialConfig};
use crate::error::{Result, RtuError};
use crate::transport::{Transport, TransportError};

/// Pause after a read that returned no bytes
const EMPTY_READ_BACKOFF: Duration = Duration::from_millis(2);

/// Names of the serial ports visible to the OS
pub fn available_ports() -> Vec<String> {
    serialport::available_ports()
        .map(|ports| ports.into_iter().map(|p| p.port_name).collect())
        .unwrap_or_default()
}

/// Open serial line
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    name: String,
}

impl SerialTransport {
    /// Open and configure the port described by `config`
    pub fn open(config: &SerialConfig) -> Result<Self> {
        config.validate()?;
        debug!("RTU: {} @{}baud", config.port, config.baud_rate);

        let data_bits = match config.data_bits {
            5 => DataBits::Five,
            6 => DataBits::Six,
            7 => DataBits::Seven,
            _ => DataBits::Eight,
        };
        let stop_bits = match config.stop_bits {
            2 => StopBits::Two,
            _ => StopBits::One,
        };
        let parity = match config.parity {
            Parity::None => serialport::Parity::None,
            Parity::Even => serialport::Parity::Even,
            Parity::Odd => serialport::Parity::Odd,
        };

        match serialport::new(config.port.as_str(), config.baud_rate)
            .data_bits(data_bits)
            .parity(parity)
            .stop_bits(stop_bits)
            .timeout(Duration::from_millis(100))
            .open()
        {
            Ok(port) => {
                info!("RTU opened: {}", config.port);
                Ok(Self {
                    port,
                    name: config.port.clone(),
                })
            },
            Err(e) => {
                error!("RTU err: {} - {}", config.port, e);
                Err(RtuError::transport(format!(
                    "Failed to open serial port {}: {e}",
                    config.port
                )))
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Drop anything waiting in the OS input buffer
    pub fn clear_input(&mut self) -> Result<()> {
        self.port
            .clear(ClearBuffer::Input)
            .map_err(|e| RtuError::transport(format!("Serial clear error: {e}")))
    }
}

fn link_error(context: &str, e: impl std::fmt::Display) -> TransportError {
    TransportError::Link(format!("{context}: {e}"))
}

impl Transport for SerialTransport {
    fn transmit(&mut self, bytes: &[u8], timeout: Duration) -> std::result::Result<(), TransportError> {
        self.port
            .set_timeout(timeout)
            .map_err(|e| link_error("Serial timeout setup", e))?;
        self.port.write_all(bytes).map_err(|e| {
            error!("RTU TX: {}", e);
            TransportError::from(e)
        })?;
        self.port.flush().map_err(TransportError::from)?;
        debug!("RTU TX: {}B", bytes.len());
        Ok(())
    }

    fn receive(&mut self, buffer: &mut [u8], timeout: Duration) -> std::result::Result<(), TransportError> {
        let deadline = Instant::now() + timeout;
        fill_before_deadline(&mut self.port, buffer, deadline, |port, remaining| {
            port.set_timeout(remaining)
                .map_err(|e| link_error("Serial timeout setup", e))
        })?;
        debug!("RTU RX: {}B", buffer.len());
        Ok(())
    }
}

/// Read until `buffer` is full or `deadline` passes
///
/// `set_timeout` arms the reader with the time left before every read. A read
/// that returns no bytes backs off for [`EMPTY_READ_BACKOFF`] instead of
/// spinning.
fn fill_before_deadline<R, F>(
    reader: &mut R,
    buffer: &mut [u8],
    deadline: Instant,
    mut set_timeout: F,
) -> std::result::Result<(), TransportError>
where
    R: Read,
    F: FnMut(&mut R, Duration) -> std::result::Result<(), TransportError>,
{
    let mut filled = 0;

    while filled < buffer.len() {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            if filled > 0 {
                debug!("RTU RX timeout, discarding {} partial bytes", filled);
            }
            return Err(TransportError::Timeout);
        }
        set_timeout(reader, remaining)?;

        match reader.read(&mut buffer[filled..]) {
            Ok(0) => thread::sleep(EMPTY_READ_BACKOFF.min(remaining)),
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) if e.kind() == ErrorKind::TimedOut => {
                if filled > 0 {
                    debug!("RTU RX timeout, discarding {} partial bytes", filled);
                }
                return Err(TransportError::Timeout);
            },
            Err(e) => {
                error!("RTU RX: {}", e);
                return Err(TransportError::from(e));
            },
        }
    }

    Ok(())
}

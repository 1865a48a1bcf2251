//! RTU Field-Bus Protocol Stack
//!
//! Binary master/slave protocol stack for exchanging 16-bit holding registers
//! with serial peripherals over a half-duplex link.
//!
//! # Architecture
//!
//! ```text
//! rtu-link
//!     ├── crc        (table-driven CRC-16, reflected poly 0xA001)
//!     ├── frame      (RtuFrame builder / response parser)
//!     ├── function   (function-code table: lengths, encoders, decoders)
//!     ├── master     (Master transactor with retry)
//!     ├── slave      (SlaveIdentity + SlaveResponder)
//!     ├── transport  (blocking Transport trait, drain helper)
//!     └── serial     (serialport-backed Transport, feature `serial`)
//! ```
//!
//! Everything is synchronous. A transport is owned by exactly one master or
//! responder at a time, so concurrent use of a link must go through the caller.
//!
//! # Features
//!
//! - `serial` - blocking serial port transport (default)

pub mod config;
pub mod constants;
pub mod crc;
pub mod error;
pub mod frame;
pub mod function;
pub mod master;
pub mod pdu;
pub mod retry;
#[cfg(feature = "serial")]
pub mod serial;
pub mod slave;
pub mod transport;

// Re-export core types
pub use config::{
    load_config, load_config_from_file, MasterConfig, Parity, RtuConfig, SerialConfig,
    SlaveConfig,
};
pub use crc::checksum;
pub use error::{ErrorCategory, ExceptionCode, Result, RtuError};
pub use frame::{build_frame, parse_response, ResponseFrame, RtuFrame};
pub use function::{FunctionCode, Request, Response};
pub use master::Master;
pub use pdu::PduBuilder;
pub use retry::RetryPolicy;
pub use slave::{SlaveIdentity, SlaveResponder};
pub use transport::{drain_until_idle, Transport, TransportError};

#[cfg(feature = "serial")]
pub use serial::SerialTransport;

//! RTU Link Error Types
//!
//! One error enum for the whole stack, grouped into categories that decide
//! whether the master retries a failed transaction.

use std::fmt;

use thiserror::Error;

use crate::transport::TransportError;

/// Result type for rtu-link operations
pub type Result<T> = std::result::Result<T, RtuError>;

/// Broad classification of an [`RtuError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Bad caller input, detected before any I/O
    Parameter,
    /// Timeout or link failure
    Transport,
    /// Checksum mismatch or malformed/mismatched frame
    Protocol,
    /// Peer answered with a standard exception code
    Device,
    /// Configuration could not be loaded
    Configuration,
}

/// RTU link errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RtuError {
    /// Slave address outside [1, 247], or a request for another slave
    #[error("Invalid slave address: {0}")]
    InvalidAddress(u8),

    /// Bad count, oversized frame or undersized buffer
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// No complete frame before the deadline
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Link failure other than a timeout
    #[error("Transport error: {0}")]
    Transport(String),

    /// Received CRC does not match the computed one
    #[error("CRC mismatch: expected 0x{expected:04X}, got 0x{received:04X}")]
    ChecksumError { expected: u16, received: u16 },

    /// Response shape disagrees with the request
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Request frame decoded by a slave is internally inconsistent
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Function code is unexpected or unsupported
    #[error("Invalid function code: 0x{0:02X}")]
    InvalidFunctionCode(u8),

    /// Device returned an exception response
    #[error("Slave exception on FC{function:02X}: {} (code {code})", describe_code(.code))]
    Exception { function: u8, code: u8 },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

// Helper methods for creating errors
impl RtuError {
    pub fn invalid_parameter(msg: impl Into<String>) -> Self {
        RtuError::InvalidParameter(msg.into())
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        RtuError::InvalidResponse(msg.into())
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        RtuError::InvalidRequest(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        RtuError::Timeout(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        RtuError::Transport(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        RtuError::Config(msg.into())
    }

    /// Category of this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            RtuError::InvalidAddress(_) | RtuError::InvalidParameter(_) => {
                ErrorCategory::Parameter
            },
            RtuError::Timeout(_) | RtuError::Transport(_) => ErrorCategory::Transport,
            RtuError::ChecksumError { .. }
            | RtuError::InvalidResponse(_)
            | RtuError::InvalidRequest(_)
            | RtuError::InvalidFunctionCode(_) => ErrorCategory::Protocol,
            RtuError::Exception { .. } => ErrorCategory::Device,
            RtuError::Config(_) => ErrorCategory::Configuration,
        }
    }

    /// Whether another attempt may succeed
    ///
    /// Only a timeout or a corrupted frame qualifies; every other failure is
    /// a structural disagreement that a resend cannot repair.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RtuError::Timeout(_) | RtuError::ChecksumError { .. })
    }

    /// Stable identifier for logs and CLI output
    pub fn error_code(&self) -> &'static str {
        match self {
            RtuError::InvalidAddress(_) => "RTU_INVALID_ADDRESS",
            RtuError::InvalidParameter(_) => "RTU_INVALID_PARAM",
            RtuError::Timeout(_) => "RTU_TIMEOUT",
            RtuError::Transport(_) => "RTU_TRANSPORT",
            RtuError::ChecksumError { .. } => "RTU_CRC",
            RtuError::InvalidResponse(_) => "RTU_INVALID_RESPONSE",
            RtuError::InvalidRequest(_) => "RTU_INVALID_REQUEST",
            RtuError::InvalidFunctionCode(_) => "RTU_INVALID_FUNCTION",
            RtuError::Exception { .. } => "RTU_EXCEPTION",
            RtuError::Config(_) => "RTU_CONFIG",
        }
    }

    /// Exception code carried by a device exception
    pub fn exception_code(&self) -> Option<u8> {
        match self {
            RtuError::Exception { code, .. } => Some(*code),
            _ => None,
        }
    }
}

fn describe_code(code: &u8) -> &'static str {
    ExceptionCode::describe(*code)
}

impl From<TransportError> for RtuError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout => RtuError::Timeout("no complete frame before deadline".into()),
            TransportError::Link(msg) => RtuError::Transport(msg),
        }
    }
}

// ============================================================================
// Exception codes
// ============================================================================

/// Standard exception codes a slave may return
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ExceptionCode {
    IllegalFunction = 0x01,
    IllegalDataAddress = 0x02,
    IllegalDataValue = 0x03,
    SlaveDeviceFailure = 0x04,
    Acknowledge = 0x05,
    SlaveDeviceBusy = 0x06,
    NegativeAcknowledge = 0x07,
    MemoryParityError = 0x08,
}

impl ExceptionCode {
    /// All standard codes in wire order
    pub const ALL: [ExceptionCode; 8] = [
        ExceptionCode::IllegalFunction,
        ExceptionCode::IllegalDataAddress,
        ExceptionCode::IllegalDataValue,
        ExceptionCode::SlaveDeviceFailure,
        ExceptionCode::Acknowledge,
        ExceptionCode::SlaveDeviceBusy,
        ExceptionCode::NegativeAcknowledge,
        ExceptionCode::MemoryParityError,
    ];

    /// Wire value
    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Decode a wire value
    pub fn from_u8(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.code() == code)
    }

    /// Human-readable description of a raw exception code
    pub fn describe(code: u8) -> &'static str {
        match code {
            0x01 => "Illegal Function",
            0x02 => "Illegal Data Address",
            0x03 => "Illegal Data Value",
            0x04 => "Slave Device Failure",
            0x05 => "Acknowledge",
            0x06 => "Slave Device Busy",
            0x07 => "Negative Acknowledge",
            0x08 => "Memory Parity Error",
            _ => "Unknown Exception",
        }
    }
}

impl TryFrom<u8> for ExceptionCode {
    type Error = RtuError;

    fn try_from(code: u8) -> Result<Self> {
        Self::from_u8(code).ok_or_else(|| {
            RtuError::invalid_parameter(format!("unknown exception code 0x{code:02X}"))
        })
    }
}

impl From<ExceptionCode> for u8 {
    fn from(code: ExceptionCode) -> Self {
        code.code()
    }
}

impl fmt::Display for ExceptionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(Self::describe(self.code()))
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_error_retryable() {
        assert!(RtuError::timeout("t").is_retryable());
        assert!(RtuError::ChecksumError {
            expected: 1,
            received: 2
        }
        .is_retryable());

        assert!(!RtuError::InvalidAddress(0).is_retryable());
        assert!(!RtuError::invalid_parameter("count").is_retryable());
        assert!(!RtuError::transport("port closed").is_retryable());
        assert!(!RtuError::invalid_response("echo").is_retryable());
        assert!(!RtuError::InvalidFunctionCode(0x04).is_retryable());
        assert!(!RtuError::Exception {
            function: 0x03,
            code: 0x02
        }
        .is_retryable());
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(
            RtuError::InvalidAddress(248).category(),
            ErrorCategory::Parameter
        );
        assert_eq!(
            RtuError::timeout("t").category(),
            ErrorCategory::Transport
        );
        assert_eq!(
            RtuError::transport("x").category(),
            ErrorCategory::Transport
        );
        assert_eq!(
            RtuError::InvalidFunctionCode(0x04).category(),
            ErrorCategory::Protocol
        );
        assert_eq!(
            RtuError::Exception {
                function: 0x06,
                code: 0x04
            }
            .category(),
            ErrorCategory::Device
        );
        assert_eq!(RtuError::config("x").category(), ErrorCategory::Configuration);
    }

    #[test]
    fn test_exception_display_includes_description() {
        let err = RtuError::Exception {
            function: 0x03,
            code: 0x02,
        };
        let msg = err.to_string();
        assert!(msg.contains("Illegal Data Address"), "{msg}");
        assert!(msg.contains("FC03"), "{msg}");
        assert_eq!(err.exception_code(), Some(0x02));
    }

    #[test]
    fn test_checksum_error_display() {
        let err = RtuError::ChecksumError {
            expected: 0x0BBA,
            received: 0xFFFF,
        };
        assert_eq!(err.to_string(), "CRC mismatch: expected 0x0BBA, got 0xFFFF");
    }

    #[test]
    fn test_exception_code_round_trip_and_descriptions() {
        let expected = [
            (0x01, "Illegal Function"),
            (0x02, "Illegal Data Address"),
            (0x03, "Illegal Data Value"),
            (0x04, "Slave Device Failure"),
            (0x05, "Acknowledge"),
            (0x06, "Slave Device Busy"),
            (0x07, "Negative Acknowledge"),
            (0x08, "Memory Parity Error"),
        ];

        for (raw, desc) in expected {
            let code = ExceptionCode::try_from(raw).unwrap();
            assert_eq!(code.code(), raw);
            assert_eq!(code.to_string(), desc);
        }

        assert!(ExceptionCode::from_u8(0x00).is_none());
        assert!(ExceptionCode::try_from(0x0B).is_err());
        assert_eq!(ExceptionCode::describe(0x0B), "Unknown Exception");
    }

    #[test]
    fn test_error_codes_are_distinct() {
        let errors = [
            RtuError::InvalidAddress(0),
            RtuError::invalid_parameter("p"),
            RtuError::timeout("t"),
            RtuError::transport("x"),
            RtuError::ChecksumError {
                expected: 0,
                received: 1,
            },
            RtuError::invalid_response("r"),
            RtuError::invalid_request("q"),
            RtuError::InvalidFunctionCode(0x04),
            RtuError::Exception {
                function: 0x03,
                code: 0x02,
            },
            RtuError::config("c"),
        ];
        let codes: std::collections::HashSet<_> = errors.iter().map(RtuError::error_code).collect();
        assert_eq!(codes.len(), errors.len());
        assert_eq!(RtuError::timeout("t").error_code(), "RTU_TIMEOUT");
        assert_eq!(RtuError::InvalidFunctionCode(0x04).error_code(), "RTU_INVALID_FUNCTION");
    }

    #[test]
    fn test_transport_error_conversion() {
        let err: RtuError = TransportError::Timeout.into();
        assert!(matches!(err, RtuError::Timeout(_)));
        assert!(err.is_retryable());

        let err: RtuError = TransportError::Link("broken pipe".into()).into();
        assert_eq!(err, RtuError::Transport("broken pipe".into()));
        assert!(!err.is_retryable());
    }
}

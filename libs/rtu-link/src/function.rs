//! Function table
//!
//! Every supported function code has one [`FunctionLayout`] row describing its
//! frame lengths. Master and slave both size their reads from this table, and
//! [`Request`] / [`Response`] carry the encoders and decoders.
//!
//! | FC   | Request payload                          | Response payload         |
//! |------|------------------------------------------|--------------------------|
//! | 0x03 | start(2) count(2)                        | byte_count(1) data(2N)   |
//! | 0x06 | address(2) value(2)                      | echo of request          |
//! | 0x10 | start(2) count(2) byte_count(1) data(2N) | start(2) count(2)        |

use std::fmt;

use crate::constants::{
    CRC_LEN, EXCEPTION_FLAG, HEADER_LEN, MAX_FRAME_SIZE, MAX_READ_REGISTERS, MAX_WRITE_REGISTERS,
};
use crate::error::{Result, RtuError};
use crate::pdu::{unpack_registers, Payload, PduBuilder};

/// Bytes of request payload every function starts with (address/start + count/value)
pub const REQUEST_PREFIX_LEN: usize = 4;

/// Supported function codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FunctionCode {
    ReadHoldingRegisters = 0x03,
    WriteSingleRegister = 0x06,
    WriteMultipleRegisters = 0x10,
}

/// Frame length rules for one function code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionLayout {
    pub code: FunctionCode,
    pub name: &'static str,
    /// Fixed request payload bytes
    pub request_fixed: usize,
    /// Request payload bytes per register
    pub request_per_register: usize,
    /// Fixed response payload bytes
    pub response_fixed: usize,
    /// Response payload bytes per register
    pub response_per_register: usize,
    /// Allowed register count, when the count field is one
    pub max_count: Option<u16>,
}

impl FunctionLayout {
    /// Whole request frame length for `count` registers
    #[inline]
    pub fn request_frame_len(&self, count: u16) -> usize {
        HEADER_LEN + self.request_fixed + self.request_per_register * usize::from(count) + CRC_LEN
    }

    /// Whole response frame length for `count` registers
    #[inline]
    pub fn response_frame_len(&self, count: u16) -> usize {
        HEADER_LEN + self.response_fixed + self.response_per_register * usize::from(count) + CRC_LEN
    }
}

static FUNCTION_TABLE: [FunctionLayout; 3] = [
    FunctionLayout {
        code: FunctionCode::ReadHoldingRegisters,
        name: "Read Holding Registers",
        request_fixed: 4,
        request_per_register: 0,
        response_fixed: 1,
        response_per_register: 2,
        max_count: Some(MAX_READ_REGISTERS),
    },
    FunctionLayout {
        code: FunctionCode::WriteSingleRegister,
        name: "Write Single Register",
        request_fixed: 4,
        request_per_register: 0,
        response_fixed: 4,
        response_per_register: 0,
        max_count: None,
    },
    FunctionLayout {
        code: FunctionCode::WriteMultipleRegisters,
        name: "Write Multiple Registers",
        request_fixed: 5,
        request_per_register: 2,
        response_fixed: 4,
        response_per_register: 0,
        max_count: Some(MAX_WRITE_REGISTERS),
    },
];

impl FunctionCode {
    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Function code with the exception bit set
    #[inline]
    pub fn exception_code(self) -> u8 {
        self.code() | EXCEPTION_FLAG
    }

    pub fn from_u8(code: u8) -> Option<Self> {
        FUNCTION_TABLE
            .iter()
            .map(|layout| layout.code)
            .find(|fc| fc.code() == code)
    }

    /// Length rules for this function
    pub fn layout(self) -> &'static FunctionLayout {
        match self {
            FunctionCode::ReadHoldingRegisters => &FUNCTION_TABLE[0],
            FunctionCode::WriteSingleRegister => &FUNCTION_TABLE[1],
            FunctionCode::WriteMultipleRegisters => &FUNCTION_TABLE[2],
        }
    }

    pub fn name(self) -> &'static str {
        self.layout().name
    }

    /// Request bytes still to read once the header and the 4-byte prefix are in
    ///
    /// For counted writes the count in `prefix` is range-checked first so a
    /// corrupt count never drives an oversized read.
    pub fn request_tail_len(self, prefix: &[u8]) -> Result<usize> {
        if prefix.len() < REQUEST_PREFIX_LEN {
            return Err(RtuError::invalid_parameter(format!(
                "request prefix needs {} bytes, got {}",
                REQUEST_PREFIX_LEN,
                prefix.len()
            )));
        }
        let layout = self.layout();
        let count = if layout.request_per_register > 0 {
            let count = u16::from_be_bytes([prefix[2], prefix[3]]);
            check_count(layout, count)?;
            count
        } else {
            0
        };
        Ok(layout.request_frame_len(count) - HEADER_LEN - REQUEST_PREFIX_LEN)
    }
    /// Response frame length announced by the first bytes of a reply
    ///
    /// Counted replies are sized from their byte-count field (offset 2), capped
    /// at [`MAX_FRAME_SIZE`]; fixed replies from the table.
    pub fn announced_response_len(self, head: &[u8]) -> usize {
        let layout = self.layout();
        if layout.response_per_register == 0 {
            return layout.response_frame_len(0);
        }
        match head.get(HEADER_LEN) {
            Some(&byte_count) => {
                let len = HEADER_LEN + layout.response_fixed + usize::from(byte_count) + CRC_LEN;
                len.min(MAX_FRAME_SIZE)
            },
            None => layout.response_frame_len(0),
        }
    }
}

impl TryFrom<u8> for FunctionCode {
    type Error = RtuError;

    fn try_from(code: u8) -> Result<Self> {
        Self::from_u8(code).ok_or(RtuError::InvalidFunctionCode(code))
    }
}

impl From<FunctionCode> for u8 {
    fn from(fc: FunctionCode) -> Self {
        fc.code()
    }
}

impl fmt::Display for FunctionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FC{:02X} ({})", self.code(), self.name())
    }
}

fn check_count(layout: &FunctionLayout, count: u16) -> Result<()> {
    match layout.max_count {
        Some(max) if count == 0 || count > max => Err(RtuError::invalid_parameter(format!(
            "{}: register count {} outside 1..={}",
            layout.name, count, max
        ))),
        _ => Ok(()),
    }
}

fn be_u16(data: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([data[offset], data[offset + 1]])
}

// ============================================================================
// Requests
// ============================================================================

/// Decoded request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    ReadHoldingRegisters { start: u16, count: u16 },
    WriteSingleRegister { address: u16, value: u16 },
    WriteMultipleRegisters { start: u16, values: Vec<u16> },
}

impl Request {
    pub fn function_code(&self) -> FunctionCode {
        match self {
            Request::ReadHoldingRegisters { .. } => FunctionCode::ReadHoldingRegisters,
            Request::WriteSingleRegister { .. } => FunctionCode::WriteSingleRegister,
            Request::WriteMultipleRegisters { .. } => FunctionCode::WriteMultipleRegisters,
        }
    }

    /// First register touched
    pub fn address(&self) -> u16 {
        match self {
            Request::ReadHoldingRegisters { start, .. } => *start,
            Request::WriteSingleRegister { address, .. } => *address,
            Request::WriteMultipleRegisters { start, .. } => *start,
        }
    }

    /// Number of registers touched
    pub fn count(&self) -> u16 {
        match self {
            Request::ReadHoldingRegisters { count, .. } => *count,
            Request::WriteSingleRegister { .. } => 1,
            Request::WriteMultipleRegisters { values, .. } => {
                u16::try_from(values.len()).unwrap_or(u16::MAX)
            },
        }
    }

    /// Range-check the register count before any I/O
    pub fn validate(&self) -> Result<()> {
        check_count(self.function_code().layout(), self.count())
    }

    /// Request payload (between header and CRC)
    pub fn encode_payload(&self) -> Result<Payload> {
        self.validate()?;
        let payload = match self {
            Request::ReadHoldingRegisters { start, count } => {
                PduBuilder::new().address(*start)?.quantity(*count)?.build()
            },
            Request::WriteSingleRegister { address, value } => {
                PduBuilder::new().address(*address)?.value(*value)?.build()
            },
            Request::WriteMultipleRegisters { start, values } => {
                let count = self.count();
                PduBuilder::new()
                    .address(*start)?
                    .quantity(count)?
                    .byte((count * 2) as u8)?
                    .registers(values)?
                    .build()
            },
        };
        Ok(payload)
    }

    /// Length of a complete normal response frame
    pub fn expected_response_len(&self) -> usize {
        self.function_code()
            .layout()
            .response_frame_len(self.count())
    }

    /// Decode a request payload received by a slave
    pub fn decode(function: FunctionCode, payload: &[u8]) -> Result<Self> {
        let layout = function.layout();
        if payload.len() < layout.request_fixed {
            return Err(RtuError::invalid_request(format!(
                "{} payload too short: {} bytes",
                layout.name,
                payload.len()
            )));
        }

        match function {
            FunctionCode::ReadHoldingRegisters => Ok(Request::ReadHoldingRegisters {
                start: be_u16(payload, 0),
                count: be_u16(payload, 2),
            }),
            FunctionCode::WriteSingleRegister => Ok(Request::WriteSingleRegister {
                address: be_u16(payload, 0),
                value: be_u16(payload, 2),
            }),
            FunctionCode::WriteMultipleRegisters => {
                let start = be_u16(payload, 0);
                let count = be_u16(payload, 2);
                check_count(layout, count)?;

                let byte_count = usize::from(payload[4]);
                if byte_count != usize::from(count) * 2 {
                    return Err(RtuError::invalid_request(format!(
                        "byte count {} does not match {} registers",
                        byte_count, count
                    )));
                }
                let data = &payload[layout.request_fixed..];
                if data.len() != byte_count {
                    return Err(RtuError::invalid_request(format!(
                        "expected {} data bytes, got {}",
                        byte_count,
                        data.len()
                    )));
                }
                Ok(Request::WriteMultipleRegisters {
                    start,
                    values: unpack_registers(data)?,
                })
            },
        }
    }

    /// Standard acknowledgement for a write; `None` for reads
    pub fn echo(&self) -> Option<Response> {
        match self {
            Request::ReadHoldingRegisters { .. } => None,
            Request::WriteSingleRegister { address, value } => {
                Some(Response::SingleRegisterWritten {
                    address: *address,
                    value: *value,
                })
            },
            Request::WriteMultipleRegisters { start, .. } => {
                Some(Response::MultipleRegistersWritten {
                    start: *start,
                    count: self.count(),
                })
            },
        }
    }
}

// ============================================================================
// Responses
// ============================================================================

/// Decoded normal response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Registers(Vec<u16>),
    SingleRegisterWritten { address: u16, value: u16 },
    MultipleRegistersWritten { start: u16, count: u16 },
}

impl Response {
    pub fn function_code(&self) -> FunctionCode {
        match self {
            Response::Registers(_) => FunctionCode::ReadHoldingRegisters,
            Response::SingleRegisterWritten { .. } => FunctionCode::WriteSingleRegister,
            Response::MultipleRegistersWritten { .. } => FunctionCode::WriteMultipleRegisters,
        }
    }

    /// Response payload (between header and CRC)
    pub fn encode_payload(&self) -> Result<Payload> {
        let payload = match self {
            Response::Registers(values) => {
                let count = u16::try_from(values.len()).unwrap_or(u16::MAX);
                check_count(FunctionCode::ReadHoldingRegisters.layout(), count)?;
                PduBuilder::new()
                    .byte((count * 2) as u8)?
                    .registers(values)?
                    .build()
            },
            Response::SingleRegisterWritten { address, value } => {
                PduBuilder::new().address(*address)?.value(*value)?.build()
            },
            Response::MultipleRegistersWritten { start, count } => {
                PduBuilder::new().address(*start)?.quantity(*count)?.build()
            },
        };
        Ok(payload)
    }

    /// Decode and cross-check a response payload against its request
    pub fn decode(request: &Request, payload: &[u8]) -> Result<Self> {
        match request {
            Request::ReadHoldingRegisters { count, .. } => {
                let expected = usize::from(*count) * 2;
                let byte_count = payload.first().copied().map(usize::from);
                if byte_count != Some(expected) || payload.len() != 1 + expected {
                    return Err(RtuError::invalid_response(format!(
                        "byte count mismatch: expected {}, got {:?} with {} payload bytes",
                        expected,
                        byte_count,
                        payload.len()
                    )));
                }
                Ok(Response::Registers(unpack_registers(&payload[1..])?))
            },
            Request::WriteSingleRegister { address, value } => {
                let mut expected = [0u8; 4];
                expected[..2].copy_from_slice(&address.to_be_bytes());
                expected[2..].copy_from_slice(&value.to_be_bytes());
                if payload != expected {
                    return Err(RtuError::invalid_response(format!(
                        "write echo mismatch: expected {:02X?}, got {:02X?}",
                        expected, payload
                    )));
                }
                Ok(Response::SingleRegisterWritten {
                    address: *address,
                    value: *value,
                })
            },
            Request::WriteMultipleRegisters { start, .. } => {
                if payload.len() != 4 {
                    return Err(RtuError::invalid_response(format!(
                        "write multiple echo must be 4 bytes, got {}",
                        payload.len()
                    )));
                }
                let echoed_start = be_u16(payload, 0);
                let echoed_count = be_u16(payload, 2);
                let count = request.count();
                if echoed_start != *start || echoed_count != count {
                    return Err(RtuError::invalid_response(format!(
                        "write multiple echo mismatch: expected start={} count={}, got start={} count={}",
                        start, count, echoed_start, echoed_count
                    )));
                }
                Ok(Response::MultipleRegistersWritten { start: *start, count })
            },
        }
    }
}

//! Register-bank slave simulator
//!
//! Answers FC03/FC06/FC16 from an in-memory bank of holding registers. Out of
//! range access gets `IllegalDataAddress`, bad counts get `IllegalDataValue`
//! and unknown function codes get `IllegalFunction`. Corrupted frames and
//! frames for other slaves are dropped without a reply.

use std::time::Duration;

use rtu_link::{
    constants::MAX_READ_REGISTERS, drain_until_idle, ExceptionCode, FunctionCode, Request,
    Response, RtuError, SlaveIdentity, SlaveResponder, Transport,
};
use tracing::{debug, info, warn};

/// Quiet period that marks the end of a discarded frame
const DRAIN_IDLE: Duration = Duration::from_millis(20);
/// Upper bound on a single drain
const DRAIN_LIMIT: Duration = Duration::from_secs(1);

/// In-memory holding registers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterBank {
    registers: Vec<u16>,
}

impl RegisterBank {
    /// `size` registers starting at address 0, each set to `initial`
    pub fn new(size: usize, initial: u16) -> Self {
        Self {
            registers: vec![initial; size],
        }
    }

    pub fn len(&self) -> usize {
        self.registers.len()
    }

    pub fn get(&self, address: u16) -> Option<u16> {
        self.registers.get(usize::from(address)).copied()
    }

    fn range(&self, start: u16, count: u16) -> Result<std::ops::Range<usize>, ExceptionCode> {
        let start = usize::from(start);
        let end = start + usize::from(count);
        if end > self.registers.len() {
            return Err(ExceptionCode::IllegalDataAddress);
        }
        Ok(start..end)
    }

    /// Apply a request and build its reply
    pub fn handle(&mut self, request: &Request) -> Result<Response, ExceptionCode> {
        match request {
            Request::ReadHoldingRegisters { start, count } => {
                if *count == 0 || *count > MAX_READ_REGISTERS {
                    return Err(ExceptionCode::IllegalDataValue);
                }
                let range = self.range(*start, *count)?;
                Ok(Response::Registers(self.registers[range].to_vec()))
            },
            Request::WriteSingleRegister { address, value } => {
                let range = self.range(*address, 1)?;
                self.registers[range.start] = *value;
                Ok(Response::SingleRegisterWritten {
                    address: *address,
                    value: *value,
                })
            },
            Request::WriteMultipleRegisters { start, values } => {
                let range = self.range(*start, request.count())?;
                self.registers[range].copy_from_slice(values);
                Ok(Response::MultipleRegistersWritten {
                    start: *start,
                    count: request.count(),
                })
            },
        }
    }
}

/// Served request counters
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ServeStats {
    pub requests: u64,
    pub exceptions: u64,
    pub dropped: u64,
}

/// Reply owed for a request that failed to decode
fn exception_for(err: &RtuError) -> Option<(u8, ExceptionCode)> {
    match err {
        RtuError::InvalidFunctionCode(fc) => Some((*fc, ExceptionCode::IllegalFunction)),
        // Only counted writes carry a length that can be rejected while decoding
        RtuError::InvalidParameter(_) | RtuError::InvalidRequest(_) => Some((
            FunctionCode::WriteMultipleRegisters.code(),
            ExceptionCode::IllegalDataValue,
        )),
        _ => None,
    }
}

/// Serve requests until the link fails or `max_requests` frames are answered
pub fn serve<T: Transport>(
    responder: &mut SlaveResponder<T>,
    identity: &SlaveIdentity,
    bank: &mut RegisterBank,
    max_requests: Option<u64>,
) -> Result<ServeStats, RtuError> {
    let mut stats = ServeStats::default();
    info!(
        "Simulating slave {} with {} holding registers",
        identity.address(),
        bank.len()
    );

    while max_requests.map_or(true, |max| stats.requests < max) {
        match responder.process_once(identity) {
            Ok(request) => {
                stats.requests += 1;
                let function = request.function_code().code();
                match bank.handle(&request) {
                    Ok(response) => responder.send_response(identity, &response)?,
                    Err(code) => {
                        stats.exceptions += 1;
                        debug!("Rejecting {:?}: {}", request, code);
                        responder.send_exception(identity, function, code)?;
                    },
                }
            },
            Err(RtuError::Timeout(_)) => continue,
            Err(RtuError::InvalidAddress(address)) => {
                debug!("Skipping frame for slave {}", address);
                stats.dropped += 1;
                drain_until_idle(responder.transport_mut(), DRAIN_IDLE, DRAIN_LIMIT)?;
            },
            Err(e @ RtuError::Transport(_)) => return Err(e),
            Err(e) => {
                drain_until_idle(responder.transport_mut(), DRAIN_IDLE, DRAIN_LIMIT)?;
                match exception_for(&e) {
                    Some((function, code)) => {
                        warn!("Bad request: {}", e);
                        stats.requests += 1;
                        stats.exceptions += 1;
                        responder.send_exception(identity, function, code)?;
                    },
                    None => {
                        warn!("Dropping frame: {}", e);
                        stats.dropped += 1;
                    },
                }
            },
        }
    }

    Ok(stats)
}

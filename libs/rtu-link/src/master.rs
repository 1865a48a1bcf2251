//! Master transactor
//!
//! Each call runs one request/response exchange:
//! validate → build → transmit → receive → parse → decode, wrapped in the
//! configured [`RetryPolicy`](crate::retry::RetryPolicy). Nothing is kept
//! between calls.
//!
//! Responses are read in two steps. The first five bytes are enough to hold a
//! whole exception frame; when byte 1 carries the exception flag the frame is
//! complete. Otherwise the rest is sized from the reply's function code and,
//! for FC03, its byte count. An unknown function code drains the line and
//! fails without a retry.

use std::time::{Duration, Instant};

use tracing::{debug, error};

use crate::config::MasterConfig;
use crate::constants::{
    is_valid_slave_address, EXCEPTION_FLAG, EXCEPTION_FRAME_LEN, MAX_FRAME_SIZE,
};
use crate::error::{ErrorCategory, Result, RtuError};
use crate::frame::{build_frame, parse_response, ResponseFrame, RtuFrame};
use crate::function::{FunctionCode, Request, Response};
use crate::transport::{drain_until_idle, Transport};

/// Quiet period that ends the rest of an unrecognised reply
const DRAIN_IDLE: Duration = Duration::from_millis(20);

/// Blocking RTU master bound to one transport
pub struct Master<T: Transport> {
    transport: T,
    config: MasterConfig,
}

impl<T: Transport> Master<T> {
    /// Create a master with default timeout and retry settings
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, MasterConfig::default())
    }

    pub fn with_config(transport: T, config: MasterConfig) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &MasterConfig {
        &self.config
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Read `count` holding registers (FC03), `count` in 1..=125
    pub fn read_holding_registers(&mut self, slave: u8, start: u16, count: u16) -> Result<Vec<u16>> {
        match self.execute(slave, &Request::ReadHoldingRegisters { start, count })? {
            Response::Registers(values) => Ok(values),
            other => Err(unexpected(&other)),
        }
    }

    /// Write one holding register (FC06); the slave must echo the request
    pub fn write_single_register(&mut self, slave: u8, address: u16, value: u16) -> Result<()> {
        match self.execute(slave, &Request::WriteSingleRegister { address, value })? {
            Response::SingleRegisterWritten { .. } => Ok(()),
            other => Err(unexpected(&other)),
        }
    }

    /// Write consecutive holding registers (FC16), 1..=123 values
    pub fn write_multiple_registers(&mut self, slave: u8, start: u16, values: &[u16]) -> Result<()> {
        let request = Request::WriteMultipleRegisters {
            start,
            values: values.to_vec(),
        };
        match self.execute(slave, &request)? {
            Response::MultipleRegistersWritten { .. } => Ok(()),
            other => Err(unexpected(&other)),
        }
    }

    /// Run any supported request against `slave`
    ///
    /// Parameter errors surface before the transport is touched.
    pub fn execute(&mut self, slave: u8, request: &Request) -> Result<Response> {
        if !is_valid_slave_address(slave) {
            return Err(RtuError::InvalidAddress(slave));
        }
        let payload = request.encode_payload()?;
        let frame = build_frame(slave, request.function_code().code(), payload.as_slice())?;

        let timeout = self.config.timeout();
        let policy = self.config.retry_policy();
        let transport = &mut self.transport;
        let op_name = request.function_code().name();

        let result = policy.run(op_name, RtuError::is_retryable, |attempt| {
            debug!("{} to slave {}: attempt {}", op_name, slave, attempt + 1);
            exchange(transport, &frame, slave, request, timeout)
        });

        if let Err(e) = &result {
            if e.category() == ErrorCategory::Transport {
                error!("{} to slave {} failed: {}", op_name, slave, e);
            }
        }
        result
    }
}

fn unexpected(response: &Response) -> RtuError {
    RtuError::invalid_response(format!(
        "unexpected response kind for {}",
        response.function_code()
    ))
}

/// One transmit/receive round trip without retry
///
/// Both receives share one deadline of `timeout`, started after the request
/// is on the line. The remainder is sized from the reply's own header, so a
/// well-formed reply of another shape fails on its content, not on a timeout.
fn exchange<T: Transport>(
    transport: &mut T,
    frame: &RtuFrame,
    slave: u8,
    request: &Request,
    timeout: Duration,
) -> Result<Response> {
    let function = request.function_code();

    transport.transmit(frame.as_slice(), timeout)?;
    let deadline = Instant::now() + timeout;

    let mut buffer = [0u8; MAX_FRAME_SIZE];
    transport.receive(&mut buffer[..EXCEPTION_FRAME_LEN], timeout)?;

    let total = if buffer[1] & EXCEPTION_FLAG != 0 {
        EXCEPTION_FRAME_LEN
    } else {
        match FunctionCode::from_u8(buffer[1]) {
            Some(received) => {
                let announced = received.announced_response_len(&buffer[..EXCEPTION_FRAME_LEN]);
                if announced != request.expected_response_len() {
                    debug!(
                        "Reply announces {} bytes, {} expected for {}",
                        announced,
                        request.expected_response_len(),
                        function
                    );
                }
                announced
            },
            None => {
                let drained = drain_until_idle(transport, DRAIN_IDLE, timeout)?;
                debug!(
                    "Unknown FC={:02X} from slave {}, dropped {} trailing bytes",
                    buffer[1], slave, drained
                );
                return Err(RtuError::InvalidFunctionCode(buffer[1]));
            },
        }
    };
    if total > EXCEPTION_FRAME_LEN {
        let remaining = deadline.saturating_duration_since(Instant::now());
        transport.receive(&mut buffer[EXCEPTION_FRAME_LEN..total], remaining)?;
    }

    match parse_response(&buffer[..total], slave, function.code())? {
        ResponseFrame::Exception { code } => Err(RtuError::Exception {
            function: function.code(),
            code,
        }),
        ResponseFrame::Normal { payload } => Response::decode(request, payload),
    }
}

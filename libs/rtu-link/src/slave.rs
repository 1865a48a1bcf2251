//! Slave responder
//!
//! A responder reads one request frame addressed to its [`SlaveIdentity`],
//! validates it and hands the decoded [`Request`] back to the caller. It never
//! answers on its own: the caller decides between
//! [`send_response`](SlaveResponder::send_response) and
//! [`send_exception`](SlaveResponder::send_exception).
//!
//! # Address mismatch
//!
//! When the header names another slave, `process_once` returns
//! [`RtuError::InvalidAddress`] right after the 2-byte header. The rest of that
//! frame is still on the line; use
//! [`drain_until_idle`](crate::transport::drain_until_idle) before the next call.

use std::time::Duration;

use tracing::debug;

use crate::constants::{
    effective_timeout, is_valid_slave_address, CRC_LEN, DEFAULT_RETRY_DELAY, HEADER_LEN,
    MAX_FRAME_SIZE,
};
use crate::error::{ExceptionCode, Result, RtuError};
use crate::frame::{build_exception_frame, build_frame, verify_frame, RtuFrame};
use crate::function::{FunctionCode, Request, Response, REQUEST_PREFIX_LEN};
use crate::retry::RetryPolicy;
use crate::transport::Transport;

/// Validated slave settings, built once and passed by reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlaveIdentity {
    address: u8,
    timeout: Duration,
    retry_count: u8,
}

impl SlaveIdentity {
    /// `address` must be 1..=247; a zero timeout selects the default
    pub fn new(address: u8, timeout: Duration, retry_count: u8) -> Result<Self> {
        if !is_valid_slave_address(address) {
            return Err(RtuError::InvalidAddress(address));
        }
        Ok(Self {
            address,
            timeout: effective_timeout(timeout),
            retry_count,
        })
    }

    #[inline]
    pub fn address(&self) -> u8 {
        self.address
    }

    #[inline]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Extra transmit attempts when sending a reply times out
    #[inline]
    pub fn retry_count(&self) -> u8 {
        self.retry_count
    }
}

/// Blocking request reader and reply writer over one transport
pub struct SlaveResponder<T: Transport> {
    transport: T,
}

impl<T: Transport> SlaveResponder<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Receive and decode one request for `identity`
    pub fn process_once(&mut self, identity: &SlaveIdentity) -> Result<Request> {
        let timeout = identity.timeout();
        let mut frame = [0u8; MAX_FRAME_SIZE];

        self.transport.receive(&mut frame[..HEADER_LEN], timeout)?;
        if frame[0] != identity.address() {
            debug!(
                "Request for slave {} ignored (we are {})",
                frame[0],
                identity.address()
            );
            return Err(RtuError::InvalidAddress(frame[0]));
        }

        let function = FunctionCode::try_from(frame[1])?;

        let prefix_end = HEADER_LEN + REQUEST_PREFIX_LEN;
        self.transport
            .receive(&mut frame[HEADER_LEN..prefix_end], timeout)?;

        let total = prefix_end + function.request_tail_len(&frame[HEADER_LEN..prefix_end])?;
        self.transport
            .receive(&mut frame[prefix_end..total], timeout)?;

        verify_frame(&frame[..total])?;

        let request = Request::decode(function, &frame[HEADER_LEN..total - CRC_LEN])?;
        debug!(
            "Request received: unit_id={}, {}, address={}, count={}",
            identity.address(),
            function,
            request.address(),
            request.count()
        );
        Ok(request)
    }

    /// Frame and transmit a normal reply
    pub fn send_response(&mut self, identity: &SlaveIdentity, response: &Response) -> Result<()> {
        let payload = response.encode_payload()?;
        let frame = build_frame(
            identity.address(),
            response.function_code().code(),
            payload.as_slice(),
        )?;
        self.transmit(identity, &frame)
    }

    /// Transmit `[addr][fc|0x80][code][crc]`
    pub fn send_exception(
        &mut self,
        identity: &SlaveIdentity,
        function_code: u8,
        code: ExceptionCode,
    ) -> Result<()> {
        debug!(
            "Sending exception: unit_id={}, FC={:02X}, code={:02X} ({})",
            identity.address(),
            function_code,
            code.code(),
            code
        );
        let frame = build_exception_frame(identity.address(), function_code, code.code())?;
        self.transmit(identity, &frame)
    }

    fn transmit(&mut self, identity: &SlaveIdentity, frame: &RtuFrame) -> Result<()> {
        let policy = RetryPolicy::new(identity.retry_count(), DEFAULT_RETRY_DELAY);
        let timeout = identity.timeout();
        let transport = &mut self.transport;
        policy.run(
            "Reply transmit",
            |e: &RtuError| matches!(e, RtuError::Timeout(_)),
            |_| {
                transport
                    .transmit(frame.as_slice(), timeout)
                    .map_err(RtuError::from)
            },
        )
    }
}

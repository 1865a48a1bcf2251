//! Shared in-memory transports for integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

use rtu_link::{Transport, TransportError};

// ============================================================================
// Scripted transport
// ============================================================================

/// What the peer does after a frame is transmitted
#[derive(Debug, Clone)]
pub enum Reply {
    /// Put these bytes on the line
    Bytes(Vec<u8>),
    /// Stay silent
    Timeout,
    /// Fail the next receive with a link error
    LinkError(String),
}

/// Transport that answers each transmit from a script
///
/// Transmitted frames are recorded. A receive that asks for more bytes than
/// are buffered times out and drops the partial input.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    pub sent: Vec<Vec<u8>>,
    pub receive_calls: usize,
    replies: VecDeque<Reply>,
    rx: VecDeque<u8>,
    pending_error: Option<TransportError>,
    failing_transmits: usize,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue replies, one per future transmit
    pub fn with_replies(replies: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            replies: replies.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Preload bytes as if a peer had already sent them
    pub fn with_input(bytes: &[u8]) -> Self {
        let mut transport = Self::default();
        transport.rx.extend(bytes);
        transport
    }

    /// Make the next `n` transmits time out
    pub fn fail_transmits(mut self, n: usize) -> Self {
        self.failing_transmits = n;
        self
    }

    pub fn transmit_calls(&self) -> usize {
        self.sent.len()
    }

    pub fn total_calls(&self) -> usize {
        self.sent.len() + self.receive_calls
    }

    /// Bytes still waiting to be read
    pub fn pending_input(&self) -> usize {
        self.rx.len()
    }
}

impl Transport for ScriptedTransport {
    fn transmit(&mut self, bytes: &[u8], _timeout: Duration) -> Result<(), TransportError> {
        self.sent.push(bytes.to_vec());
        if self.failing_transmits > 0 {
            self.failing_transmits -= 1;
            return Err(TransportError::Timeout);
        }
        match self.replies.pop_front() {
            Some(Reply::Bytes(bytes)) => self.rx.extend(bytes),
            Some(Reply::LinkError(msg)) => self.pending_error = Some(TransportError::Link(msg)),
            Some(Reply::Timeout) | None => {},
        }
        Ok(())
    }

    fn receive(&mut self, buffer: &mut [u8], _timeout: Duration) -> Result<(), TransportError> {
        self.receive_calls += 1;
        if let Some(err) = self.pending_error.take() {
            return Err(err);
        }
        if self.rx.len() < buffer.len() {
            self.rx.clear();
            return Err(TransportError::Timeout);
        }
        for slot in buffer.iter_mut() {
            if let Some(byte) = self.rx.pop_front() {
                *slot = byte;
            }
        }
        Ok(())
    }
}

// ============================================================================
// Threaded pipe
// ============================================================================

/// One end of an in-process full-duplex byte pipe
pub struct PipeTransport {
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
    buffered: VecDeque<u8>,
}

/// Create two connected ends
pub fn pipe() -> (PipeTransport, PipeTransport) {
    let (a_tx, b_rx) = channel();
    let (b_tx, a_rx) = channel();
    (
        PipeTransport {
            tx: a_tx,
            rx: a_rx,
            buffered: VecDeque::new(),
        },
        PipeTransport {
            tx: b_tx,
            rx: b_rx,
            buffered: VecDeque::new(),
        },
    )
}

impl Transport for PipeTransport {
    fn transmit(&mut self, bytes: &[u8], _timeout: Duration) -> Result<(), TransportError> {
        self.tx
            .send(bytes.to_vec())
            .map_err(|_| TransportError::Link("pipe closed".into()))
    }

    fn receive(&mut self, buffer: &mut [u8], timeout: Duration) -> Result<(), TransportError> {
        let deadline = Instant::now() + timeout;
        while self.buffered.len() < buffer.len() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(chunk) => self.buffered.extend(chunk),
                Err(RecvTimeoutError::Timeout) => {
                    self.buffered.clear();
                    return Err(TransportError::Timeout);
                },
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(TransportError::Link("pipe closed".into()));
                },
            }
        }
        for slot in buffer.iter_mut() {
            if let Some(byte) = self.buffered.pop_front() {
                *slot = byte;
            }
        }
        Ok(())
    }
}

/// Whole frame with a valid trailing CRC
pub fn framed(bytes: &[u8]) -> Vec<u8> {
    let mut frame = bytes.to_vec();
    rtu_link::crc::append_checksum(&mut frame);
    frame
}

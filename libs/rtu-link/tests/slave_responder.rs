//! Slave responder integration tests

#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

mod common;

use std::time::Duration;

use common::{framed, ScriptedTransport};
use rtu_link::{
    drain_until_idle, parse_response, ExceptionCode, Request, Response, ResponseFrame, RtuError,
    SlaveIdentity, SlaveResponder,
};

fn identity(address: u8) -> SlaveIdentity {
    SlaveIdentity::new(address, Duration::from_millis(10), 3).unwrap()
}

fn responder(input: &[u8]) -> SlaveResponder<ScriptedTransport> {
    SlaveResponder::new(ScriptedTransport::with_input(input))
}

// ============================================================================
// Request decoding
// ============================================================================

#[test]
fn test_decode_read_request() {
    let mut slave = responder(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x02, 0xC4, 0x0B]);
    let request = slave.process_once(&identity(1)).unwrap();
    assert_eq!(request, Request::ReadHoldingRegisters { start: 0, count: 2 });
    assert_eq!(slave.transport_mut().pending_input(), 0);
    assert!(slave.transport_mut().sent.is_empty());
}

#[test]
fn test_decode_write_single_request() {
    let mut slave = responder(&[0x01, 0x06, 0x00, 0x03, 0x00, 0x64, 0x78, 0x21]);
    let request = slave.process_once(&identity(1)).unwrap();
    assert_eq!(
        request,
        Request::WriteSingleRegister {
            address: 3,
            value: 100
        }
    );
    assert_eq!(request.count(), 1);
}

#[test]
fn test_decode_write_multiple_request() {
    let mut slave = responder(&[
        0x01, 0x10, 0x00, 0x00, 0x00, 0x02, 0x04, 0x00, 0x0A, 0x01, 0x02, 0x53, 0xFC,
    ]);
    let request = slave.process_once(&identity(1)).unwrap();
    assert_eq!(
        request,
        Request::WriteMultipleRegisters {
            start: 0,
            values: vec![0x000A, 0x0102]
        }
    );
    assert_eq!(slave.transport_mut().pending_input(), 0);
}

#[test]
fn test_decode_write_multiple_max_count() {
    let mut body = vec![0x07, 0x10, 0x00, 0x10, 0x00, 123, 246];
    body.extend(std::iter::repeat(0xAB).take(246));
    let mut slave = responder(&framed(&body));

    let request = slave.process_once(&identity(7)).unwrap();
    assert_eq!(request.count(), 123);
    assert_eq!(request.address(), 0x10);
}

#[test]
fn test_back_to_back_requests() {
    let mut input = vec![0x01, 0x03, 0x00, 0x00, 0x00, 0x02, 0xC4, 0x0B];
    input.extend_from_slice(&[0x01, 0x06, 0x00, 0x01, 0x00, 0x03, 0x98, 0x0B]);
    let mut slave = responder(&input);
    let id = identity(1);

    assert!(matches!(
        slave.process_once(&id).unwrap(),
        Request::ReadHoldingRegisters { .. }
    ));
    assert_eq!(
        slave.process_once(&id).unwrap(),
        Request::WriteSingleRegister {
            address: 1,
            value: 3
        }
    );
}

// ============================================================================
// Rejections
// ============================================================================

#[test]
fn test_address_mismatch_leaves_rest_of_frame() {
    let mut slave = responder(&framed(&[0x02, 0x03, 0x00, 0x00, 0x00, 0x02]));

    let err = slave.process_once(&identity(1)).unwrap_err();
    assert_eq!(err, RtuError::InvalidAddress(2));
    assert_eq!(slave.transport_mut().pending_input(), 6);

    let drained = drain_until_idle(
        slave.transport_mut(),
        Duration::from_millis(1),
        Duration::from_secs(1),
    )
    .unwrap();
    assert_eq!(drained, 6);
}

#[test]
fn test_unknown_function_code() {
    let mut slave = responder(&framed(&[0x01, 0x04, 0x00, 0x00, 0x00, 0x01]));
    assert_eq!(
        slave.process_once(&identity(1)).unwrap_err(),
        RtuError::InvalidFunctionCode(0x04)
    );
}

#[test]
fn test_bad_checksum() {
    let mut slave = responder(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x02, 0xC4, 0x0C]);
    let err = slave.process_once(&identity(1)).unwrap_err();
    assert_eq!(
        err,
        RtuError::ChecksumError {
            expected: 0x0BC4,
            received: 0x0CC4
        }
    );
}

#[test]
fn test_write_multiple_count_out_of_range() {
    for count in [0u16, 124] {
        let [hi, lo] = count.to_be_bytes();
        let mut slave = responder(&[0x01, 0x10, 0x00, 0x00, hi, lo]);
        let err = slave.process_once(&identity(1)).unwrap_err();
        assert!(matches!(err, RtuError::InvalidParameter(_)), "count {count}");
    }
}

#[test]
fn test_write_multiple_byte_count_mismatch() {
    let mut slave = responder(&framed(&[
        0x01, 0x10, 0x00, 0x00, 0x00, 0x02, 0x03, 0x00, 0x01, 0x00, 0x02,
    ]));
    assert!(matches!(
        slave.process_once(&identity(1)),
        Err(RtuError::InvalidRequest(_))
    ));
}

#[test]
fn test_truncated_request_times_out() {
    let mut slave = responder(&[0x01, 0x03, 0x00, 0x00]);
    assert!(matches!(
        slave.process_once(&identity(1)),
        Err(RtuError::Timeout(_))
    ));
}

#[test]
fn test_silent_line_times_out() {
    let mut slave = responder(&[]);
    let err = slave.process_once(&identity(1)).unwrap_err();
    assert!(err.is_retryable());
}

// ============================================================================
// Replies
// ============================================================================

#[test]
fn test_send_responses() {
    let id = identity(1);
    let mut slave = responder(&[]);

    slave
        .send_response(&id, &Response::Registers(vec![20, 80]))
        .unwrap();
    slave
        .send_response(
            &id,
            &Response::SingleRegisterWritten {
                address: 3,
                value: 100,
            },
        )
        .unwrap();
    slave
        .send_response(&id, &Response::MultipleRegistersWritten { start: 0, count: 2 })
        .unwrap();

    assert_eq!(
        slave.transport_mut().sent,
        vec![
            vec![0x01, 0x03, 0x04, 0x00, 0x14, 0x00, 0x50, 0xBA, 0x0B],
            vec![0x01, 0x06, 0x00, 0x03, 0x00, 0x64, 0x78, 0x21],
            vec![0x01, 0x10, 0x00, 0x00, 0x00, 0x02, 0x41, 0xC8],
        ]
    );
}

#[test]
fn test_echo_reply_for_write_request() {
    let id = identity(1);
    let mut slave = responder(&[
        0x01, 0x10, 0x00, 0x00, 0x00, 0x02, 0x04, 0x00, 0x01, 0x00, 0x02, 0x23, 0xAE,
    ]);

    let request = slave.process_once(&id).unwrap();
    let echo = request.echo().unwrap();
    slave.send_response(&id, &echo).unwrap();

    assert_eq!(
        slave.transport_mut().sent[0],
        vec![0x01, 0x10, 0x00, 0x00, 0x00, 0x02, 0x41, 0xC8]
    );
}

#[test]
fn test_send_exception() {
    let mut slave = responder(&[]);
    slave
        .send_exception(&identity(1), 0x03, ExceptionCode::IllegalDataAddress)
        .unwrap();
    assert_eq!(
        slave.transport_mut().sent[0],
        vec![0x01, 0x83, 0x02, 0xC0, 0xF1]
    );
}

#[test]
fn test_every_exception_code_round_trips() {
    let id = identity(42);
    for code in ExceptionCode::ALL {
        let mut slave = responder(&[]);
        slave.send_exception(&id, 0x06, code).unwrap();

        let sent = &slave.transport_mut().sent[0];
        let parsed = parse_response(sent, 42, 0x06).unwrap();
        assert_eq!(parsed, ResponseFrame::Exception { code: code.code() });
    }
}

#[test]
fn test_reply_transmit_retries_timeouts() {
    let id = SlaveIdentity::new(1, Duration::from_millis(10), 2).unwrap();
    let mut slave = SlaveResponder::new(ScriptedTransport::new().fail_transmits(2));

    slave
        .send_exception(&id, 0x03, ExceptionCode::SlaveDeviceBusy)
        .unwrap();
    assert_eq!(slave.transport_mut().transmit_calls(), 3);

    let id = SlaveIdentity::new(1, Duration::from_millis(10), 0).unwrap();
    let mut slave = SlaveResponder::new(ScriptedTransport::new().fail_transmits(1));
    assert!(matches!(
        slave.send_exception(&id, 0x03, ExceptionCode::SlaveDeviceBusy),
        Err(RtuError::Timeout(_))
    ));
}

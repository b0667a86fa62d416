//! CDC Control Request Tests
//!
//! Tests for the class request table, line coding and control line state,
//! both directly and dispatched through the bridge.
//! Run with: cargo test --features std --test control_tests

use cdc_bridge::control::{ControlError, ControlSignals, LineCoding, Parity, StopBits};
use cdc_bridge::prelude::*;
use cdc_bridge::stack::mock::MockStack;

// =============================================================================
// Request Table Tests
// =============================================================================

#[test]
fn test_request_codes() {
    let codes: Vec<u8> = CdcRequest::ALL.iter().map(|r| r.code()).collect();
    assert_eq!(
        codes,
        vec![0x00, 0x01, 0x02, 0x03, 0x04, 0x20, 0x21, 0x22, 0x23]
    );
}

#[test]
fn test_unknown_codes() {
    for code in [0x05u8, 0x10, 0x1F, 0x24, 0xFF] {
        assert_eq!(CdcRequest::from_code(code), None);
    }
}

#[test]
fn test_request_display() {
    assert_eq!(CdcRequest::SetLineCoding.to_string(), "CDC req 0x20");
    assert_eq!(ControlError::ShortPayload.to_string(), "payload too short");
}

// =============================================================================
// No-op Handler Tests
// =============================================================================

#[test]
fn test_noop_accepts_all_requests() {
    let mut handler = NoopControl;
    for request in CdcRequest::ALL {
        let mut empty: [u8; 0] = [];
        let mut payload = [0xAAu8; 64];
        assert_eq!(handler.control(request, 0, &mut empty), Ok(()));
        assert_eq!(handler.control(request, 0xFFFF, &mut payload), Ok(()));
        assert_eq!(payload, [0xAAu8; 64], "{request} touched the payload");
    }
}

// =============================================================================
// Line Coding Tests
// =============================================================================

#[test]
fn test_line_coding_default() {
    let coding = LineCoding::default();
    assert_eq!(coding.baud_rate, 115_200);
    assert_eq!(coding.data_bits, 8);
    assert_eq!(coding.stop_bits, StopBits::One);
    assert_eq!(coding.parity, Parity::None);
}

#[test]
fn test_line_coding_wire_format() {
    let coding = LineCoding {
        baud_rate: 9600,
        data_bits: 7,
        stop_bits: StopBits::Two,
        parity: Parity::Even,
    };
    assert_eq!(coding.to_bytes(), [0x80, 0x25, 0x00, 0x00, 2, 2, 7]);
    assert_eq!(LineCoding::from_bytes(&coding.to_bytes()), Some(coding));
}

#[test]
fn test_line_coding_rejects_malformed() {
    // Too short
    assert!(LineCoding::from_bytes(&[0x00, 0xC2, 0x01, 0x00, 0, 0]).is_none());
    // Bad stop bits
    assert!(LineCoding::from_bytes(&[0x00, 0xC2, 0x01, 0x00, 3, 0, 8]).is_none());
    // Bad data bits
    assert!(LineCoding::from_bytes(&[0x00, 0xC2, 0x01, 0x00, 0, 0, 9]).is_none());
    // 16 data bits is legal
    assert!(LineCoding::from_bytes(&[0x00, 0xC2, 0x01, 0x00, 0, 0, 16]).is_some());
}

#[test]
fn test_line_state_set_get_coding() {
    let mut handler = LineStateControl::new();
    let mut set: [u8; 7] = [0x00, 0xC2, 0x01, 0x00, 0, 1, 8]; // 115200 8O1

    handler
        .control(CdcRequest::SetLineCoding, 0, &mut set)
        .unwrap();
    assert_eq!(handler.line_coding().parity, Parity::Odd);

    let mut get = [0u8; 7];
    handler
        .control(CdcRequest::GetLineCoding, 0, &mut get)
        .unwrap();
    assert_eq!(get, set);
}

#[test]
fn test_line_state_ignores_short_coding() {
    let mut handler = LineStateControl::new();
    let mut short = [0x80u8, 0x25];

    assert_eq!(
        handler.control(CdcRequest::SetLineCoding, 0, &mut short),
        Ok(())
    );
    assert_eq!(handler.line_coding(), LineCoding::DEFAULT);
}

#[test]
fn test_line_state_get_coding_short_buffer() {
    let mut handler = LineStateControl::new();
    let mut get = [0u8; 4];

    handler
        .control(CdcRequest::GetLineCoding, 0, &mut get)
        .unwrap();
    assert_eq!(get, 115_200u32.to_le_bytes());
}

#[test]
fn test_line_state_control_lines() {
    let mut handler = LineStateControl::new();
    assert!(!handler.signals().connected());

    handler
        .control(CdcRequest::SetControlLineState, 0x0003, &mut [])
        .unwrap();
    assert_eq!(handler.signals(), ControlSignals { dtr: true, rts: true });

    handler
        .control(CdcRequest::SetControlLineState, 0x0000, &mut [])
        .unwrap();
    assert!(!handler.signals().connected());
}

#[test]
fn test_line_state_counts_breaks() {
    let mut handler = LineStateControl::new();
    for _ in 0..3 {
        handler
            .control(CdcRequest::SendBreak, 250, &mut [])
            .unwrap();
    }
    assert_eq!(handler.breaks(), 3);
}

#[test]
fn test_line_state_accepts_all_requests() {
    let mut handler = LineStateControl::new();
    for request in CdcRequest::ALL {
        let mut data = [0u8; 7];
        assert_eq!(handler.control(request, 0, &mut data), Ok(()));
    }
}

// =============================================================================
// Bridge Dispatch Tests
// =============================================================================

#[test]
fn test_bridge_dispatches_to_handler() {
    let mut bridge = CdcBridge::new(
        MockStack::new(),
        LineStateControl::new(),
        BridgeConfig::default(),
    );

    let mut coding = LineCoding {
        baud_rate: 57_600,
        ..LineCoding::DEFAULT
    }
    .to_bytes();
    bridge.on_control(0x20, 0, &mut coding).unwrap();
    bridge.on_control(0x22, 0x0001, &mut []).unwrap();

    let handler = bridge.control_handler();
    assert_eq!(handler.line_coding().baud_rate, 57_600);
    assert!(handler.signals().dtr);
    assert!(!handler.signals().rts);
}

#[test]
fn test_bridge_accepts_all_codes_with_noop() {
    let mut bridge = CdcBridge::new(MockStack::new(), NoopControl, BridgeConfig::default());
    for code in 0..=u8::MAX {
        let mut data = [0u8; 8];
        assert!(bridge.on_control(code, 0, &mut data).is_ok());
    }
    assert!(bridge.stack().calls().is_empty());
}

#[test]
fn test_shared_bridge_serves_every_class_request() {
    let shared = SharedBridge::new(CdcBridge::new(
        MockStack::new(),
        LineStateControl::new(),
        BridgeConfig::default(),
    ));
    assert_eq!(shared.init(), Status::Ok);

    // Requests the CDC function forwards from EP0, in host order
    let mut coding = LineCoding {
        baud_rate: 9_600,
        parity: Parity::Even,
        ..LineCoding::DEFAULT
    }
    .to_bytes();
    let mut feature = [0x01, 0x00];
    assert_eq!(shared.lock(|b| b.on_control(0x02, 0x0001, &mut feature)), Ok(()));
    assert_eq!(shared.lock(|b| b.on_control(0x20, 0, &mut coding)), Ok(()));
    assert_eq!(shared.lock(|b| b.on_control(0x22, 0x0003, &mut [])), Ok(()));
    assert_eq!(shared.lock(|b| b.on_control(0x23, 0xFFFF, &mut [])), Ok(()));
    assert_eq!(shared.lock(|b| b.on_control(0x04, 0x0001, &mut [])), Ok(()));
    assert_eq!(shared.lock(|b| b.on_control(0x00, 0, &mut [0x41, 0x54])), Ok(()));

    // IN replies start zeroed and are filled by the handler
    let mut reply = [0u8; LineCoding::LEN];
    assert_eq!(shared.lock(|b| b.on_control(0x21, 0, &mut reply)), Ok(()));
    assert_eq!(reply, coding);
    let mut reply = [0u8; 2];
    assert_eq!(shared.lock(|b| b.on_control(0x03, 0x0001, &mut reply)), Ok(()));
    let mut reply = [0u8; 8];
    assert_eq!(shared.lock(|b| b.on_control(0x01, 0, &mut reply)), Ok(()));

    shared.lock(|b| {
        let handler = b.control_handler();
        assert_eq!(handler.line_coding().baud_rate, 9_600);
        assert_eq!(handler.line_coding().parity, Parity::Even);
        assert!(handler.signals().connected());
        assert_eq!(handler.breaks(), 1);
    });
}

#[test]
fn test_bridge_handler_mut() {
    let mut bridge = CdcBridge::new(
        MockStack::new(),
        LineStateControl::new(),
        BridgeConfig::default(),
    );
    let mut lines: [u8; 0] = [];
    bridge
        .control_handler_mut()
        .control(CdcRequest::SetControlLineState, 0x0002, &mut lines)
        .unwrap();
    assert!(bridge.control_handler().signals().rts);
}

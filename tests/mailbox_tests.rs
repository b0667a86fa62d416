//! Receive Mailbox Tests
//!
//! Tests for the byte FIFO between the receive callback and the application.
//! Run with: cargo test --features std --test mailbox_tests

use cdc_bridge::mailbox::{Delivery, OverflowPolicy, RxMailbox};

// =============================================================================
// Basic FIFO Tests
// =============================================================================

#[test]
fn test_mailbox_starts_empty() {
    let mb: RxMailbox<16> = RxMailbox::default();
    assert!(mb.is_empty());
    assert_eq!(mb.available(), 0);
    assert_eq!(mb.free(), 16);
    assert_eq!(mb.policy(), OverflowPolicy::Refuse);
}

#[test]
fn test_mailbox_fifo_order() {
    let mut mb: RxMailbox<16> = RxMailbox::default();
    mb.push(b"abc");
    mb.push(b"def");

    let mut buf = [0u8; 4];
    assert_eq!(mb.read(&mut buf), 4);
    assert_eq!(&buf, b"abcd");
    assert_eq!(mb.read(&mut buf), 2);
    assert_eq!(&buf[..2], b"ef");
    assert_eq!(mb.read(&mut buf), 0);
}

#[test]
fn test_mailbox_exact_fit() {
    let mut mb: RxMailbox<4> = RxMailbox::default();
    assert_eq!(
        mb.push(b"wxyz"),
        Delivery {
            accepted: 4,
            dropped: 0
        }
    );
    assert_eq!(mb.free(), 0);
    assert!(!mb.push(b"").overrun());
}

#[test]
fn test_mailbox_clear() {
    let mut mb: RxMailbox<8> = RxMailbox::default();
    mb.push(b"stale");
    mb.clear();
    assert!(mb.is_empty());
    assert_eq!(mb.free(), 8);
}

// =============================================================================
// Overflow Policy Tests
// =============================================================================

#[test]
fn test_refuse_drops_whole_packet() {
    let mut mb: RxMailbox<8> = RxMailbox::new(OverflowPolicy::Refuse);
    mb.push(b"12345");

    let delivery = mb.push(b"6789");
    assert!(delivery.overrun());
    assert_eq!(delivery.accepted, 0);
    assert_eq!(delivery.dropped, 4);
    assert_eq!(mb.available(), 5);

    // Space for a smaller packet is still used
    assert_eq!(mb.push(b"678").accepted, 3);
}

#[test]
fn test_overwrite_keeps_newest() {
    let mut mb: RxMailbox<8> = RxMailbox::new(OverflowPolicy::Overwrite);
    mb.push(b"12345678");

    let delivery = mb.push(b"AB");
    assert_eq!(delivery.accepted, 2);
    assert_eq!(delivery.dropped, 2);

    let mut buf = [0u8; 8];
    assert_eq!(mb.read(&mut buf), 8);
    assert_eq!(&buf, b"345678AB");
}

// =============================================================================
// Line Reading Tests
// =============================================================================

#[test]
fn test_read_line_needs_terminator() {
    let mut mb: RxMailbox<32> = RxMailbox::default();
    mb.push(b"partial");
    assert!(mb.read_line().is_none());
    assert_eq!(mb.available(), 7);

    mb.push(b"\r");
    assert_eq!(mb.read_line().as_deref(), Some(&b"partial"[..]));
    assert!(mb.is_empty());
}

#[test]
fn test_read_line_empty_line() {
    let mut mb: RxMailbox<32> = RxMailbox::default();
    mb.push(b"\r\nOK\n");

    assert_eq!(mb.read_line().as_deref(), Some(&b""[..]));
    assert_eq!(mb.read_line().as_deref(), Some(&b"OK"[..]));
}

#[test]
fn test_read_line_then_bytes() {
    let mut mb: RxMailbox<32> = RxMailbox::default();
    mb.push(b"cmd\nraw");

    assert_eq!(mb.read_line().as_deref(), Some(&b"cmd"[..]));
    let mut buf = [0u8; 8];
    let n = mb.read(&mut buf);
    assert_eq!(&buf[..n], b"raw");
}

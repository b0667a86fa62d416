//! Configuration and Descriptor Tests
//!
//! Tests for bridge configuration constants and the USB descriptors built
//! from them.
//! Run with: cargo test --features std --test config_tests

use cdc_bridge::descriptor::{CdcClass, DeviceDescriptor, ACM_CAPABILITIES, USB_CLASS_CDC};
use cdc_bridge::prelude::*;

// =============================================================================
// Buffer and USB Constants
// =============================================================================

#[test]
fn test_buffer_sizes() {
    assert_eq!(RX_BUFFER_SIZE, 2048);
    assert_eq!(TX_BUFFER_SIZE, 2048);
    // Whole number of full-speed packets
    assert_eq!(RX_BUFFER_SIZE % usize::from(USB_CDC_PACKET_SIZE), 0);
}

#[test]
fn test_usb_identity() {
    assert_ne!(USB_VID, 0);
    assert_ne!(USB_PID, 0);
    assert!(!USB_MANUFACTURER.is_empty());
    assert!(!USB_PRODUCT.is_empty());
    assert!(!USB_SERIAL.is_empty());
    assert!(USB_MAX_POWER_MA <= 500);
}

#[test]
fn test_cdc_interfaces_distinct() {
    assert_ne!(CDC_COMM_INTERFACE, CDC_DATA_INTERFACE);
}

#[test]
fn test_speed_packet_sizes() {
    assert_eq!(DeviceSpeed::Full.bulk_packet_size(), USB_CDC_PACKET_SIZE);
    assert_eq!(DeviceSpeed::High.bulk_packet_size(), 512);
    assert_eq!(DeviceSpeed::default(), DEFAULT_SPEED);
}

// =============================================================================
// BridgeConfig Tests
// =============================================================================

#[test]
fn test_bridge_config_defaults() {
    let config = BridgeConfig::default();
    assert_eq!(config, BridgeConfig::new());
    assert_eq!(config.vid, USB_VID);
    assert_eq!(config.pid, USB_PID);
    assert_eq!(config.speed, DeviceSpeed::Full);
    assert_eq!(config.overflow, OverflowPolicy::Refuse);
}

#[test]
fn test_bridge_config_builders() {
    let config = BridgeConfig::new()
        .with_ids(0xCAFE, 0x4001)
        .with_speed(DeviceSpeed::High)
        .with_overflow(OverflowPolicy::Overwrite);

    assert_eq!((config.vid, config.pid), (0xCAFE, 0x4001));
    assert_eq!(config.speed, DeviceSpeed::High);
    assert_eq!(config.overflow, OverflowPolicy::Overwrite);
    assert_eq!(config.product, USB_PRODUCT);
}

// =============================================================================
// Descriptor Tests
// =============================================================================

#[test]
fn test_device_descriptor_from_config() {
    let config = BridgeConfig::new().with_ids(0x1209, 0x0042);
    let desc = DeviceDescriptor::from_config(&config);
    let bytes = desc.to_bytes();

    assert_eq!(bytes.len(), DeviceDescriptor::LEN);
    assert_eq!(&bytes[2..4], &[0x00, 0x02]);
    assert_eq!(bytes[4], USB_CLASS_CDC);
    assert_eq!(bytes[7], USB_EP0_PACKET_SIZE);
    assert_eq!(&bytes[10..12], &[0x42, 0x00]);
    assert_eq!(&bytes[12..14], &USB_DEVICE_RELEASE.to_le_bytes());
    assert_eq!(desc.to_string(), "USB(1209:0042)");
}

#[test]
fn test_cdc_functional_descriptors() {
    let class = CdcClass::new(USB_CDC_PACKET_SIZE);
    let desc = class.functional_descriptors();

    // Header, call management, ACM, union
    assert_eq!(&desc[0..5], &[0x05, 0x24, 0x00, 0x10, 0x01]);
    assert_eq!(&desc[5..10], &[0x05, 0x24, 0x01, 0x00, CDC_DATA_INTERFACE]);
    // All nine class requests are advertised: comm features, line state, break
    assert_eq!(ACM_CAPABILITIES, 0x07);
    assert_eq!(&desc[10..14], &[0x04, 0x24, 0x02, 0x07]);
    assert_eq!(
        &desc[14..],
        &[0x05, 0x24, 0x06, CDC_COMM_INTERFACE, CDC_DATA_INTERFACE]
    );
}

// =============================================================================
// Display Tests
// =============================================================================

#[test]
fn test_state_and_status_display() {
    assert_eq!(BridgeState::Suspended.to_string(), "suspended");
    assert_eq!(Status::Busy.to_string(), "BUSY");
    assert_eq!(
        BridgeError::InvalidState(BridgeState::Uninitialized).to_string(),
        "invalid in state uninitialized"
    );
    assert_eq!(
        BridgeError::Oversized {
            len: 3000,
            capacity: TX_BUFFER_SIZE
        }
        .to_string(),
        "3000 bytes exceeds transmit capacity 2048"
    );
}

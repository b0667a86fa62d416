//! Bridge configuration and hardware constants
//!
//! Compile-time constants for buffer sizing and USB identity, plus the
//! runtime [`BridgeConfig`] handed to [`crate::bridge::CdcBridge::new`].

use crate::mailbox::OverflowPolicy;
use crate::types::DeviceSpeed;

/// Receive buffer capacity in bytes
pub const RX_BUFFER_SIZE: usize = 2048;

/// Transmit buffer capacity in bytes
pub const TX_BUFFER_SIZE: usize = 2048;

/// USB VID (use test VID for development)
pub const USB_VID: u16 = 0x1209;

/// USB PID (get from pid.codes for production)
pub const USB_PID: u16 = 0x0001;

/// Device release number (BCD)
pub const USB_DEVICE_RELEASE: u16 = 0x0200;

/// USB CDC ACM bulk packet size (full speed)
pub const USB_CDC_PACKET_SIZE: u16 = 64;

/// Control endpoint 0 packet size
pub const USB_EP0_PACKET_SIZE: u8 = 64;

/// Maximum bus current in mA
pub const USB_MAX_POWER_MA: u16 = 100;

/// Manufacturer string descriptor
pub const USB_MANUFACTURER: &str = "CDC Bridge";

/// Product string descriptor
pub const USB_PRODUCT: &str = "USB Serial Bridge";

/// Serial number string descriptor
pub const USB_SERIAL: &str = "0001";

/// Default bus speed
pub const DEFAULT_SPEED: DeviceSpeed = DeviceSpeed::Full;

/// Communication interface number of the CDC function
pub const CDC_COMM_INTERFACE: u8 = 0;

/// Data interface number of the CDC function
pub const CDC_DATA_INTERFACE: u8 = 1;

/// Runtime bridge configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Vendor ID
    pub vid: u16,
    /// Product ID
    pub pid: u16,
    /// Device release number (BCD)
    pub device_release: u16,
    /// Manufacturer name
    pub manufacturer: &'static str,
    /// Product name
    pub product: &'static str,
    /// Serial number
    pub serial: &'static str,
    /// Bus speed requested from the stack
    pub speed: DeviceSpeed,
    /// What to do with inbound data the application has not drained
    pub overflow: OverflowPolicy,
}

impl BridgeConfig {
    /// Configuration built from the crate constants
    #[must_use]
    pub const fn new() -> Self {
        Self {
            vid: USB_VID,
            pid: USB_PID,
            device_release: USB_DEVICE_RELEASE,
            manufacturer: USB_MANUFACTURER,
            product: USB_PRODUCT,
            serial: USB_SERIAL,
            speed: DEFAULT_SPEED,
            overflow: OverflowPolicy::Refuse,
        }
    }

    /// Override the VID/PID pair
    #[must_use]
    pub const fn with_ids(self, vid: u16, pid: u16) -> Self {
        Self { vid, pid, ..self }
    }

    /// Override the overflow policy
    #[must_use]
    pub const fn with_overflow(self, overflow: OverflowPolicy) -> Self {
        Self { overflow, ..self }
    }

    /// Override the bus speed
    #[must_use]
    pub const fn with_speed(self, speed: DeviceSpeed) -> Self {
        Self { speed, ..self }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self::new()
    }
}

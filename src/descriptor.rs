//! USB descriptors handed to the device stack
//!
//! Only the pieces the bridge itself decides: the device identity and the
//! CDC ACM function binding. Configuration and endpoint descriptors are the
//! stack's business.

use core::fmt;

use crate::config::{
    BridgeConfig, CDC_COMM_INTERFACE, CDC_DATA_INTERFACE, USB_EP0_PACKET_SIZE,
};

/// Communications device class code
pub const USB_CLASS_CDC: u8 = 0x02;
/// CDC data interface class code
pub const USB_CLASS_CDC_DATA: u8 = 0x0A;
/// Abstract control model subclass
pub const CDC_SUBCLASS_ACM: u8 = 0x02;
/// V.25ter (AT commands) protocol
pub const CDC_PROTOCOL_AT: u8 = 0x01;

const DESC_TYPE_DEVICE: u8 = 0x01;
const CS_INTERFACE: u8 = 0x24;
const CDC_TYPE_HEADER: u8 = 0x00;
const CDC_TYPE_CALL_MANAGEMENT: u8 = 0x01;
const CDC_TYPE_ACM: u8 = 0x02;
const CDC_TYPE_UNION: u8 = 0x06;

/// ACM capabilities (bmCapabilities)
///
/// Bit 0: comm feature requests. Bit 1: line coding, control line state and
/// serial state. Bit 2: send break.
pub const ACM_CAPABILITIES: u8 = 0x07;

/// Device descriptor fields
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeviceDescriptor {
    /// Vendor ID
    pub vid: u16,
    /// Product ID
    pub pid: u16,
    /// Device release number (BCD)
    pub device_release: u16,
    /// Control endpoint packet size
    pub max_packet_size_0: u8,
    /// Manufacturer name
    pub manufacturer: &'static str,
    /// Product name
    pub product: &'static str,
    /// Serial number
    pub serial: &'static str,
}

impl DeviceDescriptor {
    /// Length of the encoded device descriptor
    pub const LEN: usize = 18;

    /// Build from a bridge configuration
    #[must_use]
    pub const fn from_config(config: &BridgeConfig) -> Self {
        Self {
            vid: config.vid,
            pid: config.pid,
            device_release: config.device_release,
            max_packet_size_0: USB_EP0_PACKET_SIZE,
            manufacturer: config.manufacturer,
            product: config.product,
            serial: config.serial,
        }
    }

    /// Encode as a standard USB 2.0 device descriptor
    ///
    /// String indices are 1 (manufacturer), 2 (product) and 3 (serial).
    #[must_use]
    pub const fn to_bytes(&self) -> [u8; Self::LEN] {
        let vid = self.vid.to_le_bytes();
        let pid = self.pid.to_le_bytes();
        let rel = self.device_release.to_le_bytes();
        [
            Self::LEN as u8,
            DESC_TYPE_DEVICE,
            0x00, 0x02, // bcdUSB 2.00
            USB_CLASS_CDC,
            0x00,
            0x00,
            self.max_packet_size_0,
            vid[0], vid[1],
            pid[0], pid[1],
            rel[0], rel[1],
            1, 2, 3,
            1, // bNumConfigurations
        ]
    }
}

impl Default for DeviceDescriptor {
    fn default() -> Self {
        Self::from_config(&BridgeConfig::default())
    }
}

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "USB({:04X}:{:04X})", self.vid, self.pid)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for DeviceDescriptor {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "USB({:04X}:{:04X})", self.vid, self.pid);
    }
}

/// CDC ACM function binding registered with the stack
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CdcClass {
    /// Communication (control) interface number
    pub comm_interface: u8,
    /// Data interface number
    pub data_interface: u8,
    /// Bulk endpoint packet size
    pub packet_size: u16,
}

impl CdcClass {
    /// Length of [`CdcClass::functional_descriptors`]
    pub const FUNCTIONAL_LEN: usize = 19;

    /// Create a binding for the given bulk packet size
    #[must_use]
    pub const fn new(packet_size: u16) -> Self {
        Self {
            comm_interface: CDC_COMM_INTERFACE,
            data_interface: CDC_DATA_INTERFACE,
            packet_size,
        }
    }

    /// Class-specific functional descriptors for the communication interface
    ///
    /// Header (CDC 1.10), call management, ACM and union, in that order.
    #[must_use]
    pub const fn functional_descriptors(&self) -> [u8; Self::FUNCTIONAL_LEN] {
        [
            // Header
            0x05, CS_INTERFACE, CDC_TYPE_HEADER, 0x10, 0x01,
            // Call management
            0x05, CS_INTERFACE, CDC_TYPE_CALL_MANAGEMENT, 0x00, self.data_interface,
            // ACM
            0x04, CS_INTERFACE, CDC_TYPE_ACM, ACM_CAPABILITIES,
            // Union
            0x05, CS_INTERFACE, CDC_TYPE_UNION, self.comm_interface, self.data_interface,
        ]
    }
}

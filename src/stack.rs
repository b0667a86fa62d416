//! Device stack seam
//!
//! The bridge never talks to USB hardware directly. It drives an external
//! device stack (enumeration, endpoints, chapter 9) through [`DeviceStack`],
//! and the stack glue calls back through [`ClassInterface`].

use crate::control::ControlError;
use crate::descriptor::{CdcClass, DeviceDescriptor};
use crate::types::{DeviceSpeed, StackResult};

#[cfg(any(test, feature = "std"))]
pub mod mock;

/// Capabilities consumed from the external USB device stack
///
/// Setup calls are synchronous. `transmit_packet` and `receive_packet` only
/// arm hardware; their outcome arrives later through the class callbacks.
pub trait DeviceStack {
    /// Initialise the stack with the device identity
    fn init(&mut self, descriptor: &DeviceDescriptor, speed: DeviceSpeed) -> StackResult<()>;

    /// Register the CDC ACM function
    fn register_class(&mut self, class: &CdcClass) -> StackResult<()>;

    /// Bind the class callback table
    ///
    /// From here on the stack glue routes class events (configuration,
    /// control requests, OUT transfers) to the bridge's [`ClassInterface`].
    fn register_interface(&mut self) -> StackResult<()>;

    /// Connect to the bus
    fn start(&mut self) -> StackResult<()>;

    /// Disconnect and tear down all stack state
    fn deinit(&mut self) -> StackResult<()>;

    /// Enter low-power suspend
    fn suspend(&mut self) -> StackResult<()>;

    /// Leave suspend
    fn resume(&mut self) -> StackResult<()>;

    /// Latch the bytes of the next IN transfer
    fn set_tx_buffer(&mut self, data: &[u8]) -> StackResult<()>;

    /// Start the IN transfer latched by `set_tx_buffer`
    fn transmit_packet(&mut self) -> StackResult<()>;

    /// Check if an IN transfer is still owned by the stack
    ///
    /// Checked before anything is latched, so a busy stack never sees its
    /// pending buffer replaced.
    fn is_tx_busy(&self) -> bool;

    /// Declare how many bytes the next OUT transfer may deliver
    fn set_rx_buffer(&mut self, capacity: usize) -> StackResult<()>;

    /// Start watching for the next OUT transfer
    fn receive_packet(&mut self) -> StackResult<()>;
}

/// Class interface callback table invoked by the stack glue
pub trait ClassInterface {
    /// Error returned by the callbacks
    type Error;

    /// Host configured the CDC interface
    fn class_init(&mut self) -> Result<(), Self::Error>;

    /// Host deconfigured the CDC interface
    fn class_deinit(&mut self) -> Result<(), Self::Error>;

    /// Class-specific control request on the communication interface
    fn control(&mut self, code: u8, value: u16, data: &mut [u8]) -> Result<(), ControlError>;

    /// OUT transfer completed into the armed buffer
    fn receive(&mut self, packet: &[u8]) -> Result<usize, Self::Error>;
}

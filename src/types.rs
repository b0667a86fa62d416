//! Shared types used across the bridge
//!
//! States, statuses and error enums. Everything here is `Copy` and
//! allocation free so it can cross the interrupt boundary.

use core::fmt;

/// USB bus speed requested from the device stack
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum DeviceSpeed {
    /// Full speed (12 Mbit/s)
    #[default]
    Full,
    /// High speed (480 Mbit/s)
    High,
}

impl DeviceSpeed {
    /// Maximum bulk packet size for this speed
    #[must_use]
    pub const fn bulk_packet_size(self) -> u16 {
        match self {
            Self::Full => 64,
            Self::High => 512,
        }
    }
}

impl fmt::Display for DeviceSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => f.write_str("FS"),
            Self::High => f.write_str("HS"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for DeviceSpeed {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Full => defmt::write!(f, "FS"),
            Self::High => defmt::write!(f, "HS"),
        }
    }
}

/// Bridge lifecycle state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum BridgeState {
    /// Stack not initialised; only `init` is accepted
    #[default]
    Uninitialized,
    /// Stack running, transfers allowed
    Active,
    /// Bus suspended; waits for `resume`
    Suspended,
}

impl BridgeState {
    /// Check if the stack has been initialised
    #[must_use]
    pub const fn is_initialized(self) -> bool {
        !matches!(self, Self::Uninitialized)
    }
}

impl fmt::Display for BridgeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => f.write_str("uninitialized"),
            Self::Active => f.write_str("active"),
            Self::Suspended => f.write_str("suspended"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for BridgeState {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Uninitialized => defmt::write!(f, "UNINIT"),
            Self::Active => defmt::write!(f, "ACTIVE"),
            Self::Suspended => defmt::write!(f, "SUSPENDED"),
        }
    }
}

/// Failure reported by the device stack
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StackError {
    /// Stack is busy with a previous request
    Busy,
    /// Generic stack failure
    Fail,
    /// Device not configured by the host yet
    NotConfigured,
    /// Operation not supported by this stack
    Unsupported,
}

impl fmt::Display for StackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Busy => f.write_str("stack busy"),
            Self::Fail => f.write_str("stack failure"),
            Self::NotConfigured => f.write_str("device not configured"),
            Self::Unsupported => f.write_str("operation not supported"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for StackError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Busy => defmt::write!(f, "Busy"),
            Self::Fail => defmt::write!(f, "Fail"),
            Self::NotConfigured => defmt::write!(f, "NotConfigured"),
            Self::Unsupported => defmt::write!(f, "Unsupported"),
        }
    }
}

/// Stack operation result
pub type StackResult<T> = Result<T, StackError>;

/// Bridge operation error
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BridgeError {
    /// A transmit is already in flight; retry later
    Busy,
    /// The device stack rejected a request
    Stack(StackError),
    /// `init` called twice without an intervening `reset`
    AlreadyInitialized,
    /// Operation not valid in the current state
    InvalidState(BridgeState),
    /// Transmit larger than the transmit buffer
    Oversized {
        /// Requested length
        len: usize,
        /// Transmit buffer capacity
        capacity: usize,
    },
}

impl From<StackError> for BridgeError {
    fn from(err: StackError) -> Self {
        Self::Stack(err)
    }
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Busy => f.write_str("transmit in progress"),
            Self::Stack(err) => write!(f, "{err}"),
            Self::AlreadyInitialized => f.write_str("already initialized"),
            Self::InvalidState(state) => write!(f, "invalid in state {state}"),
            Self::Oversized { len, capacity } => {
                write!(f, "{len} bytes exceeds transmit capacity {capacity}")
            }
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for BridgeError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Busy => defmt::write!(f, "Busy"),
            Self::Stack(err) => defmt::write!(f, "Stack({})", err),
            Self::AlreadyInitialized => defmt::write!(f, "AlreadyInitialized"),
            Self::InvalidState(state) => defmt::write!(f, "InvalidState({})", state),
            Self::Oversized { len, capacity } => {
                defmt::write!(f, "Oversized({}>{})", len, capacity);
            }
        }
    }
}

/// Bridge operation result
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Three-valued status for callers that want the classic driver API
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    /// Operation succeeded
    Ok,
    /// Transmit already in flight
    Busy,
    /// Any other failure
    Error,
}

impl<T> From<&BridgeResult<T>> for Status {
    fn from(result: &BridgeResult<T>) -> Self {
        match result {
            Ok(_) => Self::Ok,
            Err(BridgeError::Busy) => Self::Busy,
            Err(_) => Self::Error,
        }
    }
}

impl<T> From<BridgeResult<T>> for Status {
    fn from(result: BridgeResult<T>) -> Self {
        Self::from(&result)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => f.write_str("OK"),
            Self::Busy => f.write_str("BUSY"),
            Self::Error => f.write_str("ERROR"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Status {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Ok => defmt::write!(f, "OK"),
            Self::Busy => defmt::write!(f, "BUSY"),
            Self::Error => defmt::write!(f, "ERROR"),
        }
    }
}

/// Transfer counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BridgeStats {
    /// Transmits submitted to the stack
    pub tx_packets: u32,
    /// Bytes submitted to the stack
    pub tx_bytes: u32,
    /// Transmits reported complete by the stack
    pub tx_completed: u32,
    /// Transmits rejected with `Busy`
    pub busy_rejections: u32,
    /// Packets delivered by the stack
    pub rx_packets: u32,
    /// Bytes accepted into the mailbox
    pub rx_bytes: u32,
    /// Packets that did not fully fit the mailbox
    pub rx_overruns: u32,
    /// Bytes lost to overruns
    pub rx_dropped: u32,
}

#[cfg(feature = "defmt")]
impl defmt::Format for BridgeStats {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "tx {}/{}B busy {} rx {}/{}B overrun {}",
            self.tx_packets,
            self.tx_bytes,
            self.busy_rejections,
            self.rx_packets,
            self.rx_bytes,
            self.rx_overruns
        );
    }
}

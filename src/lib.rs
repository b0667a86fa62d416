//! USB CDC Transport Bridge
//!
//! A minimal USB CDC ACM (virtual serial port) transport for
//! microcontrollers. The USB protocol engine itself lives in an external
//! device stack; this crate configures it, owns a single receive and a
//! single transmit buffer, and enforces one outstanding transfer per
//! direction.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      APPLICATION                             │
//! │        transmit / read / receive_arm / reset / suspend       │
//! ├─────────────────────────────────────────────────────────────┤
//! │                    CDC TRANSPORT BRIDGE                      │
//! │  TX buffer │ RX buffer │ RxMailbox │ ControlHandler          │
//! ├─────────────────────────────────────────────────────────────┤
//! │                  DEVICE STACK (trait seam)                   │
//! │   embassy-usb adapter   │   MockStack (host tests)           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Design Principles
//!
//! - **Explicit context**: the bridge owns its stack; no global handle
//! - **Reject, never queue**: a second transmit while one is in flight is `Busy`
//! - **Always re-arm**: every reception re-arms the receive buffer
//! - **No panics**: every failure is a returned error

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

#[cfg(all(feature = "std", feature = "embedded"))]
compile_error!("features `std` and `embedded` are mutually exclusive; build firmware with --no-default-features --features embedded");

// This must go first so the logging macros are visible to later modules.
mod fmt;

// Re-export dependencies needed by applications (only in embedded mode)
#[cfg(feature = "embedded")]
pub use embassy_usb;

/// CDC Transport Bridge
///
/// The bridge state machine, buffers and callbacks.
pub mod bridge;

/// Class control requests
///
/// The nine CDC requests and the handler strategy.
pub mod control;

/// Bridge configuration and constants
pub mod config;

/// USB descriptors
pub mod descriptor;

/// Receive mailbox
pub mod mailbox;

/// Thread/interrupt shared bridge
pub mod shared;

/// Device stack seam
pub mod stack;

/// Shared types used across modules
pub mod types;

/// USB Subsystem
///
/// embassy-usb implementation of the device stack.
#[cfg(feature = "embedded")]
pub mod usb;

/// Prelude module for common imports
pub mod prelude {
    //! Convenient re-exports for common types and traits.

    pub use crate::bridge::CdcBridge;
    pub use crate::config::*;
    pub use crate::control::{CdcRequest, ControlHandler, LineStateControl, NoopControl};
    pub use crate::mailbox::OverflowPolicy;
    pub use crate::shared::SharedBridge;
    pub use crate::stack::{ClassInterface, DeviceStack};
    pub use crate::types::*;
}

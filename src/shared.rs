//! Bridge shared between thread and interrupt context
//!
//! The application thread and the USB interrupt both mutate the busy/armed
//! flags. Every access goes through a `critical_section` lock, so the
//! interrupt can never observe a half-updated bridge.

use core::cell::RefCell;

use critical_section::Mutex;

use crate::bridge::CdcBridge;
use crate::control::ControlHandler;
use crate::stack::DeviceStack;
use crate::types::{BridgeResult, Status};

/// Critical-section protected bridge, suitable for a `static`
pub struct SharedBridge<S, C> {
    inner: Mutex<RefCell<CdcBridge<S, C>>>,
}

impl<S: DeviceStack, C: ControlHandler> SharedBridge<S, C> {
    /// Wrap a bridge
    #[must_use]
    pub const fn new(bridge: CdcBridge<S, C>) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(bridge)),
        }
    }

    /// Run `f` with exclusive access to the bridge
    ///
    /// Must not be re-entered from within `f`.
    pub fn lock<R>(&self, f: impl FnOnce(&mut CdcBridge<S, C>) -> R) -> R {
        critical_section::with(|cs| f(&mut *self.inner.borrow_ref_mut(cs)))
    }

    /// Initialise the stack
    pub fn init(&self) -> Status {
        self.status(CdcBridge::init)
    }

    /// Submit bytes for transmission
    pub fn transmit(&self, data: &[u8]) -> Status {
        self.lock(|bridge| bridge.transmit(data)).into()
    }

    /// Arm the receive buffer
    pub fn receive_arm(&self) -> Status {
        self.status(CdcBridge::receive_arm)
    }

    /// Tear down the stack
    pub fn reset(&self) -> Status {
        self.status(CdcBridge::reset)
    }

    /// Suspend the stack
    pub fn suspend(&self) -> Status {
        self.status(CdcBridge::suspend)
    }

    /// Resume the stack
    pub fn resume(&self) -> Status {
        self.status(CdcBridge::resume)
    }

    /// Drain received bytes into `buf`
    pub fn read(&self, buf: &mut [u8]) -> usize {
        self.lock(|bridge| bridge.read(buf))
    }

    /// Forward an OUT transfer from interrupt context
    pub fn on_data_received(&self, packet: &[u8]) -> BridgeResult<usize> {
        self.lock(|bridge| bridge.on_data_received(packet))
    }

    /// Forward an IN completion from interrupt context
    pub fn on_transmit_complete(&self) {
        self.lock(CdcBridge::on_transmit_complete);
    }

    fn status(&self, op: fn(&mut CdcBridge<S, C>) -> BridgeResult<()>) -> Status {
        self.lock(|bridge| op(bridge)).into()
    }
}

//! CDC transport bridge
//!
//! Owns the receive and transmit buffers and the single-outstanding-transfer
//! discipline on top of a [`DeviceStack`]. Inbound bytes arrive only through
//! [`CdcBridge::on_data_received`], which always re-arms the receive buffer
//! before returning so the channel never stalls.
//!
//! ```text
//!  application ──transmit──▶ CdcBridge ──set_tx_buffer/transmit_packet──▶ stack
//!  application ◀──read───── RxMailbox ◀──on_data_received── stack (IRQ)
//! ```

use crate::config::{BridgeConfig, RX_BUFFER_SIZE, TX_BUFFER_SIZE};
use crate::control::{CdcRequest, ControlError, ControlHandler};
use crate::descriptor::{CdcClass, DeviceDescriptor};
use crate::mailbox::RxMailbox;
use crate::stack::{ClassInterface, DeviceStack};
use crate::types::{BridgeError, BridgeResult, BridgeState, BridgeStats, StackError};

/// Single-buffer CDC transport bridge
pub struct CdcBridge<S, C> {
    stack: S,
    control: C,
    config: BridgeConfig,
    state: BridgeState,
    tx_buffer: [u8; TX_BUFFER_SIZE],
    tx_len: usize,
    tx_busy: bool,
    tx_complete: bool,
    rx_buffer: [u8; RX_BUFFER_SIZE],
    rx_armed: bool,
    mailbox: RxMailbox<RX_BUFFER_SIZE>,
    stats: BridgeStats,
}

impl<S: DeviceStack, C: ControlHandler> CdcBridge<S, C> {
    /// Create an uninitialised bridge around a stack instance
    ///
    /// No stack calls are made until [`CdcBridge::init`].
    #[must_use]
    pub const fn new(stack: S, control: C, config: BridgeConfig) -> Self {
        Self {
            stack,
            control,
            config,
            state: BridgeState::Uninitialized,
            tx_buffer: [0; TX_BUFFER_SIZE],
            tx_len: 0,
            tx_busy: false,
            tx_complete: false,
            rx_buffer: [0; RX_BUFFER_SIZE],
            rx_armed: false,
            mailbox: RxMailbox::new(config.overflow),
            stats: BridgeStats {
                tx_packets: 0,
                tx_bytes: 0,
                tx_completed: 0,
                busy_rejections: 0,
                rx_packets: 0,
                rx_bytes: 0,
                rx_overruns: 0,
                rx_dropped: 0,
            },
        }
    }

    /// Configure the stack, register the CDC class and its callback table,
    /// start the device and arm the first receive
    pub fn init(&mut self) -> BridgeResult<()> {
        if self.state.is_initialized() {
            warn!("init rejected: already {}", self.state);
            return Err(BridgeError::AlreadyInitialized);
        }

        let descriptor = DeviceDescriptor::from_config(&self.config);
        let class = CdcClass::new(self.config.speed.bulk_packet_size());

        let started = self
            .stack
            .init(&descriptor, self.config.speed)
            .and_then(|()| self.stack.register_class(&class))
            .and_then(|()| self.stack.register_interface())
            .and_then(|()| self.stack.start());
        if let Err(err) = started {
            error!("stack setup failed: {}", err);
            self.rollback();
            return Err(err.into());
        }

        self.clear_transfers();
        self.stats = BridgeStats::default();
        self.state = BridgeState::Active;

        if let Err(err) = self.arm() {
            error!("initial receive arm failed: {}", err);
            self.rollback();
            return Err(err);
        }

        info!(
            "CDC bridge up ({:04X}:{:04X} {})",
            descriptor.vid, descriptor.pid, self.config.speed
        );
        Ok(())
    }

    fn rollback(&mut self) {
        if let Err(err) = self.stack.deinit() {
            warn!("rollback deinit failed: {}", err);
        }
        self.clear_transfers();
        self.state = BridgeState::Uninitialized;
    }

    fn clear_transfers(&mut self) {
        self.tx_len = 0;
        self.tx_busy = false;
        self.tx_complete = false;
        self.rx_armed = false;
        self.mailbox.clear();
    }

    /// Submit `data` for transmission
    ///
    /// The bytes are copied into the bridge's transmit buffer, so `data` may
    /// be reused as soon as this returns. Fails with [`BridgeError::Busy`]
    /// while a previous transmit is still in flight, whether the bridge or
    /// the stack notices it first.
    pub fn transmit(&mut self, data: &[u8]) -> BridgeResult<()> {
        if self.state != BridgeState::Active {
            debug!("transmit rejected in state {}", self.state);
            return Err(BridgeError::InvalidState(self.state));
        }
        if data.len() > TX_BUFFER_SIZE {
            return Err(BridgeError::Oversized {
                len: data.len(),
                capacity: TX_BUFFER_SIZE,
            });
        }
        if self.tx_busy || self.stack.is_tx_busy() {
            self.stats.busy_rejections = self.stats.busy_rejections.wrapping_add(1);
            trace!("transmit busy");
            return Err(BridgeError::Busy);
        }

        self.tx_buffer[..data.len()].copy_from_slice(data);
        self.tx_len = data.len();

        let submitted = self
            .stack
            .set_tx_buffer(&self.tx_buffer[..self.tx_len])
            .and_then(|()| self.stack.transmit_packet());
        if let Err(err) = submitted {
            self.tx_len = 0;
            if err == StackError::Busy {
                self.stats.busy_rejections = self.stats.busy_rejections.wrapping_add(1);
                trace!("stack still draining previous transmit");
                return Err(BridgeError::Busy);
            }
            error!("transmit of {} bytes failed: {}", data.len(), err);
            return Err(err.into());
        }

        self.tx_busy = true;
        self.tx_complete = false;
        self.stats.tx_packets = self.stats.tx_packets.wrapping_add(1);
        self.stats.tx_bytes = self.stats.tx_bytes.wrapping_add(self.tx_len as u32);
        trace!("transmit {} bytes", self.tx_len);
        Ok(())
    }

    /// Arm the receive buffer for the next OUT transfer
    pub fn receive_arm(&mut self) -> BridgeResult<()> {
        if !self.state.is_initialized() {
            return Err(BridgeError::InvalidState(self.state));
        }
        self.arm()
    }

    fn arm(&mut self) -> BridgeResult<()> {
        self.rx_armed = false;
        self.stack.set_rx_buffer(self.rx_buffer.len())?;
        self.stack.receive_packet()?;
        self.rx_armed = true;
        Ok(())
    }

    /// Tear down the device stack
    ///
    /// `init` must be called again before any other operation. Resetting an
    /// uninitialised bridge is rejected without touching the stack.
    pub fn reset(&mut self) -> BridgeResult<()> {
        if !self.state.is_initialized() {
            debug!("reset rejected: not initialized");
            return Err(BridgeError::InvalidState(self.state));
        }

        if let Err(err) = self.stack.deinit() {
            error!("stack deinit failed: {}", err);
            return Err(err.into());
        }

        self.clear_transfers();
        self.state = BridgeState::Uninitialized;
        info!("CDC bridge reset");
        Ok(())
    }

    /// Forward a suspend request to the stack
    pub fn suspend(&mut self) -> BridgeResult<()> {
        if self.state != BridgeState::Active {
            return Err(BridgeError::InvalidState(self.state));
        }
        self.stack.suspend()?;
        self.state = BridgeState::Suspended;
        debug!("suspended");
        Ok(())
    }

    /// Forward a resume request to the stack
    pub fn resume(&mut self) -> BridgeResult<()> {
        if self.state != BridgeState::Suspended {
            return Err(BridgeError::InvalidState(self.state));
        }
        self.stack.resume()?;
        self.state = BridgeState::Active;
        debug!("resumed");
        Ok(())
    }

    /// OUT transfer completed; called from the stack's interrupt context
    ///
    /// Copies the packet into the armed buffer, offers it to the mailbox and
    /// re-arms before returning. Returns the number of bytes the mailbox
    /// accepted.
    pub fn on_data_received(&mut self, packet: &[u8]) -> BridgeResult<usize> {
        if !self.state.is_initialized() {
            warn!("dropping {} bytes: not initialized", packet.len());
            return Err(BridgeError::InvalidState(self.state));
        }
        if !self.rx_armed {
            warn!("packet delivered while no buffer armed");
        }
        self.rx_armed = false;

        let len = packet.len().min(self.rx_buffer.len());
        self.rx_buffer[..len].copy_from_slice(&packet[..len]);

        let delivery = self.mailbox.push(&self.rx_buffer[..len]);
        self.stats.rx_packets = self.stats.rx_packets.wrapping_add(1);
        self.stats.rx_bytes = self.stats.rx_bytes.wrapping_add(delivery.accepted as u32);
        if delivery.overrun() {
            self.stats.rx_overruns = self.stats.rx_overruns.wrapping_add(1);
            self.stats.rx_dropped = self.stats.rx_dropped.wrapping_add(delivery.dropped as u32);
            warn!("rx overrun: {} bytes dropped", delivery.dropped);
        }

        if let Err(err) = self.arm() {
            error!("re-arm after receive failed: {}", err);
            return Err(err);
        }
        Ok(delivery.accepted)
    }

    /// IN transfer completed; called from the stack's interrupt context
    pub fn on_transmit_complete(&mut self) {
        if !self.tx_busy {
            return;
        }
        self.tx_busy = false;
        self.tx_complete = true;
        self.tx_len = 0;
        self.stats.tx_completed = self.stats.tx_completed.wrapping_add(1);
    }

    /// Bus entered suspend; called by the stack glue
    ///
    /// Unlike [`CdcBridge::suspend`] this makes no stack call, the bus is
    /// already idle.
    pub fn on_bus_suspend(&mut self) {
        if self.state == BridgeState::Active {
            self.state = BridgeState::Suspended;
            debug!("bus suspended");
        }
    }

    /// Bus left suspend; called by the stack glue
    pub fn on_bus_resume(&mut self) {
        if self.state == BridgeState::Suspended {
            self.state = BridgeState::Active;
            debug!("bus resumed");
        }
    }

    /// Host configured the CDC interface
    pub fn on_class_init(&mut self) -> BridgeResult<()> {
        if !self.state.is_initialized() {
            return Ok(());
        }
        self.tx_len = 0;
        self.tx_busy = false;
        self.arm()
    }

    /// Host deconfigured the CDC interface
    pub fn on_class_deinit(&mut self) {
        self.tx_busy = false;
        self.rx_armed = false;
    }

    /// Dispatch a class request to the control handler
    ///
    /// Unknown codes are accepted without effect.
    pub fn on_control(&mut self, code: u8, value: u16, data: &mut [u8]) -> Result<(), ControlError> {
        match CdcRequest::from_code(code) {
            Some(request) => {
                trace!("control {}", request);
                self.control.control(request, value, data)
            }
            None => {
                debug!("ignoring unknown class request 0x{:02X}", code);
                Ok(())
            }
        }
    }

    /// Check and clear the transmit-complete flag
    pub fn take_transmit_complete(&mut self) -> bool {
        core::mem::take(&mut self.tx_complete)
    }

    /// Check if a transmit is in flight
    #[must_use]
    pub const fn is_transmit_pending(&self) -> bool {
        self.tx_busy
    }

    /// Check if a receive buffer is armed
    #[must_use]
    pub const fn is_receive_armed(&self) -> bool {
        self.rx_armed
    }

    /// Drain received bytes into `buf`
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        self.mailbox.read(buf)
    }

    /// Read one CR/LF-terminated line of received bytes
    pub fn read_line(&mut self) -> Option<heapless::Vec<u8, RX_BUFFER_SIZE>> {
        self.mailbox.read_line()
    }

    /// Received bytes not yet read
    #[must_use]
    pub fn available(&self) -> usize {
        self.mailbox.available()
    }

    /// Current lifecycle state
    #[must_use]
    pub const fn state(&self) -> BridgeState {
        self.state
    }

    /// Transfer counters
    #[must_use]
    pub const fn stats(&self) -> BridgeStats {
        self.stats
    }

    /// Configuration in use
    #[must_use]
    pub const fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Control handler
    #[must_use]
    pub const fn control_handler(&self) -> &C {
        &self.control
    }

    /// Control handler, mutably
    pub fn control_handler_mut(&mut self) -> &mut C {
        &mut self.control
    }

    /// Underlying stack
    #[must_use]
    pub const fn stack(&self) -> &S {
        &self.stack
    }

    /// Underlying stack, mutably
    pub fn stack_mut(&mut self) -> &mut S {
        &mut self.stack
    }
}

impl<S: DeviceStack, C: ControlHandler> ClassInterface for CdcBridge<S, C> {
    type Error = BridgeError;

    fn class_init(&mut self) -> Result<(), Self::Error> {
        self.on_class_init()
    }

    fn class_deinit(&mut self) -> Result<(), Self::Error> {
        self.on_class_deinit();
        Ok(())
    }

    fn control(&mut self, code: u8, value: u16, data: &mut [u8]) -> Result<(), ControlError> {
        self.on_control(code, value, data)
    }

    fn receive(&mut self, packet: &[u8]) -> Result<usize, Self::Error> {
        self.on_data_received(packet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::NoopControl;
    use crate::stack::mock::{MockStack, StackCall, StackOp};
    use crate::types::DeviceSpeed;

    fn bridge() -> CdcBridge<MockStack, NoopControl> {
        CdcBridge::new(MockStack::new(), NoopControl, BridgeConfig::default())
    }

    #[test]
    fn init_call_order() {
        let mut b = bridge();
        b.init().unwrap();

        let calls = b.stack().calls();
        assert_eq!(calls[0], StackCall::Init(DeviceSpeed::Full));
        assert!(matches!(calls[1], StackCall::RegisterClass(_)));
        assert_eq!(calls[2], StackCall::RegisterInterface);
        assert_eq!(calls[3], StackCall::Start);
        assert_eq!(calls[4], StackCall::SetRxBuffer(RX_BUFFER_SIZE));
        assert_eq!(calls[5], StackCall::ReceivePacket);
        assert_eq!(b.state(), BridgeState::Active);
    }

    #[test]
    fn failed_start_rolls_back() {
        let mut b = bridge();
        b.stack_mut().fail(StackOp::Start, StackError::Fail);

        assert_eq!(b.init(), Err(BridgeError::Stack(StackError::Fail)));
        assert_eq!(b.state(), BridgeState::Uninitialized);
        assert_eq!(b.stack().count(StackOp::Deinit), 1);

        b.stack_mut().clear_failure(StackOp::Start);
        assert!(b.init().is_ok());
    }

    #[test]
    fn failed_submit_leaves_bridge_idle() {
        let mut b = bridge();
        b.init().unwrap();
        b.stack_mut().fail(StackOp::TransmitPacket, StackError::NotConfigured);

        assert_eq!(
            b.transmit(b"hi"),
            Err(BridgeError::Stack(StackError::NotConfigured))
        );
        assert!(!b.is_transmit_pending());
    }

    #[test]
    fn unknown_control_code_accepted() {
        let mut b = bridge();
        let mut data = [0u8; 4];
        assert!(b.on_control(0x7F, 0, &mut data).is_ok());
    }
}

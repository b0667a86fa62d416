//! Recording device stack for host tests
//!
//! Every call is logged in order, transmitted packets are kept, and any
//! operation can be told to fail. [`host_write`] and [`complete_transmit`]
//! play the part of the interrupt-driven glue a real stack would provide.

extern crate std;

use std::vec::Vec;

use crate::bridge::CdcBridge;
use crate::control::ControlHandler;
use crate::descriptor::{CdcClass, DeviceDescriptor};
use crate::stack::DeviceStack;
use crate::types::{BridgeResult, DeviceSpeed, StackError, StackResult};

/// Stack operation selector, used to inject failures
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StackOp {
    /// `init`
    Init,
    /// `register_class`
    RegisterClass,
    /// `register_interface`
    RegisterInterface,
    /// `start`
    Start,
    /// `deinit`
    Deinit,
    /// `suspend`
    Suspend,
    /// `resume`
    Resume,
    /// `set_tx_buffer`
    SetTxBuffer,
    /// `transmit_packet`
    TransmitPacket,
    /// `set_rx_buffer`
    SetRxBuffer,
    /// `receive_packet`
    ReceivePacket,
}

/// One recorded stack call
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StackCall {
    /// `init` with the requested speed
    Init(DeviceSpeed),
    /// `register_class`
    RegisterClass(CdcClass),
    /// `register_interface`
    RegisterInterface,
    /// `start`
    Start,
    /// `deinit`
    Deinit,
    /// `suspend`
    Suspend,
    /// `resume`
    Resume,
    /// `set_tx_buffer` with the latched length
    SetTxBuffer(usize),
    /// `transmit_packet`
    TransmitPacket,
    /// `set_rx_buffer` with the declared capacity
    SetRxBuffer(usize),
    /// `receive_packet`
    ReceivePacket,
}

impl StackCall {
    /// Operation this call belongs to
    #[must_use]
    pub const fn op(&self) -> StackOp {
        match self {
            Self::Init(_) => StackOp::Init,
            Self::RegisterClass(_) => StackOp::RegisterClass,
            Self::RegisterInterface => StackOp::RegisterInterface,
            Self::Start => StackOp::Start,
            Self::Deinit => StackOp::Deinit,
            Self::Suspend => StackOp::Suspend,
            Self::Resume => StackOp::Resume,
            Self::SetTxBuffer(_) => StackOp::SetTxBuffer,
            Self::TransmitPacket => StackOp::TransmitPacket,
            Self::SetRxBuffer(_) => StackOp::SetRxBuffer,
            Self::ReceivePacket => StackOp::ReceivePacket,
        }
    }
}

/// In-memory device stack
#[derive(Debug, Default)]
pub struct MockStack {
    calls: Vec<StackCall>,
    failures: Vec<(StackOp, StackError)>,
    descriptor: Option<DeviceDescriptor>,
    device_bytes: Option<[u8; DeviceDescriptor::LEN]>,
    functional_bytes: Option<[u8; CdcClass::FUNCTIONAL_LEN]>,
    interface_bound: bool,
    running: bool,
    suspended: bool,
    tx_latched: Vec<u8>,
    tx_in_flight: bool,
    sent: Vec<Vec<u8>>,
    rx_capacity: usize,
    rx_armed: bool,
}

impl MockStack {
    /// Create an idle stack
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every future call to `op` fail with `err`
    pub fn fail(&mut self, op: StackOp, err: StackError) {
        self.failures.retain(|(o, _)| *o != op);
        self.failures.push((op, err));
    }

    /// Stop injecting failures for `op`
    pub fn clear_failure(&mut self, op: StackOp) {
        self.failures.retain(|(o, _)| *o != op);
    }

    fn record(&mut self, call: StackCall) -> StackResult<()> {
        let op = call.op();
        self.calls.push(call);
        match self.failures.iter().find(|(o, _)| *o == op) {
            Some(&(_, err)) => Err(err),
            None => Ok(()),
        }
    }

    /// All calls so far, oldest first
    #[must_use]
    pub fn calls(&self) -> &[StackCall] {
        &self.calls
    }

    /// Forget recorded calls
    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Number of recorded calls to `op`
    #[must_use]
    pub fn count(&self, op: StackOp) -> usize {
        self.calls.iter().filter(|c| c.op() == op).count()
    }

    /// Packets handed to the host, oldest first
    #[must_use]
    pub fn sent(&self) -> &[Vec<u8>] {
        &self.sent
    }

    /// Descriptor passed to the last successful `init`
    #[must_use]
    pub fn descriptor(&self) -> Option<&DeviceDescriptor> {
        self.descriptor.as_ref()
    }

    /// Device descriptor as it would go on the wire
    #[must_use]
    pub fn device_descriptor_bytes(&self) -> Option<&[u8; DeviceDescriptor::LEN]> {
        self.device_bytes.as_ref()
    }

    /// Functional descriptors of the registered class
    #[must_use]
    pub fn functional_descriptor_bytes(&self) -> Option<&[u8; CdcClass::FUNCTIONAL_LEN]> {
        self.functional_bytes.as_ref()
    }

    /// Check if the class callback table is bound
    #[must_use]
    pub const fn is_interface_bound(&self) -> bool {
        self.interface_bound
    }

    /// Check if the stack is connected to the bus
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running
    }

    /// Check if the stack is suspended
    #[must_use]
    pub const fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Check if an OUT transfer is armed
    #[must_use]
    pub const fn is_rx_armed(&self) -> bool {
        self.rx_armed
    }

    /// Capacity declared by the last `set_rx_buffer`
    #[must_use]
    pub const fn rx_capacity(&self) -> usize {
        self.rx_capacity
    }

    /// Check if an IN transfer is in flight
    #[must_use]
    pub const fn is_tx_in_flight(&self) -> bool {
        self.tx_in_flight
    }

    /// Buffer latched by the last `set_tx_buffer`
    #[must_use]
    pub fn tx_latched(&self) -> &[u8] {
        &self.tx_latched
    }
}

impl DeviceStack for MockStack {
    fn init(&mut self, descriptor: &DeviceDescriptor, speed: DeviceSpeed) -> StackResult<()> {
        self.record(StackCall::Init(speed))?;
        self.descriptor = Some(*descriptor);
        self.device_bytes = Some(descriptor.to_bytes());
        Ok(())
    }

    fn register_class(&mut self, class: &CdcClass) -> StackResult<()> {
        self.record(StackCall::RegisterClass(*class))?;
        self.functional_bytes = Some(class.functional_descriptors());
        Ok(())
    }

    fn register_interface(&mut self) -> StackResult<()> {
        self.record(StackCall::RegisterInterface)?;
        self.interface_bound = true;
        Ok(())
    }

    fn start(&mut self) -> StackResult<()> {
        self.record(StackCall::Start)?;
        self.running = true;
        Ok(())
    }

    fn deinit(&mut self) -> StackResult<()> {
        self.record(StackCall::Deinit)?;
        self.descriptor = None;
        self.device_bytes = None;
        self.functional_bytes = None;
        self.interface_bound = false;
        self.running = false;
        self.suspended = false;
        self.tx_in_flight = false;
        self.rx_armed = false;
        Ok(())
    }

    fn suspend(&mut self) -> StackResult<()> {
        self.record(StackCall::Suspend)?;
        self.suspended = true;
        Ok(())
    }

    fn resume(&mut self) -> StackResult<()> {
        self.record(StackCall::Resume)?;
        self.suspended = false;
        Ok(())
    }

    fn set_tx_buffer(&mut self, data: &[u8]) -> StackResult<()> {
        self.record(StackCall::SetTxBuffer(data.len()))?;
        self.tx_latched.clear();
        self.tx_latched.extend_from_slice(data);
        Ok(())
    }

    fn transmit_packet(&mut self) -> StackResult<()> {
        self.record(StackCall::TransmitPacket)?;
        if self.tx_in_flight {
            return Err(StackError::Busy);
        }
        self.tx_in_flight = true;
        self.sent.push(self.tx_latched.clone());
        Ok(())
    }

    fn is_tx_busy(&self) -> bool {
        self.tx_in_flight
    }

    fn set_rx_buffer(&mut self, capacity: usize) -> StackResult<()> {
        self.record(StackCall::SetRxBuffer(capacity))?;
        self.rx_capacity = capacity;
        Ok(())
    }

    fn receive_packet(&mut self) -> StackResult<()> {
        self.record(StackCall::ReceivePacket)?;
        self.rx_armed = true;
        Ok(())
    }
}

/// Simulate the host sending `data` as one OUT transfer
///
/// Returns `None` when no receive buffer is armed, i.e. the channel has
/// stalled and the stack would NAK the host.
pub fn host_write<C: ControlHandler>(
    bridge: &mut CdcBridge<MockStack, C>,
    data: &[u8],
) -> Option<BridgeResult<usize>> {
    let stack = bridge.stack_mut();
    if !stack.rx_armed {
        return None;
    }
    stack.rx_armed = false;
    let len = data.len().min(stack.rx_capacity);
    Some(bridge.on_data_received(&data[..len]))
}

/// Simulate the stack finishing the in-flight IN transfer
pub fn complete_transmit<C: ControlHandler>(bridge: &mut CdcBridge<MockStack, C>) {
    bridge.stack_mut().tx_in_flight = false;
    bridge.on_transmit_complete();
}

/// Simulate the host closing the port
///
/// Any in-flight IN transfer is dropped without a completion, and the bridge
/// sees the class deinit.
pub fn host_disconnect<C: ControlHandler>(bridge: &mut CdcBridge<MockStack, C>) {
    let stack = bridge.stack_mut();
    stack.tx_in_flight = false;
    stack.tx_latched.clear();
    stack.rx_armed = false;
    bridge.on_class_deinit();
}

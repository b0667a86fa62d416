//! USB CDC ACM (Serial) over embassy-usb
//!
//! [`EmbassyStack`] turns the bridge's synchronous stack calls into requests
//! on a [`UsbLink`]; the async tasks service those requests against the
//! real USB peripheral and report completions back into the bridge.
//!
//! [`CdcAcmPort`] builds the ACM function from [`CdcClass`] and hands every
//! class request on the communication interface to [`ControlPort`], which
//! dispatches it into the bridge's control handler.

use core::sync::atomic::{AtomicBool, Ordering};

use embassy_futures::select::{select, select3, Either, Either3};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use embassy_usb::control::{InResponse, OutResponse, Recipient, Request, RequestType};
use embassy_usb::driver::{Driver, Endpoint, EndpointError, EndpointIn, EndpointOut};
use embassy_usb::{Builder, Handler, UsbDevice};
use heapless::Vec;

use crate::config::{TX_BUFFER_SIZE, USB_CDC_PACKET_SIZE, USB_EP0_PACKET_SIZE, USB_MAX_POWER_MA};
use crate::control::ControlHandler;
use crate::descriptor::{
    CdcClass, DeviceDescriptor, CDC_SUBCLASS_ACM, USB_CLASS_CDC, USB_CLASS_CDC_DATA,
};
use crate::shared::SharedBridge;
use crate::stack::DeviceStack;
use crate::types::{DeviceSpeed, StackError, StackResult};

/// No class-specific protocol
const CDC_PROTOCOL_NONE: u8 = 0x00;
/// Notification endpoint packet size
const NOTIFY_PACKET_SIZE: u16 = 8;
/// Notification endpoint polling interval
const NOTIFY_INTERVAL_MS: u8 = 255;

/// One outbound transfer
pub type Packet = Vec<u8, TX_BUFFER_SIZE>;

/// Synchronisation shared by [`EmbassyStack`] and the USB tasks
pub struct UsbLink {
    outbound: Channel<CriticalSectionRawMutex, Packet, 1>,
    start: Signal<CriticalSectionRawMutex, ()>,
    stop: Signal<CriticalSectionRawMutex, ()>,
    wakeup: Signal<CriticalSectionRawMutex, ()>,
    armed: Signal<CriticalSectionRawMutex, ()>,
    rx_armed: AtomicBool,
    configured: AtomicBool,
    bound: AtomicBool,
}

impl UsbLink {
    /// Create an idle link
    #[must_use]
    pub const fn new() -> Self {
        Self {
            outbound: Channel::new(),
            start: Signal::new(),
            stop: Signal::new(),
            wakeup: Signal::new(),
            armed: Signal::new(),
            rx_armed: AtomicBool::new(false),
            configured: AtomicBool::new(false),
            bound: AtomicBool::new(false),
        }
    }

    /// Check if the host has opened the port
    pub fn is_configured(&self) -> bool {
        self.configured.load(Ordering::Acquire)
    }

    /// Check if class events are routed to the bridge
    pub fn is_bound(&self) -> bool {
        self.bound.load(Ordering::Acquire)
    }

    /// Drop a transfer queued for a host that is gone
    fn drain_outbound(&self) {
        while self.outbound.try_receive().is_ok() {}
    }
}

impl Default for UsbLink {
    fn default() -> Self {
        Self::new()
    }
}

/// Device stack backed by embassy-usb
pub struct EmbassyStack<'a> {
    link: &'a UsbLink,
    latched: Packet,
}

impl<'a> EmbassyStack<'a> {
    /// Create a stack bound to `link`
    #[must_use]
    pub const fn new(link: &'a UsbLink) -> Self {
        Self {
            link,
            latched: Vec::new(),
        }
    }
}

impl DeviceStack for EmbassyStack<'_> {
    fn init(&mut self, descriptor: &DeviceDescriptor, speed: DeviceSpeed) -> StackResult<()> {
        if speed != DeviceSpeed::Full {
            return Err(StackError::Unsupported);
        }
        // Class requests are staged in an EP0-sized buffer
        let encoded = descriptor.to_bytes();
        if encoded[7] != USB_EP0_PACKET_SIZE {
            return Err(StackError::Unsupported);
        }
        debug!("embassy stack init {}", descriptor);
        self.latched.clear();
        Ok(())
    }

    fn register_class(&mut self, class: &CdcClass) -> StackResult<()> {
        if class.packet_size != USB_CDC_PACKET_SIZE {
            return Err(StackError::Unsupported);
        }
        Ok(())
    }

    fn register_interface(&mut self) -> StackResult<()> {
        self.link.bound.store(true, Ordering::Release);
        Ok(())
    }

    fn start(&mut self) -> StackResult<()> {
        self.link.stop.reset();
        self.link.start.signal(());
        Ok(())
    }

    fn deinit(&mut self) -> StackResult<()> {
        self.link.start.reset();
        self.link.stop.signal(());
        self.link.bound.store(false, Ordering::Release);
        self.link.rx_armed.store(false, Ordering::Release);
        self.link.drain_outbound();
        self.latched.clear();
        Ok(())
    }

    fn suspend(&mut self) -> StackResult<()> {
        // The host owns bus suspend; it is reported through the class handler
        Err(StackError::Unsupported)
    }

    fn resume(&mut self) -> StackResult<()> {
        self.link.wakeup.signal(());
        Ok(())
    }

    fn set_tx_buffer(&mut self, data: &[u8]) -> StackResult<()> {
        self.latched.clear();
        self.latched
            .extend_from_slice(data)
            .map_err(|()| StackError::Fail)
    }

    fn transmit_packet(&mut self) -> StackResult<()> {
        if !self.link.is_configured() {
            return Err(StackError::NotConfigured);
        }
        self.link
            .outbound
            .try_send(self.latched.clone())
            .map_err(|_| StackError::Busy)
    }

    fn is_tx_busy(&self) -> bool {
        !self.link.outbound.is_empty()
    }

    fn set_rx_buffer(&mut self, _capacity: usize) -> StackResult<()> {
        Ok(())
    }

    fn receive_packet(&mut self) -> StackResult<()> {
        self.link.rx_armed.store(true, Ordering::Release);
        self.link.armed.signal(());
        Ok(())
    }
}

/// Class request and bus event handler for the communication interface
///
/// Registered with the embassy-usb builder by [`CdcAcmPort::new`]. Requests
/// are answered only once the stack has bound the interface.
pub struct ControlPort<'d, S: DeviceStack, C: ControlHandler> {
    comm_if: u8,
    link: &'d UsbLink,
    bridge: &'d SharedBridge<S, C>,
}

impl<'d, S: DeviceStack, C: ControlHandler> ControlPort<'d, S, C> {
    /// Create a handler forwarding into `bridge`
    #[must_use]
    pub const fn new(link: &'d UsbLink, bridge: &'d SharedBridge<S, C>) -> Self {
        Self {
            comm_if: 0,
            link,
            bridge,
        }
    }

    fn is_ours(&self, req: &Request) -> bool {
        (req.request_type, req.recipient, req.index)
            == (RequestType::Class, Recipient::Interface, u16::from(self.comm_if))
    }
}

impl<S: DeviceStack, C: ControlHandler> Handler for ControlPort<'_, S, C> {
    fn suspended(&mut self, suspended: bool) {
        if !self.link.is_bound() {
            return;
        }
        if suspended {
            self.bridge.lock(|b| b.on_bus_suspend());
        } else {
            self.bridge.lock(|b| b.on_bus_resume());
        }
    }

    fn control_out(&mut self, req: Request, data: &[u8]) -> Option<OutResponse> {
        if !self.is_ours(&req) {
            return None;
        }
        if !self.link.is_bound() {
            return Some(OutResponse::Rejected);
        }

        let mut buf = [0u8; USB_EP0_PACKET_SIZE as usize];
        let n = data.len().min(buf.len());
        buf[..n].copy_from_slice(&data[..n]);
        match self.bridge.lock(|b| b.on_control(req.request, req.value, &mut buf[..n])) {
            Ok(()) => Some(OutResponse::Accepted),
            Err(err) => {
                warn!("class request 0x{:02X} rejected: {}", req.request, err);
                Some(OutResponse::Rejected)
            }
        }
    }

    fn control_in<'a>(&'a mut self, req: Request, buf: &'a mut [u8]) -> Option<InResponse<'a>> {
        if !self.is_ours(&req) {
            return None;
        }
        if !self.link.is_bound() {
            return Some(InResponse::Rejected);
        }

        let n = usize::from(req.length).min(buf.len());
        let reply = &mut buf[..n];
        reply.fill(0);
        match self.bridge.lock(|b| b.on_control(req.request, req.value, reply)) {
            Ok(()) => Some(InResponse::Accepted(&buf[..n])),
            Err(err) => {
                warn!("class request 0x{:02X} rejected: {}", req.request, err);
                Some(InResponse::Rejected)
            }
        }
    }
}

/// CDC ACM function: notification endpoint plus a bulk data pair
pub struct CdcAcmPort<'d, D: Driver<'d>> {
    _notify_ep: D::EndpointIn,
    read_ep: D::EndpointOut,
    write_ep: D::EndpointIn,
}

impl<'d, D: Driver<'d>> CdcAcmPort<'d, D> {
    /// Add the ACM function to `builder` and register `control` for its requests
    pub fn new<S: DeviceStack, C: ControlHandler>(
        builder: &mut Builder<'d, D>,
        control: &'d mut ControlPort<'d, S, C>,
        packet_size: u16,
    ) -> Self {
        let mut func = builder.function(USB_CLASS_CDC, CDC_SUBCLASS_ACM, CDC_PROTOCOL_NONE);

        // Communication interface
        let mut iface = func.interface();
        let comm_if = u8::from(iface.interface_number());
        let class = CdcClass {
            comm_interface: comm_if,
            data_interface: comm_if + 1,
            packet_size,
        };
        let mut alt = iface.alt_setting(USB_CLASS_CDC, CDC_SUBCLASS_ACM, CDC_PROTOCOL_NONE, None);
        let functional = class.functional_descriptors();
        let mut rest = &functional[..];
        while let [len, kind, ..] = rest {
            let len = usize::from(*len);
            alt.descriptor(*kind, &rest[2..len]);
            rest = &rest[len..];
        }
        let notify_ep = alt.endpoint_interrupt_in(NOTIFY_PACKET_SIZE, NOTIFY_INTERVAL_MS);

        // Data interface
        let mut iface = func.interface();
        let mut alt = iface.alt_setting(USB_CLASS_CDC_DATA, 0x00, CDC_PROTOCOL_NONE, None);
        let read_ep = alt.endpoint_bulk_out(packet_size);
        let write_ep = alt.endpoint_bulk_in(packet_size);
        drop(func);

        control.comm_if = comm_if;
        builder.handler(control);

        Self {
            _notify_ep: notify_ep,
            read_ep,
            write_ep,
        }
    }

    /// Bulk packet size
    pub fn max_packet_size(&self) -> u16 {
        self.read_ep.info().max_packet_size
    }

    /// Wait for the host to select the configuration
    pub async fn wait_connection(&mut self) {
        self.read_ep.wait_enabled().await;
    }

    /// Read one OUT packet
    pub async fn read_packet(&mut self, buf: &mut [u8]) -> Result<usize, EndpointError> {
        self.read_ep.read(buf).await
    }

    /// Write one IN packet
    pub async fn write_packet(&mut self, data: &[u8]) -> Result<(), EndpointError> {
        self.write_ep.write(data).await
    }
}

/// embassy-usb configuration for a device descriptor
#[must_use]
pub fn usb_config(descriptor: &DeviceDescriptor) -> embassy_usb::Config<'static> {
    let mut config = embassy_usb::Config::new(descriptor.vid, descriptor.pid);
    config.manufacturer = Some(descriptor.manufacturer);
    config.product = Some(descriptor.product);
    config.serial_number = Some(descriptor.serial);
    config.device_release = descriptor.device_release;
    config.max_packet_size_0 = descriptor.max_packet_size_0;
    config.max_power = USB_MAX_POWER_MA;
    config.supports_remote_wakeup = true;
    config
}

/// Run the USB device between `start` and `stop` requests
pub async fn run_device<'d, D: Driver<'d>>(mut device: UsbDevice<'d, D>, link: &UsbLink) -> ! {
    loop {
        link.start.wait().await;
        info!("USB device started");

        loop {
            match select(device.run_until_suspend(), link.stop.wait()).await {
                Either::First(()) => {}
                Either::Second(()) => break,
            }

            debug!("bus suspended");
            match select3(device.wait_resume(), link.wakeup.wait(), link.stop.wait()).await {
                Either3::First(()) => debug!("bus resumed by host"),
                Either3::Second(()) => {
                    if device.remote_wakeup().await.is_err() {
                        warn!("remote wakeup rejected");
                    }
                }
                Either3::Third(()) => break,
            }
        }

        device.disable().await;
        info!("USB device stopped");
    }
}

/// Pump packets between the CDC class and the bridge
pub async fn run_cdc<'d, D, S, C>(
    class: &mut CdcAcmPort<'d, D>,
    link: &UsbLink,
    bridge: &SharedBridge<S, C>,
) -> !
where
    D: Driver<'d>,
    S: DeviceStack,
    C: ControlHandler,
{
    let mut packet = [0u8; USB_CDC_PACKET_SIZE as usize];
    loop {
        class.wait_connection().await;
        link.configured.store(true, Ordering::Release);
        if let Err(err) = bridge.lock(|b| b.on_class_init()) {
            error!("class init failed: {}", err);
        }
        info!("CDC connected");

        let reason = pump(class, link, bridge, &mut packet).await;

        link.configured.store(false, Ordering::Release);
        link.drain_outbound();
        bridge.lock(|b| b.on_class_deinit());
        info!("CDC disconnected ({})", reason);
    }
}

async fn pump<'d, D, S, C>(
    class: &mut CdcAcmPort<'d, D>,
    link: &UsbLink,
    bridge: &SharedBridge<S, C>,
    packet: &mut [u8],
) -> EndpointError
where
    D: Driver<'d>,
    S: DeviceStack,
    C: ControlHandler,
{
    loop {
        // Without an armed buffer the OUT endpoint is left alone and the host is NAKed.
        if link.rx_armed.load(Ordering::Acquire) {
            match select(class.read_packet(packet), link.outbound.receive()).await {
                Either::First(Ok(n)) => {
                    link.rx_armed.store(false, Ordering::Release);
                    if let Err(err) = bridge.on_data_received(&packet[..n]) {
                        warn!("receive dropped: {}", err);
                    }
                }
                Either::First(Err(err)) => return err,
                Either::Second(out) => {
                    if let Err(err) = write_all(class, &out).await {
                        return err;
                    }
                    bridge.on_transmit_complete();
                }
            }
        } else {
            match select(link.outbound.receive(), link.armed.wait()).await {
                Either::First(out) => {
                    if let Err(err) = write_all(class, &out).await {
                        return err;
                    }
                    bridge.on_transmit_complete();
                }
                Either::Second(()) => {}
            }
        }
    }
}

/// Write a transfer as max-size packets, closing it with a ZLP when needed
async fn write_all<'d, D: Driver<'d>>(
    class: &mut CdcAcmPort<'d, D>,
    data: &[u8],
) -> Result<(), EndpointError> {
    let max = usize::from(class.max_packet_size());
    for chunk in data.chunks(max) {
        class.write_packet(chunk).await?;
    }
    if data.len() % max == 0 {
        class.write_packet(&[]).await?;
    }
    Ok(())
}

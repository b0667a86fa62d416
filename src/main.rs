//! CDC Echo Firmware
//!
//! Entry point for the STM32F103 ("blue pill") USB serial bridge.
//! Brings up the USB peripheral, spawns the device and CDC tasks, and
//! echoes every received byte back to the host.

#![no_std]
#![no_main]

use defmt::{info, warn};
use embassy_executor::Spawner;
use embassy_stm32::gpio::{Level, Output, Speed};
use embassy_stm32::time::Hertz;
use embassy_stm32::usb::Driver;
use embassy_stm32::{bind_interrupts, peripherals, usb};
use embassy_time::{Duration, Timer};
use embassy_usb::{Builder, UsbDevice};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use cdc_bridge::descriptor::DeviceDescriptor;
use cdc_bridge::prelude::*;
use cdc_bridge::usb::cdc::{
    run_cdc, run_device, usb_config, CdcAcmPort, ControlPort, EmbassyStack, UsbLink,
};

// Bind interrupt handlers
bind_interrupts!(struct Irqs {
    USB_LP_CAN1_RX0 => usb::InterruptHandler<peripherals::USB>;
});

type UsbDriver = Driver<'static, peripherals::USB>;
type Stack = EmbassyStack<'static>;
type Bridge = SharedBridge<Stack, LineStateControl>;

static LINK: UsbLink = UsbLink::new();
static BRIDGE: Bridge = SharedBridge::new(CdcBridge::new(
    EmbassyStack::new(&LINK),
    LineStateControl::new(),
    BridgeConfig::new(),
));

static CONFIG_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
static BOS_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
static MSOS_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
static CONTROL_BUF: StaticCell<[u8; 64]> = StaticCell::new();
static CONTROL_PORT: StaticCell<ControlPort<'static, Stack, LineStateControl>> = StaticCell::new();

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("CDC bridge firmware v{}", env!("CARGO_PKG_VERSION"));

    // 8 MHz HSE -> 72 MHz SYSCLK, 48 MHz USB clock
    let mut config = embassy_stm32::Config::default();
    {
        use embassy_stm32::rcc::{
            AHBPrescaler, APBPrescaler, Hse, HseMode, Pll, PllMul, PllPreDiv, PllSource, Sysclk,
        };
        config.rcc.hse = Some(Hse {
            freq: Hertz(8_000_000),
            mode: HseMode::Oscillator,
        });
        config.rcc.pll = Some(Pll {
            src: PllSource::HSE,
            prediv: PllPreDiv::DIV1,
            mul: PllMul::MUL9,
        });
        config.rcc.sys = Sysclk::PLL1_P;
        config.rcc.ahb_pre = AHBPrescaler::DIV1;
        config.rcc.apb1_pre = APBPrescaler::DIV2;
        config.rcc.apb2_pre = APBPrescaler::DIV1;
    }
    let mut p = embassy_stm32::init(config);

    info!("Peripherals initialized");

    // Pull D+ low so the host re-enumerates after a reset (no software pull-up on F1)
    {
        let _dp = Output::new(&mut p.PA12, Level::Low, Speed::Low);
        Timer::after(Duration::from_millis(10)).await;
    }

    let driver = Driver::new(p.USB, Irqs, p.PA12, p.PA11);
    let descriptor = DeviceDescriptor::from_config(&BRIDGE.lock(|b| *b.config()));

    let mut builder = Builder::new(
        driver,
        usb_config(&descriptor),
        CONFIG_DESCRIPTOR.init([0; 256]),
        BOS_DESCRIPTOR.init([0; 256]),
        MSOS_DESCRIPTOR.init([0; 256]),
        CONTROL_BUF.init([0; 64]),
    );
    let control = CONTROL_PORT.init(ControlPort::new(&LINK, &BRIDGE));
    let class = CdcAcmPort::new(&mut builder, control, USB_CDC_PACKET_SIZE);
    let device = builder.build();

    // Status LED (PC13, active low on the blue pill)
    let led = Output::new(p.PC13, Level::High, Speed::Low);

    spawner.spawn(usb_device_task(device)).unwrap();
    spawner.spawn(cdc_task(class)).unwrap();
    spawner.spawn(heartbeat_task(led)).unwrap();
    info!("Tasks spawned, entering echo loop");

    let status = BRIDGE.init();
    info!("bridge init: {}", status);

    let mut buf = [0u8; RX_BUFFER_SIZE];
    loop {
        let n = BRIDGE.read(&mut buf);
        if n == 0 {
            Timer::after(Duration::from_millis(1)).await;
            continue;
        }

        loop {
            match BRIDGE.transmit(&buf[..n]) {
                Status::Ok => break,
                Status::Busy => Timer::after(Duration::from_millis(1)).await,
                Status::Error => {
                    warn!("echo of {} bytes dropped", n);
                    break;
                }
            }
        }
    }
}

/// Runs the USB device state machine
#[embassy_executor::task]
async fn usb_device_task(device: UsbDevice<'static, UsbDriver>) {
    run_device(device, &LINK).await
}

/// Moves packets between the CDC class and the bridge
#[embassy_executor::task]
async fn cdc_task(mut class: CdcAcmPort<'static, UsbDriver>) {
    run_cdc(&mut class, &LINK, &BRIDGE).await
}

/// Heartbeat task - blinks LED to show system is running
#[embassy_executor::task]
async fn heartbeat_task(mut led: Output<'static>) {
    loop {
        led.set_low();
        Timer::after(Duration::from_millis(100)).await;
        led.set_high();
        Timer::after(Duration::from_millis(900)).await;
    }
}

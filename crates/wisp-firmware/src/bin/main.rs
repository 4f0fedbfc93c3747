#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
#![deny(clippy::large_stack_frames)]

use embassy_executor::Spawner;
use embassy_net::StackResources;
use embassy_time::{Instant, Timer};
use esp_hal::clock::CpuClock;
use esp_hal::i2c::master::{Config as I2cConfig, I2c};
use esp_hal::rng::Rng;
use esp_hal::time::Rate;
use esp_hal::timer::timg::TimerGroup;
use log::{error, info};
use rtt_target::rprintln;
use ssd1306::prelude::DisplayRotation;
use ssd1306::size::DisplaySize128x32;
use ssd1306::{I2CDisplayInterface, Ssd1306};

use wisp_core::config::InternetConfig;
use wisp_core::{Config, PanelDisplay, PlaceholderSensors, StatusController};
use wisp_firmware::network::{WifiLink, connection_task, net_task};
use wisp_firmware::panel::OledPanel;
use wisp_firmware::secrets::{WIFI_PASSWORD, WIFI_SSID};
use wisp_firmware::sntp::{SntpClock, sntp_task};

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    rtt_target::rprintln!("PANIC: {}", info);
    loop {}
}

extern crate alloc;

// This creates a default app-descriptor required by the esp-idf bootloader.
esp_bootloader_esp_idf::esp_app_desc!();

macro_rules! mk_static {
    ($t:ty,$val:expr) => {{
        static STATIC_CELL: static_cell::StaticCell<$t> = static_cell::StaticCell::new();
        #[deny(unused_attributes)]
        let x = STATIC_CELL.uninit().write(($val));
        x
    }};
}

/// Nothing to show without a panel; park here.
fn halt(reason: &dyn core::fmt::Debug) -> ! {
    error!("Halted: {:?}", reason);
    loop {}
}

#[allow(
    clippy::large_stack_frames,
    reason = "it's not unusual to allocate larger buffers etc. in main"
)]
#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    rtt_target::rtt_init_log!();

    let peripherals = esp_hal::init(esp_hal::Config::default().with_cpu_clock(CpuClock::max()));

    esp_alloc::heap_allocator!(#[esp_hal::ram(reclaimed)] size: 73744);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    rprintln!("Embassy initialized!");

    let config: &'static Config<'static> = mk_static!(
        Config<'static>,
        Config {
            internet: InternetConfig {
                ssid: WIFI_SSID,
                password: WIFI_PASSWORD,
            },
            ..Config::default()
        }
    );

    // Panel on I2C0, SDA = GPIO5, SCL = GPIO4
    let bus = config.display.bus;
    let i2c = match I2c::new(
        peripherals.I2C0,
        I2cConfig::default().with_frequency(Rate::from_hz(bus.frequency_hz)),
    ) {
        Ok(i2c) => i2c.with_sda(peripherals.GPIO5).with_scl(peripherals.GPIO4),
        Err(e) => halt(&e),
    };
    let interface = I2CDisplayInterface::new_custom_address(i2c, bus.address);
    let driver = Ssd1306::new(interface, DisplaySize128x32, DisplayRotation::Rotate0)
        .into_buffered_graphics_mode();
    let mut display = PanelDisplay::new(OledPanel::new(driver));

    // WiFi station with DHCP
    let radio = match esp_radio::init() {
        Ok(radio) => mk_static!(esp_radio::Controller<'static>, radio),
        Err(e) => halt(&e),
    };
    let (wifi_controller, interfaces) =
        match esp_radio::wifi::new(radio, peripherals.WIFI, Default::default()) {
            Ok(wifi) => wifi,
            Err(e) => halt(&e),
        };

    let rng = Rng::new();
    let seed = (rng.random() as u64) << 32 | rng.random() as u64;
    let (stack, runner) = embassy_net::new(
        interfaces.sta,
        embassy_net::Config::dhcpv4(Default::default()),
        mk_static!(StackResources<4>, StackResources::<4>::new()),
        seed,
    );

    let mut controller = StatusController::new(
        config,
        WifiLink::new(stack),
        SntpClock,
        PlaceholderSensors,
        Instant::now(),
    );

    if let Err(e) = controller.start(&mut display) {
        halt(&e);
    }

    spawner.spawn(net_task(runner)).ok();
    spawner
        .spawn(connection_task(wifi_controller, &config.internet))
        .ok();
    spawner.spawn(sntp_task(stack)).ok();

    info!("wisp running");

    loop {
        controller.poll(Instant::now(), &mut display);
        Timer::at(controller.next_wakeup()).await;
    }
}

//! WiFi station link
//!
//! The connection task owns the radio and keeps the station associated,
//! retrying every five seconds. The network stack task runs DHCP. The core
//! only sees [`WifiLink`], which reads their state without blocking.

use core::net::Ipv4Addr;
use core::sync::atomic::{AtomicI32, Ordering};

use embassy_futures::select::{Either, select};
use embassy_net::{Runner, Stack};
use embassy_time::{Duration, Timer};
use esp_radio::wifi::{ClientConfig, ModeConfig, WifiController, WifiDevice, WifiEvent};
use log::{info, warn};

use wisp_core::NetworkLink;
use wisp_core::config::InternetConfig;

const RETRY_DELAY: Duration = Duration::from_secs(5);
const SIGNAL_REFRESH: Duration = Duration::from_secs(5);

/// Reported while not associated.
pub const NO_SIGNAL_DBM: i32 = 0;

/// Last RSSI read by the connection task, dBm
static SIGNAL_DBM: AtomicI32 = AtomicI32::new(NO_SIGNAL_DBM);

/// [`NetworkLink`] over the embassy-net stack.
#[derive(Clone, Copy)]
pub struct WifiLink {
    stack: Stack<'static>,
}

impl WifiLink {
    pub fn new(stack: Stack<'static>) -> Self {
        Self { stack }
    }
}

impl NetworkLink for WifiLink {
    fn is_connected(&self) -> bool {
        self.stack.is_link_up() && self.stack.config_v4().is_some()
    }

    fn local_address(&self) -> Option<Ipv4Addr> {
        self.stack.config_v4().map(|config| config.address.address())
    }

    fn signal_strength(&self) -> i32 {
        SIGNAL_DBM.load(Ordering::Relaxed)
    }
}

/// Keeps the station associated for the lifetime of the device.
#[embassy_executor::task]
pub async fn connection_task(
    mut controller: WifiController<'static>,
    credentials: &'static InternetConfig<'static>,
) {
    loop {
        if matches!(controller.is_connected(), Ok(true)) {
            match select(
                controller.wait_for_event(WifiEvent::StaDisconnected),
                Timer::after(SIGNAL_REFRESH),
            )
            .await
            {
                Either::First(_) => {
                    warn!("WiFi disconnected");
                    SIGNAL_DBM.store(NO_SIGNAL_DBM, Ordering::Relaxed);
                    Timer::after(RETRY_DELAY).await;
                }
                Either::Second(_) => {
                    if let Ok(rssi) = controller.rssi() {
                        SIGNAL_DBM.store(rssi, Ordering::Relaxed);
                    }
                    continue;
                }
            }
        }

        if !matches!(controller.is_started(), Ok(true)) {
            let client_config = ModeConfig::Client(
                ClientConfig::default()
                    .with_ssid(credentials.ssid.into())
                    .with_password(credentials.password.into()),
            );
            if let Err(e) = controller.set_config(&client_config) {
                warn!("WiFi config rejected: {:?}", e);
                Timer::after(RETRY_DELAY).await;
                continue;
            }
            if let Err(e) = controller.start_async().await {
                warn!("WiFi start failed: {:?}", e);
                Timer::after(RETRY_DELAY).await;
                continue;
            }
            info!("WiFi started");
        }

        info!("Connecting to {}", credentials.ssid);
        match controller.connect_async().await {
            Ok(()) => {
                info!("WiFi connected");
                if let Ok(rssi) = controller.rssi() {
                    SIGNAL_DBM.store(rssi, Ordering::Relaxed);
                }
            }
            Err(e) => {
                warn!("Failed to connect: {:?}, retrying", e);
                Timer::after(RETRY_DELAY).await;
            }
        }
    }
}

#[embassy_executor::task]
pub async fn net_task(mut runner: Runner<'static, WifiDevice<'static>>) {
    runner.run().await
}

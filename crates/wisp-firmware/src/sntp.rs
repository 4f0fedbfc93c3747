//! SNTP client
//!
//! [`SntpClock`] is the [`TimeSource`] handed to the core. Configuring it
//! wakes [`sntp_task`], which resolves the servers, asks them for the time
//! over UDP and stores the answer as an anchor: Unix seconds plus the
//! monotonic instant it arrived. Reads extrapolate from the anchor, so they
//! never touch the network.

use core::cell::Cell;

use embassy_net::dns::{DnsQueryType, DnsSocket};
use embassy_net::udp::{PacketMetadata, UdpSocket};
use embassy_net::{IpAddress, Stack};
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Instant, Timer, with_timeout};
use heapless::String;
use log::{debug, info, warn};
use thiserror_no_std::Error;

use wisp_core::config::TimeSyncConfig;
use wisp_core::{TimeReadError, TimeSource, Timestamp};

const NTP_PORT: u16 = 123;
const NTP_PACKET_LEN: usize = 48;
/// Seconds from 1900-01-01 to 1970-01-01
const NTP_UNIX_OFFSET: i64 = 2_208_988_800;
const REPLY_TIMEOUT: Duration = Duration::from_secs(3);

pub const MAX_SERVER_NAME: usize = 64;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SntpError {
    #[error("no free UDP port")]
    Bind,
    #[error("request could not be sent")]
    Send,
    #[error("no reply within 3 s")]
    Timeout,
    #[error("receive failed")]
    Receive,
    #[error("reply too short ({0} bytes)")]
    ShortReply(usize),
    #[error("no server answered")]
    NoServer,
}

#[derive(Debug, Clone, Copy)]
struct Anchor {
    unix_secs: i64,
    at: Instant,
}

/// What the task should query, and how often.
#[derive(Debug, Clone)]
pub struct SntpRequest {
    pub servers: heapless::Vec<String<MAX_SERVER_NAME>, 2>,
    pub period: Duration,
}

static ANCHOR: Mutex<CriticalSectionRawMutex, Cell<Option<Anchor>>> = Mutex::new(Cell::new(None));
static REQUEST: Signal<CriticalSectionRawMutex, SntpRequest> = Signal::new();

/// Wall clock backed by [`sntp_task`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SntpClock;

impl TimeSource for SntpClock {
    /// Starts [`sntp_task`]. The first answer takes a DNS lookup and a UDP
    /// round trip, so the sync that runs right after this call reads
    /// [`TimeReadError::NotSynchronized`] and the time appears at the next
    /// recurring sync.
    fn configure(&mut self, config: &TimeSyncConfig<'_>) {
        let mut servers = heapless::Vec::new();
        for server in config.servers {
            match String::try_from(server) {
                Ok(name) => {
                    let _ = servers.push(name);
                }
                Err(_) => warn!("SNTP server name too long, skipped: {}", server),
            }
        }
        REQUEST.signal(SntpRequest {
            servers,
            period: config.sync_period(),
        });
    }

    fn now_utc(&mut self) -> Result<Timestamp, TimeReadError> {
        let anchor = ANCHOR
            .lock(|cell| cell.get())
            .ok_or(TimeReadError::NotSynchronized)?;
        let elapsed = Instant::now().saturating_duration_since(anchor.at);
        Ok(Timestamp::from_unix_secs(
            anchor.unix_secs + elapsed.as_secs() as i64,
        ))
    }
}

/// Waits to be configured, then refreshes the anchor once per sync period.
#[embassy_executor::task]
pub async fn sntp_task(stack: Stack<'static>) {
    let request = REQUEST.wait().await;
    let dns = DnsSocket::new(stack);
    info!(
        "SNTP: {} servers, every {} s",
        request.servers.len(),
        request.period.as_secs()
    );

    loop {
        match query_any(stack, &dns, &request.servers).await {
            Ok(unix_secs) => {
                ANCHOR.lock(|cell| {
                    cell.set(Some(Anchor {
                        unix_secs,
                        at: Instant::now(),
                    }))
                });
                debug!("SNTP: anchored at {}", unix_secs);
            }
            Err(e) => warn!("SNTP: {}", e),
        }
        Timer::after(request.period).await;
    }
}

async fn query_any(
    stack: Stack<'static>,
    dns: &DnsSocket<'static>,
    servers: &[String<MAX_SERVER_NAME>],
) -> Result<i64, SntpError> {
    for server in servers {
        let addresses = match dns.query(server.as_str(), DnsQueryType::A).await {
            Ok(addresses) => addresses,
            Err(e) => {
                warn!("SNTP: {} did not resolve: {:?}", server, e);
                continue;
            }
        };
        let Some(&address) = addresses.first() else {
            continue;
        };

        match query(stack, address).await {
            Ok(unix_secs) => {
                info!("SNTP: answer from {}", server);
                return Ok(unix_secs);
            }
            Err(e) => warn!("SNTP: {}: {}", server, e),
        }
    }
    Err(SntpError::NoServer)
}

async fn query(stack: Stack<'static>, server: IpAddress) -> Result<i64, SntpError> {
    let mut rx_meta = [PacketMetadata::EMPTY; 1];
    let mut rx_buffer = [0u8; 128];
    let mut tx_meta = [PacketMetadata::EMPTY; 1];
    let mut tx_buffer = [0u8; 128];

    let mut socket = UdpSocket::new(
        stack,
        &mut rx_meta,
        &mut rx_buffer,
        &mut tx_meta,
        &mut tx_buffer,
    );
    socket.bind(0).map_err(|_| SntpError::Bind)?;

    let mut packet = [0u8; NTP_PACKET_LEN];
    // LI = 0, VN = 3, Mode = 3 (client)
    packet[0] = 0x1B;

    socket
        .send_to(&packet, (server, NTP_PORT))
        .await
        .map_err(|_| SntpError::Send)?;

    let (len, _) = with_timeout(REPLY_TIMEOUT, socket.recv_from(&mut packet))
        .await
        .map_err(|_| SntpError::Timeout)?
        .map_err(|_| SntpError::Receive)?;

    parse_reply(&packet[..len])
}

/// Transmit timestamp seconds (bytes 40..44) as Unix seconds.
fn parse_reply(reply: &[u8]) -> Result<i64, SntpError> {
    let Some(&[a, b, c, d]) = reply.get(40..44).and_then(|s| <&[u8; 4]>::try_from(s).ok()) else {
        return Err(SntpError::ShortReply(reply.len()));
    };
    let ntp_secs = u32::from_be_bytes([a, b, c, d]);
    Ok(i64::from(ntp_secs) - NTP_UNIX_OFFSET)
}

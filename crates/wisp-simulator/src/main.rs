//! Desktop simulator for the wisp status panel.
//!
//! Runs the real [`StatusController`] in real time against a mock network
//! link, the host clock and the placeholder sensors. The 128x32 panel is an
//! `embedded-graphics-simulator` framebuffer; every frame that changes is
//! printed to the terminal as block characters.
//!
//! The link comes up three seconds after start, so the first few frames show
//! `00:00` and `0.0.0.0` before the clock sync takes over.
//!
//! ```text
//! RUST_LOG=info cargo run -p wisp-simulator [-- <seconds>]
//! ```

use std::io::Write as _;
use std::net::Ipv4Addr;
use std::time::{SystemTime, UNIX_EPOCH};

use embassy_time::{Duration, Instant};
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;
use embedded_graphics_simulator::SimulatorDisplay;
use log::{error, info};

use wisp_core::config::TimeSyncConfig;
use wisp_core::{
    Config, DisplayError, NetworkLink, Panel, PanelDisplay, PlaceholderSensors, StatusController,
    TimeReadError, TimeSource, Timestamp,
};

/// The mock link reports up this long after start.
const LINK_UP_AFTER: Duration = Duration::from_secs(3);

const MOCK_ADDRESS: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 42);

// ---------------------------------------------------------------------------
// Mock collaborators
// ---------------------------------------------------------------------------

/// Station link that associates after [`LINK_UP_AFTER`].
struct MockNetwork {
    started: Instant,
}

impl MockNetwork {
    fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

impl NetworkLink for MockNetwork {
    fn is_connected(&self) -> bool {
        self.started.elapsed() >= LINK_UP_AFTER
    }

    fn local_address(&self) -> Option<Ipv4Addr> {
        self.is_connected().then_some(MOCK_ADDRESS)
    }

    /// Drifts between roughly -49 and -61 dBm.
    fn signal_strength(&self) -> i32 {
        let t = self.started.elapsed().as_millis() as f64 / 1000.0;
        (-55.0 + 6.0 * (t / 20.0).sin()) as i32
    }
}

/// Host wall clock. Reads fail until the sync has configured it, like an
/// SNTP client that has not had an answer yet.
#[derive(Default)]
struct HostClock {
    configured: bool,
}

impl TimeSource for HostClock {
    fn configure(&mut self, config: &TimeSyncConfig<'_>) {
        info!(
            "Host clock stands in for {} / {}",
            config.servers[0], config.servers[1]
        );
        self.configured = true;
    }

    fn now_utc(&mut self) -> Result<Timestamp, TimeReadError> {
        if !self.configured {
            return Err(TimeReadError::NotSynchronized);
        }
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|_| TimeReadError::Clock)?;
        Ok(Timestamp::from_unix_secs(since_epoch.as_secs() as i64))
    }
}

// ---------------------------------------------------------------------------
// Terminal panel
// ---------------------------------------------------------------------------

/// Simulator framebuffer that prints itself whenever it was drawn to.
struct TerminalPanel {
    display: SimulatorDisplay<BinaryColor>,
    changed: bool,
    frames: u32,
}

impl TerminalPanel {
    fn new(size: Size) -> Self {
        Self {
            display: SimulatorDisplay::new(size),
            changed: false,
            frames: 0,
        }
    }

    /// Two pixel rows per text line using half-block characters.
    fn print(&self) -> std::io::Result<()> {
        let size = self.display.size();
        let lit = |x: u32, y: u32| {
            y < size.height && self.display.get_pixel(Point::new(x as i32, y as i32)).is_on()
        };

        let border: String = "-".repeat(size.width as usize);
        let mut out = std::io::stdout().lock();
        writeln!(out, "+{}+ frame {}", border, self.frames)?;
        for y in (0..size.height).step_by(2) {
            let line: String = (0..size.width)
                .map(|x| match (lit(x, y), lit(x, y + 1)) {
                    (true, true) => '█',
                    (true, false) => '▀',
                    (false, true) => '▄',
                    (false, false) => ' ',
                })
                .collect();
            writeln!(out, "|{}|", line)?;
        }
        writeln!(out, "+{}+", border)?;
        out.flush()
    }
}

impl OriginDimensions for TerminalPanel {
    fn size(&self) -> Size {
        self.display.size()
    }
}

impl DrawTarget for TerminalPanel {
    type Color = BinaryColor;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        self.changed = true;
        self.display.draw_iter(pixels)
    }

    fn fill_contiguous<I>(&mut self, area: &Rectangle, colors: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Self::Color>,
    {
        self.changed = true;
        self.display.fill_contiguous(area, colors)
    }
}

impl Panel for TerminalPanel {
    fn init(&mut self) -> Result<(), DisplayError> {
        info!("Terminal panel {}x{}", self.size().width, self.size().height);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), DisplayError> {
        if !self.changed {
            return Ok(());
        }
        self.changed = false;
        self.frames += 1;
        self.print().map_err(|_| DisplayError::Bus)
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() {
    env_logger::init();

    let run_for = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse::<u64>().ok())
        .map(Duration::from_secs);

    let config = Config::default();
    info!("Starting wisp simulator");
    info!(
        "Display: {}x{}, frame every {} ms, sync every {} s",
        config.display.width,
        config.display.height,
        config.display.frame_period_ms,
        config.time.sync_period_ms / 1000
    );

    let mut display = PanelDisplay::new(TerminalPanel::new(Size::new(
        config.display.width,
        config.display.height,
    )));

    let started = Instant::now();
    let mut controller = StatusController::new(
        &config,
        MockNetwork::new(),
        HostClock::default(),
        PlaceholderSensors,
        started,
    );

    if let Err(e) = controller.start(&mut display) {
        error!("Cannot start: {}", e);
        std::process::exit(1);
    }

    loop {
        let now = Instant::now();
        if run_for.is_some_and(|limit| now.duration_since(started) >= limit) {
            break;
        }

        controller.poll(now, &mut display);

        let wake = controller.next_wakeup();
        let now = Instant::now();
        if wake > now {
            let nap = wake - now;
            std::thread::sleep(std::time::Duration::from_micros(nap.as_micros()));
        }
    }

    info!(
        "Simulator exiting after {} frames, {} syncs",
        controller.render_loop().frames(),
        controller.clock_sync().sync_count()
    );
}

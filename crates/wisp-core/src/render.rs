//! Status screen layout and frame pacing
//!
//! The screen is eight text items on a 128x32 panel:
//!
//! ```text
//! 3.347V                  12:34
//! Out: -12.4°C        27.4%
//! Pressure (in.Hg):      730
//! 192.168.1.42           -61
//! ```
//!
//! [`compose`] turns a snapshot into positioned strings; [`RenderLoop`] draws
//! them through a [`StatusDisplay`] at most once per frame period.

use core::fmt::Write;

use embassy_time::{Duration, Instant};
use heapless::{String, Vec};
use log::{trace, warn};

use crate::display::StatusDisplay;
use crate::error::DisplayError;
use crate::snapshot::DisplaySnapshot;

/// Longest string on screen is the pressure label (17 characters).
pub const TEXT_CAPACITY: usize = 24;

/// Number of text items in a frame.
pub const FRAME_ITEMS: usize = 8;

const ROW_HEIGHT_PX: i32 = 8;
const TIME_X_PX: i32 = 96;
const HUMIDITY_X_PX: i32 = 90;
const VALUE_X_PX: i32 = 102;

pub const PRESSURE_LABEL: &str = "Pressure (in.Hg):";

/// Drawn in place of a field whose value does not fit [`TEXT_CAPACITY`].
pub const OVERFLOW_TEXT: &str = "----";

/// One positioned string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextItem {
    pub x: i32,
    pub y: i32,
    pub text: String<TEXT_CAPACITY>,
}

impl TextItem {
    fn new(x: i32, row: i32, args: core::fmt::Arguments<'_>) -> Self {
        let mut text = String::new();
        if text.write_fmt(args).is_err() {
            warn!("Value at ({}, {}) does not fit, drawing {}", x, row, OVERFLOW_TEXT);
            text.clear();
            let _ = text.push_str(OVERFLOW_TEXT);
        }
        Self {
            x,
            y: row * ROW_HEIGHT_PX,
            text,
        }
    }
}

/// Lay out one frame.
///
/// Pure function of its inputs, so rendering an unchanged snapshot twice
/// produces the same frame.
pub fn compose(snapshot: &DisplaySnapshot, signal_strength: i32) -> Vec<TextItem, FRAME_ITEMS> {
    let (hour, minute) = snapshot
        .local_time
        .map(|t| (t.hour, t.minute))
        .unwrap_or((0, 0));

    let items = [
        TextItem::new(0, 0, format_args!("{:.3}V", snapshot.battery_voltage)),
        TextItem::new(TIME_X_PX, 0, format_args!("{:02}:{:02}", hour, minute)),
        TextItem::new(0, 1, format_args!("Out: {:3.1}°C", snapshot.temperature)),
        TextItem::new(HUMIDITY_X_PX, 1, format_args!("{:3.1}%", snapshot.humidity)),
        TextItem::new(0, 2, format_args!("{}", PRESSURE_LABEL)),
        TextItem::new(VALUE_X_PX, 2, format_args!("{:4}", snapshot.pressure)),
        TextItem::new(0, 3, format_args!("{}", snapshot.address)),
        TextItem::new(VALUE_X_PX, 3, format_args!("{:4}", signal_strength)),
    ];

    items.into_iter().collect()
}

/// Redraws the snapshot at a fixed cadence.
///
/// Rendering never waits on the network or the clock: it draws whatever the
/// snapshot holds right now.
#[derive(Debug)]
pub struct RenderLoop {
    frame_period: Duration,
    next_frame: Instant,
    frames: u32,
}

impl RenderLoop {
    /// First frame is due immediately at `now`.
    pub fn new(frame_period: Duration, now: Instant) -> Self {
        Self {
            frame_period,
            next_frame: now,
            frames: 0,
        }
    }

    pub fn frames(&self) -> u32 {
        self.frames
    }

    pub fn next_frame(&self) -> Instant {
        self.next_frame
    }

    pub fn is_due(&self, now: Instant) -> bool {
        now >= self.next_frame
    }

    /// Draw one frame unconditionally.
    pub fn render<D: StatusDisplay>(
        &mut self,
        snapshot: &DisplaySnapshot,
        signal_strength: i32,
        display: &mut D,
    ) -> Result<(), DisplayError> {
        display.clear();
        for item in compose(snapshot, signal_strength) {
            display.draw_text(item.x, item.y, &item.text);
        }
        self.frames = self.frames.wrapping_add(1);
        display.present()
    }

    /// Draw a frame if one is due at `now`. Returns whether a frame was drawn.
    ///
    /// Present failures are logged and the loop carries on with the next
    /// frame.
    pub fn tick<D: StatusDisplay>(
        &mut self,
        now: Instant,
        snapshot: &DisplaySnapshot,
        signal_strength: i32,
        display: &mut D,
    ) -> bool {
        if !self.is_due(now) {
            return false;
        }

        self.next_frame += self.frame_period;
        if self.next_frame <= now {
            // Fell behind by more than a frame; restart the cadence from now
            self.next_frame = now + self.frame_period;
        }

        trace!("Rendering frame {}", self.frames);
        if let Err(e) = self.render(snapshot, signal_strength, display) {
            warn!("Frame {} not presented: {}", self.frames, e);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use core::net::Ipv4Addr;

    use super::*;
    use crate::time::LocalTime;

    /// Records draw calls as plain strings.
    #[derive(Default)]
    struct TextRecorder {
        frame: std::vec::Vec<(i32, i32, std::string::String)>,
        presented: usize,
        fail_present: bool,
    }

    impl StatusDisplay for TextRecorder {
        fn init(&mut self) -> Result<(), DisplayError> {
            Ok(())
        }

        fn clear(&mut self) {
            self.frame.clear();
        }

        fn draw_text(&mut self, x: i32, y: i32, text: &str) {
            self.frame.push((x, y, text.into()));
        }

        fn present(&mut self) -> Result<(), DisplayError> {
            if self.fail_present {
                return Err(DisplayError::Bus);
            }
            self.presented += 1;
            Ok(())
        }
    }

    fn texts(items: &[TextItem]) -> std::vec::Vec<&str> {
        items.iter().map(|item| item.text.as_str()).collect()
    }

    #[test]
    fn test_default_snapshot_layout() {
        let items = compose(&DisplaySnapshot::default(), -61);

        assert_eq!(
            texts(&items),
            [
                "3.347V",
                "00:00",
                "Out: -12.4°C",
                "27.4%",
                "Pressure (in.Hg):",
                " 730",
                "0.0.0.0",
                " -61",
            ]
        );

        let positions: std::vec::Vec<(i32, i32)> =
            items.iter().map(|item| (item.x, item.y)).collect();
        assert_eq!(
            positions,
            [
                (0, 0),
                (96, 0),
                (0, 8),
                (90, 8),
                (0, 16),
                (102, 16),
                (0, 24),
                (102, 24)
            ]
        );
    }

    #[test]
    fn test_synced_snapshot_layout() {
        let mut snapshot = DisplaySnapshot::default();
        snapshot.publish_sync(
            Some(LocalTime {
                year: 2024,
                month: 7,
                day: 1,
                weekday: 1,
                hour: 9,
                minute: 5,
                second: 59,
                dst: true,
            }),
            Ipv4Addr::new(192, 168, 1, 42),
        );
        snapshot.temperature = 5.0;
        snapshot.pressure = 2992;

        let items = compose(&snapshot, -7);

        assert_eq!(items[1].text, "09:05");
        assert_eq!(items[2].text, "Out: 5.0°C");
        assert_eq!(items[5].text, "2992");
        assert_eq!(items[6].text, "192.168.1.42");
        assert_eq!(items[7].text, "  -7");
    }

    #[test]
    fn test_oversized_value_draws_overflow_marker() {
        let mut snapshot = DisplaySnapshot::default();
        snapshot.temperature = f32::MAX;

        let items = compose(&snapshot, -61);

        assert_eq!(items[2].text, OVERFLOW_TEXT);
        // Neighbouring fields are unaffected
        assert_eq!(items[3].text, "27.4%");
    }

    #[test]
    fn test_render_draws_all_items_then_presents() {
        let mut render = RenderLoop::new(Duration::from_millis(200), Instant::from_secs(0));
        let mut display = TextRecorder::default();

        render
            .render(&DisplaySnapshot::default(), -61, &mut display)
            .unwrap();

        assert_eq!(display.frame.len(), FRAME_ITEMS);
        assert_eq!(display.frame[1], (96, 0, "00:00".into()));
        assert_eq!(display.presented, 1);
        assert_eq!(render.frames(), 1);
    }

    #[test]
    fn test_tick_paces_frames() {
        let mut render = RenderLoop::new(Duration::from_millis(200), Instant::from_secs(0));
        let mut display = TextRecorder::default();
        let snapshot = DisplaySnapshot::default();

        assert!(render.tick(Instant::from_millis(0), &snapshot, -61, &mut display));
        assert!(!render.tick(Instant::from_millis(100), &snapshot, -61, &mut display));
        assert!(render.tick(Instant::from_millis(200), &snapshot, -61, &mut display));
        assert_eq!(render.next_frame(), Instant::from_millis(400));

        // A long stall does not cause a burst of catch-up frames
        assert!(render.tick(Instant::from_millis(5_000), &snapshot, -61, &mut display));
        assert!(!render.tick(Instant::from_millis(5_100), &snapshot, -61, &mut display));
        assert_eq!(display.presented, 3);
    }

    #[test]
    fn test_present_failure_does_not_stop_the_loop() {
        let mut render = RenderLoop::new(Duration::from_millis(200), Instant::from_secs(0));
        let mut display = TextRecorder {
            fail_present: true,
            ..TextRecorder::default()
        };
        let snapshot = DisplaySnapshot::default();

        assert!(render.tick(Instant::from_millis(0), &snapshot, -61, &mut display));
        display.fail_present = false;
        assert!(render.tick(Instant::from_millis(200), &snapshot, -61, &mut display));
        assert_eq!(display.presented, 1);
    }
}

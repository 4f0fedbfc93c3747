//! Top-level controller
//!
//! Owns the snapshot, the scheduler and the services, and drives them from a
//! single `poll` call. The driver (firmware main loop or simulator) only has
//! to call [`StatusController::poll`] and sleep until
//! [`StatusController::next_wakeup`].

use embassy_time::{Duration, Instant};
use log::{debug, info, warn};

use crate::clock_sync::{ClockSyncService, SyncEvent};
use crate::config::Config;
use crate::display::StatusDisplay;
use crate::error::AppError;
use crate::network::NetworkLink;
use crate::render::RenderLoop;
use crate::scheduler::{Scheduler, TimerHandle};
use crate::sensors::SensorProvider;
use crate::snapshot::DisplaySnapshot;
use crate::time::TimeSource;

/// Link check, recurring sync and sensor sampling, plus one spare.
pub const TIMER_SLOTS: usize = 4;

/// Every event the controller's scheduler can deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    Sync(SyncEvent),
    SampleSensors,
}

impl From<SyncEvent> for TimerEvent {
    fn from(event: SyncEvent) -> Self {
        TimerEvent::Sync(event)
    }
}

pub struct StatusController<'a, L, T, S> {
    snapshot: DisplaySnapshot,
    scheduler: Scheduler<TimerEvent, TIMER_SLOTS>,
    clock_sync: ClockSyncService<'a>,
    render: RenderLoop,
    sample_period: Duration,
    sample_timer: Option<TimerHandle>,
    network: L,
    clock: T,
    sensors: S,
}

impl<'a, L, T, S> StatusController<'a, L, T, S>
where
    L: NetworkLink,
    T: TimeSource,
    S: SensorProvider,
{
    pub fn new(config: &Config<'a>, network: L, clock: T, sensors: S, now: Instant) -> Self {
        Self {
            snapshot: DisplaySnapshot::default(),
            scheduler: Scheduler::new(now),
            clock_sync: ClockSyncService::new(config.time.clone()),
            render: RenderLoop::new(config.display.frame_period(), now),
            sample_period: config.sensors.sample_period(),
            sample_timer: None,
            network,
            clock,
            sensors,
        }
    }

    /// Bring up the display and arm the startup timers.
    ///
    /// A display that fails to initialize is fatal: nothing is armed and the
    /// caller is expected to halt.
    pub fn start<D: StatusDisplay>(&mut self, display: &mut D) -> Result<(), AppError> {
        display.init().map_err(AppError::DisplayInit)?;

        self.clock_sync.start(&mut self.scheduler)?;

        self.sample_sensors();
        self.sample_timer = Some(
            self.scheduler
                .schedule_repeating(self.sample_period, TimerEvent::SampleSensors)?,
        );

        info!("Status controller started");
        Ok(())
    }

    /// Run every timer due at `now`, then draw a frame if one is due.
    ///
    /// Returns whether a frame was drawn.
    pub fn poll<D: StatusDisplay>(&mut self, now: Instant, display: &mut D) -> bool {
        while let Some(event) = self.scheduler.poll(now) {
            self.dispatch(event);
        }

        let signal_strength = self.network.signal_strength();
        self.render
            .tick(now, &self.snapshot, signal_strength, display)
    }

    fn dispatch(&mut self, event: TimerEvent) {
        match event {
            TimerEvent::Sync(event) => {
                if let Err(e) = self.clock_sync.on_timer(
                    event,
                    &mut self.scheduler,
                    &self.network,
                    &mut self.clock,
                    &mut self.snapshot,
                ) {
                    warn!("Clock sync could not arm its timer: {}", e);
                }
            }
            TimerEvent::SampleSensors => self.sample_sensors(),
        }
    }

    fn sample_sensors(&mut self) {
        match self.sensors.read() {
            Ok(readings) => {
                debug!("Sensors: {:?}", readings);
                self.snapshot.publish_readings(readings);
            }
            Err(e) => warn!("Sensor read failed, keeping previous values: {}", e),
        }
    }

    /// Earliest instant at which [`poll`](Self::poll) has work to do.
    pub fn next_wakeup(&self) -> Instant {
        let next_frame = self.render.next_frame();
        match self.scheduler.next_deadline() {
            Some(deadline) => deadline.min(next_frame),
            None => next_frame,
        }
    }

    pub fn snapshot(&self) -> &DisplaySnapshot {
        &self.snapshot
    }

    pub fn clock_sync(&self) -> &ClockSyncService<'a> {
        &self.clock_sync
    }

    pub fn scheduler(&self) -> &Scheduler<TimerEvent, TIMER_SLOTS> {
        &self.scheduler
    }

    pub fn render_loop(&self) -> &RenderLoop {
        &self.render
    }

    pub fn sample_timer(&self) -> Option<TimerHandle> {
        self.sample_timer
    }

    pub fn network(&self) -> &L {
        &self.network
    }

    pub fn clock_mut(&mut self) -> &mut T {
        &mut self.clock
    }

    pub fn sensors_mut(&mut self) -> &mut S {
        &mut self.sensors
    }
}

#[cfg(test)]
mod tests {
    use core::net::Ipv4Addr;

    use super::*;
    use crate::clock_sync::SyncPhase;
    use crate::config::TimeSyncConfig;
    use crate::error::{DisplayError, SensorError, TimeReadError};
    use crate::scheduler::TimerState;
    use crate::sensors::SensorReadings;
    use crate::time::Timestamp;

    struct StaticLink;

    impl NetworkLink for StaticLink {
        fn is_connected(&self) -> bool {
            false
        }

        fn local_address(&self) -> Option<Ipv4Addr> {
            None
        }

        fn signal_strength(&self) -> i32 {
            -70
        }
    }

    struct NeverSynced;

    impl TimeSource for NeverSynced {
        fn configure(&mut self, _config: &TimeSyncConfig<'_>) {}

        fn now_utc(&mut self) -> Result<Timestamp, TimeReadError> {
            Err(TimeReadError::NotSynchronized)
        }
    }

    /// Returns `next` once per read, or fails when empty.
    struct ScriptedSensors {
        next: Option<SensorReadings>,
        reads: u32,
    }

    impl SensorProvider for ScriptedSensors {
        fn read(&mut self) -> Result<SensorReadings, SensorError> {
            self.reads += 1;
            self.next.take().ok_or(SensorError::ReadFailed {
                sensor: "outdoor",
                details: "no response",
            })
        }
    }

    #[derive(Default)]
    struct NullDisplay {
        broken: bool,
        frames: u32,
    }

    impl StatusDisplay for NullDisplay {
        fn init(&mut self) -> Result<(), DisplayError> {
            if self.broken {
                Err(DisplayError::Init)
            } else {
                Ok(())
            }
        }

        fn clear(&mut self) {}

        fn draw_text(&mut self, _x: i32, _y: i32, _text: &str) {}

        fn present(&mut self) -> Result<(), DisplayError> {
            self.frames += 1;
            Ok(())
        }
    }

    const WARM: SensorReadings = SensorReadings {
        temperature: 21.0,
        humidity: 45.0,
        pressure: 2992,
        battery_voltage: 4.05,
    };

    fn controller(
        sensors: ScriptedSensors,
    ) -> StatusController<'static, StaticLink, NeverSynced, ScriptedSensors> {
        StatusController::new(
            &Config::default(),
            StaticLink,
            NeverSynced,
            sensors,
            Instant::from_secs(0),
        )
    }

    #[test]
    fn test_display_init_failure_is_fatal() {
        let mut controller = controller(ScriptedSensors {
            next: None,
            reads: 0,
        });
        let mut display = NullDisplay {
            broken: true,
            ..NullDisplay::default()
        };

        assert_eq!(
            controller.start(&mut display),
            Err(AppError::DisplayInit(DisplayError::Init))
        );
        assert_eq!(controller.scheduler().armed(), 0);
        assert_eq!(controller.clock_sync().phase(), SyncPhase::Idle);
    }

    #[test]
    fn test_start_samples_once_and_arms_timers() {
        let mut controller = controller(ScriptedSensors {
            next: Some(WARM),
            reads: 0,
        });
        let mut display = NullDisplay::default();

        controller.start(&mut display).unwrap();

        assert_eq!(controller.snapshot().readings(), WARM);
        assert_eq!(
            controller.clock_sync().phase(),
            SyncPhase::AwaitingConnectivity
        );
        // Link check and sensor sampling
        assert_eq!(controller.scheduler().armed(), 2);
        let sample = controller.sample_timer().unwrap();
        assert_eq!(
            controller.scheduler().state(sample),
            Some(TimerState::Armed)
        );
    }

    #[test]
    fn test_failed_sample_keeps_previous_readings() {
        let mut controller = controller(ScriptedSensors {
            next: Some(WARM),
            reads: 0,
        });
        let mut display = NullDisplay::default();
        controller.start(&mut display).unwrap();

        controller.poll(Instant::from_secs(10), &mut display);

        assert_eq!(controller.sensors_mut().reads, 2);
        assert_eq!(controller.snapshot().readings(), WARM);
    }

    #[test]
    fn test_renders_while_waiting_for_link() {
        let mut controller = controller(ScriptedSensors {
            next: None,
            reads: 0,
        });
        let mut display = NullDisplay::default();
        controller.start(&mut display).unwrap();

        let mut ms = 0;
        while ms < 1_000 {
            controller.poll(Instant::from_millis(ms), &mut display);
            ms += 100;
        }

        // One frame every 200 ms, link never up
        assert_eq!(display.frames, 5);
        assert_eq!(controller.snapshot().local_time, None);
        assert_eq!(controller.snapshot().address, Ipv4Addr::UNSPECIFIED);
    }

    #[test]
    fn test_zero_link_poll_still_renders() {
        let mut config = Config::default();
        config.time.link_poll_ms = 0;
        let mut controller = StatusController::new(
            &config,
            StaticLink,
            NeverSynced,
            ScriptedSensors {
                next: None,
                reads: 0,
            },
            Instant::from_secs(0),
        );
        let mut display = NullDisplay::default();
        controller.start(&mut display).unwrap();

        assert!(controller.poll(Instant::from_secs(2), &mut display));
        assert_eq!(display.frames, 1);
        assert_eq!(controller.clock_sync().link_checks(), 1);
        assert_eq!(
            controller.clock_sync().phase(),
            SyncPhase::AwaitingConnectivity
        );

        // The next check is one tick later, not in the same poll
        controller.poll(Instant::from_secs(2) + Duration::from_ticks(1), &mut display);
        assert_eq!(controller.clock_sync().link_checks(), 2);
    }

    #[test]
    fn test_next_wakeup_is_earliest_of_frame_and_timer() {
        let mut controller = controller(ScriptedSensors {
            next: None,
            reads: 0,
        });
        let mut display = NullDisplay::default();
        controller.start(&mut display).unwrap();

        // First frame is due immediately
        assert_eq!(controller.next_wakeup(), Instant::from_secs(0));

        controller.poll(Instant::from_millis(900), &mut display);
        // Next frame at 1100 ms, link check at 1000 ms
        assert_eq!(controller.next_wakeup(), Instant::from_millis(1_000));
    }
}

//! Connect/sync lifecycle
//!
//! The service waits for the network link without ever blocking: each
//! connectivity check is a short one-shot timer that re-arms itself while the
//! link is down. Once the link is up it configures the time source, syncs
//! once immediately and hands over to a recurring sync timer.
//!
//! ```text
//! Idle --start--> AwaitingConnectivity --link up--> Synced (recurring)
//! ```
//!
//! There is no path back: a dropped link just makes later syncs report a
//! stale time or 0.0.0.0 until the network stack recovers on its own.

use core::net::Ipv4Addr;

use log::{debug, info, warn};

use crate::config::TimeSyncConfig;
use crate::error::SchedulerError;
use crate::network::NetworkLink;
use crate::scheduler::{Scheduler, TimerHandle};
use crate::snapshot::DisplaySnapshot;
use crate::time::TimeSource;

/// Timer events owned by the clock sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncEvent {
    /// One-shot: check whether the link is up
    CheckLink,
    /// Recurring: refresh time and address
    Resync,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// Not started
    Idle,
    AwaitingConnectivity,
    /// Connected, first sync done, recurring timer armed
    Synced,
}

pub struct ClockSyncService<'a> {
    config: TimeSyncConfig<'a>,
    phase: SyncPhase,
    link_timer: Option<TimerHandle>,
    sync_timer: Option<TimerHandle>,
    link_checks: u32,
    syncs: u32,
}

impl<'a> ClockSyncService<'a> {
    pub fn new(config: TimeSyncConfig<'a>) -> Self {
        Self {
            config,
            phase: SyncPhase::Idle,
            link_timer: None,
            sync_timer: None,
            link_checks: 0,
            syncs: 0,
        }
    }

    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    pub fn config(&self) -> &TimeSyncConfig<'a> {
        &self.config
    }

    /// Handle of the recurring sync timer, once connected.
    pub fn sync_timer(&self) -> Option<TimerHandle> {
        self.sync_timer
    }

    /// Number of connectivity checks made so far.
    pub fn link_checks(&self) -> u32 {
        self.link_checks
    }

    /// Number of sync cycles run so far, successful or not.
    pub fn sync_count(&self) -> u32 {
        self.syncs
    }

    /// Arm the first connectivity check.
    pub fn start<E, const N: usize>(
        &mut self,
        scheduler: &mut Scheduler<E, N>,
    ) -> Result<(), SchedulerError>
    where
        E: From<SyncEvent> + Copy,
    {
        if self.phase != SyncPhase::Idle {
            warn!("Clock sync already started ({:?})", self.phase);
            return Ok(());
        }

        info!(
            "Waiting for network link, first check in {} ms",
            self.config.start_delay_ms
        );
        self.link_timer = Some(
            scheduler.schedule_once(self.config.start_delay(), SyncEvent::CheckLink.into())?,
        );
        self.phase = SyncPhase::AwaitingConnectivity;
        Ok(())
    }

    /// Dispatch one of this service's timer events.
    pub fn on_timer<E, const N: usize, L, T>(
        &mut self,
        event: SyncEvent,
        scheduler: &mut Scheduler<E, N>,
        network: &L,
        clock: &mut T,
        snapshot: &mut DisplaySnapshot,
    ) -> Result<(), SchedulerError>
    where
        E: From<SyncEvent> + Copy,
        L: NetworkLink,
        T: TimeSource,
    {
        match (event, self.phase) {
            (SyncEvent::CheckLink, SyncPhase::AwaitingConnectivity) => {
                self.check_link(scheduler, network, clock, snapshot)
            }
            (SyncEvent::Resync, SyncPhase::Synced) => {
                self.do_sync(network, clock, snapshot);
                Ok(())
            }
            (event, phase) => {
                debug!("Ignoring {:?} in {:?}", event, phase);
                Ok(())
            }
        }
    }

    fn check_link<E, const N: usize, L, T>(
        &mut self,
        scheduler: &mut Scheduler<E, N>,
        network: &L,
        clock: &mut T,
        snapshot: &mut DisplaySnapshot,
    ) -> Result<(), SchedulerError>
    where
        E: From<SyncEvent> + Copy,
        L: NetworkLink,
        T: TimeSource,
    {
        self.link_checks += 1;

        if !network.is_connected() {
            debug!(
                "Link down, checking again in {} ms",
                self.config.link_poll_ms
            );
            self.link_timer = Some(scheduler.schedule_once(
                self.config.link_poll_interval(),
                SyncEvent::CheckLink.into(),
            )?);
            return Ok(());
        }

        info!(
            "Link up after {} checks, syncing with {} / {}",
            self.link_checks, self.config.servers[0], self.config.servers[1]
        );

        clock.configure(&self.config);
        self.do_sync(network, clock, snapshot);

        self.sync_timer = Some(
            scheduler.schedule_repeating(self.config.sync_period(), SyncEvent::Resync.into())?,
        );

        // The check that got us here has already fired, so this only makes
        // sure nothing is left armed.
        if let Some(handle) = self.link_timer.take() {
            scheduler.cancel(handle);
        }

        self.phase = SyncPhase::Synced;
        Ok(())
    }

    /// Run one sync cycle: read the clock and the address and publish both.
    ///
    /// A failed clock read is logged and leaves the previous time on screen.
    pub fn do_sync<L, T>(&mut self, network: &L, clock: &mut T, snapshot: &mut DisplaySnapshot)
    where
        L: NetworkLink,
        T: TimeSource,
    {
        self.syncs += 1;

        let address = network.local_address().unwrap_or(Ipv4Addr::UNSPECIFIED);
        let local_time = match clock.now_utc() {
            Ok(ts) => Some(clock.to_local(ts, &self.config.zone)),
            Err(e) => {
                warn!("Sync {}: {}, keeping previous time", self.syncs, e);
                None
            }
        };

        if let Some(time) = &local_time {
            info!(
                "Sync {}: {:02}:{:02}:{:02}{} address {}",
                self.syncs,
                time.hour,
                time.minute,
                time.second,
                if time.dst { " DST" } else { "" },
                address
            );
        }

        snapshot.publish_sync(local_time, address);
    }
}

//! Cooperative one-shot and recurring timers
//!
//! The scheduler does not own callbacks. Each timer carries an event value of
//! type `E` and [`Scheduler::poll`] hands due events back to the caller, which
//! dispatches them. This keeps every callback on the caller's stack with
//! plain `&mut` access to whatever state it needs, and guarantees that two
//! callbacks never overlap.
//!
//! Time only moves when the owner calls [`Scheduler::poll`]; newly armed
//! timers are measured from the most recent poll.

use embassy_time::{Duration, Instant};
use log::trace;

use crate::error::SchedulerError;

const MIN_DELAY: Duration = Duration::from_ticks(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Armed,
    /// One-shot timer that has delivered its event. Terminal.
    Fired,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    OneShot,
    Recurring { period: Duration },
}

/// Identifies one armed timer.
///
/// Slots are reused once a timer is no longer armed, so a handle also records
/// the slot generation it was issued for. Operations on a handle whose slot
/// has since been reused are no-ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerHandle {
    slot: u16,
    generation: u32,
}

#[derive(Debug, Clone, Copy)]
struct Timer<E> {
    kind: TimerKind,
    deadline: Instant,
    state: TimerState,
    /// Arm order, breaks deadline ties
    sequence: u32,
    event: E,
}

#[derive(Debug)]
struct Slot<E> {
    generation: u32,
    timer: Option<Timer<E>>,
}

impl<E> Slot<E> {
    fn is_armed(&self) -> bool {
        matches!(
            self.timer,
            Some(Timer {
                state: TimerState::Armed,
                ..
            })
        )
    }
}

/// Fixed-capacity timer set holding at most `N` armed timers.
#[derive(Debug)]
pub struct Scheduler<E, const N: usize> {
    slots: [Slot<E>; N],
    now: Instant,
    sequence: u32,
}

impl<E: Copy, const N: usize> Scheduler<E, N> {
    /// Create an empty scheduler whose clock starts at `now`.
    pub fn new(now: Instant) -> Self {
        Self {
            slots: core::array::from_fn(|_| Slot {
                generation: 0,
                timer: None,
            }),
            now,
            sequence: 0,
        }
    }

    /// The time of the most recent poll.
    pub fn now(&self) -> Instant {
        self.now
    }

    /// Deliver `event` once, `delay` after the current time.
    ///
    /// Delays shorter than one tick are rounded up to one tick, so a timer
    /// armed while draining [`poll`](Self::poll) is never due in that drain.
    pub fn schedule_once(
        &mut self,
        delay: Duration,
        event: E,
    ) -> Result<TimerHandle, SchedulerError> {
        self.arm(TimerKind::OneShot, delay, event)
    }

    /// Deliver `event` every `period`, starting one period from now.
    ///
    /// Periods shorter than one tick are rounded up to one tick.
    pub fn schedule_repeating(
        &mut self,
        period: Duration,
        event: E,
    ) -> Result<TimerHandle, SchedulerError> {
        let period = period.max(MIN_DELAY);
        self.arm(TimerKind::Recurring { period }, period, event)
    }

    fn arm(
        &mut self,
        kind: TimerKind,
        delay: Duration,
        event: E,
    ) -> Result<TimerHandle, SchedulerError> {
        let index = self
            .slots
            .iter()
            .position(|slot| !slot.is_armed())
            .ok_or(SchedulerError::Full { capacity: N })?;

        let delay = delay.max(MIN_DELAY);
        let sequence = self.sequence;
        self.sequence = self.sequence.wrapping_add(1);

        let slot = &mut self.slots[index];
        slot.generation = slot.generation.wrapping_add(1);
        slot.timer = Some(Timer {
            kind,
            deadline: self.now + delay,
            state: TimerState::Armed,
            sequence,
            event,
        });

        trace!("Armed {:?} timer in slot {}", kind, index);

        Ok(TimerHandle {
            slot: index as u16,
            generation: slot.generation,
        })
    }

    /// Suppress any future delivery of `handle`'s event.
    ///
    /// Idempotent: cancelling a fired, cancelled or stale handle does nothing.
    pub fn cancel(&mut self, handle: TimerHandle) {
        if let Some(timer) = self.timer_mut(handle)
            && timer.state == TimerState::Armed
        {
            timer.state = TimerState::Cancelled;
            trace!("Cancelled timer in slot {}", handle.slot);
        }
    }

    /// Current state of `handle`, or `None` if its slot has been reused.
    pub fn state(&self, handle: TimerHandle) -> Option<TimerState> {
        let slot = self.slots.get(handle.slot as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.timer.as_ref().map(|timer| timer.state)
    }

    /// Earliest deadline among armed timers.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.slots
            .iter()
            .filter_map(|slot| slot.timer.as_ref())
            .filter(|timer| timer.state == TimerState::Armed)
            .map(|timer| timer.deadline)
            .min()
    }

    /// Number of armed timers.
    pub fn armed(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_armed()).count()
    }

    /// Advance the clock to `now` and take the next due event, if any.
    ///
    /// Call repeatedly until it returns `None`. Due timers are delivered in
    /// deadline order, ties in the order they were armed. A one-shot moves to
    /// [`TimerState::Fired`]; a recurring timer moves its deadline forward by
    /// whole periods, so a late poll skips missed periods without shifting
    /// the phase.
    pub fn poll(&mut self, now: Instant) -> Option<E> {
        if now > self.now {
            self.now = now;
        }
        let now = self.now;

        let timer = self
            .slots
            .iter_mut()
            .filter_map(|slot| slot.timer.as_mut())
            .filter(|timer| timer.state == TimerState::Armed && timer.deadline <= now)
            .min_by_key(|timer| (timer.deadline, timer.sequence))?;

        match timer.kind {
            TimerKind::OneShot => timer.state = TimerState::Fired,
            TimerKind::Recurring { period } => {
                timer.deadline += period;
                if timer.deadline <= now {
                    let behind = (now - timer.deadline).as_ticks() / period.as_ticks() + 1;
                    timer.deadline += Duration::from_ticks(period.as_ticks() * behind);
                }
            }
        }

        Some(timer.event)
    }

    fn timer_mut(&mut self, handle: TimerHandle) -> Option<&mut Timer<E>> {
        let slot = self.slots.get_mut(handle.slot as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.timer.as_mut()
    }
}

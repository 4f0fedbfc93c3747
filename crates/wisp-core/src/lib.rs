//! Hardware-independent core library for wisp
//!
//! This crate contains all platform-agnostic logic for the wisp status panel:
//! the display snapshot, the cooperative timer scheduler, the connect/sync
//! lifecycle, the render loop, and the collaborator traits that the firmware
//! and the simulator implement.
//!
//! It is `#![no_std]` with `extern crate alloc` so it compiles on both
//! embedded targets (ESP32-S3) and desktop hosts (for the simulator and tests).

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod clock_sync;
pub mod config;
pub mod controller;
pub mod display;
pub mod error;
pub mod framebuffer;
pub mod network;
pub mod render;
pub mod scheduler;
pub mod sensors;
pub mod snapshot;
pub mod time;

pub use clock_sync::{ClockSyncService, SyncEvent, SyncPhase};
pub use config::Config;
pub use controller::{StatusController, TimerEvent};
pub use display::{Panel, PanelDisplay, StatusDisplay};
pub use error::{AppError, DisplayError, SchedulerError, SensorError, TimeReadError};
pub use network::NetworkLink;
pub use render::RenderLoop;
pub use scheduler::{Scheduler, TimerHandle, TimerKind, TimerState};
pub use sensors::{PlaceholderSensors, SensorProvider, SensorReadings};
pub use snapshot::DisplaySnapshot;
pub use time::{LocalTime, TimeSource, TimeZone, Timestamp};

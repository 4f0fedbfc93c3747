//! Error types shared by the wisp core and its collaborators

use thiserror_no_std::Error;

/// Failures reported by the display collaborator.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayError {
    /// The panel did not come up. There is no recovery from this.
    #[error("display initialization failed")]
    Init,
    /// A transfer to the panel failed after initialization.
    #[error("display bus transfer failed")]
    Bus,
}

/// Failures reading wall-clock time.
///
/// Never fatal: the sync cycle is skipped and the snapshot keeps its
/// previous time.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeReadError {
    #[error("clock has not been synchronized yet")]
    NotSynchronized,
    #[error("clock read failed")]
    Clock,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    #[error("{sensor}: {details}")]
    ReadFailed {
        sensor: &'static str,
        details: &'static str,
    },
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("all {capacity} timer slots are armed")]
    Full { capacity: usize },
}

/// Errors that stop the controller from starting.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppError {
    #[error("display init failed: {0}")]
    DisplayInit(DisplayError),
    #[error("timer setup failed: {0}")]
    Scheduler(SchedulerError),
}

impl From<SchedulerError> for AppError {
    fn from(value: SchedulerError) -> Self {
        AppError::Scheduler(value)
    }
}

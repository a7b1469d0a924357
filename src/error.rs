use thiserror::Error;

/// Errors raised at the edges of the scheduling core.
///
/// The core functions themselves are total; these only come out of the
/// boundary checks (`validate_duration`, `DayWindow::new`) and strict lookups.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("duration must be a positive multiple of {granularity} minutes, got {minutes}")]
    InvalidDuration { minutes: i64, granularity: u32 },
    #[error("duration of {minutes} minutes is longer than the {window_minutes}-minute day")]
    DurationExceedsWindow { minutes: i64, window_minutes: u32 },
    #[error("unknown time slot: {0}")]
    UnknownTimeSlot(String),
    #[error("invalid day window: {0}")]
    InvalidWindow(String),
}

impl ScheduleError {
    /// Stable error code reported over IPC.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidDuration { .. } | Self::DurationExceedsWindow { .. } => {
                "invalid_duration"
            }
            Self::UnknownTimeSlot(_) => "unknown_time_slot",
            Self::InvalidWindow(_) => "invalid_window",
        }
    }
}

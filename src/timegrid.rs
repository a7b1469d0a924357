use crate::error::ScheduleError;
use crate::model::TimeSlot;
use chrono::{NaiveTime, Timelike};
use std::collections::HashMap;

/// Width of one grid slot in minutes.
pub const SLOT_MINUTES: u32 = 5;

const DEFAULT_DAY_START_MINUTE: u32 = 8 * 60 + 30;
const DEFAULT_DAY_END_MINUTE: u32 = 18 * 60;

/// The working-day window the grid covers. Stored as minutes since midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    start_minute: u32,
    end_minute: u32,
}

impl Default for DayWindow {
    fn default() -> Self {
        Self {
            start_minute: DEFAULT_DAY_START_MINUTE,
            end_minute: DEFAULT_DAY_END_MINUTE,
        }
    }
}

impl DayWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self, ScheduleError> {
        let start_minute = start.hour() * 60 + start.minute();
        let end_minute = end.hour() * 60 + end.minute();
        if start_minute >= end_minute {
            return Err(ScheduleError::InvalidWindow(format!(
                "day start {} must be before day end {}",
                format_hhmm(start_minute),
                format_hhmm(end_minute)
            )));
        }
        if end_minute - start_minute < SLOT_MINUTES {
            return Err(ScheduleError::InvalidWindow(format!(
                "day window must hold at least one {}-minute slot",
                SLOT_MINUTES
            )));
        }
        Ok(Self {
            start_minute,
            end_minute,
        })
    }

    /// Parses a pair of `HH:MM` strings.
    pub fn parse(start: &str, end: &str) -> Result<Self, ScheduleError> {
        Self::new(parse_hhmm(start)?, parse_hhmm(end)?)
    }

    pub fn start_label(&self) -> String {
        format_hhmm(self.start_minute)
    }

    pub fn end_label(&self) -> String {
        format_hhmm(self.end_minute)
    }

    /// Length of the window in whole minutes.
    pub fn minutes(&self) -> u32 {
        self.end_minute - self.start_minute
    }

    /// Number of whole slots that fit; a trailing partial slot is dropped.
    pub fn slot_count(&self) -> usize {
        (self.minutes() / SLOT_MINUTES) as usize
    }

    /// Wall-clock minute at which slot `index` starts. Saturates for indices
    /// far outside the window.
    pub fn minute_at(&self, index: usize) -> u32 {
        let index = u32::try_from(index).unwrap_or(u32::MAX);
        self.start_minute
            .saturating_add(index.saturating_mul(SLOT_MINUTES))
    }
}

pub fn parse_hhmm(raw: &str) -> Result<NaiveTime, ScheduleError> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map_err(|_| ScheduleError::InvalidWindow(format!("{:?} is not a HH:MM time", raw)))
}

fn format_hhmm(minute: u32) -> String {
    format!("{:02}:{:02}", minute / 60, minute % 60)
}

/// Builds the slot table for `window`. Ids start at "1" and follow
/// chronological order; a slot ending exactly at the window end is kept.
pub fn generate_time_slots(window: &DayWindow) -> Vec<TimeSlot> {
    let mut slots = Vec::with_capacity(window.slot_count());
    let mut start = window.start_minute;
    while start + SLOT_MINUTES <= window.end_minute {
        let start_time = format_hhmm(start);
        slots.push(TimeSlot {
            id: (slots.len() + 1).to_string(),
            end_time: format_hhmm(start + SLOT_MINUTES),
            display_time: start_time.clone(),
            start_time,
        });
        start += SLOT_MINUTES;
    }
    slots
}

/// Number of slots a lesson of `duration` minutes occupies, rounded up.
/// Non-positive durations still take one slot so the lesson stays visible.
pub fn lesson_span(duration: i64) -> usize {
    if duration <= 0 {
        return 1;
    }
    let slot = i64::from(SLOT_MINUTES);
    let span = duration / slot + i64::from(duration % slot != 0);
    usize::try_from(span).unwrap_or(usize::MAX)
}

/// Boundary check for durations coming from user input: a positive multiple
/// of the slot width no longer than `window`.
pub fn validate_duration(duration: i64, window: &DayWindow) -> Result<u32, ScheduleError> {
    let slot = i64::from(SLOT_MINUTES);
    if duration <= 0 || duration % slot != 0 {
        return Err(ScheduleError::InvalidDuration {
            minutes: duration,
            granularity: SLOT_MINUTES,
        });
    }
    if duration > i64::from(window.minutes()) {
        return Err(ScheduleError::DurationExceedsWindow {
            minutes: duration,
            window_minutes: window.minutes(),
        });
    }
    u32::try_from(duration).map_err(|_| ScheduleError::DurationExceedsWindow {
        minutes: duration,
        window_minutes: window.minutes(),
    })
}

/// Last slot index covered by a lesson of `span` slots starting at `start`.
pub fn end_index(start: usize, span: usize) -> usize {
    start.saturating_add(span.max(1)) - 1
}

/// True when `span` slots from `start` end no later than the window end.
pub fn fits_in_window(window: &DayWindow, start: usize, span: usize) -> bool {
    start.saturating_add(span) <= window.slot_count()
}

/// Slot id -> position map, built once per slot table.
#[derive(Debug, Clone, Default)]
pub struct SlotIndex {
    positions: HashMap<String, usize>,
}

impl SlotIndex {
    pub fn new(slots: &[TimeSlot]) -> Self {
        let positions = slots
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id.clone(), i))
            .collect();
        Self { positions }
    }

    pub fn position(&self, slot_id: &str) -> Option<usize> {
        self.positions.get(slot_id).copied()
    }

    pub fn require(&self, slot_id: &str) -> Result<usize, ScheduleError> {
        self.position(slot_id)
            .ok_or_else(|| ScheduleError::UnknownTimeSlot(slot_id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

pub fn is_hour_start(window: &DayWindow, index: usize) -> bool {
    window.minute_at(index) % 60 == 0
}

pub fn is_half_hour_start(window: &DayWindow, index: usize) -> bool {
    window.minute_at(index) % 30 == 0
}

/// `HH:MM-HH:MM` covering `span` slots from `start_index`.
pub fn range_label(window: &DayWindow, start_index: usize, span: usize) -> String {
    let start = window.minute_at(start_index);
    let span = u32::try_from(span).unwrap_or(u32::MAX);
    let end = start.saturating_add(span.saturating_mul(SLOT_MINUTES));
    format!("{}-{}", format_hhmm(start), format_hhmm(end))
}

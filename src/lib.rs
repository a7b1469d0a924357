//! Timetable layout and conflict detection.
//!
//! Everything in this crate is a pure function over already-loaded snapshots:
//! the slot table comes from [`timegrid`], stored lessons are positioned by
//! [`annotate`], then checked by [`conflicts`] or searched by [`rooms`].
//! Persistence and the IPC surface live in the `timetabled` binary.

pub mod annotate;
pub mod conflicts;
pub mod error;
pub mod model;
pub mod rooms;
pub mod timegrid;

pub use error::ScheduleError;

pub mod core;
pub mod lessons;
pub mod references;
pub mod schedule;
pub mod setup;

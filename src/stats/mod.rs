//! Statistics for ingest and status distribution

pub mod metrics;

pub use metrics::{LiveStats, StatsSnapshot};

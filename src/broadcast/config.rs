//! Broadcaster configuration

use std::time::Duration;

/// Configuration for status fan-out
#[derive(Debug, Clone)]
pub struct BroadcastConfig {
    /// Period between status pushes to every subscriber
    pub tick_interval: Duration,

    /// Snapshots queued per subscriber before it is considered lagging
    pub subscriber_buffer: usize,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(5),
            subscriber_buffer: 8,
        }
    }
}

impl BroadcastConfig {
    /// Set the tick interval
    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Set the per-subscriber queue length
    pub fn subscriber_buffer(mut self, buffer: usize) -> Self {
        self.subscriber_buffer = buffer.max(1);
        self
    }
}

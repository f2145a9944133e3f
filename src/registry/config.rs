//! Registry configuration

use std::time::Duration;

/// Configuration for the stream registry's idle reaper
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Sessions with no heartbeat or chunk for this long are removed
    pub idle_timeout: Duration,

    /// How often the reaper scans the registry
    pub reap_interval: Duration,

    /// Also reap sessions created by the protocol transport.
    ///
    /// Protocol sessions have an explicit unpublish signal and never refresh
    /// `last_update_time`, so they are left alone unless this is set.
    pub reap_protocol_sessions: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(30),
            reap_interval: Duration::from_secs(10),
            reap_protocol_sessions: false,
        }
    }
}

impl RegistryConfig {
    /// Set the idle timeout
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Set the reap interval
    pub fn reap_interval(mut self, interval: Duration) -> Self {
        self.reap_interval = interval;
        self
    }

    /// Include protocol-transport sessions in idle reaping
    pub fn reap_protocol_sessions(mut self, enabled: bool) -> Self {
        self.reap_protocol_sessions = enabled;
        self
    }
}

//! Server configuration

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::broadcast::BroadcastConfig;
use crate::error::{Error, Result};
use crate::registry::RegistryConfig;

/// Prefix of every environment variable read by [`ServerConfig::from_env`]
pub const ENV_PREFIX: &str = "NF_LIVE_";

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Status push interval for WebSocket subscribers
    pub tick_interval: Duration,

    /// Directory uploaded chunks are written under
    pub chunk_root: PathBuf,

    /// Snapshots queued per WebSocket before it counts as lagging
    pub subscriber_buffer: usize,

    /// Largest accepted chunk upload body
    pub max_chunk_bytes: usize,

    /// Session registry and idle reaper settings
    pub registry: RegistryConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            tick_interval: Duration::from_secs(5),
            chunk_root: PathBuf::from("uploads/streams"),
            subscriber_buffer: 8,
            max_chunk_bytes: 16 * 1024 * 1024, // 16MB
            registry: RegistryConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Load defaults overridden by `NF_LIVE_*` environment variables
    ///
    /// | Variable | Field |
    /// |---|---|
    /// | `NF_LIVE_BIND` | `bind_addr` |
    /// | `NF_LIVE_TICK_MS` | `tick_interval` |
    /// | `NF_LIVE_CHUNK_ROOT` | `chunk_root` |
    /// | `NF_LIVE_SUBSCRIBER_BUFFER` | `subscriber_buffer` |
    /// | `NF_LIVE_MAX_CHUNK_BYTES` | `max_chunk_bytes` |
    /// | `NF_LIVE_IDLE_TIMEOUT_SECS` | `registry.idle_timeout` |
    /// | `NF_LIVE_REAP_INTERVAL_SECS` | `registry.reap_interval` |
    /// | `NF_LIVE_REAP_PROTOCOL` | `registry.reap_protocol_sessions` |
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env) with a custom variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |suffix: &str| {
            let name = format!("{ENV_PREFIX}{suffix}");
            lookup(&name).map(|value| (name, value))
        };

        let mut config = Self::default();

        if let Some((name, v)) = var("BIND") {
            config.bind_addr = parse(&name, &v)?;
        }
        if let Some((name, v)) = var("TICK_MS") {
            config.tick_interval = Duration::from_millis(parse(&name, &v)?);
        }
        if let Some((_, v)) = var("CHUNK_ROOT") {
            config.chunk_root = PathBuf::from(v);
        }
        if let Some((name, v)) = var("SUBSCRIBER_BUFFER") {
            config = config.subscriber_buffer(parse(&name, &v)?);
        }
        if let Some((name, v)) = var("MAX_CHUNK_BYTES") {
            config.max_chunk_bytes = parse(&name, &v)?;
        }
        if let Some((name, v)) = var("IDLE_TIMEOUT_SECS") {
            config.registry = config
                .registry
                .idle_timeout(Duration::from_secs(parse(&name, &v)?));
        }
        if let Some((name, v)) = var("REAP_INTERVAL_SECS") {
            config.registry = config
                .registry
                .reap_interval(Duration::from_secs(parse(&name, &v)?));
        }
        if let Some((name, v)) = var("REAP_PROTOCOL") {
            config.registry = config.registry.reap_protocol_sessions(parse(&name, &v)?);
        }

        if config.tick_interval.is_zero() {
            return Err(Error::Config(format!(
                "{ENV_PREFIX}TICK_MS must be greater than zero"
            )));
        }

        Ok(config)
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the status push interval
    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Set the chunk storage directory
    pub fn chunk_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.chunk_root = root.into();
        self
    }

    /// Set the per-subscriber queue length
    pub fn subscriber_buffer(mut self, buffer: usize) -> Self {
        self.subscriber_buffer = buffer.max(1);
        self
    }

    /// Set the upload size limit
    pub fn max_chunk_bytes(mut self, max: usize) -> Self {
        self.max_chunk_bytes = max;
        self
    }

    /// Set registry configuration
    pub fn registry(mut self, registry: RegistryConfig) -> Self {
        self.registry = registry;
        self
    }

    /// Broadcaster settings derived from this config
    pub fn broadcast_config(&self) -> BroadcastConfig {
        BroadcastConfig::default()
            .tick_interval(self.tick_interval)
            .subscriber_buffer(self.subscriber_buffer)
    }
}

fn parse<T: FromStr>(name: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Error::Config(format!("{name}={value:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use tokio_test::{assert_err, assert_ok};

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();

        assert_eq!(config.bind_addr.port(), 3000);
        assert_eq!(config.tick_interval, Duration::from_secs(5));
        assert_eq!(config.subscriber_buffer, 8);
        assert_eq!(config.registry.idle_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_with_addr() {
        let addr: SocketAddr = "127.0.0.1:3001".parse().unwrap();
        let config = ServerConfig::with_addr(addr);

        assert_eq!(config.bind_addr.port(), 3001);
    }

    #[test]
    fn test_builder_chaining() {
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let config = ServerConfig::default()
            .bind(addr)
            .tick_interval(Duration::from_millis(250))
            .chunk_root("/tmp/chunks")
            .subscriber_buffer(0)
            .max_chunk_bytes(1024)
            .registry(RegistryConfig::default().idle_timeout(Duration::from_secs(5)));

        assert_eq!(config.bind_addr, addr);
        assert_eq!(config.tick_interval, Duration::from_millis(250));
        assert_eq!(config.chunk_root, PathBuf::from("/tmp/chunks"));
        assert_eq!(config.subscriber_buffer, 1);
        assert_eq!(config.max_chunk_bytes, 1024);
        assert_eq!(config.registry.idle_timeout, Duration::from_secs(5));

        let broadcast = config.broadcast_config();
        assert_eq!(broadcast.tick_interval, Duration::from_millis(250));
        assert_eq!(broadcast.subscriber_buffer, 1);
    }

    #[test]
    fn test_from_lookup_empty_is_default() {
        let config = assert_ok!(ServerConfig::from_lookup(|_| None));
        assert_eq!(config.bind_addr, ServerConfig::default().bind_addr);
        assert_eq!(config.chunk_root, ServerConfig::default().chunk_root);
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("NF_LIVE_BIND", "127.0.0.1:8090"),
            ("NF_LIVE_TICK_MS", "1000"),
            ("NF_LIVE_CHUNK_ROOT", "/var/lib/nf/streams"),
            ("NF_LIVE_IDLE_TIMEOUT_SECS", "45"),
            ("NF_LIVE_REAP_PROTOCOL", "true"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:8090".parse().unwrap());
        assert_eq!(config.tick_interval, Duration::from_secs(1));
        assert_eq!(config.chunk_root, PathBuf::from("/var/lib/nf/streams"));
        assert_eq!(config.registry.idle_timeout, Duration::from_secs(45));
        assert!(config.registry.reap_protocol_sessions);
    }

    #[test]
    fn test_from_lookup_invalid_value() {
        let err = assert_err!(ServerConfig::from_lookup(lookup(&[("NF_LIVE_TICK_MS", "soon")])));
        assert!(matches!(err, Error::Config(ref msg) if msg.contains("NF_LIVE_TICK_MS")));
    }

    #[test]
    fn test_from_lookup_zero_tick() {
        let err = assert_err!(ServerConfig::from_lookup(lookup(&[("NF_LIVE_TICK_MS", "0")])));
        assert!(matches!(err, Error::Config(_)));
    }
}

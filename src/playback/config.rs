//! Player configuration

use std::time::Duration;

use serde::Deserialize;

/// Retry and timeout settings for one player
///
/// Deserializes from the player option names (`maxRetries`,
/// `manifestTimeoutMs`, `retryBackoffMs`, plus `maxBackoffMs` and
/// `altUrlDelayMs`); missing options keep their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "PlayerOptions")]
pub struct PlayerConfig {
    /// Full passes over the URL list after the first one
    pub max_retries: u32,

    /// Upper bound for a single manifest fetch
    pub manifest_timeout: Duration,

    /// Delay before the first retry pass; doubles for each later pass
    pub retry_backoff: Duration,

    /// Cap on the retry delay
    pub max_backoff: Duration,

    /// Delay before trying the next alternative URL
    pub alt_url_delay: Duration,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            manifest_timeout: Duration::from_secs(10),
            retry_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            alt_url_delay: Duration::from_millis(500),
        }
    }
}

impl PlayerConfig {
    /// Set the maximum number of retry passes
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the per-fetch timeout
    pub fn manifest_timeout(mut self, timeout: Duration) -> Self {
        self.manifest_timeout = timeout;
        self
    }

    /// Set the initial retry backoff
    pub fn retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Set the backoff cap
    pub fn max_backoff(mut self, cap: Duration) -> Self {
        self.max_backoff = cap;
        self
    }

    /// Set the delay between alternative URLs
    pub fn alt_url_delay(mut self, delay: Duration) -> Self {
        self.alt_url_delay = delay;
        self
    }

    /// Delay before retry pass `retry` (1-based)
    pub fn backoff(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(31);
        self.retry_backoff
            .saturating_mul(1u32 << exp)
            .min(self.max_backoff)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayerOptions {
    max_retries: Option<u32>,
    manifest_timeout_ms: Option<u64>,
    retry_backoff_ms: Option<u64>,
    max_backoff_ms: Option<u64>,
    alt_url_delay_ms: Option<u64>,
}

impl From<PlayerOptions> for PlayerConfig {
    fn from(opts: PlayerOptions) -> Self {
        let defaults = PlayerConfig::default();
        Self {
            max_retries: opts.max_retries.unwrap_or(defaults.max_retries),
            manifest_timeout: opts
                .manifest_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.manifest_timeout),
            retry_backoff: opts
                .retry_backoff_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry_backoff),
            max_backoff: opts
                .max_backoff_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.max_backoff),
            alt_url_delay: opts
                .alt_url_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.alt_url_delay),
        }
    }
}

//! Playback resilience client
//!
//! Each [`PlaybackClient`] drives its own task. The task walks the derived URL
//! list until a manifest parses, retries the whole list with growing backoff,
//! and gives up after `max_retries` passes. Progress is reported as
//! [`PlayerEvent`]s on a channel owned by the caller.
//!
//! ```text
//! LOADING --manifest parses--> PLAYING
//! LOADING --error, URLs left--> LOADING (next URL after alt_url_delay)
//! LOADING --error, list exhausted, retries left--> LOADING (first URL after backoff)
//! LOADING --error, list exhausted, no retries left--> FAILED
//! PLAYING --media error--> reload current URL once, else FAILED
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Notify};
use tokio_util::sync::CancellationToken;
use url::Url;

use super::config::PlayerConfig;
use super::error::PlaybackError;
use super::fetcher::ManifestFetcher;
use super::manifest::Manifest;
use super::urls::derive_alternatives;

/// Reason reported when every URL and retry failed
pub const UNAVAILABLE: &str = "unavailable";

/// Player connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Loading,
    Playing,
    Failed,
}

/// Progress reported to the caller
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// State transition
    StateChanged(PlayerState),
    /// A manifest fetch is starting
    Attempt { url: Url, retry: u32 },
    /// A manifest was loaded and is ready to play
    Playing(Manifest),
    /// Terminal failure; no further events follow
    Unavailable(String),
}

/// Handle to a running player task
///
/// Dropping the handle disposes the player.
#[derive(Debug)]
pub struct PlaybackClient {
    cancel: CancellationToken,
    media_error: Arc<Notify>,
    state: watch::Receiver<PlayerState>,
    urls: Vec<Url>,
}

impl PlaybackClient {
    /// Start a player for `key`, beginning at `primary`
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(
        config: PlayerConfig,
        primary: Url,
        key: &str,
        fetcher: Arc<dyn ManifestFetcher>,
    ) -> (Self, mpsc::Receiver<PlayerEvent>) {
        let (events_tx, events_rx) = mpsc::channel(32);
        let cancel = CancellationToken::new();
        let media_error = Arc::new(Notify::new());
        let (state_tx, state_rx) = watch::channel(PlayerState::Loading);
        let urls = derive_alternatives(&primary, key);

        let task = PlayerTask {
            config,
            urls: urls.clone(),
            fetcher,
            events: events_tx,
            cancel: cancel.clone(),
            media_error: Arc::clone(&media_error),
            state: state_tx,
        };

        tracing::debug!(stream = %key, urls = urls.len(), "Starting player");
        tokio::spawn(task.run());

        (
            Self {
                cancel,
                media_error,
                state: state_rx,
                urls,
            },
            events_rx,
        )
    }

    /// URLs the player cycles through, in order
    pub fn urls(&self) -> &[Url] {
        &self.urls
    }

    /// Current player state
    pub fn state(&self) -> PlayerState {
        *self.state.borrow()
    }

    /// Signal a decode failure of the playing stream
    ///
    /// Ignored unless the player is in [`PlayerState::Playing`].
    pub fn report_media_error(&self) {
        if self.state() == PlayerState::Playing {
            self.media_error.notify_one();
        }
    }

    /// Stop the player
    ///
    /// Pending fetches and retry timers are abandoned and no further events
    /// are sent.
    pub fn dispose(&self) {
        self.cancel.cancel();
    }

    /// Whether [`dispose`](Self::dispose) has been called
    pub fn is_disposed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for PlaybackClient {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Task was cancelled or the caller stopped listening
struct Stopped;

struct PlayerTask {
    config: PlayerConfig,
    urls: Vec<Url>,
    fetcher: Arc<dyn ManifestFetcher>,
    events: mpsc::Sender<PlayerEvent>,
    cancel: CancellationToken,
    media_error: Arc<Notify>,
    state: watch::Sender<PlayerState>,
}

impl PlayerTask {
    async fn run(self) {
        if self.drive().await.is_err() {
            tracing::debug!("Player stopped");
        }
    }

    async fn drive(&self) -> Result<(), Stopped> {
        self.transition(PlayerState::Loading).await?;

        let current = match self.load().await? {
            Ok(url) => url,
            Err(reason) => return self.fail(reason).await,
        };

        // Playing: wait for a media error, then try one in-place reload
        self.wait_media_error().await?;
        tracing::warn!(url = %current, "Media error, reloading manifest");

        match self.fetch(&current).await? {
            Ok(manifest) => self.emit(PlayerEvent::Playing(manifest)).await?,
            Err(err) => return self.fail(format!("{UNAVAILABLE}: {err}")).await,
        }

        self.wait_media_error().await?;
        tracing::warn!(url = %current, "Media error after recovery");
        self.fail(format!("{UNAVAILABLE}: repeated media error")).await
    }

    /// Loading state; returns the URL that served a playable manifest
    async fn load(&self) -> Result<Result<Url, String>, Stopped> {
        let mut index = 0usize;
        let mut retry = 0u32;

        loop {
            let url = &self.urls[index];
            self.emit(PlayerEvent::Attempt {
                url: url.clone(),
                retry,
            })
            .await?;

            let err = match self.fetch(url).await? {
                Ok(manifest) => {
                    tracing::info!(url = %url, retry, "Manifest loaded");
                    self.emit(PlayerEvent::Playing(manifest)).await?;
                    self.transition(PlayerState::Playing).await?;
                    return Ok(Ok(url.clone()));
                }
                Err(err) => err,
            };

            tracing::debug!(url = %url, retry, error = %err, "Manifest load failed");

            if index + 1 < self.urls.len() {
                index += 1;
                self.sleep(self.config.alt_url_delay).await?;
            } else if retry < self.config.max_retries {
                index = 0;
                retry += 1;
                let delay = self.config.backoff(retry);
                tracing::debug!(retry, delay_ms = delay.as_millis() as u64, "Retrying from first URL");
                self.sleep(delay).await?;
            } else {
                tracing::warn!(retries = retry, error = %err, "All playback URLs failed");
                return Ok(Err(UNAVAILABLE.to_string()));
            }
        }
    }

    /// One bounded fetch and parse
    async fn fetch(&self, url: &Url) -> Result<Result<Manifest, PlaybackError>, Stopped> {
        let timeout = self.config.manifest_timeout;
        let attempt = async {
            let text = tokio::time::timeout(timeout, self.fetcher.fetch(url))
                .await
                .map_err(|_| PlaybackError::Timeout(timeout))??;
            Manifest::parse(&text)
        };

        tokio::select! {
            _ = self.cancel.cancelled() => Err(Stopped),
            result = attempt => Ok(result),
        }
    }

    async fn sleep(&self, delay: Duration) -> Result<(), Stopped> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(Stopped),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }

    async fn wait_media_error(&self) -> Result<(), Stopped> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(Stopped),
            _ = self.media_error.notified() => Ok(()),
        }
    }

    async fn fail(&self, reason: String) -> Result<(), Stopped> {
        self.emit(PlayerEvent::Unavailable(reason)).await?;
        self.transition(PlayerState::Failed).await
    }

    async fn transition(&self, state: PlayerState) -> Result<(), Stopped> {
        self.state.send_replace(state);
        self.emit(PlayerEvent::StateChanged(state)).await
    }

    async fn emit(&self, event: PlayerEvent) -> Result<(), Stopped> {
        if self.cancel.is_cancelled() {
            return Err(Stopped);
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Stopped),
            sent = self.events.send(event) => sent.map_err(|_| Stopped),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    const PLAYLIST: &str = "#EXTM3U\n#EXT-X-TARGETDURATION:2\n#EXTINF:2,\nseg0.ts\n";

    /// Serves `PLAYLIST` from the URLs in `ok`, fails everything else
    #[derive(Default)]
    struct MockFetcher {
        ok: Mutex<HashSet<String>>,
        calls: AtomicUsize,
        log: Mutex<Vec<String>>,
    }

    impl MockFetcher {
        fn serving(urls: &[&Url]) -> Arc<Self> {
            let fetcher = Self::default();
            *fetcher.ok.lock().unwrap() = urls.iter().map(|u| u.to_string()).collect();
            Arc::new(fetcher)
        }

        fn set_serving(&self, urls: &[&Url]) {
            *self.ok.lock().unwrap() = urls.iter().map(|u| u.to_string()).collect();
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ManifestFetcher for MockFetcher {
        async fn fetch(&self, url: &Url) -> Result<String, PlaybackError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.log.lock().unwrap().push(url.to_string());
            if self.ok.lock().unwrap().contains(url.as_str()) {
                Ok(PLAYLIST.to_string())
            } else {
                Err(PlaybackError::Transport("connection refused".into()))
            }
        }
    }

    /// Never answers; used for timeout checks
    struct HangingFetcher;

    #[async_trait]
    impl ManifestFetcher for HangingFetcher {
        async fn fetch(&self, _url: &Url) -> Result<String, PlaybackError> {
            std::future::pending().await
        }
    }

    const KEY: &str = "nf_ab12345678";

    fn primary() -> Url {
        Url::parse("https://cdn.example.com/live/nf_ab12345678/index.m3u8").unwrap()
    }

    fn config() -> PlayerConfig {
        PlayerConfig::default()
            .max_retries(2)
            .retry_backoff(Duration::from_millis(100))
            .alt_url_delay(Duration::from_millis(10))
    }

    async fn collect_until_terminal(rx: &mut mpsc::Receiver<PlayerEvent>) -> Vec<PlayerEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            let terminal = matches!(
                event,
                PlayerEvent::StateChanged(PlayerState::Playing)
                    | PlayerEvent::StateChanged(PlayerState::Failed)
            );
            events.push(event);
            if terminal {
                break;
            }
        }
        events
    }

    #[tokio::test(start_paused = true)]
    async fn test_falls_through_to_second_alternative() {
        let urls = derive_alternatives(&primary(), KEY);
        let fetcher = MockFetcher::serving(&[&urls[2]]);

        let (client, mut rx) =
            PlaybackClient::spawn(config(), primary(), KEY, fetcher.clone());
        let events = collect_until_terminal(&mut rx).await;

        let attempts: Vec<(Url, u32)> = events
            .iter()
            .filter_map(|e| match e {
                PlayerEvent::Attempt { url, retry } => Some((url.clone(), *retry)),
                _ => None,
            })
            .collect();
        assert_eq!(
            attempts,
            vec![
                (urls[0].clone(), 0),
                (urls[1].clone(), 0),
                (urls[2].clone(), 0)
            ]
        );

        assert_eq!(events[0], PlayerEvent::StateChanged(PlayerState::Loading));
        assert!(matches!(events[events.len() - 2], PlayerEvent::Playing(_)));
        assert_eq!(
            events.last(),
            Some(&PlayerEvent::StateChanged(PlayerState::Playing))
        );
        assert_eq!(fetcher.calls(), 3);
        client.dispose();
    }

    #[tokio::test(start_paused = true)]
    async fn test_later_pass_succeeds() {
        let urls = derive_alternatives(&primary(), KEY);
        let fetcher = MockFetcher::serving(&[]);

        let (_client, mut rx) =
            PlaybackClient::spawn(config(), primary(), KEY, fetcher.clone());

        // Let the first pass fail entirely, then bring the last URL up
        loop {
            match rx.recv().await.unwrap() {
                PlayerEvent::Attempt { retry: 1, .. } => break,
                _ => continue,
            }
        }
        let last = urls.last().unwrap();
        fetcher.set_serving(&[last]);

        let events = collect_until_terminal(&mut rx).await;
        assert_eq!(
            events.last(),
            Some(&PlayerEvent::StateChanged(PlayerState::Playing))
        );
        let succeeded = events.iter().rev().find_map(|e| match e {
            PlayerEvent::Attempt { url, retry } => Some((url.clone(), *retry)),
            _ => None,
        });
        assert_eq!(succeeded, Some((last.clone(), 1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_failing_reports_unavailable() {
        let urls = derive_alternatives(&primary(), KEY);
        let fetcher = MockFetcher::serving(&[]);

        let (_client, mut rx) =
            PlaybackClient::spawn(config(), primary(), KEY, fetcher.clone());
        let events = collect_until_terminal(&mut rx).await;

        assert_eq!(
            events.last(),
            Some(&PlayerEvent::StateChanged(PlayerState::Failed))
        );
        assert!(events
            .iter()
            .any(|e| matches!(e, PlayerEvent::Unavailable(reason) if reason == UNAVAILABLE)));

        // Initial pass plus max_retries passes, then nothing more
        assert_eq!(fetcher.calls(), urls.len() * 3);
        assert!(rx.recv().await.is_none());
        assert_eq!(fetcher.calls(), urls.len() * 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_between_passes() {
        let urls = derive_alternatives(&primary(), KEY);
        let fetcher = MockFetcher::serving(&[]);
        let config = PlayerConfig::default()
            .max_retries(1)
            .retry_backoff(Duration::from_secs(5))
            .alt_url_delay(Duration::from_millis(10));

        let start = tokio::time::Instant::now();
        let (_client, mut rx) = PlaybackClient::spawn(config, primary(), KEY, fetcher.clone());
        collect_until_terminal(&mut rx).await;

        let alt_delays = Duration::from_millis(10) * (urls.len() as u32 - 1) * 2;
        assert!(start.elapsed() >= Duration::from_secs(5) + alt_delays);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_stops_retries() {
        let fetcher = MockFetcher::serving(&[]);
        let config = config().max_retries(100).retry_backoff(Duration::from_secs(1));

        let (client, mut rx) = PlaybackClient::spawn(config, primary(), KEY, fetcher.clone());
        assert_eq!(
            rx.recv().await,
            Some(PlayerEvent::StateChanged(PlayerState::Loading))
        );
        // Wait for the first fetch to go out
        assert!(matches!(rx.recv().await, Some(PlayerEvent::Attempt { .. })));

        client.dispose();
        assert!(client.is_disposed());

        // Task exits and closes the channel; no stray fetch afterwards
        while rx.recv().await.is_some() {}
        let calls = fetcher.calls();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(fetcher.calls(), calls);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_disposes() {
        let fetcher = MockFetcher::serving(&[]);
        let (client, mut rx) = PlaybackClient::spawn(config(), primary(), KEY, fetcher.clone());
        rx.recv().await.unwrap();

        drop(client);
        while rx.recv().await.is_some() {}
        let calls = fetcher.calls();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(fetcher.calls(), calls);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manifest_timeout_moves_on() {
        let config = config()
            .max_retries(0)
            .manifest_timeout(Duration::from_millis(200));
        let (_client, mut rx) =
            PlaybackClient::spawn(config, primary(), KEY, Arc::new(HangingFetcher));

        let events = collect_until_terminal(&mut rx).await;
        let attempts = events
            .iter()
            .filter(|e| matches!(e, PlayerEvent::Attempt { .. }))
            .count();
        assert_eq!(attempts, derive_alternatives(&primary(), KEY).len());
        assert_eq!(
            events.last(),
            Some(&PlayerEvent::StateChanged(PlayerState::Failed))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_media_error_recovers_once() {
        let fetcher = MockFetcher::serving(&[&primary()]);
        let (client, mut rx) = PlaybackClient::spawn(config(), primary(), KEY, fetcher.clone());
        collect_until_terminal(&mut rx).await;

        client.report_media_error();
        assert!(matches!(rx.recv().await, Some(PlayerEvent::Playing(_))));
        assert_eq!(fetcher.calls(), 2);

        client.report_media_error();
        let events = collect_until_terminal(&mut rx).await;
        assert!(matches!(events[0], PlayerEvent::Unavailable(_)));
        assert_eq!(
            events.last(),
            Some(&PlayerEvent::StateChanged(PlayerState::Failed))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_media_error_while_loading_is_ignored() {
        let fetcher = MockFetcher::serving(&[&primary()]);
        let (client, mut rx) = PlaybackClient::spawn(config(), primary(), KEY, fetcher.clone());
        assert_eq!(client.state(), PlayerState::Loading);
        client.report_media_error();

        let events = collect_until_terminal(&mut rx).await;
        assert_eq!(
            events.last(),
            Some(&PlayerEvent::StateChanged(PlayerState::Playing))
        );
        assert_eq!(client.state(), PlayerState::Playing);

        // A stale error would reload against a now failing origin
        fetcher.set_serving(&[]);
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(fetcher.calls(), 1);
        assert!(rx.try_recv().is_err());
        assert_eq!(client.state(), PlayerState::Playing);

        // Recovery budget is intact for a real error
        fetcher.set_serving(&[&primary()]);
        client.report_media_error();
        assert!(matches!(rx.recv().await, Some(PlayerEvent::Playing(_))));
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_media_error_with_failed_reload() {
        let fetcher = MockFetcher::serving(&[&primary()]);
        let (client, mut rx) = PlaybackClient::spawn(config(), primary(), KEY, fetcher.clone());
        collect_until_terminal(&mut rx).await;

        fetcher.set_serving(&[]);
        client.report_media_error();

        let events = collect_until_terminal(&mut rx).await;
        assert!(matches!(events[0], PlayerEvent::Unavailable(_)));
        assert_eq!(
            events.last(),
            Some(&PlayerEvent::StateChanged(PlayerState::Failed))
        );
    }
}

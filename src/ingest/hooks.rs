//! Ingest hook interface
//!
//! The external media engine owns the wire protocol. It reports what happens on
//! its connections by calling these hooks; the core never depends on how the
//! engine emits events.

use std::str::FromStr;

use async_trait::async_trait;

/// Result of a hook that can refuse a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookResult {
    /// Let the connection proceed
    Accept,
    /// Refuse the connection with a reason
    Reject(String),
}

impl HookResult {
    /// Whether the connection may proceed
    pub fn is_accepted(&self) -> bool {
        matches!(self, HookResult::Accept)
    }
}

/// Callbacks invoked by the media engine
///
/// Only [`pre_publish`](IngestHooks::pre_publish) expects the engine to wait for
/// a decision. The remaining hooks are notifications and may be fired without
/// awaiting the outcome.
#[async_trait]
pub trait IngestHooks: Send + Sync + 'static {
    /// A broadcaster wants to publish on `key`
    async fn pre_publish(&self, key: &str) -> HookResult;

    /// Publishing on `key` has started
    async fn post_publish(&self, _key: &str) {}

    /// Publishing on `key` has ended
    async fn done_publish(&self, _key: &str) {}

    /// A viewer wants to play `key`
    async fn pre_play(&self, _key: &str) -> HookResult {
        HookResult::Accept
    }

    /// A viewer started playing `key`
    async fn post_play(&self, _key: &str) {}

    /// A viewer stopped playing `key`
    async fn done_play(&self, _key: &str) {}
}

/// Hook name as sent by the media engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookEvent {
    PrePublish,
    PostPublish,
    DonePublish,
    PrePlay,
    PostPlay,
    DonePlay,
}

impl HookEvent {
    /// Wire name of the hook
    pub fn as_str(&self) -> &'static str {
        match self {
            HookEvent::PrePublish => "pre_publish",
            HookEvent::PostPublish => "post_publish",
            HookEvent::DonePublish => "done_publish",
            HookEvent::PrePlay => "pre_play",
            HookEvent::PostPlay => "post_play",
            HookEvent::DonePlay => "done_play",
        }
    }

    /// Invoke the matching hook on `hooks`
    ///
    /// Notification hooks always report `Accept`.
    pub async fn dispatch<H: IngestHooks + ?Sized>(self, hooks: &H, key: &str) -> HookResult {
        match self {
            HookEvent::PrePublish => hooks.pre_publish(key).await,
            HookEvent::PrePlay => hooks.pre_play(key).await,
            HookEvent::PostPublish => {
                hooks.post_publish(key).await;
                HookResult::Accept
            }
            HookEvent::DonePublish => {
                hooks.done_publish(key).await;
                HookResult::Accept
            }
            HookEvent::PostPlay => {
                hooks.post_play(key).await;
                HookResult::Accept
            }
            HookEvent::DonePlay => {
                hooks.done_play(key).await;
                HookResult::Accept
            }
        }
    }
}

/// Unknown hook name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown hook event: {0}")]
pub struct UnknownHook(pub String);

impl FromStr for HookEvent {
    type Err = UnknownHook;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pre_publish" | "prePublish" => Ok(HookEvent::PrePublish),
            "post_publish" | "postPublish" => Ok(HookEvent::PostPublish),
            "done_publish" | "donePublish" => Ok(HookEvent::DonePublish),
            "pre_play" | "prePlay" => Ok(HookEvent::PrePlay),
            "post_play" | "postPlay" => Ok(HookEvent::PostPlay),
            "done_play" | "donePlay" => Ok(HookEvent::DonePlay),
            other => Err(UnknownHook(other.to_owned())),
        }
    }
}

//! Publish state machine
//!
//! Tracks one stream key from the first publish attempt to the end of the
//! broadcast.
//!
//! ```text
//! Idle --pre_publish(valid)--> Publishing --post_publish--> Live --done_publish--> Ended
//! Idle --pre_publish(invalid)--> Rejected
//! ```

/// Publish lifecycle phase of a stream key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishPhase {
    /// No publish attempt in progress
    Idle,
    /// Key accepted, waiting for the engine to confirm
    Publishing,
    /// Engine confirmed the broadcast
    Live,
    /// Broadcast finished; registry entry removed
    Ended,
    /// Key failed validation; connection refused
    Rejected,
}

/// Input to the publish state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishEvent {
    /// `pre_publish` with the outcome of key validation
    PrePublish { valid: bool },
    /// `post_publish`
    PostPublish,
    /// `done_publish`
    DonePublish,
}

impl PublishPhase {
    /// Terminal phases end one attempt; a new attempt starts from `Idle`
    pub fn is_terminal(self) -> bool {
        matches!(self, PublishPhase::Ended | PublishPhase::Rejected)
    }

    /// Compute the next phase
    ///
    /// Events that do not apply to the current phase leave it unchanged.
    pub fn on_event(self, event: PublishEvent) -> PublishPhase {
        use PublishEvent::*;
        use PublishPhase::*;

        let current = if self.is_terminal() { Idle } else { self };

        match (current, event) {
            (Idle, PrePublish { valid: true }) => Publishing,
            (Idle, PrePublish { valid: false }) => Rejected,
            // Re-publish on a live key keeps the existing session
            (Publishing | Live, PrePublish { .. }) => current,
            (Publishing, PostPublish) => Live,
            (Live, PostPublish) => Live,
            (Idle | Publishing | Live, DonePublish) => Ended,
            (Idle, PostPublish) => Idle,
            (Ended | Rejected, _) => current,
        }
    }
}

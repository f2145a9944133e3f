//! Subscriber connection handles

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use super::snapshot::StatusSnapshot;

/// Identifier of one subscription, unique per broadcaster
pub type SubscriberId = u64;

/// Outcome of delivering a snapshot to one subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Queued for the connection's writer
    Sent,
    /// Writer is behind; this snapshot was skipped
    Lagged,
    /// Connection is gone
    Closed,
}

/// Handle to a live status connection
///
/// The connection's writer task owns the receiving end and forwards snapshots
/// to the socket. Delivery never waits on the socket.
#[derive(Debug, Clone)]
pub struct SubscriberHandle {
    id: SubscriberId,
    tx: mpsc::Sender<StatusSnapshot>,
}

impl SubscriberHandle {
    /// Wrap an existing sender
    pub fn new(id: SubscriberId, tx: mpsc::Sender<StatusSnapshot>) -> Self {
        Self { id, tx }
    }

    /// Create a handle together with the receiving end of its queue
    pub fn channel(id: SubscriberId, buffer: usize) -> (Self, mpsc::Receiver<StatusSnapshot>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { id, tx }, rx)
    }

    /// Subscription id
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Whether the receiving side has gone away
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Queue a snapshot without blocking
    pub fn deliver(&self, snapshot: StatusSnapshot) -> Delivery {
        match self.tx.try_send(snapshot) {
            Ok(()) => Delivery::Sent,
            Err(TrySendError::Full(_)) => Delivery::Lagged,
            Err(TrySendError::Closed(_)) => Delivery::Closed,
        }
    }
}

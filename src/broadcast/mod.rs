//! Real-time status distribution
//!
//! ```text
//!   [ws connection] ──subscribe──► StatusBroadcaster ◄──list()── StreamRegistry
//!         ▲                              │
//!         └──── mpsc<StatusSnapshot> ◄───┘ tick() every 5s
//! ```

pub mod broadcaster;
pub mod config;
pub mod snapshot;
pub mod subscriber;

pub use broadcaster::{StatusBroadcaster, TickReport};
pub use config::BroadcastConfig;
pub use snapshot::StatusSnapshot;
pub use subscriber::{Delivery, SubscriberHandle, SubscriberId};

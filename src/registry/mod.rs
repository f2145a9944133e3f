//! Stream registry
//!
//! The registry is the in-memory source of truth for live sessions. It is an
//! explicit object injected into the ingest adapter and the status broadcaster
//! rather than process-wide state.
//!
//! # Architecture
//!
//! ```text
//!                          Arc<StreamRegistry>
//!                     ┌─────────────────────────┐
//!                     │ sessions: HashMap<Key,  │
//!                     │   StreamSession {       │
//!                     │     start_time,         │
//!                     │     viewer_count, ...   │
//!                     │   }                     │
//!                     │ >                       │
//!                     └───────────┬─────────────┘
//!                                 │
//!         ┌───────────────────────┼───────────────────────┐
//!         │                       │                       │
//!         ▼                       ▼                       ▼
//!   [IngestAdapter]        [StatusBroadcaster]       [idle reaper]
//!   create / remove        list() every tick         reap_idle()
//!   touch / viewers        get() on subscribe
//! ```

pub mod config;
pub mod entry;
pub mod key;
pub mod store;

pub use config::RegistryConfig;
pub use entry::{IngestMethod, SessionPatch, StreamSession};
pub use key::{KeyError, StreamKey};
pub use store::StreamRegistry;

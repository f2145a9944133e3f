//! Ingestion adapter
//!
//! Two transports feed the registry:
//!
//! - the primary protocol, whose wire handling lives in an external media
//!   engine that reports publish/play events through [`IngestHooks`]
//! - the HTTP chunk-upload fallback, handled by [`IngestAdapter::on_chunk`]
//!
//! Key validation is the only way a transport event can be refused.

pub mod adapter;
pub mod hooks;
pub mod state;
pub mod storage;

pub use adapter::IngestAdapter;
pub use hooks::{HookEvent, HookResult, IngestHooks, UnknownHook};
pub use state::{PublishEvent, PublishPhase};
pub use storage::{ChunkStore, ChunkTransport, LocalChunkStore};

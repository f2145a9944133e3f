//! HTTP and WebSocket surface

pub mod config;
pub mod listener;
pub mod routes;
pub mod ws;

pub use config::ServerConfig;
pub use listener::LiveServer;
pub use routes::{router, AppState};

//! Live server
//!
//! Binds the HTTP listener and owns the background tasks (status ticker and
//! idle reaper).

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::broadcast::StatusBroadcaster;
use crate::error::Result;
use crate::ingest::{ChunkStore, IngestAdapter, LocalChunkStore};
use crate::registry::StreamRegistry;
use crate::server::config::ServerConfig;
use crate::server::routes::{self, AppState};
use crate::stats::LiveStats;

/// Live-stream status server
pub struct LiveServer {
    config: ServerConfig,
    registry: Arc<StreamRegistry>,
    broadcaster: Arc<StatusBroadcaster>,
    adapter: Arc<IngestAdapter>,
    stats: Arc<LiveStats>,
    cancel: CancellationToken,
}

impl LiveServer {
    /// Create a server storing chunks under `config.chunk_root`
    pub fn new(config: ServerConfig) -> Self {
        let store = Arc::new(LocalChunkStore::new(config.chunk_root.clone()));
        Self::with_store(config, store)
    }

    /// Create a server with a custom chunk store
    pub fn with_store(config: ServerConfig, store: Arc<dyn ChunkStore>) -> Self {
        let stats = Arc::new(LiveStats::new());
        let registry = Arc::new(StreamRegistry::with_config(config.registry.clone()));
        let broadcaster = Arc::new(StatusBroadcaster::with_config(
            Arc::clone(&registry),
            config.broadcast_config(),
            Arc::clone(&stats),
        ));
        let adapter = Arc::new(IngestAdapter::with_stats(
            Arc::clone(&registry),
            store,
            Arc::clone(&stats),
        ));

        Self {
            config,
            registry,
            broadcaster,
            adapter,
            stats,
            cancel: CancellationToken::new(),
        }
    }

    /// Get a reference to the stream registry
    pub fn registry(&self) -> &Arc<StreamRegistry> {
        &self.registry
    }

    /// Get a reference to the status broadcaster
    pub fn broadcaster(&self) -> &Arc<StatusBroadcaster> {
        &self.broadcaster
    }

    /// Get a reference to the ingest adapter
    pub fn adapter(&self) -> &Arc<IngestAdapter> {
        &self.adapter
    }

    /// Get a reference to the stats tracker
    pub fn stats(&self) -> &Arc<LiveStats> {
        &self.stats
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }

    /// Token that stops the background tasks when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Axum router for this server's state
    pub fn router(&self) -> Router {
        routes::router(
            AppState {
                registry: Arc::clone(&self.registry),
                broadcaster: Arc::clone(&self.broadcaster),
                adapter: Arc::clone(&self.adapter),
                stats: Arc::clone(&self.stats),
            },
            self.config.max_chunk_bytes,
        )
    }

    /// Run the server
    ///
    /// This method blocks until the server is shut down.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(addr = %addr, "Live server listening");

        let ticker = self.broadcaster.spawn_ticker(self.cancel.child_token());
        let reaper = self.adapter.spawn_reaper(self.cancel.child_token());

        let cancel = self.cancel.clone();
        let result = axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                tokio::select! {
                    _ = shutdown => tracing::info!("Shutdown signal received"),
                    _ = cancel.cancelled() => {}
                }
            })
            .await;

        // Stop background tasks on shutdown
        self.cancel.cancel();
        let _ = ticker.await;
        let _ = reaper.await;

        result?;
        Ok(())
    }

    /// Stop a running server and its background tasks
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

//! Live status server example
//!
//! Run with: cargo run --example live_server -- [--bind ADDR] [--chunks DIR]
//!
//! Settings not given on the command line come from `NF_LIVE_*` environment
//! variables.
//!
//! ## Media engine hooks
//!
//! Point nginx-rtmp (or any engine with HTTP callbacks) at the hook endpoints:
//!
//! ```text
//! on_publish      http://localhost:3000/hooks/pre_publish;
//! on_publish_done http://localhost:3000/hooks/done_publish;
//! on_play         http://localhost:3000/hooks/post_play;
//! on_play_done    http://localhost:3000/hooks/done_play;
//! ```
//!
//! ## Trying it by hand
//!
//! ```text
//! curl -d name=nf_demo123456 http://localhost:3000/hooks/pre_publish
//! websocat ws://localhost:3000/ws/stream/nf_demo123456
//! curl -F segment=@chunk.webm http://localhost:3000/api/stream/browser/nf_demo123456
//! curl http://localhost:3000/api/streams
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use nf_live::{LiveServer, ServerConfig};

#[derive(Parser, Debug)]
#[command(name = "live_server", about = "Live-stream status server")]
struct Args {
    /// Address to bind (e.g. 127.0.0.1:3000)
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// Directory for uploaded chunks
    #[arg(long)]
    chunks: Option<PathBuf>,

    /// Status push interval in milliseconds
    #[arg(long)]
    tick_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("nf_live=debug".parse()?)
                .add_directive("live_server=debug".parse()?),
        )
        .init();

    let mut config = ServerConfig::from_env()?;
    if let Some(bind) = args.bind {
        config = config.bind(bind);
    }
    if let Some(dir) = args.chunks {
        config = config.chunk_root(dir);
    }
    if let Some(ms) = args.tick_ms {
        config = config.tick_interval(Duration::from_millis(ms.max(1)));
    }

    println!("Live server on http://{}", config.bind_addr);
    println!("  status socket: ws://{}/ws/stream/<key>", config.bind_addr);
    println!("  chunks stored under {}", config.chunk_root.display());
    println!();
    println!("Press Ctrl+C to stop");

    let server = LiveServer::new(config);
    let result = server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
            println!("\nShutting down...");
        })
        .await;

    if let Err(e) = result {
        eprintln!("Server error: {}", e);
    }

    Ok(())
}

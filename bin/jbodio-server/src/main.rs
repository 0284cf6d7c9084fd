//! jbodio JBOD Server
//!
//! Serves sixteen in-memory disks over the JBOD protocol. Contents live only
//! as long as the process.

use anyhow::{Context, Result};
use clap::Parser;
use jbodio_server::{MemoryJbod, serve};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "jbodio-server", about = "In-memory JBOD server")]
#[command(version)]
struct Args {
    /// TCP listen address
    #[arg(long, default_value = "127.0.0.1:3333")]
    listen: String,

    /// Log level (trace / debug / info / warn / error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting jbodio JBOD server");

    let listener = TcpListener::bind(&args.listen)
        .await
        .with_context(|| format!("bind {}", args.listen))?;

    serve(listener, MemoryJbod::shared()).await;
    Ok(())
}

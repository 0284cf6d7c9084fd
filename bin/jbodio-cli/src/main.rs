//! jbodio CLI - volume command line client
//!
//! Each invocation connects to a JBOD server, mounts the volume, runs one
//! command and unmounts again.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use jbodio_block::JbodVolume;
use jbodio_common::{Address, Config, MAX_TRANSFER};
use std::path::PathBuf;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "jbodio-cli")]
#[command(about = "jbodio volume client")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Server IP address
    #[arg(long)]
    host: Option<String>,

    /// Server port
    #[arg(long)]
    port: Option<u16>,

    /// Cache size in blocks (0 disables the cache)
    #[arg(long)]
    cache_entries: Option<usize>,

    /// Log level
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Read a byte range and print it as hex
    Read {
        #[arg(long, value_parser = parse_address)]
        addr: Address,
        #[arg(long)]
        len: usize,
    },
    /// Write hex-encoded bytes
    Write {
        #[arg(long, value_parser = parse_address)]
        addr: Address,
        /// Bytes to write, e.g. "deadbeef"
        #[arg(long)]
        data: String,
    },
    /// Fill a byte range with one value
    Fill {
        #[arg(long, value_parser = parse_address)]
        addr: Address,
        #[arg(long)]
        len: usize,
        #[arg(long, value_parser = parse_byte)]
        byte: u8,
    },
}

/// Parse a decimal or `0x`-prefixed hex number
fn parse_number(s: &str) -> Result<u64, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid number '{s}': {e}"))
}

fn parse_address(s: &str) -> Result<Address, String> {
    let n = parse_number(s)?;
    Address::try_from(n).map_err(|_| format!("address {s} out of range"))
}

fn parse_byte(s: &str) -> Result<u8, String> {
    let n = parse_number(s)?;
    u8::try_from(n).map_err(|_| format!("byte value {s} out of range"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load(path).with_context(|| format!("load config {path:?}"))?,
        None => Config::default(),
    };

    // CLI takes precedence over the config file
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(entries) = args.cache_entries {
        config.cache.entries = entries;
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let volume = JbodVolume::from_config(&config).await.with_context(|| {
        format!(
            "connect to {}:{}",
            config.server.host, config.server.port
        )
    })?;
    volume.mount().await.context("mount volume")?;

    let outcome = run(&volume, args.command).await;

    match volume.cache_hit_rate() {
        Some(rate) => info!("Cache hit rate: {:.1}%", rate * 100.0),
        None => info!("Cache hit rate: n/a"),
    }

    if let Err(e) = volume.unmount().await {
        warn!("Failed to unmount volume: {e}");
    }
    volume.disconnect().await;

    outcome
}

async fn run<S>(volume: &JbodVolume<S>, command: Commands) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    match command {
        Commands::Read { addr, len } => {
            let data = read_range(volume, addr, len).await?;
            print_hex_dump(addr, &data);
        }
        Commands::Write { addr, data } => {
            let bytes = hex::decode(data.trim()).context("decode --data as hex")?;
            write_range(volume, addr, &bytes).await?;
            info!("Wrote {} bytes at {addr:#x}", bytes.len());
        }
        Commands::Fill { addr, len, byte } => {
            write_range(volume, addr, &vec![byte; len]).await?;
            info!("Filled {len} bytes at {addr:#x} with {byte:#04x}");
        }
    }
    Ok(())
}

/// Read a range of any length, one transfer-sized piece at a time
async fn read_range<S>(volume: &JbodVolume<S>, addr: Address, len: usize) -> Result<Vec<u8>>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let mut data = vec![0u8; len];
    for (i, chunk) in data.chunks_mut(MAX_TRANSFER).enumerate() {
        let at = piece_address(addr, i)?;
        volume
            .read(at, chunk)
            .await
            .with_context(|| format!("read {} bytes at {at:#x}", chunk.len()))?;
    }
    Ok(data)
}

async fn write_range<S>(volume: &JbodVolume<S>, addr: Address, data: &[u8]) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    for (i, chunk) in data.chunks(MAX_TRANSFER).enumerate() {
        let at = piece_address(addr, i)?;
        volume
            .write(at, chunk)
            .await
            .with_context(|| format!("write {} bytes at {at:#x}", chunk.len()))?;
    }
    Ok(())
}

fn piece_address(addr: Address, index: usize) -> Result<Address> {
    let offset = Address::try_from(index * MAX_TRANSFER)?;
    match addr.checked_add(offset) {
        Some(at) => Ok(at),
        None => bail!("range starting at {addr:#x} overflows the address space"),
    }
}

fn print_hex_dump(addr: Address, data: &[u8]) {
    for (i, row) in data.chunks(16).enumerate() {
        println!("{:08x}  {}", addr as usize + i * 16, hex::encode(row));
    }
}

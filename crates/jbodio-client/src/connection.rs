//! Protocol client connection
//!
//! A [`ProtocolClient`] owns one stream. Each command is a strict
//! request/response exchange: the whole request packet is written, then the
//! whole response is read. Partial reads and writes are retried until the
//! packet is complete; any I/O error aborts the exchange without retry.

use jbodio_common::{BLOCK_SIZE, Block, BlockIndex, DiskIndex, Error, Result};
use jbodio_proto::{Command, HEADER_LEN, Opcode, Packet, PacketHeader, RETURN_SUCCESS};
use std::net::{IpAddr, SocketAddr};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

/// Client side of the JBOD protocol
pub struct ProtocolClient<S> {
    /// `None` once disconnected
    stream: Option<S>,
    /// Peer label for logging
    peer: String,
}

impl ProtocolClient<TcpStream> {
    /// Connect to a JBOD server
    ///
    /// `host` must be a literal IPv4 or IPv6 address.
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        let ip: IpAddr = host
            .parse()
            .map_err(|_| Error::ConnectionFailed(format!("malformed address '{host}'")))?;
        let addr = SocketAddr::new(ip, port);

        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| Error::ConnectionFailed(format!("{addr}: {e}")))?;
        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to set TCP_NODELAY on {addr}: {e}");
        }

        info!("Connected to JBOD server at {addr}");
        Ok(Self::with_peer(stream, addr.to_string()))
    }
}

impl<S> ProtocolClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap an already-open stream
    pub fn new(stream: S) -> Self {
        Self::with_peer(stream, "stream".to_string())
    }

    fn with_peer(stream: S, peer: String) -> Self {
        Self {
            stream: Some(stream),
            peer,
        }
    }

    /// Whether the connection is still open
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Close the connection
    ///
    /// Every later command fails with [`Error::ConnectionFailed`]. Closing an
    /// already-closed client does nothing.
    pub async fn disconnect(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                warn!("Error shutting down connection to {}: {e}", self.peer);
            }
            info!("Disconnected from {}", self.peer);
        }
    }

    fn stream(&mut self) -> Result<&mut S> {
        self.stream
            .as_mut()
            .ok_or_else(|| Error::ConnectionFailed("not connected".to_string()))
    }

    /// Send one request packet
    ///
    /// The block is transmitted only for `WRITE_BLOCK`.
    pub async fn send_block_command(&mut self, opcode: Opcode, block: Option<&Block>) -> Result<()> {
        let packet = Packet::request(opcode, block)?;
        let wire = packet.encode();

        let stream = self.stream()?;
        stream.write_all(&wire).await?;
        stream.flush().await?;

        debug!("Sent {opcode} ({} bytes)", wire.len());
        Ok(())
    }

    /// Receive one response packet
    ///
    /// When the response carries a block it is read into `out`. Returns the
    /// decoded header; the return code is not interpreted here.
    pub async fn receive_response(&mut self, out: &mut Block) -> Result<PacketHeader> {
        let stream = self.stream()?;

        let mut raw = [0u8; HEADER_LEN];
        stream.read_exact(&mut raw).await?;
        let header = PacketHeader::decode(&raw)?;

        if header.has_payload() {
            stream.read_exact(&mut out[..]).await?;
        }

        debug!(
            "Received response: length={} opcode={:#010x} return={}",
            header.length, header.opcode, header.return_code
        );
        Ok(header)
    }

    /// Run one command to completion
    ///
    /// For `WRITE_BLOCK`, `buf` holds the block to send. For `READ_BLOCK`,
    /// the returned block is stored in `buf`. Other commands ignore it.
    pub async fn execute(
        &mut self,
        command: Command,
        disk: DiskIndex,
        block: BlockIndex,
        buf: Option<&mut Block>,
    ) -> Result<()> {
        let opcode = Opcode::new(command, disk, block);
        let mut scratch = [0u8; BLOCK_SIZE];
        let buf = buf.unwrap_or(&mut scratch);

        self.send_block_command(opcode, Some(&*buf)).await?;
        let header = self.receive_response(buf).await?;

        if header.return_code != RETURN_SUCCESS {
            warn!("{opcode} failed with return code {:#06x}", header.return_code);
            return Err(Error::CommandFailed {
                command: command.name().to_string(),
                code: header.return_code,
            });
        }

        Ok(())
    }
}

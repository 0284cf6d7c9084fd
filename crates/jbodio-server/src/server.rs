//! JBOD protocol server loop

use crate::jbod::SharedJbod;
use jbodio_common::{BLOCK_SIZE, Result};
use jbodio_proto::{HEADER_LEN, Opcode, Packet, PacketHeader, RETURN_FAILURE};
use std::io::ErrorKind;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

/// Accept connections forever, serving each on its own task
pub async fn serve(listener: TcpListener, jbod: SharedJbod) {
    if let Ok(addr) = listener.local_addr() {
        info!("JBOD: listening on {addr}");
    }

    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let jbod = SharedJbod::clone(&jbod);
                tokio::spawn(async move {
                    info!("JBOD: client {peer} connected");
                    match handle_client(stream, jbod).await {
                        Ok(()) => info!("JBOD: client {peer} disconnected"),
                        Err(e) => warn!("JBOD: client {peer} error: {e}"),
                    }
                });
            }
            Err(e) => {
                error!("JBOD: accept error: {e}");
                tokio::time::sleep(std::time::Duration::from_secs(1)).await;
            }
        }
    }
}

/// Serve one connection until the peer hangs up
///
/// A clean end of stream between packets is a normal disconnect.
pub async fn handle_client<S>(mut stream: S, jbod: SharedJbod) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    loop {
        let mut raw = [0u8; HEADER_LEN];
        match stream.read_exact(&mut raw).await {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(()),
            Err(e) => return Err(e.into()),
        }
        let header = PacketHeader::decode(&raw)?;

        let payload = if header.has_payload() {
            let mut block = [0u8; BLOCK_SIZE];
            stream.read_exact(&mut block).await?;
            Some(block)
        } else {
            None
        };

        let response = match Opcode::decode(header.opcode) {
            Ok(opcode) => {
                let reply = jbod.lock().apply(opcode, payload.as_ref());
                debug!("JBOD: {opcode} -> {:#06x}", reply.return_code);
                Packet::response(header.opcode, reply.return_code, reply.payload)
            }
            Err(e) => {
                warn!("JBOD: rejecting opcode {:#010x}: {e}", header.opcode);
                Packet::response(header.opcode, RETURN_FAILURE, None)
            }
        };

        stream.write_all(&response.encode()).await?;
        stream.flush().await?;
    }
}

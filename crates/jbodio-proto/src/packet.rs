//! Packet header and packet framing

use crate::opcode::{Command, Opcode};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use jbodio_common::{BLOCK_SIZE, Block, Error, Result};

/// Size of the fixed packet header in bytes
pub const HEADER_LEN: usize = 8;

/// Return code reported for a successful command
pub const RETURN_SUCCESS: u16 = 0;

/// Return code the reference server reports for a failed command
pub const RETURN_FAILURE: u16 = 0xffff;

/// Fixed-size packet header, big-endian on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    /// Total packet length, header included
    pub length: u16,
    /// Packed opcode
    pub opcode: u32,
    /// Zero in requests; command status in responses
    pub return_code: u16,
}

impl PacketHeader {
    /// Serialize the header
    #[must_use]
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        let mut buf = &mut out[..];
        buf.put_u16(self.length);
        buf.put_u32(self.opcode);
        buf.put_u16(self.return_code);
        out
    }

    /// Parse a header from the first `HEADER_LEN` bytes of `data`
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_LEN {
            return Err(Error::malformed(format!(
                "truncated header: {} of {HEADER_LEN} bytes",
                data.len()
            )));
        }

        let mut buf = &data[..HEADER_LEN];
        Ok(Self {
            length: buf.get_u16(),
            opcode: buf.get_u32(),
            return_code: buf.get_u16(),
        })
    }

    /// Whether a block follows this header
    #[must_use]
    pub fn has_payload(&self) -> bool {
        usize::from(self.length) > HEADER_LEN
    }
}

/// A header plus its optional block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub header: PacketHeader,
    pub payload: Option<Block>,
}

impl Packet {
    /// Build a request packet
    ///
    /// The block is attached only for `WRITE_BLOCK`, which requires one.
    pub fn request(opcode: Opcode, block: Option<&Block>) -> Result<Self> {
        let raw = opcode.encode()?;

        let payload = if opcode.command.sends_block() {
            let block = block.ok_or_else(|| {
                Error::invalid_argument(format!("{} requires a block", opcode.command))
            })?;
            Some(*block)
        } else {
            None
        };

        Ok(Self::with_payload(raw, 0, payload))
    }

    /// Build a response packet
    #[must_use]
    pub fn response(opcode: u32, return_code: u16, payload: Option<Block>) -> Self {
        Self::with_payload(opcode, return_code, payload)
    }

    fn with_payload(opcode: u32, return_code: u16, payload: Option<Block>) -> Self {
        let length = if payload.is_some() {
            HEADER_LEN + BLOCK_SIZE
        } else {
            HEADER_LEN
        };

        Self {
            header: PacketHeader {
                length: length as u16,
                opcode,
                return_code,
            },
            payload,
        }
    }

    /// Number of bytes this packet occupies on the wire
    #[must_use]
    pub fn wire_len(&self) -> usize {
        usize::from(self.header.length)
    }

    /// Decode the command carried by this packet
    pub fn command(&self) -> Result<Command> {
        Opcode::decode(self.header.opcode).map(|op| op.command)
    }

    /// Serialize header and payload
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.wire_len());
        buf.put_slice(&self.header.encode());
        if let Some(block) = &self.payload {
            buf.put_slice(block);
        }
        buf.freeze()
    }

    /// Parse a complete packet
    pub fn decode(data: &[u8]) -> Result<Self> {
        let header = PacketHeader::decode(data)?;

        let payload = if header.has_payload() {
            let body = &data[HEADER_LEN..];
            if body.len() < BLOCK_SIZE {
                return Err(Error::malformed(format!(
                    "truncated payload: {} of {BLOCK_SIZE} bytes",
                    body.len()
                )));
            }
            let mut block = [0u8; BLOCK_SIZE];
            block.copy_from_slice(&body[..BLOCK_SIZE]);
            Some(block)
        } else {
            None
        };

        Ok(Self { header, payload })
    }
}

//! jbodio Protocol
//!
//! Framing for the JBOD block protocol. Every request and response is a
//! packet with an 8-byte big-endian header, optionally followed by one block:
//!
//! ```text
//! 0        2                6        8                     8+256
//! +--------+----------------+--------+----------------------+
//! | length |     opcode     | return |  block (optional)    |
//! |  u16   |      u32       |  u16   |  256 bytes           |
//! +--------+----------------+--------+----------------------+
//! ```
//!
//! This crate is pure encoding and decoding; the transport lives in
//! `jbodio-client` and `jbodio-server`.

pub mod opcode;
pub mod packet;

pub use opcode::{Command, Opcode};
pub use packet::{HEADER_LEN, Packet, PacketHeader, RETURN_FAILURE, RETURN_SUCCESS};

//! jbodio Server
//!
//! An in-memory JBOD: sixteen zero-filled disks behind the JBOD block
//! protocol. Used as the reference peer for the client and as the test double
//! for the volume layer.

pub mod jbod;
pub mod server;

pub use jbod::{MemoryJbod, OpCounters, Reply, SharedJbod};
pub use server::{handle_client, serve};

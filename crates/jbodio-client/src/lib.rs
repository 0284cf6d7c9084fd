//! jbodio Client
//!
//! Sends single block commands to a JBOD server over one persistent stream
//! connection and reads back each response before the next command is sent.

pub mod connection;

pub use connection::ProtocolClient;

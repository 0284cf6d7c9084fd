//! Error types for jbodio
//!
//! One error type covers argument validation, mount and cache state, and the
//! network protocol. Every failure is reported to the caller; none is fatal.

use thiserror::Error;

/// Common result type for jbodio operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for jbodio
#[derive(Debug, Error)]
pub enum Error {
    // Validation errors
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    // Mount state
    #[error("volume is not mounted")]
    NotMounted,

    #[error("volume is already mounted")]
    AlreadyMounted,

    // Cache lifecycle
    #[error("block cache is not enabled")]
    CacheNotEnabled,

    #[error("block cache is already enabled")]
    CacheAlreadyEnabled,

    #[error("invalid cache capacity {0}: must be between 2 and 4096 entries")]
    InvalidCacheCapacity(usize),

    // Network/protocol errors
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("protocol I/O failure: {0}")]
    ProtocolIo(#[from] std::io::Error),

    #[error("malformed packet: {0}")]
    MalformedPacket(String),

    #[error("server rejected {command} with return code {code:#06x}")]
    CommandFailed { command: String, code: u16 },

    // Configuration
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create an invalid argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a malformed packet error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedPacket(msg.into())
    }

    /// Check if this error came from the connection or the server rather than
    /// from the caller's arguments or local state
    #[must_use]
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed(_)
                | Self::ProtocolIo(_)
                | Self::MalformedPacket(_)
                | Self::CommandFailed { .. }
        )
    }
}

//! jbodio Block Volume
//!
//! This crate presents the sixteen disks of a remote JBOD server as one
//! linear, byte-addressable volume. Byte ranges are split into block-sized
//! pieces, served from a client-side block cache where possible, and
//! otherwise transferred block by block over the JBOD protocol.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │   JbodVolume     │  mount / read / write
//! │  - layout        │  address → (disk, block, offset)
//! │  - BlockCache    │  LRU by logical clock
//! └────────┬─────────┘
//!          │ ProtocolClient
//! ┌────────▼─────────┐
//! │   JBOD server    │  16 disks × 256 blocks × 256 bytes
//! └──────────────────┘
//! ```

pub mod cache;
pub mod layout;
pub mod volume;

pub use cache::{BlockCache, CacheKey, CacheStats, InsertOutcome};
pub use layout::{BlockAddress, BlockSpan, advance, block_spans, locate, validate_range};
pub use volume::JbodVolume;

//! Core type definitions for jbodio
//!
//! The volume is a plain concatenation of `NUM_DISKS` remote disks, each
//! holding `BLOCKS_PER_DISK` blocks of `BLOCK_SIZE` bytes:
//!
//! ```text
//! linear address   0 ........ 65535 | 65536 ...... 131071 | ... | 1048575
//!                  |     disk 0     |       disk 1        | ... | disk 15
//! ```

/// Number of disks behind the server
pub const NUM_DISKS: u32 = 16;

/// Number of blocks on every disk
pub const BLOCKS_PER_DISK: u32 = 256;

/// Size of a block in bytes, the unit of remote transfer
pub const BLOCK_SIZE: usize = 256;

/// Size of one disk in bytes
pub const DISK_SIZE: u32 = BLOCKS_PER_DISK * BLOCK_SIZE as u32;

/// Total size of the linear volume in bytes (1 MiB)
pub const TOTAL_CAPACITY: u32 = NUM_DISKS * DISK_SIZE;

/// Largest byte count a single read or write may transfer
pub const MAX_TRANSFER: usize = 1024;

/// Smallest accepted cache capacity (entries)
pub const MIN_CACHE_ENTRIES: usize = 2;

/// Largest accepted cache capacity (entries)
pub const MAX_CACHE_ENTRIES: usize = 4096;

/// A single disk block
pub type Block = [u8; BLOCK_SIZE];

/// Byte offset into the linear volume
pub type Address = u32;

/// Index of a disk, `0..NUM_DISKS`
pub type DiskIndex = u32;

/// Index of a block within its disk, `0..BLOCKS_PER_DISK`
pub type BlockIndex = u32;

/// Returns an all-zero block
#[must_use]
pub const fn zero_block() -> Block {
    [0u8; BLOCK_SIZE]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry() {
        assert_eq!(DISK_SIZE, 65_536);
        assert_eq!(TOTAL_CAPACITY, 1_048_576);
        assert!(MAX_TRANSFER < DISK_SIZE as usize);
    }
}

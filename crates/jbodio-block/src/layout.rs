//! Address translation for the linear volume
//!
//! Maps linear byte addresses onto (disk, block, offset) triples and walks
//! byte ranges block by block, crossing block and disk boundaries.
//!
//! ```text
//! address 200, length 300
//! ├── disk 0 block 0: offset 200, 56 bytes   → buf[0..56]
//! └── disk 0 block 1: offset 0,   244 bytes  → buf[56..300]
//! ```

use jbodio_common::{
    Address, BLOCK_SIZE, BLOCKS_PER_DISK, BlockIndex, DISK_SIZE, DiskIndex, Error, MAX_TRANSFER,
    Result, TOTAL_CAPACITY,
};

/// Location of a byte on the disk array
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockAddress {
    pub disk: DiskIndex,
    pub block: BlockIndex,
    /// Byte offset within the block
    pub offset: usize,
}

/// Locate a linear address
#[must_use]
pub fn locate(address: Address) -> BlockAddress {
    BlockAddress {
        disk: address / DISK_SIZE,
        block: (address / BLOCK_SIZE as u32) % BLOCKS_PER_DISK,
        offset: address as usize % BLOCK_SIZE,
    }
}

/// The block following `(disk, block)` in linear order
#[must_use]
pub fn advance(disk: DiskIndex, block: BlockIndex) -> (DiskIndex, BlockIndex) {
    let next = block + 1;
    if next == BLOCKS_PER_DISK {
        (disk + 1, 0)
    } else {
        (disk, next)
    }
}

/// Check that `length` bytes starting at `address` form a valid request
pub fn validate_range(address: Address, length: usize) -> Result<()> {
    if length > MAX_TRANSFER {
        return Err(Error::invalid_argument(format!(
            "length {length} exceeds the {MAX_TRANSFER}-byte transfer limit"
        )));
    }

    if u64::from(address) + length as u64 > u64::from(TOTAL_CAPACITY) {
        return Err(Error::invalid_argument(format!(
            "range {address}+{length} exceeds volume size {TOTAL_CAPACITY}"
        )));
    }

    Ok(())
}

/// The part of a request that falls within one block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSpan {
    pub disk: DiskIndex,
    pub block: BlockIndex,
    /// Byte offset within the block
    pub offset: usize,
    /// Number of bytes in this span
    pub len: usize,
    /// Position of the span within the caller's buffer
    pub buf_offset: usize,
}

impl BlockSpan {
    /// Range of the span within its block
    #[must_use]
    pub fn block_range(&self) -> std::ops::Range<usize> {
        self.offset..self.offset + self.len
    }

    /// Range of the span within the caller's buffer
    #[must_use]
    pub fn buf_range(&self) -> std::ops::Range<usize> {
        self.buf_offset..self.buf_offset + self.len
    }
}

/// Iterator over the block spans of a byte range
#[derive(Debug, Clone)]
pub struct BlockSpans {
    disk: DiskIndex,
    block: BlockIndex,
    offset: usize,
    remaining: usize,
    buf_offset: usize,
}

/// Split a byte range into per-block spans, in address order
///
/// The range should already have passed [`validate_range`].
#[must_use]
pub fn block_spans(address: Address, length: usize) -> BlockSpans {
    let start = locate(address);
    BlockSpans {
        disk: start.disk,
        block: start.block,
        offset: start.offset,
        remaining: length,
        buf_offset: 0,
    }
}

impl Iterator for BlockSpans {
    type Item = BlockSpan;

    fn next(&mut self) -> Option<BlockSpan> {
        if self.remaining == 0 {
            return None;
        }

        let len = (BLOCK_SIZE - self.offset).min(self.remaining);
        let span = BlockSpan {
            disk: self.disk,
            block: self.block,
            offset: self.offset,
            len,
            buf_offset: self.buf_offset,
        };

        // Only the first span can start mid-block
        self.offset = 0;
        self.remaining -= len;
        self.buf_offset += len;
        (self.disk, self.block) = advance(self.disk, self.block);

        Some(span)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locate() {
        assert_eq!(
            locate(0),
            BlockAddress {
                disk: 0,
                block: 0,
                offset: 0
            }
        );
        assert_eq!(
            locate(200),
            BlockAddress {
                disk: 0,
                block: 0,
                offset: 200
            }
        );
        assert_eq!(
            locate(256),
            BlockAddress {
                disk: 0,
                block: 1,
                offset: 0
            }
        );
        assert_eq!(
            locate(65_536 + 3 * 256 + 7),
            BlockAddress {
                disk: 1,
                block: 3,
                offset: 7
            }
        );
        assert_eq!(
            locate(TOTAL_CAPACITY - 1),
            BlockAddress {
                disk: 15,
                block: 255,
                offset: 255
            }
        );
    }

    #[test]
    fn test_advance() {
        assert_eq!(advance(0, 0), (0, 1));
        assert_eq!(advance(0, 254), (0, 255));
        assert_eq!(advance(0, 255), (1, 0));
        assert_eq!(advance(14, 255), (15, 0));
    }

    #[test]
    fn test_validate_range() {
        assert!(validate_range(0, 0).is_ok());
        assert!(validate_range(0, MAX_TRANSFER).is_ok());
        assert!(validate_range(TOTAL_CAPACITY - 1024, 1024).is_ok());
        assert!(validate_range(TOTAL_CAPACITY, 0).is_ok());

        assert!(matches!(
            validate_range(0, MAX_TRANSFER + 1),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            validate_range(TOTAL_CAPACITY - 1023, 1024),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            validate_range(u32::MAX, 1),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_spans_within_block() {
        let spans: Vec<_> = block_spans(10, 20).collect();
        assert_eq!(
            spans,
            vec![BlockSpan {
                disk: 0,
                block: 0,
                offset: 10,
                len: 20,
                buf_offset: 0
            }]
        );
    }

    #[test]
    fn test_spans_crossing_block() {
        let spans: Vec<_> = block_spans(200, 300).collect();
        assert_eq!(spans.len(), 2);
        assert_eq!((spans[0].block, spans[0].offset, spans[0].len), (0, 200, 56));
        assert_eq!((spans[1].block, spans[1].offset, spans[1].len), (1, 0, 244));
        assert_eq!(spans[1].buf_range(), 56..300);
    }

    #[test]
    fn test_spans_crossing_disk() {
        let spans: Vec<_> = block_spans(DISK_SIZE - 100, 1024).collect();
        assert_eq!(spans.len(), 5);
        assert_eq!((spans[0].disk, spans[0].block), (0, 255));
        assert_eq!(spans[0].block_range(), 156..256);
        assert_eq!((spans[1].disk, spans[1].block), (1, 0));
        assert_eq!((spans[4].disk, spans[4].block, spans[4].len), (1, 3, 156));
        assert_eq!(spans.iter().map(|s| s.len).sum::<usize>(), 1024);
    }

    #[test]
    fn test_spans_aligned() {
        let spans: Vec<_> = block_spans(512, 512).collect();
        assert_eq!(spans.len(), 2);
        assert!(spans.iter().all(|s| s.offset == 0 && s.len == BLOCK_SIZE));
    }

    #[test]
    fn test_spans_empty() {
        assert_eq!(block_spans(1000, 0).count(), 0);
    }
}

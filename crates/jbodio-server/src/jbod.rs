//! In-memory disk array
//!
//! The array keeps one I/O cursor `(disk, block)`. Seeks move it; every
//! block read or write acts on the block under the cursor and then advances
//! it by one block, rolling over into the next disk.

use jbodio_common::{BLOCKS_PER_DISK, Block, BlockIndex, DiskIndex, NUM_DISKS, zero_block};
use jbodio_proto::{Command, Opcode, RETURN_FAILURE, RETURN_SUCCESS};
use parking_lot::Mutex;
use std::sync::Arc;

/// Array shared between connections
pub type SharedJbod = Arc<Mutex<MemoryJbod>>;

/// Commands executed, by kind
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct OpCounters {
    pub mounts: u64,
    pub unmounts: u64,
    pub seeks: u64,
    pub reads: u64,
    pub writes: u64,
    pub failures: u64,
}

impl OpCounters {
    /// Total commands received, failed ones included
    #[must_use]
    pub fn total(&self) -> u64 {
        self.mounts + self.unmounts + self.seeks + self.reads + self.writes
    }
}

/// Outcome of one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub return_code: u16,
    pub payload: Option<Block>,
}

impl Reply {
    fn ok() -> Self {
        Self {
            return_code: RETURN_SUCCESS,
            payload: None,
        }
    }

    fn failed() -> Self {
        Self {
            return_code: RETURN_FAILURE,
            payload: None,
        }
    }
}

/// Sixteen disks of 256 blocks held in memory
pub struct MemoryJbod {
    blocks: Vec<Block>,
    mounted: bool,
    disk: DiskIndex,
    block: BlockIndex,
    counters: OpCounters,
}

impl Default for MemoryJbod {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryJbod {
    /// Create an unmounted, zero-filled array
    #[must_use]
    pub fn new() -> Self {
        Self {
            blocks: vec![zero_block(); (NUM_DISKS * BLOCKS_PER_DISK) as usize],
            mounted: false,
            disk: 0,
            block: 0,
            counters: OpCounters::default(),
        }
    }

    /// Create an array ready to share between connections
    #[must_use]
    pub fn shared() -> SharedJbod {
        Arc::new(Mutex::new(Self::new()))
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Current I/O cursor
    pub fn cursor(&self) -> (DiskIndex, BlockIndex) {
        (self.disk, self.block)
    }

    pub fn counters(&self) -> OpCounters {
        self.counters
    }

    /// Inspect a stored block
    pub fn block(&self, disk: DiskIndex, block: BlockIndex) -> Option<&Block> {
        Self::slot(disk, block).map(|i| &self.blocks[i])
    }

    fn slot(disk: DiskIndex, block: BlockIndex) -> Option<usize> {
        (disk < NUM_DISKS && block < BLOCKS_PER_DISK)
            .then(|| (disk * BLOCKS_PER_DISK + block) as usize)
    }

    fn advance(&mut self) {
        self.block += 1;
        if self.block == BLOCKS_PER_DISK {
            self.block = 0;
            self.disk += 1;
        }
    }

    /// Execute one command
    ///
    /// `payload` is only consulted for `WRITE_BLOCK`.
    pub fn apply(&mut self, opcode: Opcode, payload: Option<&Block>) -> Reply {
        let reply = self.dispatch(opcode, payload);
        if reply.return_code != RETURN_SUCCESS {
            self.counters.failures += 1;
        }
        reply
    }

    fn dispatch(&mut self, opcode: Opcode, payload: Option<&Block>) -> Reply {
        match opcode.command {
            Command::Mount => {
                self.counters.mounts += 1;
                if self.mounted {
                    return Reply::failed();
                }
                self.mounted = true;
                Reply::ok()
            }
            Command::Unmount => {
                self.counters.unmounts += 1;
                if !self.mounted {
                    return Reply::failed();
                }
                self.mounted = false;
                Reply::ok()
            }
            Command::SeekToDisk => {
                self.counters.seeks += 1;
                if !self.mounted || opcode.disk >= NUM_DISKS {
                    return Reply::failed();
                }
                self.disk = opcode.disk;
                self.block = 0;
                Reply::ok()
            }
            Command::SeekToBlock => {
                self.counters.seeks += 1;
                if !self.mounted || opcode.block >= BLOCKS_PER_DISK {
                    return Reply::failed();
                }
                self.block = opcode.block;
                Reply::ok()
            }
            Command::ReadBlock => {
                self.counters.reads += 1;
                let Some(slot) = Self::slot(self.disk, self.block).filter(|_| self.mounted) else {
                    return Reply::failed();
                };
                let data = self.blocks[slot];
                self.advance();
                Reply {
                    return_code: RETURN_SUCCESS,
                    payload: Some(data),
                }
            }
            Command::WriteBlock => {
                self.counters.writes += 1;
                let (Some(slot), Some(data)) = (
                    Self::slot(self.disk, self.block).filter(|_| self.mounted),
                    payload,
                ) else {
                    return Reply::failed();
                };
                self.blocks[slot] = *data;
                self.advance();
                Reply::ok()
            }
        }
    }
}

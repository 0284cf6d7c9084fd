//! Opcode packing
//!
//! ```text
//!  31        26 25   22 21                              0
//! +------------+-------+---------------------------------+
//! |  command   | disk  |             block               |
//! |   6 bits   | 4 bits|            22 bits              |
//! +------------+-------+---------------------------------+
//! ```

use jbodio_common::{BlockIndex, DiskIndex, Error, Result};
use std::fmt;

const COMMAND_SHIFT: u32 = 26;
const DISK_SHIFT: u32 = 22;

const COMMAND_MASK: u32 = 0x3f;
const DISK_MASK: u32 = 0xf;
const BLOCK_MASK: u32 = 0x3f_ffff;

/// Commands understood by the JBOD server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Bring all disks online
    Mount,
    /// Take all disks offline
    Unmount,
    /// Move the I/O cursor to the start of a disk
    SeekToDisk,
    /// Move the I/O cursor to a block of the current disk
    SeekToBlock,
    /// Read the block under the cursor and advance
    ReadBlock,
    /// Write the block under the cursor and advance
    WriteBlock,
}

impl Command {
    /// All commands, in wire-value order
    pub const ALL: [Command; 6] = [
        Command::Mount,
        Command::Unmount,
        Command::SeekToDisk,
        Command::SeekToBlock,
        Command::ReadBlock,
        Command::WriteBlock,
    ];

    /// Wire value of the command
    #[must_use]
    pub const fn code(self) -> u32 {
        match self {
            Command::Mount => 0,
            Command::Unmount => 1,
            Command::SeekToDisk => 2,
            Command::SeekToBlock => 3,
            Command::ReadBlock => 4,
            Command::WriteBlock => 5,
        }
    }

    /// Parse a wire value
    #[must_use]
    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|cmd| cmd.code() == code)
    }

    /// Protocol name of the command
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Command::Mount => "MOUNT",
            Command::Unmount => "UNMOUNT",
            Command::SeekToDisk => "SEEK_TO_DISK",
            Command::SeekToBlock => "SEEK_TO_BLOCK",
            Command::ReadBlock => "READ_BLOCK",
            Command::WriteBlock => "WRITE_BLOCK",
        }
    }

    /// Whether a request with this command carries a block payload
    #[must_use]
    pub const fn sends_block(self) -> bool {
        matches!(self, Command::WriteBlock)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A command together with the disk and block it targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Opcode {
    pub command: Command,
    pub disk: DiskIndex,
    pub block: BlockIndex,
}

impl Opcode {
    #[must_use]
    pub const fn new(command: Command, disk: DiskIndex, block: BlockIndex) -> Self {
        Self {
            command,
            disk,
            block,
        }
    }

    /// Opcode for a command that ignores disk and block
    #[must_use]
    pub const fn bare(command: Command) -> Self {
        Self::new(command, 0, 0)
    }

    /// Pack into the 32-bit wire value
    ///
    /// Fails instead of truncating when `disk` or `block` do not fit their
    /// bit fields.
    pub fn encode(&self) -> Result<u32> {
        if self.disk > DISK_MASK {
            return Err(Error::invalid_argument(format!(
                "disk index {} does not fit in 4 bits",
                self.disk
            )));
        }
        if self.block > BLOCK_MASK {
            return Err(Error::invalid_argument(format!(
                "block index {} does not fit in 22 bits",
                self.block
            )));
        }

        Ok((self.command.code() << COMMAND_SHIFT) | (self.disk << DISK_SHIFT) | self.block)
    }

    /// Unpack a 32-bit wire value
    pub fn decode(raw: u32) -> Result<Self> {
        let code = (raw >> COMMAND_SHIFT) & COMMAND_MASK;
        let command = Command::from_code(code)
            .ok_or_else(|| Error::malformed(format!("unknown command {code}")))?;

        Ok(Self {
            command,
            disk: (raw >> DISK_SHIFT) & DISK_MASK,
            block: raw & BLOCK_MASK,
        })
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(disk={}, block={})", self.command, self.disk, self.block)
    }
}

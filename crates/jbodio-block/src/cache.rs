//! Client-side block cache
//!
//! Holds copies of recently used blocks so repeated reads of the same block
//! skip the network. Eviction is least-recently-used by a logical clock that
//! advances on every lookup and insert; an entry's stamp records the clock
//! value of its last use.
//!
//! Capacity is bounded by [`MAX_CACHE_ENTRIES`], small enough that entries
//! live in a plain `Vec` searched linearly. Among entries with equal stamps
//! the first in storage order is evicted.

use jbodio_common::{
    BLOCKS_PER_DISK, Block, BlockIndex, DiskIndex, Error, MAX_CACHE_ENTRIES, MIN_CACHE_ENTRIES,
    NUM_DISKS, Result,
};

/// Cache key identifies a block across all disks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub disk: DiskIndex,
    pub block: BlockIndex,
}

impl CacheKey {
    pub fn new(disk: DiskIndex, block: BlockIndex) -> Self {
        Self { disk, block }
    }
}

/// Individual cache entry with LRU tracking
#[derive(Debug, Clone)]
struct CacheEntry {
    key: CacheKey,
    data: Block,
    /// Clock value at last use
    access_stamp: u64,
}

/// Cache statistics
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of lookups
    pub queries: u64,
    /// Number of lookups that found their block
    pub hits: u64,
    /// Number of new entries stored, evictions included
    pub inserts: u64,
    /// Number of inserts that refreshed an existing entry
    pub updates: u64,
    /// Number of entries evicted
    pub evictions: u64,
}

impl CacheStats {
    /// Fraction of lookups that hit, `None` before the first lookup
    #[must_use]
    pub fn hit_ratio(&self) -> Option<f64> {
        if self.queries == 0 {
            return None;
        }
        Some(self.hits as f64 / self.queries as f64)
    }
}

/// What an insert did to the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Stored in a free slot
    Inserted,
    /// The block was already cached and its data was replaced
    Updated,
    /// Stored in place of the least recently used entry
    Evicted { disk: DiskIndex, block: BlockIndex },
}

/// LRU block cache
#[derive(Debug, Default)]
pub struct BlockCache {
    entries: Vec<CacheEntry>,
    /// Zero while disabled
    capacity: usize,
    clock: u64,
    stats: CacheStats,
}

impl BlockCache {
    /// Create a disabled cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate room for `capacity` blocks and start caching
    pub fn enable(&mut self, capacity: usize) -> Result<()> {
        if self.is_enabled() {
            return Err(Error::CacheAlreadyEnabled);
        }
        if !(MIN_CACHE_ENTRIES..=MAX_CACHE_ENTRIES).contains(&capacity) {
            return Err(Error::InvalidCacheCapacity(capacity));
        }

        self.entries = Vec::with_capacity(capacity);
        self.capacity = capacity;
        self.clock = 0;
        self.stats = CacheStats::default();
        Ok(())
    }

    /// Drop every entry and stop caching
    pub fn disable(&mut self) -> Result<()> {
        if !self.is_enabled() {
            return Err(Error::CacheNotEnabled);
        }

        *self = Self::default();
        Ok(())
    }

    pub fn is_enabled(&self) -> bool {
        self.capacity > 0
    }

    /// Maximum number of entries, zero while disabled
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of cached blocks
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Hit ratio since the cache was enabled
    pub fn hit_rate(&self) -> Option<f64> {
        self.stats.hit_ratio()
    }

    /// Check for a block without counting a query or touching its stamp
    pub fn contains(&self, disk: DiskIndex, block: BlockIndex) -> bool {
        self.position(CacheKey::new(disk, block)).is_some()
    }

    /// Stamp of a cached block
    pub fn access_stamp(&self, disk: DiskIndex, block: BlockIndex) -> Option<u64> {
        self.position(CacheKey::new(disk, block))
            .map(|i| self.entries[i].access_stamp)
    }

    /// Look a block up, refreshing its stamp on a hit
    pub fn lookup(&mut self, disk: DiskIndex, block: BlockIndex) -> Result<Option<Block>> {
        if !self.is_enabled() {
            return Err(Error::CacheNotEnabled);
        }

        self.stats.queries += 1;
        let clock = self.tick();

        let Some(i) = self.position(CacheKey::new(disk, block)) else {
            return Ok(None);
        };

        let entry = &mut self.entries[i];
        entry.access_stamp = clock;
        self.stats.hits += 1;
        Ok(Some(entry.data))
    }

    /// Store a block, replacing the least recently used entry when full
    pub fn insert(&mut self, disk: DiskIndex, block: BlockIndex, data: &Block) -> Result<InsertOutcome> {
        if !self.is_enabled() {
            return Err(Error::CacheNotEnabled);
        }
        if disk >= NUM_DISKS || block >= BLOCKS_PER_DISK {
            return Err(Error::invalid_argument(format!(
                "block ({disk}, {block}) out of range"
            )));
        }

        let key = CacheKey::new(disk, block);
        let clock = self.tick();

        if let Some(i) = self.position(key) {
            let entry = &mut self.entries[i];
            entry.data = *data;
            entry.access_stamp = clock;
            self.stats.updates += 1;
            return Ok(InsertOutcome::Updated);
        }

        let fresh = CacheEntry {
            key,
            data: *data,
            access_stamp: clock,
        };
        self.stats.inserts += 1;

        if self.entries.len() < self.capacity {
            self.entries.push(fresh);
            return Ok(InsertOutcome::Inserted);
        }

        let victim = self.find_lru_entry();
        let evicted = std::mem::replace(&mut self.entries[victim], fresh).key;
        self.stats.evictions += 1;
        Ok(InsertOutcome::Evicted {
            disk: evicted.disk,
            block: evicted.block,
        })
    }

    fn position(&self, key: CacheKey) -> Option<usize> {
        self.entries.iter().position(|e| e.key == key)
    }

    /// Index of the entry with the smallest stamp, first one on ties
    fn find_lru_entry(&self) -> usize {
        let mut victim = 0;
        for (i, entry) in self.entries.iter().enumerate().skip(1) {
            if entry.access_stamp < self.entries[victim].access_stamp {
                victim = i;
            }
        }
        victim
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }
}

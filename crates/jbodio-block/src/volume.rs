//! Linear volume service
//!
//! [`JbodVolume`] owns the protocol connection, the mount state and the block
//! cache, and turns byte-range reads and writes into block commands.
//!
//! The server keeps an I/O cursor that seeks set and block transfers advance.
//! The volume tracks where that cursor sits so a transfer only seeks when the
//! cursor is somewhere else, and a block served from the cache never leaves
//! the tracked cursor stale.

use crate::cache::{BlockCache, CacheStats, InsertOutcome};
use crate::layout;
use jbodio_client::ProtocolClient;
use jbodio_common::{
    Address, BLOCKS_PER_DISK, Block, BlockIndex, Config, DiskIndex, Error, Result, zero_block,
};
use jbodio_proto::Command;
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

/// Connection state that must not interleave between operations
struct Session<S> {
    client: ProtocolClient<S>,
    mounted: bool,
    /// Where the server's cursor is known to be
    cursor: Option<(DiskIndex, BlockIndex)>,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    fn ensure_mounted(&self) -> Result<()> {
        if self.mounted {
            Ok(())
        } else {
            Err(Error::NotMounted)
        }
    }

    async fn run(
        &mut self,
        command: Command,
        disk: DiskIndex,
        block: BlockIndex,
        buf: Option<&mut Block>,
    ) -> Result<()> {
        let result = self.client.execute(command, disk, block, buf).await;
        if result.is_err() {
            self.cursor = None;
        }
        result
    }

    /// Move the server's cursor to `(disk, block)` unless it is already there
    async fn seek(&mut self, disk: DiskIndex, block: BlockIndex) -> Result<()> {
        if self.cursor == Some((disk, block)) {
            return Ok(());
        }

        if self.cursor.map(|(d, _)| d) != Some(disk) {
            self.run(Command::SeekToDisk, disk, 0, None).await?;
        }
        self.run(Command::SeekToBlock, disk, block, None).await?;

        self.cursor = Some((disk, block));
        Ok(())
    }

    /// Read or write one block at `(disk, block)`
    async fn transfer(
        &mut self,
        command: Command,
        disk: DiskIndex,
        block: BlockIndex,
        buf: &mut Block,
    ) -> Result<()> {
        self.seek(disk, block).await?;
        self.run(command, disk, block, Some(buf)).await?;

        // Past the last block the server moves to the next disk; re-seek there
        self.cursor = (block + 1 < BLOCKS_PER_DISK).then_some((disk, block + 1));
        Ok(())
    }
}

/// Linear, byte-addressable volume over a JBOD server
pub struct JbodVolume<S> {
    session: tokio::sync::Mutex<Session<S>>,
    cache: Mutex<BlockCache>,
}

impl JbodVolume<TcpStream> {
    /// Connect to a JBOD server
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        let client = ProtocolClient::connect(host, port).await?;
        Ok(Self::new(client))
    }

    /// Connect using a loaded configuration, enabling the cache if configured
    pub async fn from_config(config: &Config) -> Result<Self> {
        let volume = Self::connect(&config.server.host, config.server.port).await?;
        if let Some(entries) = config.cache.capacity() {
            volume.cache_enable(entries)?;
        }
        Ok(volume)
    }
}

impl<S> JbodVolume<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap a connected client; the volume starts unmounted with no cache
    pub fn new(client: ProtocolClient<S>) -> Self {
        Self {
            session: tokio::sync::Mutex::new(Session {
                client,
                mounted: false,
                cursor: None,
            }),
            cache: Mutex::new(BlockCache::new()),
        }
    }

    pub async fn is_mounted(&self) -> bool {
        self.session.lock().await.mounted
    }

    /// Mount the disk array
    pub async fn mount(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        if session.mounted {
            return Err(Error::AlreadyMounted);
        }

        session.run(Command::Mount, 0, 0, None).await?;
        session.mounted = true;
        session.cursor = None;

        info!("Volume mounted");
        Ok(())
    }

    /// Unmount the disk array
    pub async fn unmount(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        session.ensure_mounted()?;

        session.run(Command::Unmount, 0, 0, None).await?;
        session.mounted = false;
        session.cursor = None;

        info!("Volume unmounted");
        Ok(())
    }

    /// Read `buf.len()` bytes starting at `address`
    ///
    /// Returns the number of bytes read. A remote failure aborts the read
    /// with no retry; the contents of `buf` are then unspecified.
    pub async fn read(&self, address: Address, buf: &mut [u8]) -> Result<usize> {
        let mut session = self.session.lock().await;
        session.ensure_mounted()?;
        layout::validate_range(address, buf.len())?;

        for span in layout::block_spans(address, buf.len()) {
            let data = match self.cached_block(span.disk, span.block) {
                Some(data) => data,
                None => {
                    let mut data = zero_block();
                    session
                        .transfer(Command::ReadBlock, span.disk, span.block, &mut data)
                        .await?;
                    self.cache_fill(span.disk, span.block, &data);
                    data
                }
            };
            buf[span.buf_range()].copy_from_slice(&data[span.block_range()]);
        }

        Ok(buf.len())
    }

    /// Read `len` bytes starting at `address` into a new buffer
    pub async fn read_to_vec(&self, address: Address, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read(address, &mut buf).await?;
        Ok(buf)
    }

    /// Write `data` starting at `address`
    ///
    /// Every touched block is read, patched and written back, so partial
    /// blocks keep their surrounding bytes. Returns the number of bytes
    /// written. A remote failure aborts the write with no retry; blocks
    /// before the failing one stay written.
    pub async fn write(&self, address: Address, data: &[u8]) -> Result<usize> {
        let mut session = self.session.lock().await;
        session.ensure_mounted()?;
        layout::validate_range(address, data.len())?;

        for span in layout::block_spans(address, data.len()) {
            let mut block = zero_block();
            session
                .transfer(Command::ReadBlock, span.disk, span.block, &mut block)
                .await?;
            block[span.block_range()].copy_from_slice(&data[span.buf_range()]);
            session
                .transfer(Command::WriteBlock, span.disk, span.block, &mut block)
                .await?;
            self.cache_refresh(span.disk, span.block, &block);
        }

        Ok(data.len())
    }

    /// Start caching up to `entries` blocks
    pub fn cache_enable(&self, entries: usize) -> Result<()> {
        self.cache.lock().enable(entries)?;
        info!("Block cache enabled with {entries} entries");
        Ok(())
    }

    /// Stop caching and drop all cached blocks
    pub fn cache_disable(&self) -> Result<()> {
        self.cache.lock().disable()?;
        info!("Block cache disabled");
        Ok(())
    }

    /// Hit ratio of the cache, `None` if it has not been queried
    pub fn cache_hit_rate(&self) -> Option<f64> {
        self.cache.lock().hit_rate()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.lock().stats()
    }

    /// Close the connection; later remote operations fail
    pub async fn disconnect(&self) {
        let mut session = self.session.lock().await;
        session.cursor = None;
        session.client.disconnect().await;
    }

    fn cached_block(&self, disk: DiskIndex, block: BlockIndex) -> Option<Block> {
        let mut cache = self.cache.lock();
        if !cache.is_enabled() {
            return None;
        }
        cache.lookup(disk, block).ok().flatten()
    }

    fn cache_fill(&self, disk: DiskIndex, block: BlockIndex, data: &Block) {
        let mut cache = self.cache.lock();
        if !cache.is_enabled() {
            return;
        }
        match cache.insert(disk, block, data) {
            Ok(InsertOutcome::Evicted {
                disk: old_disk,
                block: old_block,
            }) => debug!("Cache evicted ({old_disk}, {old_block}) for ({disk}, {block})"),
            Ok(_) => {}
            Err(e) => warn!("Failed to cache block ({disk}, {block}): {e}"),
        }
    }

    /// Replace the cached copy of a block if there is one
    fn cache_refresh(&self, disk: DiskIndex, block: BlockIndex, data: &Block) {
        let mut cache = self.cache.lock();
        if !cache.is_enabled() || !cache.contains(disk, block) {
            return;
        }
        if let Err(e) = cache.insert(disk, block, data) {
            warn!("Failed to refresh cached block ({disk}, {block}): {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jbodio_common::{BLOCK_SIZE, DISK_SIZE, MAX_TRANSFER, TOTAL_CAPACITY};
    use jbodio_server::{MemoryJbod, SharedJbod, handle_client};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use tokio::io::{DuplexStream, duplex};
    use tokio::task::JoinHandle;

    fn start() -> (JbodVolume<DuplexStream>, SharedJbod, JoinHandle<Result<()>>) {
        let jbod = MemoryJbod::shared();
        let (client_end, server_end) = duplex(1024);
        let server = tokio::spawn(handle_client(server_end, SharedJbod::clone(&jbod)));
        (JbodVolume::new(ProtocolClient::new(client_end)), jbod, server)
    }

    async fn mounted() -> (JbodVolume<DuplexStream>, SharedJbod) {
        let (volume, jbod, _server) = start();
        volume.mount().await.unwrap();
        (volume, jbod)
    }

    fn pattern(len: usize, seed: u8) -> Vec<u8> {
        (0..len).map(|i| (i as u8).wrapping_mul(7).wrapping_add(seed)).collect()
    }

    #[tokio::test]
    async fn test_mount_unmount_alternate() {
        let (volume, _jbod, _server) = start();

        assert!(matches!(volume.unmount().await, Err(Error::NotMounted)));
        volume.mount().await.unwrap();
        assert!(volume.is_mounted().await);
        assert!(matches!(volume.mount().await, Err(Error::AlreadyMounted)));
        volume.unmount().await.unwrap();
        assert!(!volume.is_mounted().await);
    }

    #[tokio::test]
    async fn test_failed_mount_stays_unmounted() {
        let (volume, jbod, _server) = start();
        // Another client already holds the array mounted
        let mount = jbodio_proto::Opcode::bare(Command::Mount);
        jbod.lock().apply(mount, None);

        assert!(matches!(
            volume.mount().await,
            Err(Error::CommandFailed { .. })
        ));
        assert!(!volume.is_mounted().await);
    }

    #[tokio::test]
    async fn test_io_requires_mount() {
        let (volume, jbod, _server) = start();
        let mut buf = [0u8; 16];

        assert!(matches!(volume.read(0, &mut buf).await, Err(Error::NotMounted)));
        assert!(matches!(volume.write(0, &buf).await, Err(Error::NotMounted)));
        assert_eq!(jbod.lock().counters().total(), 0);
    }

    #[tokio::test]
    async fn test_write_read_across_block() {
        let (volume, jbod) = mounted().await;
        let data = pattern(300, 1);

        assert_eq!(volume.write(200, &data).await.unwrap(), 300);
        assert_eq!(volume.read_to_vec(200, 300).await.unwrap(), data);

        // Bytes around the write are untouched
        let store = jbod.lock();
        let first = store.block(0, 0).unwrap();
        assert!(first[..200].iter().all(|&b| b == 0));
        assert_eq!(&first[200..], &data[..56]);
        let second = store.block(0, 1).unwrap();
        assert_eq!(&second[..244], &data[56..]);
        assert!(second[244..].iter().all(|&b| b == 0));
    }

    #[tokio::test]
    async fn test_write_read_across_disk() {
        let (volume, jbod) = mounted().await;
        let address = DISK_SIZE - 100;
        let data = pattern(MAX_TRANSFER, 9);

        volume.write(address, &data).await.unwrap();
        assert_eq!(volume.read_to_vec(address, MAX_TRANSFER).await.unwrap(), data);

        let store = jbod.lock();
        assert_eq!(&store.block(0, 255).unwrap()[156..], &data[..100]);
        assert_eq!(&store.block(1, 0).unwrap()[..], &data[100..356]);
    }

    #[tokio::test]
    async fn test_end_of_volume() {
        let (volume, _jbod) = mounted().await;
        let data = pattern(MAX_TRANSFER, 3);
        let last = TOTAL_CAPACITY - MAX_TRANSFER as u32;

        volume.write(last, &data).await.unwrap();
        assert_eq!(volume.read_to_vec(last, MAX_TRANSFER).await.unwrap(), data);

        assert!(matches!(
            volume.write(last + 1, &data).await,
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            volume.read_to_vec(0, MAX_TRANSFER + 1).await,
            Err(Error::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_zero_length_is_noop() {
        let (volume, jbod) = mounted().await;
        let before = jbod.lock().counters();

        assert_eq!(volume.read(500, &mut []).await.unwrap(), 0);
        assert_eq!(volume.write(500, &[]).await.unwrap(), 0);
        assert_eq!(volume.read(TOTAL_CAPACITY, &mut []).await.unwrap(), 0);
        assert_eq!(jbod.lock().counters(), before);
    }

    #[tokio::test]
    async fn test_sequential_reads_skip_seeks() {
        let (volume, jbod) = mounted().await;

        volume.read_to_vec(0, 1024).await.unwrap();
        let counters = jbod.lock().counters();
        assert_eq!(counters.reads, 4);
        assert_eq!(counters.seeks, 2);
    }

    #[tokio::test]
    async fn test_cache_hits_skip_network() {
        let (volume, jbod) = mounted().await;
        volume.cache_enable(16).unwrap();
        assert_eq!(volume.cache_hit_rate(), None);

        let data = pattern(512, 5);
        volume.write(0, &data).await.unwrap();
        assert_eq!(volume.read_to_vec(0, 512).await.unwrap(), data);
        let reads = jbod.lock().counters().reads;

        assert_eq!(volume.read_to_vec(0, 512).await.unwrap(), data);
        assert_eq!(jbod.lock().counters().reads, reads);

        let stats = volume.cache_stats();
        assert_eq!(stats.queries, 4);
        assert_eq!(stats.hits, 2);
        assert_eq!(volume.cache_hit_rate(), Some(0.5));
    }

    #[tokio::test]
    async fn test_cache_hit_then_miss_reads_right_block() {
        let (volume, _jbod) = mounted().await;
        let data = pattern(768, 11);
        volume.write(0, &data).await.unwrap();

        volume.cache_enable(16).unwrap();
        // Cache only the middle block
        volume.read_to_vec(256, 256).await.unwrap();

        assert_eq!(volume.read_to_vec(0, 768).await.unwrap(), data);
        assert_eq!(volume.cache_stats().hits, 1);
    }

    #[tokio::test]
    async fn test_write_refreshes_cached_block() {
        let (volume, _jbod) = mounted().await;
        volume.cache_enable(4).unwrap();

        assert_eq!(volume.read_to_vec(0, 10).await.unwrap(), vec![0u8; 10]);
        volume.write(5, &[0xee; 3]).await.unwrap();

        let stats = volume.cache_stats();
        assert_eq!(stats.updates, 1);
        assert_eq!(stats.queries, 1);

        let out = volume.read_to_vec(0, 10).await.unwrap();
        assert_eq!(out, vec![0, 0, 0, 0, 0, 0xee, 0xee, 0xee, 0, 0]);
        assert_eq!(volume.cache_stats().hits, 1);
    }

    #[tokio::test]
    async fn test_write_does_not_fill_cache() {
        let (volume, _jbod) = mounted().await;
        volume.cache_enable(4).unwrap();

        volume.write(0, &[1; 10]).await.unwrap();
        assert_eq!(volume.cache_stats().inserts, 0);
    }

    #[tokio::test]
    async fn test_cache_lifecycle_errors() {
        let (volume, _jbod) = mounted().await;

        assert!(matches!(
            volume.cache_enable(1),
            Err(Error::InvalidCacheCapacity(1))
        ));
        assert!(matches!(volume.cache_disable(), Err(Error::CacheNotEnabled)));
        volume.cache_enable(2).unwrap();
        assert!(matches!(
            volume.cache_enable(2),
            Err(Error::CacheAlreadyEnabled)
        ));
        volume.cache_disable().unwrap();
        assert_eq!(volume.cache_hit_rate(), None);
    }

    #[tokio::test]
    async fn test_random_round_trips() {
        let (volume, _jbod) = mounted().await;
        volume.cache_enable(8).unwrap();
        let mut rng = StdRng::seed_from_u64(0x6a62_6f64);

        for _ in 0..64 {
            let len = rng.gen_range(1..=MAX_TRANSFER);
            let address = rng.gen_range(0..=TOTAL_CAPACITY - len as u32);
            let mut data = vec![0u8; len];
            rng.fill(&mut data[..]);

            volume.write(address, &data).await.unwrap();
            assert_eq!(volume.read_to_vec(address, len).await.unwrap(), data);
        }
    }

    #[tokio::test]
    async fn test_server_gone_is_io_failure() {
        let (volume, _jbod, server) = start();
        volume.mount().await.unwrap();

        server.abort();
        let _ = server.await;

        assert!(matches!(
            volume.read_to_vec(0, BLOCK_SIZE).await,
            Err(Error::ProtocolIo(_))
        ));
    }

    #[tokio::test]
    async fn test_use_after_disconnect() {
        let (volume, _jbod) = mounted().await;
        volume.disconnect().await;

        assert!(matches!(
            volume.read_to_vec(0, 8).await,
            Err(Error::ConnectionFailed(_))
        ));
    }
}

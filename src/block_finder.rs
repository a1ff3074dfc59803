//! Timestamp-to-block lookup with a chain-local sorted block cache.
//!
//! Finds the largest block whose timestamp does not exceed a target. Blocks
//! seen along the way accumulate in a cache sorted by both number and
//! timestamp; probes interpolate between the tightest cached neighbors, so
//! repeated lookups over the same era converge in a handful of fetches.
//! Entries are never mutated or evicted within a process lifetime.

use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::network::default_block_time_seconds;
use crate::transport::{BlockTag, EvmClient, RpcError};
use crate::types::Block;

/// Errors from timestamp-to-block resolution.
#[derive(Debug, thiserror::Error)]
pub enum BlockFinderError {
    #[error("timestamp {timestamp} precedes the genesis block timestamp {genesis_timestamp}")]
    TimestampBeforeGenesis {
        timestamp: u64,
        genesis_timestamp: u64,
    },
    #[error(transparent)]
    Rpc(#[from] RpcError),
}

/// Blocks spanned when measuring the live average block time.
const AVERAGE_BLOCK_RANGE: u64 = 120;
/// How long a measured average stays fresh.
const AVERAGE_TTL: Duration = Duration::from_secs(15 * 60);

struct BlockTimeEntry {
    average: f64,
    block_range: u64,
    fetched_at: Instant,
}

/// Process-wide cache of average block times, keyed by chain id.
///
/// Read-mostly with 15-minute refreshes. The clock is injectable so tests
/// can expire entries without sleeping.
pub struct BlockTimeCache {
    entries: DashMap<u64, BlockTimeEntry>,
    clock: Box<dyn Fn() -> Instant + Send + Sync>,
}

impl Default for BlockTimeCache {
    fn default() -> Self {
        Self::with_clock(Box::new(Instant::now))
    }
}

impl BlockTimeCache {
    pub fn with_clock(clock: Box<dyn Fn() -> Instant + Send + Sync>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    /// Average seconds per block for the client's chain.
    ///
    /// Refreshes from live blocks when stale; falls back to the per-chain
    /// seed (OP-stack chains inherit the Optimism default) when the chain is
    /// too short to measure or the refresh fails.
    pub async fn average(&self, client: &EvmClient) -> f64 {
        let chain_id = client.chain_id();
        if let Some(entry) = self.entries.get(&chain_id) {
            if (self.clock)().duration_since(entry.fetched_at) < AVERAGE_TTL {
                return entry.average;
            }
        }
        match self.measure(client).await {
            Ok(Some(average)) => {
                self.entries.insert(
                    chain_id,
                    BlockTimeEntry {
                        average,
                        block_range: AVERAGE_BLOCK_RANGE,
                        fetched_at: (self.clock)(),
                    },
                );
                average
            }
            Ok(None) => default_block_time_seconds(chain_id),
            Err(error) => {
                tracing::debug!(chain_id, error = %error, "block time refresh failed");
                default_block_time_seconds(chain_id)
            }
        }
    }

    async fn measure(&self, client: &EvmClient) -> Result<Option<f64>, RpcError> {
        let high = client.get_block(BlockTag::Latest).await?;
        if high.number < AVERAGE_BLOCK_RANGE {
            return Ok(None);
        }
        let low = client
            .get_block(BlockTag::Number(high.number - AVERAGE_BLOCK_RANGE))
            .await?;
        let delta = high.timestamp.saturating_sub(low.timestamp) as f64;
        Ok(Some(delta / AVERAGE_BLOCK_RANGE as f64))
    }

    /// Recorded measurement span for a chain, if a live measurement exists.
    pub fn block_range(&self, chain_id: u64) -> Option<u64> {
        self.entries.get(&chain_id).map(|entry| entry.block_range)
    }
}

/// The shared process-wide [`BlockTimeCache`].
pub fn global_block_times() -> &'static BlockTimeCache {
    static GLOBAL: Lazy<BlockTimeCache> = Lazy::new(BlockTimeCache::default);
    &GLOBAL
}

/// Cached timestamp-to-block resolver for one chain.
pub struct BlockFinder {
    client: EvmClient,
    block_times: Arc<BlockTimeCache>,
    blocks: Mutex<Vec<Block>>,
}

impl BlockFinder {
    pub fn new(client: EvmClient) -> Self {
        Self {
            client,
            block_times: Arc::new(BlockTimeCache::default()),
            blocks: Mutex::new(Vec::new()),
        }
    }

    /// Share a block-time cache (usually [`global_block_times`]-backed)
    /// across finders.
    pub fn with_block_times(client: EvmClient, block_times: Arc<BlockTimeCache>) -> Self {
        Self {
            client,
            block_times,
            blocks: Mutex::new(Vec::new()),
        }
    }

    /// Insert a block, keeping the cache sorted by number. Inserts are
    /// idempotent; the index is recomputed under the lock because other
    /// lookups may have inserted while a fetch was in flight.
    async fn insert(&self, block: Block) {
        let mut blocks = self.blocks.lock().await;
        match blocks.binary_search_by_key(&block.number, |cached| cached.number) {
            Ok(_) => {}
            Err(index) => blocks.insert(index, block),
        }
    }

    async fn fetch(&self, number: u64) -> Result<Block, BlockFinderError> {
        let block = self.client.get_block(BlockTag::Number(number)).await?;
        self.insert(block).await;
        Ok(block)
    }

    /// Largest block with `timestamp ≤ target`.
    pub async fn get_block_for_timestamp(&self, target: u64) -> Result<Block, BlockFinderError> {
        // Make sure the cache spans the target from above.
        let highest = { self.blocks.lock().await.last().copied() };
        let spans_above = matches!(&highest, Some(block) if target < block.timestamp);
        if !spans_above {
            let latest = self.client.get_block(BlockTag::Latest).await?;
            self.insert(latest).await;
            if target >= latest.timestamp {
                return Ok(latest);
            }
        }

        // Extend downward until some cached block sits at or below the
        // target, stepping by the estimated block count per time delta.
        loop {
            let lowest = {
                let blocks = self.blocks.lock().await;
                blocks.first().copied()
            };
            let lowest = lowest.ok_or_else(|| {
                BlockFinderError::Rpc(RpcError::Logical("block cache emptied mid-search".into()))
            })?;
            if lowest.timestamp <= target {
                break;
            }
            if lowest.number == 0 {
                return Err(BlockFinderError::TimestampBeforeGenesis {
                    timestamp: target,
                    genesis_timestamp: lowest.timestamp,
                });
            }
            let average = self.block_times.average(&self.client).await.max(0.001);
            let gap_seconds = (lowest.timestamp - target) as f64;
            let step = (gap_seconds / average).ceil().max(1.0) as u64;
            let probe = lowest.number.saturating_sub(step);
            self.fetch(probe).await?;
        }

        // Interpolation search between the tightest cached neighbors.
        loop {
            let (start, end) = {
                let blocks = self.blocks.lock().await;
                let partition = blocks.partition_point(|block| block.timestamp <= target);
                let start = blocks[partition - 1];
                match blocks.get(partition) {
                    Some(end) => (start, *end),
                    // Nothing above the target anymore: start is the answer.
                    None => return Ok(start),
                }
            };
            if start.number + 1 >= end.number {
                return Ok(start);
            }
            let span_blocks = (end.number - start.number) as f64;
            let span_seconds = (end.timestamp - start.timestamp).max(1) as f64;
            let offset = (target - start.timestamp) as f64;
            let estimate = start.number + ((offset / span_seconds) * span_blocks).round() as u64;
            let probe = estimate.clamp(start.number + 1, end.number - 1);
            let block = self.fetch(probe).await?;
            if block.timestamp == target {
                return Ok(block);
            }
        }
    }
}

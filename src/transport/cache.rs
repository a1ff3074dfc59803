//! Result cache keyed by `(namespace, host, chain, method, params)`.
//!
//! Whether a result is cacheable depends on how far behind head the queried
//! block sits: deep history never changes (cache forever), the recent past
//! may still reorg (cache briefly), and the head itself is live (never
//! cache). Methods whose block is only known from the response decide after
//! the send. A failed upstream call never writes the cache.

use async_trait::async_trait;
use dashmap::DashMap;
use rand::Rng;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use url::Url;

use super::{RpcError, Transport};
use crate::network::ChainFamily;
use crate::types::numeric_block_tag;

/// How a method's result may be cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheType {
    /// Never cached.
    None,
    /// Cached with a jittered finite TTL.
    WithTtl,
    /// Cached without expiry (until evicted).
    NoTtl,
    /// The block is only known from the response; decide after the send.
    DecidePostSend,
}

/// Backing store for cached results.
///
/// Implementations are last-writer-wins with per-key atomic set. The store
/// is the only cross-process shared state in the stack; a Redis-compatible
/// implementation satisfies this trait the same way the in-memory one does.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;
    async fn set(&self, key: &str, value: String, ttl: Option<Duration>);
}

/// In-memory [`CacheStore`] with lazy expiry.
#[derive(Default)]
pub struct MemoryCacheStore {
    entries: DashMap<String, (String, Option<Instant>)>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries, for tests and diagnostics.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Expiry recorded for a key, if the entry exists. `None` inside the
    /// `Some` means the entry is permanent.
    pub fn expiry_of(&self, key: &str) -> Option<Option<Instant>> {
        self.entries.get(key).map(|entry| entry.value().1)
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Option<String> {
        let expired = match self.entries.get(key) {
            Some(entry) => match entry.value().1 {
                Some(expiry) => Instant::now() >= expiry,
                None => false,
            },
            None => return None,
        };
        if expired {
            self.entries.remove(key);
            return None;
        }
        self.entries.get(key).map(|entry| entry.value().0.clone())
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) {
        let expiry = ttl.map(|ttl| Instant::now() + ttl);
        self.entries.insert(key.to_string(), (value, expiry));
    }
}

/// Tuning for the distance tiers and TTL jitter.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub namespace: String,
    pub no_ttl_block_distance: u64,
    pub standard_ttl_block_distance: u64,
    pub base_ttl: Duration,
    /// Fractional jitter `m`: finite TTLs become `base · (1 + U[−m, +m])`.
    pub ttl_modifier: f64,
}

impl CacheSettings {
    pub fn from_config(config: &crate::config::RpcStackConfig) -> Self {
        Self {
            namespace: config.cache_namespace.clone(),
            no_ttl_block_distance: config.no_ttl_block_distance,
            standard_ttl_block_distance: config.standard_ttl_block_distance,
            base_ttl: Duration::from_secs(config.base_ttl_seconds),
            ttl_modifier: config.ttl_modifier,
        }
    }
}

/// Refresh interval for the tracked head block number.
const HEAD_REFRESH: Duration = Duration::from_secs(15);
/// Refresh interval for the Solana finalized/confirmed slot marks.
const SLOT_MARKS_TTL: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone, Copy)]
struct SlotMarks {
    finalized: u64,
    confirmed: u64,
    fetched_at: Instant,
}

/// Caching decorator over a rate-limited upstream.
pub struct CachedTransport<T> {
    inner: T,
    store: Arc<dyn CacheStore>,
    settings: CacheSettings,
    head: Mutex<Option<(Instant, u64)>>,
    slot_marks: Mutex<Option<SlotMarks>>,
}

impl<T: Transport> CachedTransport<T> {
    pub fn new(inner: T, store: Arc<dyn CacheStore>, settings: CacheSettings) -> Self {
        Self {
            inner,
            store,
            settings,
            head: Mutex::new(None),
            slot_marks: Mutex::new(None),
        }
    }

    fn cache_key(&self, method: &str, params: &Value) -> String {
        format!(
            "{},{},{}:{},{}",
            self.settings.namespace,
            self.host(),
            self.chain_id(),
            method,
            params
        )
    }

    /// Head block number, refreshed at most every 15 seconds.
    async fn head(&self) -> Result<u64, RpcError> {
        let mut guard = self.head.lock().await;
        if let Some((fetched_at, head)) = *guard {
            if fetched_at.elapsed() < HEAD_REFRESH {
                return Ok(head);
            }
        }
        let result = self
            .inner
            .send("eth_blockNumber", serde_json::json!([]))
            .await?;
        let head = result
            .as_str()
            .ok_or_else(|| RpcError::Logical("eth_blockNumber returned a non-string".into()))
            .and_then(|tag| Ok(crate::types::parse_quantity(tag)?))?;
        *guard = Some((Instant::now(), head));
        Ok(head)
    }

    async fn slot_marks(&self) -> Result<SlotMarks, RpcError> {
        let mut guard = self.slot_marks.lock().await;
        if let Some(marks) = *guard {
            if marks.fetched_at.elapsed() < SLOT_MARKS_TTL {
                return Ok(marks);
            }
        }
        let finalized = self
            .inner
            .send("getSlot", serde_json::json!([{"commitment": "finalized"}]))
            .await?
            .as_u64()
            .ok_or_else(|| RpcError::Logical("getSlot returned a non-number".into()))?;
        let confirmed = self
            .inner
            .send("getSlot", serde_json::json!([{"commitment": "confirmed"}]))
            .await?
            .as_u64()
            .ok_or_else(|| RpcError::Logical("getSlot returned a non-number".into()))?;
        let marks = SlotMarks {
            finalized,
            confirmed,
            fetched_at: Instant::now(),
        };
        *guard = Some(marks);
        Ok(marks)
    }

    /// Tiered decision from the distance of `block` behind head.
    async fn decide_by_distance(&self, block: u64) -> Result<CacheType, RpcError> {
        let head = self.head().await?;
        let distance = head.saturating_sub(block);
        if distance > self.settings.no_ttl_block_distance {
            Ok(CacheType::NoTtl)
        } else if distance > self.settings.standard_ttl_block_distance {
            Ok(CacheType::WithTtl)
        } else {
            Ok(CacheType::None)
        }
    }

    async fn cache_type(&self, method: &str, params: &Value) -> Result<CacheType, RpcError> {
        match (self.family(), method) {
            (ChainFamily::Evm, "eth_getLogs") => {
                let filter = params.get(0).unwrap_or(&Value::Null);
                let from = filter.get("fromBlock").and_then(numeric_block_tag);
                let to = filter.get("toBlock").and_then(numeric_block_tag);
                match (from, to) {
                    (Some(from), Some(to)) => {
                        if to < from {
                            return Err(RpcError::Validation(format!(
                                "eth_getLogs range is inverted: toBlock {to} < fromBlock {from}"
                            )));
                        }
                        self.decide_by_distance(to).await
                    }
                    _ => Ok(CacheType::None),
                }
            }
            (ChainFamily::Evm, "eth_call") => match params.get(1).and_then(numeric_block_tag) {
                Some(block) => self.decide_by_distance(block).await,
                None => Ok(CacheType::None),
            },
            (ChainFamily::Evm, "eth_getBlockByNumber") => {
                match params.get(0).and_then(numeric_block_tag) {
                    Some(block) => self.decide_by_distance(block).await,
                    None => Ok(CacheType::None),
                }
            }
            // Receipts carry their block only in the response. The branch
            // exists on the SVM path only; EVM receipts are never cached.
            (ChainFamily::Svm, "eth_getTransactionReceipt") => Ok(CacheType::DecidePostSend),
            (ChainFamily::Svm, "getBlockTime") => {
                let slot = match params.get(0).and_then(Value::as_u64) {
                    Some(slot) => slot,
                    None => return Ok(CacheType::None),
                };
                let marks = self.slot_marks().await?;
                if slot <= marks.finalized {
                    Ok(CacheType::NoTtl)
                } else if slot <= marks.confirmed {
                    Ok(CacheType::WithTtl)
                } else {
                    Ok(CacheType::None)
                }
            }
            _ => Ok(CacheType::None),
        }
    }

    fn jittered_ttl(&self) -> Duration {
        let modifier = self.settings.ttl_modifier.abs();
        let factor = if modifier > 0.0 {
            1.0 + rand::rng().random_range(-modifier..=modifier)
        } else {
            1.0
        };
        self.settings.base_ttl.mul_f64(factor.max(0.0))
    }

    async fn store_result(&self, key: &str, result: &Value, cache_type: CacheType) {
        let ttl = match cache_type {
            CacheType::WithTtl => Some(self.jittered_ttl()),
            CacheType::NoTtl => None,
            CacheType::None | CacheType::DecidePostSend => return,
        };
        self.store.set(key, result.to_string(), ttl).await;
    }

    /// Whether a Solana transaction is finalized, checked via
    /// `getSignatureStatuses` with history search.
    async fn is_finalized_transaction(&self, signature: &str) -> Result<bool, RpcError> {
        let statuses = self
            .inner
            .send(
                "getSignatureStatuses",
                serde_json::json!([[signature], {"searchTransactionHistory": true}]),
            )
            .await?;
        let finalized = statuses
            .get("value")
            .and_then(Value::as_array)
            .and_then(|values| values.first())
            .and_then(|status| status.get("confirmationStatus"))
            .and_then(Value::as_str)
            .map(|status| status == "finalized")
            .unwrap_or(false);
        Ok(finalized)
    }

    async fn send_svm_transaction(&self, params: Value) -> Result<Value, RpcError> {
        let key = self.cache_key("getTransaction", &params);
        if let Some(hit) = self.store.get(&key).await {
            if let Ok(value) = serde_json::from_str::<Value>(&hit) {
                return Ok(value);
            }
        }
        let signature = params
            .get(0)
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| {
                RpcError::Validation("getTransaction requires a signature string".into())
            })?;
        let result = self.inner.send("getTransaction", params).await?;
        if !result.is_null() && self.is_finalized_transaction(&signature).await? {
            self.store.set(&key, result.to_string(), None).await;
        }
        Ok(result)
    }
}

#[async_trait]
impl<T: Transport> Transport for CachedTransport<T> {
    async fn send(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        // Finality-gated: cache only once the chain cannot change the answer.
        if self.family() == ChainFamily::Svm && method == "getTransaction" {
            return self.send_svm_transaction(params).await;
        }

        let cache_type = self.cache_type(method, &params).await?;
        if cache_type == CacheType::None {
            return self.inner.send(method, params).await;
        }

        let key = self.cache_key(method, &params);
        if let Some(hit) = self.store.get(&key).await {
            match serde_json::from_str::<Value>(&hit) {
                Ok(value) => return Ok(value),
                // Unparsable entries are treated as misses.
                Err(err) => {
                    tracing::debug!(key, error = %err, "discarding unparsable cache entry")
                }
            }
        }

        let result = self.inner.send(method, params).await?;

        let final_type = match cache_type {
            CacheType::DecidePostSend => {
                match result.get("blockNumber").and_then(numeric_block_tag) {
                    Some(block) => self.decide_by_distance(block).await?,
                    None => CacheType::None,
                }
            }
            other => other,
        };
        self.store_result(&key, &result, final_type).await;
        Ok(result)
    }

    fn url(&self) -> &Url {
        self.inner.url()
    }

    fn chain_id(&self) -> u64 {
        self.inner.chain_id()
    }

    fn family(&self) -> ChainFamily {
        self.inner.family()
    }
}

//! Quorum fan-out over an ordered set of provider stacks.
//!
//! A logical `send` splits the providers into a required prefix of size `Q`
//! (the per-method quorum) and a fallback tail. Each required slot runs one
//! provider at a time, popping a fresh fallback on failure, so no provider
//! participates in more than one attempt per call. If the required results
//! disagree, every remaining fallback is consulted and the most common
//! result wins — provided at least `Q` providers back it.

use futures_util::future::join_all;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;
use url::Url;

use super::{QuorumError, RpcError, Transport};
use crate::network::ChainFamily;

/// Keys masked out per method before comparing results across providers.
///
/// Providers disagree on these legitimately (different clients, different
/// rollup metadata); they carry no consensus meaning.
const BLOCK_IGNORED_KEYS: [&str; 5] = [
    "miner",
    "l1BatchNumber",
    "l1BatchTimestamp",
    "size",
    "totalDifficulty",
];
const LOG_IGNORED_KEYS: [&str; 4] = [
    "blockTimestamp",
    "transactionLogIndex",
    "l1BatchNumber",
    "logType",
];

/// Quorum-gated transport over N provider stacks in a fixed order.
pub struct QuorumTransport {
    providers: Vec<Arc<dyn Transport>>,
    node_quorum_threshold: usize,
}

impl QuorumTransport {
    /// Build the quorum layer. The threshold must fit the provider set.
    pub fn new(
        providers: Vec<Arc<dyn Transport>>,
        node_quorum_threshold: usize,
    ) -> Result<Self, RpcError> {
        if providers.is_empty() {
            return Err(RpcError::Validation("no providers configured".into()));
        }
        if node_quorum_threshold < 1 || node_quorum_threshold > providers.len() {
            return Err(RpcError::Validation(format!(
                "quorum threshold {} does not fit {} providers",
                node_quorum_threshold,
                providers.len()
            )));
        }
        Ok(Self {
            providers,
            node_quorum_threshold,
        })
    }

    /// Per-method quorum. Head-tracking reads (`latest`/`pending` tags) are
    /// expected to differ across providers and run against a single one.
    fn quorum(&self, method: &str, params: &Value) -> usize {
        let threshold = self.node_quorum_threshold;
        match method {
            "eth_getLogs" => threshold,
            "eth_getBlockByNumber" => {
                match params.get(0).and_then(Value::as_str) {
                    Some("latest") | Some("pending") => 1,
                    _ => threshold,
                }
            }
            "eth_call" => match params.get(1).and_then(Value::as_str) {
                Some("latest") => 1,
                _ => threshold,
            },
            "getBlockTime" => threshold,
            _ => 1,
        }
    }
}

/// Project a result down to the fields that carry consensus meaning.
fn semantic_key(method: &str, result: &Value) -> Value {
    let mut normalized = result.clone();
    match method {
        "eth_getBlockByNumber" => {
            if let Value::Object(fields) = &mut normalized {
                for key in BLOCK_IGNORED_KEYS {
                    fields.remove(key);
                }
            }
        }
        "eth_getLogs" => {
            if let Value::Array(entries) = &mut normalized {
                for entry in entries {
                    if let Value::Object(fields) = entry {
                        for key in LOG_IGNORED_KEYS {
                            fields.remove(key);
                        }
                    }
                }
            }
        }
        _ => {}
    }
    normalized
}

#[derive(Default)]
struct FanOutState {
    successes: Vec<(String, Value)>,
    errors: Vec<(String, String)>,
}

/// Drive one required slot: try the given provider, then keep popping
/// fallbacks until a success or the queue runs dry.
async fn run_slot(
    first: Arc<dyn Transport>,
    fallbacks: Arc<Mutex<VecDeque<Arc<dyn Transport>>>>,
    state: Arc<Mutex<FanOutState>>,
    method: &str,
    params: &Value,
) {
    let mut provider = first;
    loop {
        match provider.send(method, params.clone()).await {
            Ok(value) => {
                state.lock().await.successes.push((provider.host(), value));
                return;
            }
            Err(error) => {
                state
                    .lock()
                    .await
                    .errors
                    .push((provider.host(), error.to_string()));
            }
        }
        provider = match fallbacks.lock().await.pop_front() {
            Some(next) => next,
            None => return,
        };
    }
}

#[async_trait::async_trait]
impl Transport for QuorumTransport {
    async fn send(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let quorum = self.quorum(method, &params);
        let fallbacks: Arc<Mutex<VecDeque<Arc<dyn Transport>>>> = Arc::new(Mutex::new(
            self.providers.iter().skip(quorum).cloned().collect(),
        ));
        let state = Arc::new(Mutex::new(FanOutState::default()));

        let slots = self.providers.iter().take(quorum).cloned().map(|provider| {
            let fallbacks = Arc::clone(&fallbacks);
            let state = Arc::clone(&state);
            let method = method.to_string();
            let params = params.clone();
            async move { run_slot(provider, fallbacks, state, &method, &params).await }
        });
        join_all(slots).await;

        {
            let snapshot = state.lock().await;
            if snapshot.successes.len() < quorum {
                return Err(QuorumError {
                    method: method.to_string(),
                    quorum,
                    quorum_providers: Vec::new(),
                    mismatched_providers: snapshot
                        .successes
                        .iter()
                        .map(|(host, _)| host.clone())
                        .collect(),
                    erroring_providers: snapshot.errors.clone(),
                }
                .into());
            }
            let mut keys = snapshot
                .successes
                .iter()
                .map(|(_, value)| semantic_key(method, value));
            let first_key = keys.next().expect("at least quorum successes");
            if keys.all(|key| key == first_key) {
                let raw_identical = snapshot
                    .successes
                    .iter()
                    .all(|(_, value)| *value == snapshot.successes[0].1);
                if !snapshot.errors.is_empty() || !raw_identical {
                    tracing::warn!(
                        method,
                        quorum,
                        agreeing = ?snapshot.successes.iter().map(|(host, _)| host).collect::<Vec<_>>(),
                        erroring = ?snapshot.errors,
                        "quorum reached with masked differences or provider errors"
                    );
                }
                let (_, value) = &snapshot.successes[0];
                return Ok(value.clone());
            }
        }

        // Required set disagrees: consult every untouched fallback, then
        // let the most common result win.
        let remaining: Vec<Arc<dyn Transport>> = fallbacks.lock().await.drain(..).collect();
        let sweeps = remaining.into_iter().map(|provider| {
            let state = Arc::clone(&state);
            let method = method.to_string();
            let params = params.clone();
            async move {
                match provider.send(&method, params).await {
                    Ok(value) => state.lock().await.successes.push((provider.host(), value)),
                    Err(error) => state
                        .lock()
                        .await
                        .errors
                        .push((provider.host(), error.to_string())),
                }
            }
        });
        join_all(sweeps).await;

        let snapshot = state.lock().await;
        let mut buckets: HashMap<String, Vec<usize>> = HashMap::new();
        for (index, (_, value)) in snapshot.successes.iter().enumerate() {
            let key = semantic_key(method, value).to_string();
            buckets.entry(key).or_default().push(index);
        }
        let best = buckets
            .values()
            .max_by_key(|indices| indices.len())
            .cloned()
            .unwrap_or_default();

        let agreeing: Vec<String> = best
            .iter()
            .map(|&index| snapshot.successes[index].0.clone())
            .collect();
        let mismatched: Vec<String> = snapshot
            .successes
            .iter()
            .enumerate()
            .filter(|(index, _)| !best.contains(index))
            .map(|(_, (host, _))| host.clone())
            .collect();

        tracing::warn!(
            method,
            quorum,
            agreeing = ?agreeing,
            mismatched = ?mismatched,
            erroring = ?snapshot.errors,
            "providers disagreed"
        );

        if best.len() >= quorum {
            let (_, value) = &snapshot.successes[best[0]];
            return Ok(value.clone());
        }
        Err(QuorumError {
            method: method.to_string(),
            quorum,
            quorum_providers: agreeing,
            mismatched_providers: mismatched,
            erroring_providers: snapshot.errors.clone(),
        }
        .into())
    }

    fn url(&self) -> &Url {
        self.providers[0].url()
    }

    fn chain_id(&self) -> u64 {
        self.providers[0].chain_id()
    }

    fn family(&self) -> ChainFamily {
        self.providers[0].family()
    }
}

//! Assembly of the full transport stack from configuration.
//!
//! One upstream URL becomes `rate-limit → cache → retry`; the quorum layer
//! fans out over every upstream of a chain in the configured order. Callers
//! hold the resulting [`EvmClient`] and never see the individual layers.

use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::config::RpcStackConfig;
use crate::network::ChainFamily;
use crate::transport::cache::{CacheSettings, CacheStore, CachedTransport, MemoryCacheStore};
use crate::transport::http::HttpTransport;
use crate::transport::quorum::QuorumTransport;
use crate::transport::rate_limit::RateLimitedTransport;
use crate::transport::retry::RetryTransport;
use crate::transport::{EvmClient, RpcError, Transport};

/// Wrap one upstream connection in the per-provider layers.
pub fn layer_transport<T: Transport>(
    inner: T,
    config: &RpcStackConfig,
    store: Arc<dyn CacheStore>,
) -> RetryTransport<CachedTransport<RateLimitedTransport<T>>> {
    let rate_limited =
        RateLimitedTransport::new(inner, config.max_concurrency, config.pct_rpc_calls_logged);
    let cached = CachedTransport::new(rate_limited, store, CacheSettings::from_config(config));
    RetryTransport::new(
        cached,
        config.retries,
        Duration::from_secs_f64(config.retry_delay_seconds),
    )
}

/// Build the quorum stack for one chain over its upstream URLs, in order.
///
/// The cache store is shared across upstreams; entries stay distinct
/// because keys carry the upstream host.
pub fn build_provider_stack(
    urls: Vec<Url>,
    chain_id: u64,
    family: ChainFamily,
    config: &RpcStackConfig,
    store: Option<Arc<dyn CacheStore>>,
) -> Result<QuorumTransport, RpcError> {
    let store = store.unwrap_or_else(|| Arc::new(MemoryCacheStore::new()) as Arc<dyn CacheStore>);
    let http = reqwest::Client::new();
    let providers: Vec<Arc<dyn Transport>> = urls
        .into_iter()
        .map(|url| {
            let upstream = HttpTransport::with_client(http.clone(), url, chain_id, family);
            Arc::new(layer_transport(upstream, config, Arc::clone(&store))) as Arc<dyn Transport>
        })
        .collect();
    QuorumTransport::new(providers, config.node_quorum_threshold)
}

/// Build the typed client for one chain in one call.
pub fn build_client(
    urls: Vec<Url>,
    chain_id: u64,
    family: ChainFamily,
    config: &RpcStackConfig,
) -> Result<EvmClient, RpcError> {
    let quorum = build_provider_stack(urls, chain_id, family, config, None)?;
    Ok(EvmClient::new(Arc::new(quorum)))
}

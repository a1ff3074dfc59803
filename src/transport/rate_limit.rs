//! Bounded-concurrency layer with sampled call timing.
//!
//! Wraps one upstream and holds a work queue of capacity `max_concurrency`:
//! the (N+1)-th request suspends on the semaphore until an in-flight one
//! completes. Submission order is preserved (the semaphore is fair);
//! completion order is not.

use rand::Rng;
use serde_json::Value;
use std::time::Instant;
use tokio::sync::Semaphore;
use url::Url;

use super::{RpcError, Transport};
use crate::network::ChainFamily;

/// Rate-limited decorator over a single upstream connection.
pub struct RateLimitedTransport<T> {
    inner: T,
    permits: Semaphore,
    pct_rpc_calls_logged: f64,
}

impl<T: Transport> RateLimitedTransport<T> {
    /// Bound the wrapped transport to `max_concurrency` in-flight requests.
    ///
    /// `pct_rpc_calls_logged` (0 to 100) samples that share of calls for a
    /// timed debug record.
    pub fn new(inner: T, max_concurrency: usize, pct_rpc_calls_logged: f64) -> Self {
        Self {
            inner,
            permits: Semaphore::new(max_concurrency.max(1)),
            pct_rpc_calls_logged: pct_rpc_calls_logged.clamp(0.0, 100.0),
        }
    }

    fn should_sample(&self) -> bool {
        self.pct_rpc_calls_logged > 0.0
            && rand::rng().random_range(0.0..100.0) < self.pct_rpc_calls_logged
    }
}

#[async_trait::async_trait]
impl<T: Transport> Transport for RateLimitedTransport<T> {
    async fn send(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| RpcError::Logical("rate limiter closed".into()))?;
        if self.should_sample() {
            let started = Instant::now();
            let result = self.inner.send(method, params.clone()).await;
            let elapsed = started.elapsed().as_secs_f64();
            tracing::debug!(
                provider = %self.host(),
                method,
                params = %params,
                chain_id = self.chain_id(),
                success = result.is_ok(),
                elapsed_seconds = elapsed,
                "rpc call timed"
            );
            result
        } else {
            self.inner.send(method, params).await
        }
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

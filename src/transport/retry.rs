//! Bounded retry layer with deterministic-error fail-fast.
//!
//! Transient failures (network, reserved-code JSON-RPC errors, transient
//! nulls) are retried with a fixed delay; deterministic failures are
//! surfaced immediately because repeating them cannot change the outcome.
//! The SVM dialect adds exponential backoff when the upstream answers 429.

use rand::Rng;
use serde_json::Value;
use std::time::Duration;
use url::Url;

use super::{RpcError, Transport};
use crate::network::ChainFamily;

/// Retrying decorator over a cached upstream.
pub struct RetryTransport<T> {
    inner: T,
    retries: u32,
    retry_delay: Duration,
}

impl<T: Transport> RetryTransport<T> {
    pub fn new(inner: T, retries: u32, retry_delay: Duration) -> Self {
        Self {
            inner,
            retries,
            retry_delay,
        }
    }

    fn delay_for(&self, attempt: u32, error: &RpcError) -> Duration {
        if self.family() == ChainFamily::Svm && error.http_status() == Some(429) {
            let backoff = self.retry_delay.mul_f64(2f64.powi(attempt as i32));
            let jitter = Duration::from_secs_f64(rand::rng().random_range(1.0..=3.0));
            backoff + jitter
        } else {
            self.retry_delay
        }
    }
}

/// Whether an error is deterministic for this method, making retries useless.
fn fail_fast(family: ChainFamily, method: &str, error: &RpcError) -> bool {
    match error {
        // Caller mistakes and aggregate failures are never retried locally.
        RpcError::Validation(_)
        | RpcError::Logical(_)
        | RpcError::Codec(_)
        | RpcError::Quorum(_) => true,
        RpcError::Protocol { error, .. } => match family {
            ChainFamily::Evm => {
                if error.is_reserved_code() {
                    return false;
                }
                let message = error.message.to_ascii_lowercase();
                match method {
                    "eth_call" | "eth_estimateGas" => message.contains("revert"),
                    "eth_sendRawTransaction" => {
                        message.contains("nonce") || message.contains("underpriced")
                    }
                    _ => false,
                }
            }
            ChainFamily::Svm => match method {
                "getBlock" | "getBlockTime" => {
                    let message = error.message.to_ascii_lowercase();
                    matches!(error.code, -32007 | -32009)
                        || message.contains("slot skipped")
                        || message.contains("long-term storage slot skipped")
                }
                _ => false,
            },
        },
        RpcError::Transport { .. } | RpcError::NullResult { .. } => false,
    }
}

/// Whether a `null` result is legal for the method rather than a transient
/// upstream gap.
fn null_is_legal(method: &str) -> bool {
    method == "eth_getTransactionReceipt"
}

#[async_trait::async_trait]
impl<T: Transport> Transport for RetryTransport<T> {
    async fn send(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let mut last_error: Option<RpcError> = None;
        for attempt in 0..=self.retries {
            if attempt > 0 {
                let delay = match &last_error {
                    Some(error) => self.delay_for(attempt - 1, error),
                    None => self.retry_delay,
                };
                tokio::time::sleep(delay).await;
            }
            match self.inner.send(method, params.clone()).await {
                Ok(value) if value.is_null() && !null_is_legal(method) => {
                    last_error = Some(RpcError::NullResult {
                        method: method.to_string(),
                    });
                }
                Ok(value) => return Ok(value),
                Err(error) => {
                    if fail_fast(self.family(), method, &error) {
                        return Err(error);
                    }
                    tracing::debug!(
                        provider = %self.host(),
                        method,
                        attempt,
                        error = %error,
                        "retrying rpc call"
                    );
                    last_error = Some(error);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| RpcError::Logical("retry loop without attempts".into())))
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

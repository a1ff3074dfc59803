//! Layered JSON-RPC transport stack.
//!
//! Every layer implements the one-method [`Transport`] trait and wraps the
//! previous one, composing as decorators rather than an inheritance chain:
//!
//! - [`http::HttpTransport`] — the upstream HTTPS connection,
//! - [`rate_limit::RateLimitedTransport`] — bounded in-flight requests,
//! - [`cache::CachedTransport`] — TTL-tiered result cache,
//! - [`retry::RetryTransport`] — bounded retries with fail-fast,
//! - [`quorum::QuorumTransport`] — fan-out over N stacks with agreement.
//!
//! Callers that want typed results rather than raw JSON use [`EvmClient`],
//! which sits on top of whichever layer it is given.

pub mod cache;
pub mod http;
pub mod quorum;
pub mod rate_limit;
pub mod retry;

use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use url::Url;

use crate::network::ChainFamily;
use crate::types::{Block, CodecError, SortableLog, format_quantity, log_from_json, parse_quantity};

/// JSON-RPC 2.0 error body.
///
/// Codes in `[-32768, -32100]` are reserved by the JSON-RPC spec and never
/// carry application meaning; the retry classifier treats them as transient.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct JsonRpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Lower bound of the JSON-RPC reserved error code range.
pub const RESERVED_CODE_MIN: i64 = -32768;
/// Upper bound of the JSON-RPC reserved error code range.
pub const RESERVED_CODE_MAX: i64 = -32100;

impl JsonRpcErrorObject {
    /// Whether the code falls inside the JSON-RPC reserved range.
    pub fn is_reserved_code(&self) -> bool {
        (RESERVED_CODE_MIN..=RESERVED_CODE_MAX).contains(&self.code)
    }
}

/// Aggregated failure of a quorum call: not enough providers agreed.
///
/// Carries the full per-provider outcome set for diagnosis.
#[derive(Debug, Clone, thiserror::Error)]
#[error(
    "Not enough providers agreed on {method}: quorum {quorum}, agreeing {}, mismatched {}, erroring {}",
    .quorum_providers.len(),
    .mismatched_providers.len(),
    .erroring_providers.len()
)]
pub struct QuorumError {
    pub method: String,
    pub quorum: usize,
    /// Providers that returned the best (most common) result.
    pub quorum_providers: Vec<String>,
    /// Providers that returned some other result.
    pub mismatched_providers: Vec<String>,
    /// Providers that errored, with the rendered error.
    pub erroring_providers: Vec<(String, String)>,
}

/// Error taxonomy of the transport stack.
///
/// `Transport` and `Protocol` are retryable until the fail-fast classifier
/// says otherwise; `Validation` and `Logical` are caller mistakes and always
/// fatal; `Quorum` aggregates a whole fan-out.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RpcError {
    /// Network I/O or non-2xx HTTP failure.
    #[error("transport failure against {host}: {message}")]
    Transport {
        host: String,
        message: String,
        /// HTTP status, when one was received.
        status: Option<u16>,
    },
    /// A well-formed JSON-RPC error object from the upstream.
    #[error("JSON-RPC error {} from {host}: {}", .error.code, .error.message)]
    Protocol {
        host: String,
        error: JsonRpcErrorObject,
    },
    /// A `null` result where the method contract requires a value.
    #[error("null result for {method}")]
    NullResult { method: String },
    /// The caller handed the stack something unusable.
    #[error("validation failed: {0}")]
    Validation(String),
    /// Quorum not met across the provider set.
    #[error(transparent)]
    Quorum(#[from] QuorumError),
    /// The API was used incorrectly or an upstream answer is impossible.
    #[error("logical error: {0}")]
    Logical(String),
    /// Decode failure at the JSON boundary.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl RpcError {
    /// HTTP status of the underlying transport failure, if any.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            RpcError::Transport { status, .. } => *status,
            _ => None,
        }
    }
}

/// A JSON-RPC connection: one operation, `send(method, params) → result`.
///
/// The identity accessors let decorators build cache keys and log records
/// without threading extra context through every call.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform one JSON-RPC call.
    async fn send(&self, method: &str, params: Value) -> Result<Value, RpcError>;

    /// Endpoint URL of the upstream this stack bottoms out in.
    fn url(&self) -> &Url;

    /// Chain this transport serves.
    fn chain_id(&self) -> u64;

    /// Chain family, deciding method dialect (EVM vs SVM).
    fn family(&self) -> ChainFamily;

    /// Lowercase hostname of [`Transport::url`], used in cache keys and logs.
    fn host(&self) -> String {
        self.url()
            .host_str()
            .unwrap_or("unknown")
            .to_ascii_lowercase()
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        (**self).send(method, params).await
    }

    fn url(&self) -> &Url {
        (**self).url()
    }

    fn chain_id(&self) -> u64 {
        (**self).chain_id()
    }

    fn family(&self) -> ChainFamily {
        (**self).family()
    }
}

/// Block tag for methods that accept one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTag {
    Latest,
    Pending,
    Number(u64),
}

impl BlockTag {
    /// The JSON-RPC encoding of the tag.
    pub fn to_value(self) -> Value {
        match self {
            BlockTag::Latest => json!("latest"),
            BlockTag::Pending => json!("pending"),
            BlockTag::Number(number) => json!(format_quantity(number)),
        }
    }
}

/// Typed convenience client over any [`Transport`] layer.
///
/// The block finder, spoke utilities and CCTP pipeline all consume this
/// rather than raw `send` calls.
#[derive(Clone)]
pub struct EvmClient {
    transport: Arc<dyn Transport>,
}

impl EvmClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// The underlying transport, for callers that need raw access.
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn chain_id(&self) -> u64 {
        self.transport.chain_id()
    }

    /// Current head block number.
    pub async fn block_number(&self) -> Result<u64, RpcError> {
        let result = self.transport.send("eth_blockNumber", json!([])).await?;
        let tag = result
            .as_str()
            .ok_or_else(|| RpcError::Logical("eth_blockNumber returned a non-string".into()))?;
        Ok(parse_quantity(tag)?)
    }

    /// Fetch a block header (without transaction bodies).
    pub async fn get_block(&self, tag: BlockTag) -> Result<Block, RpcError> {
        let result = self
            .transport
            .send("eth_getBlockByNumber", json!([tag.to_value(), false]))
            .await?;
        let number = result
            .get("number")
            .and_then(Value::as_str)
            .ok_or_else(|| RpcError::Logical("block without a number field".into()))?;
        let timestamp = result
            .get("timestamp")
            .and_then(Value::as_str)
            .ok_or_else(|| RpcError::Logical("block without a timestamp field".into()))?;
        Ok(Block {
            number: parse_quantity(number)?,
            timestamp: parse_quantity(timestamp)?,
        })
    }

    /// Run `eth_getLogs` for a prepared filter object.
    pub async fn get_logs(&self, filter: Value) -> Result<Vec<SortableLog>, RpcError> {
        let result = self.transport.send("eth_getLogs", json!([filter])).await?;
        let entries = result
            .as_array()
            .ok_or_else(|| RpcError::Logical("eth_getLogs returned a non-array".into()))?;
        let mut logs = entries
            .iter()
            .map(log_from_json)
            .collect::<Result<Vec<_>, _>>()?;
        logs.sort_by_key(|log| log.meta);
        Ok(logs)
    }

    /// Run `eth_call` against a contract at a block tag, returning the raw
    /// return data.
    pub async fn call(
        &self,
        to: alloy_primitives::Address,
        data: &[u8],
        tag: BlockTag,
    ) -> Result<Vec<u8>, RpcError> {
        let request = json!({
            "to": format!("{to}"),
            "data": alloy_primitives::hex::encode_prefixed(data),
        });
        let result = self
            .transport
            .send("eth_call", json!([request, tag.to_value()]))
            .await?;
        let raw = result
            .as_str()
            .ok_or_else(|| RpcError::Logical("eth_call returned a non-string".into()))?;
        Ok(crate::types::parse_hex_bytes(raw)?)
    }
}

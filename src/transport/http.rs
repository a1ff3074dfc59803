//! HTTPS JSON-RPC 2.0 upstream connection.
//!
//! The bottom of every transport stack: frames requests, decodes the
//! `{result, error}` envelope, and maps HTTP failures into
//! [`RpcError::Transport`] so the retry layer can see status codes
//! (a 429 drives the SVM backoff path).

use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicU64, Ordering};
use url::Url;

use super::{JsonRpcErrorObject, RpcError, Transport};
use crate::network::ChainFamily;

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcErrorObject>,
}

/// A single JSON-RPC upstream over HTTPS.
#[derive(Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    url: Url,
    chain_id: u64,
    family: ChainFamily,
    next_id: AtomicU64,
}

impl HttpTransport {
    pub fn new(url: Url, chain_id: u64, family: ChainFamily) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
            chain_id,
            family,
            next_id: AtomicU64::new(1),
        }
    }

    /// Reuse an existing [`reqwest::Client`] (connection pool) across
    /// transports of the same process.
    pub fn with_client(client: reqwest::Client, url: Url, chain_id: u64, family: ChainFamily) -> Self {
        Self {
            client,
            url,
            chain_id,
            family,
            next_id: AtomicU64::new(1),
        }
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn send(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        let host = self.host();
        let response = self
            .client
            .post(self.url.clone())
            .json(&body)
            .send()
            .await
            .map_err(|err| RpcError::Transport {
                host: host.clone(),
                message: err.to_string(),
                status: err.status().map(|s| s.as_u16()),
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(RpcError::Transport {
                host,
                message: format!("HTTP {status}"),
                status: Some(status.as_u16()),
            });
        }
        let envelope: JsonRpcResponse =
            response.json().await.map_err(|err| RpcError::Transport {
                host: host.clone(),
                message: format!("malformed JSON-RPC envelope: {err}"),
                status: Some(status.as_u16()),
            })?;
        if let Some(error) = envelope.error {
            return Err(RpcError::Protocol { host, error });
        }
        Ok(envelope.result.unwrap_or(Value::Null))
    }

    fn url(&self) -> &Url {
        &self.url
    }

    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn family(&self) -> ChainFamily {
        self.family
    }
}

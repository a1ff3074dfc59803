//! HTTP client for the bridge quote service.
//!
//! Fee, limit, price and statistics queries against the hosted API. The
//! trait has two implementations: the HTTPS client used in production and a
//! fixture-backed mock for tests and dry runs. The CCTP pipeline shares the
//! same REST chunking discipline but talks to Circle instead; see
//! [`crate::cctp::CctpApiClient`].

use alloy_primitives::U256;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::address::UniversalAddress;

/// Default hosted API endpoint.
const DEFAULT_API_BASE: &str = "https://app.across.to/api";

/// Errors from the quote service client.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("quote API request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("quote API answered {status}: {body}")]
    Api { status: u16, body: String },
    #[error("invalid quote API endpoint: {0}")]
    InvalidEndpoint(String),
}

/// Token price as reported by the price feed proxy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoinGeckoData {
    pub price: f64,
}

/// One fee component of a quote: an absolute total and a percentage, both
/// as decimal strings of wei-scale integers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeDetail {
    pub pct: String,
    pub total: String,
}

/// A relay fee quote for a prospective deposit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestedFees {
    pub total_relay_fee: FeeDetail,
    pub relayer_capital_fee: FeeDetail,
    pub relayer_gas_fee: FeeDetail,
    pub lp_fee: FeeDetail,
    pub is_amount_too_low: bool,
    pub timestamp: String,
    #[serde(default)]
    pub quote_block: Option<String>,
    #[serde(default)]
    pub spoke_pool_address: Option<String>,
}

/// Deposit size limits for a route.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeLimits {
    pub min_deposit: String,
    pub max_deposit: String,
    pub max_deposit_instant: String,
    pub max_deposit_short_delay: String,
}

/// Aggregate protocol statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcrossStats {
    pub total_deposits: u64,
    pub total_volume_usd: f64,
    #[serde(default)]
    pub avg_fill_time_in_minutes: Option<f64>,
}

/// Quote service operations.
#[async_trait]
pub trait AcrossApiClient: Send + Sync {
    async fn get_coingecko_data(
        &self,
        l1_token: &UniversalAddress,
        base_currency: &str,
    ) -> Result<CoinGeckoData, ApiError>;

    async fn get_suggested_fees(
        &self,
        amount: U256,
        origin_token: &UniversalAddress,
        from_chain: u64,
        to_chain: u64,
    ) -> Result<SuggestedFees, ApiError>;

    async fn get_bridge_limits(
        &self,
        token: &UniversalAddress,
        from_chain: u64,
        to_chain: u64,
    ) -> Result<BridgeLimits, ApiError>;

    async fn get_across_stats(&self) -> Result<AcrossStats, ApiError>;
}

/// HTTPS implementation against the hosted API.
pub struct HttpApiClient {
    http: reqwest::Client,
    base: Url,
}

impl Default for HttpApiClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpApiClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            base: Url::parse(DEFAULT_API_BASE).expect("static API base"),
        }
    }

    /// Point at an arbitrary host, for tests and self-hosted deployments.
    pub fn with_base_url(base: Url) -> Self {
        Self {
            http: reqwest::Client::new(),
            base,
        }
    }

    fn endpoint(&self, segment: &str) -> Result<Url, ApiError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidEndpoint(self.base.to_string()))?
            .pop_if_empty()
            .push(segment);
        Ok(url)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T, ApiError> {
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Api {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl AcrossApiClient for HttpApiClient {
    async fn get_coingecko_data(
        &self,
        l1_token: &UniversalAddress,
        base_currency: &str,
    ) -> Result<CoinGeckoData, ApiError> {
        let mut url = self.endpoint("coingecko")?;
        url.query_pairs_mut()
            .append_pair("l1Token", &l1_token.to_native())
            .append_pair("baseCurrency", base_currency);
        self.get_json(url).await
    }

    async fn get_suggested_fees(
        &self,
        amount: U256,
        origin_token: &UniversalAddress,
        from_chain: u64,
        to_chain: u64,
    ) -> Result<SuggestedFees, ApiError> {
        let mut url = self.endpoint("suggested-fees")?;
        url.query_pairs_mut()
            .append_pair("amount", &amount.to_string())
            .append_pair("token", &origin_token.to_native())
            .append_pair("originChainId", &from_chain.to_string())
            .append_pair("destChainId", &to_chain.to_string());
        self.get_json(url).await
    }

    async fn get_bridge_limits(
        &self,
        token: &UniversalAddress,
        from_chain: u64,
        to_chain: u64,
    ) -> Result<BridgeLimits, ApiError> {
        let mut url = self.endpoint("limits")?;
        url.query_pairs_mut()
            .append_pair("token", &token.to_native())
            .append_pair("originChainId", &from_chain.to_string())
            .append_pair("destChainId", &to_chain.to_string());
        self.get_json(url).await
    }

    async fn get_across_stats(&self) -> Result<AcrossStats, ApiError> {
        let url = self.endpoint("stats")?;
        self.get_json(url).await
    }
}

/// Fixture-backed implementation for tests and offline tooling.
#[derive(Debug, Clone)]
pub struct MockApiClient {
    pub coingecko: CoinGeckoData,
    pub suggested_fees: SuggestedFees,
    pub limits: BridgeLimits,
    pub stats: AcrossStats,
}

impl Default for MockApiClient {
    fn default() -> Self {
        let zero_fee = FeeDetail {
            pct: "0".to_string(),
            total: "0".to_string(),
        };
        Self {
            coingecko: CoinGeckoData { price: 1.0 },
            suggested_fees: SuggestedFees {
                total_relay_fee: zero_fee.clone(),
                relayer_capital_fee: zero_fee.clone(),
                relayer_gas_fee: zero_fee.clone(),
                lp_fee: zero_fee,
                is_amount_too_low: false,
                timestamp: "0".to_string(),
                quote_block: None,
                spoke_pool_address: None,
            },
            limits: BridgeLimits {
                min_deposit: "0".to_string(),
                max_deposit: "0".to_string(),
                max_deposit_instant: "0".to_string(),
                max_deposit_short_delay: "0".to_string(),
            },
            stats: AcrossStats {
                total_deposits: 0,
                total_volume_usd: 0.0,
                avg_fill_time_in_minutes: None,
            },
        }
    }
}

#[async_trait]
impl AcrossApiClient for MockApiClient {
    async fn get_coingecko_data(
        &self,
        _l1_token: &UniversalAddress,
        _base_currency: &str,
    ) -> Result<CoinGeckoData, ApiError> {
        Ok(self.coingecko.clone())
    }

    async fn get_suggested_fees(
        &self,
        _amount: U256,
        _origin_token: &UniversalAddress,
        _from_chain: u64,
        _to_chain: u64,
    ) -> Result<SuggestedFees, ApiError> {
        Ok(self.suggested_fees.clone())
    }

    async fn get_bridge_limits(
        &self,
        _token: &UniversalAddress,
        _from_chain: u64,
        _to_chain: u64,
    ) -> Result<BridgeLimits, ApiError> {
        Ok(self.limits.clone())
    }

    async fn get_across_stats(&self) -> Result<AcrossStats, ApiError> {
        Ok(self.stats.clone())
    }
}

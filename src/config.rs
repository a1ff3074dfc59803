//! Configuration for the layered RPC stack and upstream URL templates.
//!
//! [`RpcStackConfig`] carries the tuning knobs for the transport decorators
//! (concurrency bound, cache distances and TTLs, retry counts, quorum
//! threshold). Fields use serde defaults so a partial JSON config works.
//!
//! [`provider_url`] renders the per-family upstream URL templates: given a
//! provider family, a transport, a chain and an API key it produces the
//! endpoint URL the HTTP transport connects to.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::network::chain_ids;

/// Tuning knobs for a single chain's transport stack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcStackConfig {
    /// Bound on simultaneously in-flight requests per upstream.
    #[serde(default = "stack_defaults::max_concurrency")]
    pub max_concurrency: usize,
    /// Percentage of RPC calls to time and log at debug level, 0 to 100.
    #[serde(default = "stack_defaults::pct_rpc_calls_logged")]
    pub pct_rpc_calls_logged: f64,
    /// Cache key namespace, shared by all upstreams of a deployment.
    #[serde(default = "stack_defaults::cache_namespace")]
    pub cache_namespace: String,
    /// Results further than this many blocks behind head cache forever.
    #[serde(default = "stack_defaults::no_ttl_block_distance")]
    pub no_ttl_block_distance: u64,
    /// Results further than this many blocks behind head (but within the
    /// no-TTL distance) cache with a finite TTL.
    #[serde(default = "stack_defaults::standard_ttl_block_distance")]
    pub standard_ttl_block_distance: u64,
    /// Base TTL in seconds for finite-TTL cache entries.
    #[serde(default = "stack_defaults::base_ttl_seconds")]
    pub base_ttl_seconds: u64,
    /// Fractional jitter applied to the base TTL to de-synchronize expiry.
    #[serde(default = "stack_defaults::ttl_modifier")]
    pub ttl_modifier: f64,
    /// Retry attempts after the first failure.
    #[serde(default = "stack_defaults::retries")]
    pub retries: u32,
    /// Seconds to sleep between retry attempts.
    #[serde(default = "stack_defaults::retry_delay_seconds")]
    pub retry_delay_seconds: f64,
    /// Providers that must agree before a quorum-gated result returns.
    #[serde(default = "stack_defaults::node_quorum_threshold")]
    pub node_quorum_threshold: usize,
}

mod stack_defaults {
    pub fn max_concurrency() -> usize {
        25
    }
    pub fn pct_rpc_calls_logged() -> f64 {
        0.0
    }
    pub fn cache_namespace() -> String {
        "rpc-cache".to_string()
    }
    pub fn no_ttl_block_distance() -> u64 {
        128
    }
    pub fn standard_ttl_block_distance() -> u64 {
        16
    }
    pub fn base_ttl_seconds() -> u64 {
        3600
    }
    pub fn ttl_modifier() -> f64 {
        0.1
    }
    pub fn retries() -> u32 {
        2
    }
    pub fn retry_delay_seconds() -> f64 {
        1.0
    }
    pub fn node_quorum_threshold() -> usize {
        1
    }
}

impl Default for RpcStackConfig {
    fn default() -> Self {
        Self {
            max_concurrency: stack_defaults::max_concurrency(),
            pct_rpc_calls_logged: stack_defaults::pct_rpc_calls_logged(),
            cache_namespace: stack_defaults::cache_namespace(),
            no_ttl_block_distance: stack_defaults::no_ttl_block_distance(),
            standard_ttl_block_distance: stack_defaults::standard_ttl_block_distance(),
            base_ttl_seconds: stack_defaults::base_ttl_seconds(),
            ttl_modifier: stack_defaults::ttl_modifier(),
            retries: stack_defaults::retries(),
            retry_delay_seconds: stack_defaults::retry_delay_seconds(),
            node_quorum_threshold: stack_defaults::node_quorum_threshold(),
        }
    }
}

/// Wire transport for an upstream endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RpcTransport {
    #[serde(rename = "https")]
    Https,
    #[serde(rename = "wss")]
    Wss,
}

/// Managed node providers with templated endpoint URLs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "kebab-case")]
pub enum ProviderFamily {
    Alchemy,
    Infura,
    Drpc,
    QuickNode {
        /// Customer-specific subdomain prefix assigned by QuickNode.
        customer_prefix: String,
    },
}

/// Errors rendering an upstream URL.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("chain {0} has no URL template for this provider family")]
    UnsupportedChain(u64),
    #[error("rendered endpoint is not a valid URL: {0}")]
    InvalidUrl(String),
}

/// Chain slug as Alchemy names it, with the `-mainnet`/`-sepolia` qualifier
/// already attached.
fn alchemy_slug(chain_id: u64) -> Option<&'static str> {
    match chain_id {
        chain_ids::MAINNET => Some("eth-mainnet"),
        chain_ids::OPTIMISM => Some("opt-mainnet"),
        chain_ids::ARBITRUM => Some("arb-mainnet"),
        chain_ids::BASE => Some("base-mainnet"),
        chain_ids::POLYGON => Some("polygon-mainnet"),
        chain_ids::ZK_SYNC => Some("zksync-mainnet"),
        chain_ids::LINEA => Some("linea-mainnet"),
        chain_ids::SCROLL => Some("scroll-mainnet"),
        chain_ids::SEPOLIA => Some("eth-sepolia"),
        chain_ids::OPTIMISM_SEPOLIA => Some("opt-sepolia"),
        chain_ids::ARBITRUM_SEPOLIA => Some("arb-sepolia"),
        chain_ids::BASE_SEPOLIA => Some("base-sepolia"),
        chain_ids::SOLANA => Some("solana-mainnet"),
        chain_ids::SOLANA_DEVNET => Some("solana-devnet"),
        _ => None,
    }
}

/// Chain slug as Infura names it: bare `mainnet`/`sepolia` for Ethereum,
/// `{chain}-mainnet` for the other mainnets.
fn infura_slug(chain_id: u64) -> Option<&'static str> {
    match chain_id {
        chain_ids::MAINNET => Some("mainnet"),
        chain_ids::SEPOLIA => Some("sepolia"),
        chain_ids::OPTIMISM => Some("optimism-mainnet"),
        chain_ids::ARBITRUM => Some("arbitrum-mainnet"),
        chain_ids::BASE => Some("base-mainnet"),
        chain_ids::POLYGON => Some("polygon-mainnet"),
        chain_ids::LINEA => Some("linea-mainnet"),
        chain_ids::SCROLL => Some("scroll-mainnet"),
        chain_ids::BLAST => Some("blast-mainnet"),
        chain_ids::OPTIMISM_SEPOLIA => Some("optimism-sepolia"),
        chain_ids::ARBITRUM_SEPOLIA => Some("arbitrum-sepolia"),
        chain_ids::BASE_SEPOLIA => Some("base-sepolia"),
        _ => None,
    }
}

fn drpc_slug(chain_id: u64) -> Option<&'static str> {
    match chain_id {
        chain_ids::MAINNET => Some("ethereum"),
        chain_ids::OPTIMISM => Some("optimism"),
        chain_ids::ARBITRUM => Some("arbitrum"),
        chain_ids::BASE => Some("base"),
        chain_ids::POLYGON => Some("polygon"),
        chain_ids::ZK_SYNC => Some("zksync"),
        chain_ids::LINEA => Some("linea"),
        chain_ids::SCROLL => Some("scroll"),
        chain_ids::MODE => Some("mode"),
        chain_ids::BLAST => Some("blast"),
        chain_ids::LISK => Some("lisk"),
        chain_ids::INK => Some("ink"),
        chain_ids::WORLD_CHAIN => Some("worldchain"),
        chain_ids::SOLANA => Some("solana"),
        chain_ids::SEPOLIA => Some("sepolia"),
        _ => None,
    }
}

fn quicknode_slug(chain_id: u64) -> Option<&'static str> {
    match chain_id {
        chain_ids::MAINNET => Some("quiknode"),
        chain_ids::OPTIMISM => Some("optimism"),
        chain_ids::ARBITRUM => Some("arbitrum-mainnet"),
        chain_ids::BASE => Some("base-mainnet"),
        chain_ids::POLYGON => Some("matic"),
        chain_ids::SOLANA => Some("solana-mainnet"),
        _ => None,
    }
}

/// Render the endpoint URL for a provider family, transport and chain.
pub fn provider_url(
    family: &ProviderFamily,
    transport: RpcTransport,
    chain_id: u64,
    api_key: &str,
) -> Result<Url, ConfigError> {
    let rendered = match family {
        ProviderFamily::Alchemy => {
            let slug = alchemy_slug(chain_id).ok_or(ConfigError::UnsupportedChain(chain_id))?;
            let scheme = match transport {
                RpcTransport::Https => "https",
                RpcTransport::Wss => "wss",
            };
            format!("{scheme}://{slug}.g.alchemy.com/v2/{api_key}")
        }
        ProviderFamily::Infura => {
            let slug = infura_slug(chain_id).ok_or(ConfigError::UnsupportedChain(chain_id))?;
            match transport {
                RpcTransport::Https => format!("https://{slug}.infura.io/v3/{api_key}"),
                RpcTransport::Wss => format!("wss://{slug}.infura.io/ws/v3/{api_key}"),
            }
        }
        ProviderFamily::Drpc => {
            let slug = drpc_slug(chain_id).ok_or(ConfigError::UnsupportedChain(chain_id))?;
            match transport {
                RpcTransport::Https => {
                    format!("https://lb.drpc.org/ogrpc?network={slug}&dkey={api_key}")
                }
                RpcTransport::Wss => {
                    format!("wss://lb.drpc.org/ogws?network={slug}&dkey={api_key}")
                }
            }
        }
        ProviderFamily::QuickNode { customer_prefix } => {
            let slug = quicknode_slug(chain_id).ok_or(ConfigError::UnsupportedChain(chain_id))?;
            let scheme = match transport {
                RpcTransport::Https => "https",
                RpcTransport::Wss => "wss",
            };
            format!("{scheme}://{customer_prefix}.{slug}.quicknode.pro/{api_key}")
        }
    };
    Url::parse(&rendered).map_err(|_| ConfigError::InvalidUrl(rendered))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let config: RpcStackConfig = serde_json::from_str("{}").expect("empty config");
        assert_eq!(config.max_concurrency, 25);
        assert_eq!(config.no_ttl_block_distance, 128);
        assert_eq!(config.standard_ttl_block_distance, 16);
        assert_eq!(config.node_quorum_threshold, 1);

        let config: RpcStackConfig =
            serde_json::from_str(r#"{"retries": 5, "node_quorum_threshold": 2}"#)
                .expect("partial config");
        assert_eq!(config.retries, 5);
        assert_eq!(config.node_quorum_threshold, 2);
        assert_eq!(config.base_ttl_seconds, 3600);
    }

    #[test]
    fn alchemy_template_applies_slug_overrides() {
        let url = provider_url(
            &ProviderFamily::Alchemy,
            RpcTransport::Https,
            chain_ids::ARBITRUM,
            "key123",
        )
        .expect("arbitrum is supported");
        assert_eq!(url.as_str(), "https://arb-mainnet.g.alchemy.com/v2/key123");

        let url = provider_url(
            &ProviderFamily::Alchemy,
            RpcTransport::Wss,
            chain_ids::MAINNET,
            "key123",
        )
        .expect("mainnet is supported");
        assert_eq!(url.as_str(), "wss://eth-mainnet.g.alchemy.com/v2/key123");
    }

    #[test]
    fn infura_appends_mainnet_for_non_ethereum() {
        let url = provider_url(
            &ProviderFamily::Infura,
            RpcTransport::Https,
            chain_ids::OPTIMISM,
            "abc",
        )
        .expect("optimism is supported");
        assert_eq!(url.as_str(), "https://optimism-mainnet.infura.io/v3/abc");

        let url = provider_url(
            &ProviderFamily::Infura,
            RpcTransport::Wss,
            chain_ids::MAINNET,
            "abc",
        )
        .expect("mainnet is supported");
        assert_eq!(url.as_str(), "wss://mainnet.infura.io/ws/v3/abc");
    }

    #[test]
    fn drpc_switches_path_by_transport() {
        let http = provider_url(
            &ProviderFamily::Drpc,
            RpcTransport::Https,
            chain_ids::BASE,
            "dk",
        )
        .expect("base is supported");
        assert_eq!(http.as_str(), "https://lb.drpc.org/ogrpc?network=base&dkey=dk");

        let ws = provider_url(&ProviderFamily::Drpc, RpcTransport::Wss, chain_ids::BASE, "dk")
            .expect("base is supported");
        assert_eq!(ws.as_str(), "wss://lb.drpc.org/ogws?network=base&dkey=dk");
    }

    #[test]
    fn quicknode_carries_customer_prefix() {
        let url = provider_url(
            &ProviderFamily::QuickNode {
                customer_prefix: "billowing-frost".to_string(),
            },
            RpcTransport::Https,
            chain_ids::OPTIMISM,
            "qk",
        )
        .expect("optimism is supported");
        assert_eq!(
            url.as_str(),
            "https://billowing-frost.optimism.quicknode.pro/qk"
        );
    }

    #[test]
    fn unsupported_chain_is_an_error() {
        assert_eq!(
            provider_url(
                &ProviderFamily::Alchemy,
                RpcTransport::Https,
                424242,
                "key"
            ),
            Err(ConfigError::UnsupportedChain(424242))
        );
    }
}

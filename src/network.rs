//! Network definitions: chain ids, chain families, and per-chain constants.
//!
//! This module classifies the chains the bridge operates on into families
//! (EVM vs SVM), records which chains run the OP stack, and seeds the
//! block-time averages used by the block finder.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Well-known chain ids used across the SDK.
pub mod chain_ids {
    pub const MAINNET: u64 = 1;
    pub const OPTIMISM: u64 = 10;
    pub const UNICHAIN: u64 = 130;
    pub const POLYGON: u64 = 137;
    pub const ZK_SYNC: u64 = 324;
    pub const WORLD_CHAIN: u64 = 480;
    pub const REDSTONE: u64 = 690;
    pub const LISK: u64 = 1135;
    pub const SONEIUM: u64 = 1868;
    pub const BASE: u64 = 8453;
    pub const MODE: u64 = 34443;
    pub const ARBITRUM: u64 = 42161;
    pub const INK: u64 = 57073;
    pub const LINEA: u64 = 59144;
    pub const BLAST: u64 = 81457;
    pub const SCROLL: u64 = 534352;

    pub const SEPOLIA: u64 = 11155111;
    pub const OPTIMISM_SEPOLIA: u64 = 11155420;
    pub const BASE_SEPOLIA: u64 = 84532;
    pub const ARBITRUM_SEPOLIA: u64 = 421614;

    /// Solana mainnet, under the synthetic chain id the bridge assigns it.
    pub const SOLANA: u64 = 34268394551451;
    /// Solana devnet.
    pub const SOLANA_DEVNET: u64 = 133268194659241;
}

/// The two chain families the RPC core speaks to.
///
/// EVM chains use Ethereum JSON-RPC; SVM chains use Solana JSON-RPC. The
/// family decides address encoding, cache decisioning, and retry behavior.
#[derive(Debug, Hash, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainFamily {
    /// Ethereum and EVM-compatible chains.
    #[serde(rename = "evm")]
    Evm,
    /// Solana and SVM-compatible chains.
    #[serde(rename = "svm")]
    Svm,
}

impl Display for ChainFamily {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ChainFamily::Evm => write!(f, "evm"),
            ChainFamily::Svm => write!(f, "svm"),
        }
    }
}

/// Return the [`ChainFamily`] for a chain id.
pub fn chain_family(chain_id: u64) -> ChainFamily {
    match chain_id {
        chain_ids::SOLANA | chain_ids::SOLANA_DEVNET => ChainFamily::Svm,
        _ => ChainFamily::Evm,
    }
}

/// Whether the chain runs the OP stack.
///
/// OP-stack chains share rollup mechanics and inherit the Optimism
/// block-time default unless overridden.
pub fn is_op_stack(chain_id: u64) -> bool {
    matches!(
        chain_id,
        chain_ids::OPTIMISM
            | chain_ids::BASE
            | chain_ids::MODE
            | chain_ids::INK
            | chain_ids::LISK
            | chain_ids::REDSTONE
            | chain_ids::SONEIUM
            | chain_ids::UNICHAIN
            | chain_ids::WORLD_CHAIN
            | chain_ids::BLAST
            | chain_ids::OPTIMISM_SEPOLIA
            | chain_ids::BASE_SEPOLIA
    )
}

/// Seconds per block on Optimism, inherited by every OP-stack chain.
pub const OP_STACK_BLOCK_TIME_SECONDS: f64 = 2.0;

/// Seed value for the average block time of a chain, in seconds.
///
/// The block finder refreshes these from live blocks; the seed only matters
/// before the first refresh and as the fallback when a refresh fails.
pub fn default_block_time_seconds(chain_id: u64) -> f64 {
    if is_op_stack(chain_id) {
        return OP_STACK_BLOCK_TIME_SECONDS;
    }
    match chain_id {
        chain_ids::MAINNET | chain_ids::SEPOLIA => 12.0,
        chain_ids::POLYGON => 2.0,
        chain_ids::ARBITRUM | chain_ids::ARBITRUM_SEPOLIA => 0.25,
        chain_ids::ZK_SYNC => 1.0,
        chain_ids::LINEA => 3.0,
        chain_ids::SCROLL => 3.0,
        chain_ids::SOLANA | chain_ids::SOLANA_DEVNET => 0.4,
        _ => 12.0,
    }
}

/// Whether the chain id belongs to a production deployment (as opposed to a
/// testnet). Decides which Circle API host the CCTP pipeline talks to.
pub fn is_production(chain_id: u64) -> bool {
    !matches!(
        chain_id,
        chain_ids::SEPOLIA
            | chain_ids::OPTIMISM_SEPOLIA
            | chain_ids::BASE_SEPOLIA
            | chain_ids::ARBITRUM_SEPOLIA
            | chain_ids::SOLANA_DEVNET
    )
}

/// CCTP domain id for a chain, if Circle supports it.
///
/// Domains are Circle's own chain numbering and appear inside burn messages
/// and attestation API paths.
pub fn cctp_domain(chain_id: u64) -> Option<u32> {
    match chain_id {
        chain_ids::MAINNET | chain_ids::SEPOLIA => Some(0),
        chain_ids::OPTIMISM | chain_ids::OPTIMISM_SEPOLIA => Some(2),
        chain_ids::ARBITRUM | chain_ids::ARBITRUM_SEPOLIA => Some(3),
        chain_ids::SOLANA | chain_ids::SOLANA_DEVNET => Some(5),
        chain_ids::BASE | chain_ids::BASE_SEPOLIA => Some(6),
        chain_ids::POLYGON => Some(7),
        chain_ids::UNICHAIN => Some(10),
        chain_ids::LINEA => Some(11),
        chain_ids::WORLD_CHAIN => Some(14),
        _ => None,
    }
}

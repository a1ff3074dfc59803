//! Multi-provider JSON-RPC client core for the Across intents bridge.
//!
//! Indexers, dataworkers and relayers all read chain state through a
//! heterogeneous fleet of upstream nodes that disagree, rate-limit, and
//! fail independently. This crate is the access layer between them: a
//! composable transport stack plus the search primitives the bridge needs
//! on top of it.
//!
//! # Architecture
//!
//! Every transport layer implements the same one-method [`transport::Transport`]
//! trait and composes as a decorator:
//!
//! ```text
//! quorum → retry → cache → rate-limit → HTTPS upstream
//! ```
//!
//! The quorum layer fans a call out over N such stacks and requires
//! per-method agreement before returning. Above the stack sit the typed
//! clients: the block finder, the spoke pool search utilities, and the CCTP
//! attestation pipeline.
//!
//! # Modules
//!
//! - [`transport`] — the layered JSON-RPC stack: HTTP upstream, rate
//!   limiting, tiered caching, retry with fail-fast, and quorum fan-out.
//! - [`stack`] — assembly of the full stack from configuration.
//! - [`block_finder`] — timestamp-to-block lookup with interpolation search.
//! - [`spoke`] — spoke pool primitives: relay hashing, deposit and fill
//!   searches, fill calldata, paginated log queries.
//! - [`cctp`] — CCTP burn discovery, attestation polling, classification,
//!   and finalization calldata.
//! - [`address`] — the 32-byte universal address model (EVM / SVM / raw).
//! - [`api`] — the hosted quote-service client (fees, limits, stats).
//! - [`config`] — stack tuning knobs and upstream URL templates.
//! - [`network`] — chain ids, families, and per-chain constants.
//! - [`types`] — shared data model and JSON boundary codecs.
//!
//! # Example
//!
//! ```ignore
//! use across_rpc::config::RpcStackConfig;
//! use across_rpc::network::{ChainFamily, chain_ids};
//! use across_rpc::stack::build_client;
//!
//! let config = RpcStackConfig::default();
//! let client = build_client(urls, chain_ids::MAINNET, ChainFamily::Evm, &config)?;
//! let head = client.block_number().await?;
//! ```

pub mod address;
pub mod api;
pub mod block_finder;
pub mod cctp;
pub mod config;
pub mod network;
pub mod spoke;
pub mod stack;
pub mod transport;
pub mod types;

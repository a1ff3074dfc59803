//! Shared data model: blocks, relay data, fill status, and wire codecs.
//!
//! Everything here is a plain value type. The JSON-RPC transports deal in
//! `serde_json::Value`; the codecs in this module are the boundary where
//! hex quantities and log entries become typed data.

use alloy_primitives::{Address as Bytes20, B256, Bytes, LogData, U256};
use serde_json::Value;

use crate::address::UniversalAddress;

/// A block header reduced to what the block finder needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub number: u64,
    pub timestamp: u64,
}

/// On-chain fill state for a relay hash, as stored in `fillStatuses`.
///
/// Monotonic per hash within the canonical chain: once `Filled`, a hash does
/// not revert to an earlier state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FillStatus {
    Unfilled = 0,
    RequestedSlowFill = 1,
    Filled = 2,
}

impl FillStatus {
    /// Decode a `fillStatuses` storage slot. Values outside `{0, 1, 2}` are
    /// not a legal fill state and decode to `None`.
    pub fn from_u256(value: U256) -> Option<Self> {
        match u8::try_from(value).ok()? {
            0 => Some(FillStatus::Unfilled),
            1 => Some(FillStatus::RequestedSlowFill),
            2 => Some(FillStatus::Filled),
            _ => None,
        }
    }
}

/// The canonical relay tuple identifying a bridge transfer.
///
/// Field order and types match the on-chain struct; the canonical hash in
/// [`crate::spoke::relay_data_hash`] depends on them, not on any source
/// object layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayData {
    pub depositor: UniversalAddress,
    pub recipient: UniversalAddress,
    pub exclusive_relayer: UniversalAddress,
    pub input_token: UniversalAddress,
    pub output_token: UniversalAddress,
    pub input_amount: U256,
    pub output_amount: U256,
    pub origin_chain_id: U256,
    pub deposit_id: U256,
    pub fill_deadline: u32,
    pub exclusivity_deadline: u32,
    pub message: Bytes,
}

/// A deposit as observed on an origin spoke pool, plus the optional speed-up
/// amendment signed by the depositor.
#[derive(Debug, Clone)]
pub struct Deposit {
    pub relay_data: RelayData,
    pub destination_chain_id: u64,
    /// Depositor signature authorizing the updated fields below.
    pub speed_up_signature: Option<Bytes>,
    pub updated_recipient: Option<UniversalAddress>,
    pub updated_output_amount: Option<U256>,
    pub updated_message: Option<Bytes>,
}

impl Deposit {
    pub fn new(relay_data: RelayData, destination_chain_id: u64) -> Self {
        Self {
            relay_data,
            destination_chain_id,
            speed_up_signature: None,
            updated_recipient: None,
            updated_output_amount: None,
            updated_message: None,
        }
    }
}

/// Positional metadata of a log, ordered by (block, transaction, log) index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct EventMeta {
    pub block_number: u64,
    pub transaction_index: u64,
    pub log_index: u64,
    pub transaction_hash: B256,
}

/// A raw log paired with its sort key, ready for `SolEvent` decoding.
#[derive(Debug, Clone)]
pub struct SortableLog {
    pub meta: EventMeta,
    pub address: Bytes20,
    pub inner: LogData,
}

/// Codec failures at the JSON boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("expected a 0x-prefixed hex quantity, got {0}")]
    InvalidQuantity(String),
    #[error("malformed log entry: {0}")]
    MalformedLog(String),
    #[error("invalid hex bytes: {0}")]
    InvalidHexBytes(String),
}

/// Format a block number as a JSON-RPC hex quantity.
pub fn format_quantity(value: u64) -> String {
    format!("0x{value:x}")
}

/// Parse a JSON-RPC hex quantity (`"0x1a"`) into a `u64`.
pub fn parse_quantity(value: &str) -> Result<u64, CodecError> {
    let digits = value
        .strip_prefix("0x")
        .ok_or_else(|| CodecError::InvalidQuantity(value.to_string()))?;
    u64::from_str_radix(digits, 16).map_err(|_| CodecError::InvalidQuantity(value.to_string()))
}

/// Parse a JSON-RPC hex quantity into a `U256`.
pub fn parse_quantity_u256(value: &str) -> Result<U256, CodecError> {
    let digits = value
        .strip_prefix("0x")
        .ok_or_else(|| CodecError::InvalidQuantity(value.to_string()))?;
    U256::from_str_radix(digits, 16).map_err(|_| CodecError::InvalidQuantity(value.to_string()))
}

/// Read a numeric block tag out of a JSON value.
///
/// Returns `None` for the symbolic tags (`latest`, `pending`, `earliest`,
/// `safe`, `finalized`) and for anything that is not a hex quantity; those
/// are the cases the cache must treat as unpinned.
pub fn numeric_block_tag(value: &Value) -> Option<u64> {
    match value {
        Value::String(tag) => parse_quantity(tag).ok(),
        Value::Number(number) => number.as_u64(),
        _ => None,
    }
}

/// Decode `0x`-prefixed hex into bytes.
pub fn parse_hex_bytes(value: &str) -> Result<Vec<u8>, CodecError> {
    let digits = value
        .strip_prefix("0x")
        .ok_or_else(|| CodecError::InvalidHexBytes(value.to_string()))?;
    alloy_primitives::hex::decode(digits)
        .map_err(|_| CodecError::InvalidHexBytes(value.to_string()))
}

fn log_field<'v>(entry: &'v Value, field: &str) -> Result<&'v str, CodecError> {
    entry
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| CodecError::MalformedLog(format!("missing {field}")))
}

/// Convert one `eth_getLogs` entry into a [`SortableLog`].
pub fn log_from_json(entry: &Value) -> Result<SortableLog, CodecError> {
    let address_bytes = parse_hex_bytes(log_field(entry, "address")?)?;
    if address_bytes.len() != 20 {
        return Err(CodecError::MalformedLog(format!(
            "address has {} bytes",
            address_bytes.len()
        )));
    }
    let topics = entry
        .get("topics")
        .and_then(Value::as_array)
        .ok_or_else(|| CodecError::MalformedLog("missing topics".into()))?
        .iter()
        .map(|topic| {
            let raw = topic
                .as_str()
                .ok_or_else(|| CodecError::MalformedLog("non-string topic".into()))?;
            let bytes = parse_hex_bytes(raw)?;
            if bytes.len() != 32 {
                return Err(CodecError::MalformedLog(format!(
                    "topic has {} bytes",
                    bytes.len()
                )));
            }
            Ok(B256::from_slice(&bytes))
        })
        .collect::<Result<Vec<_>, CodecError>>()?;
    let data = parse_hex_bytes(log_field(entry, "data")?)?;
    let transaction_hash_bytes = parse_hex_bytes(log_field(entry, "transactionHash")?)?;
    if transaction_hash_bytes.len() != 32 {
        return Err(CodecError::MalformedLog("transactionHash not 32 bytes".into()));
    }
    let meta = EventMeta {
        block_number: parse_quantity(log_field(entry, "blockNumber")?)?,
        transaction_index: parse_quantity(log_field(entry, "transactionIndex")?)?,
        log_index: parse_quantity(log_field(entry, "logIndex")?)?,
        transaction_hash: B256::from_slice(&transaction_hash_bytes),
    };
    let inner = LogData::new(topics, data.into())
        .ok_or_else(|| CodecError::MalformedLog("too many topics".into()))?;
    Ok(SortableLog {
        meta,
        address: Bytes20::from_slice(&address_bytes),
        inner,
    })
}

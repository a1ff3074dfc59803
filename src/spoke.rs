//! Spoke pool search primitives and fill transaction assembly.
//!
//! The spoke pool exposes two monotonic views this module searches over:
//! `numberOfDeposits` (a counter, for locating the block a deposit id was
//! minted in) and `fillStatuses` (a mapping keyed by the canonical relay
//! hash, for locating the block a fill landed in). Both searches are plain
//! binary searches over archive `eth_call`s.

use alloy_primitives::{Address as Bytes20, B256, Bytes, U256, keccak256};
use alloy_sol_types::{SolCall, SolEvent, SolValue, sol};
use serde_json::{Value, json};

use crate::address::{AddressError, UniversalAddress};
use crate::transport::{BlockTag, EvmClient, RpcError};
use crate::types::{
    CodecError, Deposit, EventMeta, FillStatus, RelayData, SortableLog, format_quantity,
};

sol! {
    /// Relay tuple as the spoke pool ABI encodes it. The canonical relay
    /// hash and all fill calldata depend on this exact layout.
    #[derive(Debug, PartialEq, Eq)]
    struct V3RelayData {
        bytes32 depositor;
        bytes32 recipient;
        bytes32 exclusiveRelayer;
        bytes32 inputToken;
        bytes32 outputToken;
        uint256 inputAmount;
        uint256 outputAmount;
        uint256 originChainId;
        uint256 depositId;
        uint32 fillDeadline;
        uint32 exclusivityDeadline;
        bytes message;
    }

    function numberOfDeposits() external view returns (uint32);

    function fillStatuses(bytes32 relayHash) external view returns (uint256);

    function fillRelay(
        V3RelayData relayData,
        uint256 repaymentChainId,
        bytes32 repaymentAddress
    ) external;

    function fillRelayWithUpdatedDeposit(
        V3RelayData relayData,
        uint256 repaymentChainId,
        bytes32 repaymentAddress,
        uint256 updatedOutputAmount,
        bytes32 updatedRecipient,
        bytes updatedMessage,
        bytes depositorSignature
    ) external;

    function multicall(bytes[] calldata data) external returns (bytes[] memory results);

    event FundsDeposited(
        bytes32 inputToken,
        bytes32 outputToken,
        uint256 inputAmount,
        uint256 outputAmount,
        uint256 indexed destinationChainId,
        uint256 indexed depositId,
        uint32 quoteTimestamp,
        uint32 fillDeadline,
        uint32 exclusivityDeadline,
        bytes32 indexed depositor,
        bytes32 recipient,
        bytes32 exclusiveRelayer,
        bytes message
    );
}

/// Deposit ids above `u32::MAX` are minted by unsafe deposits and carry a
/// hashed id; they cannot be located through the `numberOfDeposits` counter.
pub const MAX_SAFE_DEPOSIT_ID: u64 = u32::MAX as u64;

/// `fillStatuses` reads batched into one `multicall`, per outer call.
const FILL_STATUS_CHUNK: usize = 250;

/// Errors from the spoke utilities.
#[derive(Debug, thiserror::Error)]
pub enum SpokeError {
    #[error("deposit id {0} is above the safe uint32 range and cannot be searched")]
    UnsafeDepositId(U256),
    #[error("relay is already filled at the search range start (block {0})")]
    FilledAtRangeStart(u64),
    #[error("speed-up deposit is missing {0}")]
    IncompleteSpeedUp(&'static str),
    #[error("fill status slot holds {0}, outside the known states")]
    InvalidFillStatus(U256),
    #[error(transparent)]
    Address(#[from] AddressError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Rpc(#[from] RpcError),
}

impl From<RelayData> for V3RelayData {
    fn from(relay: RelayData) -> Self {
        V3RelayData {
            depositor: relay.depositor.to_bytes32(),
            recipient: relay.recipient.to_bytes32(),
            exclusiveRelayer: relay.exclusive_relayer.to_bytes32(),
            inputToken: relay.input_token.to_bytes32(),
            outputToken: relay.output_token.to_bytes32(),
            inputAmount: relay.input_amount,
            outputAmount: relay.output_amount,
            originChainId: relay.origin_chain_id,
            depositId: relay.deposit_id,
            fillDeadline: relay.fill_deadline,
            exclusivityDeadline: relay.exclusivity_deadline,
            message: relay.message,
        }
    }
}

/// Canonical relay hash: `keccak256(abi.encode(relayData, destinationChainId))`
/// with every address normalized to bytes32 first. This is the primary key
/// for a fill and the lookup key in `fillStatuses`.
pub fn relay_data_hash(relay: &RelayData, destination_chain_id: u64) -> B256 {
    let tuple: V3RelayData = relay.clone().into();
    let encoded = (tuple, U256::from(destination_chain_id)).abi_encode_params();
    keccak256(encoded)
}

/// Client for one spoke pool deployment.
#[derive(Clone)]
pub struct SpokePool {
    client: EvmClient,
    address: Bytes20,
}

impl SpokePool {
    pub fn new(client: EvmClient, address: Bytes20) -> Self {
        Self { client, address }
    }

    pub fn address(&self) -> Bytes20 {
        self.address
    }

    /// `numberOfDeposits` as of a block.
    pub async fn number_of_deposits(&self, tag: BlockTag) -> Result<u32, SpokeError> {
        let calldata = numberOfDepositsCall {}.abi_encode();
        let raw = self.client.call(self.address, &calldata, tag).await?;
        let count = U256::abi_decode(&raw)
            .map_err(|err| RpcError::Logical(format!("numberOfDeposits decode: {err}")))?;
        u32::try_from(count)
            .map_err(|_| RpcError::Logical(format!("numberOfDeposits overflow: {count}")).into())
    }

    /// `fillStatuses[relay_hash]` as of a block. A slot outside the known
    /// states means the caller queried something that is not a relay hash.
    pub async fn relay_fill_status(
        &self,
        relay: &RelayData,
        destination_chain_id: u64,
        tag: BlockTag,
    ) -> Result<FillStatus, SpokeError> {
        let relay_hash = relay_data_hash(relay, destination_chain_id);
        let calldata = fillStatusesCall { relayHash: relay_hash }.abi_encode();
        let raw = self.client.call(self.address, &calldata, tag).await?;
        let slot = U256::abi_decode(&raw)
            .map_err(|err| RpcError::Logical(format!("fillStatuses decode: {err}")))?;
        FillStatus::from_u256(slot).ok_or(SpokeError::InvalidFillStatus(slot))
    }

    /// Batched `fillStatuses` reads for many relay hashes at one block,
    /// aggregated through `multicall` in chunks of 250. Slots outside the
    /// known states decode to `None`.
    pub async fn fill_statuses(
        &self,
        relay_hashes: &[B256],
        tag: BlockTag,
    ) -> Result<Vec<Option<FillStatus>>, SpokeError> {
        let mut statuses = Vec::with_capacity(relay_hashes.len());
        for chunk in relay_hashes.chunks(FILL_STATUS_CHUNK) {
            let inner: Vec<Bytes> = chunk
                .iter()
                .map(|relay_hash| {
                    fillStatusesCall {
                        relayHash: *relay_hash,
                    }
                    .abi_encode()
                    .into()
                })
                .collect();
            let calldata = multicallCall { data: inner }.abi_encode();
            let raw = self.client.call(self.address, &calldata, tag).await?;
            let results = multicallCall::abi_decode_returns(&raw)
                .map_err(|err| RpcError::Logical(format!("multicall decode: {err}")))?;
            if results.len() != chunk.len() {
                return Err(RpcError::Logical(format!(
                    "multicall returned {} results for {} calls",
                    results.len(),
                    chunk.len()
                ))
                .into());
            }
            for result in results {
                let status = U256::abi_decode(&result)
                    .ok()
                    .and_then(FillStatus::from_u256);
                statuses.push(status);
            }
        }
        Ok(statuses)
    }

    /// Locate the block in which `numberOfDeposits` first exceeded
    /// `deposit_id`, i.e. the block the deposit landed in.
    ///
    /// Returns `None` when the range does not bracket the deposit.
    pub async fn find_deposit_id_block(
        &self,
        deposit_id: U256,
        low: u64,
        high: u64,
    ) -> Result<Option<u64>, SpokeError> {
        if deposit_id > U256::from(MAX_SAFE_DEPOSIT_ID) {
            return Err(SpokeError::UnsafeDepositId(deposit_id));
        }
        if low > high {
            return Err(RpcError::Validation(format!(
                "inverted search range [{low}, {high}]"
            ))
            .into());
        }
        let deposit_id = u32::try_from(deposit_id).expect("bounded by MAX_SAFE_DEPOSIT_ID");

        let count_low = self.number_of_deposits(BlockTag::Number(low)).await?;
        let count_high = self.number_of_deposits(BlockTag::Number(high)).await?;
        if count_low > deposit_id || deposit_id >= count_high {
            return Ok(None);
        }

        // Invariant: n(low) ≤ deposit_id < n(high).
        let (mut low, mut high) = (low, high);
        while low + 1 < high {
            let mid = low + (high - low) / 2;
            let count = self.number_of_deposits(BlockTag::Number(mid)).await?;
            if count > deposit_id {
                high = mid;
            } else {
                low = mid;
            }
        }
        Ok(Some(high))
    }

    /// Earliest block within `[low, high]` at which the relay is `Filled`,
    /// or `None` if it was never filled in range.
    ///
    /// A fill already present at `low` means the caller picked a range that
    /// does not bracket the fill, which is an error rather than an answer.
    pub async fn find_fill_block(
        &self,
        relay: &RelayData,
        destination_chain_id: u64,
        low: u64,
        high: u64,
    ) -> Result<Option<u64>, SpokeError> {
        if low >= high {
            return Err(RpcError::Validation(format!(
                "degenerate search range [{low}, {high}]"
            ))
            .into());
        }
        let status_low = self
            .relay_fill_status(relay, destination_chain_id, BlockTag::Number(low))
            .await?;
        if status_low == FillStatus::Filled {
            return Err(SpokeError::FilledAtRangeStart(low));
        }
        let status_high = self
            .relay_fill_status(relay, destination_chain_id, BlockTag::Number(high))
            .await?;
        if status_high != FillStatus::Filled {
            return Ok(None);
        }

        let (mut low, mut high) = (low, high);
        while low + 1 < high {
            let mid = low + (high - low) / 2;
            let status = self
                .relay_fill_status(relay, destination_chain_id, BlockTag::Number(mid))
                .await?;
            if status == FillStatus::Filled {
                high = mid;
            } else {
                low = mid;
            }
        }
        Ok(Some(high))
    }
}

/// Assemble fill calldata for a deposit.
///
/// Deposits carrying a speed-up signature fill through
/// `fillRelayWithUpdatedDeposit` and must carry every updated field; plain
/// deposits fill through `fillRelay`. The repayment chain defaults to the
/// destination chain. All addresses are passed as left-padded bytes32.
pub fn populate_fill_relay(
    deposit: &Deposit,
    relayer: &UniversalAddress,
    repayment_chain_id: Option<u64>,
) -> Result<Bytes, SpokeError> {
    let relay_data: V3RelayData = deposit.relay_data.clone().into();
    let repayment = U256::from(repayment_chain_id.unwrap_or(deposit.destination_chain_id));
    let calldata = match &deposit.speed_up_signature {
        Some(signature) => {
            let updated_recipient = deposit
                .updated_recipient
                .as_ref()
                .filter(|recipient| !recipient.is_zero_address())
                .ok_or(SpokeError::IncompleteSpeedUp("updated recipient"))?;
            let updated_output_amount = deposit
                .updated_output_amount
                .ok_or(SpokeError::IncompleteSpeedUp("updated output amount"))?;
            let updated_message = deposit
                .updated_message
                .as_ref()
                .ok_or(SpokeError::IncompleteSpeedUp("updated message"))?;
            fillRelayWithUpdatedDepositCall {
                relayData: relay_data,
                repaymentChainId: repayment,
                repaymentAddress: relayer.to_bytes32(),
                updatedOutputAmount: updated_output_amount,
                updatedRecipient: updated_recipient.to_bytes32(),
                updatedMessage: updated_message.clone(),
                depositorSignature: signature.clone(),
            }
            .abi_encode()
        }
        None => fillRelayCall {
            relayData: relay_data,
            repaymentChainId: repayment,
            repaymentAddress: relayer.to_bytes32(),
        }
        .abi_encode(),
    };
    Ok(calldata.into())
}

/// Search window for a paginated log query.
#[derive(Debug, Clone, Copy)]
pub struct EventSearchConfig {
    pub from_block: u64,
    pub to_block: u64,
    /// Maximum blocks per sub-query; 0 issues a single unchunked query.
    pub max_block_lookback: u64,
}

impl EventSearchConfig {
    /// The inclusive sub-ranges the search splits into.
    pub fn ranges(&self) -> Vec<(u64, u64)> {
        if self.max_block_lookback == 0 {
            return vec![(self.from_block, self.to_block)];
        }
        let mut ranges = Vec::new();
        let mut cursor = self.from_block;
        while cursor <= self.to_block {
            let upper = self
                .to_block
                .min(cursor.saturating_add(self.max_block_lookback - 1));
            ranges.push((cursor, upper));
            if upper == u64::MAX {
                break;
            }
            cursor = upper + 1;
        }
        ranges
    }
}

/// Run an `eth_getLogs` filter over a window, splitting into sub-queries of
/// at most `max_block_lookback` blocks, and concatenate the results.
///
/// The filter carries address/topics; the block range fields are filled in
/// per sub-query.
pub async fn paginated_event_query(
    client: &EvmClient,
    filter: &Value,
    config: EventSearchConfig,
) -> Result<Vec<SortableLog>, SpokeError> {
    if config.to_block < config.from_block {
        return Err(RpcError::Validation(format!(
            "inverted event search range [{}, {}]",
            config.from_block, config.to_block
        ))
        .into());
    }
    let mut logs = Vec::new();
    for (from, to) in config.ranges() {
        let mut sub_filter = filter.clone();
        if let Value::Object(fields) = &mut sub_filter {
            fields.insert("fromBlock".to_string(), json!(format_quantity(from)));
            fields.insert("toBlock".to_string(), json!(format_quantity(to)));
        }
        logs.extend(client.get_logs(sub_filter).await?);
    }
    Ok(logs)
}

/// Decode `FundsDeposited` logs into deposits, paired with their position.
///
/// Addresses come out family-untagged; callers re-tag them once the
/// destination family is known.
pub fn decode_funds_deposited(
    origin_chain_id: u64,
    logs: &[SortableLog],
) -> Result<Vec<(EventMeta, Deposit)>, SpokeError> {
    let mut deposits = Vec::new();
    for log in logs {
        if log.inner.topics().first() != Some(&FundsDeposited::SIGNATURE_HASH) {
            continue;
        }
        let event = FundsDeposited::decode_log_data(&log.inner)
            .map_err(|err| RpcError::Logical(format!("FundsDeposited decode: {err}")))?;
        let destination_chain_id = u64::try_from(event.destinationChainId)
            .map_err(|_| RpcError::Logical("destination chain id overflows u64".into()))?;
        let relay_data = RelayData {
            depositor: UniversalAddress::from(event.depositor),
            recipient: UniversalAddress::from(event.recipient),
            exclusive_relayer: UniversalAddress::from(event.exclusiveRelayer),
            input_token: UniversalAddress::from(event.inputToken),
            output_token: UniversalAddress::from(event.outputToken),
            input_amount: event.inputAmount,
            output_amount: event.outputAmount,
            origin_chain_id: U256::from(origin_chain_id),
            deposit_id: event.depositId,
            fill_deadline: event.fillDeadline,
            exclusivity_deadline: event.exclusivityDeadline,
            message: event.message,
        };
        deposits.push((log.meta, Deposit::new(relay_data, destination_chain_id)));
    }
    Ok(deposits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::AddressFamily;
    use crate::transport::Transport;
    use crate::transport::testing::MockTransport;
    use crate::types::parse_quantity;
    use std::sync::Arc;

    const POOL: Bytes20 = alloy_primitives::address!("0x5c7BCd6E7De5423a257D81B442095A1a6ced35C5");

    fn zero_relay() -> RelayData {
        RelayData {
            depositor: UniversalAddress::zero(AddressFamily::Evm),
            recipient: UniversalAddress::zero(AddressFamily::Evm),
            exclusive_relayer: UniversalAddress::zero(AddressFamily::Evm),
            input_token: UniversalAddress::zero(AddressFamily::Evm),
            output_token: UniversalAddress::zero(AddressFamily::Evm),
            input_amount: U256::from(1),
            output_amount: U256::from(1),
            origin_chain_id: U256::from(1),
            deposit_id: U256::ZERO,
            fill_deadline: u32::MAX,
            exclusivity_deadline: 0,
            message: Bytes::new(),
        }
    }

    #[test]
    fn relay_hash_is_deterministic_and_field_sensitive() {
        let relay = zero_relay();
        let baseline = relay_data_hash(&relay, 10);
        assert_eq!(baseline, relay_data_hash(&zero_relay(), 10));

        // Every input must move the hash.
        assert_ne!(baseline, relay_data_hash(&relay, 11));
        let mut amended = zero_relay();
        amended.input_amount = U256::from(2);
        assert_ne!(baseline, relay_data_hash(&amended, 10));
        let mut amended = zero_relay();
        amended.message = Bytes::from_static(b"\x01");
        assert_ne!(baseline, relay_data_hash(&amended, 10));
        let mut amended = zero_relay();
        amended.fill_deadline = 0;
        assert_ne!(baseline, relay_data_hash(&amended, 10));
    }

    #[test]
    fn relay_hash_depends_only_on_canonical_fields() {
        // Two differently-built sources with the same canonical tuple agree.
        let from_evm_views = zero_relay();
        let mut from_raw_views = zero_relay();
        from_raw_views.depositor = UniversalAddress::zero(AddressFamily::Raw);
        from_raw_views.recipient = UniversalAddress::zero(AddressFamily::Svm);
        assert_eq!(
            relay_data_hash(&from_evm_views, 10),
            relay_data_hash(&from_raw_views, 10)
        );
    }

    fn encode_uint(value: u64) -> String {
        alloy_primitives::hex::encode_prefixed(U256::from(value).to_be_bytes::<32>())
    }

    /// A spoke pool where deposit `k` lands in block `100 + 10k`, so
    /// `numberOfDeposits(b) = (b - 90) / 10` for `b ≥ 100`.
    fn deposit_counter_mock() -> Arc<MockTransport> {
        Arc::new(
            MockTransport::new("https://node.example/rpc").with_handler(|method, params| {
                assert_eq!(method, "eth_call");
                let tag = params.get(1).and_then(Value::as_str).expect("block tag");
                let block = parse_quantity(tag).map_err(RpcError::Codec)?;
                let count = if block < 100 { 0 } else { (block - 90) / 10 };
                Ok(json!(encode_uint(count)))
            }),
        )
    }

    fn pool(mock: &Arc<MockTransport>) -> SpokePool {
        SpokePool::new(EvmClient::new(Arc::clone(mock) as Arc<dyn Transport>), POOL)
    }

    #[tokio::test]
    async fn deposit_id_search_finds_the_minting_block() {
        let mock = deposit_counter_mock();
        let pool = pool(&mock);
        // Deposit 5 is the sixth deposit: count reaches 6 at block 150.
        let block = pool
            .find_deposit_id_block(U256::from(5), 0, 1_000)
            .await
            .expect("bracketed search");
        assert_eq!(block, Some(150));
    }

    #[tokio::test]
    async fn deposit_id_search_rejects_unsafe_ids() {
        let mock = deposit_counter_mock();
        let pool = pool(&mock);
        let error = pool
            .find_deposit_id_block(U256::from(MAX_SAFE_DEPOSIT_ID) + U256::from(1), 0, 1_000)
            .await
            .expect_err("unsafe id");
        assert!(matches!(error, SpokeError::UnsafeDepositId(_)));
        assert_eq!(mock.call_count(), 0, "rejected before any RPC");
    }

    #[tokio::test]
    async fn deposit_id_search_reports_unbracketed_ranges() {
        let mock = deposit_counter_mock();
        let pool = pool(&mock);
        // Only ~91 deposits exist by block 1000.
        let block = pool
            .find_deposit_id_block(U256::from(500), 0, 1_000)
            .await
            .expect("clean miss");
        assert_eq!(block, None);
    }

    /// A spoke pool whose relay is first `Filled` at block 1750.
    fn fill_status_mock(first_filled: u64) -> Arc<MockTransport> {
        Arc::new(
            MockTransport::new("https://node.example/rpc").with_handler(move |method, params| {
                assert_eq!(method, "eth_call");
                let tag = params.get(1).and_then(Value::as_str).expect("block tag");
                let block = parse_quantity(tag).map_err(RpcError::Codec)?;
                let status = if block >= first_filled { 2 } else { 0 };
                Ok(json!(encode_uint(status)))
            }),
        )
    }

    #[tokio::test]
    async fn fill_block_search_converges_in_logarithmic_probes() {
        let mock = fill_status_mock(1750);
        let pool = pool(&mock);
        let block = pool
            .find_fill_block(&zero_relay(), 10, 1_000, 2_000)
            .await
            .expect("bracketed fill");
        assert_eq!(block, Some(1750));
        // Two endpoint checks plus at most ceil(log2(1000)) probes.
        assert!(mock.call_count() <= 12);
    }

    #[tokio::test]
    async fn fill_block_search_flags_prefilled_ranges() {
        let mock = fill_status_mock(500);
        let pool = pool(&mock);
        let error = pool
            .find_fill_block(&zero_relay(), 10, 1_000, 2_000)
            .await
            .expect_err("filled before the range");
        assert!(matches!(error, SpokeError::FilledAtRangeStart(1_000)));
    }

    #[tokio::test]
    async fn fill_block_search_reports_unfilled_ranges() {
        let mock = fill_status_mock(5_000);
        let pool = pool(&mock);
        let block = pool
            .find_fill_block(&zero_relay(), 10, 1_000, 2_000)
            .await
            .expect("clean miss");
        assert_eq!(block, None);
    }

    #[tokio::test]
    async fn fill_statuses_batch_decodes_per_slot() {
        let mock = Arc::new(
            MockTransport::new("https://node.example/rpc").with_handler(|_, params| {
                let data = params
                    .get(0)
                    .and_then(|call| call.get("data"))
                    .and_then(Value::as_str)
                    .expect("calldata");
                let calldata = crate::types::parse_hex_bytes(data).expect("hex calldata");
                let call = multicallCall::abi_decode(&calldata).expect("multicall");
                let results: Vec<Bytes> = call
                    .data
                    .iter()
                    .enumerate()
                    .map(|(index, _)| {
                        // Slots cycle through 0, 1, 2, 3: the last decodes
                        // to no known status.
                        Bytes::from(U256::from(index % 4).to_be_bytes::<32>().to_vec())
                    })
                    .collect();
                Ok(json!(alloy_primitives::hex::encode_prefixed(
                    results.abi_encode()
                )))
            }),
        );
        let pool = pool(&mock);
        let hashes: Vec<B256> = (0..4u8).map(|i| B256::repeat_byte(i)).collect();
        let statuses = pool
            .fill_statuses(&hashes, BlockTag::Latest)
            .await
            .expect("batch");
        assert_eq!(
            statuses,
            vec![
                Some(FillStatus::Unfilled),
                Some(FillStatus::RequestedSlowFill),
                Some(FillStatus::Filled),
                None,
            ]
        );
        assert_eq!(mock.call_count(), 1, "four reads in one multicall");
    }

    #[tokio::test]
    async fn fill_statuses_batch_chunks_large_sets() {
        let mock = Arc::new(
            MockTransport::new("https://node.example/rpc").with_handler(|_, params| {
                let data = params
                    .get(0)
                    .and_then(|call| call.get("data"))
                    .and_then(Value::as_str)
                    .expect("calldata");
                let calldata = crate::types::parse_hex_bytes(data).expect("hex calldata");
                let call = multicallCall::abi_decode(&calldata).expect("multicall");
                assert!(call.data.len() <= 250);
                let results: Vec<Bytes> = call
                    .data
                    .iter()
                    .map(|_| Bytes::from(U256::ZERO.to_be_bytes::<32>().to_vec()))
                    .collect();
                Ok(json!(alloy_primitives::hex::encode_prefixed(
                    results.abi_encode()
                )))
            }),
        );
        let pool = pool(&mock);
        let hashes: Vec<B256> = (0..600u16)
            .map(|i| {
                let mut bytes = [0u8; 32];
                bytes[..2].copy_from_slice(&i.to_be_bytes());
                B256::from(bytes)
            })
            .collect();
        let statuses = pool
            .fill_statuses(&hashes, BlockTag::Latest)
            .await
            .expect("batch");
        assert_eq!(statuses.len(), 600);
        assert_eq!(mock.call_count(), 3, "600 reads in chunks of 250");
    }

    #[test]
    fn plain_fill_calldata_round_trips() {
        let relayer =
            UniversalAddress::parse("0x9A8f92a830A5cB89a3816e3D267CB7791c16b04D", AddressFamily::Evm)
                .expect("relayer");
        let deposit = Deposit::new(zero_relay(), 10);
        let calldata = populate_fill_relay(&deposit, &relayer, None).expect("calldata");
        let decoded = fillRelayCall::abi_decode(&calldata).expect("self-describing calldata");
        assert_eq!(decoded.repaymentChainId, U256::from(10));
        assert_eq!(decoded.repaymentAddress, relayer.to_bytes32());
        assert_eq!(decoded.relayData.inputAmount, U256::from(1));
        // The bytes32 view left-pads the 20-byte relayer address.
        assert_eq!(&decoded.repaymentAddress[..12], &[0u8; 12]);
    }

    #[test]
    fn speed_up_fill_requires_every_updated_field() {
        let relayer =
            UniversalAddress::parse("0x9A8f92a830A5cB89a3816e3D267CB7791c16b04D", AddressFamily::Evm)
                .expect("relayer");
        let mut deposit = Deposit::new(zero_relay(), 10);
        deposit.speed_up_signature = Some(Bytes::from_static(b"\x01\x02"));

        let error = populate_fill_relay(&deposit, &relayer, None).expect_err("missing fields");
        assert!(matches!(error, SpokeError::IncompleteSpeedUp("updated recipient")));

        deposit.updated_recipient = Some(UniversalAddress::zero(AddressFamily::Evm));
        let error = populate_fill_relay(&deposit, &relayer, None).expect_err("zero recipient");
        assert!(matches!(error, SpokeError::IncompleteSpeedUp("updated recipient")));

        deposit.updated_recipient = Some(relayer.clone());
        deposit.updated_output_amount = Some(U256::from(2));
        deposit.updated_message = Some(Bytes::new());
        let calldata = populate_fill_relay(&deposit, &relayer, Some(42161)).expect("calldata");
        let decoded =
            fillRelayWithUpdatedDepositCall::abi_decode(&calldata).expect("speed-up calldata");
        assert_eq!(decoded.repaymentChainId, U256::from(42161));
        assert_eq!(decoded.updatedOutputAmount, U256::from(2));
        assert_eq!(decoded.updatedRecipient, relayer.to_bytes32());
        assert_eq!(decoded.depositorSignature, Bytes::from_static(b"\x01\x02"));
    }

    #[test]
    fn search_config_splits_ranges() {
        let config = EventSearchConfig {
            from_block: 0,
            to_block: 1_000,
            max_block_lookback: 400,
        };
        assert_eq!(config.ranges(), vec![(0, 399), (400, 799), (800, 1_000)]);

        let single = EventSearchConfig {
            from_block: 5,
            to_block: 10,
            max_block_lookback: 0,
        };
        assert_eq!(single.ranges(), vec![(5, 10)]);

        let exact = EventSearchConfig {
            from_block: 0,
            to_block: 799,
            max_block_lookback: 400,
        };
        assert_eq!(exact.ranges(), vec![(0, 399), (400, 799)]);
    }

    #[tokio::test]
    async fn paginated_query_concatenates_sub_queries() {
        let mock = Arc::new(
            MockTransport::new("https://node.example/rpc").with_handler(|method, params| {
                assert_eq!(method, "eth_getLogs");
                let filter = params.get(0).expect("filter");
                let from = filter
                    .get("fromBlock")
                    .and_then(Value::as_str)
                    .expect("fromBlock");
                let from = parse_quantity(from).map_err(RpcError::Codec)?;
                // One log per sub-query, positioned at the range start.
                Ok(json!([{
                    "address": "0x5c7bcd6e7de5423a257d81b442095a1a6ced35c5",
                    "topics": [],
                    "data": "0x",
                    "blockNumber": format_quantity(from.max(1)),
                    "transactionIndex": "0x0",
                    "logIndex": "0x0",
                    "transactionHash":
                        "0x1111111111111111111111111111111111111111111111111111111111111111"
                }]))
            }),
        );
        let client = EvmClient::new(Arc::clone(&mock) as Arc<dyn Transport>);
        let logs = paginated_event_query(
            &client,
            &json!({"address": "0x5c7bcd6e7de5423a257d81b442095a1a6ced35c5"}),
            EventSearchConfig {
                from_block: 0,
                to_block: 1_000,
                max_block_lookback: 400,
            },
        )
        .await
        .expect("paginated");
        assert_eq!(logs.len(), 3);
        assert_eq!(mock.calls_for("eth_getLogs"), 3);

        let error = paginated_event_query(
            &client,
            &json!({}),
            EventSearchConfig {
                from_block: 10,
                to_block: 5,
                max_block_lookback: 0,
            },
        )
        .await
        .expect_err("inverted range");
        assert!(matches!(error, SpokeError::Rpc(RpcError::Validation(_))));
    }

    #[test]
    fn funds_deposited_logs_decode_into_deposits() {
        let event = FundsDeposited {
            inputToken: B256::repeat_byte(1),
            outputToken: B256::repeat_byte(2),
            inputAmount: U256::from(1_000),
            outputAmount: U256::from(990),
            destinationChainId: U256::from(10),
            depositId: U256::from(77),
            quoteTimestamp: 1_700_000_000,
            fillDeadline: 1_700_100_000,
            exclusivityDeadline: 0,
            depositor: B256::repeat_byte(3),
            recipient: B256::repeat_byte(4),
            exclusiveRelayer: B256::ZERO,
            message: Bytes::new(),
        };
        let log = SortableLog {
            meta: EventMeta {
                block_number: 123,
                transaction_index: 0,
                log_index: 1,
                transaction_hash: B256::repeat_byte(9),
            },
            address: POOL,
            inner: event.encode_log_data(),
        };
        let deposits = decode_funds_deposited(1, &[log]).expect("decodable");
        assert_eq!(deposits.len(), 1);
        let (meta, deposit) = &deposits[0];
        assert_eq!(meta.block_number, 123);
        assert_eq!(deposit.destination_chain_id, 10);
        assert_eq!(deposit.relay_data.deposit_id, U256::from(77));
        assert_eq!(deposit.relay_data.origin_chain_id, U256::from(1));
        assert_eq!(
            deposit.relay_data.depositor.to_bytes32(),
            B256::repeat_byte(3)
        );
    }
}

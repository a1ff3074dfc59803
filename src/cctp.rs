//! CCTP pipeline: burn discovery, attestation polling, classification, and
//! finalization calldata.
//!
//! USDC crosses chains by burning at the source and minting at the
//! destination once Circle attests to the burn. This module walks that
//! lifecycle: find `DepositForBurn` events, poll Circle's attestation API
//! under its rate limit, classify each burn as pending / ready / finalized
//! against the destination `MessageTransmitter`, and produce the
//! `receiveMessage` calldata for the ready ones.

use alloy_primitives::{Address as Bytes20, B256, Bytes, U256, keccak256};
use alloy_sol_types::{SolCall, SolEvent, SolValue, sol};
use futures_util::future::join_all;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

use crate::address::UniversalAddress;
use crate::spoke::{EventSearchConfig, paginated_event_query};
use crate::transport::{BlockTag, EvmClient, RpcError};
use crate::types::{CodecError, SortableLog, parse_hex_bytes};

/// v1 TokenMessenger events.
mod v1 {
    use alloy_sol_types::sol;

    sol! {
        event DepositForBurn(
            uint64 indexed nonce,
            address indexed burnToken,
            uint256 amount,
            address indexed depositor,
            bytes32 mintRecipient,
            uint32 destinationDomain,
            bytes32 destinationTokenMessenger,
            bytes32 destinationCaller
        );
    }
}

/// v2 TokenMessenger events. Same name, different parameter list, so the
/// topic hash differs from v1.
mod v2 {
    use alloy_sol_types::sol;

    sol! {
        event DepositForBurn(
            address indexed burnToken,
            uint256 amount,
            address indexed depositor,
            bytes32 mintRecipient,
            uint32 destinationDomain,
            bytes32 destinationTokenMessenger,
            bytes32 destinationCaller,
            uint256 maxFee,
            uint32 indexed minFinalityThreshold,
            bytes hookData
        );
    }
}

sol! {
    /// Emitted by the MessageTransmitter of both versions with an identical
    /// topic; only the version word inside the payload disambiguates.
    event MessageSent(bytes message);

    function receiveMessage(bytes message, bytes attestation) external returns (bool success);

    function usedNonces(bytes32 nonceHash) external view returns (uint256);
}

/// Topic-0 of the v1 `DepositForBurn` event.
pub fn deposit_for_burn_topic_v1() -> B256 {
    v1::DepositForBurn::SIGNATURE_HASH
}

/// Topic-0 of the v2 `DepositForBurn` event.
pub fn deposit_for_burn_topic_v2() -> B256 {
    v2::DepositForBurn::SIGNATURE_HASH
}

/// Topic-0 of `MessageSent`, shared by both versions.
pub fn message_sent_topic() -> B256 {
    MessageSent::SIGNATURE_HASH
}

/// Errors from the CCTP pipeline.
#[derive(Debug, thiserror::Error)]
pub enum CctpError {
    #[error("attestation API request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("attestation API answered {status}: {body}")]
    Api { status: u16, body: String },
    #[error("malformed CCTP message: {0}")]
    MalformedMessage(String),
    #[error("unsupported CCTP message version word {0}")]
    UnsupportedVersion(u32),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Rpc(#[from] RpcError),
}

/// A decoded CCTP burn message.
///
/// Offsets follow Circle's fixed layout; the deposit-for-burn body starts
/// at offset 116 with its own version word.
#[derive(Debug, Clone)]
pub struct CctpMessage {
    /// 1 or 2, from the version word at the head of the payload.
    pub cctp_version: u8,
    pub source_domain: u32,
    pub destination_domain: u32,
    pub sender: B256,
    pub recipient: B256,
    pub mint_recipient: B256,
    pub burn_token: B256,
    pub amount: U256,
    pub message_bytes: Bytes,
    pub message_hash: B256,
    /// v1 only; v2 nonces are assigned by the attestation service.
    pub nonce: Option<u64>,
    /// v1 only: `keccak256(abi.encode(sourceDomain, nonce))`.
    pub nonce_hash: Option<B256>,
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_be_bytes(word)
}

fn read_u64(bytes: &[u8], offset: usize) -> u64 {
    let mut word = [0u8; 8];
    word.copy_from_slice(&bytes[offset..offset + 8]);
    u64::from_be_bytes(word)
}

fn read_b256(bytes: &[u8], offset: usize) -> B256 {
    B256::from_slice(&bytes[offset..offset + 32])
}

/// Minimum length covering the burn body fields this pipeline reads.
const MIN_BURN_MESSAGE_LEN: usize = 248;

/// Decode a raw CCTP burn message from its fixed byte layout.
pub fn decode_cctp_message(message_bytes: &[u8]) -> Result<CctpMessage, CctpError> {
    if message_bytes.len() < MIN_BURN_MESSAGE_LEN {
        return Err(CctpError::MalformedMessage(format!(
            "{} bytes is shorter than a burn message",
            message_bytes.len()
        )));
    }
    let version_word = read_u32(message_bytes, 0);
    let cctp_version = match version_word {
        0 => 1,
        1 => 2,
        other => return Err(CctpError::UnsupportedVersion(other)),
    };
    let source_domain = read_u32(message_bytes, 4);
    let destination_domain = read_u32(message_bytes, 8);
    let (nonce, nonce_hash) = if cctp_version == 1 {
        let nonce = read_u64(message_bytes, 12);
        let encoded = (source_domain, nonce).abi_encode_params();
        (Some(nonce), Some(keccak256(encoded)))
    } else {
        (None, None)
    };
    Ok(CctpMessage {
        cctp_version,
        source_domain,
        destination_domain,
        sender: read_b256(message_bytes, 20),
        recipient: read_b256(message_bytes, 52),
        burn_token: read_b256(message_bytes, 120),
        mint_recipient: read_b256(message_bytes, 152),
        amount: U256::from_be_slice(&message_bytes[184..216]),
        message_bytes: Bytes::copy_from_slice(message_bytes),
        message_hash: keccak256(message_bytes),
        nonce,
        nonce_hash,
    })
}

/// Discover `DepositForBurn` events (either version) sent by one of the
/// given depositors, mapping transaction hash to destination domain.
pub async fn discover_deposit_for_burn(
    client: &EvmClient,
    token_messenger: Bytes20,
    senders: &[UniversalAddress],
    config: EventSearchConfig,
) -> Result<HashMap<B256, u32>, CctpError> {
    let filter = json!({
        "address": format!("{token_messenger}"),
        "topics": [[
            format!("{}", deposit_for_burn_topic_v1()),
            format!("{}", deposit_for_burn_topic_v2()),
        ]],
    });
    let logs = paginated_event_query(client, &filter, config)
        .await
        .map_err(|err| match err {
            crate::spoke::SpokeError::Rpc(rpc) => CctpError::Rpc(rpc),
            other => CctpError::MalformedMessage(other.to_string()),
        })?;

    let sender_keys: Vec<B256> = senders.iter().map(UniversalAddress::to_bytes32).collect();
    let mut burns = HashMap::new();
    for log in &logs {
        let Some((depositor, destination_domain)) = decode_burn_event(log) else {
            continue;
        };
        let depositor_key = UniversalAddress::from(depositor).to_bytes32();
        if !sender_keys.contains(&depositor_key) {
            continue;
        }
        burns.insert(log.meta.transaction_hash, destination_domain);
    }
    Ok(burns)
}

fn decode_burn_event(log: &SortableLog) -> Option<(Bytes20, u32)> {
    match log.inner.topics().first() {
        Some(topic) if *topic == deposit_for_burn_topic_v1() => {
            let event = v1::DepositForBurn::decode_log_data(&log.inner).ok()?;
            Some((event.depositor, event.destinationDomain))
        }
        Some(topic) if *topic == deposit_for_burn_topic_v2() => {
            let event = v2::DepositForBurn::decode_log_data(&log.inner).ok()?;
            Some((event.depositor, event.destinationDomain))
        }
        _ => None,
    }
}

/// Attestation entries per transaction, as Circle's v2 messages endpoint
/// returns them.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationMessage {
    #[serde(default)]
    pub attestation: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub event_nonce: Option<String>,
    #[serde(default)]
    pub cctp_version: Option<u8>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    messages: Vec<AttestationMessage>,
}

/// One row of the burn fee schedule.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BurnFee {
    pub finality_threshold: u32,
    #[serde(default)]
    pub minimum_fee: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FastBurnAllowanceResponse {
    allowance: f64,
}

/// v1 attestation body.
#[derive(Debug, Clone, Deserialize)]
pub struct V1Attestation {
    #[serde(default)]
    pub attestation: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Transaction hashes queried per burst against the attestation API.
const ATTESTATION_CHUNK_SIZE: usize = 8;
/// Pause between bursts, keeping the client inside Circle's 35 req/s limit.
const ATTESTATION_CHUNK_PAUSE: Duration = Duration::from_secs(1);

/// Client for Circle's attestation REST API.
pub struct CctpApiClient {
    http: reqwest::Client,
    base: Url,
    chunk_pause: Duration,
}

impl CctpApiClient {
    /// Point at the production or sandbox API host.
    pub fn new(production: bool) -> Self {
        let base = if production {
            "https://iris-api.circle.com"
        } else {
            "https://iris-api-sandbox.circle.com"
        };
        Self {
            http: reqwest::Client::new(),
            base: Url::parse(base).expect("static API host"),
            chunk_pause: ATTESTATION_CHUNK_PAUSE,
        }
    }

    /// Point at an arbitrary host, for tests and proxies.
    pub fn with_base_url(base: Url) -> Self {
        Self {
            http: reqwest::Client::new(),
            base,
            chunk_pause: ATTESTATION_CHUNK_PAUSE,
        }
    }

    /// Override the inter-chunk pause. Tests set this to zero.
    pub fn with_chunk_pause(mut self, pause: Duration) -> Self {
        self.chunk_pause = pause;
        self
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T, CctpError> {
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CctpError::Api {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        Ok(response.json().await?)
    }

    /// `GET /v2/messages/{sourceDomainId}?transactionHash={tx}`.
    pub async fn get_messages(
        &self,
        source_domain: u32,
        tx_hash: B256,
    ) -> Result<Vec<AttestationMessage>, CctpError> {
        let mut url = self
            .base
            .join(&format!("/v2/messages/{source_domain}"))
            .map_err(|err| CctpError::MalformedMessage(err.to_string()))?;
        url.query_pairs_mut()
            .append_pair("transactionHash", &format!("{tx_hash}"));
        let response: MessagesResponse = self.get_json(url).await?;
        Ok(response.messages)
    }

    /// Poll attestations for many transactions, in chunks of 8 with a
    /// one-second pause after each chunk.
    pub async fn poll_attestations(
        &self,
        source_domain: u32,
        tx_hashes: &[B256],
    ) -> Result<HashMap<B256, Vec<AttestationMessage>>, CctpError> {
        let mut attestations = HashMap::new();
        for chunk in tx_hashes.chunks(ATTESTATION_CHUNK_SIZE) {
            let fetches = chunk
                .iter()
                .map(|tx_hash| async move {
                    (*tx_hash, self.get_messages(source_domain, *tx_hash).await)
                });
            for (tx_hash, result) in join_all(fetches).await {
                attestations.insert(tx_hash, result?);
            }
            tokio::time::sleep(self.chunk_pause).await;
        }
        Ok(attestations)
    }

    /// `GET /attestations/{messageHash}` — the v1 attestation endpoint.
    pub async fn get_v1_attestation(&self, message_hash: B256) -> Result<V1Attestation, CctpError> {
        let url = self
            .base
            .join(&format!("/attestations/{message_hash}"))
            .map_err(|err| CctpError::MalformedMessage(err.to_string()))?;
        self.get_json(url).await
    }

    /// `GET /v2/burn/USDC/fees/{srcDomain}/{dstDomain}`.
    ///
    /// The schedule includes rows for both fast (threshold 1000) and
    /// standard (threshold 2000) finality.
    pub async fn get_burn_fees(
        &self,
        source_domain: u32,
        destination_domain: u32,
    ) -> Result<Vec<BurnFee>, CctpError> {
        let url = self
            .base
            .join(&format!(
                "/v2/burn/USDC/fees/{source_domain}/{destination_domain}"
            ))
            .map_err(|err| CctpError::MalformedMessage(err.to_string()))?;
        self.get_json(url).await
    }

    /// `GET /v2/fastBurn/USDC/allowance`.
    pub async fn get_v2_fast_burn_allowance(&self) -> Result<f64, CctpError> {
        let url = self
            .base
            .join("/v2/fastBurn/USDC/allowance")
            .map_err(|err| CctpError::MalformedMessage(err.to_string()))?;
        let response: FastBurnAllowanceResponse = self.get_json(url).await?;
        Ok(response.allowance)
    }
}

/// Destination-chain MessageTransmitter reads.
#[derive(Clone)]
pub struct MessageTransmitter {
    client: EvmClient,
    address: Bytes20,
}

impl MessageTransmitter {
    pub fn new(client: EvmClient, address: Bytes20) -> Self {
        Self { client, address }
    }

    /// Whether a nonce hash has been consumed on the destination chain.
    pub async fn nonce_used(&self, nonce_hash: B256) -> Result<bool, CctpError> {
        let calldata = usedNoncesCall {
            nonceHash: nonce_hash,
        }
        .abi_encode();
        let raw = self
            .client
            .call(self.address, &calldata, BlockTag::Latest)
            .await?;
        let used = U256::abi_decode(&raw)
            .map_err(|err| RpcError::Logical(format!("usedNonces decode: {err}")))?;
        Ok(used == U256::from(1))
    }
}

/// Calldata finalizing a burn on the destination chain:
/// `receiveMessage(messageBytes, attestation)`.
pub fn encode_receive_message(message_bytes: &Bytes, attestation: &Bytes) -> Bytes {
    receiveMessageCall {
        message: message_bytes.clone(),
        attestation: attestation.clone(),
    }
    .abi_encode()
    .into()
}

/// A burn whose attestation is complete and not yet consumed on the
/// destination chain.
#[derive(Debug, Clone)]
pub struct ReadyDeposit {
    pub tx_hash: B256,
    pub message: CctpMessage,
    pub message_bytes: Bytes,
    pub attestation: Bytes,
}

/// Outcome of classifying every attestation of a burn search.
///
/// Each attestation lands in exactly one bucket; burns that fail the
/// version or party filters appear in none.
#[derive(Debug, Default)]
pub struct ClassifiedDeposits {
    pub pending_deposit_txn_hashes: Vec<B256>,
    pub ready_to_finalize_deposits: Vec<ReadyDeposit>,
    pub finalized_deposit_txn_hashes: Vec<B256>,
}

fn is_pending(entry: &AttestationMessage) -> bool {
    match &entry.attestation {
        None => true,
        Some(attestation) => {
            attestation == "PENDING"
                || entry.status.as_deref() == Some("pending_confirmations")
        }
    }
}

/// Classify polled attestations against the destination transmitter.
///
/// Pending: no attestation yet. Finalized: the nonce is already consumed on
/// the destination. Ready: attested and unconsumed, with the message and
/// attestation bytes attached for submission. Entries that are not CCTP v2
/// or whose sender and mint recipient match none of `expected_parties` are
/// dropped.
pub async fn classify_attestations(
    transmitter: &MessageTransmitter,
    attestations: &HashMap<B256, Vec<AttestationMessage>>,
    expected_parties: &[UniversalAddress],
) -> Result<ClassifiedDeposits, CctpError> {
    let party_keys: Vec<B256> = expected_parties
        .iter()
        .map(UniversalAddress::to_bytes32)
        .collect();
    let mut classified = ClassifiedDeposits::default();
    for (tx_hash, entries) in attestations {
        for entry in entries {
            if is_pending(entry) {
                classified.pending_deposit_txn_hashes.push(*tx_hash);
                continue;
            }
            let Some(raw_message) = &entry.message else {
                classified.pending_deposit_txn_hashes.push(*tx_hash);
                continue;
            };
            let message = decode_cctp_message(&parse_hex_bytes(raw_message)?)?;
            if entry.cctp_version.unwrap_or(message.cctp_version) != 2
                || message.cctp_version != 2
            {
                continue;
            }
            if !party_keys.contains(&message.sender)
                && !party_keys.contains(&message.mint_recipient)
            {
                continue;
            }
            let nonce_hash = match nonce_hash_of(&message, entry) {
                Some(nonce_hash) => nonce_hash,
                None => {
                    classified.pending_deposit_txn_hashes.push(*tx_hash);
                    continue;
                }
            };
            if transmitter.nonce_used(nonce_hash).await? {
                classified.finalized_deposit_txn_hashes.push(*tx_hash);
                continue;
            }
            let attestation = entry
                .attestation
                .as_deref()
                .map(parse_hex_bytes)
                .transpose()?
                .map(Bytes::from)
                .unwrap_or_default();
            classified.ready_to_finalize_deposits.push(ReadyDeposit {
                tx_hash: *tx_hash,
                message_bytes: message.message_bytes.clone(),
                attestation,
                message,
            });
        }
    }
    Ok(classified)
}

/// Nonce hash keying `usedNonces`: derived from the payload for v1, issued
/// by the attestation service for v2.
fn nonce_hash_of(message: &CctpMessage, entry: &AttestationMessage) -> Option<B256> {
    if let Some(nonce_hash) = message.nonce_hash {
        return Some(nonce_hash);
    }
    let raw = entry.event_nonce.as_deref()?;
    let bytes = parse_hex_bytes(raw).ok()?;
    (bytes.len() == 32).then(|| B256::from_slice(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Transport;
    use crate::transport::testing::MockTransport;
    use serde_json::Value;
    use std::sync::Arc;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SENDER: B256 = B256::repeat_byte(0xAA);
    const MINT_RECIPIENT: B256 = B256::repeat_byte(0xBB);

    /// Assemble a burn message with the fixed layout offsets.
    fn burn_message(version_word: u32, source_domain: u32, nonce: u64) -> Vec<u8> {
        let mut bytes = vec![0u8; MIN_BURN_MESSAGE_LEN];
        bytes[0..4].copy_from_slice(&version_word.to_be_bytes());
        bytes[4..8].copy_from_slice(&source_domain.to_be_bytes());
        bytes[8..12].copy_from_slice(&3u32.to_be_bytes());
        bytes[12..20].copy_from_slice(&nonce.to_be_bytes());
        bytes[20..52].copy_from_slice(SENDER.as_slice());
        bytes[52..84].copy_from_slice(&[0x11; 32]);
        bytes[120..152].copy_from_slice(&[0x22; 32]);
        bytes[152..184].copy_from_slice(MINT_RECIPIENT.as_slice());
        bytes[184..216].copy_from_slice(&U256::from(5_000_000u64).to_be_bytes::<32>());
        bytes
    }

    #[test]
    fn v1_messages_decode_with_nonce_hash() {
        let raw = burn_message(0, 6, 42);
        let message = decode_cctp_message(&raw).expect("well-formed v1");
        assert_eq!(message.cctp_version, 1);
        assert_eq!(message.source_domain, 6);
        assert_eq!(message.destination_domain, 3);
        assert_eq!(message.nonce, Some(42));
        assert_eq!(message.sender, SENDER);
        assert_eq!(message.mint_recipient, MINT_RECIPIENT);
        assert_eq!(message.amount, U256::from(5_000_000u64));
        assert_eq!(message.message_hash, keccak256(&raw));

        let expected_nonce_hash = keccak256((6u32, 42u64).abi_encode_params());
        assert_eq!(message.nonce_hash, Some(expected_nonce_hash));
    }

    #[test]
    fn v2_messages_decode_without_payload_nonce() {
        let raw = burn_message(1, 0, 0);
        let message = decode_cctp_message(&raw).expect("well-formed v2");
        assert_eq!(message.cctp_version, 2);
        assert_eq!(message.nonce, None);
        assert_eq!(message.nonce_hash, None);
    }

    #[test]
    fn unknown_versions_and_short_payloads_error() {
        assert!(matches!(
            decode_cctp_message(&burn_message(7, 0, 0)),
            Err(CctpError::UnsupportedVersion(7))
        ));
        assert!(matches!(
            decode_cctp_message(&[0u8; 100]),
            Err(CctpError::MalformedMessage(_))
        ));
    }

    #[test]
    fn burn_topics_differ_across_versions_but_message_sent_is_shared() {
        assert_ne!(deposit_for_burn_topic_v1(), deposit_for_burn_topic_v2());
        // MessageSent has one declaration; both transmitters emit it with
        // the same signature, so there is exactly one topic to filter on.
        assert_eq!(message_sent_topic(), MessageSent::SIGNATURE_HASH);
    }

    fn expected_parties() -> Vec<UniversalAddress> {
        vec![
            UniversalAddress::raw(SENDER.as_slice()).expect("32 bytes"),
        ]
    }

    fn attestation_entry(
        message: &[u8],
        attestation: Option<&str>,
        status: Option<&str>,
        event_nonce: Option<&str>,
    ) -> AttestationMessage {
        AttestationMessage {
            attestation: attestation.map(str::to_owned),
            message: Some(alloy_primitives::hex::encode_prefixed(message)),
            event_nonce: event_nonce.map(str::to_owned),
            cctp_version: Some(2),
            status: status.map(str::to_owned),
        }
    }

    fn transmitter_with_used(used: bool) -> (Arc<MockTransport>, MessageTransmitter) {
        let word = if used { 1u64 } else { 0 };
        let mock = Arc::new(
            MockTransport::new("https://dest.example/rpc").with_handler(move |_, _| {
                Ok(json!(alloy_primitives::hex::encode_prefixed(
                    U256::from(word).to_be_bytes::<32>()
                )))
            }),
        );
        let transmitter = MessageTransmitter::new(
            EvmClient::new(Arc::clone(&mock) as Arc<dyn Transport>),
            alloy_primitives::address!("0x0a992d191DEeC32aFe36203Ad87D7d289a738F81"),
        );
        (mock, transmitter)
    }

    #[tokio::test]
    async fn classification_buckets_are_exclusive() {
        // Three burns in one transaction: two attested v2, one pending.
        let raw = burn_message(1, 0, 0);
        let nonce_hex = format!("0x{}", "11".repeat(32));
        let entries = vec![
            attestation_entry(&raw, Some("0xdeadbeef"), Some("complete"), Some(&nonce_hex)),
            attestation_entry(&raw, Some("0xdeadbeef"), Some("complete"), Some(&nonce_hex)),
            attestation_entry(&raw, Some("0xdeadbeef"), Some("pending_confirmations"), None),
        ];
        let mut attestations = HashMap::new();
        attestations.insert(B256::repeat_byte(0x01), entries);

        let (_, transmitter) = transmitter_with_used(false);
        let classified = classify_attestations(&transmitter, &attestations, &expected_parties())
            .await
            .expect("classified");
        assert_eq!(classified.ready_to_finalize_deposits.len(), 2);
        assert_eq!(classified.pending_deposit_txn_hashes.len(), 1);
        assert!(classified.finalized_deposit_txn_hashes.is_empty());

        let ready = &classified.ready_to_finalize_deposits[0];
        assert_eq!(ready.attestation, Bytes::from_static(&[0xde, 0xad, 0xbe, 0xef]));
        assert_eq!(ready.message_bytes, Bytes::from(raw.clone()));
    }

    #[tokio::test]
    async fn consumed_nonces_classify_as_finalized() {
        let raw = burn_message(1, 0, 0);
        let nonce_hex = format!("0x{}", "11".repeat(32));
        let mut attestations = HashMap::new();
        attestations.insert(
            B256::repeat_byte(0x02),
            vec![attestation_entry(
                &raw,
                Some("0xdeadbeef"),
                Some("complete"),
                Some(&nonce_hex),
            )],
        );
        let (_, transmitter) = transmitter_with_used(true);
        let classified = classify_attestations(&transmitter, &attestations, &expected_parties())
            .await
            .expect("classified");
        assert_eq!(classified.finalized_deposit_txn_hashes.len(), 1);
        assert!(classified.ready_to_finalize_deposits.is_empty());
        assert!(classified.pending_deposit_txn_hashes.is_empty());
    }

    #[tokio::test]
    async fn literal_pending_attestations_stay_pending() {
        let raw = burn_message(1, 0, 0);
        let mut attestations = HashMap::new();
        attestations.insert(
            B256::repeat_byte(0x03),
            vec![attestation_entry(&raw, Some("PENDING"), None, None)],
        );
        let (mock, transmitter) = transmitter_with_used(false);
        let classified = classify_attestations(&transmitter, &attestations, &expected_parties())
            .await
            .expect("classified");
        assert_eq!(classified.pending_deposit_txn_hashes.len(), 1);
        assert_eq!(mock.call_count(), 0, "pending burns never hit the chain");
    }

    #[tokio::test]
    async fn wrong_version_and_unknown_parties_are_dropped() {
        let v1_raw = burn_message(0, 0, 9);
        let mut v1_entry = attestation_entry(&v1_raw, Some("0x01"), Some("complete"), None);
        v1_entry.cctp_version = Some(1);

        let stranger = {
            let mut raw = burn_message(1, 0, 0);
            raw[20..52].copy_from_slice(&[0x99; 32]);
            raw[152..184].copy_from_slice(&[0x98; 32]);
            raw
        };
        let nonce_hex = format!("0x{}", "11".repeat(32));
        let stranger_entry =
            attestation_entry(&stranger, Some("0x01"), Some("complete"), Some(&nonce_hex));

        let mut attestations = HashMap::new();
        attestations.insert(B256::repeat_byte(0x04), vec![v1_entry, stranger_entry]);
        let (_, transmitter) = transmitter_with_used(false);
        let classified = classify_attestations(&transmitter, &attestations, &expected_parties())
            .await
            .expect("classified");
        assert!(classified.pending_deposit_txn_hashes.is_empty());
        assert!(classified.ready_to_finalize_deposits.is_empty());
        assert!(classified.finalized_deposit_txn_hashes.is_empty());
    }

    #[test]
    fn receive_message_calldata_round_trips() {
        let message = Bytes::from(burn_message(1, 0, 0));
        let attestation = Bytes::from_static(&[0xde, 0xad]);
        let calldata = encode_receive_message(&message, &attestation);
        let decoded = receiveMessageCall::abi_decode(&calldata).expect("calldata");
        assert_eq!(decoded.message, message);
        assert_eq!(decoded.attestation, attestation);
    }

    #[tokio::test]
    async fn discovery_maps_transactions_to_destination_domains() {
        let depositor = alloy_primitives::address!("0x9A8f92a830A5cB89a3816e3D267CB7791c16b04D");
        let other = alloy_primitives::address!("0x1111111111111111111111111111111111111111");
        let messenger = alloy_primitives::address!("0xBd3fa81B58Ba92a82136038B25aDec7066af3155");

        let v1_event = v1::DepositForBurn {
            nonce: 7,
            burnToken: other,
            amount: U256::from(1),
            depositor,
            mintRecipient: B256::ZERO,
            destinationDomain: 6,
            destinationTokenMessenger: B256::ZERO,
            destinationCaller: B256::ZERO,
        };
        let v2_event = v2::DepositForBurn {
            burnToken: other,
            amount: U256::from(2),
            depositor: other,
            mintRecipient: B256::ZERO,
            destinationDomain: 3,
            destinationTokenMessenger: B256::ZERO,
            destinationCaller: B256::ZERO,
            maxFee: U256::ZERO,
            minFinalityThreshold: 2000,
            hookData: Bytes::new(),
        };

        fn log_json(address: Bytes20, data: alloy_primitives::LogData, tx: B256, index: u64) -> Value {
            json!({
                "address": format!("{address}"),
                "topics": data
                    .topics()
                    .iter()
                    .map(|topic| format!("{topic}"))
                    .collect::<Vec<_>>(),
                "data": alloy_primitives::hex::encode_prefixed(&data.data),
                "blockNumber": "0x10",
                "transactionIndex": "0x0",
                "logIndex": crate::types::format_quantity(index),
                "transactionHash": format!("{tx}"),
            })
        }

        let v1_log = log_json(messenger, v1_event.encode_log_data(), B256::repeat_byte(0x05), 0);
        let v2_log = log_json(messenger, v2_event.encode_log_data(), B256::repeat_byte(0x06), 1);
        let mock = Arc::new(
            MockTransport::new("https://origin.example/rpc").with_handler(move |method, _| {
                assert_eq!(method, "eth_getLogs");
                Ok(json!([v1_log.clone(), v2_log.clone()]))
            }),
        );
        let client = EvmClient::new(Arc::clone(&mock) as Arc<dyn Transport>);
        let senders = vec![UniversalAddress::from(depositor)];
        let burns = discover_deposit_for_burn(
            &client,
            messenger,
            &senders,
            EventSearchConfig {
                from_block: 0,
                to_block: 100,
                max_block_lookback: 0,
            },
        )
        .await
        .expect("discovery");
        // Only the v1 burn came from a tracked sender.
        assert_eq!(burns.len(), 1);
        assert_eq!(burns.get(&B256::repeat_byte(0x05)), Some(&6));
    }

    #[tokio::test]
    async fn attestation_polling_chunks_requests() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/messages/6"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "messages": [{
                    "attestation": "PENDING",
                    "cctpVersion": 2
                }]
            })))
            .expect(20)
            .mount(&server)
            .await;

        let api = CctpApiClient::with_base_url(Url::parse(&server.uri()).expect("uri"))
            .with_chunk_pause(Duration::ZERO);
        let tx_hashes: Vec<B256> = (0..20u8).map(B256::repeat_byte).collect();
        let attestations = api
            .poll_attestations(6, &tx_hashes)
            .await
            .expect("polled");
        assert_eq!(attestations.len(), 20);
        assert!(attestations.values().all(|entries| entries.len() == 1));
    }

    #[tokio::test]
    async fn messages_endpoint_carries_the_transaction_hash() {
        let server = MockServer::start().await;
        let tx_hash = B256::repeat_byte(0x07);
        Mock::given(method("GET"))
            .and(path("/v2/messages/0"))
            .and(query_param("transactionHash", format!("{tx_hash}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"messages": []})))
            .expect(1)
            .mount(&server)
            .await;
        let api = CctpApiClient::with_base_url(Url::parse(&server.uri()).expect("uri"));
        let messages = api.get_messages(0, tx_hash).await.expect("empty result");
        assert!(messages.is_empty());
    }

    #[tokio::test]
    async fn fee_and_allowance_endpoints_deserialize() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/burn/USDC/fees/0/6"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"finalityThreshold": 1000, "minimumFee": 1},
                {"finalityThreshold": 2000, "minimumFee": 0}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/fastBurn/USDC/allowance"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"allowance": 1000000.5})),
            )
            .mount(&server)
            .await;

        let api = CctpApiClient::with_base_url(Url::parse(&server.uri()).expect("uri"));
        let fees = api.get_burn_fees(0, 6).await.expect("fees");
        assert_eq!(fees.len(), 2);
        assert!(fees.iter().any(|fee| fee.finality_threshold == 1000));
        assert!(fees.iter().any(|fee| fee.finality_threshold == 2000));

        let allowance = api.get_v2_fast_burn_allowance().await.expect("allowance");
        assert!((allowance - 1_000_000.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn api_errors_surface_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Message not found"))
            .mount(&server)
            .await;
        let api = CctpApiClient::with_base_url(Url::parse(&server.uri()).expect("uri"));
        let error = api
            .get_messages(0, B256::ZERO)
            .await
            .expect_err("404 surfaces");
        match error {
            CctpError::Api { status, body } => {
                assert_eq!(status, 404);
                assert!(body.contains("not found"));
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn parties_can_match_on_mint_recipient() {
        let parties = vec![
            UniversalAddress::raw(MINT_RECIPIENT.as_slice()).expect("32 bytes")
        ];
        let raw = burn_message(1, 0, 0);
        let message = decode_cctp_message(&raw).expect("v2");
        let keys: Vec<B256> = parties.iter().map(UniversalAddress::to_bytes32).collect();
        assert!(!keys.contains(&message.sender));
        assert!(keys.contains(&message.mint_recipient));
    }
}

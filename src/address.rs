//! Universal address model over a 32-byte canonical buffer.
//!
//! Bridge contracts pass every address as `bytes32`, while users and
//! explorers expect the family-native rendering: checksummed 20-byte hex on
//! EVM chains, Base58 on Solana. [`UniversalAddress`] stores the canonical
//! 32 bytes once, tags them with the family they were validated for, and
//! projects the other views on demand.

use alloy_primitives::{Address as Bytes20, B256, U256};
use once_cell::sync::OnceCell;
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};

use crate::network::{ChainFamily, chain_family};

/// Address family an address was validated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    /// EVM address: the canonical buffer is a 20-byte address left-padded
    /// with 12 zero bytes.
    Evm,
    /// Solana address: a full 32-byte ed25519 public key.
    Svm,
    /// Unvalidated 32-byte value. Renders as raw hex.
    Raw,
}

/// Errors produced when constructing or projecting a [`UniversalAddress`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("address buffer of {0} bytes exceeds 32 bytes")]
    TooLong(usize),
    #[error("not coercible to a 20-byte EVM address: {0}")]
    NotEvm(String),
    #[error("32-byte value with a 12-zero-byte prefix is not a valid Solana address: {0}")]
    EvmCollision(String),
    #[error("invalid hex address string: {0}")]
    InvalidHex(String),
    #[error("invalid base58 address string: {0}")]
    InvalidBase58(String),
}

/// A 32-byte canonical address tagged with its validated family.
///
/// Shorter input buffers are left-padded with zeros; no stored buffer ever
/// exceeds 32 bytes. The bytes32 view is eager; the Base58 rendering is
/// computed on first access and memoized.
#[derive(Debug, Clone)]
pub struct UniversalAddress {
    family: AddressFamily,
    bytes: [u8; 32],
    base58: OnceCell<String>,
}

impl UniversalAddress {
    fn left_padded(input: &[u8]) -> Result<[u8; 32], AddressError> {
        if input.len() > 32 {
            return Err(AddressError::TooLong(input.len()));
        }
        let mut bytes = [0u8; 32];
        bytes[32 - input.len()..].copy_from_slice(input);
        Ok(bytes)
    }

    /// Construct an EVM address from a 20- or 32-byte buffer.
    ///
    /// A 32-byte buffer must carry a 12-zero-byte prefix; anything shorter
    /// than 20 bytes is left-padded first, as contracts do.
    pub fn evm(input: &[u8]) -> Result<Self, AddressError> {
        let bytes = Self::left_padded(input)?;
        if bytes[..12].iter().any(|b| *b != 0) {
            return Err(AddressError::NotEvm(alloy_primitives::hex::encode_prefixed(
                bytes,
            )));
        }
        Ok(Self {
            family: AddressFamily::Evm,
            bytes,
            base58: OnceCell::new(),
        })
    }

    /// Construct a Solana address from a 32-byte public key.
    ///
    /// Values with a 12-zero-byte prefix are rejected as EVM collisions,
    /// except the all-zero address, which Solana programs use as a sentinel.
    pub fn svm(input: &[u8]) -> Result<Self, AddressError> {
        let bytes = Self::left_padded(input)?;
        let zero_prefixed = bytes[..12].iter().all(|b| *b == 0);
        let all_zero = bytes.iter().all(|b| *b == 0);
        if zero_prefixed && !all_zero {
            return Err(AddressError::EvmCollision(
                alloy_primitives::hex::encode_prefixed(bytes),
            ));
        }
        Ok(Self {
            family: AddressFamily::Svm,
            bytes,
            base58: OnceCell::new(),
        })
    }

    /// Construct an address with no family validation.
    pub fn raw(input: &[u8]) -> Result<Self, AddressError> {
        Ok(Self {
            family: AddressFamily::Raw,
            bytes: Self::left_padded(input)?,
            base58: OnceCell::new(),
        })
    }

    /// Parse a string, auto-detecting the encoding per family default.
    ///
    /// Strings with a `0x` prefix decode as hex, anything else as Base58.
    /// The decoded bytes still pass the family validation of [`Self::evm`] /
    /// [`Self::svm`] / [`Self::raw`].
    pub fn parse(input: &str, family: AddressFamily) -> Result<Self, AddressError> {
        let bytes = if let Some(hex_str) = input.strip_prefix("0x") {
            alloy_primitives::hex::decode(hex_str)
                .map_err(|_| AddressError::InvalidHex(input.to_string()))?
        } else {
            bs58::decode(input)
                .into_vec()
                .map_err(|_| AddressError::InvalidBase58(input.to_string()))?
        };
        match family {
            AddressFamily::Evm => Self::evm(&bytes),
            AddressFamily::Svm => Self::svm(&bytes),
            AddressFamily::Raw => Self::raw(&bytes),
        }
    }

    /// The family this address was validated for.
    pub fn family(&self) -> AddressFamily {
        self.family
    }

    /// The canonical 32-byte buffer.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// The 32-byte view, used for hashing and on-chain lookups.
    pub fn to_bytes32(&self) -> B256 {
        B256::from(self.bytes)
    }

    /// The 20-byte EVM view.
    ///
    /// Only valid when the canonical buffer carries a 12-zero-byte prefix.
    pub fn truncate_to_bytes20(&self) -> Result<Bytes20, AddressError> {
        if self.bytes[..12].iter().any(|b| *b != 0) {
            return Err(AddressError::NotEvm(alloy_primitives::hex::encode_prefixed(
                self.bytes,
            )));
        }
        Ok(Bytes20::from_slice(&self.bytes[12..]))
    }

    /// The Base58 rendering of the canonical 32 bytes, memoized.
    pub fn to_base58(&self) -> &str {
        self.base58
            .get_or_init(|| bs58::encode(&self.bytes).into_string())
    }

    /// The canonical buffer as an unsigned 256-bit integer.
    pub fn to_big_integer(&self) -> U256 {
        U256::from_be_bytes(self.bytes)
    }

    /// The family-native rendering: checksummed 20-byte hex for EVM, Base58
    /// for SVM, 32-byte hex for raw addresses.
    pub fn to_native(&self) -> String {
        match self.family {
            AddressFamily::Evm => match self.truncate_to_bytes20() {
                Ok(address) => address.to_checksum(None),
                // Unreachable for validated EVM addresses; render canonically.
                Err(_) => alloy_primitives::hex::encode_prefixed(self.bytes),
            },
            AddressFamily::Svm => self.to_base58().to_string(),
            AddressFamily::Raw => alloy_primitives::hex::encode_prefixed(self.bytes),
        }
    }

    /// Whether every canonical byte is zero.
    pub fn is_zero_address(&self) -> bool {
        self.bytes.iter().all(|b| *b == 0)
    }

    /// Whether this address is usable on the given chain.
    ///
    /// Raw addresses carry no validation and are usable nowhere until
    /// re-tagged.
    pub fn is_valid_on(&self, chain_id: u64) -> bool {
        match self.family {
            AddressFamily::Evm => chain_family(chain_id) == ChainFamily::Evm,
            AddressFamily::Svm => chain_family(chain_id) == ChainFamily::Svm,
            AddressFamily::Raw => false,
        }
    }

    /// The all-zero address under the given family tag.
    pub fn zero(family: AddressFamily) -> Self {
        Self {
            family,
            bytes: [0u8; 32],
            base58: OnceCell::new(),
        }
    }
}

impl From<Bytes20> for UniversalAddress {
    fn from(address: Bytes20) -> Self {
        let mut bytes = [0u8; 32];
        bytes[12..].copy_from_slice(address.as_slice());
        Self {
            family: AddressFamily::Evm,
            bytes,
            base58: OnceCell::new(),
        }
    }
}

impl From<B256> for UniversalAddress {
    fn from(value: B256) -> Self {
        Self {
            family: AddressFamily::Raw,
            bytes: value.0,
            base58: OnceCell::new(),
        }
    }
}

// Equality and ordering are numeric on the bytes32 view; the family tag is
// a validation record, not part of the value.
impl PartialEq for UniversalAddress {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl Eq for UniversalAddress {}

impl PartialOrd for UniversalAddress {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for UniversalAddress {
    fn cmp(&self, other: &Self) -> Ordering {
        self.bytes.cmp(&other.bytes)
    }
}

impl Hash for UniversalAddress {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bytes.hash(state);
    }
}

impl Display for UniversalAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_native())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    const PAYER: Bytes20 = address!("0x9A8f92a830A5cB89a3816e3D267CB7791c16b04D");

    #[test]
    fn evm_round_trip_preserves_checksum() {
        let universal = UniversalAddress::evm(PAYER.as_slice()).expect("20-byte input");
        let bytes32 = universal.to_bytes32();
        let reparsed = UniversalAddress::evm(bytes32.as_slice()).expect("zero-prefixed 32 bytes");
        assert_eq!(reparsed.to_native(), PAYER.to_checksum(None));
        assert_eq!(reparsed, universal);
    }

    #[test]
    fn evm_rejects_nonzero_prefix() {
        let mut bytes = [0u8; 32];
        bytes[0] = 1;
        assert!(matches!(
            UniversalAddress::evm(&bytes),
            Err(AddressError::NotEvm(_))
        ));
    }

    #[test]
    fn svm_rejects_evm_collision_but_permits_zero() {
        let mut collision = [0u8; 32];
        collision[31] = 7;
        assert!(matches!(
            UniversalAddress::svm(&collision),
            Err(AddressError::EvmCollision(_))
        ));
        let zero = UniversalAddress::svm(&[0u8; 32]).expect("all-zero is permitted");
        assert!(zero.is_zero_address());
    }

    #[test]
    fn svm_base58_round_trip_is_identity() {
        let mut bytes = [0u8; 32];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = (i as u8) + 1;
        }
        let universal = UniversalAddress::svm(&bytes).expect("no zero prefix");
        let encoded = universal.to_base58().to_string();
        let reparsed = UniversalAddress::parse(&encoded, AddressFamily::Svm).expect("base58");
        assert_eq!(reparsed.as_bytes(), &bytes);
        assert_eq!(reparsed.to_native(), encoded);
    }

    #[test]
    fn short_buffers_left_pad() {
        let universal = UniversalAddress::raw(&[0xff]).expect("1 byte");
        assert_eq!(universal.to_big_integer(), U256::from(0xffu64));
        assert!(matches!(
            UniversalAddress::raw(&[0u8; 33]),
            Err(AddressError::TooLong(33))
        ));
    }

    #[test]
    fn ordering_is_numeric_on_bytes32() {
        let small = UniversalAddress::raw(&[1]).expect("raw");
        let large = UniversalAddress::raw(&[2]).expect("raw");
        assert!(small < large);
        assert_eq!(
            UniversalAddress::raw(&[1]).expect("raw"),
            UniversalAddress::evm(&[1]).expect("evm")
        );
    }

    #[test]
    fn validity_follows_chain_family() {
        use crate::network::chain_ids;
        let evm = UniversalAddress::from(PAYER);
        assert!(evm.is_valid_on(chain_ids::MAINNET));
        assert!(!evm.is_valid_on(chain_ids::SOLANA));

        let mut bytes = [7u8; 32];
        bytes[0] = 9;
        let svm = UniversalAddress::svm(&bytes).expect("svm");
        assert!(svm.is_valid_on(chain_ids::SOLANA));
        assert!(!svm.is_valid_on(chain_ids::BASE));

        let raw = UniversalAddress::raw(&bytes).expect("raw");
        assert!(!raw.is_valid_on(chain_ids::MAINNET));
    }

    #[test]
    fn parse_auto_detects_encoding() {
        let hex_form = format!("0x{}", alloy_primitives::hex::encode(PAYER.as_slice()));
        let parsed = UniversalAddress::parse(&hex_form, AddressFamily::Evm).expect("hex");
        assert_eq!(parsed.truncate_to_bytes20().expect("evm view"), PAYER);

        assert!(matches!(
            UniversalAddress::parse("0xzz", AddressFamily::Evm),
            Err(AddressError::InvalidHex(_))
        ));
        assert!(matches!(
            UniversalAddress::parse("0OlI", AddressFamily::Svm),
            Err(AddressError::InvalidBase58(_))
        ));
    }
}

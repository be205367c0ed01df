//! Validated primitive types for domain entities.
//!
//! These newtypes provide:
//! - Type safety (can't accidentally pass a hash as an address)
//! - Validation at construction time
//! - Domain semantics in function signatures
//!
//! All identity strings in the pipeline are lowercase hex; the constructors
//! normalize so comparisons and storage keys never depend on caller casing.
//! Wei and gas amounts are carried as decimal strings end to end and only
//! become `BigDecimal` at the database boundary.

use std::fmt;
use std::str::FromStr;

use alloy::primitives::{Address, B256};
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// ETHEREUM ADDRESS
// ═══════════════════════════════════════════════════════════════════════════════

/// Validated 20-byte Ethereum address.
///
/// This newtype ensures addresses are always exactly 20 bytes. Use `Address`
/// from `alloy-primitives` for on-chain interaction, but this type for
/// persistence and domain logic. Rendering is always lowercase hex with a
/// `0x` prefix, which is the identity key for contracts and wallets.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EthAddress([u8; 20]);

impl EthAddress {
    /// Create from a fixed-size array (infallible).
    #[must_use]
    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Try to create from a byte slice.
    ///
    /// # Errors
    /// Returns `InvalidAddress::WrongLength` if the slice is not exactly 20 bytes.
    pub fn from_slice(slice: &[u8]) -> Result<Self, InvalidAddress> {
        let bytes: [u8; 20] = slice
            .try_into()
            .map_err(|_| InvalidAddress::WrongLength(slice.len()))?;
        Ok(Self(bytes))
    }

    /// Parse from hex string (with or without 0x prefix, any casing).
    ///
    /// # Errors
    /// Returns `InvalidAddress` if the string is not valid hex or wrong length.
    pub fn from_hex(s: &str) -> Result<Self, InvalidAddress> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        if s.len() != 40 {
            return Err(InvalidAddress::WrongLength(s.len() / 2));
        }
        let bytes = hex::decode(s).map_err(|_| InvalidAddress::InvalidHex)?;
        Self::from_slice(&bytes)
    }

    /// Get the underlying bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Convert to lowercase hex string with 0x prefix.
    #[must_use]
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Check if this is the zero address.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// The zero address (0x0000...0000).
    pub const ZERO: Self = Self([0u8; 20]);
}

impl fmt::Debug for EthAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EthAddress({})", self.to_hex())
    }
}

impl fmt::Display for EthAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<EthAddress> for String {
    fn from(addr: EthAddress) -> Self {
        addr.to_hex()
    }
}

impl TryFrom<String> for EthAddress {
    type Error = InvalidAddress;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_hex(&s)
    }
}

impl TryFrom<&str> for EthAddress {
    type Error = InvalidAddress;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::from_hex(s)
    }
}

impl From<[u8; 20]> for EthAddress {
    fn from(bytes: [u8; 20]) -> Self {
        Self::new(bytes)
    }
}

impl From<Address> for EthAddress {
    fn from(addr: Address) -> Self {
        Self::new(addr.0.0)
    }
}

impl From<EthAddress> for Address {
    fn from(addr: EthAddress) -> Self {
        Self::from(addr.0)
    }
}

/// Error for invalid Ethereum addresses.
#[derive(Debug, Clone, Error)]
pub enum InvalidAddress {
    /// Address has wrong byte length.
    #[error("wrong length: expected 20 bytes, got {0}")]
    WrongLength(usize),
    /// Address contains invalid hex characters.
    #[error("invalid hex encoding")]
    InvalidHex,
}

// ═══════════════════════════════════════════════════════════════════════════════
// TRANSACTION HASH
// ═══════════════════════════════════════════════════════════════════════════════

/// Validated 32-byte transaction hash.
///
/// The primary key of base and enrichment rows. Rendering is lowercase hex
/// with a `0x` prefix.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TxHash([u8; 32]);

impl TxHash {
    /// Create from a fixed-size array (infallible).
    #[must_use]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parse from hex string (with or without 0x prefix, any casing).
    ///
    /// # Errors
    /// Returns `InvalidHash` if the string is not valid hex or wrong length.
    pub fn from_hex(s: &str) -> Result<Self, InvalidHash> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        if s.len() != 64 {
            return Err(InvalidHash::WrongLength(s.len() / 2));
        }
        let bytes = hex::decode(s).map_err(|_| InvalidHash::InvalidHex)?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| InvalidHash::WrongLength(s.len() / 2))?;
        Ok(Self(arr))
    }

    /// Get the underlying bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to lowercase hex string with 0x prefix.
    #[must_use]
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxHash({})", self.to_hex())
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<TxHash> for String {
    fn from(hash: TxHash) -> Self {
        hash.to_hex()
    }
}

impl TryFrom<String> for TxHash {
    type Error = InvalidHash;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_hex(&s)
    }
}

impl TryFrom<&str> for TxHash {
    type Error = InvalidHash;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::from_hex(s)
    }
}

impl From<B256> for TxHash {
    fn from(hash: B256) -> Self {
        Self::new(hash.0)
    }
}

impl From<TxHash> for B256 {
    fn from(hash: TxHash) -> Self {
        Self::from(hash.0)
    }
}

/// Error for invalid transaction hashes.
#[derive(Debug, Clone, Error)]
pub enum InvalidHash {
    /// Hash has wrong byte length.
    #[error("wrong length: expected 32 bytes, got {0}")]
    WrongLength(usize),
    /// Hash contains invalid hex characters.
    #[error("invalid hex encoding")]
    InvalidHex,
}

// ═══════════════════════════════════════════════════════════════════════════════
// BLOCK NUMBER
// ═══════════════════════════════════════════════════════════════════════════════

/// Block number newtype.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct BlockNumber(u64);

impl BlockNumber {
    /// Create a new block number.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the underlying value.
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }

    /// The next block.
    #[must_use]
    pub const fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for BlockNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for BlockNumber {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// WEI AMOUNT
// ═══════════════════════════════════════════════════════════════════════════════

/// Unsigned wei (or gas) amount carried as a decimal string.
///
/// The upstream reports every monetary and gas field as a decimal string,
/// and the pipeline never converts through floating point. This type
/// validates digits-only content at construction and converts to
/// `BigDecimal` only when binding a NUMERIC column.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WeiAmount(String);

impl WeiAmount {
    /// Zero.
    #[must_use]
    pub fn zero() -> Self {
        Self("0".into())
    }

    /// Validate and wrap a decimal string.
    ///
    /// Leading zeros are stripped so equal amounts compare equal.
    ///
    /// # Errors
    /// Returns `InvalidAmount` if the string is empty or contains a
    /// non-digit character (signs and decimal points included; wei is
    /// integral and unsigned).
    pub fn parse(s: &str) -> Result<Self, InvalidAmount> {
        if s.is_empty() {
            return Err(InvalidAmount::Empty);
        }
        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(InvalidAmount::NotDecimal(s.to_string()));
        }
        let trimmed = s.trim_start_matches('0');
        Ok(Self(if trimmed.is_empty() {
            "0".into()
        } else {
            trimmed.into()
        }))
    }

    /// The decimal string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check if this amount is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == "0"
    }

    /// Convert to `BigDecimal` for a NUMERIC column binding.
    #[must_use]
    pub fn to_bigdecimal(&self) -> BigDecimal {
        // Construction guarantees digits-only content, so this cannot fail.
        BigDecimal::from_str(&self.0).unwrap_or_else(|_| BigDecimal::from(0))
    }

    /// Convert a NUMERIC column value back into a wei amount.
    ///
    /// Fractional parts cannot occur for wei columns; any scale present is
    /// normalized away.
    #[must_use]
    pub fn from_bigdecimal(value: &BigDecimal) -> Self {
        let normalized = value.normalized();
        Self(normalized.with_scale(0).to_string())
    }
}

impl fmt::Debug for WeiAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WeiAmount({})", self.0)
    }
}

impl fmt::Display for WeiAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<WeiAmount> for String {
    fn from(amount: WeiAmount) -> Self {
        amount.0
    }
}

impl TryFrom<String> for WeiAmount {
    type Error = InvalidAmount;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl TryFrom<&str> for WeiAmount {
    type Error = InvalidAmount;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl From<u64> for WeiAmount {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

/// Error for invalid wei amounts.
#[derive(Debug, Clone, Error)]
pub enum InvalidAmount {
    /// Empty string.
    #[error("empty amount")]
    Empty,
    /// Non-digit content.
    #[error("not an unsigned decimal: {0}")]
    NotDecimal(String),
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn address_round_trip() {
        let addr = EthAddress::from_hex("0xAbCdEf0123456789abcdef0123456789ABCDEF01").unwrap();
        assert_eq!(addr.to_hex(), "0xabcdef0123456789abcdef0123456789abcdef01");
    }

    #[test]
    fn address_rejects_bad_input() {
        assert!(EthAddress::from_hex("0x1234").is_err());
        assert!(EthAddress::from_hex("0xzz_def0123456789abcdef0123456789abcdef01").is_err());
    }

    #[test]
    fn address_alloy_interop() {
        let addr = EthAddress::from_hex("0x00000000000000000000000000000000000000ff").unwrap();
        let alloy: Address = addr.into();
        let back: EthAddress = alloy.into();
        assert_eq!(addr, back);
    }

    #[test]
    fn hash_round_trip() {
        let hex = "0x00112233445566778899aabbccddeeff00112233445566778899aabbccddeeff";
        let hash = TxHash::from_hex(hex).unwrap();
        assert_eq!(hash.to_hex(), hex);
    }

    #[test]
    fn hash_normalizes_casing() {
        let upper = TxHash::from_hex(
            "0x00112233445566778899AABBCCDDEEFF00112233445566778899AABBCCDDEEFF",
        )
        .unwrap();
        let lower = TxHash::from_hex(
            "0x00112233445566778899aabbccddeeff00112233445566778899aabbccddeeff",
        )
        .unwrap();
        assert_eq!(upper, lower);
    }

    #[test]
    fn hash_rejects_wrong_length() {
        assert!(TxHash::from_hex("0xabcd").is_err());
    }

    #[test]
    fn block_number_next() {
        assert_eq!(BlockNumber::new(41).next(), BlockNumber::new(42));
    }

    #[test]
    fn wei_amount_parses_and_normalizes() {
        let amount = WeiAmount::parse("0001000000000000000000").unwrap();
        assert_eq!(amount.as_str(), "1000000000000000000");
        assert!(!amount.is_zero());
    }

    #[test]
    fn wei_amount_zero() {
        assert!(WeiAmount::parse("0").unwrap().is_zero());
        assert!(WeiAmount::parse("0000").unwrap().is_zero());
        assert!(WeiAmount::zero().is_zero());
    }

    #[test]
    fn wei_amount_rejects_non_decimal() {
        assert!(WeiAmount::parse("").is_err());
        assert!(WeiAmount::parse("-5").is_err());
        assert!(WeiAmount::parse("1.5").is_err());
        assert!(WeiAmount::parse("0x10").is_err());
    }

    #[test]
    fn wei_amount_preserves_precision_beyond_f64() {
        // 2^80 has no exact f64 representation; the string must survive.
        let big = "1208925819614629174706176";
        let amount = WeiAmount::parse(big).unwrap();
        assert_eq!(amount.as_str(), big);
        assert_eq!(WeiAmount::from_bigdecimal(&amount.to_bigdecimal()), amount);
    }
}

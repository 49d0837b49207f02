//! # Core Ledger Types
//!
//! The handful of primitive types every other module speaks in. Amounts and
//! rates are plain `u128` aliases so arithmetic stays explicit (`checked_*`
//! everywhere); identities get a proper newtype because mixing them up with
//! raw byte arrays is how funds end up in the wrong place.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Quantity of ledger units in the smallest denomination.
pub type Amount = u128;

/// Interest accrued per unit principal per second, scaled by
/// [`SCALE`](crate::math::SCALE).
pub type Rate = u128;

/// Unix timestamp in whole seconds.
pub type Timestamp = u64;

/// Sentinel amount meaning "the holder's full effective balance".
///
/// Only adapters and `transfer`/`transfer_from` interpret it. Passing it to
/// a raw `burn` is treated as a literal (and will fail).
pub const MAX_AMOUNT: Amount = Amount::MAX;

/// Numeric identifier of a ledger instance on the cross-chain boundary.
pub type ChainSelector = u64;

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// Length of a holder address in bytes.
pub const ADDRESS_LENGTH: usize = 20;

/// Errors produced when parsing an [`Address`] from text.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    /// The input was not valid hexadecimal.
    #[error("invalid hex in address: {0}")]
    InvalidHex(String),

    /// The decoded input had the wrong number of bytes.
    #[error("address must be {expected} bytes, got {got}")]
    InvalidLength {
        /// Required byte length.
        expected: usize,
        /// Byte length actually decoded.
        got: usize,
    },
}

/// A 20-byte holder identity.
///
/// Rendered as `0x`-prefixed lowercase hex. Parsing accepts the prefix or
/// its absence. [`Address::ZERO`] is reserved: it stands for "nobody" in
/// events and is never a valid holder.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; ADDRESS_LENGTH]);

impl Address {
    /// The all-zero address.
    pub const ZERO: Self = Self([0u8; ADDRESS_LENGTH]);

    /// Wraps raw bytes.
    pub const fn new(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Deterministic address for tests, fixtures and well-known system
    /// accounts: the last byte is `tag`, everything else zero except a
    /// leading marker so it never collides with [`Address::ZERO`].
    pub const fn from_tag(tag: u8) -> Self {
        let mut bytes = [0u8; ADDRESS_LENGTH];
        bytes[0] = 0xA0;
        bytes[ADDRESS_LENGTH - 1] = tag;
        Self(bytes)
    }

    /// Derives an address from an arbitrary label by hashing it with BLAKE3
    /// and keeping the first 20 bytes.
    pub fn from_label(label: &str) -> Self {
        let digest = blake3::hash(label.as_bytes());
        let mut bytes = [0u8; ADDRESS_LENGTH];
        bytes.copy_from_slice(&digest.as_bytes()[..ADDRESS_LENGTH]);
        Self(bytes)
    }

    /// Raw bytes of this address.
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
        &self.0
    }

    /// Returns `true` for [`Address::ZERO`].
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; ADDRESS_LENGTH]
    }

    /// `0x`-prefixed lowercase hex.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Builds an address from a byte slice of exactly 20 bytes.
    pub fn try_from_slice(bytes: &[u8]) -> Result<Self, AddressError> {
        let array: [u8; ADDRESS_LENGTH] =
            bytes.try_into().map_err(|_| AddressError::InvalidLength {
                expected: ADDRESS_LENGTH,
                got: bytes.len(),
            })?;
        Ok(Self(array))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let raw = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        let bytes = hex::decode(raw).map_err(|e| AddressError::InvalidHex(e.to_string()))?;
        Self::try_from_slice(&bytes)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_with_and_without_prefix() {
        let a: Address = "0x00000000000000000000000000000000000000ff".parse().unwrap();
        let b: Address = "00000000000000000000000000000000000000ff".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_bytes()[19], 0xff);
    }

    #[test]
    fn display_is_prefixed_lowercase_hex() {
        let a = Address::from_tag(0xAB);
        assert_eq!(a.to_string(), "0xa0000000000000000000000000000000000000ab");
    }

    #[test]
    fn wrong_length_rejected() {
        let err = "0xdeadbeef".parse::<Address>().unwrap_err();
        assert_eq!(
            err,
            AddressError::InvalidLength {
                expected: 20,
                got: 4
            }
        );
    }

    #[test]
    fn bad_hex_rejected() {
        assert!(matches!(
            "0xzz".parse::<Address>(),
            Err(AddressError::InvalidHex(_))
        ));
    }

    #[test]
    fn tagged_addresses_are_never_zero() {
        assert!(!Address::from_tag(0).is_zero());
        assert!(Address::ZERO.is_zero());
    }

    #[test]
    fn labels_are_deterministic() {
        assert_eq!(Address::from_label("vault"), Address::from_label("vault"));
        assert_ne!(Address::from_label("vault"), Address::from_label("pool"));
    }

    #[test]
    fn serde_uses_hex_string() {
        let a = Address::from_tag(7);
        let json = serde_json::to_string(&a).unwrap();
        assert_eq!(json, format!("\"{}\"", a.to_hex()));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, a);

        let bytes = bincode::serialize(&a).unwrap();
        let back: Address = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back, a);
    }
}

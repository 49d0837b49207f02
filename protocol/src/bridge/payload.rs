//! Bridge message envelope and the rate word it carries.
//!
//! The envelope is bincode. The holder's frozen rate rides in `pool_data` as
//! a single 32-byte big-endian word, laid out exactly like an ABI-encoded
//! `uint256`, so a pool on a chain that speaks ABI can decode it unchanged.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{BRIDGE_PAYLOAD_VERSION, MAX_BRIDGE_MESSAGE_BYTES, RATE_WORD_LENGTH};
use crate::types::{Address, Amount, ChainSelector, Rate};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from encoding or decoding bridge payloads.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PayloadError {
    /// Encoded envelope exceeds [`MAX_BRIDGE_MESSAGE_BYTES`].
    #[error("bridge message too large: {len} bytes (max {max})")]
    TooLarge {
        /// Size of the input.
        len: usize,
        /// Configured limit.
        max: usize,
    },

    /// Envelope bytes did not decode.
    #[error("malformed bridge message: {0}")]
    Malformed(String),

    /// The envelope was produced by an incompatible pool.
    #[error("unsupported payload version: expected {expected}, got {got}")]
    UnsupportedVersion {
        /// Version this build speaks.
        expected: u8,
        /// Version found in the message.
        got: u8,
    },

    /// `pool_data` was not exactly one word.
    #[error("rate word must be {expected} bytes, got {got}")]
    RateWordLength {
        /// Required length.
        expected: usize,
        /// Length received.
        got: usize,
    },

    /// The rate word holds a value above `u128::MAX`.
    #[error("rate word does not fit in 128 bits")]
    RateOverflow,
}

// ---------------------------------------------------------------------------
// Rate word
// ---------------------------------------------------------------------------

/// Encodes `rate` as a 32-byte big-endian word.
pub fn encode_rate(rate: Rate) -> [u8; RATE_WORD_LENGTH] {
    let mut word = [0u8; RATE_WORD_LENGTH];
    word[RATE_WORD_LENGTH - 16..].copy_from_slice(&rate.to_be_bytes());
    word
}

/// Decodes a 32-byte big-endian word. The upper 16 bytes must be zero.
pub fn decode_rate(word: &[u8]) -> Result<Rate, PayloadError> {
    if word.len() != RATE_WORD_LENGTH {
        return Err(PayloadError::RateWordLength {
            expected: RATE_WORD_LENGTH,
            got: word.len(),
        });
    }
    let (high, low) = word.split_at(RATE_WORD_LENGTH - 16);
    if high.iter().any(|b| *b != 0) {
        return Err(PayloadError::RateOverflow);
    }
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(low);
    Ok(Rate::from_be_bytes(bytes))
}

// ---------------------------------------------------------------------------
// BridgeMessage
// ---------------------------------------------------------------------------

/// One outbound transfer, as it travels between two ledger instances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeMessage {
    /// Envelope layout version.
    pub version: u8,
    /// Chain the units were burned on.
    pub source_chain: ChainSelector,
    /// Chain that should mint them.
    pub dest_chain: ChainSelector,
    /// Pool that burned the units.
    pub source_pool: Address,
    /// Per-pool outbound sequence number.
    pub nonce: u64,
    /// Holder whose frozen rate is carried.
    pub original_sender: Address,
    /// Holder to mint to on the destination.
    pub receiver: Address,
    /// Units burned on the source.
    pub amount: Amount,
    /// The sender's rate as one ABI word.
    pub pool_data: Vec<u8>,
}

impl BridgeMessage {
    /// Builds a message at the current payload version.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source_chain: ChainSelector,
        dest_chain: ChainSelector,
        source_pool: Address,
        nonce: u64,
        original_sender: Address,
        receiver: Address,
        amount: Amount,
        rate: Rate,
    ) -> Self {
        Self {
            version: BRIDGE_PAYLOAD_VERSION,
            source_chain,
            dest_chain,
            source_pool,
            nonce,
            original_sender,
            receiver,
            amount,
            pool_data: encode_rate(rate).to_vec(),
        }
    }

    /// The carried rate.
    pub fn rate(&self) -> Result<Rate, PayloadError> {
        decode_rate(&self.pool_data)
    }

    /// Serializes the envelope.
    pub fn encode(&self) -> Result<Vec<u8>, PayloadError> {
        let bytes = bincode::serialize(self).map_err(|e| PayloadError::Malformed(e.to_string()))?;
        if bytes.len() > MAX_BRIDGE_MESSAGE_BYTES {
            return Err(PayloadError::TooLarge {
                len: bytes.len(),
                max: MAX_BRIDGE_MESSAGE_BYTES,
            });
        }
        Ok(bytes)
    }

    /// Parses and validates an envelope: size limit, layout, version and a
    /// well-formed rate word.
    pub fn decode(bytes: &[u8]) -> Result<Self, PayloadError> {
        if bytes.len() > MAX_BRIDGE_MESSAGE_BYTES {
            return Err(PayloadError::TooLarge {
                len: bytes.len(),
                max: MAX_BRIDGE_MESSAGE_BYTES,
            });
        }
        let message: BridgeMessage =
            bincode::deserialize(bytes).map_err(|e| PayloadError::Malformed(e.to_string()))?;
        if message.version != BRIDGE_PAYLOAD_VERSION {
            return Err(PayloadError::UnsupportedVersion {
                expected: BRIDGE_PAYLOAD_VERSION,
                got: message.version,
            });
        }
        message.rate()?;
        Ok(message)
    }

    /// BLAKE3 digest of the encoded envelope.
    pub fn message_id(&self) -> Result<[u8; 32], PayloadError> {
        Ok(*blake3::hash(&self.encode()?).as_bytes())
    }

    /// [`message_id`](Self::message_id) as lowercase hex.
    pub fn message_id_hex(&self) -> Result<String, PayloadError> {
        Ok(hex::encode(self.message_id()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> BridgeMessage {
        BridgeMessage::new(
            1,
            2,
            Address::from_tag(0x50),
            7,
            Address::from_tag(1),
            Address::from_tag(2),
            1_000,
            50_000_000_000,
        )
    }

    #[test]
    fn rate_word_is_big_endian_uint256() {
        let word = encode_rate(0x0102);
        assert_eq!(word.len(), 32);
        assert!(word[..30].iter().all(|b| *b == 0));
        assert_eq!(&word[30..], &[0x01, 0x02]);
        assert_eq!(decode_rate(&word).unwrap(), 0x0102);
    }

    #[test]
    fn rate_word_rejects_wrong_length() {
        assert_eq!(
            decode_rate(&[0u8; 31]),
            Err(PayloadError::RateWordLength { expected: 32, got: 31 })
        );
    }

    #[test]
    fn rate_word_rejects_values_above_u128() {
        let mut word = [0u8; 32];
        word[15] = 1;
        assert_eq!(decode_rate(&word), Err(PayloadError::RateOverflow));
    }

    #[test]
    fn envelope_survives_encoding() {
        let msg = sample();
        let decoded = BridgeMessage::decode(&msg.encode().unwrap()).unwrap();
        assert_eq!(decoded, msg);
        assert_eq!(decoded.rate().unwrap(), 50_000_000_000);
    }

    #[test]
    fn version_mismatch_rejected() {
        let mut msg = sample();
        msg.version = BRIDGE_PAYLOAD_VERSION + 1;
        let bytes = bincode::serialize(&msg).unwrap();
        assert!(matches!(
            BridgeMessage::decode(&bytes),
            Err(PayloadError::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn truncated_envelope_is_malformed() {
        let bytes = sample().encode().unwrap();
        assert!(matches!(
            BridgeMessage::decode(&bytes[..bytes.len() / 2]),
            Err(PayloadError::Malformed(_))
        ));
    }

    #[test]
    fn bad_pool_data_rejected_on_decode() {
        let mut msg = sample();
        msg.pool_data = vec![0xFF; 8];
        let bytes = bincode::serialize(&msg).unwrap();
        assert!(matches!(
            BridgeMessage::decode(&bytes),
            Err(PayloadError::RateWordLength { got: 8, .. })
        ));
    }

    #[test]
    fn message_id_depends_on_nonce() {
        let a = sample();
        let mut b = sample();
        b.nonce += 1;
        assert_ne!(a.message_id().unwrap(), b.message_id().unwrap());
        assert_eq!(a.message_id_hex().unwrap().len(), 64);
    }
}

//! In-memory message relay for tests and local simulation.
//!
//! A FIFO of encoded bridge messages. It gives no delivery guarantees, does
//! not deduplicate and does not persist; it exists so two ledgers in one
//! process can exchange the same bytes two chains would.

use std::collections::VecDeque;

use rebase_protocol::bridge::{BridgeMessage, PayloadError};
use rebase_protocol::ChainSelector;
use tracing::debug;

/// An encoded message waiting for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Destination chain, readable without decoding.
    pub dest_chain: ChainSelector,
    /// BLAKE3 id of `bytes`.
    pub message_id: [u8; 32],
    /// Encoded [`BridgeMessage`].
    pub bytes: Vec<u8>,
}

/// FIFO relay.
#[derive(Debug, Default)]
pub struct InMemoryRelay {
    queue: VecDeque<Envelope>,
}

impl InMemoryRelay {
    /// An empty relay.
    pub fn new() -> Self {
        Self::default()
    }

    /// Encodes and enqueues `message`. Returns its id.
    pub fn submit(&mut self, message: &BridgeMessage) -> Result<[u8; 32], PayloadError> {
        let bytes = message.encode()?;
        let message_id = message.message_id()?;
        debug!(
            dest_chain = message.dest_chain,
            nonce = message.nonce,
            id = %hex::encode(message_id),
            "relay accepted message"
        );
        self.queue.push_back(Envelope {
            dest_chain: message.dest_chain,
            message_id,
            bytes,
        });
        Ok(message_id)
    }

    /// Pops the oldest message, whatever its destination.
    pub fn deliver_next(&mut self) -> Option<Envelope> {
        self.queue.pop_front()
    }

    /// Pops the oldest message addressed to `chain`.
    pub fn deliver_next_to(&mut self, chain: ChainSelector) -> Option<Envelope> {
        let index = self.queue.iter().position(|e| e.dest_chain == chain)?;
        self.queue.remove(index)
    }

    /// Messages waiting.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use rebase_protocol::Address;

    use super::*;

    fn message(dest: ChainSelector, nonce: u64) -> BridgeMessage {
        BridgeMessage::new(
            1,
            dest,
            Address::from_tag(0x50),
            nonce,
            Address::from_tag(10),
            Address::from_tag(11),
            5,
            7,
        )
    }

    #[test]
    fn fifo_order() {
        let mut relay = InMemoryRelay::new();
        relay.submit(&message(2, 0)).unwrap();
        relay.submit(&message(2, 1)).unwrap();
        assert_eq!(relay.pending(), 2);

        let first = relay.deliver_next().unwrap();
        assert_eq!(BridgeMessage::decode(&first.bytes).unwrap().nonce, 0);
        assert_eq!(relay.pending(), 1);
    }

    #[test]
    fn delivery_by_destination() {
        let mut relay = InMemoryRelay::new();
        relay.submit(&message(2, 0)).unwrap();
        let id = relay.submit(&message(3, 1)).unwrap();

        let env = relay.deliver_next_to(3).unwrap();
        assert_eq!(env.message_id, id);
        assert_eq!(env.message_id, message(3, 1).message_id().unwrap());
        assert!(relay.deliver_next_to(3).is_none());
        assert_eq!(relay.pending(), 1);
    }
}

//! Token id recovery from the registration event.

use crate::abi::{self, event_topic};
use crate::error::Result;
use crate::gateway::TransactionReceipt;
use deedchain_types::{Address, TokenId};

/// Event emitted by `registerLand`.
pub const DEFAULT_REGISTERED_EVENT: &str = "PropertyRegistered(uint256,address,string)";

/// Matcher for the registration event from one contract.
#[derive(Debug, Clone)]
pub struct RegisteredEvent {
    contract: Address,
    topic: [u8; 32],
}

impl RegisteredEvent {
    pub fn new(contract: Address, signature: &str) -> Self {
        Self {
            contract,
            topic: event_topic(signature),
        }
    }

    pub fn topic(&self) -> &[u8; 32] {
        &self.topic
    }

    /// The token id carried by the first matching log, if any. The id is read
    /// from the first indexed topic, or from the first data word when the
    /// field is not indexed. `Ok(None)` means no usable event was emitted.
    pub fn token_id(&self, receipt: &TransactionReceipt) -> Result<Option<TokenId>> {
        let Some(log) = receipt
            .logs
            .iter()
            .find(|log| log.address == self.contract && log.topics.first() == Some(&self.topic))
        else {
            return Ok(None);
        };

        if let Some(indexed) = log.topics.get(1) {
            return abi::word_to_u64(indexed).map(|id| Some(TokenId(id)));
        }
        if log.data.len() >= 32 {
            return abi::decode_uint(&log.data).map(|id| Some(TokenId(id)));
        }
        Ok(None)
    }
}

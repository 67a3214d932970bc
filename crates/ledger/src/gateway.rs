//! Seam between the ledger client and a concrete chain connection.

use crate::abi::{self, Token};
use crate::error::Result;
use async_trait::async_trait;
use deedchain_types::{Address, ContentId, TokenId, TransactionHash, Wei};

pub const IS_CID_USED: &str = "isCIDUsed(string)";
pub const REGISTER_LAND: &str = "registerLand(string)";
pub const UPDATE_PROPERTY: &str = "updateProperty(uint256,string)";
pub const GET_NEXT_TOKEN_ID: &str = "getNextTokenId()";

/// State-changing calls on the property contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractCall {
    RegisterLand { cid: ContentId },
    UpdateProperty { token_id: TokenId, cid: ContentId },
}

impl ContractCall {
    pub fn signature(&self) -> &'static str {
        match self {
            ContractCall::RegisterLand { .. } => REGISTER_LAND,
            ContractCall::UpdateProperty { .. } => UPDATE_PROPERTY,
        }
    }

    pub fn cid(&self) -> &ContentId {
        match self {
            ContractCall::RegisterLand { cid } | ContractCall::UpdateProperty { cid, .. } => cid,
        }
    }

    /// ABI-encoded call data.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            ContractCall::RegisterLand { cid } => {
                abi::encode_call(REGISTER_LAND, &[Token::String(cid.as_str())])
            }
            ContractCall::UpdateProperty { token_id, cid } => abi::encode_call(
                UPDATE_PROPERTY,
                &[Token::Uint(token_id.0 as u128), Token::String(cid.as_str())],
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub address: Address,
    pub topics: Vec<[u8; 32]>,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionReceipt {
    pub transaction_hash: TransactionHash,
    pub success: bool,
    pub block_number: Option<u64>,
    pub gas_used: Option<u64>,
    pub logs: Vec<LogEntry>,
}

/// Chain operations the ledger client needs, bound to one funding account
/// and one contract.
#[async_trait]
pub trait ContractGateway: Send + Sync {
    /// Funding account address.
    fn account(&self) -> Address;

    /// Property contract address.
    fn contract(&self) -> Address;

    async fn balance(&self) -> Result<Wei>;

    async fn gas_price(&self) -> Result<Wei>;

    /// Simulate `call` from the funding account and return its gas.
    async fn estimate_gas(&self, call: &ContractCall) -> Result<u64>;

    async fn is_cid_used(&self, cid: &ContentId) -> Result<bool>;

    async fn next_token_id(&self) -> Result<u64>;

    /// Sign and broadcast `call`; returns once the node has accepted it.
    async fn submit(&self, call: &ContractCall) -> Result<TransactionHash>;

    /// Block until `hash` is included and return its receipt.
    async fn wait_for_receipt(&self, hash: &TransactionHash) -> Result<TransactionReceipt>;
}

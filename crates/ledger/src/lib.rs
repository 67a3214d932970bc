//! Ledger access for property registration: account funding checks,
//! duplicate probing and contract writes over Ethereum JSON-RPC.

pub mod abi;
pub mod client;
pub mod error;
pub mod event;
pub mod evm;
pub mod gateway;
pub mod rlp;
pub mod rpc;
pub mod signer;

pub use client::{LedgerClient, LedgerClientConfig, Registration, TokenIdSource};
pub use error::{LedgerError, Result};
pub use event::{RegisteredEvent, DEFAULT_REGISTERED_EVENT};
pub use evm::{EvmGateway, EvmGatewayConfig, DEFAULT_RECEIPT_POLL_INTERVAL};
pub use gateway::{ContractCall, ContractGateway, LogEntry, TransactionReceipt};
pub use rpc::JsonRpcClient;
pub use signer::{LegacyTransaction, LocalSigner};

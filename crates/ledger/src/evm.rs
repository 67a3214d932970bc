//! [`ContractGateway`] over an Ethereum JSON-RPC endpoint.

use crate::abi::{self, Token};
use crate::error::{LedgerError, Result};
use crate::gateway::{
    ContractCall, ContractGateway, LogEntry, TransactionReceipt, GET_NEXT_TOKEN_ID, IS_CID_USED,
};
use crate::rpc::{JsonRpcClient, NO_PARAMS};
use crate::signer::{LegacyTransaction, LocalSigner};
use async_trait::async_trait;
use deedchain_types::{parse_hex_u128, Address, ContentId, TransactionHash, Wei};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info};

pub const DEFAULT_RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct EvmGatewayConfig {
    pub rpc_url: String,
    pub contract: Address,
    /// Queried from the node when unset.
    pub chain_id: Option<u64>,
    pub receipt_poll_interval: Duration,
}

#[derive(Debug)]
pub struct EvmGateway {
    rpc: JsonRpcClient,
    signer: LocalSigner,
    contract: Address,
    chain_id: OnceCell<u64>,
    poll_interval: Duration,
}

#[derive(Serialize)]
struct CallObject {
    #[serde(skip_serializing_if = "Option::is_none")]
    from: Option<Address>,
    to: Address,
    data: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReceipt {
    transaction_hash: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    block_number: Option<String>,
    #[serde(default)]
    gas_used: Option<String>,
    #[serde(default)]
    logs: Vec<RawLog>,
}

#[derive(Deserialize)]
struct RawLog {
    address: String,
    #[serde(default)]
    topics: Vec<String>,
    #[serde(default)]
    data: String,
}

impl EvmGateway {
    pub fn new(config: EvmGatewayConfig, signer: LocalSigner) -> Result<Self> {
        Ok(Self::with_rpc_client(
            JsonRpcClient::new(&config.rpc_url)?,
            signer,
            config,
        ))
    }

    pub fn with_rpc_client(rpc: JsonRpcClient, signer: LocalSigner, config: EvmGatewayConfig) -> Self {
        let chain_id = match config.chain_id {
            Some(id) => OnceCell::new_with(Some(id)),
            None => OnceCell::new(),
        };
        Self {
            rpc,
            signer,
            contract: config.contract,
            chain_id,
            poll_interval: config.receipt_poll_interval,
        }
    }

    pub async fn chain_id(&self) -> Result<u64> {
        self.chain_id
            .get_or_try_init(|| async {
                let raw: String = self.rpc.request("eth_chainId", NO_PARAMS).await?;
                let id = parse_quantity_u64(&raw)?;
                debug!(chain_id = id, "resolved chain id");
                Ok::<u64, LedgerError>(id)
            })
            .await
            .copied()
    }

    async fn eth_call(&self, data: Vec<u8>) -> Result<Vec<u8>> {
        let call = CallObject {
            from: None,
            to: self.contract,
            data: encode_data(&data),
        };
        let raw: String = self.rpc.request("eth_call", (call, "latest")).await?;
        decode_data(&raw)
    }

    async fn nonce(&self) -> Result<u64> {
        let raw: String = self
            .rpc
            .request(
                "eth_getTransactionCount",
                (self.signer.address(), "pending"),
            )
            .await?;
        parse_quantity_u64(&raw)
    }

    async fn receipt(&self, hash: &TransactionHash) -> Result<Option<TransactionReceipt>> {
        let raw: Option<RawReceipt> = self
            .rpc
            .request("eth_getTransactionReceipt", [hash.to_hex()])
            .await?;
        raw.map(RawReceipt::into_receipt).transpose()
    }
}

#[async_trait]
impl ContractGateway for EvmGateway {
    fn account(&self) -> Address {
        self.signer.address()
    }

    fn contract(&self) -> Address {
        self.contract
    }

    async fn balance(&self) -> Result<Wei> {
        let raw: String = self
            .rpc
            .request("eth_getBalance", (self.signer.address(), "latest"))
            .await?;
        Wei::from_hex_quantity(&raw).map_err(LedgerError::decode)
    }

    async fn gas_price(&self) -> Result<Wei> {
        let raw: String = self.rpc.request("eth_gasPrice", NO_PARAMS).await?;
        Wei::from_hex_quantity(&raw).map_err(LedgerError::decode)
    }

    async fn estimate_gas(&self, call: &ContractCall) -> Result<u64> {
        let object = CallObject {
            from: Some(self.signer.address()),
            to: self.contract,
            data: encode_data(&call.encode()),
        };
        let raw: String = self.rpc.request("eth_estimateGas", [object]).await?;
        parse_quantity_u64(&raw)
    }

    async fn is_cid_used(&self, cid: &ContentId) -> Result<bool> {
        let data = abi::encode_call(IS_CID_USED, &[Token::String(cid.as_str())]);
        abi::decode_bool(&self.eth_call(data).await?)
    }

    async fn next_token_id(&self) -> Result<u64> {
        let data = abi::encode_call(GET_NEXT_TOKEN_ID, &[]);
        abi::decode_uint(&self.eth_call(data).await?)
    }

    async fn submit(&self, call: &ContractCall) -> Result<TransactionHash> {
        let (nonce, gas_price, gas_limit, chain_id) = tokio::try_join!(
            self.nonce(),
            self.gas_price(),
            self.estimate_gas(call),
            self.chain_id()
        )?;

        let tx = LegacyTransaction {
            nonce,
            gas_price,
            gas_limit,
            to: self.contract,
            value: Wei::zero(),
            data: call.encode(),
        };
        let raw = self.signer.sign_legacy(&tx, chain_id)?;
        let hash: String = self
            .rpc
            .request("eth_sendRawTransaction", [encode_data(&raw)])
            .await?;
        let hash: TransactionHash = hash.parse().map_err(LedgerError::decode)?;

        info!(
            %hash,
            nonce,
            gas_limit,
            gas_price = %gas_price,
            method = call.signature(),
            "transaction broadcast"
        );
        Ok(hash)
    }

    async fn wait_for_receipt(&self, hash: &TransactionHash) -> Result<TransactionReceipt> {
        loop {
            if let Some(receipt) = self.receipt(hash).await? {
                return Ok(receipt);
            }
            debug!(%hash, "receipt pending");
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

impl RawReceipt {
    fn into_receipt(self) -> Result<TransactionReceipt> {
        let logs = self
            .logs
            .into_iter()
            .map(|log| {
                let topics = log
                    .topics
                    .iter()
                    .map(|topic| decode_word(topic))
                    .collect::<Result<Vec<_>>>()?;
                Ok(LogEntry {
                    address: log.address.parse().map_err(LedgerError::decode)?,
                    topics,
                    data: decode_data(&log.data)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(TransactionReceipt {
            transaction_hash: self
                .transaction_hash
                .parse()
                .map_err(LedgerError::decode)?,
            // Pre-Byzantium receipts carry no status; treat them as successful.
            success: match self.status.as_deref() {
                Some(status) => parse_quantity_u64(status)? == 1,
                None => true,
            },
            block_number: self
                .block_number
                .as_deref()
                .map(parse_quantity_u64)
                .transpose()?,
            gas_used: self.gas_used.as_deref().map(parse_quantity_u64).transpose()?,
            logs,
        })
    }
}

fn encode_data(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

fn decode_data(raw: &str) -> Result<Vec<u8>> {
    let digits = raw.strip_prefix("0x").unwrap_or(raw);
    hex::decode(digits).map_err(|err| LedgerError::decode(format!("invalid hex data: {err}")))
}

fn decode_word(raw: &str) -> Result<[u8; 32]> {
    let bytes = decode_data(raw)?;
    bytes
        .try_into()
        .map_err(|bytes: Vec<u8>| LedgerError::decode(format!("topic has {} bytes", bytes.len())))
}

fn parse_quantity_u64(raw: &str) -> Result<u64> {
    let value = parse_hex_u128(raw).map_err(LedgerError::decode)?;
    u64::try_from(value).map_err(|_| LedgerError::decode(format!("quantity {raw} exceeds 64 bits")))
}

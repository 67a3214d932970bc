//! Funds checking, duplicate probing and contract writes for the
//! registration pipeline.

use crate::error::{LedgerError, Result};
use crate::event::{RegisteredEvent, DEFAULT_REGISTERED_EVENT};
use crate::gateway::{ContractCall, ContractGateway, TransactionReceipt};
use deedchain_types::{Address, ContentId, CostEstimate, RetryPolicy, TokenId, TransactionHash, Wei};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Ledger client settings.
#[derive(Debug, Clone)]
pub struct LedgerClientConfig {
    /// Signature of the event emitted on registration.
    pub registered_event: String,
    /// Policy for idempotent reads. Submissions are never retried.
    pub retry: RetryPolicy,
}

impl Default for LedgerClientConfig {
    fn default() -> Self {
        Self {
            registered_event: DEFAULT_REGISTERED_EVENT.to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Where a registration's token id came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenIdSource {
    Event,
    /// Inferred as `getNextTokenId() - 1` after confirmation.
    Counter,
}

/// A confirmed registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub transaction_hash: TransactionHash,
    pub token_id: TokenId,
    pub token_id_source: TokenIdSource,
}

#[derive(Clone)]
pub struct LedgerClient {
    gateway: Arc<dyn ContractGateway>,
    event: RegisteredEvent,
    retry: RetryPolicy,
}

impl LedgerClient {
    pub fn new(gateway: Arc<dyn ContractGateway>, config: LedgerClientConfig) -> Self {
        let event = RegisteredEvent::new(gateway.contract(), &config.registered_event);
        Self {
            gateway,
            event,
            retry: config.retry,
        }
    }

    /// Funding account address.
    pub fn address(&self) -> Address {
        self.gateway.account()
    }

    async fn read<T, F, Fut>(&self, label: &str, op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.retry.run(label, op, LedgerError::is_transient).await
    }

    pub async fn get_balance(&self) -> Result<Wei> {
        self.read("eth_getBalance", || self.gateway.balance()).await
    }

    pub async fn is_cid_registered(&self, cid: &ContentId) -> Result<bool> {
        self.read("isCIDUsed", || self.gateway.is_cid_used(cid)).await
    }

    pub async fn estimate_registration_cost(&self, cid: &ContentId) -> Result<CostEstimate> {
        self.estimate_cost(&ContractCall::RegisterLand { cid: cid.clone() })
            .await
    }

    pub async fn estimate_update_cost(
        &self,
        token_id: TokenId,
        cid: &ContentId,
    ) -> Result<CostEstimate> {
        self.estimate_cost(&ContractCall::UpdateProperty {
            token_id,
            cid: cid.clone(),
        })
        .await
    }

    async fn estimate_cost(&self, call: &ContractCall) -> Result<CostEstimate> {
        let gas_limit = match self
            .read("eth_estimateGas", || self.gateway.estimate_gas(call))
            .await
        {
            Ok(gas) => gas,
            Err(err) if err.is_execution_rejection() => {
                return Err(self.explain_rejected_estimate(call, err).await)
            }
            Err(err) => return Err(err),
        };
        let gas_price = self.read("eth_gasPrice", || self.gateway.gas_price()).await?;

        let estimate = CostEstimate::new(gas_limit, gas_price).ok_or(LedgerError::CostOverflow {
            gas_limit,
            gas_price: gas_price.wei(),
        })?;
        debug!(
            method = call.signature(),
            gas_limit,
            gas_price = %gas_price,
            total_cost = %estimate.total_cost,
            "estimated transaction cost"
        );
        Ok(estimate)
    }

    /// A rejected simulation is reported as a duplicate when the CID is
    /// already on the ledger, and as an affordability failure otherwise.
    async fn explain_rejected_estimate(&self, call: &ContractCall, cause: LedgerError) -> LedgerError {
        warn!(method = call.signature(), error = %cause, "gas estimation rejected");

        if let ContractCall::RegisterLand { cid } = call {
            match self.is_cid_registered(cid).await {
                Ok(true) => return LedgerError::CidAlreadyUsed(cid.clone()),
                Ok(false) => {}
                Err(err) => warn!(%cid, error = %err, "duplicate probe failed"),
            }
        }

        match self.get_balance().await {
            Ok(balance) => LedgerError::InsufficientFunds {
                address: self.address(),
                balance,
                required: None,
            },
            Err(err) => err,
        }
    }

    /// Check the funding account can pay for registering `cid`.
    pub async fn ensure_funds_for_registration(&self, cid: &ContentId) -> Result<CostEstimate> {
        self.ensure_funds(self.estimate_registration_cost(cid)).await
    }

    /// Check the funding account can pay for updating `token_id`.
    pub async fn ensure_funds_for_update(
        &self,
        token_id: TokenId,
        cid: &ContentId,
    ) -> Result<CostEstimate> {
        self.ensure_funds(self.estimate_update_cost(token_id, cid))
            .await
    }

    async fn ensure_funds<F>(&self, estimate: F) -> Result<CostEstimate>
    where
        F: Future<Output = Result<CostEstimate>>,
    {
        let (balance, estimate) = tokio::try_join!(self.get_balance(), estimate)?;
        if balance < estimate.total_cost {
            return Err(LedgerError::InsufficientFunds {
                address: self.address(),
                balance,
                required: Some(estimate.total_cost),
            });
        }
        info!(
            address = %self.address(),
            balance = %balance,
            required = %estimate.total_cost,
            "funds check passed"
        );
        Ok(estimate)
    }

    /// Register `cid`, wait for confirmation and recover the new token id.
    pub async fn register_land(&self, cid: &ContentId) -> Result<Registration> {
        if self.is_cid_registered(cid).await? {
            return Err(LedgerError::CidAlreadyUsed(cid.clone()));
        }

        let receipt = self
            .submit_and_confirm(&ContractCall::RegisterLand { cid: cid.clone() })
            .await?;
        let (token_id, token_id_source) = self.recover_token_id(&receipt).await?;
        info!(
            hash = %receipt.transaction_hash,
            %token_id,
            source = ?token_id_source,
            "property registered"
        );
        Ok(Registration {
            transaction_hash: receipt.transaction_hash,
            token_id,
            token_id_source,
        })
    }

    /// Point `token_id` at `cid` and wait for confirmation.
    pub async fn update_property(&self, token_id: TokenId, cid: &ContentId) -> Result<TransactionHash> {
        let receipt = self
            .submit_and_confirm(&ContractCall::UpdateProperty {
                token_id,
                cid: cid.clone(),
            })
            .await?;
        info!(hash = %receipt.transaction_hash, %token_id, "property updated");
        Ok(receipt.transaction_hash)
    }

    async fn submit_and_confirm(&self, call: &ContractCall) -> Result<TransactionReceipt> {
        let hash = self
            .gateway
            .submit(call)
            .await
            .map_err(|err| LedgerError::SubmissionFailed(Box::new(err)))?;
        info!(%hash, method = call.signature(), "waiting for confirmation");

        let receipt = self
            .read("eth_getTransactionReceipt", || self.gateway.wait_for_receipt(&hash))
            .await?;
        if !receipt.success {
            return Err(LedgerError::TransactionReverted { hash });
        }
        Ok(receipt)
    }

    async fn recover_token_id(&self, receipt: &TransactionReceipt) -> Result<(TokenId, TokenIdSource)> {
        match self.event.token_id(receipt) {
            Ok(Some(token_id)) => return Ok((token_id, TokenIdSource::Event)),
            Ok(None) => {}
            Err(err) => warn!(hash = %receipt.transaction_hash, error = %err, "unreadable registration event"),
        }

        let next = self
            .read("getNextTokenId", || self.gateway.next_token_id())
            .await?;
        let Some(latest) = next.checked_sub(1) else {
            return Err(LedgerError::TokenIdUnavailable {
                hash: receipt.transaction_hash,
                reason: "no registration event and the token counter is zero".to_string(),
            });
        };
        warn!(
            hash = %receipt.transaction_hash,
            token_id = latest,
            "no registration event in receipt, inferred token id from counter"
        );
        Ok((TokenId(latest), TokenIdSource::Counter))
    }
}

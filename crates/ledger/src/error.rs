use deedchain_types::{Address, ContentId, TransactionHash, Wei};
use thiserror::Error;

/// JSON-RPC error code some providers use for rate limiting.
const RPC_LIMIT_EXCEEDED: i64 = -32005;
/// JSON-RPC error code geth uses for reverted calls.
const RPC_EXECUTION_REVERTED: i64 = 3;

/// Errors that can occur when talking to the ledger or the property contract.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("{}", insufficient_funds_message(.address, .balance, .required))]
    InsufficientFunds {
        address: Address,
        balance: Wei,
        required: Option<Wei>,
    },

    #[error("CID is already used: {0}")]
    CidAlreadyUsed(ContentId),

    #[error("transaction {hash} reverted")]
    TransactionReverted { hash: TransactionHash },

    #[error("transaction {hash} confirmed but no token id could be recovered: {reason}")]
    TokenIdUnavailable {
        hash: TransactionHash,
        reason: String,
    },

    #[error("transaction submission failed: {0}")]
    SubmissionFailed(#[source] Box<LedgerError>),

    #[error("cost of {gas_limit} gas at {gas_price} wei overflows")]
    CostOverflow { gas_limit: u64, gas_price: u128 },

    #[error("json-rpc error (code {code}): {message}")]
    Rpc { code: i64, message: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("node returned status {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("failed to decode ledger response: {0}")]
    Decode(String),

    #[error("signer error: {0}")]
    Signer(String),

    #[error("invalid ledger configuration: {0}")]
    Configuration(String),
}

impl LedgerError {
    pub(crate) fn decode(msg: impl Into<String>) -> Self {
        LedgerError::Decode(msg.into())
    }

    /// Failures where repeating the same read may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            LedgerError::Http(err) => err.is_timeout() || err.is_connect(),
            LedgerError::HttpStatus { status, .. } => *status >= 500 || *status == 429,
            LedgerError::Rpc { code, .. } => *code == RPC_LIMIT_EXCEEDED,
            _ => false,
        }
    }

    /// Whether a failed simulation indicates the call cannot be executed by
    /// the funding account: a revert or an affordability rejection.
    pub fn is_execution_rejection(&self) -> bool {
        match self {
            LedgerError::Rpc { code, message } => {
                let message = message.to_ascii_lowercase();
                *code == RPC_EXECUTION_REVERTED
                    || message.contains("execution reverted")
                    || message.contains("insufficient funds")
            }
            _ => false,
        }
    }
}

fn insufficient_funds_message(address: &Address, balance: &Wei, required: &Option<Wei>) -> String {
    match required {
        Some(required) => format!(
            "Insufficient balance in wallet {address}. Current balance: {} ETH, required: {} ETH. Please add funds to complete the transaction.",
            balance.to_ether_string(),
            required.to_ether_string()
        ),
        None => format!(
            "Insufficient balance in wallet {address}. Current balance: {} ETH. Please add funds to complete the transaction.",
            balance.to_ether_string()
        ),
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_funds_message_carries_figures() {
        let err = LedgerError::InsufficientFunds {
            address: Address([0u8; 20]),
            balance: Wei::from_ether_str("0.001").unwrap(),
            required: Some(Wei::from_ether_str("0.01").unwrap()),
        };
        let message = err.to_string();
        assert!(message.contains("0.001 ETH"));
        assert!(message.contains("required: 0.01 ETH"));
        assert!(message.contains("0x0000000000000000000000000000000000000000"));
    }

    #[test]
    fn test_execution_rejection_signatures() {
        let revert = LedgerError::Rpc {
            code: -32000,
            message: "execution reverted: CID already registered".to_string(),
        };
        assert!(revert.is_execution_rejection());

        let funds = LedgerError::Rpc {
            code: -32000,
            message: "Insufficient funds for gas * price + value".to_string(),
        };
        assert!(funds.is_execution_rejection());

        let geth = LedgerError::Rpc {
            code: 3,
            message: "reverted".to_string(),
        };
        assert!(geth.is_execution_rejection());

        let other = LedgerError::Rpc {
            code: -32601,
            message: "method not found".to_string(),
        };
        assert!(!other.is_execution_rejection());
        assert!(!LedgerError::Decode("x".to_string()).is_execution_rejection());
    }

    #[test]
    fn test_transient_classification() {
        assert!(LedgerError::HttpStatus {
            status: 503,
            body: String::new()
        }
        .is_transient());
        assert!(!LedgerError::HttpStatus {
            status: 400,
            body: String::new()
        }
        .is_transient());
        assert!(LedgerError::Rpc {
            code: -32005,
            message: "limit exceeded".to_string()
        }
        .is_transient());
        assert!(!LedgerError::CidAlreadyUsed(ContentId::new("Qm").unwrap()).is_transient());
    }
}

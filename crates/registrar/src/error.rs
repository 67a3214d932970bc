use crate::config::ConfigError;
use crate::request::RequestError;
use crate::slot::SlotError;
use deedchain_files::FilesError;
use deedchain_ledger::LedgerError;
use deedchain_storage::StorageError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistrarError {
    #[error(transparent)]
    Request(#[from] RequestError),

    #[error(transparent)]
    Files(#[from] FilesError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Slot(#[from] SlotError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Stable caller-facing category of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    Validation,
    InsufficientFunds,
    Rejected,
    ServiceUnavailable,
    Internal,
}

impl ErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::Validation => "validation",
            ErrorClass::InsufficientFunds => "insufficient_funds",
            ErrorClass::Rejected => "rejected",
            ErrorClass::ServiceUnavailable => "service_unavailable",
            ErrorClass::Internal => "internal",
        }
    }

    /// Process exit status for the direct-invocation binary.
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorClass::Internal => 1,
            ErrorClass::Validation => 2,
            ErrorClass::InsufficientFunds => 3,
            ErrorClass::Rejected => 4,
            ErrorClass::ServiceUnavailable => 5,
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl RegistrarError {
    pub fn classification(&self) -> ErrorClass {
        match self {
            RegistrarError::Request(_) => ErrorClass::Validation,
            RegistrarError::Files(err) => match err {
                FilesError::EmptyInput
                | FilesError::TooManyItems { .. }
                | FilesError::UnsupportedFileType { .. }
                | FilesError::PayloadTooLarge { .. } => ErrorClass::Validation,
                FilesError::FetchFailed { .. } => ErrorClass::ServiceUnavailable,
            },
            RegistrarError::Storage(err) => match err {
                StorageError::PinFailed { .. } => ErrorClass::ServiceUnavailable,
                StorageError::Serialization(_) | StorageError::Configuration(_) => {
                    ErrorClass::Internal
                }
            },
            RegistrarError::Ledger(err) => classify_ledger(err),
            RegistrarError::Slot(_) => ErrorClass::Internal,
            RegistrarError::Config(_) => ErrorClass::Internal,
        }
    }
}

fn classify_ledger(err: &LedgerError) -> ErrorClass {
    match err {
        LedgerError::InsufficientFunds { .. } => ErrorClass::InsufficientFunds,
        LedgerError::CidAlreadyUsed(_)
        | LedgerError::TransactionReverted { .. }
        | LedgerError::TokenIdUnavailable { .. } => ErrorClass::Rejected,
        // the node refused the signed transaction; resending it changes nothing
        LedgerError::SubmissionFailed(inner) if inner.is_execution_rejection() => {
            ErrorClass::Rejected
        }
        LedgerError::SubmissionFailed(inner) => classify_ledger(inner),
        LedgerError::Rpc { .. }
        | LedgerError::Http(_)
        | LedgerError::HttpStatus { .. }
        | LedgerError::Decode(_) => ErrorClass::ServiceUnavailable,
        LedgerError::CostOverflow { .. }
        | LedgerError::Signer(_)
        | LedgerError::Configuration(_) => ErrorClass::Internal,
    }
}

pub type Result<T> = std::result::Result<T, RegistrarError>;

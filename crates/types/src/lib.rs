//! Shared data model for the deedchain registration pipeline.

pub mod amount;
pub mod document;
pub mod ledger;
pub mod manifest;
pub mod retry;

pub use amount::*;
pub use document::*;
pub use ledger::*;
pub use manifest::*;
pub use retry::RetryPolicy;

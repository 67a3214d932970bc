//! Serialization of ledger submissions for the shared funding account.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum SlotError {
    #[error("submission slot unavailable: {0}")]
    Unavailable(String),
}

/// Exclusive right to submit from the funding account. Released on drop.
pub struct SubmissionPermit {
    _guard: Box<dyn Send>,
}

impl SubmissionPermit {
    pub fn new(guard: impl Send + 'static) -> Self {
        Self {
            _guard: Box::new(guard),
        }
    }
}

impl std::fmt::Debug for SubmissionPermit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmissionPermit").finish_non_exhaustive()
    }
}

/// Coordinates submissions across invocations. Multi-instance deployments
/// plug in an external lock or queue here.
#[async_trait]
pub trait SubmissionSlot: Send + Sync {
    async fn acquire(&self) -> Result<SubmissionPermit, SlotError>;
}

/// In-process slot backed by an async mutex.
#[derive(Debug, Clone, Default)]
pub struct LocalSubmissionSlot {
    lock: Arc<Mutex<()>>,
}

impl LocalSubmissionSlot {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubmissionSlot for LocalSubmissionSlot {
    async fn acquire(&self) -> Result<SubmissionPermit, SlotError> {
        let guard = Arc::clone(&self.lock).lock_owned().await;
        Ok(SubmissionPermit::new(guard))
    }
}

use async_trait::async_trait;
use deedchain_types::{ContentId, PropertyManifest};

/// Storage errors
#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("failed to pin {target} to IPFS: {cause}")]
    PinFailed { target: String, cause: String },
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("invalid pinning configuration: {0}")]
    Configuration(String),
}

impl StorageError {
    pub fn pin_failed(target: impl Into<String>, cause: impl Into<String>) -> Self {
        StorageError::PinFailed {
            target: target.into(),
            cause: cause.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Content-addressed pinning service.
///
/// Identical bytes always yield the identical identifier. Implementations do
/// not deduplicate locally; pinning the same content twice re-issues the call.
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Pin raw file bytes under a display name.
    async fn pin_file(&self, file_name: &str, bytes: &[u8]) -> Result<ContentId>;

    /// Pin the JSON encoding of a manifest.
    async fn pin_manifest(&self, manifest: &PropertyManifest) -> Result<ContentId>;
}

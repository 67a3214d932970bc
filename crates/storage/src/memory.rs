//! In-process pinning backend.

use crate::cid::content_id_for;
use crate::client::{Result, StorageClient};
use async_trait::async_trait;
use deedchain_types::{ContentId, PropertyManifest};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// In-memory content store (for testing and local runs).
#[derive(Clone, Default)]
pub struct MemoryStorageClient {
    inner: Arc<MemoryStorageInner>,
}

#[derive(Default)]
struct MemoryStorageInner {
    /// CID -> content bytes
    objects: RwLock<HashMap<ContentId, Vec<u8>>>,

    /// Pin requests in arrival order, as (name, cid)
    pins: RwLock<Vec<(String, ContentId)>>,
}

impl MemoryStorageClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Content previously pinned under `cid`.
    pub fn get(&self, cid: &ContentId) -> Option<Vec<u8>> {
        self.inner.objects.read().get(cid).cloned()
    }

    /// Number of pin calls served, including repeats.
    pub fn pin_count(&self) -> usize {
        self.inner.pins.read().len()
    }

    /// Names of all pin calls served, in order.
    pub fn pinned_names(&self) -> Vec<String> {
        self.inner
            .pins
            .read()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn put(&self, name: &str, bytes: Vec<u8>) -> ContentId {
        let cid = content_id_for(&bytes);
        self.inner.objects.write().insert(cid.clone(), bytes);
        self.inner.pins.write().push((name.to_string(), cid.clone()));
        debug!(name, %cid, "pinned object in memory");
        cid
    }
}

#[async_trait]
impl StorageClient for MemoryStorageClient {
    async fn pin_file(&self, file_name: &str, bytes: &[u8]) -> Result<ContentId> {
        Ok(self.put(file_name, bytes.to_vec()))
    }

    async fn pin_manifest(&self, manifest: &PropertyManifest) -> Result<ContentId> {
        let bytes = manifest.to_json_bytes()?;
        Ok(self.put(&manifest.pin_name(), bytes))
    }
}

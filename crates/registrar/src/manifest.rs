use crate::request::PropertyRequest;
use chrono::{DateTime, Utc};
use deedchain_types::{PinnedFile, PropertyManifest};
use std::sync::Arc;

/// Owner name recorded when the request carries none.
pub const UNKNOWN_OWNER: &str = "Unknown Owner";

/// Source of manifest timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Builds the manifest document from a request and its pinned files.
#[derive(Clone)]
pub struct ManifestAssembler {
    clock: Arc<dyn Clock>,
}

impl Default for ManifestAssembler {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl ManifestAssembler {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    pub fn assemble(&self, request: &PropertyRequest, documents: Vec<PinnedFile>) -> PropertyManifest {
        PropertyManifest {
            property_id: request.property_id.clone(),
            owner_name: non_empty(&request.owner_name).unwrap_or(UNKNOWN_OWNER).to_string(),
            property_kind: non_empty(&request.property_type).unwrap_or_default().to_string(),
            property_name: non_empty(&request.property_name).unwrap_or_default().to_string(),
            documents,
            timestamp: self.clock.now(),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

//! Batch validation of supporting-document URLs.
//!
//! Runs before any network call: rejects empty and oversized batches,
//! collapses duplicates, and fails the whole batch if any URL lacks an
//! accepted extension.

use crate::error::{FilesError, Result};
use deedchain_types::DocumentKind;
use std::collections::HashSet;
use tracing::warn;

/// Default ceiling on the number of URLs in one batch.
pub const DEFAULT_MAX_BATCH: usize = 20;

/// Deduplicated URLs that all resolve to an accepted document kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedBatch {
    pub urls: Vec<String>,
    pub duplicates_removed: usize,
}

#[derive(Debug, Clone)]
pub struct DocumentSetValidator {
    max_batch: usize,
}

impl Default for DocumentSetValidator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BATCH)
    }
}

impl DocumentSetValidator {
    pub fn new(max_batch: usize) -> Self {
        Self { max_batch }
    }

    pub fn validate<S: AsRef<str>>(&self, urls: &[S]) -> Result<ValidatedBatch> {
        if urls.is_empty() {
            return Err(FilesError::EmptyInput);
        }
        if urls.len() > self.max_batch {
            return Err(FilesError::TooManyItems {
                max: self.max_batch,
                received: urls.len(),
            });
        }

        let mut seen = HashSet::with_capacity(urls.len());
        let unique: Vec<String> = urls
            .iter()
            .map(AsRef::as_ref)
            .filter(|url| seen.insert(*url))
            .map(str::to_string)
            .collect();

        let duplicates_removed = urls.len() - unique.len();
        if duplicates_removed > 0 {
            warn!(
                removed = duplicates_removed,
                "removed duplicate URLs from request"
            );
        }

        let invalid: Vec<String> = unique
            .iter()
            .filter(|url| DocumentKind::from_url(url).is_none())
            .cloned()
            .collect();
        if !invalid.is_empty() {
            return Err(FilesError::UnsupportedFileType { urls: invalid });
        }

        Ok(ValidatedBatch {
            urls: unique,
            duplicates_removed,
        })
    }
}

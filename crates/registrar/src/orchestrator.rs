//! The registration pipeline.
//!
//! One invocation moves through a fixed sequence of stages and stops at the
//! first failure. Only the fetch+pin stage runs work in parallel.

use crate::error::Result;
use crate::manifest::ManifestAssembler;
use crate::request::PropertyRequest;
use crate::slot::{LocalSubmissionSlot, SubmissionSlot};
use deedchain_files::{ContentFetcher, DocumentSetValidator, DEFAULT_MAX_BATCH};
use deedchain_ledger::{LedgerClient, TokenIdSource};
use deedchain_storage::StorageClient;
use deedchain_types::{PinnedFile, RegistrationOutcome, TokenId};
use futures::{stream, StreamExt, TryStreamExt};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};

/// Default number of files fetched and pinned at once.
pub const DEFAULT_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    pub max_batch: usize,
    pub concurrency: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_batch: DEFAULT_MAX_BATCH,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validating,
    Fetching,
    Pinning,
    ManifestBuilding,
    ManifestPinning,
    FundsChecking,
    Submitting,
    Confirmed,
    Failed,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Validating => "validating",
            Stage::Fetching => "fetching",
            Stage::Pinning => "pinning",
            Stage::ManifestBuilding => "manifest_building",
            Stage::ManifestPinning => "manifest_pinning",
            Stage::FundsChecking => "funds_checking",
            Stage::Submitting => "submitting",
            Stage::Confirmed => "confirmed",
            Stage::Failed => "failed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Register,
    Update(TokenId),
}

impl Operation {
    fn name(&self) -> &'static str {
        match self {
            Operation::Register => "register",
            Operation::Update(_) => "update",
        }
    }
}

pub struct RegistrationOrchestrator {
    validator: DocumentSetValidator,
    fetcher: Arc<dyn ContentFetcher>,
    storage: Arc<dyn StorageClient>,
    ledger: LedgerClient,
    assembler: ManifestAssembler,
    slot: Arc<dyn SubmissionSlot>,
    concurrency: usize,
}

impl RegistrationOrchestrator {
    pub fn new(
        fetcher: Arc<dyn ContentFetcher>,
        storage: Arc<dyn StorageClient>,
        ledger: LedgerClient,
        config: PipelineConfig,
    ) -> Self {
        Self {
            validator: DocumentSetValidator::new(config.max_batch),
            fetcher,
            storage,
            ledger,
            assembler: ManifestAssembler::default(),
            slot: Arc::new(LocalSubmissionSlot::new()),
            concurrency: config.concurrency.max(1),
        }
    }

    pub fn with_slot(mut self, slot: Arc<dyn SubmissionSlot>) -> Self {
        self.slot = slot;
        self
    }

    pub fn with_assembler(mut self, assembler: ManifestAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    pub fn ledger(&self) -> &LedgerClient {
        &self.ledger
    }

    /// Create a new property record.
    pub async fn register(&self, request: &PropertyRequest) -> Result<RegistrationOutcome> {
        self.run(request, Operation::Register).await
    }

    /// Re-anchor an existing record. The request must carry its token id.
    pub async fn update(&self, request: &PropertyRequest) -> Result<RegistrationOutcome> {
        let token_id = request.require_token_id()?;
        self.run(request, Operation::Update(token_id)).await
    }

    async fn run(&self, request: &PropertyRequest, operation: Operation) -> Result<RegistrationOutcome> {
        let span = info_span!(
            "registration",
            property_id = %request.property_id,
            operation = operation.name()
        );
        async {
            let mut stage = Stage::Validating;
            match self.execute(request, operation, &mut stage).await {
                Ok(outcome) => {
                    enter(&mut stage, Stage::Confirmed);
                    Ok(outcome)
                }
                Err(err) => {
                    warn!(
                        stage = %Stage::Failed,
                        failed_at = %stage,
                        classification = %err.classification(),
                        error = %err,
                        "pipeline failed"
                    );
                    Err(err)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn execute(
        &self,
        request: &PropertyRequest,
        operation: Operation,
        stage: &mut Stage,
    ) -> Result<RegistrationOutcome> {
        enter(stage, Stage::Validating);
        request.validate()?;
        let batch = self.validator.validate(&request.file_urls)?;
        let mut warnings = Vec::new();
        if batch.duplicates_removed > 0 {
            warnings.push(format!(
                "Removed {} duplicate URLs from request",
                batch.duplicates_removed
            ));
        }

        enter(stage, Stage::Fetching);
        let documents = self.fetch_and_pin_all(&batch.urls).await?;

        enter(stage, Stage::ManifestBuilding);
        let manifest = self.assembler.assemble(request, documents);

        enter(stage, Stage::ManifestPinning);
        let manifest_cid = self.storage.pin_manifest(&manifest).await?;
        info!(%manifest_cid, documents = manifest.documents.len(), "manifest pinned");

        // Held until the receipt has been processed.
        let permit = self.slot.acquire().await?;

        enter(stage, Stage::FundsChecking);
        match operation {
            Operation::Register => {
                self.ledger.ensure_funds_for_registration(&manifest_cid).await?;
            }
            Operation::Update(token_id) => {
                self.ledger
                    .ensure_funds_for_update(token_id, &manifest_cid)
                    .await?;
            }
        }

        enter(stage, Stage::Submitting);
        let (transaction_hash, token_id) = match operation {
            Operation::Register => {
                let registration = self.ledger.register_land(&manifest_cid).await?;
                if registration.token_id_source == TokenIdSource::Counter {
                    warnings.push(format!(
                        "Token id {} was inferred from the contract counter; no registration event was found",
                        registration.token_id
                    ));
                }
                (registration.transaction_hash, registration.token_id)
            }
            Operation::Update(token_id) => {
                let hash = self.ledger.update_property(token_id, &manifest_cid).await?;
                (hash, token_id)
            }
        };
        drop(permit);

        Ok(RegistrationOutcome {
            transaction_hash,
            token_id: Some(token_id),
            manifest_cid,
            documents: manifest.documents,
            warnings,
        })
    }

    /// Fetch and pin every URL with bounded parallelism. The first failure
    /// drops the remaining in-flight work. Output keeps input order.
    async fn fetch_and_pin_all(&self, urls: &[String]) -> Result<Vec<PinnedFile>> {
        let pinning_started = AtomicBool::new(false);
        let pinning_started = &pinning_started;
        let mut pinned: Vec<(usize, PinnedFile)> = stream::iter(urls.iter().enumerate())
            .map(|(index, url)| async move {
                self.fetch_and_pin(url, pinning_started)
                    .await
                    .map(|file| (index, file))
            })
            .buffer_unordered(self.concurrency)
            .try_collect()
            .await?;
        pinned.sort_by_key(|(index, _)| *index);
        Ok(pinned.into_iter().map(|(_, file)| file).collect())
    }

    async fn fetch_and_pin(&self, url: &str, pinning_started: &AtomicBool) -> Result<PinnedFile> {
        let fetched = self.fetcher.fetch(url).await?;
        // fetches and pins overlap; the stage line is logged once, by the first pin
        if !pinning_started.swap(true, Ordering::Relaxed) {
            info!(stage = %Stage::Pinning, "pipeline stage");
        }
        debug!(url, stage = %Stage::Pinning, file = %fetched.file_name, "pinning document");
        let content_id = self
            .storage
            .pin_file(&fetched.file_name, &fetched.bytes)
            .await?;
        Ok(PinnedFile {
            name: fetched.file_name,
            document_kind: fetched.mime_type,
            content_id,
        })
    }
}

fn enter(current: &mut Stage, next: Stage) {
    *current = next;
    info!(stage = %next, "pipeline stage");
}

//! Property registration pipeline: validates a request, pins its documents
//! and manifest, then anchors the manifest on the ledger.

pub mod config;
pub mod error;
pub mod manifest;
pub mod orchestrator;
pub mod request;
pub mod slot;

pub use config::{
    ConfigError, LedgerSettings, LogFormat, LogSettings, PinningMode, PinningSettings,
    RegistrarConfig, SigningKey,
};
pub use error::{ErrorClass, RegistrarError, Result};
pub use manifest::{Clock, ManifestAssembler, SystemClock, UNKNOWN_OWNER};
pub use orchestrator::{PipelineConfig, RegistrationOrchestrator, Stage, DEFAULT_CONCURRENCY};
pub use request::{PropertyRequest, RequestError};
pub use slot::{LocalSubmissionSlot, SlotError, SubmissionPermit, SubmissionSlot};

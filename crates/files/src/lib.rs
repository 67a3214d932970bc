//! Supporting-document intake.
//!
//! Validates batches of remote document URLs and downloads individual files
//! under a timeout and size ceiling. Both stages classify files through the
//! shared kind table in `deedchain-types`.

pub mod error;
pub mod fetcher;
pub mod validator;

pub use error::{FilesError, Result};
pub use fetcher::{
    ContentFetcher, FetchedFile, FetcherConfig, HttpContentFetcher, DEFAULT_FETCH_TIMEOUT,
    DEFAULT_MAX_FILE_BYTES,
};
pub use validator::{DocumentSetValidator, ValidatedBatch, DEFAULT_MAX_BATCH};

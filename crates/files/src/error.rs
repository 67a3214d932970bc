use deedchain_types::DocumentKind;
use thiserror::Error;

/// Errors raised while validating or fetching supporting documents.
#[derive(Debug, Error)]
pub enum FilesError {
    #[error("no file URLs provided")]
    EmptyInput,

    #[error("too many URLs provided: maximum {max} allowed, received {received}")]
    TooManyItems { max: usize, received: usize },

    #[error(
        "invalid file types detected; only {} are allowed for property documents. Invalid files: {}",
        DocumentKind::accepted_list(),
        .urls.join(", ")
    )]
    UnsupportedFileType { urls: Vec<String> },

    #[error("file {file_name} exceeds the {limit} byte limit (size: {size} bytes)")]
    PayloadTooLarge {
        file_name: String,
        size: u64,
        limit: u64,
    },

    #[error("failed to fetch {url}: {cause}")]
    FetchFailed {
        url: String,
        cause: String,
        retryable: bool,
    },
}

impl FilesError {
    pub(crate) fn transport(url: &str, err: &reqwest::Error) -> Self {
        FilesError::FetchFailed {
            url: url.to_string(),
            cause: err.to_string(),
            retryable: err.is_timeout() || err.is_connect(),
        }
    }

    /// Whether a retry of the same fetch may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FilesError::FetchFailed { retryable: true, .. })
    }
}

pub type Result<T> = std::result::Result<T, FilesError>;

//! Retrieval of a single remote document.

use crate::error::{FilesError, Result};
use async_trait::async_trait;
use deedchain_types::{file_name_from_url, DocumentKind, RetryPolicy};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, info};

/// Default ceiling on a single retrieval.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Default per-file size ceiling (10 MiB).
pub const DEFAULT_MAX_FILE_BYTES: u64 = 10 * 1024 * 1024;

/// A downloaded document, classified by extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedFile {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Source of raw document bytes.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedFile>;
}

#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub timeout: Duration,
    pub max_file_bytes: u64,
    pub retry: RetryPolicy,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_FETCH_TIMEOUT,
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            retry: RetryPolicy::default(),
        }
    }
}

/// HTTP(S) fetcher with a hard timeout and size ceiling.
#[derive(Clone)]
pub struct HttpContentFetcher {
    http: Client,
    max_file_bytes: u64,
    retry: RetryPolicy,
}

impl HttpContentFetcher {
    pub fn new(config: FetcherConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| FilesError::FetchFailed {
                url: String::new(),
                cause: format!("failed to build HTTP client: {err}"),
                retryable: false,
            })?;
        Ok(Self::with_http_client(http, config))
    }

    /// Use an existing reqwest client. `config.timeout` is ignored in favour
    /// of the client's own settings.
    pub fn with_http_client(http: Client, config: FetcherConfig) -> Self {
        Self {
            http,
            max_file_bytes: config.max_file_bytes,
            retry: config.retry,
        }
    }

    async fn fetch_once(&self, url: &str, kind: &DocumentKind, file_name: &str) -> Result<FetchedFile> {
        let mut response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|err| FilesError::transport(url, &err))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FilesError::FetchFailed {
                url: url.to_string(),
                cause: format!("HTTP status {status}"),
                retryable: status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS,
            });
        }

        if let Some(advertised) = response.content_length() {
            if advertised > self.max_file_bytes {
                return Err(FilesError::PayloadTooLarge {
                    file_name: file_name.to_string(),
                    size: advertised,
                    limit: self.max_file_bytes,
                });
            }
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|err| FilesError::transport(url, &err))?
        {
            let size = (bytes.len() + chunk.len()) as u64;
            if size > self.max_file_bytes {
                return Err(FilesError::PayloadTooLarge {
                    file_name: file_name.to_string(),
                    size,
                    limit: self.max_file_bytes,
                });
            }
            bytes.extend_from_slice(&chunk);
        }

        Ok(FetchedFile {
            file_name: file_name.to_string(),
            mime_type: kind.mime_type.to_string(),
            bytes,
        })
    }
}

#[async_trait]
impl ContentFetcher for HttpContentFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedFile> {
        let kind = DocumentKind::from_url(url).ok_or_else(|| FilesError::UnsupportedFileType {
            urls: vec![url.to_string()],
        })?;
        let file_name = file_name_from_url(url);

        debug!(url, "downloading document");
        let file = self
            .retry
            .run(
                "fetch_document",
                || self.fetch_once(url, kind, file_name),
                FilesError::is_retryable,
            )
            .await?;

        info!(
            file = %file.file_name,
            mime = %file.mime_type,
            size = file.bytes.len(),
            "downloaded document"
        );
        Ok(file)
    }
}

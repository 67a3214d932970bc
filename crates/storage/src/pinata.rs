//! Pinata pinning service client.

use crate::client::{Result, StorageClient, StorageError};
use async_trait::async_trait;
use deedchain_types::{ContentId, PropertyManifest};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::info;
use url::Url;

/// Default Pinata API root.
pub const DEFAULT_PINATA_API_URL: &str = "https://api.pinata.cloud";

const PIN_FILE_PATH: &str = "pinning/pinFileToIPFS";
const PIN_JSON_PATH: &str = "pinning/pinJSONToIPFS";
const ERROR_BODY_EXCERPT: usize = 200;

/// Pinata authentication material.
#[derive(Clone)]
pub enum PinataCredentials {
    ApiKey {
        api_key: String,
        secret_api_key: String,
    },
    Jwt(String),
}

impl fmt::Debug for PinataCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PinataCredentials::ApiKey { api_key, .. } => f
                .debug_struct("ApiKey")
                .field("api_key", api_key)
                .field("secret_api_key", &"<redacted>")
                .finish(),
            PinataCredentials::Jwt(_) => f.debug_tuple("Jwt").field(&"<redacted>").finish(),
        }
    }
}

/// HTTP client for the Pinata pinning API.
#[derive(Clone)]
pub struct PinataClient {
    base_url: Url,
    http: Client,
    credentials: PinataCredentials,
}

impl PinataClient {
    /// Create a new client against `base_url` (e.g. `https://api.pinata.cloud`).
    pub fn new(base_url: impl AsRef<str>, credentials: PinataCredentials) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| StorageError::Configuration(format!("failed to build HTTP client: {err}")))?;
        Self::with_http_client(base_url, credentials, http)
    }

    /// Use an existing reqwest client (useful for custom TLS or middleware).
    pub fn with_http_client(
        base_url: impl AsRef<str>,
        credentials: PinataCredentials,
        http: Client,
    ) -> Result<Self> {
        let mut url = Url::parse(base_url.as_ref()).map_err(|err| {
            StorageError::Configuration(format!("invalid pinning API URL `{}`: {err}", base_url.as_ref()))
        })?;
        if !url.path().ends_with('/') {
            let mut path = url.path().trim_end_matches('/').to_owned();
            path.push('/');
            url.set_path(&path);
        }
        Ok(Self {
            base_url: url,
            http,
            credentials,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|err| StorageError::Configuration(format!("invalid endpoint `{path}`: {err}")))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            PinataCredentials::ApiKey {
                api_key,
                secret_api_key,
            } => request
                .header("pinata_api_key", api_key)
                .header("pinata_secret_api_key", secret_api_key),
            PinataCredentials::Jwt(token) => request.bearer_auth(token),
        }
    }

    async fn read_pin_response(target: &str, response: Response) -> Result<ContentId> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let excerpt: String = body.chars().take(ERROR_BODY_EXCERPT).collect();
            return Err(StorageError::pin_failed(
                target,
                format!("status {}: {}", status.as_u16(), excerpt),
            ));
        }

        let parsed = response
            .json::<PinResponse>()
            .await
            .map_err(|err| StorageError::pin_failed(target, format!("malformed response: {err}")))?;
        ContentId::new(parsed.ipfs_hash)
            .map_err(|err| StorageError::pin_failed(target, format!("malformed response: {err}")))
    }
}

#[derive(Debug, Deserialize)]
struct PinResponse {
    #[serde(rename = "IpfsHash")]
    ipfs_hash: String,
}

#[derive(Debug, Serialize)]
struct PinMetadata<'a> {
    name: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PinJsonRequest<'a> {
    pinata_content: &'a PropertyManifest,
    pinata_metadata: PinMetadata<'a>,
}

#[async_trait]
impl StorageClient for PinataClient {
    async fn pin_file(&self, file_name: &str, bytes: &[u8]) -> Result<ContentId> {
        let metadata = serde_json::to_string(&PinMetadata { name: file_name })?;
        let form = Form::new()
            .part("file", Part::bytes(bytes.to_vec()).file_name(file_name.to_string()))
            .text("pinataMetadata", metadata);

        let url = self.endpoint(PIN_FILE_PATH)?;
        let response = self
            .authorize(self.http.post(url))
            .multipart(form)
            .send()
            .await
            .map_err(|err| StorageError::pin_failed(file_name, err.to_string()))?;

        let cid = Self::read_pin_response(file_name, response).await?;
        info!(file = file_name, %cid, size = bytes.len(), "pinned file");
        Ok(cid)
    }

    async fn pin_manifest(&self, manifest: &PropertyManifest) -> Result<ContentId> {
        let name = manifest.pin_name();
        let body = serde_json::to_vec(&PinJsonRequest {
            pinata_content: manifest,
            pinata_metadata: PinMetadata { name: &name },
        })?;

        let url = self.endpoint(PIN_JSON_PATH)?;
        let response = self
            .authorize(self.http.post(url))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|err| StorageError::pin_failed(&name, err.to_string()))?;

        let cid = Self::read_pin_response(&name, response).await?;
        info!(manifest = %name, %cid, documents = manifest.documents.len(), "pinned manifest");
        Ok(cid)
    }
}

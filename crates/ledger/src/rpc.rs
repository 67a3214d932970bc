use crate::error::{LedgerError, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::trace;
use url::Url;

const ERROR_BODY_EXCERPT: usize = 200;

/// Empty positional parameter list.
pub const NO_PARAMS: [u8; 0] = [];

/// Minimal JSON-RPC 2.0 client over HTTP.
#[derive(Debug)]
pub struct JsonRpcClient {
    url: Url,
    http: Client,
    next_id: AtomicU64,
}

#[derive(Serialize)]
struct RpcRequest<'a, P> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: P,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

impl JsonRpcClient {
    pub fn new(url: impl AsRef<str>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Self::with_http_client(url, http)
    }

    pub fn with_http_client(url: impl AsRef<str>, http: Client) -> Result<Self> {
        let url = Url::parse(url.as_ref()).map_err(|err| {
            LedgerError::Configuration(format!("invalid RPC URL `{}`: {err}", url.as_ref()))
        })?;
        Ok(Self {
            url,
            http,
            next_id: AtomicU64::new(1),
        })
    }

    /// Call `method` and decode its `result`. A missing or null result is
    /// decoded as JSON `null`, so `Option<T>` results map it to `None`.
    pub async fn request<P, R>(&self, method: &str, params: P) -> Result<R>
    where
        P: Serialize + Send,
        R: DeserializeOwned,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        trace!(id, method, "json-rpc request");

        let response = self
            .http
            .post(self.url.clone())
            .json(&RpcRequest {
                jsonrpc: "2.0",
                id,
                method,
                params,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LedgerError::HttpStatus {
                status: status.as_u16(),
                body: body.chars().take(ERROR_BODY_EXCERPT).collect(),
            });
        }

        let envelope: RpcResponse = response.json().await?;
        if let Some(error) = envelope.error {
            let message = match error.data {
                Some(Value::String(data)) if !data.is_empty() => {
                    format!("{} ({data})", error.message)
                }
                _ => error.message,
            };
            return Err(LedgerError::Rpc {
                code: error.code,
                message,
            });
        }

        serde_json::from_value(envelope.result.unwrap_or(Value::Null))
            .map_err(|err| LedgerError::decode(format!("{method}: {err}")))
    }
}

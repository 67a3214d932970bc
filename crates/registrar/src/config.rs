//! Startup configuration.
//!
//! Values come from an optional TOML file, the unprefixed variable names used
//! by earlier deployments, and `DEEDCHAIN_`-prefixed environment variables,
//! in increasing order of precedence.

use crate::orchestrator::{PipelineConfig, DEFAULT_CONCURRENCY};
use config::{Config, Environment, File, Map};
use deedchain_files::{FetcherConfig, DEFAULT_MAX_BATCH, DEFAULT_MAX_FILE_BYTES};
use deedchain_ledger::{DEFAULT_RECEIPT_POLL_INTERVAL, DEFAULT_REGISTERED_EVENT};
use deedchain_storage::{PinataCredentials, DEFAULT_PINATA_API_URL};
use deedchain_types::{Address, RetryPolicy};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const ENV_PREFIX: &str = "DEEDCHAIN";

const LEGACY_ENV: &[&str] = &[
    "INFURA_RPC_URL",
    "MASTER_WALLET_PRIVATE_KEY",
    "SMART_TAGS_CONTRACT_ADDRESS",
    "PINATA_API_KEY",
    "PINATA_SECRET_API_KEY",
    "PINATA_JWT",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required configuration value `{0}`")]
    Missing(&'static str),

    #[error("invalid value for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("configuration file {} not found", .0.display())]
    FileNotFound(PathBuf),

    #[error(transparent)]
    Source(#[from] config::ConfigError),
}

/// Hex private key of the funding account.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningKey(String);

impl SigningKey {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningKey(<redacted>)")
    }
}

#[derive(Debug, Clone)]
pub struct LedgerSettings {
    pub rpc_url: String,
    pub signing_key: SigningKey,
    pub contract_address: Address,
    pub chain_id: Option<u64>,
    pub receipt_poll_interval: Duration,
    pub registered_event: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinningMode {
    Pinata,
    Memory,
}

#[derive(Debug, Clone)]
pub struct PinningSettings {
    pub mode: PinningMode,
    pub api_url: String,
    /// Present whenever `mode` is `Pinata`.
    pub credentials: Option<PinataCredentials>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct LogSettings {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone)]
pub struct RegistrarConfig {
    pub ledger: LedgerSettings,
    pub pinning: PinningSettings,
    pub fetch: FetcherConfig,
    pub pipeline: PipelineConfig,
    pub retry: RetryPolicy,
    pub log: LogSettings,
}

impl RegistrarConfig {
    /// Load from `path` (which must exist when given) and the process
    /// environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.to_path_buf()));
            }
            builder = builder.add_source(File::from(path));
        }

        let config = builder
            .add_source(Environment::default().source(Some(legacy_environment())))
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()?;
        Self::from_config(&config)
    }

    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let retry = RetryPolicy::default()
            .with_max_attempts(get_u64(config, &["retry.max_attempts", "retry_max_attempts"], 3)? as u32)
            .with_initial_delay(Duration::from_millis(get_u64(
                config,
                &["retry.initial_delay_ms", "retry_initial_delay_ms"],
                200,
            )?))
            .with_max_delay(Duration::from_millis(get_u64(
                config,
                &["retry.max_delay_ms", "retry_max_delay_ms"],
                5_000,
            )?));

        Ok(Self {
            ledger: ledger_settings(config)?,
            pinning: pinning_settings(config)?,
            fetch: FetcherConfig {
                timeout: Duration::from_secs(get_u64(
                    config,
                    &["fetch.timeout_secs", "fetch_timeout_secs"],
                    30,
                )?),
                max_file_bytes: get_u64(
                    config,
                    &["fetch.max_file_bytes", "fetch_max_file_bytes"],
                    DEFAULT_MAX_FILE_BYTES,
                )?,
                retry: retry.clone(),
            },
            pipeline: PipelineConfig {
                max_batch: get_u64(
                    config,
                    &["pipeline.max_batch", "pipeline_max_batch"],
                    DEFAULT_MAX_BATCH as u64,
                )? as usize,
                concurrency: get_u64(
                    config,
                    &["pipeline.concurrency", "pipeline_concurrency"],
                    DEFAULT_CONCURRENCY as u64,
                )?
                .max(1) as usize,
            },
            retry,
            log: LogSettings {
                level: get_string_value(config, &["log.level", "log_level"])
                    .unwrap_or_else(|| "info".to_string()),
                format: match get_string_value(config, &["log.format", "log_format"])
                    .as_deref()
                    .map(str::to_ascii_lowercase)
                    .as_deref()
                {
                    None | Some("pretty") => LogFormat::Pretty,
                    Some("json") => LogFormat::Json,
                    Some(other) => {
                        return Err(ConfigError::Invalid {
                            key: "log.format",
                            reason: format!("expected `pretty` or `json`, got `{other}`"),
                        })
                    }
                },
            },
        })
    }
}

fn ledger_settings(config: &Config) -> Result<LedgerSettings, ConfigError> {
    let rpc_url = get_string_value(config, &["ledger.rpc_url", "ledger_rpc_url", "infura_rpc_url"])
        .ok_or(ConfigError::Missing("ledger.rpc_url"))?;

    let signing_key = get_string_value(
        config,
        &["ledger.signing_key", "ledger_signing_key", "master_wallet_private_key"],
    )
    .ok_or(ConfigError::Missing("ledger.signing_key"))?;
    let digits = signing_key.trim_start_matches("0x");
    if digits.len() != 64 || hex::decode(digits).is_err() {
        return Err(ConfigError::Invalid {
            key: "ledger.signing_key",
            reason: "expected 32 hex-encoded bytes".to_string(),
        });
    }

    let contract_address = get_string_value(
        config,
        &[
            "ledger.contract_address",
            "ledger_contract_address",
            "smart_tags_contract_address",
        ],
    )
    .ok_or(ConfigError::Missing("ledger.contract_address"))?
    .parse::<Address>()
    .map_err(|reason| ConfigError::Invalid {
        key: "ledger.contract_address",
        reason,
    })?;

    let chain_id = match get_string_value(config, &["ledger.chain_id", "ledger_chain_id"]) {
        Some(raw) => Some(parse_u64("ledger.chain_id", &raw)?),
        None => None,
    };

    Ok(LedgerSettings {
        rpc_url,
        signing_key: SigningKey(signing_key),
        contract_address,
        chain_id,
        receipt_poll_interval: Duration::from_millis(get_u64(
            config,
            &["ledger.receipt_poll_interval_ms", "ledger_receipt_poll_interval_ms"],
            DEFAULT_RECEIPT_POLL_INTERVAL.as_millis() as u64,
        )?),
        registered_event: get_string_value(
            config,
            &["ledger.registered_event", "ledger_registered_event"],
        )
        .unwrap_or_else(|| DEFAULT_REGISTERED_EVENT.to_string()),
    })
}

fn pinning_settings(config: &Config) -> Result<PinningSettings, ConfigError> {
    let mode = match get_string_value(config, &["pinning.mode", "pinning_mode"])
        .map(|mode| mode.to_ascii_lowercase())
        .as_deref()
    {
        None | Some("pinata") => PinningMode::Pinata,
        Some("memory") => PinningMode::Memory,
        Some(other) => {
            return Err(ConfigError::Invalid {
                key: "pinning.mode",
                reason: format!("expected `pinata` or `memory`, got `{other}`"),
            })
        }
    };

    let api_url = get_string_value(config, &["pinning.api_url", "pinning_api_url"])
        .unwrap_or_else(|| DEFAULT_PINATA_API_URL.to_string());

    let credentials = match mode {
        PinningMode::Memory => None,
        PinningMode::Pinata => {
            let jwt = get_string_value(config, &["pinning.jwt", "pinning_jwt", "pinata_jwt"]);
            let api_key =
                get_string_value(config, &["pinning.api_key", "pinning_api_key", "pinata_api_key"]);
            let secret = get_string_value(
                config,
                &[
                    "pinning.secret_api_key",
                    "pinning_secret_api_key",
                    "pinata_secret_api_key",
                ],
            );
            Some(match (jwt, api_key, secret) {
                (Some(jwt), _, _) => PinataCredentials::Jwt(jwt),
                (None, Some(api_key), Some(secret_api_key)) => PinataCredentials::ApiKey {
                    api_key,
                    secret_api_key,
                },
                (None, None, _) => return Err(ConfigError::Missing("pinning.api_key")),
                (None, Some(_), None) => return Err(ConfigError::Missing("pinning.secret_api_key")),
            })
        }
    };

    Ok(PinningSettings {
        mode,
        api_url,
        credentials,
    })
}

fn legacy_environment() -> Map<String, String> {
    LEGACY_ENV
        .iter()
        .filter_map(|name| std::env::var(name).ok().map(|value| (name.to_string(), value)))
        .collect()
}

fn get_string_value(config: &Config, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        config
            .get_string(key)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}

fn get_u64(config: &Config, keys: &[&'static str], default: u64) -> Result<u64, ConfigError> {
    match get_string_value(config, keys) {
        Some(raw) => parse_u64(keys[0], &raw),
        None => Ok(default),
    }
}

fn parse_u64(key: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.parse().map_err(|err| ConfigError::Invalid {
        key,
        reason: format!("`{raw}` is not a non-negative integer: {err}"),
    })
}

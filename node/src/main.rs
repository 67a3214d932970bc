use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use deedchain_files::HttpContentFetcher;
use deedchain_ledger::{EvmGateway, EvmGatewayConfig, LedgerClient, LedgerClientConfig, LocalSigner};
use deedchain_registrar::{
    ErrorClass, LogFormat, PinningMode, PropertyRequest, RegistrarConfig, RegistrarError,
    RegistrationOrchestrator,
};
use deedchain_storage::{MemoryStorageClient, PinataClient, StorageClient};
use deedchain_types::TokenId;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn cli() -> Command {
    Command::new("deedchain")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Register and update property records anchored to pinned documents")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .value_parser(value_parser!(PathBuf))
                .help("Configuration file path")
                .global(true),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .value_parser(["trace", "debug", "info", "warn", "error"])
                .help("Override the log level")
                .global(true),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .value_parser(["pretty", "json"])
                .help("Select log output format")
                .global(true),
        )
        .subcommand(
            request_args(Command::new("register"))
                .about("Pin the documents and a manifest, then register a new property record"),
        )
        .subcommand(
            request_args(Command::new("update"))
                .about("Pin the documents and a fresh manifest, then re-anchor an existing record")
                .arg(
                    Arg::new("token-id")
                        .long("token-id")
                        .value_name("ID")
                        .value_parser(value_parser!(u64))
                        .help("Token id of the record to update"),
                ),
        )
        .subcommand(Command::new("balance").about("Print the funding account and its balance"))
}

fn request_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("request")
                .long("request")
                .value_name("FILE")
                .value_parser(value_parser!(PathBuf))
                .help("JSON request body; flags below override its fields"),
        )
        .arg(
            Arg::new("property-id")
                .long("property-id")
                .value_name("ID")
                .help("Caller-assigned property identifier"),
        )
        .arg(
            Arg::new("file-url")
                .long("file-url")
                .value_name("URL")
                .action(ArgAction::Append)
                .help("Supporting document URL (repeatable)"),
        )
        .arg(
            Arg::new("owner-name")
                .long("owner-name")
                .value_name("NAME")
                .help("Full name of the owner"),
        )
        .arg(
            Arg::new("property-name")
                .long("property-name")
                .value_name("NAME"),
        )
        .arg(
            Arg::new("property-type")
                .long("property-type")
                .value_name("TYPE"),
        )
        .arg(
            Arg::new("email")
                .long("email")
                .value_name("EMAIL")
                .help("Requester email address"),
        )
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();

    let (response, exit_code) = match execute(&matches).await {
        Ok(data) => (json!({ "success": true, "data": data }), 0),
        Err(err) => {
            let class = classify(&err);
            error!(classification = %class, "{err:#}");
            (
                json!({
                    "success": false,
                    "error": format!("{err:#}"),
                    "classification": class,
                }),
                class.exit_code(),
            )
        }
    };

    println!("{}", serde_json::to_string_pretty(&response)?);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}

async fn execute(matches: &ArgMatches) -> Result<Value> {
    let config_path = matches.get_one::<PathBuf>("config").map(PathBuf::as_path);
    let mut config = RegistrarConfig::load(config_path).map_err(RegistrarError::from)?;
    apply_log_overrides(matches, &mut config);
    init_logging(&config)?;

    match matches.subcommand() {
        Some(("register", sub)) => {
            let request = build_request(sub)?;
            let orchestrator = build_orchestrator(&config)?;
            let outcome = orchestrator.register(&request).await?;
            info!(token_id = ?outcome.token_id, tx = %outcome.transaction_hash, "property registered");
            Ok(serde_json::to_value(outcome)?)
        }
        Some(("update", sub)) => {
            let request = build_request(sub)?;
            let orchestrator = build_orchestrator(&config)?;
            let outcome = orchestrator.update(&request).await?;
            info!(token_id = ?outcome.token_id, tx = %outcome.transaction_hash, "property updated");
            Ok(serde_json::to_value(outcome)?)
        }
        Some(("balance", _)) => {
            let ledger = build_ledger(&config)?;
            let balance = ledger.get_balance().await.map_err(RegistrarError::from)?;
            Ok(json!({
                "address": ledger.address().to_checksum(),
                "balance": balance.to_ether_string(),
                "balanceWei": balance.0.to_string(),
            }))
        }
        _ => unreachable!("subcommand_required is set"),
    }
}

fn apply_log_overrides(matches: &ArgMatches, config: &mut RegistrarConfig) {
    if let Some(level) = matches.get_one::<String>("log-level") {
        config.log.level = level.clone();
    }
    if let Some(format) = matches.get_one::<String>("log-format") {
        config.log.format = if format == "json" {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        };
    }
}

// stdout carries the JSON result, so log lines go to stderr
fn init_logging(config: &RegistrarConfig) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log.level));

    match config.log.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?,
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
            .try_init()?,
    }

    Ok(())
}

fn build_request(matches: &ArgMatches) -> Result<PropertyRequest> {
    let mut request = match matches.get_one::<PathBuf>("request") {
        Some(path) => read_request(path)?,
        None => PropertyRequest::default(),
    };

    if let Some(id) = matches.get_one::<String>("property-id") {
        request.property_id = id.clone();
    }
    if let Some(urls) = matches.get_many::<String>("file-url") {
        request.file_urls = urls.cloned().collect();
    }
    if let Some(name) = matches.get_one::<String>("owner-name") {
        request.owner_name = Some(name.clone());
    }
    if let Some(name) = matches.get_one::<String>("property-name") {
        request.property_name = Some(name.clone());
    }
    if let Some(kind) = matches.get_one::<String>("property-type") {
        request.property_type = Some(kind.clone());
    }
    if let Some(email) = matches.get_one::<String>("email") {
        request.requester_email = Some(email.clone());
    }
    // only `update` defines the flag
    if let Ok(Some(token_id)) = matches.try_get_one::<u64>("token-id") {
        request.token_id = Some(TokenId(*token_id));
    }

    Ok(request)
}

fn read_request(path: &Path) -> Result<PropertyRequest> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read request file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("request file {} is not a valid request", path.display()))
}

fn build_ledger(config: &RegistrarConfig) -> Result<LedgerClient, RegistrarError> {
    let settings = &config.ledger;
    let signer = LocalSigner::from_hex(settings.signing_key.expose())?;
    let gateway = EvmGateway::new(
        EvmGatewayConfig {
            rpc_url: settings.rpc_url.clone(),
            contract: settings.contract_address,
            chain_id: settings.chain_id,
            receipt_poll_interval: settings.receipt_poll_interval,
        },
        signer,
    )?;
    let ledger = LedgerClient::new(
        Arc::new(gateway),
        LedgerClientConfig {
            registered_event: settings.registered_event.clone(),
            retry: config.retry.clone(),
        },
    );
    info!(
        account = %ledger.address().to_checksum(),
        contract = %settings.contract_address.to_checksum(),
        "ledger gateway ready"
    );
    Ok(ledger)
}

fn build_storage(config: &RegistrarConfig) -> Result<Arc<dyn StorageClient>, RegistrarError> {
    let settings = &config.pinning;
    match (settings.mode, settings.credentials.clone()) {
        (PinningMode::Pinata, Some(credentials)) => {
            Ok(Arc::new(PinataClient::new(&settings.api_url, credentials)?))
        }
        (PinningMode::Pinata, None) => Err(deedchain_registrar::ConfigError::Missing(
            "pinning.api_key",
        )
        .into()),
        (PinningMode::Memory, _) => {
            warn!("pinning to process memory; pinned content is lost on exit");
            Ok(Arc::new(MemoryStorageClient::new()))
        }
    }
}

fn build_orchestrator(config: &RegistrarConfig) -> Result<RegistrationOrchestrator, RegistrarError> {
    let fetcher = HttpContentFetcher::new(config.fetch.clone())?;
    Ok(RegistrationOrchestrator::new(
        Arc::new(fetcher),
        build_storage(config)?,
        build_ledger(config)?,
        config.pipeline,
    ))
}

fn classify(err: &anyhow::Error) -> ErrorClass {
    if let Some(err) = err.downcast_ref::<RegistrarError>() {
        return err.classification();
    }
    // an unreadable or malformed --request file is caller input
    if err.downcast_ref::<std::io::Error>().is_some()
        || err.downcast_ref::<serde_json::Error>().is_some()
    {
        return ErrorClass::Validation;
    }
    ErrorClass::Internal
}

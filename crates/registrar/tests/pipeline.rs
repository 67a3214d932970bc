use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use deedchain_files::{ContentFetcher, FetchedFile, FilesError};
use deedchain_ledger::abi::event_topic;
use deedchain_ledger::{
    ContractCall, ContractGateway, LedgerClient, LedgerClientConfig, LedgerError, LogEntry,
    TransactionReceipt, DEFAULT_REGISTERED_EVENT,
};
use deedchain_registrar::{
    Clock, ErrorClass, ManifestAssembler, PipelineConfig, PropertyRequest, RegistrarError,
    RegistrationOrchestrator, RequestError,
};
use deedchain_storage::MemoryStorageClient;
use deedchain_types::{
    file_name_from_url, Address, ContentId, DocumentKind, RetryPolicy, TokenId, TransactionHash,
    Wei,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

const CONTRACT: Address = Address([0xcc; 20]);
const ACCOUNT: Address = Address([0xaa; 20]);

#[derive(Clone)]
enum Behaviour {
    Delay(Duration),
    TooLarge,
    Unreachable,
}

#[derive(Default)]
struct MockFetcher {
    behaviours: HashMap<String, Behaviour>,
    calls: Mutex<Vec<String>>,
}

impl MockFetcher {
    fn with(mut self, url: &str, behaviour: Behaviour) -> Self {
        self.behaviours.insert(url.to_string(), behaviour);
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ContentFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> deedchain_files::Result<FetchedFile> {
        self.calls.lock().push(url.to_string());
        let file_name = file_name_from_url(url).to_string();
        match self.behaviours.get(url).cloned() {
            Some(Behaviour::Delay(delay)) => tokio::time::sleep(delay).await,
            Some(Behaviour::TooLarge) => {
                return Err(FilesError::PayloadTooLarge {
                    file_name,
                    size: 11 * 1024 * 1024,
                    limit: 10 * 1024 * 1024,
                })
            }
            Some(Behaviour::Unreachable) => {
                return Err(FilesError::FetchFailed {
                    url: url.to_string(),
                    cause: "connection refused".to_string(),
                    retryable: true,
                })
            }
            None => {}
        }
        let kind = DocumentKind::from_url(url)
            .ok_or_else(|| FilesError::UnsupportedFileType {
                urls: vec![url.to_string()],
            })?;
        Ok(FetchedFile {
            file_name,
            mime_type: kind.mime_type.to_string(),
            bytes: format!("contents of {url}").into_bytes(),
        })
    }
}

#[derive(Default)]
struct GatewayState {
    next_token_id: u64,
    submitted: Vec<ContractCall>,
    balance_reads: u32,
    in_flight: u32,
    max_in_flight: u32,
}

struct MockGateway {
    balance: Wei,
    emit_event: bool,
    cids_used: bool,
    submit_error: Option<String>,
    state: Mutex<GatewayState>,
}

impl MockGateway {
    fn new(balance: &str) -> Self {
        Self {
            balance: Wei::from_ether_str(balance).unwrap(),
            emit_event: true,
            cids_used: false,
            submit_error: None,
            state: Mutex::new(GatewayState {
                next_token_id: 10,
                ..GatewayState::default()
            }),
        }
    }

    fn submissions(&self) -> Vec<ContractCall> {
        self.state.lock().submitted.clone()
    }
}

fn word(value: u64) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&value.to_be_bytes());
    word
}

#[async_trait]
impl ContractGateway for MockGateway {
    fn account(&self) -> Address {
        ACCOUNT
    }

    fn contract(&self) -> Address {
        CONTRACT
    }

    async fn balance(&self) -> deedchain_ledger::Result<Wei> {
        self.state.lock().balance_reads += 1;
        Ok(self.balance)
    }

    async fn gas_price(&self) -> deedchain_ledger::Result<Wei> {
        Ok(Wei::from_gwei(100))
    }

    // 100_000 gas at 100 gwei is 0.01 ETH
    async fn estimate_gas(&self, _call: &ContractCall) -> deedchain_ledger::Result<u64> {
        Ok(100_000)
    }

    async fn is_cid_used(&self, _cid: &ContentId) -> deedchain_ledger::Result<bool> {
        Ok(self.cids_used)
    }

    async fn next_token_id(&self) -> deedchain_ledger::Result<u64> {
        Ok(self.state.lock().next_token_id)
    }

    async fn submit(&self, call: &ContractCall) -> deedchain_ledger::Result<TransactionHash> {
        if let Some(message) = &self.submit_error {
            return Err(LedgerError::Rpc {
                code: -32000,
                message: message.clone(),
            });
        }
        let mut state = self.state.lock();
        state.submitted.push(call.clone());
        state.in_flight += 1;
        state.max_in_flight = state.max_in_flight.max(state.in_flight);
        if matches!(call, ContractCall::RegisterLand { .. }) {
            state.next_token_id += 1;
        }
        let mut hash = [0u8; 32];
        hash[31] = state.submitted.len() as u8;
        Ok(TransactionHash(hash))
    }

    async fn wait_for_receipt(
        &self,
        hash: &TransactionHash,
    ) -> deedchain_ledger::Result<TransactionReceipt> {
        tokio::time::sleep(Duration::from_millis(20)).await;
        let minted = {
            let mut state = self.state.lock();
            state.in_flight -= 1;
            state.next_token_id - 1
        };
        let logs = if self.emit_event {
            vec![LogEntry {
                address: CONTRACT,
                topics: vec![event_topic(DEFAULT_REGISTERED_EVENT), word(minted)],
                data: Vec::new(),
            }]
        } else {
            Vec::new()
        };
        Ok(TransactionReceipt {
            transaction_hash: *hash,
            success: true,
            block_number: Some(1),
            gas_used: Some(90_000),
            logs,
        })
    }
}

struct FixedClock(DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

struct Harness {
    fetcher: Arc<MockFetcher>,
    storage: MemoryStorageClient,
    gateway: Arc<MockGateway>,
    orchestrator: RegistrationOrchestrator,
}

fn harness(fetcher: MockFetcher, gateway: MockGateway) -> Harness {
    let fetcher = Arc::new(fetcher);
    let storage = MemoryStorageClient::new();
    let gateway = Arc::new(gateway);
    let ledger = LedgerClient::new(
        gateway.clone(),
        LedgerClientConfig {
            registered_event: DEFAULT_REGISTERED_EVENT.to_string(),
            retry: RetryPolicy::none(),
        },
    );
    let clock = FixedClock(Utc.with_ymd_and_hms(2024, 5, 1, 10, 20, 30).unwrap());
    let orchestrator = RegistrationOrchestrator::new(
        fetcher.clone(),
        Arc::new(storage.clone()),
        ledger,
        PipelineConfig::default(),
    )
    .with_assembler(ManifestAssembler::new(Arc::new(clock)));
    Harness {
        fetcher,
        storage,
        gateway,
        orchestrator,
    }
}

fn urls(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|url| url.to_string()).collect()
}

#[tokio::test]
async fn test_register_dedups_batch_and_records_outcome() {
    let h = harness(MockFetcher::default(), MockGateway::new("1"));
    let request = PropertyRequest::new(
        "prop-1",
        urls(&["https://x/doc.pdf", "https://x/doc.pdf", "https://x/img.png"]),
    )
    .with_owner_name("Ada Lovelace")
    .with_requester_email("ada@example.com");

    let outcome = h.orchestrator.register(&request).await.unwrap();

    let names: Vec<&str> = outcome.documents.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["doc.pdf", "img.png"]);
    assert_eq!(outcome.documents[0].document_kind, "application/pdf");
    assert_eq!(outcome.documents[1].document_kind, "image/png");
    assert_eq!(outcome.token_id, Some(TokenId(10)));
    assert_eq!(outcome.warnings, vec!["Removed 1 duplicate URLs from request"]);
    assert_eq!(h.fetcher.calls().len(), 2);

    // two files plus the manifest
    assert_eq!(h.storage.pin_count(), 3);
    assert_eq!(
        h.storage.pinned_names().last().map(String::as_str),
        Some("metadata-prop-1-1714558830000")
    );
    assert_eq!(
        h.gateway.submissions(),
        vec![ContractCall::RegisterLand {
            cid: outcome.manifest_cid.clone()
        }]
    );

    let stored = h.storage.get(&outcome.manifest_cid).unwrap();
    let manifest: serde_json::Value = serde_json::from_slice(&stored).unwrap();
    assert_eq!(manifest["propertyOwnerName"], "Ada Lovelace");
    assert_eq!(manifest["documents"][1]["cid"], outcome.documents[1].content_id.as_str());
}

#[tokio::test]
async fn test_unsupported_types_fail_before_any_network_call() {
    let h = harness(MockFetcher::default(), MockGateway::new("1"));
    let request = PropertyRequest::new(
        "prop-1",
        urls(&["https://x/a.pdf", "https://x/setup.exe", "https://x/README"]),
    );

    let err = h.orchestrator.register(&request).await.unwrap_err();
    assert_eq!(err.classification(), ErrorClass::Validation);
    match err {
        RegistrarError::Files(FilesError::UnsupportedFileType { urls }) => {
            assert_eq!(urls, vec!["https://x/setup.exe", "https://x/README"]);
        }
        other => panic!("expected UnsupportedFileType, got {other:?}"),
    }
    assert!(h.fetcher.calls().is_empty());
    assert_eq!(h.storage.pin_count(), 0);
    assert_eq!(h.gateway.state.lock().balance_reads, 0);
}

#[tokio::test]
async fn test_oversized_payload_is_never_pinned() {
    let fetcher = MockFetcher::default().with("https://x/huge.pdf", Behaviour::TooLarge);
    let h = harness(fetcher, MockGateway::new("1"));
    let request = PropertyRequest::new("prop-1", urls(&["https://x/huge.pdf"]));

    let err = h.orchestrator.register(&request).await.unwrap_err();
    assert!(matches!(
        err,
        RegistrarError::Files(FilesError::PayloadTooLarge { .. })
    ));
    assert_eq!(err.classification(), ErrorClass::Validation);
    assert_eq!(h.storage.pin_count(), 0);
}

#[tokio::test]
async fn test_fetch_failure_stops_before_manifest() {
    let fetcher = MockFetcher::default().with("https://x/b.pdf", Behaviour::Unreachable);
    let h = harness(fetcher, MockGateway::new("1"));
    let request = PropertyRequest::new("prop-1", urls(&["https://x/a.pdf", "https://x/b.pdf"]));

    let err = h.orchestrator.register(&request).await.unwrap_err();
    assert_eq!(err.classification(), ErrorClass::ServiceUnavailable);
    assert!(!h
        .storage
        .pinned_names()
        .iter()
        .any(|name| name.starts_with("metadata-")));
    assert!(h.gateway.submissions().is_empty());
}

#[tokio::test]
async fn test_insufficient_funds_blocks_submission() {
    let h = harness(MockFetcher::default(), MockGateway::new("0.001"));
    let request = PropertyRequest::new("prop-1", urls(&["https://x/doc.pdf"]));

    let err = h.orchestrator.register(&request).await.unwrap_err();
    assert_eq!(err.classification(), ErrorClass::InsufficientFunds);
    match &err {
        RegistrarError::Ledger(LedgerError::InsufficientFunds {
            balance, required, ..
        }) => {
            assert_eq!(*balance, Wei::from_ether_str("0.001").unwrap());
            assert_eq!(*required, Some(Wei::from_ether_str("0.01").unwrap()));
        }
        other => panic!("expected InsufficientFunds, got {other:?}"),
    }
    let message = err.to_string();
    assert!(message.contains("0.001 ETH"));
    assert!(message.contains("0.01 ETH"));
    assert!(h.gateway.submissions().is_empty());
    // the manifest was pinned before the funds check
    assert_eq!(h.storage.pin_count(), 2);
}

#[tokio::test]
async fn test_used_cid_is_rejected_without_submission() {
    let mut gateway = MockGateway::new("1");
    gateway.cids_used = true;
    let h = harness(MockFetcher::default(), gateway);
    let request = PropertyRequest::new("prop-1", urls(&["https://x/doc.pdf"]));

    let err = h.orchestrator.register(&request).await.unwrap_err();
    assert!(matches!(
        err,
        RegistrarError::Ledger(LedgerError::CidAlreadyUsed(_))
    ));
    assert_eq!(err.classification(), ErrorClass::Rejected);
    assert!(h.gateway.submissions().is_empty());
}

#[tokio::test]
async fn test_token_id_falls_back_to_counter() {
    let mut gateway = MockGateway::new("1");
    gateway.emit_event = false;
    let h = harness(MockFetcher::default(), gateway);
    let request = PropertyRequest::new("prop-1", urls(&["https://x/doc.pdf"]));

    let outcome = h.orchestrator.register(&request).await.unwrap();
    // counter read after confirmation is 11
    assert_eq!(outcome.token_id, Some(TokenId(10)));
    assert_eq!(outcome.warnings.len(), 1);
    assert!(outcome.warnings[0].contains("inferred"));
}

#[tokio::test]
async fn test_update_without_token_id_fails_before_network() {
    let h = harness(MockFetcher::default(), MockGateway::new("1"));
    let request = PropertyRequest::new("prop-1", urls(&["https://x/doc.pdf"]));

    let err = h.orchestrator.update(&request).await.unwrap_err();
    assert!(matches!(
        err,
        RegistrarError::Request(RequestError::MissingTokenId)
    ));
    assert_eq!(err.classification(), ErrorClass::Validation);
    assert!(h.fetcher.calls().is_empty());
    assert_eq!(h.storage.pin_count(), 0);
    assert_eq!(h.gateway.state.lock().balance_reads, 0);
}

#[tokio::test]
async fn test_update_submits_for_given_token() {
    let mut gateway = MockGateway::new("1");
    // updates skip the duplicate probe
    gateway.cids_used = true;
    let h = harness(MockFetcher::default(), gateway);
    let request = PropertyRequest::new("prop-1", urls(&["https://x/doc.pdf"]))
        .with_token_id(TokenId(3));

    let outcome = h.orchestrator.update(&request).await.unwrap();
    assert_eq!(outcome.token_id, Some(TokenId(3)));
    assert!(outcome.warnings.is_empty());
    assert_eq!(
        h.gateway.submissions(),
        vec![ContractCall::UpdateProperty {
            token_id: TokenId(3),
            cid: outcome.manifest_cid.clone()
        }]
    );
    assert!(h.gateway.state.lock().balance_reads >= 1);
}

#[tokio::test]
async fn test_invalid_email_is_a_validation_error() {
    let h = harness(MockFetcher::default(), MockGateway::new("1"));
    let request = PropertyRequest::new("prop-1", urls(&["https://x/doc.pdf"]))
        .with_requester_email("not-an-email");

    let err = h.orchestrator.register(&request).await.unwrap_err();
    assert_eq!(err.classification(), ErrorClass::Validation);
    assert!(h.fetcher.calls().is_empty());
}

#[tokio::test]
async fn test_documents_keep_input_order_under_parallel_fetch() {
    let fetcher = MockFetcher::default().with("https://x/1.pdf", Behaviour::Delay(Duration::from_millis(60)));
    let h = harness(fetcher, MockGateway::new("1"));
    let request = PropertyRequest::new(
        "prop-1",
        urls(&["https://x/1.pdf", "https://x/2.png", "https://x/3.csv", "https://x/4.txt"]),
    );

    let outcome = h.orchestrator.register(&request).await.unwrap();
    let names: Vec<&str> = outcome.documents.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["1.pdf", "2.png", "3.csv", "4.txt"]);
    // the slow first file did not hold back the others
    assert_eq!(h.storage.pinned_names()[3], "1.pdf");
}

#[tokio::test]
async fn test_concurrent_invocations_submit_one_at_a_time() {
    let h = harness(MockFetcher::default(), MockGateway::new("1"));
    let first = PropertyRequest::new("prop-a", urls(&["https://x/a.pdf"]));
    let second = PropertyRequest::new("prop-b", urls(&["https://x/b.pdf"]));

    let (a, b) = tokio::join!(
        h.orchestrator.register(&first),
        h.orchestrator.register(&second)
    );
    let mut ids = vec![a.unwrap().token_id.unwrap(), b.unwrap().token_id.unwrap()];
    ids.sort();
    assert_eq!(ids, vec![TokenId(10), TokenId(11)]);

    let state = h.gateway.state.lock();
    assert_eq!(state.submitted.len(), 2);
    assert_eq!(state.max_in_flight, 1);
}

#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_every_stage_transition_is_logged() {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let h = harness(MockFetcher::default(), MockGateway::new("1"));
    let request = PropertyRequest::new("prop-1", urls(&["https://x/a.pdf", "https://x/b.png"]));
    h.orchestrator.register(&request).await.unwrap();

    let output = String::from_utf8(logs.0.lock().clone()).unwrap();
    let stages = [
        "validating",
        "fetching",
        "pinning",
        "manifest_building",
        "manifest_pinning",
        "funds_checking",
        "submitting",
        "confirmed",
    ];
    let mut last = 0;
    for stage in stages {
        let needle = format!("stage={stage}");
        assert_eq!(output.matches(needle.as_str()).count(), 1, "{stage}\n{output}");
        let at = output.find(needle.as_str()).unwrap();
        assert!(at >= last, "{stage} logged out of order\n{output}");
        last = at;
    }
}

#[tokio::test]
async fn test_rejected_submission_is_not_a_funds_failure() {
    let mut gateway = MockGateway::new("1");
    gateway.submit_error = Some("insufficient funds for gas * price + value".to_string());
    let h = harness(MockFetcher::default(), gateway);
    let request = PropertyRequest::new("prop-1", urls(&["https://x/doc.pdf"]));

    let err = h.orchestrator.register(&request).await.unwrap_err();
    assert!(matches!(
        err,
        RegistrarError::Ledger(LedgerError::SubmissionFailed(_))
    ));
    assert_ne!(err.classification(), ErrorClass::InsufficientFunds);
    assert_eq!(err.classification(), ErrorClass::Rejected);
    // the advisory check passed before the node refused the transaction
    assert!(h.gateway.state.lock().balance_reads >= 1);
}

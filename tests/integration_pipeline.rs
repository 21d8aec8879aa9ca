use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio::time::timeout;

use raydium_pool_notifier::blockchain::{
    EventOutcome, EventPipeline, RejectReason, SkipReason, TransactionSource,
};
use raydium_pool_notifier::config::AppConfig;
use raydium_pool_notifier::error::{DeliveryError, LookupError, RpcError};
use raydium_pool_notifier::lookup::{MetadataLookup, ProfileLookup};
use raydium_pool_notifier::models::{
    ChannelDestination, LogEvent, ParsedInstruction, Tier, TokenMetadata, TokenProfile, TransactionDetail,
};
use raydium_pool_notifier::notify::MessageSender;

const RAYDIUM: &str = "675kPX9MHTjS2zt1qfr1NYHuzeLXfQM9H24wFSUt1Mp8";
const WSOL: &str = "So11111111111111111111111111111111111111112";

/// Transactions keyed by signature; unknown signatures are not found
#[derive(Default)]
struct InMemoryChain {
    transactions: HashMap<String, TransactionDetail>,
    calls: Mutex<u32>,
}

impl InMemoryChain {
    fn with_pool(mut self, signature: &str, mint_a: &str, mint_b: &str, pair: &str) -> Self {
        let mut accounts: Vec<String> = (0..21).map(|i| format!("Account{:02}", i)).collect();
        accounts[4] = pair.to_string();
        accounts[8] = mint_a.to_string();
        accounts[9] = mint_b.to_string();

        let detail = TransactionDetail {
            signature: Some(signature.to_string()),
            slot: Some(250_000_001),
            block_time: None,
            instructions: vec![
                ParsedInstruction {
                    program_id: "ComputeBudget111111111111111111111111111111".to_string(),
                    accounts: None,
                },
                ParsedInstruction {
                    program_id: RAYDIUM.to_string(),
                    accounts: Some(accounts),
                },
            ],
        };
        self.transactions.insert(signature.to_string(), detail);
        self
    }

    fn calls(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl TransactionSource for InMemoryChain {
    async fn get_transaction(&self, signature: &str) -> Result<Option<TransactionDetail>, RpcError> {
        *self.calls.lock().unwrap() += 1;
        Ok(self.transactions.get(signature).cloned())
    }
}

/// Stalls on one signature and signals every other fetch
struct StallingChain {
    inner: InMemoryChain,
    stalled: String,
    fetched: Arc<Notify>,
}

#[async_trait]
impl TransactionSource for StallingChain {
    async fn get_transaction(&self, signature: &str) -> Result<Option<TransactionDetail>, RpcError> {
        if signature == self.stalled {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        } else {
            self.fetched.notify_one();
        }
        self.inner.get_transaction(signature).await
    }
}

#[derive(Default)]
struct StaticLookups {
    approved: Vec<String>,
    metadata: HashMap<String, TokenMetadata>,
}

#[async_trait]
impl ProfileLookup for StaticLookups {
    async fn get_token_profile(&self, address: &str) -> Result<TokenProfile, LookupError> {
        Ok(TokenProfile {
            approved: self.approved.iter().any(|a| a == address),
        })
    }
}

#[async_trait]
impl MetadataLookup for StaticLookups {
    async fn get_token_metadata(&self, address: &str) -> Result<Option<TokenMetadata>, LookupError> {
        Ok(self.metadata.get(address).cloned())
    }
}

#[derive(Default)]
struct Outbox {
    sent: Mutex<Vec<(String, Option<i64>, String)>>,
}

impl Outbox {
    fn sent(&self) -> Vec<(String, Option<i64>, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageSender for Outbox {
    async fn send_message(
        &self,
        destination: &ChannelDestination,
        text: &str,
        _parse_mode: &str,
    ) -> Result<(), DeliveryError> {
        self.sent
            .lock()
            .unwrap()
            .push((destination.chat_id.clone(), destination.thread_id, text.to_string()));
        Ok(())
    }
}

fn app_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.telegram.unverified_channel = "-100111_7".to_string();
    config.telegram.verified_channel = "-100222_8".to_string();
    config.telegram.broadcast_channel = Some("-100333".to_string());
    config
}

fn launch_event(signature: &str) -> LogEvent {
    LogEvent::new(
        signature,
        vec![
            format!("Program {} invoke [1]", RAYDIUM),
            "Program log: initialize2: InitializeInstruction2 { nonce: 254 }".to_string(),
        ],
    )
}

fn build(chain: InMemoryChain, lookups: StaticLookups) -> (EventPipeline, Arc<InMemoryChain>, Arc<Outbox>) {
    let chain = Arc::new(chain);
    let lookups = Arc::new(lookups);
    let outbox = Arc::new(Outbox::default());
    let pipeline = EventPipeline::from_config(
        &app_config(),
        chain.clone(),
        lookups.clone(),
        lookups,
        outbox.clone(),
    )
    .expect("valid routing config");
    (pipeline, chain, outbox)
}

#[tokio::test]
async fn test_verified_launch_reaches_both_channels() {
    let chain = InMemoryChain::default().with_pool("S1", "ABCpump", WSOL, "PAIR1");
    let lookups = StaticLookups {
        approved: vec!["ABCpump".to_string()],
        metadata: HashMap::from([(
            "ABCpump".to_string(),
            TokenMetadata {
                name: Some("Alpha".to_string()),
                symbol: Some("ABC".to_string()),
            },
        )]),
    };
    let (pipeline, _, outbox) = build(chain, lookups);

    let outcome = pipeline.handle_event(&launch_event("S1")).await;

    match outcome {
        EventOutcome::Notified(report) => {
            assert_eq!(report.tier, Tier::Verified);
            assert_eq!(report.channels(), vec!["-100222_8", "-100333"]);
        }
        other => panic!("unexpected outcome {:?}", other),
    }

    let sent = outbox.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!((sent[0].0.as_str(), sent[0].1), ("-100222", Some(8)));
    assert_eq!((sent[1].0.as_str(), sent[1].1), ("-100333", None));
    assert!(sent[0].2.contains("*ABC* | Alpha"));
    assert!(sent[0].2.contains("✅ Dexpaid"));
    assert!(sent[0].2.contains("`ABCpump`"));
    assert!(sent[0].2.contains("dexscreener.com/solana/PAIR1"));
    assert_eq!(sent[0].2, sent[1].2);
}

#[tokio::test]
async fn test_unverified_launch_reaches_one_channel() {
    let chain = InMemoryChain::default().with_pool("S2", WSOL, "XYZpump", "PAIR2");
    let (pipeline, _, outbox) = build(chain, StaticLookups::default());

    let outcome = pipeline.handle_event(&launch_event("S2")).await;
    assert!(matches!(outcome, EventOutcome::Notified(ref r) if r.tier == Tier::Unverified));

    let sent = outbox.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!((sent[0].0.as_str(), sent[0].1), ("-100111", Some(7)));
    assert!(!sent[0].2.contains("Dexpaid"));
    assert!(sent[0].2.contains("`XYZpump`"));
}

#[tokio::test]
async fn test_pool_without_candidate_sends_nothing() {
    let chain = InMemoryChain::default().with_pool("S3", WSOL, "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v", "PAIR3");
    let (pipeline, _, outbox) = build(chain, StaticLookups::default());

    let outcome = pipeline.handle_event(&launch_event("S3")).await;

    assert!(matches!(outcome, EventOutcome::Skipped(SkipReason::NotCandidate)));
    assert!(outbox.sent().is_empty());
}

#[tokio::test]
async fn test_duplicate_and_errored_events_never_fetch() {
    let chain = InMemoryChain::default().with_pool("S4", "ABCpump", WSOL, "PAIR4");
    let (pipeline, chain, outbox) = build(chain, StaticLookups::default());

    pipeline.handle_event(&launch_event("S4")).await;
    let again = pipeline.handle_event(&launch_event("S4")).await;
    assert!(matches!(again, EventOutcome::Rejected(RejectReason::Duplicate)));

    let failed = launch_event("S5").with_error(json!({"InstructionError": [0, "Custom"]}));
    let outcome = pipeline.handle_event(&failed).await;
    assert!(matches!(outcome, EventOutcome::Rejected(RejectReason::Errored)));

    let unrelated = LogEvent::new("S6", vec!["Program log: swap".to_string()]);
    let outcome = pipeline.handle_event(&unrelated).await;
    assert!(matches!(outcome, EventOutcome::Rejected(RejectReason::NoMarker)));

    assert_eq!(chain.calls(), 1);
    assert_eq!(outbox.sent().len(), 1);

    let stats = pipeline.stats().snapshot();
    assert_eq!(stats.events_received, 4);
    assert_eq!(stats.events_accepted, 1);
    assert_eq!(stats.rejected_duplicate, 1);
    assert_eq!(stats.rejected_errored, 1);
    assert_eq!(stats.rejected_no_marker, 1);
    assert_eq!(stats.notified_unverified, 1);
}

#[tokio::test]
async fn test_missing_transaction_is_dropped() {
    let (pipeline, chain, outbox) = build(InMemoryChain::default(), StaticLookups::default());

    let outcome = pipeline.handle_event(&launch_event("UNKNOWN")).await;

    assert!(matches!(outcome, EventOutcome::Failed(_)));
    assert_eq!(chain.calls(), 1);
    assert!(outbox.sent().is_empty());
    assert_eq!(pipeline.stats().snapshot().fetch_failures, 1);
}

#[tokio::test]
async fn test_run_consumes_channel_until_closed() {
    let chain = InMemoryChain::default()
        .with_pool("R1", "AAApump", WSOL, "PAIRA")
        .with_pool("R2", WSOL, "BBBpump", "PAIRB");
    let (pipeline, _, outbox) = build(chain, StaticLookups::default());
    let pipeline = Arc::new(pipeline);

    let (sender, receiver) = mpsc::channel(16);
    let runner = tokio::spawn(pipeline.clone().run(receiver));

    for signature in ["R1", "R1", "R2"] {
        sender.send(launch_event(signature)).await.unwrap();
    }
    drop(sender);

    timeout(Duration::from_secs(5), runner)
        .await
        .expect("pipeline should stop once the channel closes")
        .unwrap();

    let mut tokens: Vec<bool> = outbox
        .sent()
        .iter()
        .map(|(_, _, body)| body.contains("AAApump"))
        .collect();
    tokens.sort();
    assert_eq!(tokens, vec![false, true]);

    let stats = pipeline.stats().snapshot();
    assert_eq!(stats.events_received, 3);
    assert_eq!(stats.rejected_duplicate, 1);
    assert_eq!(stats.notified_unverified, 2);
    assert_eq!(stats.deliveries_succeeded, 2);
}

#[tokio::test]
async fn test_shutdown_stops_intake() {
    let (pipeline, _, _) = build(InMemoryChain::default(), StaticLookups::default());
    let pipeline = Arc::new(pipeline);

    let (_sender, receiver) = mpsc::channel::<LogEvent>(4);
    let runner = tokio::spawn(pipeline.clone().run(receiver));

    pipeline.shutdown();

    timeout(Duration::from_secs(5), runner)
        .await
        .expect("pipeline should observe the shutdown flag")
        .unwrap();
}

#[tokio::test]
async fn test_slow_fetch_does_not_hold_back_next_event() {
    let fetched = Arc::new(Notify::new());
    let chain = Arc::new(StallingChain {
        inner: InMemoryChain::default()
            .with_pool("A", "AAApump", WSOL, "PAIRA")
            .with_pool("B", WSOL, "BBBpump", "PAIRB"),
        stalled: "A".to_string(),
        fetched: fetched.clone(),
    });
    let lookups = Arc::new(StaticLookups::default());
    let pipeline = EventPipeline::from_config(
        &app_config(),
        chain,
        lookups.clone(),
        lookups,
        Arc::new(Outbox::default()),
    )
    .expect("valid routing config");
    let pipeline = Arc::new(pipeline);

    let (sender, receiver) = mpsc::channel(16);
    let runner = tokio::spawn(pipeline.clone().run(receiver));

    sender.send(launch_event("A")).await.unwrap();
    sender.send(launch_event("B")).await.unwrap();

    timeout(Duration::from_secs(2), fetched.notified())
        .await
        .expect("B should be fetched while A is still in flight");
    assert_eq!(pipeline.stats().snapshot().events_accepted, 2);

    runner.abort();
}

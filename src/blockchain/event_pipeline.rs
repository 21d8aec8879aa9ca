use log::{debug, error, info};
use serde::Serialize;
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::blockchain::{BackoffFetcher, FetchError, SignatureCache, TokenClassifier, TransactionSource};
use crate::config::{AppConfig, WatcherConfig};
use crate::error::DeliveryError;
use crate::logging::{LogContext, MetricsLogger};
use crate::lookup::{MetadataLookup, ProfileLookup};
use crate::models::{DispatchReport, LogEvent, Tier};
use crate::notify::{MessageFormatter, MessageSender, NotificationRouter, RoutingTable};
use crate::retry::RetryConfig;

const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub program_address: String,
    pub instruction_marker: String,
    pub cache_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from(&WatcherConfig::default())
    }
}

impl From<&WatcherConfig> for PipelineConfig {
    fn from(config: &WatcherConfig) -> Self {
        Self {
            program_address: config.program_address.clone(),
            instruction_marker: config.instruction_marker.clone(),
            cache_capacity: config.cache_capacity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The transaction failed on chain
    Errored,
    /// No log line mentions the instruction marker
    NoMarker,
    /// Signature already processed
    Duplicate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No top-level instruction for the watched program
    NoInstruction,
    /// The matched instruction came back without an account list
    NoAccounts,
    /// Neither pool mint is a candidate token
    NotCandidate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Accepted { signature: String },
    Rejected(RejectReason),
}

/// What happened to one log event
#[derive(Debug)]
pub enum EventOutcome {
    Rejected(RejectReason),
    Notified(DispatchReport),
    Skipped(SkipReason),
    Failed(FetchError),
}

/// Process-lifetime counters, folded from event outcomes
#[derive(Debug, Default)]
pub struct PipelineStats {
    events_received: AtomicU64,
    events_accepted: AtomicU64,
    rejected_errored: AtomicU64,
    rejected_no_marker: AtomicU64,
    rejected_duplicate: AtomicU64,
    notified_verified: AtomicU64,
    notified_unverified: AtomicU64,
    skipped: AtomicU64,
    fetch_failures: AtomicU64,
    deliveries_succeeded: AtomicU64,
    deliveries_failed: AtomicU64,
    cache_clears: AtomicU64,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub events_received: u64,
    pub events_accepted: u64,
    pub rejected_errored: u64,
    pub rejected_no_marker: u64,
    pub rejected_duplicate: u64,
    pub notified_verified: u64,
    pub notified_unverified: u64,
    pub skipped: u64,
    pub fetch_failures: u64,
    pub deliveries_succeeded: u64,
    pub deliveries_failed: u64,
    pub cache_clears: u64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }

    pub fn record_outcome(&self, outcome: &EventOutcome) {
        match outcome {
            EventOutcome::Rejected(RejectReason::Errored) => Self::bump(&self.rejected_errored, 1),
            EventOutcome::Rejected(RejectReason::NoMarker) => Self::bump(&self.rejected_no_marker, 1),
            EventOutcome::Rejected(RejectReason::Duplicate) => Self::bump(&self.rejected_duplicate, 1),
            EventOutcome::Notified(report) => {
                match report.tier {
                    Tier::Verified => Self::bump(&self.notified_verified, 1),
                    _ => Self::bump(&self.notified_unverified, 1),
                }
                Self::bump(&self.deliveries_succeeded, report.delivered_count() as u64);
                Self::bump(&self.deliveries_failed, report.failed_count() as u64);
            }
            EventOutcome::Skipped(_) => Self::bump(&self.skipped, 1),
            EventOutcome::Failed(_) => Self::bump(&self.fetch_failures, 1),
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            events_received: self.events_received.load(Ordering::Relaxed),
            events_accepted: self.events_accepted.load(Ordering::Relaxed),
            rejected_errored: self.rejected_errored.load(Ordering::Relaxed),
            rejected_no_marker: self.rejected_no_marker.load(Ordering::Relaxed),
            rejected_duplicate: self.rejected_duplicate.load(Ordering::Relaxed),
            notified_verified: self.notified_verified.load(Ordering::Relaxed),
            notified_unverified: self.notified_unverified.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            deliveries_succeeded: self.deliveries_succeeded.load(Ordering::Relaxed),
            deliveries_failed: self.deliveries_failed.load(Ordering::Relaxed),
            cache_clears: self.cache_clears.load(Ordering::Relaxed),
        }
    }
}

/// Drives each log event through dedup, fetch, classification and routing
pub struct EventPipeline {
    cache: Mutex<SignatureCache>,
    fetcher: BackoffFetcher,
    classifier: TokenClassifier,
    router: NotificationRouter,
    formatter: MessageFormatter,
    pub config: PipelineConfig,
    stats: Arc<PipelineStats>,
    pub shutdown_signal: Arc<AtomicBool>,
}

impl EventPipeline {
    pub fn new(
        config: PipelineConfig,
        fetcher: BackoffFetcher,
        classifier: TokenClassifier,
        router: NotificationRouter,
        formatter: MessageFormatter,
    ) -> Self {
        Self {
            cache: Mutex::new(SignatureCache::new(config.cache_capacity)),
            fetcher,
            classifier,
            router,
            formatter,
            config,
            stats: Arc::new(PipelineStats::new()),
            shutdown_signal: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Wire a pipeline from configuration and the external adapters
    pub fn from_config(
        app: &AppConfig,
        source: Arc<dyn TransactionSource>,
        profiles: Arc<dyn ProfileLookup>,
        metadata: Arc<dyn MetadataLookup>,
        sender: Arc<dyn MessageSender>,
    ) -> Result<Self, DeliveryError> {
        let routes = RoutingTable::from_config(&app.telegram)?;
        Ok(Self::new(
            PipelineConfig::from(&app.watcher),
            BackoffFetcher::new(source, RetryConfig::from_rpc_config(&app.rpc)),
            TokenClassifier::new(profiles, metadata, app.classifier.clone()),
            NotificationRouter::new(sender, routes, &app.telegram.parse_mode),
            MessageFormatter::from_config(&app.telegram),
        ))
    }

    pub fn stats(&self) -> Arc<PipelineStats> {
        Arc::clone(&self.stats)
    }

    /// Synchronous accept/reject decision; records accepted signatures.
    pub fn admit(&self, event: &LogEvent) -> Admission {
        self.stats.events_received.fetch_add(1, Ordering::Relaxed);

        let reason = if event.has_error() {
            Some(RejectReason::Errored)
        } else if !event.contains_marker(&self.config.instruction_marker) {
            Some(RejectReason::NoMarker)
        } else {
            let mut cache = self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            if cache.seen(&event.signature) {
                Some(RejectReason::Duplicate)
            } else {
                if cache.record(&event.signature) {
                    self.stats.cache_clears.fetch_add(1, Ordering::Relaxed);
                }
                None
            }
        };

        match reason {
            Some(reason) => {
                MetricsLogger::log_event_rejected(&event.signature, &format!("{:?}", reason));
                self.stats.record_outcome(&EventOutcome::Rejected(reason));
                Admission::Rejected(reason)
            }
            None => {
                self.stats.events_accepted.fetch_add(1, Ordering::Relaxed);
                MetricsLogger::log_event_accepted(&event.signature, event.slot);
                Admission::Accepted {
                    signature: event.signature.clone(),
                }
            }
        }
    }

    /// Fetch, classify and route one accepted signature
    pub async fn process(&self, signature: &str) -> EventOutcome {
        let outcome = self.process_inner(signature).await;
        self.stats.record_outcome(&outcome);
        outcome
    }

    async fn process_inner(&self, signature: &str) -> EventOutcome {
        let context = LogContext::new("event_pipeline", "process").with_signature(signature);

        let detail = match self.fetcher.fetch(signature).await {
            Ok(detail) => detail,
            Err(e) => {
                let context = context.with_metadata("category", json!(format!("{:?}", e.category())));
                match e {
                    FetchError::NotFound { .. } => context.debug(&format!("Dropping event: {}", e)),
                    _ => context.warn(&format!("Dropping event: {}", e)),
                }
                return EventOutcome::Failed(e);
            }
        };

        let Some(instruction) = detail.find_instruction(&self.config.program_address) else {
            context.debug("No instruction for the watched program in transaction");
            return EventOutcome::Skipped(SkipReason::NoInstruction);
        };

        let Some(accounts) = instruction.accounts.as_deref() else {
            context.debug("Matched instruction has no account list");
            return EventOutcome::Skipped(SkipReason::NoAccounts);
        };

        let classification = self.classifier.classify(accounts).await;
        let Some(body) = self.formatter.format(&classification) else {
            return EventOutcome::Skipped(SkipReason::NotCandidate);
        };

        let report = self.router.dispatch(classification.tier, &body).await;
        context
            .with_tier(&report.tier.to_string())
            .with_metadata("delivered", json!(report.delivered_count()))
            .with_metadata("failed", json!(report.failed_count()))
            .info("Pool notification dispatched");

        EventOutcome::Notified(report)
    }

    /// `admit` followed by `process`, awaited inline
    pub async fn handle_event(&self, event: &LogEvent) -> EventOutcome {
        match self.admit(event) {
            Admission::Accepted { signature } => self.process(&signature).await,
            Admission::Rejected(reason) => EventOutcome::Rejected(reason),
        }
    }

    /// Consume events until the channel closes or shutdown is requested,
    /// processing each accepted event on its own task.
    pub async fn run(self: Arc<Self>, mut receiver: mpsc::Receiver<LogEvent>) {
        info!("Event pipeline started for program {}", self.config.program_address);

        let mut tasks = JoinSet::new();
        let mut shutdown_poll = tokio::time::interval(SHUTDOWN_POLL_INTERVAL);

        loop {
            if self.shutdown_signal.load(Ordering::Relaxed) {
                info!("Shutdown signal received, stopping event intake");
                break;
            }

            tokio::select! {
                event = receiver.recv() => {
                    let Some(event) = event else {
                        info!("Event channel closed");
                        break;
                    };
                    if let Admission::Accepted { signature } = self.admit(&event) {
                        let pipeline = Arc::clone(&self);
                        tasks.spawn(async move {
                            pipeline.process(&signature).await;
                        });
                    }
                }
                _ = shutdown_poll.tick() => {}
            }

            while let Some(finished) = tasks.try_join_next() {
                if let Err(e) = finished {
                    error!("Event task failed: {}", e);
                }
            }
        }

        debug!("Draining {} in-flight events", tasks.len());
        while let Some(finished) = tasks.join_next().await {
            if let Err(e) = finished {
                error!("Event task failed: {}", e);
            }
        }
        info!("Event pipeline stopped");
    }

    /// Request graceful shutdown
    pub fn shutdown(&self) {
        info!("Requesting pipeline shutdown");
        self.shutdown_signal.store(true, Ordering::Relaxed);
    }
}

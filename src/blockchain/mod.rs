pub mod rpc_client;
pub mod signature_cache;
pub mod backoff_fetcher;
pub mod token_classifier;
pub mod log_subscriber;
pub mod event_pipeline;

pub use rpc_client::{RpcClient, TransactionSource};
pub use signature_cache::SignatureCache;
pub use backoff_fetcher::{BackoffFetcher, FetchError};
pub use token_classifier::TokenClassifier;
pub use log_subscriber::{parse_frame, Frame, LogSubscriber, MonitorError};
pub use event_pipeline::{
    Admission, EventOutcome, EventPipeline, PipelineConfig, PipelineStats, RejectReason, SkipReason,
    StatsSnapshot,
};

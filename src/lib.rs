pub mod blockchain;
pub mod lookup;
pub mod models;
pub mod notify;
pub mod api;
pub mod error;
pub mod logging;
pub mod retry;
pub mod config;

pub use blockchain::{EventPipeline, LogSubscriber, PipelineStats, RpcClient};
pub use error::{NotifierError, Result};
pub use logging::{LogContext, PerformanceMonitor, ErrorLogger, MetricsLogger};
pub use retry::{RetryManager, RetryConfig, RetryError, Retryable};
pub use config::{AppConfig, RpcConfig, WatcherConfig, ClassifierConfig, TelegramConfig, ApiConfig, LoggingConfig};

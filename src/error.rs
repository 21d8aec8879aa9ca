use thiserror::Error;

/// Main error type for the pool launch notifier
#[derive(Error, Debug)]
pub enum NotifierError {
    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    #[error("Lookup error: {0}")]
    Lookup(#[from] LookupError),

    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("Subscription error: {0}")]
    Subscription(#[from] SubscriptionError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] crate::blockchain::FetchError),
}

/// Errors returned by the Solana JSON-RPC transaction lookup
#[derive(Error, Debug)]
pub enum RpcError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("RPC method error: code={code}, message={message}")]
    Method { code: i64, message: String },

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Timeout after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("Rate limit exceeded (HTTP 429)")]
    RateLimit,

    #[error("Connection failed: {0}")]
    Connection(String),
}

/// Errors returned by the profile and metadata lookups
#[derive(Error, Debug)]
pub enum LookupError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors returned by the notification transport
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API rejected message: status={status}, description={description}")]
    Api { status: u16, description: String },

    #[error("Rate limited by notification API, retry after {retry_after} seconds")]
    RateLimited { retry_after: u64 },

    #[error("Invalid destination: {0}")]
    InvalidDestination(String),
}

/// Errors raised by the websocket log subscription
#[derive(Error, Debug)]
pub enum SubscriptionError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Subscription stream closed")]
    Closed,
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Configuration parsing failed: {0}")]
    Parsing(String),

    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, NotifierError>;

/// Error severity levels for logging and monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Errors that stop the process from starting
    Critical,
    /// Errors that drop an event or a delivery
    High,
    /// Errors that degrade an event but let it through
    Medium,
    /// Mostly informational
    Low,
}

/// Failure taxonomy of the event pipeline.
///
/// Every category except configuration ends with the current event being
/// skipped (or degraded) while intake continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    /// Rate-limited upstream; retried with backoff
    TransientUpstream,
    /// Non-retriable fetch failure; event dropped
    UpstreamUnavailable,
    /// No transaction, instruction or accounts; event dropped
    NotFound,
    /// Profile or metadata lookup failed; classification uses defaults
    LookupDegraded,
    /// A notification could not be delivered to one channel
    DeliveryFailure,
    /// Startup configuration problem
    Configuration,
}

impl NotifierError {
    /// Get the severity level of an error
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            NotifierError::Config(_) => ErrorSeverity::Critical,

            NotifierError::Subscription(_) => ErrorSeverity::High,
            NotifierError::Delivery(_) => ErrorSeverity::High,
            NotifierError::Rpc(RpcError::Connection(_)) => ErrorSeverity::High,
            NotifierError::Fetch(crate::blockchain::FetchError::RetriesExhausted { .. }) => {
                ErrorSeverity::High
            }

            NotifierError::Rpc(RpcError::RateLimit) => ErrorSeverity::Medium,
            NotifierError::Rpc(RpcError::Timeout { .. }) => ErrorSeverity::Medium,
            NotifierError::Lookup(_) => ErrorSeverity::Medium,

            NotifierError::Fetch(crate::blockchain::FetchError::NotFound { .. }) => {
                ErrorSeverity::Low
            }
            _ => ErrorSeverity::Medium,
        }
    }

    /// Check if the error is recoverable (can be retried)
    pub fn is_recoverable(&self) -> bool {
        matches!(self, NotifierError::Rpc(RpcError::RateLimit))
    }

    /// Get suggested retry delay in milliseconds for recoverable errors
    pub fn retry_delay(&self) -> Option<u64> {
        if !self.is_recoverable() {
            return None;
        }

        match self {
            NotifierError::Rpc(RpcError::RateLimit) => Some(500),
            _ => None,
        }
    }

    /// Map the error onto the pipeline failure taxonomy
    pub fn category(&self) -> FailureCategory {
        match self {
            NotifierError::Rpc(RpcError::RateLimit) => FailureCategory::TransientUpstream,
            NotifierError::Rpc(_) => FailureCategory::UpstreamUnavailable,
            NotifierError::Fetch(e) => e.category(),
            NotifierError::Subscription(_) => FailureCategory::UpstreamUnavailable,
            NotifierError::Lookup(_) => FailureCategory::LookupDegraded,
            NotifierError::Delivery(_) => FailureCategory::DeliveryFailure,
            NotifierError::Config(_) => FailureCategory::Configuration,
        }
    }
}

impl RpcError {
    /// Whether the upstream signalled a rate limit
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, RpcError::RateLimit)
    }
}

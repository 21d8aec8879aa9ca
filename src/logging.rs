use log::{info, Level};
use once_cell::sync::OnceCell;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::SystemTime;

use crate::config::LoggingConfig;
use crate::error::{ErrorSeverity, NotifierError};

static LOGGER_INIT: OnceCell<()> = OnceCell::new();

/// Structured logging context for the notifier
pub struct LogContext {
    pub component: String,
    pub operation: String,
    pub metadata: HashMap<String, Value>,
}

impl LogContext {
    pub fn new(component: &str, operation: &str) -> Self {
        Self {
            component: component.to_string(),
            operation: operation.to_string(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    pub fn with_signature(self, signature: &str) -> Self {
        self.with_metadata("signature", json!(signature))
    }

    pub fn with_token_address(self, address: &str) -> Self {
        self.with_metadata("token_address", json!(address))
    }

    pub fn with_channel(self, channel: &str) -> Self {
        self.with_metadata("channel", json!(channel))
    }

    pub fn with_tier(self, tier: &str) -> Self {
        self.with_metadata("tier", json!(tier))
    }

    pub fn with_duration_ms(self, duration_ms: u64) -> Self {
        self.with_metadata("duration_ms", json!(duration_ms))
    }

    pub fn with_retry_count(self, retry_count: u32) -> Self {
        self.with_metadata("retry_count", json!(retry_count))
    }

    /// One JSON object per record; metadata keys sit beside the fixed fields
    fn render(&self, level: Level, message: &str) -> String {
        let mut record = json!({
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "level": level.as_str(),
            "component": self.component,
            "operation": self.operation,
            "message": message,
        });
        if let Value::Object(fields) = &mut record {
            fields.extend(self.metadata.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        record.to_string()
    }

    pub fn log(&self, level: Level, message: &str) {
        if log::log_enabled!(level) {
            log::log!(level, "{}", self.render(level, message));
        }
    }

    pub fn info(&self, message: &str) {
        self.log(Level::Info, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(Level::Warn, message);
    }

    pub fn error(&self, message: &str) {
        self.log(Level::Error, message);
    }

    pub fn debug(&self, message: &str) {
        self.log(Level::Debug, message);
    }

    pub fn trace(&self, message: &str) {
        self.log(Level::Trace, message);
    }
}

/// Times an operation and logs its duration when finished
pub struct PerformanceMonitor {
    pub start_time: SystemTime,
    operation: String,
    metadata: HashMap<String, Value>,
}

impl PerformanceMonitor {
    pub fn new(operation: &str) -> Self {
        Self {
            start_time: SystemTime::now(),
            operation: operation.to_string(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    fn elapsed_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(self.start_time)
            .unwrap_or_default()
            .as_millis() as u64
    }

    fn into_context(self, duration: u64) -> LogContext {
        let mut context = LogContext::new("performance", &self.operation).with_duration_ms(duration);
        for (key, value) in self.metadata {
            context = context.with_metadata(&key, value);
        }
        context
    }

    pub fn finish(self) -> u64 {
        let duration = self.elapsed_ms();
        let context = self.into_context(duration);
        context.debug(&format!("Operation completed in {}ms", duration));
        duration
    }

    pub fn finish_with_result<T, E>(self, result: &Result<T, E>) -> u64
    where
        E: std::fmt::Display,
    {
        let duration = self.elapsed_ms();
        let mut context = self.into_context(duration);

        match result {
            Ok(_) => {
                context.debug(&format!("Operation completed successfully in {}ms", duration));
            }
            Err(e) => {
                context = context.with_metadata("error", json!(e.to_string()));
                context.warn(&format!("Operation failed after {}ms: {}", duration, e));
            }
        }

        duration
    }
}

/// Logs crate errors at the level their severity calls for
pub struct ErrorLogger;

impl ErrorLogger {
    pub fn log_error(error: &NotifierError, context: Option<LogContext>) {
        let severity = error.severity();

        let mut log_context = context
            .unwrap_or_else(|| LogContext::new("error", "unknown"))
            .with_metadata("error_debug", json!(format!("{:?}", error)))
            .with_metadata("severity", json!(format!("{:?}", severity)))
            .with_metadata("category", json!(format!("{:?}", error.category())))
            .with_metadata("recoverable", json!(error.is_recoverable()));

        if let Some(delay) = error.retry_delay() {
            log_context = log_context.with_metadata("retry_delay_ms", json!(delay));
        }

        let level = match severity {
            ErrorSeverity::Critical | ErrorSeverity::High => Level::Error,
            ErrorSeverity::Medium => Level::Warn,
            ErrorSeverity::Low => Level::Info,
        };
        log_context.log(level, &error.to_string());
    }

    pub fn log_retry_attempt(operation: &str, error: &dyn std::fmt::Display, attempt: u32, delay_ms: u64) {
        LogContext::new("retry", operation)
            .with_retry_count(attempt)
            .with_metadata("delay_ms", json!(delay_ms))
            .warn(&format!(
            "{} failed on attempt {}: {}. Retrying after {}ms",
            operation, attempt, error, delay_ms
        ));
    }

    pub fn log_recovery_success(operation: &str, attempts: u32, total_duration_ms: u64) {
        LogContext::new("retry", operation)
            .with_retry_count(attempts)
            .with_duration_ms(total_duration_ms)
            .info(&format!(
            "Operation recovered after {} attempts in {}ms",
            attempts, total_duration_ms
        ));
    }
}

/// Application metrics emitted as structured log records
pub struct MetricsLogger;

impl MetricsLogger {
    pub fn log_event_accepted(signature: &str, slot: Option<u64>) {
        let mut context = LogContext::new("metrics", "event_accepted").with_signature(signature);
        if let Some(slot) = slot {
            context = context.with_metadata("slot", json!(slot));
        }
        context.info(&format!("Accepted pool initialization {}", signature));
    }

    pub fn log_event_rejected(signature: &str, reason: &str) {
        let context = LogContext::new("metrics", "event_rejected")
            .with_signature(signature)
            .with_metadata("reason", json!(reason));
        context.trace(&format!("Rejected event {}: {}", signature, reason));
    }

    pub fn log_cache_cleared(capacity: usize) {
        let context = LogContext::new("signature_cache", "clear")
            .with_metadata("capacity", json!(capacity));
        context.info("Processed signatures cleared to free up memory");
    }

    pub fn log_rpc_call(method: &str, duration_ms: u64, success: bool) {
        let context = LogContext::new("metrics", "rpc_call")
            .with_metadata("method", json!(method))
            .with_duration_ms(duration_ms)
            .with_metadata("success", json!(success));

        if success {
            context.debug(&format!("RPC call {} completed in {}ms", method, duration_ms));
        } else {
            context.warn(&format!("RPC call {} failed after {}ms", method, duration_ms));
        }
    }

    pub fn log_lookup(kind: &str, address: &str, duration_ms: u64, success: bool) {
        let context = LogContext::new("metrics", "lookup")
            .with_metadata("kind", json!(kind))
            .with_token_address(address)
            .with_duration_ms(duration_ms)
            .with_metadata("success", json!(success));

        if success {
            context.debug(&format!("{} lookup for {} completed in {}ms", kind, address, duration_ms));
        } else {
            context.warn(&format!("{} lookup for {} degraded after {}ms", kind, address, duration_ms));
        }
    }

    pub fn log_delivery(channel: &str, tier: &str, duration_ms: u64, error: Option<&str>) {
        let context = LogContext::new("metrics", "delivery")
            .with_channel(channel)
            .with_tier(tier)
            .with_duration_ms(duration_ms);

        match error {
            None => context.info(&format!("Message sent successfully to {}", channel)),
            Some(e) => context
                .with_metadata("error", json!(e))
                .error(&format!("Failed to send message to {}: {}", channel, e)),
        }
    }

    pub fn log_pipeline_stats(snapshot: &crate::blockchain::StatsSnapshot) {
        let context = LogContext::new("metrics", "pipeline_stats")
            .with_metadata("events_received", json!(snapshot.events_received))
            .with_metadata("events_accepted", json!(snapshot.events_accepted))
            .with_metadata("notified_verified", json!(snapshot.notified_verified))
            .with_metadata("notified_unverified", json!(snapshot.notified_unverified))
            .with_metadata("fetch_failures", json!(snapshot.fetch_failures))
            .with_metadata("deliveries_failed", json!(snapshot.deliveries_failed))
            .with_metadata("cache_clears", json!(snapshot.cache_clears));

        context.info(&format!(
            "Pipeline stats: {} received, {} accepted, {} notified",
            snapshot.events_received,
            snapshot.events_accepted,
            snapshot.notified_verified + snapshot.notified_unverified
        ));
    }
}

/// Initialize structured logging for the application.
///
/// `RUST_LOG` takes precedence over the configured level. Calling this more
/// than once is a no-op.
pub fn init_logging(config: &LoggingConfig) {
    let json_output = config.format == "json";
    let level = config.level.clone();

    LOGGER_INIT.get_or_init(|| {
        let env = env_logger::Env::default().default_filter_or(level);
        let _ = env_logger::Builder::from_env(env)
            .format(move |buf, record| {
                use std::io::Write;

                let args = record.args().to_string();
                match serde_json::from_str::<Value>(&args) {
                    Ok(json_value) if json_value.is_object() => {
                        if json_output {
                            writeln!(buf, "{}", json_value)
                        } else {
                            writeln!(buf, "{}", serde_json::to_string_pretty(&json_value)?)
                        }
                    }
                    _ => writeln!(
                        buf,
                        "{} [{}] {}: {}",
                        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                        record.level(),
                        record.target(),
                        args
                    ),
                }
            })
            .try_init();
    });

    info!("Structured logging initialized");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConfigError, RpcError};

    #[test]
    fn test_builders_fill_metadata() {
        let context = LogContext::new("event_pipeline", "process")
            .with_signature("5xSig")
            .with_token_address("ABCpump")
            .with_tier("Verified")
            .with_channel("-100123_7")
            .with_retry_count(2)
            .with_duration_ms(1500);

        assert_eq!(context.component, "event_pipeline");
        assert_eq!(context.metadata.len(), 6);
        assert_eq!(context.metadata["signature"], json!("5xSig"));
        assert_eq!(context.metadata["token_address"], json!("ABCpump"));
        assert_eq!(context.metadata["retry_count"], json!(2));
    }

    #[test]
    fn test_rendered_record_is_flat_json() {
        let record = LogContext::new("telegram", "send_message")
            .with_channel("-100123_7")
            .render(Level::Warn, "delivery failed");

        let parsed: Value = serde_json::from_str(&record).unwrap();
        assert_eq!(parsed["level"], "WARN");
        assert_eq!(parsed["component"], "telegram");
        assert_eq!(parsed["message"], "delivery failed");
        assert_eq!(parsed["channel"], "-100123_7");
        assert!(parsed["timestamp"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn test_performance_monitor_reports_duration() {
        let monitor = PerformanceMonitor::new("rpc_get_transaction").with_metadata("signature", json!("S1"));
        assert_eq!(monitor.metadata.len(), 1);

        let failed: Result<(), RpcError> = Err(RpcError::RateLimit);
        assert!(monitor.finish_with_result(&failed) < 1_000);
        assert!(PerformanceMonitor::new("noop").finish() < 1_000);
    }

    #[test]
    fn test_error_and_retry_records() {
        let error = NotifierError::Config(ConfigError::MissingEnvVar("TELEGRAM_BOT_TOKEN".to_string()));
        ErrorLogger::log_error(&error, None);
        ErrorLogger::log_error(&NotifierError::Rpc(RpcError::RateLimit), Some(LogContext::new("fetch", "S1")));
        ErrorLogger::log_retry_attempt("get_transaction", &RpcError::RateLimit, 0, 500);
        ErrorLogger::log_recovery_success("get_transaction", 3, 1500);
    }

    #[test]
    fn test_metrics_records() {
        MetricsLogger::log_event_accepted("5xSig", Some(42));
        MetricsLogger::log_event_rejected("5xSig", "Duplicate");
        MetricsLogger::log_cache_cleared(10);
        MetricsLogger::log_rpc_call("getTransaction", 120, true);
        MetricsLogger::log_lookup("profile", "ABCpump", 80, false);
        MetricsLogger::log_delivery("-100123_7", "Verified", 200, Some("status=400"));
        MetricsLogger::log_pipeline_stats(&crate::blockchain::StatsSnapshot::default());
    }

    #[test]
    fn test_init_logging_twice() {
        let config = LoggingConfig {
            format: "json".to_string(),
            ..LoggingConfig::default()
        };
        init_logging(&config);
        init_logging(&config);
    }
}

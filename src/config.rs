use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use crate::error::ConfigError;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub rpc: RpcConfig,
    #[serde(default)]
    pub watcher: WatcherConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Solana RPC configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    /// JSON-RPC HTTP endpoint used for getTransaction
    pub http_endpoint: String,
    /// JSON-RPC websocket endpoint used for logsSubscribe
    pub ws_endpoint: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// Commitment level for transaction fetches
    pub commitment: String,
    /// Retries after the first fetch attempt
    pub max_retries: u32,
    /// Backoff base in milliseconds
    pub base_delay_ms: u64,
    /// Backoff ceiling in milliseconds
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

/// Log subscription and pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Program whose logs are watched
    pub program_address: String,
    /// Substring that marks a pool initialization in the logs
    pub instruction_marker: String,
    /// Commitment level for the log subscription
    pub subscription_commitment: String,
    /// Size at which the processed-signature cache is reset
    pub cache_capacity: usize,
    pub reconnect_delay_seconds: u64,
    /// Bounded channel size between subscriber and pipeline
    pub channel_capacity: usize,
    pub stats_interval_seconds: u64,
}

/// Token classification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub token_suffix: String,
    pub mint_a_index: usize,
    pub mint_b_index: usize,
    pub pair_index: usize,
    /// Base URL for the promotional profile lookup
    pub profile_api_url: String,
    /// Base URL for the token metadata lookup
    pub metadata_api_url: String,
    pub enable_metadata_lookup: bool,
}

/// Telegram delivery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub api_url: String,
    pub bot_token: String,
    /// Channel for pools without an approved profile
    pub unverified_channel: String,
    /// Channel for pools with an approved profile
    pub verified_channel: String,
    /// Extra channel that also receives verified pools
    pub broadcast_channel: Option<String>,
    /// Separates chat id from thread id in channel strings
    pub thread_separator: String,
    pub parse_mode: String,
    pub market_url_template: String,
    pub primary_bot_url_template: String,
    pub secondary_bot_url_template: String,
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Enable HTTP status server
    pub enabled: bool,
    /// Server port
    pub port: u16,
    /// Server host/bind address
    pub host: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            http_endpoint: "https://api.mainnet-beta.solana.com".to_string(),
            ws_endpoint: "wss://api.mainnet-beta.solana.com".to_string(),
            timeout_seconds: 30,
            commitment: "confirmed".to_string(),
            max_retries: 5,
            base_delay_ms: 500,
            max_delay_ms: 60_000,
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            program_address: "675kPX9MHTjS2zt1qfr1NYHuzeLXfQM9H24wFSUt1Mp8".to_string(),
            instruction_marker: "initialize2".to_string(),
            subscription_commitment: "finalized".to_string(),
            cache_capacity: 10,
            reconnect_delay_seconds: 5,
            channel_capacity: 1024,
            stats_interval_seconds: 300,
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            token_suffix: "pump".to_string(),
            mint_a_index: 8,
            mint_b_index: 9,
            pair_index: 4,
            profile_api_url: "https://api.dexscreener.com".to_string(),
            metadata_api_url: "https://api.dexscreener.com".to_string(),
            enable_metadata_lookup: true,
        }
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.telegram.org".to_string(),
            bot_token: String::new(),
            unverified_channel: "-1002149791590_797".to_string(),
            verified_channel: "-1002149791590_801".to_string(),
            broadcast_channel: None,
            thread_separator: "_".to_string(),
            parse_mode: "Markdown".to_string(),
            market_url_template: "https://dexscreener.com/solana/{pair}".to_string(),
            primary_bot_url_template: "https://t.me/furiosa_bonkbot?start=ref_tcisj_ca_{token}"
                .to_string(),
            secondary_bot_url_template: "https://t.me/solana_trojanbot?start=r-pujaexe-{token}"
                .to_string(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 8080,
            host: "127.0.0.1".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// Overwrite `target` with `key` when it is set
fn env_string(key: &str, target: &mut String) {
    if let Ok(value) = env::var(key) {
        *target = value;
    }
}

/// Overwrite `target` with the parsed value of `key` when it is set
fn env_parsed<T: std::str::FromStr>(key: &str, target: &mut T) -> Result<(), ConfigError> {
    if let Ok(value) = env::var(key) {
        *target = value.parse().map_err(|_| invalid(key, &value))?;
    }
    Ok(())
}

fn invalid(key: &str, value: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

impl AppConfig {
    /// File, then environment, then validation
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file()?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// `CONFIG_FILE` (default `config.toml`); a missing file yields the defaults
    pub fn load_from_file() -> Result<Self, ConfigError> {
        let config_path = env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());

        if !Path::new(&config_path).exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| ConfigError::FileNotFound(config_path.clone()))?;
        let config: AppConfig = toml::from_str(&content)
            .map_err(|e| ConfigError::Parsing(e.to_string()))?;
        Ok(config)
    }

    /// Environment overrides, applied on top of the file
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        env_string("SOLANA_RPC_URL", &mut self.rpc.http_endpoint);
        env_string("SOLANA_WS_URL", &mut self.rpc.ws_endpoint);
        env_parsed("RPC_TIMEOUT_SECONDS", &mut self.rpc.timeout_seconds)?;
        env_parsed("RPC_MAX_RETRIES", &mut self.rpc.max_retries)?;
        env_parsed("RPC_BASE_DELAY_MS", &mut self.rpc.base_delay_ms)?;

        env_string("PROGRAM_ADDRESS", &mut self.watcher.program_address);
        env_string("INSTRUCTION_MARKER", &mut self.watcher.instruction_marker);
        env_parsed("SIGNATURE_CACHE_CAPACITY", &mut self.watcher.cache_capacity)?;

        env_string("TOKEN_SUFFIX", &mut self.classifier.token_suffix);
        env_parsed("ENABLE_METADATA_LOOKUP", &mut self.classifier.enable_metadata_lookup)?;

        env_string("TELEGRAM_BOT_TOKEN", &mut self.telegram.bot_token);
        env_string("TELEGRAM_UNVERIFIED_CHANNEL", &mut self.telegram.unverified_channel);
        env_string("TELEGRAM_VERIFIED_CHANNEL", &mut self.telegram.verified_channel);
        // An empty value switches the broadcast channel off
        if let Ok(channel) = env::var("TELEGRAM_BROADCAST_CHANNEL") {
            self.telegram.broadcast_channel = Some(channel).filter(|c| !c.trim().is_empty());
        }

        env_parsed("API_ENABLED", &mut self.api.enabled)?;
        env_parsed("API_PORT", &mut self.api.port)?;
        env_string("API_HOST", &mut self.api.host);

        env_string("LOG_LEVEL", &mut self.logging.level);
        env_string("LOG_FORMAT", &mut self.logging.format);

        Ok(())
    }

    /// Reject values the watcher cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Validate endpoint URLs
        if !self.rpc.http_endpoint.starts_with("http://") && !self.rpc.http_endpoint.starts_with("https://") {
            return Err(ConfigError::InvalidUrl(self.rpc.http_endpoint.clone()));
        }
        if !self.rpc.ws_endpoint.starts_with("ws://") && !self.rpc.ws_endpoint.starts_with("wss://") {
            return Err(ConfigError::InvalidUrl(self.rpc.ws_endpoint.clone()));
        }
        for url in [
            &self.classifier.profile_api_url,
            &self.classifier.metadata_api_url,
            &self.telegram.api_url,
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::InvalidUrl(url.clone()));
            }
        }

        // Validate timeout values
        if self.rpc.timeout_seconds == 0 || self.rpc.timeout_seconds > 300 {
            return Err(invalid("rpc.timeout_seconds", self.rpc.timeout_seconds));
        }

        // Validate retry configuration
        if self.rpc.max_retries > 20 {
            return Err(invalid("rpc.max_retries", self.rpc.max_retries));
        }
        if self.rpc.backoff_multiplier < 1.0 {
            return Err(invalid("rpc.backoff_multiplier", self.rpc.backoff_multiplier));
        }

        if self.watcher.cache_capacity == 0 {
            return Err(invalid("watcher.cache_capacity", self.watcher.cache_capacity));
        }
        if self.watcher.channel_capacity == 0 {
            return Err(invalid("watcher.channel_capacity", self.watcher.channel_capacity));
        }
        if self.watcher.instruction_marker.is_empty() {
            return Err(invalid("watcher.instruction_marker", ""));
        }
        if !is_base58_address(&self.watcher.program_address) {
            return Err(invalid("watcher.program_address", &self.watcher.program_address));
        }

        if self.classifier.token_suffix.is_empty() {
            return Err(invalid("classifier.token_suffix", ""));
        }
        if self.classifier.mint_a_index == self.classifier.mint_b_index {
            return Err(invalid("classifier.mint_b_index", self.classifier.mint_b_index));
        }

        self.validate_channel("telegram.unverified_channel", &self.telegram.unverified_channel)?;
        self.validate_channel("telegram.verified_channel", &self.telegram.verified_channel)?;
        if let Some(channel) = &self.telegram.broadcast_channel {
            self.validate_channel("telegram.broadcast_channel", channel)?;
        }

        // Validate API port
        if self.api.port == 0 {
            return Err(invalid("api.port", self.api.port));
        }

        // Validate log level
        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(invalid("logging.level", &self.logging.level));
        }

        // Validate log format
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(invalid("logging.format", &self.logging.format));
        }

        Ok(())
    }

    fn validate_channel(&self, key: &str, channel: &str) -> Result<(), ConfigError> {
        let separator = self.telegram.thread_separator.as_str();
        let (chat, thread) = match channel.split_once(separator) {
            Some((chat, thread)) if !separator.is_empty() => (chat, Some(thread)),
            _ => (channel, None),
        };

        if chat.trim().is_empty() {
            return Err(invalid(key, channel));
        }
        if let Some(thread) = thread {
            if thread.parse::<i64>().is_err() {
                return Err(invalid(key, channel));
            }
        }
        Ok(())
    }

    /// The watcher cannot deliver without a bot token
    pub fn require_bot_token(&self) -> Result<&str, ConfigError> {
        if self.telegram.bot_token.trim().is_empty() {
            return Err(ConfigError::MissingEnvVar("TELEGRAM_BOT_TOKEN".to_string()));
        }
        Ok(&self.telegram.bot_token)
    }

    /// The defaults rendered as TOML
    pub fn generate_sample_config() -> Result<String, ConfigError> {
        let config = Self::default();
        toml::to_string_pretty(&config)
            .map_err(|e| ConfigError::Parsing(e.to_string()))
    }
}

/// Solana addresses are 32 to 44 base58 characters
pub fn is_base58_address(address: &str) -> bool {
    const ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";
    (32..=44).contains(&address.len()) && address.chars().all(|c| ALPHABET.contains(c))
}

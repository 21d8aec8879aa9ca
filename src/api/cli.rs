use clap::{Parser, Subcommand, ValueEnum};
use std::sync::Arc;
use thiserror::Error;

use crate::blockchain::{BackoffFetcher, FetchError, RpcClient, TokenClassifier};
use crate::config::AppConfig;
use crate::error::{ConfigError, DeliveryError, LookupError, RpcError};
use crate::lookup::DexScreenerClient;
use crate::models::{ClassificationResult, Tier};
use crate::notify::{MessageFormatter, NotificationRouter, RoutingTable, TelegramClient};
use crate::retry::RetryConfig;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),
    #[error("Lookup error: {0}")]
    Lookup(#[from] LookupError),
    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),
    #[error("CLI operation failed: {0}")]
    Operation(String),
}

#[derive(Parser)]
#[command(name = "notifier-cli")]
#[command(about = "Inspect, classify and preview Raydium pool launch notifications")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch and classify one transaction; nothing is sent
    Inspect {
        signature: String,
    },
    /// Classify a pair of pool mints against the live lookups
    Classify {
        mint_a: String,
        mint_b: String,
        #[arg(long)]
        pair: Option<String>,
    },
    /// Render a notification body offline
    Preview {
        #[arg(long)]
        token: String,
        #[arg(long)]
        pair: Option<String>,
        #[arg(long)]
        verified: bool,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        symbol: Option<String>,
    },
    /// Send a test notification to the channels of a tier
    SendTest {
        #[arg(long, value_enum, default_value_t = TierArg::Unverified)]
        tier: TierArg,
    },
    /// Print a sample TOML configuration
    SampleConfig,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum TierArg {
    Unverified,
    Verified,
}

impl From<TierArg> for Tier {
    fn from(tier: TierArg) -> Self {
        match tier {
            TierArg::Unverified => Tier::Unverified,
            TierArg::Verified => Tier::Verified,
        }
    }
}

const TEST_TOKEN: &str = "TestToken1111111111111111111111111111111pump";

pub struct CliHandler {
    config: AppConfig,
}

impl CliHandler {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub async fn execute_command(&self, command: &Commands) -> Result<(), CliError> {
        match command {
            Commands::Inspect { signature } => self.inspect(signature).await,
            Commands::Classify { mint_a, mint_b, pair } => self.classify(mint_a, mint_b, pair.clone()).await,
            Commands::Preview {
                token,
                pair,
                verified,
                name,
                symbol,
            } => {
                println!(
                    "{}",
                    self.preview(token, pair.as_deref(), *verified, name.as_deref(), symbol.as_deref())
                );
                Ok(())
            }
            Commands::SendTest { tier } => self.send_test((*tier).into()).await,
            Commands::SampleConfig => {
                println!("{}", AppConfig::generate_sample_config()?);
                Ok(())
            }
        }
    }

    fn classifier(&self) -> Result<TokenClassifier, CliError> {
        let lookups = Arc::new(DexScreenerClient::new(
            &self.config.classifier.profile_api_url,
            &self.config.classifier.metadata_api_url,
            self.config.rpc.timeout_seconds,
        )?);
        Ok(TokenClassifier::new(
            lookups.clone(),
            lookups,
            self.config.classifier.clone(),
        ))
    }

    fn formatter(&self) -> MessageFormatter {
        MessageFormatter::from_config(&self.config.telegram)
    }

    async fn inspect(&self, signature: &str) -> Result<(), CliError> {
        let rpc = RpcClient::new_with_config(
            &self.config.rpc.http_endpoint,
            self.config.rpc.timeout_seconds,
            &self.config.rpc.commitment,
        )?;
        let fetcher = BackoffFetcher::new(Arc::new(rpc), RetryConfig::from_rpc_config(&self.config.rpc));
        let detail = fetcher.fetch(signature).await?;

        println!("Transaction: {}", signature);
        if let Some(slot) = detail.slot {
            println!("Slot:        {}", slot);
        }

        let program = &self.config.watcher.program_address;
        let instruction = detail.find_instruction(program).ok_or_else(|| {
            CliError::Operation(format!("no instruction for program {} in transaction", program))
        })?;
        let accounts = instruction
            .accounts
            .as_deref()
            .ok_or_else(|| CliError::Operation("matched instruction has no account list".to_string()))?;

        println!("Accounts:");
        for (index, account) in accounts.iter().enumerate() {
            println!("  [{:>2}] {}", index, account);
        }

        let result = self.classifier()?.classify(accounts).await;
        self.print_classification(&result);
        Ok(())
    }

    async fn classify(&self, mint_a: &str, mint_b: &str, pair: Option<String>) -> Result<(), CliError> {
        let classifier = self.classifier()?;
        let result = match classifier.pick_token(mint_a, mint_b) {
            Some(token) => classifier.classify_token(token.to_string(), pair).await,
            None => ClassificationResult::rejected(),
        };
        self.print_classification(&result);
        Ok(())
    }

    fn print_classification(&self, result: &ClassificationResult) {
        println!();
        println!("Tier:   {}", result.tier);
        println!("Token:  {}", result.token_address.as_deref().unwrap_or("-"));
        println!("Pair:   {}", result.pair_address.as_deref().unwrap_or("-"));
        println!("Name:   {}", result.name.as_deref().unwrap_or("-"));
        println!("Symbol: {}", result.symbol.as_deref().unwrap_or("-"));

        match self.formatter().format(result) {
            Some(body) => {
                let routes = RoutingTable::from_config(&self.config.telegram)
                    .map(|routes| {
                        routes
                            .destinations(result.tier)
                            .iter()
                            .map(|destination| destination.label().to_string())
                            .collect::<Vec<_>>()
                            .join(", ")
                    })
                    .unwrap_or_else(|e| format!("invalid routing ({})", e));
                println!("Routes: {}", routes);
                println!();
                println!("{}", body);
            }
            None => println!("\nNo notification would be sent."),
        }
    }

    pub fn preview(
        &self,
        token: &str,
        pair: Option<&str>,
        verified: bool,
        name: Option<&str>,
        symbol: Option<&str>,
    ) -> String {
        let tier = if verified { Tier::Verified } else { Tier::Unverified };
        self.formatter().render(tier, token, pair, name, symbol)
    }

    async fn send_test(&self, tier: Tier) -> Result<(), CliError> {
        let token = self.config.require_bot_token()?;
        let client = TelegramClient::new(&self.config.telegram.api_url, token, self.config.rpc.timeout_seconds)?;
        let routes = RoutingTable::from_config(&self.config.telegram)?;
        let router = NotificationRouter::new(Arc::new(client), routes, &self.config.telegram.parse_mode);

        let body = self
            .formatter()
            .render(tier, TEST_TOKEN, None, Some("Test Token"), Some("TEST"));
        let report = router.dispatch(tier, &body).await;

        for delivery in &report.deliveries {
            match &delivery.error {
                None => println!("✅ {}", delivery.channel),
                Some(error) => println!("❌ {}: {}", delivery.channel, error),
            }
        }

        if report.failed_count() > 0 {
            return Err(CliError::Operation(format!(
                "{} of {} deliveries failed",
                report.failed_count(),
                report.deliveries.len()
            )));
        }
        Ok(())
    }
}

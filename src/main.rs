use log::{error, info};
use raydium_pool_notifier::api::{ApiServer, AppState};
use raydium_pool_notifier::blockchain::{EventPipeline, LogSubscriber, RpcClient};
use raydium_pool_notifier::config::AppConfig;
use raydium_pool_notifier::logging::{init_logging, MetricsLogger};
use raydium_pool_notifier::lookup::DexScreenerClient;
use raydium_pool_notifier::notify::TelegramClient;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    init_logging(&config.logging);
    let bot_token = config.require_bot_token()?;

    info!(
        "Starting Raydium pool notifier for program {}",
        config.watcher.program_address
    );

    let rpc = RpcClient::new_with_config(
        &config.rpc.http_endpoint,
        config.rpc.timeout_seconds,
        &config.rpc.commitment,
    )?;
    let lookups = Arc::new(DexScreenerClient::new(
        &config.classifier.profile_api_url,
        &config.classifier.metadata_api_url,
        config.rpc.timeout_seconds,
    )?);
    let telegram = TelegramClient::new(&config.telegram.api_url, bot_token, config.rpc.timeout_seconds)?;

    let pipeline = Arc::new(EventPipeline::from_config(
        &config,
        Arc::new(rpc),
        lookups.clone(),
        lookups,
        Arc::new(telegram),
    )?);
    let subscriber = LogSubscriber::from_config(&config);
    let stats = pipeline.stats();

    if config.api.enabled {
        let server = ApiServer::new(
            AppState::new(stats.clone(), &config.watcher.program_address),
            &config.api.host,
            config.api.port,
        );
        tokio::spawn(async move {
            if let Err(e) = server.start().await {
                error!("Status API failed: {}", e);
            }
        });
    }

    let stats_interval = Duration::from_secs(config.watcher.stats_interval_seconds.max(1));
    let periodic_stats = stats.clone();
    let stats_task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(stats_interval);
        // The first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            MetricsLogger::log_pipeline_stats(&periodic_stats.snapshot());
        }
    });

    let (sender, receiver) = mpsc::channel(config.watcher.channel_capacity.max(1));
    let subscriber_shutdown = Arc::new(AtomicBool::new(false));

    let shutdown_pipeline = pipeline.clone();
    let shutdown_flag = subscriber_shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received, shutting down");
                shutdown_flag.store(true, Ordering::Relaxed);
                shutdown_pipeline.shutdown();
            }
            Err(e) => error!("Failed to listen for ctrl-c: {}", e),
        }
    });

    let subscriber_task = tokio::spawn(async move { subscriber.run(sender, subscriber_shutdown).await });

    pipeline.clone().run(receiver).await;

    match subscriber_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("Log subscription ended with error: {}", e),
        Err(e) => error!("Log subscription task failed: {}", e),
    }
    stats_task.abort();

    MetricsLogger::log_pipeline_stats(&stats.snapshot());
    info!("Raydium pool notifier stopped");

    Ok(())
}

use clap::Parser;
use raydium_pool_notifier::api::{Cli, CliHandler, Commands};
use raydium_pool_notifier::config::AppConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Quieter than the watcher
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    // sample-config must work even when the current config is broken
    let config = match &cli.command {
        Commands::SampleConfig => AppConfig::default(),
        _ => match AppConfig::load() {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load configuration: {}", e);
                eprintln!("Run `notifier-cli sample-config > config.toml` for a starting point.");
                std::process::exit(1);
            }
        },
    };

    if !matches!(cli.command, Commands::SampleConfig) {
        print_banner();
    }

    let cli_handler = CliHandler::new(config);

    if let Err(e) = cli_handler.execute_command(&cli.command).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

fn print_banner() {
    println!("╔══════════════════════════════════════════════╗");
    println!("║        🔥 Raydium Pool Launch Notifier 🔥     ║");
    println!("╚══════════════════════════════════════════════╝");
    println!();
}

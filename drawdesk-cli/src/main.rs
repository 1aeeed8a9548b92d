mod commands;
mod config;

use clap::{Parser, Subcommand};
use config::CliConfig;
use drawdesk_core::{format_money, Exchange, ExchangeError};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "drawdesk")]
#[command(about = "DrawDesk - ledger and settlement desk for daily numbers draws")]
#[command(version)]
struct Cli {
    /// Data directory for the exchange database
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Account management commands
    #[command(subcommand)]
    Account(commands::AccountCommands),

    /// Game and result commands
    #[command(subcommand)]
    Game(commands::GameCommands),

    /// Bet placement and listing commands
    #[command(subcommand)]
    Bet(commands::BetCommands),

    /// Fund movement commands
    #[command(subcommand)]
    Transfer(commands::TransferCommands),

    /// Ledger and balance commands
    #[command(subcommand)]
    Ledger(commands::LedgerCommands),

    /// Run the daily reset scheduler in the foreground
    Daemon,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "drawdesk={}",
            log_level
        )))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Get data directory
    let data_dir = cli.data_dir.unwrap_or_else(|| {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("drawdesk")
    });

    // Ensure data directory exists
    tokio::fs::create_dir_all(&data_dir).await?;
    tracing::debug!("Using data directory {:?}", data_dir);

    let config = CliConfig::load(&data_dir)?;

    // Open the exchange
    let exchange = Exchange::new(&data_dir, config.exchange_config()).await?;

    // Execute command
    let result = match cli.command {
        Commands::Account(cmd) => commands::handle_account_command(cmd, &exchange).await,
        Commands::Game(cmd) => commands::handle_game_command(cmd, &exchange).await,
        Commands::Bet(cmd) => commands::handle_bet_command(cmd, &exchange).await,
        Commands::Transfer(cmd) => commands::handle_transfer_command(cmd, &exchange).await,
        Commands::Ledger(cmd) => commands::handle_ledger_command(cmd, &exchange).await,
        Commands::Daemon => commands::handle_daemon(&exchange).await,
    };

    if let Err(e) = result {
        match e {
            ExchangeError::InsufficientFunds { need, available } => {
                eprintln!("Error: Insufficient funds");
                eprintln!(
                    "Need: {}, Available: {}",
                    format_money(need),
                    format_money(available)
                );
            }
            ExchangeError::BetLimitExceeded { limit, requested } => {
                eprintln!("Error: Bet limit exceeded");
                eprintln!(
                    "Limit: {}, Requested: {}",
                    format_money(limit),
                    format_money(requested)
                );
            }
            ExchangeError::MarketClosed(msg) => {
                eprintln!("Error: Market is closed for {}", msg);
                eprintln!("Use 'drawdesk game info <game>' to see the betting window");
            }
            ExchangeError::NotFound(what) => {
                eprintln!("Error: {} not found", what);
            }
            _ => {
                eprintln!("Error: {}", e);
            }
        }
        std::process::exit(1);
    }

    Ok(())
}

pub mod account;
pub mod bet;
pub mod game;
pub mod ledger;
pub mod transfer;

pub use account::{handle_account_command, AccountCommands};
pub use bet::{handle_bet_command, BetCommands};
pub use game::{handle_game_command, GameCommands};
pub use ledger::{handle_ledger_command, LedgerCommands};
pub use transfer::{handle_transfer_command, TransferCommands};

use chrono::NaiveTime;
use drawdesk_core::{parse_money, Account, Exchange, ExchangeError, Game, Money, Result};

/// Run the reset poller until interrupted.
pub async fn handle_daemon(exchange: &Exchange) -> Result<()> {
    exchange.start_daily_reset();
    println!("Reset scheduler running. Press Ctrl-C to stop.");

    tokio::signal::ctrl_c().await?;
    println!("Stopped.");
    Ok(())
}

/// Accounts are addressed by username first, falling back to the raw id.
pub(crate) async fn resolve_account(exchange: &Exchange, key: &str) -> Result<Account> {
    match exchange.account_by_username(key).await {
        Ok(account) => Ok(account),
        Err(ExchangeError::NotFound(_)) => exchange.account(key).await,
        Err(e) => Err(e),
    }
}

/// Games are addressed by name first, falling back to the raw id.
pub(crate) async fn resolve_game(exchange: &Exchange, key: &str) -> Result<Game> {
    match exchange.game_by_name(key).await {
        Ok(game) => Ok(game),
        Err(ExchangeError::NotFound(_)) => exchange.game(key).await,
        Err(e) => Err(e),
    }
}

pub(crate) fn parse_draw_time(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M").map_err(|_| {
        ExchangeError::config(format!(
            "Invalid draw time: {}. Expected HH:MM, e.g. 21:30",
            value
        ))
    })
}

pub(crate) fn parse_amount(value: &str) -> Result<Money> {
    parse_money(value).ok_or_else(|| {
        ExchangeError::config(format!(
            "Invalid amount: {}. Expected rupees like 250 or 99.50",
            value
        ))
    })
}

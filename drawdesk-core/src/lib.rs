//! DrawDesk core engine.
//!
//! A ledger and settlement engine for a daily numbers-draw exchange:
//! append-only per-account ledgers with running balances, atomic bet
//! fan-out and tier transfers, winner declaration with open/close digit
//! coupling, payout settlement, and a time-zone-aware market clock with
//! a daily reset scheduler.
//!
//! [`Exchange`] is the entry point. It owns a SQLite database under the
//! supplied data directory and exposes every operation the CLI and any
//! request layer need.
//!
//! ```no_run
//! use drawdesk_core::{Exchange, ExchangeConfig};
//!
//! #[tokio::main]
//! async fn main() -> drawdesk_core::Result<()> {
//!     let exchange = Exchange::new("./data".as_ref(), ExchangeConfig::default()).await?;
//!     let games = exchange.list_games().await?;
//!     println!("{} games configured", games.len());
//!     Ok(())
//! }
//! ```

pub mod draw;
pub mod error;
pub mod exchange;
pub mod market;
pub mod scheduler;
pub mod settlement;
pub mod storage;
pub mod transfer;
pub mod types;

pub use draw::{DrawService, PairState};
pub use error::{ExchangeError, Result};
pub use exchange::{Exchange, ExchangeConfig, NewAccount};
pub use market::{MarketStatus, MarketWindow};
pub use scheduler::ResetScheduler;
pub use settlement::SettlementService;
pub use storage::Storage;
pub use transfer::TransferService;
pub use types::{
    Account, AccountRole, Bet, BetLimits, BetRequest, CoupleRef, CoupleRole, Game, LedgerEntry,
    Money, PrizeRates, SettlementSummary, SubGame, TransferDirection, WinningNumber,
    HOUSE_ACCOUNT_ID,
};
pub use types::{format_money, parse_money};

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn exchange_opens_and_seeds() {
        let temp_dir = tempdir().unwrap();
        let exchange = Exchange::new(temp_dir.path(), ExchangeConfig::default())
            .await
            .unwrap();

        let house = exchange.account(HOUSE_ACCOUNT_ID).await.unwrap();
        assert_eq!(house.role, AccountRole::Admin);
        assert_eq!(exchange.balance(HOUSE_ACCOUNT_ID).await.unwrap(), 0);
    }
}

pub mod account_store;
pub mod bet_store;
pub mod game_store;
pub mod ledger_store;

pub use account_store::AccountStore;
pub use bet_store::BetStore;
pub use game_store::GameStore;
pub use ledger_store::LedgerStore;

use crate::error::{ExchangeError, Result};
use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;
use tokio::sync::Mutex;

/// Owns the single SQLite connection. Multi-step operations lock the
/// connection, open one `rusqlite` transaction and run the stores against
/// it; dropping the transaction without commit rolls the whole group back.
pub struct Storage {
    conn: Mutex<Connection>,
}

impl Storage {
    pub async fn new(db_path: &Path) -> Result<Self> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ExchangeError::internal(format!("Failed to create directory: {}", e)))?;
        }

        let conn = Connection::open(db_path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.pragma_update(None, "foreign_keys", true)?;

        let storage = Self {
            conn: Mutex::new(conn),
        };

        storage.init_schema().await?;
        Ok(storage)
    }

    async fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().await;

        // Accounts table
        conn.execute(
            "CREATE TABLE IF NOT EXISTS accounts (
                id TEXT PRIMARY KEY,
                role TEXT NOT NULL,
                name TEXT NOT NULL,
                username TEXT UNIQUE NOT NULL,
                credential TEXT NOT NULL,
                wallet INTEGER NOT NULL DEFAULT 0,
                commission_bps INTEGER NOT NULL DEFAULT 0,
                prize_rates TEXT NOT NULL,
                bet_limits TEXT NOT NULL,
                is_restricted INTEGER NOT NULL DEFAULT 0,
                dealer_id TEXT,
                created_at INTEGER NOT NULL,
                FOREIGN KEY (dealer_id) REFERENCES accounts(id)
            )",
            [],
        )?;

        // Games table
        conn.execute(
            "CREATE TABLE IF NOT EXISTS games (
                id TEXT PRIMARY KEY,
                name TEXT UNIQUE NOT NULL,
                draw_time TEXT NOT NULL,
                winning_number TEXT,
                payouts_approved INTEGER NOT NULL DEFAULT 0,
                approved_at INTEGER,
                pair_id TEXT,
                pair_role TEXT,
                created_at INTEGER NOT NULL
            )",
            [],
        )?;

        // Bets table
        conn.execute(
            "CREATE TABLE IF NOT EXISTS bets (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                dealer_id TEXT NOT NULL,
                game_id TEXT NOT NULL,
                sub_game TEXT NOT NULL,
                numbers TEXT NOT NULL,
                amount_per_number INTEGER NOT NULL,
                total_amount INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                FOREIGN KEY (user_id) REFERENCES accounts(id),
                FOREIGN KEY (dealer_id) REFERENCES accounts(id),
                FOREIGN KEY (game_id) REFERENCES games(id)
            )",
            [],
        )?;

        // Ledgers table; id doubles as the insertion sequence
        conn.execute(
            "CREATE TABLE IF NOT EXISTS ledgers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                account_id TEXT NOT NULL,
                account_role TEXT NOT NULL,
                description TEXT NOT NULL,
                debit INTEGER NOT NULL DEFAULT 0,
                credit INTEGER NOT NULL DEFAULT 0,
                balance INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                FOREIGN KEY (account_id) REFERENCES accounts(id)
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_ledgers_account ON ledgers(account_id, id)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_bets_game ON bets(game_id)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_bets_user ON bets(user_id)",
            [],
        )?;

        Ok(())
    }

    pub async fn get_connection(&self) -> tokio::sync::MutexGuard<'_, Connection> {
        self.conn.lock().await
    }
}

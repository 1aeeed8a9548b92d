use crate::error::{ExchangeError, Result};
use crate::types::{Account, AccountRole, BetLimits, PrizeRates};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

const ACCOUNT_COLUMNS: &str = "id, role, name, username, credential, wallet, commission_bps, \
     prize_rates, bet_limits, is_restricted, dealer_id, created_at";

/// Accounts relation, scoped to a borrowed connection so the same calls
/// run standalone or inside a transaction.
pub struct AccountStore<'c> {
    conn: &'c Connection,
}

impl<'c> AccountStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub fn insert(&self, account: &Account) -> Result<()> {
        let prize_rates_json = serde_json::to_string(&account.prize_rates)?;
        let bet_limits_json = serde_json::to_string(&account.bet_limits)?;

        self.conn.execute(
            "INSERT INTO accounts
             (id, role, name, username, credential, wallet, commission_bps, prize_rates, bet_limits, is_restricted, dealer_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                account.id,
                account.role.as_str(),
                account.name,
                account.username,
                account.credential,
                account.wallet,
                account.commission_bps,
                prize_rates_json,
                bet_limits_json,
                account.is_restricted as i64,
                account.dealer_id,
                account.created_at.timestamp(),
            ],
        )?;

        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Option<Account>> {
        let result = self.conn.query_row(
            &format!("SELECT {} FROM accounts WHERE id = ?1", ACCOUNT_COLUMNS),
            params![id],
            row_to_account,
        );

        match result {
            Ok(account) => Ok(Some(account)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn get_by_username(&self, username: &str) -> Result<Option<Account>> {
        let result = self.conn.query_row(
            &format!(
                "SELECT {} FROM accounts WHERE username = ?1",
                ACCOUNT_COLUMNS
            ),
            params![username],
            row_to_account,
        );

        match result {
            Ok(account) => Ok(Some(account)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn list_by_role(&self, role: AccountRole) -> Result<Vec<Account>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM accounts WHERE role = ?1 ORDER BY created_at, id",
            ACCOUNT_COLUMNS
        ))?;

        let account_iter = stmt.query_map(params![role.as_str()], row_to_account)?;

        let mut accounts = Vec::new();
        for account in account_iter {
            accounts.push(account?);
        }

        Ok(accounts)
    }

    pub fn list_by_dealer(&self, dealer_id: &str) -> Result<Vec<Account>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM accounts WHERE dealer_id = ?1 ORDER BY created_at, id",
            ACCOUNT_COLUMNS
        ))?;

        let account_iter = stmt.query_map(params![dealer_id], row_to_account)?;

        let mut accounts = Vec::new();
        for account in account_iter {
            accounts.push(account?);
        }

        Ok(accounts)
    }

    pub fn set_restricted(&self, id: &str, restricted: bool) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE accounts SET is_restricted = ?1 WHERE id = ?2",
            params![restricted as i64, id],
        )?;

        if updated == 0 {
            return Err(ExchangeError::not_found(format!("account {}", id)));
        }

        Ok(())
    }
}

fn row_to_account(row: &Row<'_>) -> rusqlite::Result<Account> {
    let role_str: String = row.get(1)?;
    let wallet: i64 = row.get(5)?;
    let prize_rates_str: String = row.get(7)?;
    let bet_limits_str: String = row.get(8)?;
    let is_restricted: i64 = row.get(9)?;
    let created_at: i64 = row.get(11)?;

    let role = AccountRole::parse(&role_str).ok_or_else(|| {
        rusqlite::Error::InvalidColumnType(1, "role".to_string(), rusqlite::types::Type::Text)
    })?;

    let prize_rates: PrizeRates = serde_json::from_str(&prize_rates_str).map_err(|_| {
        rusqlite::Error::InvalidColumnType(
            7,
            "prize_rates".to_string(),
            rusqlite::types::Type::Text,
        )
    })?;

    let bet_limits: BetLimits = serde_json::from_str(&bet_limits_str).map_err(|_| {
        rusqlite::Error::InvalidColumnType(8, "bet_limits".to_string(), rusqlite::types::Type::Text)
    })?;

    Ok(Account {
        id: row.get(0)?,
        role,
        name: row.get(2)?,
        username: row.get(3)?,
        credential: row.get(4)?,
        wallet,
        commission_bps: row.get(6)?,
        prize_rates,
        bet_limits,
        is_restricted: is_restricted != 0,
        dealer_id: row.get(10)?,
        created_at: DateTime::from_timestamp(created_at, 0).unwrap_or_else(Utc::now),
    })
}

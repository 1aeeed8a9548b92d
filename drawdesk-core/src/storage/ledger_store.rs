use crate::error::{ExchangeError, Result};
use crate::types::{AccountRole, LedgerEntry, Money, HOUSE_ACCOUNT_ID};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

const LEDGER_COLUMNS: &str =
    "id, account_id, account_role, description, debit, credit, balance, created_at";

/// Append-only ledger. The ledger is the source of truth for balances;
/// `accounts.wallet` is a cache kept equal to the latest entry's balance
/// on every append.
pub struct LedgerStore<'c> {
    conn: &'c Connection,
}

impl<'c> LedgerStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Append one entry. Fails with `InsufficientFunds` when the debit
    /// would drive a non-house account negative; nothing is written in
    /// that case.
    pub fn append(
        &self,
        account_id: &str,
        account_role: AccountRole,
        description: &str,
        debit: Money,
        credit: Money,
    ) -> Result<LedgerEntry> {
        let prior = self.balance(account_id)?;

        if debit > 0 && account_id != HOUSE_ACCOUNT_ID && prior < debit {
            return Err(ExchangeError::InsufficientFunds {
                need: debit,
                available: prior,
            });
        }

        let balance = prior - debit + credit;
        let created_at = Utc::now();

        self.conn.execute(
            "INSERT INTO ledgers (account_id, account_role, description, debit, credit, balance, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                account_id,
                account_role.as_str(),
                description,
                debit,
                credit,
                balance,
                created_at.timestamp(),
            ],
        )?;

        let id = self.conn.last_insert_rowid();

        self.conn.execute(
            "UPDATE accounts SET wallet = ?1 WHERE id = ?2",
            params![balance, account_id],
        )?;

        Ok(LedgerEntry {
            id,
            account_id: account_id.to_string(),
            account_role,
            description: description.to_string(),
            debit,
            credit,
            balance,
            created_at,
        })
    }

    pub fn last_entry(&self, account_id: &str) -> Result<Option<LedgerEntry>> {
        let result = self.conn.query_row(
            &format!(
                "SELECT {} FROM ledgers WHERE account_id = ?1 ORDER BY created_at DESC, id DESC LIMIT 1",
                LEDGER_COLUMNS
            ),
            params![account_id],
            row_to_entry,
        );

        match result {
            Ok(entry) => Ok(Some(entry)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Balance of the most recent entry, 0 with no entries.
    pub fn balance(&self, account_id: &str) -> Result<Money> {
        Ok(self
            .last_entry(account_id)?
            .map(|entry| entry.balance)
            .unwrap_or(0))
    }

    /// Most recent entries first.
    pub fn statement(&self, account_id: &str, limit: usize) -> Result<Vec<LedgerEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM ledgers WHERE account_id = ?1 ORDER BY created_at DESC, id DESC LIMIT ?2",
            LEDGER_COLUMNS
        ))?;

        let entry_iter = stmt.query_map(params![account_id, limit as i64], row_to_entry)?;

        let mut entries = Vec::new();
        for entry in entry_iter {
            entries.push(entry?);
        }

        Ok(entries)
    }
}

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<LedgerEntry> {
    let role_str: String = row.get(2)?;
    let created_at: i64 = row.get(7)?;

    let account_role = AccountRole::parse(&role_str).ok_or_else(|| {
        rusqlite::Error::InvalidColumnType(
            2,
            "account_role".to_string(),
            rusqlite::types::Type::Text,
        )
    })?;

    Ok(LedgerEntry {
        id: row.get(0)?,
        account_id: row.get(1)?,
        account_role,
        description: row.get(3)?,
        debit: row.get(4)?,
        credit: row.get(5)?,
        balance: row.get(6)?,
        created_at: DateTime::from_timestamp(created_at, 0).unwrap_or_else(Utc::now),
    })
}

use crate::error::Result;
use crate::types::{Bet, SubGame};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

const BET_COLUMNS: &str =
    "id, user_id, dealer_id, game_id, sub_game, numbers, amount_per_number, total_amount, created_at";

pub struct BetStore<'c> {
    conn: &'c Connection,
}

impl<'c> BetStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub fn insert(&self, bet: &Bet) -> Result<()> {
        let numbers_json = serde_json::to_string(&bet.numbers)?;

        self.conn.execute(
            "INSERT INTO bets
             (id, user_id, dealer_id, game_id, sub_game, numbers, amount_per_number, total_amount, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                bet.id,
                bet.user_id,
                bet.dealer_id,
                bet.game_id,
                bet.sub_game.as_str(),
                numbers_json,
                bet.amount_per_number,
                bet.total_amount,
                bet.created_at.timestamp(),
            ],
        )?;

        Ok(())
    }

    pub fn list_by_game(&self, game_id: &str) -> Result<Vec<Bet>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM bets WHERE game_id = ?1 ORDER BY created_at, id",
            BET_COLUMNS
        ))?;

        let bet_iter = stmt.query_map(params![game_id], row_to_bet)?;

        let mut bets = Vec::new();
        for bet in bet_iter {
            bets.push(bet?);
        }

        Ok(bets)
    }

    pub fn list_by_user(&self, user_id: &str) -> Result<Vec<Bet>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM bets WHERE user_id = ?1 ORDER BY created_at DESC, id DESC",
            BET_COLUMNS
        ))?;

        let bet_iter = stmt.query_map(params![user_id], row_to_bet)?;

        let mut bets = Vec::new();
        for bet in bet_iter {
            bets.push(bet?);
        }

        Ok(bets)
    }
}

fn row_to_bet(row: &Row<'_>) -> rusqlite::Result<Bet> {
    let sub_game_str: String = row.get(4)?;
    let numbers_str: String = row.get(5)?;
    let created_at: i64 = row.get(8)?;

    let sub_game = SubGame::parse(&sub_game_str).ok_or_else(|| {
        rusqlite::Error::InvalidColumnType(4, "sub_game".to_string(), rusqlite::types::Type::Text)
    })?;

    let numbers: Vec<String> = serde_json::from_str(&numbers_str).map_err(|_| {
        rusqlite::Error::InvalidColumnType(5, "numbers".to_string(), rusqlite::types::Type::Text)
    })?;

    Ok(Bet {
        id: row.get(0)?,
        user_id: row.get(1)?,
        dealer_id: row.get(2)?,
        game_id: row.get(3)?,
        sub_game,
        numbers,
        amount_per_number: row.get(6)?,
        total_amount: row.get(7)?,
        created_at: DateTime::from_timestamp(created_at, 0).unwrap_or_else(Utc::now),
    })
}

use crate::error::{ExchangeError, Result};
use crate::types::{CoupleRef, CoupleRole, Game, WinningNumber};
use chrono::{DateTime, NaiveTime, Utc};
use rusqlite::{params, Connection, Row};

const GAME_COLUMNS: &str =
    "id, name, draw_time, winning_number, payouts_approved, approved_at, pair_id, pair_role, created_at";

pub struct GameStore<'c> {
    conn: &'c Connection,
}

impl<'c> GameStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub fn insert(&self, game: &Game) -> Result<()> {
        let (pair_id, pair_role) = match &game.couple {
            Some(couple) => (Some(couple.pair_id.as_str()), Some(couple.role.as_str())),
            None => (None, None),
        };

        self.conn.execute(
            "INSERT INTO games
             (id, name, draw_time, winning_number, payouts_approved, approved_at, pair_id, pair_role, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                game.id,
                game.name,
                game.draw_time.format("%H:%M").to_string(),
                game.winning_number.as_ref().map(|w| w.to_stored()),
                game.payouts_approved as i64,
                game.approved_at.map(|t| t.timestamp()),
                pair_id,
                pair_role,
                game.created_at.timestamp(),
            ],
        )?;

        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Option<Game>> {
        let result = self.conn.query_row(
            &format!("SELECT {} FROM games WHERE id = ?1", GAME_COLUMNS),
            params![id],
            row_to_game,
        );

        match result {
            Ok(game) => Ok(Some(game)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn get_by_name(&self, name: &str) -> Result<Option<Game>> {
        let result = self.conn.query_row(
            &format!("SELECT {} FROM games WHERE name = ?1", GAME_COLUMNS),
            params![name],
            row_to_game,
        );

        match result {
            Ok(game) => Ok(Some(game)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn list(&self) -> Result<Vec<Game>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM games ORDER BY draw_time, name",
            GAME_COLUMNS
        ))?;

        let game_iter = stmt.query_map([], row_to_game)?;

        let mut games = Vec::new();
        for game in game_iter {
            games.push(game?);
        }

        Ok(games)
    }

    /// The other half of a coupled pair, if this game has one.
    pub fn partner(&self, game: &Game) -> Result<Option<Game>> {
        let couple = match &game.couple {
            Some(couple) => couple,
            None => return Ok(None),
        };

        let result = self.conn.query_row(
            &format!(
                "SELECT {} FROM games WHERE pair_id = ?1 AND id != ?2",
                GAME_COLUMNS
            ),
            params![couple.pair_id, game.id],
            row_to_game,
        );

        match result {
            Ok(partner) => Ok(Some(partner)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn set_winning_number(&self, id: &str, winning: Option<&WinningNumber>) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE games SET winning_number = ?1 WHERE id = ?2",
            params![winning.map(|w| w.to_stored()), id],
        )?;

        if updated == 0 {
            return Err(ExchangeError::not_found(format!("game {}", id)));
        }

        Ok(())
    }

    pub fn set_approved(&self, id: &str, approved_at: DateTime<Utc>) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE games SET payouts_approved = 1, approved_at = ?1 WHERE id = ?2",
            params![approved_at.timestamp(), id],
        )?;

        if updated == 0 {
            return Err(ExchangeError::not_found(format!("game {}", id)));
        }

        Ok(())
    }

    /// Clear results on games approved before the given cutoff. Returns
    /// how many games were reset.
    pub fn reset_approved_before(&self, cutoff: i64) -> Result<usize> {
        let reset = self.conn.execute(
            "UPDATE games
             SET winning_number = NULL, payouts_approved = 0, approved_at = NULL
             WHERE payouts_approved = 1 AND approved_at < ?1",
            params![cutoff],
        )?;

        Ok(reset)
    }
}

fn row_to_game(row: &Row<'_>) -> rusqlite::Result<Game> {
    let draw_time_str: String = row.get(2)?;
    let winning_str: Option<String> = row.get(3)?;
    let payouts_approved: i64 = row.get(4)?;
    let approved_at: Option<i64> = row.get(5)?;
    let pair_id: Option<String> = row.get(6)?;
    let pair_role_str: Option<String> = row.get(7)?;
    let created_at: i64 = row.get(8)?;

    let draw_time = NaiveTime::parse_from_str(&draw_time_str, "%H:%M").map_err(|_| {
        rusqlite::Error::InvalidColumnType(2, "draw_time".to_string(), rusqlite::types::Type::Text)
    })?;

    let winning_number = match winning_str {
        Some(s) => Some(WinningNumber::from_stored(&s).ok_or_else(|| {
            rusqlite::Error::InvalidColumnType(
                3,
                "winning_number".to_string(),
                rusqlite::types::Type::Text,
            )
        })?),
        None => None,
    };

    let couple = match (pair_id, pair_role_str) {
        (Some(pair_id), Some(role_str)) => {
            let role = CoupleRole::parse(&role_str).ok_or_else(|| {
                rusqlite::Error::InvalidColumnType(
                    7,
                    "pair_role".to_string(),
                    rusqlite::types::Type::Text,
                )
            })?;
            Some(CoupleRef { pair_id, role })
        }
        (None, None) => None,
        _ => {
            return Err(rusqlite::Error::InvalidColumnType(
                6,
                "pair_id".to_string(),
                rusqlite::types::Type::Text,
            ))
        }
    };

    Ok(Game {
        id: row.get(0)?,
        name: row.get(1)?,
        draw_time,
        winning_number,
        payouts_approved: payouts_approved != 0,
        approved_at: approved_at.and_then(|t| DateTime::from_timestamp(t, 0)),
        couple,
        created_at: DateTime::from_timestamp(created_at, 0).unwrap_or_else(Utc::now),
    })
}

use crate::error::{ExchangeError, Result};
use crate::storage::{GameStore, Storage};
use crate::types::{CoupleRole, Game, WinningNumber};
use std::sync::Arc;

/// Derived state of a coupled pair. Never persisted; recomputed from the
/// two game rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairState {
    Pending,
    OpenKnown,
    BothKnown,
    Approved,
}

pub fn pair_state(open: &Game, close: &Game) -> PairState {
    if open.payouts_approved || close.payouts_approved {
        return PairState::Approved;
    }

    let open_final = matches!(&open.winning_number, Some(w) if w.is_final());
    let close_final = matches!(&close.winning_number, Some(w) if w.is_final());
    if open_final && close_final {
        return PairState::BothKnown;
    }

    if matches!(&open.winning_number, Some(WinningNumber::PendingClose(_))) {
        return PairState::OpenKnown;
    }

    PairState::Pending
}

/// Declares and corrects winning numbers, keeping both halves of a
/// coupled pair consistent. Any write that touches two game rows runs in
/// one transaction.
pub struct DrawService {
    storage: Arc<Storage>,
}

impl DrawService {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    /// Record a game's first result. Coupled halves take a single digit,
    /// standalone games the full two digits.
    pub async fn declare_winner(&self, game_id: &str, digits: &str) -> Result<Game> {
        let mut conn = self.storage.get_connection().await;

        let tx = conn.transaction()?;
        let updated = {
            let games = GameStore::new(&tx);
            let game = games
                .get(game_id)?
                .ok_or_else(|| ExchangeError::not_found(format!("game {}", game_id)))?;

            if game.payouts_approved {
                return Err(ExchangeError::already_approved(format!("game {}", game.name)));
            }
            if game.winning_number.is_some() {
                return Err(ExchangeError::already_declared(format!("game {}", game.name)));
            }
            validate_digits(&game, digits)?;

            match game.couple.clone() {
                None => {
                    games.set_winning_number(
                        &game.id,
                        Some(&WinningNumber::Final(digits.to_string())),
                    )?;
                }
                Some(couple) => {
                    let partner = games.partner(&game)?.ok_or_else(|| {
                        ExchangeError::internal(format!("game {} has no partner row", game.id))
                    })?;
                    write_pair(&games, &game, &partner, couple.role, digits)?;
                }
            }

            games
                .get(game_id)?
                .ok_or_else(|| ExchangeError::not_found(format!("game {}", game_id)))?
        };
        tx.commit()?;

        tracing::info!(
            "Declared winner for game {}: {}",
            updated.name,
            updated
                .winning_number
                .as_ref()
                .map(|w| w.to_stored())
                .unwrap_or_default()
        );
        Ok(updated)
    }

    /// Correct an already declared result. Rejected once this game or, for
    /// coupled games, its partner has payouts approved.
    pub async fn update_winner(&self, game_id: &str, digits: &str) -> Result<Game> {
        let mut conn = self.storage.get_connection().await;

        let tx = conn.transaction()?;
        let updated = {
            let games = GameStore::new(&tx);
            let game = games
                .get(game_id)?
                .ok_or_else(|| ExchangeError::not_found(format!("game {}", game_id)))?;

            if game.payouts_approved {
                return Err(ExchangeError::already_approved(format!("game {}", game.name)));
            }
            if game.winning_number.is_none() {
                return Err(ExchangeError::not_declared_yet(format!("game {}", game.name)));
            }
            validate_digits(&game, digits)?;

            match game.couple.clone() {
                None => {
                    games.set_winning_number(
                        &game.id,
                        Some(&WinningNumber::Final(digits.to_string())),
                    )?;
                }
                Some(couple) => {
                    let partner = games.partner(&game)?.ok_or_else(|| {
                        ExchangeError::internal(format!("game {} has no partner row", game.id))
                    })?;
                    if partner.payouts_approved {
                        return Err(ExchangeError::already_approved(format!(
                            "partner game {}",
                            partner.name
                        )));
                    }
                    write_pair(&games, &game, &partner, couple.role, digits)?;
                }
            }

            games
                .get(game_id)?
                .ok_or_else(|| ExchangeError::not_found(format!("game {}", game_id)))?
        };
        tx.commit()?;

        tracing::info!(
            "Updated winner for game {}: {}",
            updated.name,
            updated
                .winning_number
                .as_ref()
                .map(|w| w.to_stored())
                .unwrap_or_default()
        );
        Ok(updated)
    }
}

fn validate_digits(game: &Game, digits: &str) -> Result<()> {
    let expected = if game.is_coupled() { 1 } else { 2 };
    if digits.len() != expected || digits.chars().any(|c| !c.is_ascii_digit()) {
        return Err(ExchangeError::invalid_number(format!(
            "winning number '{}' must be {} digit(s)",
            digits, expected
        )));
    }
    Ok(())
}

/// Known digit carried by one half of a pair, if any.
fn digit_of(value: &WinningNumber, role: CoupleRole) -> Option<char> {
    match (role, value) {
        (CoupleRole::Open, WinningNumber::PendingClose(d)) => Some(*d),
        (CoupleRole::Open, WinningNumber::Final(s)) => s.chars().next(),
        (CoupleRole::Close, WinningNumber::Final(s)) => s.chars().next(),
        (CoupleRole::Close, WinningNumber::PendingClose(_)) => None,
    }
}

/// Apply a new digit on one half and rewrite both rows from the pair's
/// combined knowledge: both digits known composes the open half's final
/// two-character result, an open digit alone stays behind the
/// pending-close sentinel.
fn write_pair(
    games: &GameStore<'_>,
    game: &Game,
    partner: &Game,
    role: CoupleRole,
    digits: &str,
) -> Result<()> {
    let new_digit = digits
        .chars()
        .next()
        .ok_or_else(|| ExchangeError::invalid_number("empty winning number"))?;

    let (open_game, close_game) = match role {
        CoupleRole::Open => (game, partner),
        CoupleRole::Close => (partner, game),
    };

    let mut open_digit = open_game
        .winning_number
        .as_ref()
        .and_then(|w| digit_of(w, CoupleRole::Open));
    let mut close_digit = close_game
        .winning_number
        .as_ref()
        .and_then(|w| digit_of(w, CoupleRole::Close));

    match role {
        CoupleRole::Open => open_digit = Some(new_digit),
        CoupleRole::Close => close_digit = Some(new_digit),
    }

    match (open_digit, close_digit) {
        (Some(o), Some(c)) => {
            games.set_winning_number(
                &open_game.id,
                Some(&WinningNumber::Final(format!("{}{}", o, c))),
            )?;
            games.set_winning_number(&close_game.id, Some(&WinningNumber::Final(c.to_string())))?;
        }
        (Some(o), None) => {
            games.set_winning_number(&open_game.id, Some(&WinningNumber::PendingClose(o)))?;
        }
        (None, Some(c)) => {
            games.set_winning_number(&close_game.id, Some(&WinningNumber::Final(c.to_string())))?;
        }
        (None, None) => {}
    }

    Ok(())
}

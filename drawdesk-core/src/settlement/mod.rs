use crate::error::{ExchangeError, Result};
use crate::storage::{AccountStore, BetStore, GameStore, LedgerStore, Storage};
use crate::types::{
    AccountRole, Bet, Money, SettlementSummary, SubGame, WinningNumber, HOUSE_ACCOUNT_ID,
};
use chrono::Utc;
use std::sync::Arc;

/// Computes per-bet winnings and posts payouts exactly once per game.
/// The approval flag flip and every payout posting commit in one
/// transaction.
pub struct SettlementService {
    storage: Arc<Storage>,
}

impl SettlementService {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    pub async fn approve_payouts(&self, game_id: &str) -> Result<SettlementSummary> {
        let mut conn = self.storage.get_connection().await;

        let tx = conn.transaction()?;
        let summary = {
            let games = GameStore::new(&tx);
            let game = games
                .get(game_id)?
                .ok_or_else(|| ExchangeError::not_found(format!("game {}", game_id)))?;

            if game.payouts_approved {
                return Err(ExchangeError::already_approved(format!("game {}", game.name)));
            }

            let winning = match &game.winning_number {
                Some(WinningNumber::Final(s)) => s.clone(),
                Some(WinningNumber::PendingClose(_)) => {
                    return Err(ExchangeError::not_declared_yet(format!(
                        "game {} awaits its close digit",
                        game.name
                    )))
                }
                None => {
                    return Err(ExchangeError::not_declared_yet(format!(
                        "game {}",
                        game.name
                    )))
                }
            };

            // A coupled half settles only once the whole pair is final.
            if game.is_coupled() {
                let partner = games.partner(&game)?.ok_or_else(|| {
                    ExchangeError::internal(format!("game {} has no partner row", game.id))
                })?;
                if !matches!(&partner.winning_number, Some(w) if w.is_final()) {
                    return Err(ExchangeError::not_declared_yet(format!(
                        "game {} awaits partner result",
                        game.name
                    )));
                }
            }

            let accounts = AccountStore::new(&tx);
            let ledger = LedgerStore::new(&tx);
            let bets = BetStore::new(&tx).list_by_game(&game.id)?;

            let mut winning_bets = 0usize;
            let mut total_user_prizes: Money = 0;
            let mut total_dealer_profit: Money = 0;

            for bet in &bets {
                let count = winning_count(bet, &winning);
                if count == 0 {
                    continue;
                }
                winning_bets += 1;

                let user = accounts.get(&bet.user_id)?.ok_or_else(|| {
                    ExchangeError::not_found(format!("account {}", bet.user_id))
                })?;
                let dealer = accounts.get(&bet.dealer_id)?.ok_or_else(|| {
                    ExchangeError::not_found(format!("account {}", bet.dealer_id))
                })?;

                let user_rate = user.prize_rates.rate_for(bet.sub_game) as Money;
                let dealer_rate = dealer.prize_rates.rate_for(bet.sub_game) as Money;

                let user_prize = count as Money * bet.amount_per_number * user_rate / 100;
                if user_prize > 0 {
                    ledger.append(
                        HOUSE_ACCOUNT_ID,
                        AccountRole::Admin,
                        &format!(
                            "Payout to {} on {} {}",
                            user.username, game.name, winning
                        ),
                        user_prize,
                        0,
                    )?;
                    ledger.append(
                        &user.id,
                        user.role,
                        &format!("Winnings {} {} x{}", game.name, winning, count),
                        0,
                        user_prize,
                    )?;
                    total_user_prizes += user_prize;
                }

                // The dealer books the rate spread, never a loss.
                let dealer_profit =
                    count as Money * bet.amount_per_number * (dealer_rate - user_rate) / 100;
                if dealer_profit > 0 {
                    ledger.append(
                        HOUSE_ACCOUNT_ID,
                        AccountRole::Admin,
                        &format!(
                            "Rate spread to {} on {} {}",
                            dealer.username, game.name, winning
                        ),
                        dealer_profit,
                        0,
                    )?;
                    ledger.append(
                        &dealer.id,
                        dealer.role,
                        &format!(
                            "Rate spread {} {} bet by {}",
                            game.name, winning, user.username
                        ),
                        0,
                        dealer_profit,
                    )?;
                    total_dealer_profit += dealer_profit;
                }
            }

            games.set_approved(&game.id, Utc::now())?;
            let updated = games
                .get(&game.id)?
                .ok_or_else(|| ExchangeError::not_found(format!("game {}", game_id)))?;

            SettlementSummary {
                game: updated,
                bets_settled: bets.len(),
                winning_bets,
                total_user_prizes,
                total_dealer_profit,
            }
        };
        tx.commit()?;

        tracing::info!(
            "Approved payouts for game {}: {}/{} winning bet(s), prizes {}, spread {}",
            summary.game.name,
            summary.winning_bets,
            summary.bets_settled,
            summary.total_user_prizes,
            summary.total_dealer_profit
        );
        Ok(summary)
    }
}

/// How many of the bet's numbers match the applicable slice of the final
/// winning number. Open bets read the first character, close bets the
/// second of a two-character result or the whole of a close-only single
/// digit, jodi bets the full result.
fn winning_count(bet: &Bet, winning: &str) -> usize {
    let target: Option<String> = match bet.sub_game {
        SubGame::OneDigitOpen => winning.chars().next().map(|c| c.to_string()),
        SubGame::OneDigitClose => {
            if winning.chars().count() == 2 {
                winning.chars().nth(1).map(|c| c.to_string())
            } else {
                Some(winning.to_string())
            }
        }
        SubGame::TwoDigit => Some(winning.to_string()),
    };

    match target {
        Some(target) => bet.numbers.iter().filter(|n| **n == target).count(),
        None => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draw::DrawService;
    use crate::exchange::ExchangeConfig;
    use crate::transfer::TransferService;
    use crate::types::{
        Account, BetLimits, BetRequest, CoupleRef, CoupleRole, Game, PrizeRates,
    };
    use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
    use tempfile::tempdir;

    fn account(
        id: &str,
        role: AccountRole,
        prize_rates: PrizeRates,
        dealer_id: Option<&str>,
    ) -> Account {
        Account {
            id: id.to_string(),
            role,
            name: id.to_string(),
            username: id.to_string(),
            credential: String::new(),
            wallet: 0,
            commission_bps: 0,
            prize_rates,
            bet_limits: BetLimits::default(),
            is_restricted: false,
            dealer_id: dealer_id.map(|d| d.to_string()),
            created_at: Utc::now(),
        }
    }

    fn game(id: &str, name: &str, couple: Option<CoupleRef>) -> Game {
        Game {
            id: id.to_string(),
            name: name.to_string(),
            draw_time: NaiveTime::from_hms_opt(21, 30, 0).unwrap(),
            winning_number: None,
            payouts_approved: false,
            approved_at: None,
            couple,
            created_at: Utc::now(),
        }
    }

    fn open_now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    struct Fixture {
        _tmp: tempfile::TempDir,
        storage: Arc<Storage>,
        settlement: SettlementService,
        transfers: TransferService,
        draws: DrawService,
    }

    async fn setup() -> Fixture {
        let temp_dir = tempdir().unwrap();
        let storage = Arc::new(
            Storage::new(&temp_dir.path().join("test.db"))
                .await
                .unwrap(),
        );

        let dealer_rates = PrizeRates {
            one_digit_open: 960,
            one_digit_close: 960,
            two_digit: 9600,
        };

        {
            let conn = storage.get_connection().await;
            let accounts = AccountStore::new(&conn);
            accounts
                .insert(&account(
                    HOUSE_ACCOUNT_ID,
                    AccountRole::Admin,
                    PrizeRates::default(),
                    None,
                ))
                .unwrap();
            accounts
                .insert(&account("d1", AccountRole::Dealer, dealer_rates, None))
                .unwrap();
            accounts
                .insert(&account(
                    "u1",
                    AccountRole::User,
                    PrizeRates::default(),
                    Some("d1"),
                ))
                .unwrap();

            let games = GameStore::new(&conn);
            games.insert(&game("solo", "Kalyan", None)).unwrap();
            games
                .insert(&game(
                    "open",
                    "Milan Open",
                    Some(CoupleRef {
                        pair_id: "p1".to_string(),
                        role: CoupleRole::Open,
                    }),
                ))
                .unwrap();
            games
                .insert(&game(
                    "close",
                    "Milan Close",
                    Some(CoupleRef {
                        pair_id: "p1".to_string(),
                        role: CoupleRole::Close,
                    }),
                ))
                .unwrap();

            LedgerStore::new(&conn)
                .append("u1", AccountRole::User, "Opening deposit", 0, 100_000)
                .unwrap();
        }

        Fixture {
            _tmp: temp_dir,
            settlement: SettlementService::new(storage.clone()),
            transfers: TransferService::new(storage.clone(), ExchangeConfig::default()),
            draws: DrawService::new(storage.clone()),
            storage,
        }
    }

    impl Fixture {
        async fn balance(&self, id: &str) -> Money {
            let conn = self.storage.get_connection().await;
            LedgerStore::new(&conn).balance(id).unwrap()
        }

        async fn bet(&self, game_id: &str, sub_game: SubGame, numbers: &[&str], amount: Money) {
            let request = BetRequest {
                sub_game,
                numbers: numbers.iter().map(|n| n.to_string()).collect(),
                amount_per_number: amount,
            };
            self.transfers
                .place_bet_at("u1", game_id, &[request], open_now())
                .await
                .unwrap();
        }

        async fn declare(&self, game_id: &str, digits: &str) {
            self.draws.declare_winner(game_id, digits).await.unwrap();
        }
    }

    #[tokio::test]
    async fn jodi_win_pays_multiplier_and_spread() {
        let fixture = setup().await;

        fixture
            .bet("solo", SubGame::TwoDigit, &["12", "34"], 1000)
            .await;
        fixture.declare("solo", "12").await;

        let after_bet_user = fixture.balance("u1").await;
        let after_bet_house = fixture.balance(HOUSE_ACCOUNT_ID).await;

        let summary = fixture.settlement.approve_payouts("solo").await.unwrap();

        // 1 matched number x 1000 x 95.00
        assert_eq!(summary.total_user_prizes, 95_000);
        // dealer spread 1 x 1000 x (96.00 - 95.00)
        assert_eq!(summary.total_dealer_profit, 1_000);
        assert_eq!(summary.bets_settled, 1);
        assert_eq!(summary.winning_bets, 1);
        assert!(summary.game.payouts_approved);
        assert!(summary.game.approved_at.is_some());

        assert_eq!(fixture.balance("u1").await, after_bet_user + 95_000);
        assert_eq!(fixture.balance("d1").await, 1_000);
        assert_eq!(
            fixture.balance(HOUSE_ACCOUNT_ID).await,
            after_bet_house - 95_000 - 1_000
        );
    }

    #[tokio::test]
    async fn second_approval_fails_without_postings() {
        let fixture = setup().await;

        fixture.bet("solo", SubGame::TwoDigit, &["12"], 1000).await;
        fixture.declare("solo", "12").await;

        fixture.settlement.approve_payouts("solo").await.unwrap();
        let user_after = fixture.balance("u1").await;
        let house_after = fixture.balance(HOUSE_ACCOUNT_ID).await;

        let err = fixture
            .settlement
            .approve_payouts("solo")
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::AlreadyApproved(_)));

        assert_eq!(fixture.balance("u1").await, user_after);
        assert_eq!(fixture.balance(HOUSE_ACCOUNT_ID).await, house_after);
    }

    #[tokio::test]
    async fn losing_bets_settle_with_no_postings() {
        let fixture = setup().await;

        fixture.bet("solo", SubGame::TwoDigit, &["34"], 1000).await;
        fixture.declare("solo", "12").await;

        let user_before = fixture.balance("u1").await;
        let summary = fixture.settlement.approve_payouts("solo").await.unwrap();

        assert_eq!(summary.bets_settled, 1);
        assert_eq!(summary.winning_bets, 0);
        assert_eq!(summary.total_user_prizes, 0);
        assert_eq!(fixture.balance("u1").await, user_before);
        assert!(summary.game.payouts_approved);
    }

    #[tokio::test]
    async fn no_dealer_posting_when_spread_is_not_positive() {
        let fixture = setup().await;

        // dealer with rates at or below the user's
        {
            let conn = fixture.storage.get_connection().await;
            let accounts = AccountStore::new(&conn);
            accounts
                .insert(&account(
                    "d2",
                    AccountRole::Dealer,
                    PrizeRates::default(),
                    None,
                ))
                .unwrap();
            accounts
                .insert(&account(
                    "u2",
                    AccountRole::User,
                    PrizeRates::default(),
                    Some("d2"),
                ))
                .unwrap();
            LedgerStore::new(&conn)
                .append("u2", AccountRole::User, "Opening deposit", 0, 10_000)
                .unwrap();
        }

        let request = BetRequest {
            sub_game: SubGame::TwoDigit,
            numbers: vec!["12".to_string()],
            amount_per_number: 1000,
        };
        fixture
            .transfers
            .place_bet_at("u2", "solo", &[request], open_now())
            .await
            .unwrap();
        fixture.declare("solo", "12").await;

        let summary = fixture.settlement.approve_payouts("solo").await.unwrap();
        assert_eq!(summary.total_dealer_profit, 0);
        assert_eq!(fixture.balance("d2").await, 0);

        let conn = fixture.storage.get_connection().await;
        assert!(LedgerStore::new(&conn)
            .statement("d2", 10)
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn settlement_requires_a_final_number() {
        let fixture = setup().await;

        let err = fixture
            .settlement
            .approve_payouts("solo")
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::NotDeclaredYet(_)));

        // a pending-close sentinel is not settleable either
        fixture.declare("open", "5").await;
        let err = fixture
            .settlement
            .approve_payouts("open")
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::NotDeclaredYet(_)));
    }

    #[tokio::test]
    async fn coupled_halves_settle_once_both_are_final() {
        let fixture = setup().await;

        fixture
            .bet("open", SubGame::OneDigitOpen, &["5"], 1000)
            .await;
        fixture
            .bet("close", SubGame::OneDigitClose, &["7"], 1000)
            .await;

        // close declared alone: its own number is final but the pair is not
        fixture.declare("close", "7").await;
        let err = fixture
            .settlement
            .approve_payouts("close")
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::NotDeclaredYet(_)));

        fixture.declare("open", "5").await;

        let close_summary = fixture.settlement.approve_payouts("close").await.unwrap();
        // close bet "7" matches the close-only digit: 1 x 1000 x 9.50
        assert_eq!(close_summary.total_user_prizes, 9_500);

        // approving the second half still works after the first
        let open_summary = fixture.settlement.approve_payouts("open").await.unwrap();
        // open bet "5" matches the first character of "57"
        assert_eq!(open_summary.total_user_prizes, 9_500);
    }

    #[tokio::test]
    async fn prize_math_truncates_toward_zero() {
        let fixture = setup().await;

        fixture.bet("solo", SubGame::TwoDigit, &["12"], 99).await;
        fixture.declare("solo", "12").await;

        let summary = fixture.settlement.approve_payouts("solo").await.unwrap();
        // 99 x 95.00 = 9405 exactly; with rate 9500 hundredths:
        // 99 * 9500 / 100 = 9405
        assert_eq!(summary.total_user_prizes, 9_405);
        // dealer spread: 99 * 100 / 100 = 99
        assert_eq!(summary.total_dealer_profit, 99);
    }

    #[test]
    fn winning_count_slices_by_sub_game() {
        let bet = |sub_game: SubGame, numbers: &[&str]| Bet {
            id: "b".to_string(),
            user_id: "u".to_string(),
            dealer_id: "d".to_string(),
            game_id: "g".to_string(),
            sub_game,
            numbers: numbers.iter().map(|n| n.to_string()).collect(),
            amount_per_number: 100,
            total_amount: 100 * numbers.len() as Money,
            created_at: Utc::now(),
        };

        // two-character result
        assert_eq!(winning_count(&bet(SubGame::OneDigitOpen, &["5", "7"]), "57"), 1);
        assert_eq!(winning_count(&bet(SubGame::OneDigitClose, &["5", "7"]), "57"), 1);
        assert_eq!(
            winning_count(&bet(SubGame::TwoDigit, &["57", "75", "57"]), "57"),
            2
        );

        // close-only single-character result
        assert_eq!(winning_count(&bet(SubGame::OneDigitClose, &["7"]), "7"), 1);
        assert_eq!(winning_count(&bet(SubGame::TwoDigit, &["57"]), "7"), 0);

        // no matches
        assert_eq!(winning_count(&bet(SubGame::OneDigitOpen, &["9"]), "57"), 0);
        assert_eq!(winning_count(&bet(SubGame::TwoDigit, &["75"]), "57"), 0);
    }
}

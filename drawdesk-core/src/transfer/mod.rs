use crate::error::{ExchangeError, Result};
use crate::exchange::ExchangeConfig;
use crate::market;
use crate::storage::{AccountStore, BetStore, GameStore, LedgerStore, Storage};
use crate::types::{
    format_money, Account, AccountRole, Bet, BetRequest, Game, Money, TransferDirection,
    HOUSE_ACCOUNT_ID,
};
use chrono::{NaiveDateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// Composes ledger appends for bet placement and parent/child fund
/// movements into single atomic multi-entry operations.
pub struct TransferService {
    storage: Arc<Storage>,
    config: ExchangeConfig,
}

impl TransferService {
    pub fn new(storage: Arc<Storage>, config: ExchangeConfig) -> Self {
        Self { storage, config }
    }

    /// Place one or more bet groups for a user on a game. All validation
    /// happens before the transaction opens; the bet rows and the full
    /// fund fan-out commit together or not at all.
    pub async fn place_bet(
        &self,
        user_id: &str,
        game_id: &str,
        requests: &[BetRequest],
    ) -> Result<Vec<Bet>> {
        let now_local = self.config.local_time(Utc::now());
        self.place_bet_at(user_id, game_id, requests, now_local)
            .await
    }

    pub(crate) async fn place_bet_at(
        &self,
        user_id: &str,
        game_id: &str,
        requests: &[BetRequest],
        now_local: NaiveDateTime,
    ) -> Result<Vec<Bet>> {
        if requests.is_empty() {
            return Err(ExchangeError::invalid_number("no bet groups supplied"));
        }

        let mut conn = self.storage.get_connection().await;

        let (user, dealer, game) = {
            let accounts = AccountStore::new(&conn);
            let games = GameStore::new(&conn);

            let user = accounts
                .get(user_id)?
                .ok_or_else(|| ExchangeError::not_found(format!("account {}", user_id)))?;
            if user.role != AccountRole::User {
                return Err(ExchangeError::not_found(format!("user account {}", user_id)));
            }
            if user.is_restricted {
                return Err(ExchangeError::restricted(format!("account {}", user_id)));
            }

            let dealer_id = user
                .dealer_id
                .clone()
                .ok_or_else(|| ExchangeError::internal(format!("user {} has no dealer", user_id)))?;
            let dealer = accounts
                .get(&dealer_id)?
                .ok_or_else(|| ExchangeError::not_found(format!("account {}", dealer_id)))?;

            let game = games
                .get(game_id)?
                .ok_or_else(|| ExchangeError::not_found(format!("game {}", game_id)))?;

            if !market::is_open(now_local, game.draw_time, self.config.market_open_hour) {
                return Err(ExchangeError::market_closed(format!("game {}", game.name)));
            }

            (user, dealer, game)
        };

        for request in requests {
            validate_request(&user, request)?;
        }

        let tx = conn.transaction()?;
        let mut bets = Vec::with_capacity(requests.len());
        {
            let bet_store = BetStore::new(&tx);
            let ledger = LedgerStore::new(&tx);

            for request in requests {
                let bet = build_bet(&user, &dealer, &game, request);
                bet_store.insert(&bet)?;
                post_bet_entries(&ledger, &user, &dealer, &game, &bet)?;
                bets.push(bet);
            }
        }
        tx.commit()?;

        tracing::info!(
            "Placed {} bet group(s) for user {} on game {}",
            bets.len(),
            user_id,
            game.name
        );
        Ok(bets)
    }

    /// Move funds between a parent tier and one of its children. Deposit
    /// debits the parent and credits the child; withdrawal is the mirror
    /// pair. Returns the child account with its updated wallet.
    pub async fn transfer(
        &self,
        parent_id: &str,
        child_id: &str,
        amount: Money,
        direction: TransferDirection,
    ) -> Result<Account> {
        if amount <= 0 {
            return Err(ExchangeError::invalid_number(
                "transfer amount must be positive",
            ));
        }

        let mut conn = self.storage.get_connection().await;

        let (parent, child) = {
            let accounts = AccountStore::new(&conn);

            let parent = accounts
                .get(parent_id)?
                .ok_or_else(|| ExchangeError::not_found(format!("account {}", parent_id)))?;
            let child = accounts
                .get(child_id)?
                .ok_or_else(|| ExchangeError::not_found(format!("account {}", child_id)))?;

            let manages = match (parent.role, child.role) {
                (AccountRole::Admin, AccountRole::Dealer) => true,
                (AccountRole::Dealer, AccountRole::User) => {
                    child.dealer_id.as_deref() == Some(parent_id)
                }
                _ => false,
            };
            if !manages {
                return Err(ExchangeError::not_found(format!(
                    "account {} does not manage {}",
                    parent_id, child_id
                )));
            }

            if child.is_restricted {
                return Err(ExchangeError::restricted(format!("account {}", child_id)));
            }

            (parent, child)
        };

        let tx = conn.transaction()?;
        let updated = {
            let ledger = LedgerStore::new(&tx);

            match direction {
                TransferDirection::Deposit => {
                    ledger.append(
                        &parent.id,
                        parent.role,
                        &format!("Deposit to {}", child.username),
                        amount,
                        0,
                    )?;
                    ledger.append(
                        &child.id,
                        child.role,
                        &format!("Deposit from {}", parent.username),
                        0,
                        amount,
                    )?;
                }
                TransferDirection::Withdraw => {
                    ledger.append(
                        &child.id,
                        child.role,
                        &format!("Withdrawal to {}", parent.username),
                        amount,
                        0,
                    )?;
                    ledger.append(
                        &parent.id,
                        parent.role,
                        &format!("Withdrawal from {}", child.username),
                        0,
                        amount,
                    )?;
                }
            }

            AccountStore::new(&tx)
                .get(child_id)?
                .ok_or_else(|| ExchangeError::not_found(format!("account {}", child_id)))?
        };
        tx.commit()?;

        tracing::info!(
            "Transferred {} between {} and {} ({:?})",
            format_money(amount),
            parent_id,
            child_id,
            direction
        );
        Ok(updated)
    }
}

fn validate_request(user: &Account, request: &BetRequest) -> Result<()> {
    if request.numbers.is_empty() {
        return Err(ExchangeError::invalid_number("no numbers supplied"));
    }

    if request.amount_per_number <= 0 {
        return Err(ExchangeError::invalid_number(
            "amount per number must be positive",
        ));
    }

    let expected_len = request.sub_game.digit_len();
    for number in &request.numbers {
        if number.len() != expected_len || number.chars().any(|c| !c.is_ascii_digit()) {
            return Err(ExchangeError::invalid_number(format!(
                "number '{}' is not a {}-digit value",
                number, expected_len
            )));
        }
    }

    let count = request.numbers.len() as Money;
    if count.checked_mul(request.amount_per_number).is_none() {
        return Err(ExchangeError::invalid_number("total stake overflows"));
    }

    if let Some(limit) = user.bet_limits.limit_for(request.sub_game) {
        if request.amount_per_number > limit {
            return Err(ExchangeError::BetLimitExceeded {
                limit,
                requested: request.amount_per_number,
            });
        }
    }

    Ok(())
}

fn build_bet(user: &Account, dealer: &Account, game: &Game, request: &BetRequest) -> Bet {
    Bet {
        id: Uuid::new_v4().to_string(),
        user_id: user.id.clone(),
        dealer_id: dealer.id.clone(),
        game_id: game.id.clone(),
        sub_game: request.sub_game,
        numbers: request.numbers.clone(),
        amount_per_number: request.amount_per_number,
        total_amount: request.numbers.len() as Money * request.amount_per_number,
        created_at: Utc::now(),
    }
}

/// The stake fan-out for one bet: user pays the gross stake, gets own
/// commission back, the house takes the stake and funds both commission
/// shares. The incremental dealer share only exists when the dealer's
/// rate exceeds the user's.
fn post_bet_entries(
    ledger: &LedgerStore<'_>,
    user: &Account,
    dealer: &Account,
    game: &Game,
    bet: &Bet,
) -> Result<()> {
    let label = bet.sub_game.label();
    let total = bet.total_amount;

    ledger.append(
        &user.id,
        user.role,
        &format!(
            "Bet {} {} [{}] @ {}",
            game.name,
            label,
            bet.numbers.join(","),
            format_money(bet.amount_per_number)
        ),
        total,
        0,
    )?;

    let user_commission = commission(total, user.commission_bps);
    if user_commission > 0 {
        ledger.append(
            &user.id,
            user.role,
            &format!("Commission on {} {} bet", game.name, label),
            0,
            user_commission,
        )?;
    }

    ledger.append(
        HOUSE_ACCOUNT_ID,
        AccountRole::Admin,
        &format!("Stake from {} on {} {}", user.username, game.name, label),
        0,
        total,
    )?;

    if user_commission > 0 {
        ledger.append(
            HOUSE_ACCOUNT_ID,
            AccountRole::Admin,
            &format!(
                "Commission to {} on {} {}",
                user.username, game.name, label
            ),
            user_commission,
            0,
        )?;
    }

    if dealer.commission_bps > user.commission_bps {
        let delta = commission(total, dealer.commission_bps - user.commission_bps);
        if delta > 0 {
            ledger.append(
                HOUSE_ACCOUNT_ID,
                AccountRole::Admin,
                &format!(
                    "Commission to {} on {} {}",
                    dealer.username, game.name, label
                ),
                delta,
                0,
            )?;
            ledger.append(
                &dealer.id,
                dealer.role,
                &format!(
                    "Commission on {} {} bet by {}",
                    game.name, label, user.username
                ),
                0,
                delta,
            )?;
        }
    }

    Ok(())
}

fn commission(total: Money, bps: u32) -> Money {
    total * bps as Money / 10_000
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BetLimits, PrizeRates, SubGame};
    use chrono::{NaiveDate, NaiveTime};
    use tempfile::tempdir;

    fn account(
        id: &str,
        role: AccountRole,
        commission_bps: u32,
        dealer_id: Option<&str>,
    ) -> Account {
        Account {
            id: id.to_string(),
            role,
            name: id.to_string(),
            username: id.to_string(),
            credential: String::new(),
            wallet: 0,
            commission_bps,
            prize_rates: PrizeRates::default(),
            bet_limits: BetLimits::default(),
            is_restricted: false,
            dealer_id: dealer_id.map(|d| d.to_string()),
            created_at: Utc::now(),
        }
    }

    fn game(id: &str, name: &str) -> Game {
        Game {
            id: id.to_string(),
            name: name.to_string(),
            draw_time: NaiveTime::from_hms_opt(21, 30, 0).unwrap(),
            winning_number: None,
            payouts_approved: false,
            approved_at: None,
            couple: None,
            created_at: Utc::now(),
        }
    }

    fn open_now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    async fn setup() -> (tempfile::TempDir, TransferService) {
        let temp_dir = tempdir().unwrap();
        let storage = Arc::new(
            Storage::new(&temp_dir.path().join("test.db"))
                .await
                .unwrap(),
        );

        {
            let conn = storage.get_connection().await;
            let accounts = AccountStore::new(&conn);
            accounts
                .insert(&account(HOUSE_ACCOUNT_ID, AccountRole::Admin, 0, None))
                .unwrap();
            accounts
                .insert(&account("d1", AccountRole::Dealer, 500, None))
                .unwrap();
            accounts
                .insert(&account("u1", AccountRole::User, 300, Some("d1")))
                .unwrap();
            GameStore::new(&conn).insert(&game("g1", "Kalyan")).unwrap();

            LedgerStore::new(&conn)
                .append("u1", AccountRole::User, "Opening deposit", 0, 5000)
                .unwrap();
        }

        let service = TransferService::new(storage, ExchangeConfig::default());
        (temp_dir, service)
    }

    async fn balance(service: &TransferService, id: &str) -> Money {
        let conn = service.storage.get_connection().await;
        LedgerStore::new(&conn).balance(id).unwrap()
    }

    #[tokio::test]
    async fn bet_fan_out_moves_stake_and_commissions() {
        let (_tmp, service) = setup().await;

        let request = BetRequest {
            sub_game: SubGame::TwoDigit,
            numbers: vec!["12".to_string(), "34".to_string()],
            amount_per_number: 1000,
        };
        let bets = service
            .place_bet_at("u1", "g1", &[request], open_now())
            .await
            .unwrap();

        assert_eq!(bets.len(), 1);
        assert_eq!(bets[0].total_amount, 2000);

        // user: 5000 - 2000 stake + 60 commission (3%)
        assert_eq!(balance(&service, "u1").await, 3060);
        // house: +2000 stake - 60 user commission - 40 dealer delta (2%)
        assert_eq!(balance(&service, HOUSE_ACCOUNT_ID).await, 1900);
        // dealer: the incremental commission share only
        assert_eq!(balance(&service, "d1").await, 40);

        let conn = service.storage.get_connection().await;
        let stored = BetStore::new(&conn).list_by_game("g1").unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].numbers, vec!["12", "34"]);
    }

    #[tokio::test]
    async fn bet_entries_are_zero_sum() {
        let (_tmp, service) = setup().await;

        let request = BetRequest {
            sub_game: SubGame::OneDigitOpen,
            numbers: vec!["5".to_string(), "7".to_string(), "9".to_string()],
            amount_per_number: 700,
        };
        service
            .place_bet_at("u1", "g1", &[request], open_now())
            .await
            .unwrap();

        let conn = service.storage.get_connection().await;
        let ledger = LedgerStore::new(&conn);

        let mut debits = 0;
        let mut credits = 0;
        for id in ["u1", "d1", HOUSE_ACCOUNT_ID] {
            for entry in ledger.statement(id, 100).unwrap() {
                if entry.description != "Opening deposit" {
                    debits += entry.debit;
                    credits += entry.credit;
                }
            }
        }
        assert_eq!(debits, credits);
    }

    #[tokio::test]
    async fn insufficient_funds_leaves_no_partial_state() {
        let (_tmp, service) = setup().await;

        let request = BetRequest {
            sub_game: SubGame::TwoDigit,
            numbers: vec!["12".to_string()],
            amount_per_number: 9000,
        };
        let err = service
            .place_bet_at("u1", "g1", &[request], open_now())
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::InsufficientFunds { .. }));

        assert_eq!(balance(&service, "u1").await, 5000);
        assert_eq!(balance(&service, HOUSE_ACCOUNT_ID).await, 0);

        let conn = service.storage.get_connection().await;
        assert!(BetStore::new(&conn).list_by_game("g1").unwrap().is_empty());
        assert_eq!(LedgerStore::new(&conn).statement("u1", 10).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn second_group_failure_rolls_back_the_first() {
        let (_tmp, service) = setup().await;

        let requests = [
            BetRequest {
                sub_game: SubGame::TwoDigit,
                numbers: vec!["12".to_string()],
                amount_per_number: 3000,
            },
            BetRequest {
                sub_game: SubGame::TwoDigit,
                numbers: vec!["34".to_string()],
                amount_per_number: 4000,
            },
        ];
        let err = service
            .place_bet_at("u1", "g1", &requests, open_now())
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::InsufficientFunds { .. }));

        assert_eq!(balance(&service, "u1").await, 5000);
        let conn = service.storage.get_connection().await;
        assert!(BetStore::new(&conn).list_by_game("g1").unwrap().is_empty());
    }

    #[tokio::test]
    async fn restricted_user_cannot_bet() {
        let (_tmp, service) = setup().await;

        {
            let conn = service.storage.get_connection().await;
            AccountStore::new(&conn).set_restricted("u1", true).unwrap();
        }

        let request = BetRequest {
            sub_game: SubGame::OneDigitOpen,
            numbers: vec!["5".to_string()],
            amount_per_number: 100,
        };
        let err = service
            .place_bet_at("u1", "g1", &[request], open_now())
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::RestrictedAccount(_)));
    }

    #[tokio::test]
    async fn closed_market_rejects_bets() {
        let (_tmp, service) = setup().await;

        let before_open = NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let request = BetRequest {
            sub_game: SubGame::OneDigitOpen,
            numbers: vec!["5".to_string()],
            amount_per_number: 100,
        };
        let err = service
            .place_bet_at("u1", "g1", &[request], before_open)
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::MarketClosed(_)));
    }

    #[tokio::test]
    async fn malformed_numbers_are_rejected() {
        let (_tmp, service) = setup().await;

        for numbers in [
            vec!["123".to_string()],
            vec!["1".to_string()],
            vec!["ab".to_string()],
            vec![],
        ] {
            let request = BetRequest {
                sub_game: SubGame::TwoDigit,
                numbers,
                amount_per_number: 100,
            };
            let err = service
                .place_bet_at("u1", "g1", &[request], open_now())
                .await
                .unwrap_err();
            assert!(matches!(err, ExchangeError::InvalidNumberFormat(_)));
        }
    }

    #[tokio::test]
    async fn bet_limit_is_enforced() {
        let (_tmp, service) = setup().await;

        {
            let conn = service.storage.get_connection().await;
            let mut limited = account("u2", AccountRole::User, 0, Some("d1"));
            limited.bet_limits.two_digit = Some(500);
            AccountStore::new(&conn).insert(&limited).unwrap();
            LedgerStore::new(&conn)
                .append("u2", AccountRole::User, "Opening deposit", 0, 5000)
                .unwrap();
        }

        let request = BetRequest {
            sub_game: SubGame::TwoDigit,
            numbers: vec!["12".to_string()],
            amount_per_number: 900,
        };
        let err = service
            .place_bet_at("u2", "g1", &[request], open_now())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ExchangeError::BetLimitExceeded {
                limit: 500,
                requested: 900
            }
        ));
    }

    #[tokio::test]
    async fn no_dealer_share_when_rates_do_not_exceed() {
        let (_tmp, service) = setup().await;

        {
            let conn = service.storage.get_connection().await;
            let accounts = AccountStore::new(&conn);
            accounts
                .insert(&account("d2", AccountRole::Dealer, 200, None))
                .unwrap();
            accounts
                .insert(&account("u3", AccountRole::User, 200, Some("d2")))
                .unwrap();
            LedgerStore::new(&conn)
                .append("u3", AccountRole::User, "Opening deposit", 0, 5000)
                .unwrap();
        }

        let request = BetRequest {
            sub_game: SubGame::TwoDigit,
            numbers: vec!["12".to_string()],
            amount_per_number: 1000,
        };
        service
            .place_bet_at("u3", "g1", &[request], open_now())
            .await
            .unwrap();

        assert_eq!(balance(&service, "d2").await, 0);
        let conn = service.storage.get_connection().await;
        assert!(LedgerStore::new(&conn).statement("d2", 10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn deposit_and_withdraw_between_tiers() {
        let (_tmp, service) = setup().await;

        let updated = service
            .transfer(HOUSE_ACCOUNT_ID, "d1", 10_000, TransferDirection::Deposit)
            .await
            .unwrap();
        assert_eq!(updated.wallet, 10_000);
        assert_eq!(balance(&service, HOUSE_ACCOUNT_ID).await, -10_000);

        let updated = service
            .transfer("d1", "u1", 2_000, TransferDirection::Deposit)
            .await
            .unwrap();
        assert_eq!(updated.wallet, 7_000);
        assert_eq!(balance(&service, "d1").await, 8_000);

        let updated = service
            .transfer("d1", "u1", 500, TransferDirection::Withdraw)
            .await
            .unwrap();
        assert_eq!(updated.wallet, 6_500);
        assert_eq!(balance(&service, "d1").await, 8_500);
    }

    #[tokio::test]
    async fn deposit_overdrawing_dealer_fails_atomically() {
        let (_tmp, service) = setup().await;

        let err = service
            .transfer("d1", "u1", 1_000, TransferDirection::Deposit)
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::InsufficientFunds { .. }));

        assert_eq!(balance(&service, "u1").await, 5000);
        assert_eq!(balance(&service, "d1").await, 0);
    }

    #[tokio::test]
    async fn transfer_guards_hierarchy_and_restriction() {
        let (_tmp, service) = setup().await;

        {
            let conn = service.storage.get_connection().await;
            AccountStore::new(&conn)
                .insert(&account("d2", AccountRole::Dealer, 0, None))
                .unwrap();
        }

        // u1 belongs to d1, not d2
        let err = service
            .transfer("d2", "u1", 100, TransferDirection::Deposit)
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::NotFound(_)));

        {
            let conn = service.storage.get_connection().await;
            AccountStore::new(&conn).set_restricted("u1", true).unwrap();
        }
        let err = service
            .transfer("d1", "u1", 100, TransferDirection::Deposit)
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::RestrictedAccount(_)));
    }
}

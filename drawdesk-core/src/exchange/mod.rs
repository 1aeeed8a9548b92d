pub mod config;

pub use config::ExchangeConfig;

use crate::draw::{self, DrawService, PairState};
use crate::error::{ExchangeError, Result};
use crate::market::{self, MarketStatus};
use crate::scheduler::ResetScheduler;
use crate::settlement::SettlementService;
use crate::storage::{AccountStore, BetStore, GameStore, LedgerStore, Storage};
use crate::transfer::TransferService;
use crate::types::{
    Account, AccountRole, Bet, BetLimits, BetRequest, CoupleRef, CoupleRole, Game, LedgerEntry,
    Money, PrizeRates, SettlementSummary, TransferDirection, HOUSE_ACCOUNT_ID,
};
use chrono::{NaiveTime, Utc};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

const DB_FILE: &str = "drawdesk.db";

/// Fields supplied when a parent tier opens a new account.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub name: String,
    pub username: String,
    pub password: String,
    pub commission_bps: u32,
    pub prize_rates: PrizeRates,
    pub bet_limits: BetLimits,
    pub initial_deposit: Option<Money>,
}

/// Facade over the engine: owns the storage and the services, seeds the
/// house account, and exposes the operation surface consumed by the
/// request layer and the CLI.
pub struct Exchange {
    storage: Arc<Storage>,
    config: ExchangeConfig,
    transfers: TransferService,
    settlement: SettlementService,
    draws: DrawService,
    scheduler: Arc<ResetScheduler>,
}

impl Exchange {
    pub async fn new(data_dir: &Path, config: ExchangeConfig) -> Result<Self> {
        config.validate()?;

        let storage = Arc::new(Storage::new(&data_dir.join(DB_FILE)).await?);
        let exchange = Self {
            transfers: TransferService::new(storage.clone(), config.clone()),
            settlement: SettlementService::new(storage.clone()),
            draws: DrawService::new(storage.clone()),
            scheduler: Arc::new(ResetScheduler::new(storage.clone(), config.clone())),
            storage,
            config,
        };

        exchange.seed_house().await?;
        Ok(exchange)
    }

    async fn seed_house(&self) -> Result<()> {
        let conn = self.storage.get_connection().await;
        let accounts = AccountStore::new(&conn);

        if accounts.get(HOUSE_ACCOUNT_ID)?.is_none() {
            accounts.insert(&Account {
                id: HOUSE_ACCOUNT_ID.to_string(),
                role: AccountRole::Admin,
                name: "House".to_string(),
                username: "admin".to_string(),
                credential: hash_credential("admin"),
                wallet: 0,
                commission_bps: 0,
                prize_rates: PrizeRates::default(),
                bet_limits: BetLimits::default(),
                is_restricted: false,
                dealer_id: None,
                created_at: Utc::now(),
            })?;
            tracing::info!("Seeded house account");
        }

        Ok(())
    }

    // ---- accounts ----

    pub async fn create_dealer(&self, details: NewAccount) -> Result<Account> {
        self.create_account(AccountRole::Dealer, None, details)
            .await
    }

    pub async fn create_user(&self, dealer_id: &str, details: NewAccount) -> Result<Account> {
        self.create_account(AccountRole::User, Some(dealer_id), details)
            .await
    }

    /// Insert the account row and, when an initial deposit is supplied,
    /// the funding pair from the parent, all in one transaction. A parent
    /// that cannot cover the deposit fails the whole creation.
    async fn create_account(
        &self,
        role: AccountRole,
        dealer_id: Option<&str>,
        details: NewAccount,
    ) -> Result<Account> {
        if details.username.trim().is_empty() {
            return Err(ExchangeError::config("username must not be empty"));
        }
        if let Some(deposit) = details.initial_deposit {
            if deposit <= 0 {
                return Err(ExchangeError::invalid_number(
                    "initial deposit must be positive",
                ));
            }
        }

        let mut conn = self.storage.get_connection().await;

        let parent = {
            let accounts = AccountStore::new(&conn);

            if accounts.get_by_username(&details.username)?.is_some() {
                return Err(ExchangeError::duplicate(format!(
                    "username {}",
                    details.username
                )));
            }

            match dealer_id {
                Some(dealer_id) => {
                    let dealer = accounts
                        .get(dealer_id)?
                        .ok_or_else(|| ExchangeError::not_found(format!("account {}", dealer_id)))?;
                    if dealer.role != AccountRole::Dealer {
                        return Err(ExchangeError::not_found(format!(
                            "dealer account {}",
                            dealer_id
                        )));
                    }
                    dealer
                }
                None => accounts
                    .get(HOUSE_ACCOUNT_ID)?
                    .ok_or_else(|| ExchangeError::internal("house account missing"))?,
            }
        };

        let account = Account {
            id: Uuid::new_v4().to_string(),
            role,
            name: details.name.clone(),
            username: details.username.clone(),
            credential: hash_credential(&details.password),
            wallet: 0,
            commission_bps: details.commission_bps,
            prize_rates: details.prize_rates,
            bet_limits: details.bet_limits,
            is_restricted: false,
            dealer_id: dealer_id.map(|d| d.to_string()),
            created_at: Utc::now(),
        };

        let tx = conn.transaction()?;
        let created = {
            let accounts = AccountStore::new(&tx);
            accounts.insert(&account)?;

            if let Some(deposit) = details.initial_deposit {
                let ledger = LedgerStore::new(&tx);
                ledger.append(
                    &parent.id,
                    parent.role,
                    &format!("Deposit to {}", account.username),
                    deposit,
                    0,
                )?;
                ledger.append(
                    &account.id,
                    account.role,
                    &format!("Deposit from {}", parent.username),
                    0,
                    deposit,
                )?;
            }

            accounts
                .get(&account.id)?
                .ok_or_else(|| ExchangeError::internal("account vanished during creation"))?
        };
        tx.commit()?;

        tracing::info!(
            "Created {} account {} ({})",
            created.role.as_str(),
            created.username,
            created.id
        );
        Ok(created)
    }

    pub async fn toggle_restriction(&self, account_id: &str) -> Result<Account> {
        let conn = self.storage.get_connection().await;
        let accounts = AccountStore::new(&conn);

        let account = accounts
            .get(account_id)?
            .ok_or_else(|| ExchangeError::not_found(format!("account {}", account_id)))?;
        if account.id == HOUSE_ACCOUNT_ID {
            return Err(ExchangeError::config("the house account cannot be restricted"));
        }

        accounts.set_restricted(account_id, !account.is_restricted)?;
        let updated = accounts
            .get(account_id)?
            .ok_or_else(|| ExchangeError::not_found(format!("account {}", account_id)))?;

        tracing::info!(
            "Account {} is now {}",
            updated.username,
            if updated.is_restricted {
                "restricted"
            } else {
                "active"
            }
        );
        Ok(updated)
    }

    pub async fn account(&self, account_id: &str) -> Result<Account> {
        let conn = self.storage.get_connection().await;
        AccountStore::new(&conn)
            .get(account_id)?
            .ok_or_else(|| ExchangeError::not_found(format!("account {}", account_id)))
    }

    pub async fn account_by_username(&self, username: &str) -> Result<Account> {
        let conn = self.storage.get_connection().await;
        AccountStore::new(&conn)
            .get_by_username(username)?
            .ok_or_else(|| ExchangeError::not_found(format!("account {}", username)))
    }

    pub async fn list_dealers(&self) -> Result<Vec<Account>> {
        let conn = self.storage.get_connection().await;
        AccountStore::new(&conn).list_by_role(AccountRole::Dealer)
    }

    pub async fn list_users(&self, dealer_id: &str) -> Result<Vec<Account>> {
        let conn = self.storage.get_connection().await;
        AccountStore::new(&conn).list_by_dealer(dealer_id)
    }

    pub async fn balance(&self, account_id: &str) -> Result<Money> {
        let conn = self.storage.get_connection().await;
        if AccountStore::new(&conn).get(account_id)?.is_none() {
            return Err(ExchangeError::not_found(format!("account {}", account_id)));
        }
        LedgerStore::new(&conn).balance(account_id)
    }

    pub async fn statement(&self, account_id: &str, limit: usize) -> Result<Vec<LedgerEntry>> {
        let conn = self.storage.get_connection().await;
        if AccountStore::new(&conn).get(account_id)?.is_none() {
            return Err(ExchangeError::not_found(format!("account {}", account_id)));
        }
        LedgerStore::new(&conn).statement(account_id, limit)
    }

    // ---- games ----

    pub async fn create_game(&self, name: &str, draw_time: NaiveTime) -> Result<Game> {
        let conn = self.storage.get_connection().await;
        let games = GameStore::new(&conn);

        let game = new_game(name, draw_time, None)?;
        if games.get_by_name(&game.name)?.is_some() {
            return Err(ExchangeError::duplicate(format!("game name {}", game.name)));
        }
        games.insert(&game)?;

        tracing::info!("Created game {} (draw {})", game.name, game.draw_time);
        Ok(game)
    }

    /// Create both halves of a coupled pair together so the pairing can
    /// never dangle.
    pub async fn create_coupled_pair(
        &self,
        open_name: &str,
        close_name: &str,
        open_draw: NaiveTime,
        close_draw: NaiveTime,
    ) -> Result<(Game, Game)> {
        let pair_id = Uuid::new_v4().to_string();
        let open = new_game(
            open_name,
            open_draw,
            Some(CoupleRef {
                pair_id: pair_id.clone(),
                role: CoupleRole::Open,
            }),
        )?;
        let close = new_game(
            close_name,
            close_draw,
            Some(CoupleRef {
                pair_id,
                role: CoupleRole::Close,
            }),
        )?;
        if open.name == close.name {
            return Err(ExchangeError::duplicate(format!("game name {}", open.name)));
        }

        let mut conn = self.storage.get_connection().await;
        let tx = conn.transaction()?;
        {
            let games = GameStore::new(&tx);
            for game in [&open, &close] {
                if games.get_by_name(&game.name)?.is_some() {
                    return Err(ExchangeError::duplicate(format!("game name {}", game.name)));
                }
                games.insert(game)?;
            }
        }
        tx.commit()?;

        tracing::info!("Created coupled pair {} / {}", open.name, close.name);
        Ok((open, close))
    }

    pub async fn game(&self, game_id: &str) -> Result<Game> {
        let conn = self.storage.get_connection().await;
        GameStore::new(&conn)
            .get(game_id)?
            .ok_or_else(|| ExchangeError::not_found(format!("game {}", game_id)))
    }

    pub async fn game_by_name(&self, name: &str) -> Result<Game> {
        let conn = self.storage.get_connection().await;
        GameStore::new(&conn)
            .get_by_name(name)?
            .ok_or_else(|| ExchangeError::not_found(format!("game {}", name)))
    }

    pub async fn list_games(&self) -> Result<Vec<Game>> {
        let conn = self.storage.get_connection().await;
        GameStore::new(&conn).list()
    }

    /// Betting window and openness for polling clients. Reads the wall
    /// clock once per call.
    pub async fn market_status(&self, game_id: &str) -> Result<MarketStatus> {
        let game = self.game(game_id).await?;
        let now_local = self.config.local_time(Utc::now());
        let window = market::current_window(now_local, game.draw_time, self.config.market_open_hour);
        Ok(MarketStatus {
            window,
            is_open: window.contains(now_local),
        })
    }

    /// Derived state of the coupled pair this game belongs to, `None` for
    /// standalone games.
    pub async fn pair_state(&self, game_id: &str) -> Result<Option<PairState>> {
        let conn = self.storage.get_connection().await;
        let games = GameStore::new(&conn);

        let game = games
            .get(game_id)?
            .ok_or_else(|| ExchangeError::not_found(format!("game {}", game_id)))?;
        let couple = match &game.couple {
            Some(couple) => couple.clone(),
            None => return Ok(None),
        };
        let partner = games.partner(&game)?.ok_or_else(|| {
            ExchangeError::internal(format!("game {} has no partner row", game.id))
        })?;

        let state = match couple.role {
            CoupleRole::Open => draw::pair_state(&game, &partner),
            CoupleRole::Close => draw::pair_state(&partner, &game),
        };
        Ok(Some(state))
    }

    // ---- operations ----

    pub async fn place_bet(
        &self,
        user_id: &str,
        game_id: &str,
        requests: &[BetRequest],
    ) -> Result<Vec<Bet>> {
        self.transfers.place_bet(user_id, game_id, requests).await
    }

    pub async fn transfer(
        &self,
        parent_id: &str,
        child_id: &str,
        amount: Money,
        direction: TransferDirection,
    ) -> Result<Account> {
        self.transfers
            .transfer(parent_id, child_id, amount, direction)
            .await
    }

    pub async fn declare_winner(&self, game_id: &str, digits: &str) -> Result<Game> {
        self.draws.declare_winner(game_id, digits).await
    }

    pub async fn update_winner(&self, game_id: &str, digits: &str) -> Result<Game> {
        self.draws.update_winner(game_id, digits).await
    }

    pub async fn approve_payouts(&self, game_id: &str) -> Result<SettlementSummary> {
        self.settlement.approve_payouts(game_id).await
    }

    pub async fn bets_for_game(&self, game_id: &str) -> Result<Vec<Bet>> {
        let conn = self.storage.get_connection().await;
        if GameStore::new(&conn).get(game_id)?.is_none() {
            return Err(ExchangeError::not_found(format!("game {}", game_id)));
        }
        BetStore::new(&conn).list_by_game(game_id)
    }

    pub async fn bets_for_user(&self, user_id: &str) -> Result<Vec<Bet>> {
        let conn = self.storage.get_connection().await;
        if AccountStore::new(&conn).get(user_id)?.is_none() {
            return Err(ExchangeError::not_found(format!("account {}", user_id)));
        }
        BetStore::new(&conn).list_by_user(user_id)
    }

    /// Start the daily reset poller on the runtime. The scheduler guards
    /// against overlapping runs, so calling this more than once is safe.
    pub fn start_daily_reset(&self) -> tokio::task::JoinHandle<()> {
        self.scheduler.clone().spawn()
    }
}

fn new_game(name: &str, draw_time: NaiveTime, couple: Option<CoupleRef>) -> Result<Game> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ExchangeError::config("game name must not be empty"));
    }

    Ok(Game {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        draw_time,
        winning_number: None,
        payouts_approved: false,
        approved_at: None,
        couple,
        created_at: Utc::now(),
    })
}

fn hash_credential(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

use crate::commands::{parse_amount, resolve_account, resolve_game};
use clap::Subcommand;
use comfy_table::{presets::UTF8_FULL, Table};
use drawdesk_core::{format_money, Bet, BetRequest, Exchange, ExchangeError, Result, SubGame};

#[derive(Subcommand)]
pub enum BetCommands {
    /// Place a bet for a user, one stake per number
    Place {
        /// User username or id
        user: String,
        /// Game name or id
        game: String,
        /// Numbers to back, e.g. 12 34 56
        #[arg(required = true)]
        numbers: Vec<String>,
        /// Stake per number, e.g. 10 or 2.50
        #[arg(short, long)]
        amount: String,
        /// Market: open, close or jodi
        #[arg(short, long, default_value = "jodi")]
        market: String,
    },
    /// List bets riding on a game
    ForGame {
        /// Game name or id
        game: String,
    },
    /// List a user's bets, newest first
    ForUser {
        /// User username or id
        user: String,
    },
}

pub async fn handle_bet_command(cmd: BetCommands, exchange: &Exchange) -> Result<()> {
    match cmd {
        BetCommands::Place {
            user,
            game,
            numbers,
            amount,
            market,
        } => {
            let user = resolve_account(exchange, &user).await?;
            let game = resolve_game(exchange, &game).await?;
            let request = BetRequest {
                sub_game: parse_market(&market)?,
                numbers,
                amount_per_number: parse_amount(&amount)?,
            };

            let bets = exchange.place_bet(&user.id, &game.id, &[request]).await?;
            let balance = exchange.balance(&user.id).await?;

            for bet in &bets {
                println!(
                    "Placed {} bet on '{}': [{}] at {} per number, {} total",
                    bet.sub_game.label(),
                    game.name,
                    bet.numbers.join(", "),
                    format_money(bet.amount_per_number),
                    format_money(bet.total_amount)
                );
            }
            println!("Balance for '{}': {}", user.username, format_money(balance));
        }

        BetCommands::ForGame { game } => {
            let game = resolve_game(exchange, &game).await?;
            let bets = exchange.bets_for_game(&game.id).await?;

            if bets.is_empty() {
                println!("No bets on '{}'.", game.name);
                return Ok(());
            }

            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec![
                "Placed",
                "User",
                "Market",
                "Numbers",
                "Per Number",
                "Total",
            ]);

            for bet in &bets {
                let username = match exchange.account(&bet.user_id).await {
                    Ok(account) => account.username,
                    Err(_) => bet.user_id.clone(),
                };
                table.add_row(bet_row(bet, username));
            }

            println!("{}", table);
        }

        BetCommands::ForUser { user } => {
            let user = resolve_account(exchange, &user).await?;
            let bets = exchange.bets_for_user(&user.id).await?;

            if bets.is_empty() {
                println!("No bets for '{}'.", user.username);
                return Ok(());
            }

            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec![
                "Placed",
                "Game",
                "Market",
                "Numbers",
                "Per Number",
                "Total",
            ]);

            for bet in &bets {
                let game_name = match exchange.game(&bet.game_id).await {
                    Ok(game) => game.name,
                    Err(_) => bet.game_id.clone(),
                };
                table.add_row(bet_row(bet, game_name));
            }

            println!("{}", table);
        }
    }

    Ok(())
}

fn bet_row(bet: &Bet, context: String) -> Vec<String> {
    vec![
        bet.created_at.format("%Y-%m-%d %H:%M").to_string(),
        context,
        bet.sub_game.label().to_string(),
        bet.numbers.join(", "),
        format_money(bet.amount_per_number),
        format_money(bet.total_amount),
    ]
}

fn parse_market(market: &str) -> Result<SubGame> {
    match market.to_lowercase().as_str() {
        "open" => Ok(SubGame::OneDigitOpen),
        "close" => Ok(SubGame::OneDigitClose),
        "jodi" => Ok(SubGame::TwoDigit),
        _ => Err(ExchangeError::config(format!(
            "Invalid market: {}. Supported markets: open, close, jodi",
            market
        ))),
    }
}

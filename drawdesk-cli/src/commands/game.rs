use crate::commands::{parse_draw_time, resolve_game};
use clap::Subcommand;
use comfy_table::{presets::UTF8_FULL, Table};
use dialoguer::Confirm;
use drawdesk_core::{format_money, CoupleRole, Exchange, ExchangeError, Result, WinningNumber};

#[derive(Subcommand)]
pub enum GameCommands {
    /// Create a standalone game
    Create {
        /// Game name
        name: String,
        /// Draw time in market-local HH:MM
        draw_time: String,
    },
    /// Create an open/close coupled pair
    CreatePair {
        /// Open half name
        open_name: String,
        /// Close half name
        close_name: String,
        /// Open half draw time (HH:MM)
        open_draw: String,
        /// Close half draw time (HH:MM)
        close_draw: String,
    },
    /// List games with their results
    List,
    /// Show a game, its betting window and pair state
    Info {
        /// Game name or id
        game: String,
    },
    /// Declare the winning result for a game
    Declare {
        /// Game name or id
        game: String,
        /// Winning digits: two for standalone games, one for coupled halves
        digits: String,
    },
    /// Correct an already declared result
    Update {
        /// Game name or id
        game: String,
        /// Replacement digits
        digits: String,
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
    /// Approve payouts and settle every bet on the game
    Approve {
        /// Game name or id
        game: String,
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
}

pub async fn handle_game_command(cmd: GameCommands, exchange: &Exchange) -> Result<()> {
    match cmd {
        GameCommands::Create { name, draw_time } => {
            let draw_time = parse_draw_time(&draw_time)?;
            let game = exchange.create_game(&name, draw_time).await?;

            println!("Game created successfully!");
            println!("  Name: {}", game.name);
            println!("  ID: {}", game.id);
            println!("  Draw: {}", game.draw_time.format("%H:%M"));
        }

        GameCommands::CreatePair {
            open_name,
            close_name,
            open_draw,
            close_draw,
        } => {
            let open_draw = parse_draw_time(&open_draw)?;
            let close_draw = parse_draw_time(&close_draw)?;
            let (open, close) = exchange
                .create_coupled_pair(&open_name, &close_name, open_draw, close_draw)
                .await?;

            println!("Coupled pair created successfully!");
            println!(
                "  Open half: {} (draw {})",
                open.name,
                open.draw_time.format("%H:%M")
            );
            println!(
                "  Close half: {} (draw {})",
                close.name,
                close.draw_time.format("%H:%M")
            );
        }

        GameCommands::List => {
            let games = exchange.list_games().await?;

            if games.is_empty() {
                println!("No games found.");
                println!("Create one with: drawdesk game create <name> <HH:MM>");
                return Ok(());
            }

            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["Name", "Draw", "Result", "Pair", "Settled"]);

            for game in &games {
                let result = match &game.winning_number {
                    Some(number) => number.to_string(),
                    None => "-".to_string(),
                };
                let pair = match &game.couple {
                    Some(couple) => match couple.role {
                        CoupleRole::Open => "Open half".to_string(),
                        CoupleRole::Close => "Close half".to_string(),
                    },
                    None => "-".to_string(),
                };
                table.add_row(vec![
                    game.name.clone(),
                    game.draw_time.format("%H:%M").to_string(),
                    result,
                    pair,
                    if game.payouts_approved {
                        "Yes".to_string()
                    } else {
                        "No".to_string()
                    },
                ]);
            }

            println!("{}", table);
        }

        GameCommands::Info { game } => {
            let game = resolve_game(exchange, &game).await?;
            let status = exchange.market_status(&game.id).await?;

            println!("Game Information:");
            println!("  Name: {}", game.name);
            println!("  ID: {}", game.id);
            println!("  Draw: {}", game.draw_time.format("%H:%M"));
            match &game.winning_number {
                Some(number) => println!("  Result: {}", number),
                None => println!("  Result: not declared"),
            }
            println!(
                "  Settled: {}",
                if game.payouts_approved { "yes" } else { "no" }
            );

            println!();
            println!("Betting window (market time):");
            println!("  Opens: {}", status.window.opens_at.format("%Y-%m-%d %H:%M"));
            println!(
                "  Closes: {}",
                status.window.closes_at.format("%Y-%m-%d %H:%M")
            );
            println!("  Open now: {}", if status.is_open { "yes" } else { "no" });

            if let Some(state) = exchange.pair_state(&game.id).await? {
                println!();
                println!("Coupled pair:");
                if let Some(couple) = &game.couple {
                    println!(
                        "  This game: {}",
                        match couple.role {
                            CoupleRole::Open => "open half",
                            CoupleRole::Close => "close half",
                        }
                    );
                }
                println!("  State: {:?}", state);
            }
        }

        GameCommands::Declare { game, digits } => {
            let game = resolve_game(exchange, &game).await?;
            let updated = exchange.declare_winner(&game.id, &digits).await?;

            match &updated.winning_number {
                Some(WinningNumber::PendingClose(_)) => {
                    println!(
                        "Declared {} for '{}'. Waiting on the close digit to finish the pair.",
                        digits, updated.name
                    );
                }
                Some(number) => {
                    println!("Declared {} for '{}'.", number, updated.name);
                }
                None => {
                    println!("Declared result for '{}'.", updated.name);
                }
            }
        }

        GameCommands::Update {
            game,
            digits,
            force,
        } => {
            let game = resolve_game(exchange, &game).await?;

            if !force {
                let confirm = Confirm::new()
                    .with_prompt(format!(
                        "Replace the declared result for '{}' with {}?",
                        game.name, digits
                    ))
                    .default(false)
                    .interact()
                    .map_err(|e| ExchangeError::internal(e.to_string()))?;

                if !confirm {
                    println!("Update cancelled.");
                    return Ok(());
                }
            }

            let updated = exchange.update_winner(&game.id, &digits).await?;
            match &updated.winning_number {
                Some(number) => println!("Result for '{}' is now {}.", updated.name, number),
                None => println!("Result for '{}' updated.", updated.name),
            }
        }

        GameCommands::Approve { game, force } => {
            let game = resolve_game(exchange, &game).await?;

            if !force {
                let confirm = Confirm::new()
                    .with_prompt(format!(
                        "Approve payouts for '{}'? Winning bets are paid immediately.",
                        game.name
                    ))
                    .default(false)
                    .interact()
                    .map_err(|e| ExchangeError::internal(e.to_string()))?;

                if !confirm {
                    println!("Approval cancelled.");
                    return Ok(());
                }
            }

            let summary = exchange.approve_payouts(&game.id).await?;

            println!("Payouts approved for '{}'.", summary.game.name);
            println!("  Bets settled: {}", summary.bets_settled);
            println!("  Winning bets: {}", summary.winning_bets);
            println!(
                "  Prizes paid: {}",
                format_money(summary.total_user_prizes)
            );
            println!(
                "  Dealer spread: {}",
                format_money(summary.total_dealer_profit)
            );
        }
    }

    Ok(())
}

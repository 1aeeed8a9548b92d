use chrono::NaiveTime;
use drawdesk_core::{
    format_money, BetRequest, Exchange, ExchangeConfig, NewAccount, SubGame, TransferDirection,
    HOUSE_ACCOUNT_ID,
};
use tempfile::tempdir;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    // Create temp dir
    let temp_dir = tempdir()?;
    println!("Using temporary directory: {:?}", temp_dir.path());

    // Open the exchange
    let exchange = Exchange::new(temp_dir.path(), ExchangeConfig::default()).await?;

    println!("Creating accounts...");
    let dealer = exchange
        .create_dealer(NewAccount {
            name: "Ramesh".to_string(),
            username: "ramesh".to_string(),
            password: "dealer-pass".to_string(),
            commission_bps: 500,
            prize_rates: Default::default(),
            bet_limits: Default::default(),
            initial_deposit: Some(1_000_000),
        })
        .await?;
    let user = exchange
        .create_user(
            &dealer.id,
            NewAccount {
                name: "Punter".to_string(),
                username: "punter".to_string(),
                password: "user-pass".to_string(),
                commission_bps: 300,
                prize_rates: Default::default(),
                bet_limits: Default::default(),
                initial_deposit: Some(100_000),
            },
        )
        .await?;

    println!("Dealer: {} ({})", dealer.username, dealer.id);
    println!("User: {} ({})", user.username, user.id);

    // Set up a game drawing at 21:30 market time
    let draw_time = NaiveTime::from_hms_opt(21, 30, 0).ok_or("bad draw time")?;
    let game = exchange.create_game("Kalyan", draw_time).await?;

    let status = exchange.market_status(&game.id).await?;
    println!("\nMarket for {}:", game.name);
    println!(
        "Window: {} -> {}",
        status.window.opens_at, status.window.closes_at
    );
    println!("Open: {}", status.is_open);

    if status.is_open {
        println!("\nPlacing a jodi bet...");
        let bets = exchange
            .place_bet(
                &user.id,
                &game.id,
                &[BetRequest {
                    sub_game: SubGame::TwoDigit,
                    numbers: vec!["57".to_string(), "34".to_string()],
                    amount_per_number: 1_000,
                }],
            )
            .await?;
        println!("Placed {} bet(s)", bets.len());
    } else {
        println!("\nMarket is closed right now, skipping the bet");
    }

    // Result comes in
    println!("\nDeclaring 57 and approving payouts...");
    exchange.declare_winner(&game.id, "57").await?;
    let summary = exchange.approve_payouts(&game.id).await?;
    println!(
        "Settled {} bet(s), {} winning, prizes {}",
        summary.bets_settled,
        summary.winning_bets,
        format_money(summary.total_user_prizes)
    );

    // Top the user up from the dealer float
    exchange
        .transfer(&dealer.id, &user.id, 5_000, TransferDirection::Deposit)
        .await?;

    println!("\nBalances:");
    println!(
        "House: {}",
        format_money(exchange.balance(HOUSE_ACCOUNT_ID).await?)
    );
    println!(
        "Dealer: {}",
        format_money(exchange.balance(&dealer.id).await?)
    );
    println!("User: {}", format_money(exchange.balance(&user.id).await?));

    println!("\nRecent user ledger:");
    for entry in exchange.statement(&user.id, 5).await? {
        println!(
            "{} | debit {} credit {} balance {}",
            entry.description,
            format_money(entry.debit),
            format_money(entry.credit),
            format_money(entry.balance)
        );
    }

    println!("\nExample completed successfully!");

    Ok(())
}

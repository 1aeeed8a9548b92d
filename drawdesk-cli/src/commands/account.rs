use crate::commands::{parse_amount, resolve_account};
use clap::Subcommand;
use comfy_table::{presets::UTF8_FULL, Table};
use dialoguer::Password;
use drawdesk_core::{
    format_money, AccountRole, BetLimits, Exchange, ExchangeError, NewAccount, PrizeRates, Result,
};

#[derive(Subcommand)]
pub enum AccountCommands {
    /// Create a dealer funded by the house
    CreateDealer {
        /// Display name
        name: String,
        /// Login username
        username: String,
        /// Commission percentage returned on stakes
        #[arg(short, long, default_value_t = 0.0)]
        commission: f64,
        /// Prize multiplier for open digit bets
        #[arg(long, default_value_t = 9.5)]
        open_rate: f64,
        /// Prize multiplier for close digit bets
        #[arg(long, default_value_t = 9.5)]
        close_rate: f64,
        /// Prize multiplier for jodi bets
        #[arg(long, default_value_t = 95.0)]
        jodi_rate: f64,
        /// Opening balance moved from the house float, e.g. 5000 or 500.50
        #[arg(long)]
        deposit: Option<String>,
        /// Password (will prompt if not provided)
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Create a user under a dealer
    CreateUser {
        /// Dealer username or id
        dealer: String,
        /// Display name
        name: String,
        /// Login username
        username: String,
        /// Commission percentage returned on stakes
        #[arg(short, long, default_value_t = 0.0)]
        commission: f64,
        /// Prize multiplier for open digit bets
        #[arg(long, default_value_t = 9.5)]
        open_rate: f64,
        /// Prize multiplier for close digit bets
        #[arg(long, default_value_t = 9.5)]
        close_rate: f64,
        /// Prize multiplier for jodi bets
        #[arg(long, default_value_t = 95.0)]
        jodi_rate: f64,
        /// Stake cap per open digit line
        #[arg(long)]
        open_limit: Option<String>,
        /// Stake cap per close digit line
        #[arg(long)]
        close_limit: Option<String>,
        /// Stake cap per jodi line
        #[arg(long)]
        jodi_limit: Option<String>,
        /// Opening balance moved from the dealer float
        #[arg(long)]
        deposit: Option<String>,
        /// Password (will prompt if not provided)
        #[arg(short, long)]
        password: Option<String>,
    },
    /// List dealers, or a dealer's users
    List {
        /// Dealer username or id to list users for
        #[arg(long)]
        dealer: Option<String>,
    },
    /// Show account details
    Info {
        /// Account username or id
        account: String,
    },
    /// Toggle the betting and transfer restriction on an account
    Restrict {
        /// Account username or id
        account: String,
    },
}

pub async fn handle_account_command(cmd: AccountCommands, exchange: &Exchange) -> Result<()> {
    match cmd {
        AccountCommands::CreateDealer {
            name,
            username,
            commission,
            open_rate,
            close_rate,
            jodi_rate,
            deposit,
            password,
        } => {
            let details = NewAccount {
                name,
                username,
                password: password_or_prompt(password)?,
                commission_bps: commission_to_bps(commission)?,
                prize_rates: rates_from_multipliers(open_rate, close_rate, jodi_rate)?,
                bet_limits: BetLimits::default(),
                initial_deposit: deposit.map(|d| parse_amount(&d)).transpose()?,
            };

            println!("Creating dealer '{}'...", details.username);
            let dealer = exchange.create_dealer(details).await?;

            println!("Dealer created successfully!");
            println!("  Name: {}", dealer.name);
            println!("  Username: {}", dealer.username);
            println!("  ID: {}", dealer.id);
            println!("  Balance: {}", format_money(dealer.wallet));
        }

        AccountCommands::CreateUser {
            dealer,
            name,
            username,
            commission,
            open_rate,
            close_rate,
            jodi_rate,
            open_limit,
            close_limit,
            jodi_limit,
            deposit,
            password,
        } => {
            let dealer = resolve_account(exchange, &dealer).await?;

            let details = NewAccount {
                name,
                username,
                password: password_or_prompt(password)?,
                commission_bps: commission_to_bps(commission)?,
                prize_rates: rates_from_multipliers(open_rate, close_rate, jodi_rate)?,
                bet_limits: BetLimits {
                    one_digit_open: open_limit.map(|v| parse_amount(&v)).transpose()?,
                    one_digit_close: close_limit.map(|v| parse_amount(&v)).transpose()?,
                    two_digit: jodi_limit.map(|v| parse_amount(&v)).transpose()?,
                },
                initial_deposit: deposit.map(|d| parse_amount(&d)).transpose()?,
            };

            println!(
                "Creating user '{}' under dealer '{}'...",
                details.username, dealer.username
            );
            let user = exchange.create_user(&dealer.id, details).await?;

            println!("User created successfully!");
            println!("  Name: {}", user.name);
            println!("  Username: {}", user.username);
            println!("  ID: {}", user.id);
            println!("  Balance: {}", format_money(user.wallet));
        }

        AccountCommands::List { dealer } => {
            let accounts = match &dealer {
                Some(dealer) => {
                    let dealer = resolve_account(exchange, dealer).await?;
                    exchange.list_users(&dealer.id).await?
                }
                None => exchange.list_dealers().await?,
            };

            if accounts.is_empty() {
                println!("No accounts found.");
                return Ok(());
            }

            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["Name", "Username", "Balance", "Commission", "Status"]);

            for account in accounts {
                table.add_row(vec![
                    account.name.clone(),
                    account.username.clone(),
                    format_money(account.wallet),
                    format!("{:.2}%", account.commission_bps as f64 / 100.0),
                    if account.is_restricted {
                        "Restricted".to_string()
                    } else {
                        "Active".to_string()
                    },
                ]);
            }

            println!("{}", table);
        }

        AccountCommands::Info { account } => {
            let account = resolve_account(exchange, &account).await?;
            let balance = exchange.balance(&account.id).await?;

            println!("Account Information:");
            println!("  Name: {}", account.name);
            println!("  Username: {}", account.username);
            println!("  ID: {}", account.id);
            println!("  Role: {}", account.role.as_str());
            if let Some(dealer_id) = &account.dealer_id {
                match exchange.account(dealer_id).await {
                    Ok(dealer) => println!("  Dealer: {}", dealer.username),
                    Err(_) => println!("  Dealer: {}", dealer_id),
                }
            }
            println!("  Balance: {}", format_money(balance));
            println!(
                "  Commission: {:.2}%",
                account.commission_bps as f64 / 100.0
            );
            println!(
                "  Status: {}",
                if account.is_restricted {
                    "Restricted"
                } else {
                    "Active"
                }
            );
            println!();
            println!("Prize rates:");
            println!(
                "  Open: {:.1}x",
                account.prize_rates.one_digit_open as f64 / 100.0
            );
            println!(
                "  Close: {:.1}x",
                account.prize_rates.one_digit_close as f64 / 100.0
            );
            println!(
                "  Jodi: {:.1}x",
                account.prize_rates.two_digit as f64 / 100.0
            );

            if account.role == AccountRole::User {
                println!();
                println!("Bet limits per line:");
                println!("  Open: {}", limit_display(account.bet_limits.one_digit_open));
                println!(
                    "  Close: {}",
                    limit_display(account.bet_limits.one_digit_close)
                );
                println!("  Jodi: {}", limit_display(account.bet_limits.two_digit));
            }
        }

        AccountCommands::Restrict { account } => {
            let account = resolve_account(exchange, &account).await?;
            let updated = exchange.toggle_restriction(&account.id).await?;

            if updated.is_restricted {
                println!(
                    "Account '{}' is now restricted. Bets and transfers are blocked.",
                    updated.username
                );
            } else {
                println!("Account '{}' is active again.", updated.username);
            }
        }
    }

    Ok(())
}

fn password_or_prompt(password: Option<String>) -> Result<String> {
    match password {
        Some(p) => Ok(p),
        None => Password::new()
            .with_prompt("Set account password")
            .with_confirmation("Confirm password", "Passwords do not match")
            .interact()
            .map_err(|e| ExchangeError::internal(e.to_string())),
    }
}

fn commission_to_bps(percent: f64) -> Result<u32> {
    if !(0.0..=100.0).contains(&percent) {
        return Err(ExchangeError::config(format!(
            "Invalid commission: {}. Expected a percentage between 0 and 100",
            percent
        )));
    }
    Ok((percent * 100.0).round() as u32)
}

fn rates_from_multipliers(open: f64, close: f64, jodi: f64) -> Result<PrizeRates> {
    for rate in [open, close, jodi] {
        if !(0.0..=10_000.0).contains(&rate) {
            return Err(ExchangeError::config(format!(
                "Invalid prize rate: {}. Expected a multiplier like 9.5",
                rate
            )));
        }
    }

    Ok(PrizeRates {
        one_digit_open: (open * 100.0).round() as u32,
        one_digit_close: (close * 100.0).round() as u32,
        two_digit: (jodi * 100.0).round() as u32,
    })
}

fn limit_display(limit: Option<i64>) -> String {
    match limit {
        Some(limit) => format_money(limit),
        None => "none".to_string(),
    }
}

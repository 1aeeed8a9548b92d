use crate::commands::resolve_account;
use clap::Subcommand;
use comfy_table::{presets::UTF8_FULL, Table};
use drawdesk_core::{format_money, Exchange, Money, Result};

#[derive(Subcommand)]
pub enum LedgerCommands {
    /// Show an account balance
    Balance {
        /// Account username or id
        account: String,
    },
    /// Show recent ledger entries, newest first
    Statement {
        /// Account username or id
        account: String,
        /// Maximum entries to show
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
}

pub async fn handle_ledger_command(cmd: LedgerCommands, exchange: &Exchange) -> Result<()> {
    match cmd {
        LedgerCommands::Balance { account } => {
            let account = resolve_account(exchange, &account).await?;
            let balance = exchange.balance(&account.id).await?;

            println!("Balance for '{}': {}", account.username, format_money(balance));
        }

        LedgerCommands::Statement { account, limit } => {
            let account = resolve_account(exchange, &account).await?;
            let entries = exchange.statement(&account.id, limit).await?;

            if entries.is_empty() {
                println!("No ledger entries for '{}'.", account.username);
                return Ok(());
            }

            println!("Statement for '{}':", account.username);

            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["When", "Description", "Debit", "Credit", "Balance"]);

            for entry in &entries {
                table.add_row(vec![
                    entry.created_at.format("%Y-%m-%d %H:%M").to_string(),
                    entry.description.clone(),
                    amount_cell(entry.debit),
                    amount_cell(entry.credit),
                    format_money(entry.balance),
                ]);
            }

            println!("{}", table);
        }
    }

    Ok(())
}

fn amount_cell(amount: Money) -> String {
    if amount == 0 {
        String::new()
    } else {
        format_money(amount)
    }
}

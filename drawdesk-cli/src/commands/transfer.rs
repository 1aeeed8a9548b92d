use crate::commands::{parse_amount, resolve_account};
use clap::Subcommand;
use drawdesk_core::{format_money, Exchange, Result, TransferDirection};

#[derive(Subcommand)]
pub enum TransferCommands {
    /// Move funds down a tier: house to dealer, or dealer to user
    Deposit {
        /// Funding account username or id
        parent: String,
        /// Receiving account username or id
        child: String,
        /// Amount, e.g. 500 or 99.50
        amount: String,
    },
    /// Pull funds back up a tier from a child account
    Withdraw {
        /// Receiving account username or id
        parent: String,
        /// Paying account username or id
        child: String,
        /// Amount, e.g. 500 or 99.50
        amount: String,
    },
}

pub async fn handle_transfer_command(cmd: TransferCommands, exchange: &Exchange) -> Result<()> {
    let (parent, child, amount, direction) = match cmd {
        TransferCommands::Deposit {
            parent,
            child,
            amount,
        } => (parent, child, amount, TransferDirection::Deposit),
        TransferCommands::Withdraw {
            parent,
            child,
            amount,
        } => (parent, child, amount, TransferDirection::Withdraw),
    };

    let parent = resolve_account(exchange, &parent).await?;
    let child = resolve_account(exchange, &child).await?;
    let amount = parse_amount(&amount)?;

    let updated_child = exchange
        .transfer(&parent.id, &child.id, amount, direction)
        .await?;
    let parent_balance = exchange.balance(&parent.id).await?;

    match direction {
        TransferDirection::Deposit => {
            println!(
                "Deposited {} into '{}'",
                format_money(amount),
                updated_child.username
            );
        }
        TransferDirection::Withdraw => {
            println!(
                "Withdrew {} from '{}'",
                format_money(amount),
                updated_child.username
            );
        }
    }
    println!(
        "  {} balance: {}",
        updated_child.username,
        format_money(updated_child.wallet)
    );
    println!("  {} balance: {}", parent.username, format_money(parent_balance));

    Ok(())
}

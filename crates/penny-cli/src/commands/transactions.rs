//! Transaction command implementations

use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use penny_core::{Database, NewTransaction, TransactionType};
use rust_decimal::Decimal;

use super::truncate;

pub fn cmd_transactions_list(db: &Database, user_id: &str, limit: usize) -> Result<()> {
    let transactions = db.list_user_transactions(user_id)?;

    if transactions.is_empty() {
        println!("No transactions found. Record one with:");
        println!("  penny transactions add \"Groceries\" 42.10 -c Food");
        return Ok(());
    }

    println!();
    println!("📝 Recent Transactions");
    println!("   ─────────────────────────────────────────────────────────────");

    for tx in transactions.iter().take(limit) {
        let amount_str = match tx.kind {
            // Red for expenses, green for income
            TransactionType::Expense => format!("\x1b[31m-${:.2}\x1b[0m", tx.amount),
            TransactionType::Income => format!("\x1b[32m+${:.2}\x1b[0m", tx.amount),
        };

        println!(
            "   [{}] {} │ {:>10} │ {:<14} │ {}",
            tx.id,
            tx.date,
            amount_str,
            tx.category.as_deref().unwrap_or("-"),
            truncate(&tx.description, 35)
        );
    }

    Ok(())
}

pub fn cmd_transactions_add(
    db: &Database,
    user_id: &str,
    description: &str,
    amount: &str,
    income: bool,
    category: Option<&str>,
    date: Option<&str>,
) -> Result<()> {
    let amount = parse_amount(amount)?;
    let date = match date {
        Some(d) => NaiveDate::parse_from_str(d, "%Y-%m-%d")
            .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", d))?,
        None => chrono::Local::now().date_naive(),
    };
    let kind = if income {
        TransactionType::Income
    } else {
        TransactionType::Expense
    };

    let tx = db.insert_transaction(
        user_id,
        &NewTransaction {
            description: description.to_string(),
            amount,
            kind,
            category: category.map(String::from),
            date,
        },
    )?;

    println!(
        "✅ Recorded {} [{}] {} ${:.2} on {}",
        tx.kind, tx.id, tx.description, tx.amount, tx.date
    );
    Ok(())
}

pub fn cmd_transactions_delete(db: &Database, user_id: &str, id: i64) -> Result<()> {
    db.delete_transaction(user_id, id)
        .with_context(|| format!("Failed to delete transaction {}", id))?;
    println!("🗑️  Deleted transaction {}", id);
    Ok(())
}

/// Parse an amount argument into an exact decimal
pub(crate) fn parse_amount(amount: &str) -> Result<Decimal> {
    let cleaned = amount.trim().trim_start_matches('$').replace(',', "");
    Decimal::from_str(&cleaned).with_context(|| format!("Invalid amount '{}'", amount))
}

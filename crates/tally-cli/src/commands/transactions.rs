//! Transaction command implementations

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use tally_core::db::Database;
use tally_core::models::{NewTransaction, TransactionType};
use tally_core::store::{TransactionQuery, TransactionStore};

use super::{format_won, truncate, Output};

/// Arguments for `tally transactions add`
pub struct ManualTransaction {
    pub description: String,
    pub amount: f64,
    pub date: Option<String>,
    pub external_id: Option<String>,
    pub source: String,
    pub income: bool,
    pub category: Option<String>,
    pub payment_method: Option<String>,
}

pub fn cmd_transactions_list(
    db: &Database,
    output: &Output,
    limit: usize,
    search: Option<&str>,
) -> Result<()> {
    let mut query = TransactionQuery::new().limit(limit.max(1));
    if let Some(term) = search {
        query = query.contains_any([term]);
    }
    let transactions = db.list_transactions(&query)?;

    if output.print_json(&transactions)? {
        return Ok(());
    }

    if transactions.is_empty() {
        println!("No transactions found. Add one with:");
        println!("  tally transactions add \"스타벅스 라떼\" 5000");
        return Ok(());
    }

    println!();
    println!("📝 Recent Transactions");
    println!("   ─────────────────────────────────────────────────────────────");

    for tx in transactions {
        let amount_str = match tx.transaction_type {
            TransactionType::Expense => format!("\x1b[31m{}\x1b[0m", format_won(tx.amount)),
            TransactionType::Income => format!("\x1b[32m+{}\x1b[0m", format_won(tx.amount)),
        };
        let excluded = if tx.is_excluded { " (제외)" } else { "" };

        println!(
            "   [{}] {} │ {:>12} │ {:10} │ {}{}",
            tx.id,
            tx.date,
            amount_str,
            truncate(tx.category.as_deref().unwrap_or("-"), 10),
            truncate(&tx.description, 35),
            excluded
        );
    }

    Ok(())
}

pub fn cmd_transactions_add(db: &Database, input: ManualTransaction) -> Result<()> {
    if input.description.trim().is_empty() {
        anyhow::bail!("Description must not be empty");
    }
    if !input.amount.is_finite() || input.amount <= 0.0 {
        anyhow::bail!("Amount must be a positive number, got {}", input.amount);
    }

    let date = match input.date.as_deref() {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .with_context(|| format!("Invalid date '{}' (expected YYYY-MM-DD)", s))?,
        None => Utc::now().date_naive(),
    };
    let transaction_id = input
        .external_id
        .unwrap_or_else(|| format!("manual-{}", Utc::now().format("%Y%m%d%H%M%S%f")));

    let new_tx = NewTransaction {
        transaction_id: transaction_id.clone(),
        date,
        description: input.description.trim().to_string(),
        amount: input.amount,
        transaction_type: if input.income {
            TransactionType::Income
        } else {
            TransactionType::Expense
        },
        category: input.category,
        payment_method: input.payment_method,
        source: input.source,
    };

    let Some(id) = db.insert_transaction(&new_tx)? else {
        anyhow::bail!("Transaction '{}' already exists", transaction_id);
    };

    println!(
        "✅ Added transaction #{}: {} │ {} │ {}",
        id,
        date,
        format_won(new_tx.amount),
        truncate(&new_tx.description, 40)
    );

    Ok(())
}

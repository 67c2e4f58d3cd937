//! Test utilities for tally-core
//!
//! Transaction fixtures shared by unit tests, the integration suite and the CLI tests.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{Duration, NaiveDate, Utc};

use crate::db::Database;
use crate::models::{NewTransaction, Transaction, TransactionType};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::SeqCst)
}

/// An unsaved expense dated today with a unique external id
pub fn tx(description: &str, amount: f64) -> Transaction {
    tx_on(description, amount, Utc::now().date_naive())
}

/// An unsaved expense on a given date with a unique external id
pub fn tx_on(description: &str, amount: f64, date: NaiveDate) -> Transaction {
    let n = next_id();
    Transaction {
        id: 0,
        transaction_id: format!("fixture-{}", n),
        date,
        description: description.to_string(),
        amount,
        transaction_type: TransactionType::Expense,
        category: None,
        payment_method: None,
        source: "manual".to_string(),
        is_excluded: false,
        created_at: Utc::now(),
    }
}

/// A transaction to insert, dated `days_ago` days before `today`
pub fn new_tx(description: &str, amount: f64, today: NaiveDate, days_ago: i64) -> NewTransaction {
    NewTransaction {
        transaction_id: format!("fixture-{}", next_id()),
        date: today - Duration::days(days_ago),
        description: description.to_string(),
        amount,
        transaction_type: TransactionType::Expense,
        category: None,
        payment_method: None,
        source: "manual".to_string(),
    }
}

/// Insert transactions and return them as stored
pub fn insert_all(db: &Database, transactions: &[NewTransaction]) -> Vec<Transaction> {
    transactions
        .iter()
        .map(|t| {
            let id = db
                .insert_transaction(t)
                .expect("insert transaction")
                .expect("fixture ids are unique");
            db.get_transaction(id)
                .expect("read transaction")
                .expect("inserted transaction exists")
        })
        .collect()
}

//! Recurring transaction detection
//!
//! Groups transactions by merchant and looks for a repeated day interval
//! between consecutive charges.

use std::collections::HashMap;
use std::hash::Hash;

use chrono::{Duration, NaiveDate};
use serde::Serialize;

use super::extract::extract_merchant;
use crate::config::RecurringConfig;
use crate::models::Transaction;

/// A merchant charged at a regular interval
#[derive(Debug, Clone, Serialize)]
pub struct RecurringPattern {
    pub merchant: String,
    pub interval_days: i64,
    pub common_amount: f64,
    pub transaction_count: usize,
    /// Share of intervals equal to `interval_days`
    pub interval_consistency: f64,
    /// Share of transactions charging `common_amount`
    pub amount_consistency: f64,
    pub last_transaction: Transaction,
    pub next_expected_date: NaiveDate,
    pub category: Option<String>,
    pub payment_method: Option<String>,
}

impl RecurringPattern {
    /// Mean of the two consistency scores
    pub fn consistency(&self) -> f64 {
        (self.interval_consistency + self.amount_consistency) / 2.0
    }
}

/// Most frequent item; ties go to the item seen first
fn most_common<T, I>(items: I) -> Option<(T, usize)>
where
    T: Eq + Hash + Clone,
    I: IntoIterator<Item = T>,
{
    let mut counts: HashMap<T, usize> = HashMap::new();
    let mut order: Vec<T> = Vec::new();
    for item in items {
        let count = counts.entry(item.clone()).or_insert(0);
        if *count == 0 {
            order.push(item);
        }
        *count += 1;
    }

    let mut best: Option<(T, usize)> = None;
    for item in order {
        let count = counts[&item];
        if best.as_ref().map_or(true, |(_, c)| count > *c) {
            best = Some((item, count));
        }
    }
    best
}

/// Amounts compared to the cent
fn amount_key(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

/// Detect recurring merchants among `transactions`
///
/// Sorted by [`RecurringPattern::consistency`], highest first.
pub fn detect_recurring(
    transactions: &[Transaction],
    config: &RecurringConfig,
) -> Vec<RecurringPattern> {
    // Group by merchant in first-seen order
    let mut groups: Vec<(&str, Vec<&Transaction>)> = Vec::new();
    for tx in transactions {
        let Some(merchant) = extract_merchant(&tx.description) else {
            continue;
        };
        match groups.iter_mut().find(|(m, _)| *m == merchant) {
            Some((_, group)) => group.push(tx),
            None => groups.push((merchant, vec![tx])),
        }
    }

    let mut patterns = Vec::new();
    for (merchant, mut group) in groups {
        if group.len() < config.min_transactions {
            continue;
        }
        group.sort_by_key(|tx| (tx.date, tx.id));

        let intervals = group
            .windows(2)
            .map(|pair| (pair[1].date - pair[0].date).num_days());
        let Some((interval_days, interval_matches)) = most_common(intervals) else {
            continue;
        };
        if interval_matches < 2 || !(1..=config.max_interval_days).contains(&interval_days) {
            continue;
        }

        let Some((amount_cents, amount_matches)) =
            most_common(group.iter().map(|tx| amount_key(tx.amount)))
        else {
            continue;
        };
        let common_amount = group
            .iter()
            .map(|tx| tx.amount)
            .find(|amount| amount_key(*amount) == amount_cents)
            .unwrap_or(amount_cents as f64 / 100.0);

        let n = group.len();
        let Some(last) = group.last() else {
            continue;
        };

        patterns.push(RecurringPattern {
            merchant: merchant.to_string(),
            interval_days,
            common_amount,
            transaction_count: n,
            interval_consistency: interval_matches as f64 / (n - 1) as f64,
            amount_consistency: amount_matches as f64 / n as f64,
            next_expected_date: last.date + Duration::days(interval_days),
            category: last.category.clone(),
            payment_method: last.payment_method.clone(),
            last_transaction: (*last).clone(),
        });
    }

    patterns.sort_by(|a, b| b.consistency().total_cmp(&a.consistency()));
    patterns
}

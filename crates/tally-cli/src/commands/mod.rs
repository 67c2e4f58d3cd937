//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Init and shared utilities (open_db, load_config)
//! - `transactions` - Transaction commands (list, add)
//! - `rules` - Rule management and classification commands
//! - `learn` - Correction, promotion, pattern and stats commands
//! - `insights` - Recurring charge, pattern change and dynamic filter commands

pub mod core;
pub mod insights;
pub mod learn;
pub mod rules;
pub mod transactions;

// Re-export command functions for main.rs
pub use core::*;
pub use insights::*;
pub use learn::*;
pub use rules::*;
pub use transactions::*;

use anyhow::Result;
use serde::Serialize;
use tally_core::models::{Confidence, PatternStatus, RuleType};

/// Output mode shared by reporting commands
pub struct Output {
    pub json: bool,
}

impl Output {
    /// Print `value` as pretty JSON when in JSON mode
    ///
    /// Returns true if the value was printed.
    pub fn print_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<bool> {
        if !self.json {
            return Ok(false);
        }
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(true)
    }
}

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Format an amount as whole won with thousands separators
pub fn format_won(amount: f64) -> String {
    let digits = (amount.abs().round() as i64).to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    format!("₩{}", grouped)
}

pub fn parse_rule_type(value: &str) -> Result<RuleType> {
    value
        .parse()
        .map_err(|e: String| anyhow::anyhow!("{} (valid types: category, payment_method, filter)", e))
}

/// A single type, or every type when omitted
pub fn rule_types_or_all(value: Option<&str>) -> Result<Vec<RuleType>> {
    match value {
        Some(value) => Ok(vec![parse_rule_type(value)?]),
        None => Ok(RuleType::all().to_vec()),
    }
}

pub fn parse_confidence(value: &str) -> Result<Confidence> {
    value
        .parse()
        .map_err(|e: String| anyhow::anyhow!("{} (valid values: low, medium, high)", e))
}

pub fn parse_status(value: &str) -> Result<PatternStatus> {
    value
        .parse()
        .map_err(|e: String| anyhow::anyhow!("{} (valid values: pending, applied, rejected)", e))
}

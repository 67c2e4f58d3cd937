//! Insight commands over transaction history (recurring, changes, filters)

use anyhow::Result;
use tally_core::config::LearningConfig;
use tally_core::db::Database;
use tally_core::learning::LearningEngine;
use tally_core::rules::RuleEngine;

use super::{format_won, truncate, Output};

pub fn cmd_recurring(
    db: &Database,
    output: &Output,
    config: LearningConfig,
    days: Option<i64>,
) -> Result<()> {
    if let Some(days) = days {
        if days <= 0 {
            anyhow::bail!("--days must be positive, got {}", days);
        }
    }

    let rules = RuleEngine::new(db);
    let engine = LearningEngine::new(db, &rules)
        .with_transactions(db)
        .with_config(config);
    let patterns = engine.detect_recurring_patterns(days)?;

    if output.print_json(&patterns)? {
        return Ok(());
    }

    if patterns.is_empty() {
        println!("No recurring charges detected");
        return Ok(());
    }

    println!();
    println!("🔁 Recurring Charges ({})", patterns.len());
    println!("   ─────────────────────────────────────────────────────────────");
    for pattern in &patterns {
        println!(
            "   {:16} every {:>2} days │ {:>10} │ ×{} │ next {} │ {:.0}%",
            truncate(&pattern.merchant, 16),
            pattern.interval_days,
            format_won(pattern.common_amount),
            pattern.transaction_count,
            pattern.next_expected_date,
            pattern.consistency() * 100.0
        );
    }

    Ok(())
}

pub fn cmd_changes(db: &Database, output: &Output, config: LearningConfig) -> Result<()> {
    let rules = RuleEngine::new(db);
    let engine = LearningEngine::new(db, &rules)
        .with_transactions(db)
        .with_config(config);
    let changes = engine.detect_pattern_changes()?;

    if output.print_json(&changes)? {
        return Ok(());
    }

    if changes.is_empty() {
        println!("No notable spending changes");
        return Ok(());
    }

    println!();
    println!("📈 Spending Changes ({})", changes.len());
    println!("   ─────────────────────────────────────────────────────────────");
    for change in &changes {
        println!(
            "   {:.2} │ {:26} │ {}",
            change.change_score,
            change.kind.as_str(),
            change.description
        );
    }

    Ok(())
}

pub fn cmd_filters(db: &Database, output: &Output, config: LearningConfig) -> Result<()> {
    let rules = RuleEngine::new(db);
    let engine = LearningEngine::new(db, &rules).with_config(config);
    let filters = engine.generate_dynamic_filters()?;

    if output.print_json(&filters)? {
        return Ok(());
    }

    if filters.is_empty() {
        println!("No dynamic filters yet (patterns must be applied and seen often)");
        return Ok(());
    }

    println!();
    println!("🔎 Dynamic Filters ({})", filters.len());
    println!("   ─────────────────────────────────────────────────────────────");
    for filter in &filters {
        let values: Vec<&str> = filter
            .conditions
            .iter()
            .flat_map(|c| c.values.iter().map(String::as_str))
            .collect();
        println!("   {} │ {}", filter.name, filter.description);
        println!("      description contains any of: {}", values.join(", "));
    }

    Ok(())
}

//! Correction learning commands (correct, promote, patterns, stats)

use anyhow::Result;
use tally_core::config::LearningConfig;
use tally_core::db::{parse_excluded_flag, Database};
use tally_core::learning::LearningEngine;
use tally_core::models::{Confidence, PatternStatus, RuleType, Transaction};
use tally_core::rules::RuleEngine;
use tally_core::store::{PatternFilter, PatternStore};

use super::{parse_confidence, parse_status, rule_types_or_all, truncate, Output};

fn current_value(tx: &Transaction, field: RuleType) -> Option<String> {
    match field {
        RuleType::Category => tx.category.clone(),
        RuleType::PaymentMethod => tx.payment_method.clone(),
        RuleType::Filter => Some(tx.is_excluded.to_string()),
    }
}

pub fn cmd_correct(
    db: &Database,
    config: LearningConfig,
    id: i64,
    field: &str,
    value: &str,
) -> Result<()> {
    let Some(tx) = db.get_transaction(id)? else {
        anyhow::bail!("Transaction #{} not found", id);
    };
    let Some(field_type) = RuleType::from_field_name(field) else {
        anyhow::bail!(
            "Cannot learn from field '{}' (valid fields: category, payment_method, is_excluded)",
            field
        );
    };

    let corrected = match field_type {
        RuleType::Filter => parse_excluded_flag(value)?.to_string(),
        _ => value.trim().to_string(),
    };
    if corrected.is_empty() {
        anyhow::bail!("Corrected value must not be empty");
    }

    let previous = current_value(&tx, field_type);
    if previous.as_deref() == Some(corrected.as_str()) {
        println!("ℹ️  Transaction #{} already has {} = {}", id, field, corrected);
        return Ok(());
    }

    db.update_transaction_field(id, field_type, &corrected)?;

    let rules = RuleEngine::new(db);
    let engine = LearningEngine::new(db, &rules)
        .with_transactions(db)
        .with_config(config);
    let learned = engine.learn_from_correction(&tx, field, previous.as_deref(), &corrected)?;

    println!(
        "✅ Transaction #{}: {} {} → {}",
        id,
        field,
        previous.as_deref().unwrap_or("-"),
        corrected
    );

    if learned {
        let counters = engine.counters();
        println!(
            "   🧠 Learned {} patterns, generated {} rules",
            counters.patterns_extracted, counters.rules_generated
        );
    } else {
        println!("   Nothing to learn from \"{}\"", truncate(&tx.description, 40));
    }

    Ok(())
}

pub fn cmd_promote(
    db: &Database,
    config: LearningConfig,
    pattern_type: Option<&str>,
    min_confidence: Option<&str>,
) -> Result<()> {
    let types = rule_types_or_all(pattern_type)?;
    let min_confidence: Option<Confidence> = min_confidence.map(parse_confidence).transpose()?;

    let rules = RuleEngine::new(db);
    let engine = LearningEngine::new(db, &rules).with_config(config);

    let mut total = 0;
    for pattern_type in types {
        let created = engine.apply_patterns_to_rules(pattern_type, min_confidence)?;
        if created > 0 {
            println!("   {:14} {} rules", pattern_type.as_str(), created);
        }
        total += created;
    }

    if total == 0 {
        println!("No patterns ready for promotion");
    } else {
        println!("✅ Promoted {} patterns into rules", total);
    }
    Ok(())
}

pub fn cmd_patterns(
    db: &Database,
    output: &Output,
    pattern_type: Option<&str>,
    status: Option<&str>,
    limit: usize,
) -> Result<()> {
    let mut filter = PatternFilter::new().limit(limit.max(1));
    if let Some(value) = pattern_type {
        filter = filter.pattern_type(super::parse_rule_type(value)?);
    }
    if let Some(value) = status {
        let status: PatternStatus = parse_status(value)?;
        filter = filter.status(status);
    }
    let patterns = db.list_patterns(&filter)?;

    if output.print_json(&patterns)? {
        return Ok(());
    }

    if patterns.is_empty() {
        println!("No learned patterns yet. Correct a transaction with: tally correct <id> category <value>");
        return Ok(());
    }

    println!();
    println!("🧠 Learned Patterns ({})", patterns.len());
    println!("   ─────────────────────────────────────────────────────────────");
    for pattern in &patterns {
        println!(
            "   [{:>3}] {:14} {:6} ×{:<3} {:8} │ {}",
            pattern.id,
            pattern.pattern_type.as_str(),
            pattern.confidence.as_str(),
            pattern.occurrence_count,
            pattern.status.as_str(),
            truncate(&pattern.pattern_name, 40)
        );
    }

    Ok(())
}

pub fn cmd_stats(db: &Database, output: &Output, config: LearningConfig) -> Result<()> {
    let rules = RuleEngine::new(db);
    let engine = LearningEngine::new(db, &rules)
        .with_transactions(db)
        .with_config(config);
    let stats = engine.get_learning_stats()?;

    if output.print_json(&stats)? {
        return Ok(());
    }

    println!();
    println!("📊 Learning Statistics");
    println!("   ─────────────────────────────────────────────────────────────");
    println!(
        "   Transactions: {}   Rules: {}   Patterns: {}",
        db.count_transactions()?,
        db.count_rules()?,
        db.count_patterns()?
    );

    for (pattern_type, pattern_stats) in &stats.patterns {
        if pattern_stats.total == 0 {
            continue;
        }
        let by_status: Vec<String> = pattern_stats
            .by_status
            .iter()
            .map(|(status, count)| format!("{} {}", status, count))
            .collect();
        let by_confidence: Vec<String> = pattern_stats
            .by_confidence
            .iter()
            .map(|(confidence, count)| format!("{} {}", confidence, count))
            .collect();
        println!();
        println!("   {} ({} patterns)", pattern_type, pattern_stats.total);
        println!("      status:     {}", by_status.join(", "));
        println!("      confidence: {}", by_confidence.join(", "));
        for pattern in &pattern_stats.recent {
            println!(
                "      · {} (×{}, {})",
                truncate(&pattern.pattern_name, 30),
                pattern.occurrence_count,
                pattern.last_seen.format("%Y-%m-%d")
            );
        }
    }

    if let Some(changes) = &stats.pattern_changes {
        println!();
        println!(
            "   Spending changes: {} detected, {} significant",
            changes.total, changes.significant_changes
        );
        for change in &changes.top_changes {
            println!("      · {}", change.description);
        }
    }

    Ok(())
}

//! Rule management and classification commands

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use tally_core::db::Database;
use tally_core::models::{ConditionType, NewRule, RuleType, Transaction, TransactionType};
use tally_core::rules::{parse_amount_range, RuleEngine};
use tally_core::store::{RuleFilter, RuleStore, TransactionQuery, TransactionStore};
use tally_core::Error;
use tracing::warn;

use super::{parse_rule_type, rule_types_or_all, truncate, Output};

pub fn cmd_rules_list(
    db: &Database,
    output: &Output,
    rule_type: Option<&str>,
    include_inactive: bool,
) -> Result<()> {
    let mut filter = RuleFilter::new();
    if let Some(value) = rule_type {
        filter = filter.rule_type(parse_rule_type(value)?);
    }
    if !include_inactive {
        filter = filter.active(true);
    }
    let rules = db.list_rules(&filter)?;

    if output.print_json(&rules)? {
        return Ok(());
    }

    if rules.is_empty() {
        println!("No rules found. Seed the defaults with: tally init");
        return Ok(());
    }

    println!();
    println!("📏 Classification Rules ({})", rules.len());
    println!("   ─────────────────────────────────────────────────────────────");

    for rule in &rules {
        let state = if rule.active { "" } else { " (disabled)" };
        println!(
            "   [{:>3}] {:14} {:>4} │ {:12} {:16} → {} ({}){}",
            rule.id,
            rule.rule_type.as_str(),
            rule.priority,
            rule.condition_type.as_str(),
            truncate(&rule.condition_value, 16),
            rule.target_value,
            rule.created_by,
            state
        );
    }

    Ok(())
}

pub fn cmd_rules_add(
    db: &Database,
    rule_type: &str,
    condition_type: &str,
    condition: &str,
    target: &str,
    priority: i32,
    name: Option<&str>,
) -> Result<()> {
    let rule_type = parse_rule_type(rule_type)?;
    let condition_type: ConditionType = condition_type.parse().map_err(|e: String| {
        anyhow::anyhow!("{} (valid types: contains, equals, regex, amount_range)", e)
    })?;

    let condition = condition.trim();
    let target = target.trim();
    if condition.is_empty() || target.is_empty() {
        anyhow::bail!("Condition and target must not be empty");
    }

    match condition_type {
        ConditionType::AmountRange if parse_amount_range(condition).is_none() => {
            anyhow::bail!("Invalid amount range '{}' (expected min:max)", condition);
        }
        ConditionType::Regex => {
            if let Err(e) = regex::Regex::new(condition) {
                anyhow::bail!("Invalid regex '{}': {}", condition, e);
            }
        }
        _ => {}
    }

    let name = name
        .map(str::to_string)
        .unwrap_or_else(|| format!("{}-{}", target, condition));

    let engine = RuleEngine::new(db);
    let rule = NewRule::new(name, rule_type, condition_type, condition, target).priority(priority);
    match engine.add_rule(rule) {
        Ok(created) => {
            println!("✅ Added rule #{}: {}", created.id, created);
            Ok(())
        }
        Err(Error::DuplicateRule(key)) => {
            anyhow::bail!("An identical rule already exists: {}", key)
        }
        Err(e) => Err(e.into()),
    }
}

pub fn cmd_rules_delete(db: &Database, id: i64) -> Result<()> {
    let engine = RuleEngine::new(db);
    if !engine.delete_rule(id)? {
        anyhow::bail!("Rule #{} not found", id);
    }
    println!("🗑️  Deleted rule #{}", id);
    Ok(())
}

pub fn cmd_rules_priority(db: &Database, id: i64, priority: i32) -> Result<()> {
    let engine = RuleEngine::new(db);
    if !engine.update_rule_priority(id, priority)? {
        anyhow::bail!("Rule #{} not found", id);
    }
    println!("✅ Rule #{} priority set to {}", id, priority);
    Ok(())
}

pub fn cmd_rules_set_active(db: &Database, id: i64, active: bool) -> Result<()> {
    let engine = RuleEngine::new(db);
    if !engine.set_rule_active(id, active)? {
        anyhow::bail!("Rule #{} not found", id);
    }
    let state = if active { "enabled" } else { "disabled" };
    println!("✅ Rule #{} {}", id, state);
    Ok(())
}

/// Ad-hoc transaction for `rules test`
fn probe_transaction(description: &str, amount: f64) -> Transaction {
    let now = Utc::now();
    Transaction {
        id: 0,
        transaction_id: "probe".to_string(),
        date: now.date_naive(),
        description: description.to_string(),
        amount,
        transaction_type: TransactionType::Expense,
        category: None,
        payment_method: None,
        source: "manual".to_string(),
        is_excluded: false,
        created_at: now,
    }
}

pub fn cmd_rules_test(
    db: &Database,
    output: &Output,
    rule_type: &str,
    description: &str,
    amount: f64,
) -> Result<()> {
    let rule_type = parse_rule_type(rule_type)?;
    let engine = RuleEngine::new(db);
    let tx = probe_transaction(description, amount);

    let matches = engine.matching_rules(&tx, rule_type)?;
    if output.print_json(&matches)? {
        return Ok(());
    }

    println!();
    println!("🧪 \"{}\" ({})", description, rule_type);
    println!("   ─────────────────────────────────────────────────────────────");

    match matches.split_first() {
        None => println!("   No rule matches"),
        Some((winner, rest)) => {
            println!("   ✅ {} (priority {})", winner, winner.priority);
            for rule in rest {
                println!("      {} (priority {}, shadowed)", rule, rule.priority);
            }
        }
    }

    Ok(())
}

pub fn cmd_rules_conflicts(db: &Database, output: &Output, rule_type: &str) -> Result<()> {
    let rule_type = parse_rule_type(rule_type)?;
    let engine = RuleEngine::new(db);
    let conflicts = engine.resolve_conflicts(rule_type)?;

    if output.print_json(&conflicts)? {
        return Ok(());
    }

    if conflicts.is_empty() {
        println!("✅ No conflicting {} rules", rule_type);
        return Ok(());
    }

    println!();
    println!("⚠️  Conflicting {} rules ({})", rule_type, conflicts.len());
    println!("   ─────────────────────────────────────────────────────────────");
    for conflict in &conflicts {
        println!(
            "   {}({}): #{} → {} (priority {}) wins over #{} → {} (priority {})",
            conflict.higher.condition_type,
            conflict.higher.condition_value,
            conflict.higher.id,
            conflict.higher.target_value,
            conflict.higher.priority,
            conflict.lower.id,
            conflict.lower.target_value,
            conflict.lower.priority
        );
    }

    Ok(())
}

pub fn cmd_rules_stats(db: &Database, output: &Output, rule_type: &str) -> Result<()> {
    let rule_type = parse_rule_type(rule_type)?;
    let engine = RuleEngine::new(db);
    let stats = engine.get_rule_stats(rule_type)?;

    if output.print_json(&stats)? {
        return Ok(());
    }

    println!();
    println!("📊 Active {} rules: {}", rule_type, stats.total_rules);
    println!("   ─────────────────────────────────────────────────────────────");
    println!(
        "   Priority range: {} ~ {}",
        stats.priority_range.0, stats.priority_range.1
    );

    println!("   By condition:");
    for (condition, count) in &stats.condition_counts {
        println!("      {:14} {:>4}", condition.as_str(), count);
    }
    println!("   By creator:");
    for (creator, count) in &stats.creator_counts {
        println!("      {:14} {:>4}", creator.as_str(), count);
    }
    println!("   By target:");
    for (target, count) in &stats.target_counts {
        println!("      {:14} {:>4}", target, count);
    }

    Ok(())
}

/// One classification result
#[derive(Debug, Serialize)]
struct Classification {
    id: i64,
    transaction_id: String,
    description: String,
    rule_type: RuleType,
    value: String,
}

pub fn cmd_classify(
    db: &Database,
    output: &Output,
    rule_type: Option<&str>,
    limit: usize,
    apply: bool,
) -> Result<()> {
    let rule_types = rule_types_or_all(rule_type)?;
    let transactions = db.list_transactions(&TransactionQuery::new().limit(limit.max(1)))?;
    let engine = RuleEngine::new(db);

    let mut results = Vec::new();
    for rule_type in rule_types {
        let matched = engine.apply_rules_batch(&transactions, rule_type)?;
        // Keep the listing order stable (newest first)
        for tx in &transactions {
            if let Some(value) = matched.get(&tx.transaction_id) {
                results.push(Classification {
                    id: tx.id,
                    transaction_id: tx.transaction_id.clone(),
                    description: tx.description.clone(),
                    rule_type,
                    value: value.clone(),
                });
            }
        }
    }

    let mut applied = 0;
    if apply {
        for result in &results {
            match db.update_transaction_field(result.id, result.rule_type, &result.value) {
                Ok(true) => applied += 1,
                Ok(false) => {}
                Err(e) => warn!(id = result.id, error = %e, "Could not apply classification"),
            }
        }
    }

    if output.print_json(&results)? {
        return Ok(());
    }

    println!();
    println!(
        "🏷️  Classified {} of {} transactions",
        results.len(),
        transactions.len()
    );
    println!("   ─────────────────────────────────────────────────────────────");
    for result in &results {
        println!(
            "   [{}] {:14} {:12} │ {}",
            result.id,
            result.rule_type.as_str(),
            truncate(&result.value, 12),
            truncate(&result.description, 40)
        );
    }

    if apply {
        println!();
        println!("✅ Applied {} classifications", applied);
    } else if !results.is_empty() {
        println!();
        println!("   Run with --apply to save these results");
    }

    Ok(())
}

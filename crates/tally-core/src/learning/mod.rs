//! Learning engine: turns user corrections into classification rules
//!
//! A correction is broken into candidate patterns (merchant, keywords, and
//! keywords shared with similar past transactions). Patterns accumulate
//! occurrences and confidence in the pattern store; confident ones are
//! promoted into `contains` rules through the [`RuleEngine`].
//!
//! The engine also reads the transaction store (when attached) to find
//! recurring charges and drift in spending behavior.

mod drift;
mod extract;
mod filters;
mod promotion;
mod recurring;

pub use drift::{ChangeDirection, ChangeKind, PatternChange};
pub use extract::{common_keywords, extract_keywords, extract_merchant, similarity};
pub use filters::{DynamicFilter, FilterCondition, FilterOperator};
pub use promotion::{promotion_priority, rule_name, AUTO_RULE_PREFIX, LEARNED_RULE_PREFIX};
pub use recurring::RecurringPattern;

use std::cell::Cell;
use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::LearningConfig;
use crate::error::Result;
use crate::models::{
    ConditionType, Confidence, LearningPattern, NewLearningPattern, NewRule, PatternMetadata,
    PatternSource, PatternStatus, PatternType, RuleCreator, RuleType, Transaction,
};
use crate::rules::RuleEngine;
use crate::store::{
    PatternFilter, PatternStats, PatternStore, SortOrder, TransactionQuery, TransactionStore,
};

/// Session counters, reset with [`LearningEngine::reset_stats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LearningCounters {
    pub patterns_extracted: u64,
    pub patterns_applied: u64,
    pub rules_generated: u64,
    pub corrections_processed: u64,
}

/// One user correction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Correction {
    pub transaction: Transaction,
    pub field_name: String,
    pub previous_value: Option<String>,
    pub corrected_value: String,
}

/// Outcome of [`LearningEngine::learn_from_corrections_batch`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchLearningResult {
    pub total: usize,
    pub success: usize,
    pub failure: usize,
    pub patterns_extracted: u64,
    pub rules_generated: u64,
}

/// Summary of detected pattern changes
#[derive(Debug, Clone, Serialize)]
pub struct ChangeSummary {
    pub total: usize,
    /// Changes scoring above the change threshold
    pub significant_changes: usize,
    pub top_changes: Vec<PatternChange>,
}

/// Counters plus per-type pattern breakdown
#[derive(Debug, Clone, Serialize)]
pub struct LearningStats {
    #[serde(flatten)]
    pub counters: LearningCounters,
    pub patterns: BTreeMap<PatternType, PatternStats>,
    /// Only present when a transaction store is attached
    pub pattern_changes: Option<ChangeSummary>,
}

/// Learns from corrections and promotes patterns into rules
pub struct LearningEngine<'a> {
    patterns: &'a dyn PatternStore,
    rules: &'a RuleEngine<'a>,
    transactions: Option<&'a dyn TransactionStore>,
    config: LearningConfig,
    counters: Cell<LearningCounters>,
    clock: Option<DateTime<Utc>>,
}

impl<'a> LearningEngine<'a> {
    /// Engine without a transaction store; learning falls back to one rule per correction
    pub fn new(patterns: &'a dyn PatternStore, rules: &'a RuleEngine<'a>) -> Self {
        Self {
            patterns,
            rules,
            transactions: None,
            config: LearningConfig::default(),
            counters: Cell::new(LearningCounters::default()),
            clock: None,
        }
    }

    /// Attach a transaction store for similarity search and detection
    pub fn with_transactions(mut self, transactions: &'a dyn TransactionStore) -> Self {
        self.transactions = Some(transactions);
        self
    }

    pub fn with_config(mut self, config: LearningConfig) -> Self {
        self.config = config;
        self
    }

    /// Pin "now" for window and recency computations
    pub fn as_of(mut self, now: DateTime<Utc>) -> Self {
        self.clock = Some(now);
        self
    }

    pub fn config(&self) -> &LearningConfig {
        &self.config
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.unwrap_or_else(Utc::now)
    }

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    fn bump(&self, update: impl FnOnce(&mut LearningCounters)) {
        let mut counters = self.counters.get();
        update(&mut counters);
        self.counters.set(counters);
    }

    // ========== Learning ==========

    /// Learn from one correction
    ///
    /// Returns `Ok(false)` when nothing can be learned (blank correction,
    /// unsupported field, or a description without keywords).
    pub fn learn_from_correction(
        &self,
        tx: &Transaction,
        field_name: &str,
        previous_value: Option<&str>,
        corrected_value: &str,
    ) -> Result<bool> {
        let corrected = corrected_value.trim();
        if field_name.trim().is_empty() || corrected.is_empty() {
            warn!(transaction_id = %tx.transaction_id, "Correction is missing a field or value");
            return Ok(false);
        }

        self.bump(|c| c.corrections_processed += 1);

        let Some(pattern_type) = RuleType::from_field_name(field_name) else {
            warn!(field = field_name, "Unsupported correction field");
            return Ok(false);
        };

        let keywords = extract_keywords(&tx.description, &self.config.extraction);
        if keywords.is_empty() {
            warn!(description = %tx.description, "No keywords in description");
            return Ok(false);
        }
        let merchant = extract_merchant(&tx.description);

        let similar = self.find_similar(tx, merchant, &keywords)?;
        let candidates =
            self.build_candidates(tx, pattern_type, merchant, &keywords, &similar, corrected);

        for candidate in &candidates {
            self.patterns.upsert_pattern(candidate)?;
            self.bump(|c| c.patterns_extracted += 1);
        }

        self.auto_promote(pattern_type)?;

        if self.transactions.is_none() {
            self.create_fallback_rule(pattern_type, &keywords, corrected)?;
        }

        info!(
            field = %pattern_type,
            previous = previous_value.unwrap_or(""),
            corrected,
            patterns = candidates.len(),
            similar = similar.len(),
            "Learned from correction"
        );
        Ok(true)
    }

    /// Learn from several corrections; counts are deltas over this call
    pub fn learn_from_corrections_batch(
        &self,
        corrections: &[Correction],
    ) -> Result<BatchLearningResult> {
        let before = self.counters.get();
        let mut result = BatchLearningResult {
            total: corrections.len(),
            ..Default::default()
        };

        for correction in corrections {
            let learned = self.learn_from_correction(
                &correction.transaction,
                &correction.field_name,
                correction.previous_value.as_deref(),
                &correction.corrected_value,
            )?;
            if learned {
                result.success += 1;
            } else {
                result.failure += 1;
            }
        }

        let after = self.counters.get();
        result.patterns_extracted = after.patterns_extracted - before.patterns_extracted;
        result.rules_generated = after.rules_generated - before.rules_generated;

        info!(
            total = result.total,
            success = result.success,
            failure = result.failure,
            "Batch learning complete"
        );
        Ok(result)
    }

    /// Similar transactions from the store, best first
    fn find_similar(
        &self,
        tx: &Transaction,
        merchant: Option<&str>,
        keywords: &[String],
    ) -> Result<Vec<Transaction>> {
        let Some(store) = self.transactions else {
            return Ok(Vec::new());
        };

        let mut terms: Vec<String> = merchant.map(str::to_string).into_iter().collect();
        for keyword in keywords {
            if !terms.contains(keyword) {
                terms.push(keyword.clone());
            }
        }

        let query = TransactionQuery::new()
            .contains_any(terms)
            .limit(self.config.similarity.candidate_limit);
        let candidates = store.list_transactions(&query)?;

        let mut scored: Vec<(f64, Transaction)> = candidates
            .into_iter()
            .filter(|c| !is_same_transaction(c, tx))
            .map(|c| (similarity(tx, &c, &self.config.extraction), c))
            .filter(|(score, _)| *score >= self.config.similarity.threshold)
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.truncate(self.config.similarity.max_similar);

        debug!(count = scored.len(), "Found similar transactions");
        Ok(scored.into_iter().map(|(_, c)| c).collect())
    }

    /// Candidate patterns for one correction, one per uniqueness key
    fn build_candidates(
        &self,
        tx: &Transaction,
        pattern_type: PatternType,
        merchant: Option<&str>,
        keywords: &[String],
        similar: &[Transaction],
        value: &str,
    ) -> Vec<NewLearningPattern> {
        let now = self.now();
        let metadata = PatternMetadata {
            source_transaction_id: Some(tx.transaction_id.clone()),
            source_description: Some(tx.description.clone()),
            ..Default::default()
        };

        let mut candidates: Vec<NewLearningPattern> = Vec::new();
        if let Some(merchant) = merchant {
            candidates.push(
                NewLearningPattern::new(PatternSource::Merchant, pattern_type, merchant, value, now)
                    .with_metadata(metadata.clone()),
            );
        }
        for keyword in keywords {
            candidates.push(
                NewLearningPattern::new(PatternSource::Keyword, pattern_type, keyword, value, now)
                    .with_metadata(metadata.clone()),
            );
        }

        if !similar.is_empty() {
            let similar_keywords: Vec<Vec<String>> = similar
                .iter()
                .map(|s| extract_keywords(&s.description, &self.config.extraction))
                .collect();
            let common_metadata = PatternMetadata {
                similar_count: Some(similar.len()),
                ..metadata.clone()
            };
            for keyword in common_keywords(keywords, &similar_keywords) {
                candidates.push(
                    NewLearningPattern::new(PatternSource::Common, pattern_type, &keyword, value, now)
                        .with_metadata(common_metadata.clone()),
                );
            }
        }

        // Merge candidates sharing a key, keeping the most confident
        let mut merged: Vec<NewLearningPattern> = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            match merged.iter().position(|m| m.key() == candidate.key()) {
                Some(idx) if candidate.confidence > merged[idx].confidence => merged[idx] = candidate,
                Some(_) => {}
                None => merged.push(candidate),
            }
        }
        merged
    }

    /// Single rule from the longest keyword (used without a transaction store)
    fn create_fallback_rule(
        &self,
        rule_type: RuleType,
        keywords: &[String],
        value: &str,
    ) -> Result<bool> {
        let mut longest: Option<&String> = None;
        for keyword in keywords {
            if longest.map_or(true, |l| keyword.chars().count() > l.chars().count()) {
                longest = Some(keyword);
            }
        }
        let Some(keyword) = longest else {
            return Ok(false);
        };

        let rule = NewRule::new(
            rule_name(LEARNED_RULE_PREFIX, value, keyword),
            rule_type,
            ConditionType::Contains,
            keyword.clone(),
            value,
        )
        .priority(self.config.promotion.fallback_priority)
        .created_by(RuleCreator::Learned);

        if self.rules.rule_exists(&rule)? {
            debug!(keyword = %keyword, "Fallback rule already exists");
            return Ok(false);
        }

        self.rules.add_rule(rule)?;
        self.bump(|c| c.rules_generated += 1);
        Ok(true)
    }

    // ========== Promotion ==========

    /// Promote pending high-confidence patterns seen often enough
    fn auto_promote(&self, pattern_type: PatternType) -> Result<usize> {
        let filter = PatternFilter::new()
            .pattern_type(pattern_type)
            .status(PatternStatus::Pending)
            .confidence(Confidence::High)
            .min_occurrence(self.config.promotion.auto_promote_min_occurrences);
        let patterns = self.patterns.list_patterns(&filter)?;
        if patterns.is_empty() {
            return Ok(0);
        }
        self.promote(patterns, AUTO_RULE_PREFIX)
    }

    /// Promote pending patterns of a type into rules
    ///
    /// Patterns need at least two occurrences and at least `min_confidence`
    /// (configured default: medium). Patterns whose rule already exists are
    /// skipped. Returns the number of rules created.
    pub fn apply_patterns_to_rules(
        &self,
        pattern_type: PatternType,
        min_confidence: Option<Confidence>,
    ) -> Result<usize> {
        let min_confidence =
            min_confidence.unwrap_or(self.config.promotion.default_min_confidence);

        let filter = PatternFilter::new()
            .pattern_type(pattern_type)
            .status(PatternStatus::Pending)
            .min_occurrence(self.config.promotion.min_occurrences);
        let patterns: Vec<LearningPattern> = self
            .patterns
            .list_patterns(&filter)?
            .into_iter()
            .filter(|p| p.confidence.rank() >= min_confidence.rank())
            .collect();

        let created = self.promote(patterns, LEARNED_RULE_PREFIX)?;
        info!(pattern_type = %pattern_type, created, "Applied patterns to rules");
        Ok(created)
    }

    fn promote(&self, patterns: Vec<LearningPattern>, prefix: &str) -> Result<usize> {
        let now = self.now();
        let mut ranked: Vec<(i32, LearningPattern)> = patterns
            .into_iter()
            .map(|p| (promotion_priority(&p, now, &self.config.promotion), p))
            .collect();
        ranked.sort_by(|a, b| b.0.cmp(&a.0));

        let mut created = 0;
        for (priority, pattern) in ranked {
            let rule = promotion::rule_from_pattern(&pattern, prefix, priority);
            if self.rules.rule_exists(&rule)? {
                debug!(pattern = %pattern.pattern_name, "Rule already exists, skipping");
                continue;
            }

            let rule = self.rules.add_rule(rule)?;
            self.patterns
                .update_pattern_status(pattern.id, PatternStatus::Applied)?;
            self.bump(|c| {
                c.rules_generated += 1;
                c.patterns_applied += 1;
            });
            created += 1;

            info!(
                pattern = %pattern.pattern_name,
                rule_id = rule.id,
                priority,
                "Promoted pattern to rule"
            );
        }
        Ok(created)
    }

    // ========== Detection ==========

    /// Merchants charged at a regular interval within the last `days` days
    /// (configured default: 90)
    pub fn detect_recurring_patterns(&self, days: Option<i64>) -> Result<Vec<RecurringPattern>> {
        let Some(store) = self.transactions else {
            warn!("Recurring detection needs a transaction store");
            return Ok(Vec::new());
        };

        let days = days.unwrap_or(self.config.recurring.default_window_days);
        let query = TransactionQuery::last_days(self.today(), days).order(SortOrder::DateAsc);
        let transactions = store.list_transactions(&query)?;

        let patterns = recurring::detect_recurring(&transactions, &self.config.recurring);
        info!(days, found = patterns.len(), "Detected recurring patterns");
        Ok(patterns)
    }

    /// Changes between the recent window and the one before it
    pub fn detect_pattern_changes(&self) -> Result<Vec<PatternChange>> {
        let Some(store) = self.transactions else {
            warn!("Pattern change detection needs a transaction store");
            return Ok(Vec::new());
        };

        let today = self.today();
        let window = &self.config.changes;
        let recent = store.list_transactions(
            &TransactionQuery::last_days(today, window.recent_days).order(SortOrder::DateAsc),
        )?;
        let previous = store.list_transactions(
            &TransactionQuery::days_ago(today, window.recent_days + 1, window.previous_days)
                .order(SortOrder::DateAsc),
        )?;

        let changes = drift::detect_changes(&recent, &previous, window);
        info!(
            recent = recent.len(),
            previous = previous.len(),
            found = changes.len(),
            "Detected pattern changes"
        );
        Ok(changes)
    }

    /// Filters built from applied, frequently seen patterns
    pub fn generate_dynamic_filters(&self) -> Result<Vec<DynamicFilter>> {
        let mut all = Vec::new();
        for pattern_type in RuleType::all() {
            let filter = PatternFilter::new()
                .pattern_type(*pattern_type)
                .status(PatternStatus::Applied)
                .min_occurrence(self.config.filters.min_occurrences);
            let patterns = self.patterns.list_patterns(&filter)?;
            all.extend(filters::build_filters(
                *pattern_type,
                &patterns,
                &self.config.filters,
            ));
        }

        info!(count = all.len(), "Generated dynamic filters");
        Ok(all)
    }

    // ========== Stats ==========

    pub fn counters(&self) -> LearningCounters {
        self.counters.get()
    }

    pub fn reset_stats(&self) {
        self.counters.set(LearningCounters::default());
    }

    pub fn get_learning_stats(&self) -> Result<LearningStats> {
        let mut patterns = BTreeMap::new();
        for pattern_type in RuleType::all() {
            patterns.insert(
                *pattern_type,
                self.patterns.get_pattern_stats(Some(*pattern_type))?,
            );
        }

        let pattern_changes = if self.transactions.is_some() {
            let changes = self.detect_pattern_changes()?;
            let threshold = self.config.changes.threshold;
            Some(ChangeSummary {
                total: changes.len(),
                significant_changes: changes
                    .iter()
                    .filter(|c| c.change_score > threshold)
                    .count(),
                top_changes: changes.into_iter().take(3).collect(),
            })
        } else {
            None
        };

        Ok(LearningStats {
            counters: self.counters.get(),
            patterns,
            pattern_changes,
        })
    }
}

fn is_same_transaction(a: &Transaction, b: &Transaction) -> bool {
    (a.id != 0 && a.id == b.id) || a.transaction_id == b.transaction_id
}

#[cfg(test)]
mod tests;

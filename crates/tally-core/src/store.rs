//! Store contracts consumed by the engines
//!
//! The rule and learning engines never talk to SQLite directly; they go
//! through these traits. [`crate::db::Database`] implements all three.
//!
//! Query parameters are explicit structs with enumerated optional fields.
//! Each has a `validate()` that the store calls before building SQL.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::models::{
    Confidence, ConditionType, LearningPattern, NewLearningPattern, NewRule, PatternStatus,
    PatternType, Rule, RuleCreator, RuleType, Transaction,
};

/// Persistence of classification rules
pub trait RuleStore {
    fn create_rule(&self, rule: &NewRule) -> Result<Rule>;

    fn get_rule(&self, id: i64) -> Result<Option<Rule>>;

    /// Overwrite every mutable field of the rule with the given id.
    /// Returns false if no such rule exists.
    fn update_rule(&self, rule: &Rule) -> Result<bool>;

    fn delete_rule(&self, id: i64) -> Result<bool>;

    fn list_rules(&self, filter: &RuleFilter) -> Result<Vec<Rule>>;

    /// Active rules of one type, `priority DESC` then insertion order
    fn get_active_rules_by_type(&self, rule_type: RuleType) -> Result<Vec<Rule>>;
}

/// Persistence of learning patterns
pub trait PatternStore {
    /// Insert, or on a `(pattern_type, pattern_key, pattern_value)` collision
    /// count one more occurrence, refresh `last_seen` and escalate confidence.
    fn upsert_pattern(&self, pattern: &NewLearningPattern) -> Result<LearningPattern>;

    fn update_pattern(&self, pattern: &LearningPattern) -> Result<bool>;

    fn get_pattern(&self, id: i64) -> Result<Option<LearningPattern>>;

    fn find_pattern(
        &self,
        pattern_type: PatternType,
        key: &str,
        value: &str,
    ) -> Result<Option<LearningPattern>>;

    /// Ordered by `occurrence_count DESC, last_seen DESC`
    fn list_patterns(&self, filter: &PatternFilter) -> Result<Vec<LearningPattern>>;

    fn get_pattern_stats(&self, pattern_type: Option<PatternType>) -> Result<PatternStats>;

    fn update_pattern_status(&self, id: i64, status: PatternStatus) -> Result<bool>;
}

/// Read access to transactions (optional for the learning engine)
pub trait TransactionStore {
    fn list_transactions(&self, query: &TransactionQuery) -> Result<Vec<Transaction>>;
}

// ========== Rule Filter ==========

/// Rule list filter
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleFilter {
    pub rule_type: Option<RuleType>,
    pub active: Option<bool>,
    pub created_by: Option<RuleCreator>,
    pub min_priority: Option<i32>,
    pub max_priority: Option<i32>,
    pub condition_type: Option<ConditionType>,
    pub condition_value: Option<String>,
    pub target_value: Option<String>,
}

impl RuleFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rule_type(mut self, rule_type: RuleType) -> Self {
        self.rule_type = Some(rule_type);
        self
    }

    pub fn active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    pub fn created_by(mut self, created_by: RuleCreator) -> Self {
        self.created_by = Some(created_by);
        self
    }

    pub fn priority_between(mut self, min: Option<i32>, max: Option<i32>) -> Self {
        self.min_priority = min;
        self.max_priority = max;
        self
    }

    /// Restrict to rules with the same duplicate key as `rule`
    pub fn same_key_as(rule: &NewRule) -> Self {
        Self {
            rule_type: Some(rule.rule_type),
            condition_type: Some(rule.condition_type),
            condition_value: Some(rule.condition_value.clone()),
            target_value: Some(rule.target_value.clone()),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if let (Some(min), Some(max)) = (self.min_priority, self.max_priority) {
            if min > max {
                return Err(Error::InvalidData(format!(
                    "min_priority ({}) exceeds max_priority ({})",
                    min, max
                )));
            }
        }
        Ok(())
    }
}

// ========== Pattern Filter ==========

/// Pattern list filter
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatternFilter {
    pub pattern_type: Option<PatternType>,
    pub status: Option<PatternStatus>,
    pub confidence: Option<Confidence>,
    pub min_occurrence: Option<i64>,
    /// Substring of `pattern_key`
    pub key_contains: Option<String>,
    pub limit: Option<usize>,
}

impl PatternFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pattern_type(mut self, pattern_type: PatternType) -> Self {
        self.pattern_type = Some(pattern_type);
        self
    }

    pub fn status(mut self, status: PatternStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn confidence(mut self, confidence: Confidence) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn min_occurrence(mut self, count: i64) -> Self {
        self.min_occurrence = Some(count);
        self
    }

    pub fn key_contains(mut self, fragment: impl Into<String>) -> Self {
        self.key_contains = Some(fragment.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if matches!(self.min_occurrence, Some(n) if n < 1) {
            return Err(Error::InvalidData(
                "min_occurrence must be at least 1".to_string(),
            ));
        }
        if self.limit == Some(0) {
            return Err(Error::InvalidData("limit must be positive".to_string()));
        }
        Ok(())
    }
}

/// Pattern counts for one type (or all types)
#[derive(Debug, Clone, Default, Serialize)]
pub struct PatternStats {
    pub total: usize,
    pub by_status: BTreeMap<PatternStatus, usize>,
    pub by_confidence: BTreeMap<Confidence, usize>,
    /// The 5 most recently seen patterns
    pub recent: Vec<LearningPattern>,
}

// ========== Transaction Query ==========

/// Result ordering for transaction queries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    /// Oldest first
    DateAsc,
    /// Newest first
    #[default]
    DateDesc,
}

/// Transaction query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionQuery {
    /// Matches when the description contains any of these (case-insensitive)
    pub description_contains_any: Vec<String>,
    /// Matches descriptions starting with this merchant token
    pub merchant: Option<String>,
    pub source: Option<String>,
    pub category: Option<String>,
    pub payment_method: Option<String>,
    /// Inclusive date bounds
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    /// Leave out transactions flagged `is_excluded`
    pub skip_excluded: bool,
    pub order: SortOrder,
    pub limit: Option<usize>,
}

impl TransactionQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transactions dated within the last `days` days (inclusive of today)
    pub fn last_days(today: NaiveDate, days: i64) -> Self {
        Self::new().within_last_days(today, days)
    }

    /// Transactions dated between `end_days` and `start_days` days ago
    pub fn days_ago(today: NaiveDate, start_days: i64, end_days: i64) -> Self {
        Self::new().within_days_ago(today, start_days, end_days)
    }

    pub fn within_last_days(mut self, today: NaiveDate, days: i64) -> Self {
        self.date_range = Some((today - Duration::days(days), today));
        self
    }

    pub fn within_days_ago(mut self, today: NaiveDate, start_days: i64, end_days: i64) -> Self {
        self.date_range = Some((
            today - Duration::days(end_days),
            today - Duration::days(start_days),
        ));
        self
    }

    pub fn contains_any<I, S>(mut self, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.description_contains_any = terms.into_iter().map(Into::into).collect();
        self
    }

    pub fn merchant(mut self, merchant: impl Into<String>) -> Self {
        self.merchant = Some(merchant.into());
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if let Some((from, to)) = self.date_range {
            if from > to {
                return Err(Error::InvalidData(format!(
                    "date range start {} is after end {}",
                    from, to
                )));
            }
        }
        if self.limit == Some(0) {
            return Err(Error::InvalidData("limit must be positive".to_string()));
        }
        Ok(())
    }
}

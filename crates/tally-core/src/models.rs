//! Domain models for Tally

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ========== Rule Models ==========

/// What a rule (or learned pattern) classifies
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    Category,
    PaymentMethod,
    /// Analysis exclusion (the transaction's `is_excluded` flag)
    Filter,
}

/// Patterns share the rule type vocabulary one-to-one
pub type PatternType = RuleType;

impl RuleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::PaymentMethod => "payment_method",
            Self::Filter => "filter",
        }
    }

    /// Get all rule types
    pub fn all() -> &'static [RuleType] {
        &[Self::Category, Self::PaymentMethod, Self::Filter]
    }

    /// Map a corrected transaction field to the type it teaches
    pub fn from_field_name(field_name: &str) -> Option<Self> {
        match field_name.trim().to_lowercase().as_str() {
            "category" => Some(Self::Category),
            "payment_method" => Some(Self::PaymentMethod),
            "is_excluded" => Some(Self::Filter),
            _ => None,
        }
    }
}

impl std::str::FromStr for RuleType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "category" => Ok(Self::Category),
            "payment_method" | "payment" => Ok(Self::PaymentMethod),
            "filter" => Ok(Self::Filter),
            _ => Err(format!("Unknown rule type: {}", s)),
        }
    }
}

impl std::fmt::Display for RuleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a rule's condition is tested against a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionType {
    /// Case-insensitive substring match on the description
    Contains,
    /// Case-insensitive full match on the description
    Equals,
    /// Case-insensitive regex search on the description
    Regex,
    /// `"min:max"` inclusive bounds on the amount
    AmountRange,
}

impl ConditionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contains => "contains",
            Self::Equals => "equals",
            Self::Regex => "regex",
            Self::AmountRange => "amount_range",
        }
    }
}

impl std::str::FromStr for ConditionType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "contains" => Ok(Self::Contains),
            "equals" => Ok(Self::Equals),
            "regex" => Ok(Self::Regex),
            "amount_range" => Ok(Self::AmountRange),
            _ => Err(format!("Unknown condition type: {}", s)),
        }
    }
}

impl std::fmt::Display for ConditionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Who created a rule
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum RuleCreator {
    #[default]
    User,
    /// Seeded defaults
    System,
    /// Promoted from learning patterns
    Learned,
}

impl RuleCreator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::System => "system",
            Self::Learned => "learned",
        }
    }
}

impl std::str::FromStr for RuleCreator {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Self::User),
            "system" => Ok(Self::System),
            "learned" => Ok(Self::Learned),
            _ => Err(format!("Unknown rule creator: {}", s)),
        }
    }
}

impl std::fmt::Display for RuleCreator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The logical identity of a rule: two rules with equal keys are duplicates
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RuleKey {
    pub rule_type: RuleType,
    pub condition_type: ConditionType,
    pub condition_value: String,
    pub target_value: String,
}

impl std::fmt::Display for RuleKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}({}) -> {}",
            self.rule_type, self.condition_type, self.condition_value, self.target_value
        )
    }
}

/// A stored classification rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: i64,
    pub name: String,
    pub rule_type: RuleType,
    pub condition_type: ConditionType,
    pub condition_value: String,
    pub target_value: String,
    /// Higher priority rules are checked first
    pub priority: i32,
    pub active: bool,
    pub created_by: RuleCreator,
    pub created_at: DateTime<Utc>,
}

impl Rule {
    pub fn key(&self) -> RuleKey {
        RuleKey {
            rule_type: self.rule_type,
            condition_type: self.condition_type,
            condition_value: self.condition_value.clone(),
            target_value: self.target_value.clone(),
        }
    }

    pub fn update_priority(&mut self, priority: i32) {
        self.priority = priority;
    }

    pub fn activate(&mut self) {
        self.active = true;
    }

    pub fn deactivate(&mut self) {
        self.active = false;
    }
}

impl std::fmt::Display for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Rule({}): {} - {}({}) -> {}",
            self.id, self.name, self.condition_type, self.condition_value, self.target_value
        )
    }
}

/// A rule to be created (before DB insertion)
#[derive(Debug, Clone, PartialEq)]
pub struct NewRule {
    pub name: String,
    pub rule_type: RuleType,
    pub condition_type: ConditionType,
    pub condition_value: String,
    pub target_value: String,
    pub priority: i32,
    pub active: bool,
    pub created_by: RuleCreator,
}

impl NewRule {
    /// Active user rule with priority 0
    pub fn new(
        name: impl Into<String>,
        rule_type: RuleType,
        condition_type: ConditionType,
        condition_value: impl Into<String>,
        target_value: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            rule_type,
            condition_type,
            condition_value: condition_value.into(),
            target_value: target_value.into(),
            priority: 0,
            active: true,
            created_by: RuleCreator::User,
        }
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn created_by(mut self, created_by: RuleCreator) -> Self {
        self.created_by = created_by;
        self
    }

    pub fn active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn key(&self) -> RuleKey {
        RuleKey {
            rule_type: self.rule_type,
            condition_type: self.condition_type,
            condition_value: self.condition_value.clone(),
            target_value: self.target_value.clone(),
        }
    }
}

// ========== Learning Pattern Models ==========

/// Confidence in a learned pattern (ordered: Low < Medium < High)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    #[default]
    Medium,
    High,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Ordinal used when comparing against a minimum confidence
    pub fn rank(&self) -> u8 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
        }
    }

    /// Confidence earned purely by observation count
    pub fn for_occurrences(count: i64) -> Self {
        if count >= 5 {
            Self::High
        } else if count >= 2 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    /// Raise to what `count` observations earn; never lowers
    pub fn escalate(self, count: i64) -> Self {
        self.max(Self::for_occurrences(count))
    }
}

impl std::str::FromStr for Confidence {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(format!("Unknown confidence: {}", s)),
        }
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle state of a learned pattern
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum PatternStatus {
    #[default]
    Pending,
    /// Promoted to a rule
    Applied,
    /// Dismissed by the user; never produced by the engines
    Rejected,
}

impl PatternStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Applied => "applied",
            Self::Rejected => "rejected",
        }
    }
}

impl std::str::FromStr for PatternStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "applied" => Ok(Self::Applied),
            "rejected" => Ok(Self::Rejected),
            _ => Err(format!("Unknown pattern status: {}", s)),
        }
    }
}

impl std::fmt::Display for PatternStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a pattern's key came from, encoded as the pattern name prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternSource {
    /// First token of the description
    Merchant,
    /// Keyword shared by the corrected transaction and all similar ones
    Common,
    /// Plain keyword of the corrected transaction
    Keyword,
}

impl PatternSource {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Merchant => "상점-",
            Self::Common => "공통-",
            Self::Keyword => "키워드-",
        }
    }

    /// Confidence a freshly extracted pattern of this source starts with
    pub fn initial_confidence(&self) -> Confidence {
        match self {
            Self::Merchant => Confidence::Medium,
            Self::Common => Confidence::High,
            Self::Keyword => Confidence::Low,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        [Self::Merchant, Self::Common, Self::Keyword]
            .into_iter()
            .find(|s| name.starts_with(s.prefix()))
    }
}

/// Provenance recorded with a pattern
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatternMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_transaction_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_description: Option<String>,
    /// Number of similar transactions the pattern was derived from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similar_count: Option<usize>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// An accumulating observation linking a key to an outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningPattern {
    pub id: i64,
    pub pattern_type: PatternType,
    /// Human label; the prefix encodes provenance (see [`PatternSource`])
    pub pattern_name: String,
    /// Matched substring
    pub pattern_key: String,
    /// Outcome (category, payment method, or filter value)
    pub pattern_value: String,
    pub confidence: Confidence,
    pub occurrence_count: i64,
    pub last_seen: DateTime<Utc>,
    pub status: PatternStatus,
    pub metadata: PatternMetadata,
}

impl LearningPattern {
    /// Count a repeat observation
    pub fn record_occurrence(&mut self, now: DateTime<Utc>) {
        self.occurrence_count += 1;
        self.last_seen = now;
        self.confidence = self.confidence.escalate(self.occurrence_count);
    }

    pub fn source(&self) -> Option<PatternSource> {
        PatternSource::from_name(&self.pattern_name)
    }
}

/// A pattern observation to be upserted
#[derive(Debug, Clone, PartialEq)]
pub struct NewLearningPattern {
    pub pattern_type: PatternType,
    pub pattern_name: String,
    pub pattern_key: String,
    pub pattern_value: String,
    pub confidence: Confidence,
    pub last_seen: DateTime<Utc>,
    pub metadata: PatternMetadata,
}

impl NewLearningPattern {
    pub fn new(
        source: PatternSource,
        pattern_type: PatternType,
        key: &str,
        value: &str,
        seen_at: DateTime<Utc>,
    ) -> Self {
        Self {
            pattern_type,
            pattern_name: format!("{}{}-{}", source.prefix(), key, value),
            pattern_key: key.to_string(),
            pattern_value: value.to_string(),
            confidence: source.initial_confidence(),
            last_seen: seen_at,
            metadata: PatternMetadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: PatternMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Uniqueness key `(pattern_type, pattern_key, pattern_value)`
    pub fn key(&self) -> (PatternType, &str, &str) {
        (self.pattern_type, &self.pattern_key, &self.pattern_value)
    }
}

// ========== Transaction Models ==========

/// Direction of money movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    #[default]
    Expense,
    Income,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Expense => "expense",
            Self::Income => "income",
        }
    }
}

impl std::str::FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "expense" => Ok(Self::Expense),
            "income" => Ok(Self::Income),
            _ => Err(format!("Unknown transaction type: {}", s)),
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A transaction as read from the transaction store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    /// External identifier assigned by the data source
    pub transaction_id: String,
    pub date: NaiveDate,
    pub description: String,
    pub amount: f64,
    pub transaction_type: TransactionType,
    pub category: Option<String>,
    pub payment_method: Option<String>,
    /// Data source (e.g. toss_card, toss_account, manual)
    pub source: String,
    /// Excluded from analysis
    pub is_excluded: bool,
    pub created_at: DateTime<Utc>,
}

/// A transaction to be inserted
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub transaction_id: String,
    pub date: NaiveDate,
    pub description: String,
    pub amount: f64,
    pub transaction_type: TransactionType,
    pub category: Option<String>,
    pub payment_method: Option<String>,
    pub source: String,
}

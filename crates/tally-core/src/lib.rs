//! Tally Core Library
//!
//! Transaction classification for the Tally personal finance tool:
//! - Database access and migrations (rules, learned patterns, transactions)
//! - Rule engine: priority-ordered keyword/regex/amount rules with a per-type cache
//! - Learning engine: turns user corrections into patterns and promotes them to rules
//! - Recurring charge and spending drift detection
//! - Learning configuration with an embedded default

pub mod config;
pub mod db;
pub mod error;
pub mod learning;
pub mod models;
pub mod rules;
pub mod store;

/// Transaction fixtures for tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::LearningConfig;
pub use db::Database;
pub use error::{Error, Result};
pub use learning::{
    BatchLearningResult, Correction, DynamicFilter, LearningCounters, LearningEngine,
    LearningStats, PatternChange, RecurringPattern,
};
pub use models::{
    ConditionType, Confidence, LearningPattern, NewRule, NewTransaction, PatternStatus,
    PatternType, Rule, RuleCreator, RuleType, Transaction, TransactionType,
};
pub use rules::{RuleConflict, RuleEngine, RuleStats};
pub use store::{
    PatternFilter, PatternStats, PatternStore, RuleFilter, RuleStore, SortOrder,
    TransactionQuery, TransactionStore,
};

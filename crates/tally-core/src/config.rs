//! Learning configuration
//!
//! The heuristic constants used by the learning engine. Loaded from:
//! 1. An explicit path, if given and present
//! 2. `~/.local/share/tally/config/learning.toml` (override)
//! 3. Embedded defaults (`config/learning.toml`)
//!
//! Every key is optional; missing keys keep their default.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::Confidence;

/// Embedded default config
const DEFAULT_CONFIG: &str = include_str!("../../../config/learning.toml");

/// Keyword extraction settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub min_keyword_len: usize,
    pub max_keywords: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            min_keyword_len: 2,
            max_keywords: 5,
        }
    }
}

/// Similar-transaction search settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilarityConfig {
    pub threshold: f64,
    pub candidate_limit: usize,
    pub max_similar: usize,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            threshold: 0.6,
            candidate_limit: 20,
            max_similar: 10,
        }
    }
}

/// Pattern-to-rule promotion settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromotionConfig {
    pub auto_promote_min_occurrences: i64,
    pub min_occurrences: i64,
    pub default_min_confidence: Confidence,
    pub recent_days: i64,
    pub min_priority: i32,
    pub max_priority: i32,
    pub fallback_priority: i32,
}

impl Default for PromotionConfig {
    fn default() -> Self {
        Self {
            auto_promote_min_occurrences: 3,
            min_occurrences: 2,
            default_min_confidence: Confidence::Medium,
            recent_days: 7,
            min_priority: 10,
            max_priority: 50,
            fallback_priority: 20,
        }
    }
}

/// Recurring transaction detection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecurringConfig {
    pub min_transactions: usize,
    pub max_interval_days: i64,
    pub default_window_days: i64,
}

impl Default for RecurringConfig {
    fn default() -> Self {
        Self {
            min_transactions: 3,
            max_interval_days: 60,
            default_window_days: 90,
        }
    }
}

/// Behavioral drift detection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangeConfig {
    pub threshold: f64,
    pub min_samples: usize,
    pub min_merchant_samples: usize,
    pub recent_days: i64,
    pub previous_days: i64,
    pub merchant_weight: f64,
    pub new_merchant_score: f64,
}

impl Default for ChangeConfig {
    fn default() -> Self {
        Self {
            threshold: 0.3,
            min_samples: 5,
            min_merchant_samples: 3,
            recent_days: 30,
            previous_days: 90,
            merchant_weight: 0.7,
            new_merchant_score: 0.8,
        }
    }
}

/// Dynamic filter generation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub min_occurrences: i64,
    pub max_keywords: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_occurrences: 3,
            max_keywords: 5,
        }
    }
}

/// All learning engine settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    pub extraction: ExtractionConfig,
    pub similarity: SimilarityConfig,
    pub promotion: PromotionConfig,
    pub recurring: RecurringConfig,
    pub changes: ChangeConfig,
    pub filters: FilterConfig,
}

impl LearningConfig {
    /// Load from the default override location, falling back to embedded defaults
    pub fn load() -> Result<Self> {
        load_config(None)
    }

    /// Load from an explicit path (falls back like [`LearningConfig::load`] if missing)
    pub fn load_from(path: &Path) -> Result<Self> {
        load_config(Some(path))
    }

    /// Reject settings the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.extraction.min_keyword_len == 0 || self.extraction.max_keywords == 0 {
            return Err(Error::Config(
                "extraction.min_keyword_len and extraction.max_keywords must be positive".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.similarity.threshold) {
            return Err(Error::Config(format!(
                "similarity.threshold must be within 0..=1, got {}",
                self.similarity.threshold
            )));
        }
        if self.promotion.min_priority > self.promotion.max_priority {
            return Err(Error::Config(format!(
                "promotion.min_priority ({}) exceeds promotion.max_priority ({})",
                self.promotion.min_priority, self.promotion.max_priority
            )));
        }
        if self.changes.recent_days <= 0 || self.changes.previous_days <= self.changes.recent_days
        {
            return Err(Error::Config(format!(
                "changes windows must satisfy 0 < recent_days < previous_days, got {} and {}",
                self.changes.recent_days, self.changes.previous_days
            )));
        }
        if self.recurring.min_transactions < 3 {
            return Err(Error::Config(
                "recurring.min_transactions must be at least 3".into(),
            ));
        }
        Ok(())
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("tally").join("config").join("learning.toml"))
}

/// Load configuration (override first, then default)
fn load_config(override_path: Option<&Path>) -> Result<LearningConfig> {
    let path = match override_path {
        Some(path) => Some(path.to_path_buf()),
        None => default_config_path(),
    };

    let content = match path {
        Some(path) if path.exists() => {
            tracing::debug!(path = %path.display(), "Loading learning config");
            fs::read_to_string(&path)?
        }
        _ => DEFAULT_CONFIG.to_string(),
    };

    parse_config(&content)
}

/// Parse config from TOML content
pub fn parse_config(content: &str) -> Result<LearningConfig> {
    let config: LearningConfig = toml::from_str(content)
        .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;
    config.validate()?;
    Ok(config)
}

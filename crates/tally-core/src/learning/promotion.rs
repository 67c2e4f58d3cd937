//! Pattern-to-rule promotion
//!
//! Priority formula for promoted rules:
//!
//! | component                         | points          |
//! |-----------------------------------|-----------------|
//! | base by confidence                | 15 / 20 / 25    |
//! | occurrences ≥ 10 (else ≥ 5)       | +5 (else +3)    |
//! | key of 10+ characters             | +2              |
//! | merchant-derived (`상점-`)        | +3              |
//! | common keyword (`공통-`)          | +4              |
//! | seen within `recent_days`         | +2              |
//!
//! The sum is clamped to `[min_priority, max_priority]`.

use chrono::{DateTime, Utc};

use crate::config::PromotionConfig;
use crate::models::{
    Confidence, ConditionType, LearningPattern, NewRule, PatternSource, RuleCreator,
};

/// Name prefix for rules created by batch promotion
pub const LEARNED_RULE_PREFIX: &str = "학습-";
/// Name prefix for rules created by auto-promotion during learning
pub const AUTO_RULE_PREFIX: &str = "자동-";

/// Characters of the pattern key kept in a rule name
const RULE_NAME_KEY_CHARS: usize = 20;

pub fn promotion_priority(
    pattern: &LearningPattern,
    now: DateTime<Utc>,
    config: &PromotionConfig,
) -> i32 {
    let mut priority = match pattern.confidence {
        Confidence::Low => 15,
        Confidence::Medium => 20,
        Confidence::High => 25,
    };

    if pattern.occurrence_count >= 10 {
        priority += 5;
    } else if pattern.occurrence_count >= 5 {
        priority += 3;
    }

    if pattern.pattern_key.chars().count() >= 10 {
        priority += 2;
    }

    match pattern.source() {
        Some(PatternSource::Merchant) => priority += 3,
        Some(PatternSource::Common) => priority += 4,
        _ => {}
    }

    // Whole elapsed days, so anything under `recent_days + 1` days old counts
    if (now - pattern.last_seen).num_days() <= config.recent_days {
        priority += 2;
    }

    priority.clamp(config.min_priority, config.max_priority)
}

/// `{prefix}{value}-{first 20 chars of key}`
pub fn rule_name(prefix: &str, value: &str, key: &str) -> String {
    let key: String = key.chars().take(RULE_NAME_KEY_CHARS).collect();
    format!("{}{}-{}", prefix, value, key)
}

/// The `contains` rule a pattern promotes to
pub fn rule_from_pattern(pattern: &LearningPattern, prefix: &str, priority: i32) -> NewRule {
    NewRule::new(
        rule_name(prefix, &pattern.pattern_value, &pattern.pattern_key),
        pattern.pattern_type,
        ConditionType::Contains,
        pattern.pattern_key.clone(),
        pattern.pattern_value.clone(),
    )
    .priority(priority)
    .created_by(RuleCreator::Learned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PatternMetadata, PatternStatus, RuleType};
    use chrono::Duration;

    fn pattern(name: &str, key: &str, confidence: Confidence, count: i64, age_days: i64) -> LearningPattern {
        LearningPattern {
            id: 1,
            pattern_type: RuleType::Category,
            pattern_name: name.to_string(),
            pattern_key: key.to_string(),
            pattern_value: "식비".to_string(),
            confidence,
            occurrence_count: count,
            last_seen: Utc::now() - Duration::days(age_days),
            status: PatternStatus::Pending,
            metadata: PatternMetadata::default(),
        }
    }

    #[test]
    fn test_priority_base_by_confidence() {
        let config = PromotionConfig::default();
        let now = Utc::now();
        let p = |c| promotion_priority(&pattern("키워드-커피-식비", "커피", c, 2, 30), now, &config);
        assert_eq!(p(Confidence::Low), 15);
        assert_eq!(p(Confidence::Medium), 20);
        assert_eq!(p(Confidence::High), 25);
    }

    #[test]
    fn test_priority_bonuses() {
        let config = PromotionConfig::default();
        let now = Utc::now();

        // medium 20 + merchant 3 + recent 2
        let merchant = pattern("상점-스타벅스-식비", "스타벅스", Confidence::Medium, 2, 1);
        assert_eq!(promotion_priority(&merchant, now, &config), 25);

        // high 25 + occurrences(5) 3 + common 4
        let common = pattern("공통-라떼-식비", "라떼", Confidence::High, 5, 30);
        assert_eq!(promotion_priority(&common, now, &config), 32);

        // high 25 + occurrences(10) 5 + long key 2 + common 4 + recent 2
        let long = pattern("공통-abcdefghij-식비", "abcdefghij", Confidence::High, 10, 0);
        assert_eq!(promotion_priority(&long, now, &config), 38);
    }

    #[test]
    fn test_recent_bonus_counts_whole_days() {
        let config = PromotionConfig::default();
        let now = Utc::now();
        let mut p = pattern("키워드-커피-식비", "커피", Confidence::Medium, 2, 0);

        p.last_seen = now - Duration::days(7) - Duration::hours(12);
        assert_eq!(promotion_priority(&p, now, &config), 22);

        p.last_seen = now - Duration::days(8);
        assert_eq!(promotion_priority(&p, now, &config), 20);
    }

    #[test]
    fn test_priority_is_clamped() {
        let now = Utc::now();
        let tight = PromotionConfig {
            min_priority: 18,
            max_priority: 30,
            ..PromotionConfig::default()
        };

        let low = pattern("키워드-커피-식비", "커피", Confidence::Low, 2, 30);
        assert_eq!(promotion_priority(&low, now, &tight), 18);

        let high = pattern("공통-abcdefghij-식비", "abcdefghij", Confidence::High, 10, 0);
        assert_eq!(promotion_priority(&high, now, &tight), 30);
    }

    #[test]
    fn test_priority_always_within_default_bounds() {
        let config = PromotionConfig::default();
        let now = Utc::now();
        for confidence in [Confidence::Low, Confidence::Medium, Confidence::High] {
            for count in [2, 5, 10, 100] {
                for name in ["상점-x-식비", "공통-x-식비", "키워드-x-식비"] {
                    let p = pattern(name, "아주아주아주긴키워드입니다", confidence, count, 0);
                    let priority = promotion_priority(&p, now, &config);
                    assert!((10..=50).contains(&priority));
                }
            }
        }
    }

    #[test]
    fn test_rule_name_truncates_key() {
        let key = "가".repeat(30);
        let name = rule_name(LEARNED_RULE_PREFIX, "식비", &key);
        assert_eq!(name, format!("학습-식비-{}", "가".repeat(20)));
    }

    #[test]
    fn test_rule_from_pattern() {
        let p = pattern("상점-스타벅스-식비", "스타벅스", Confidence::Medium, 2, 0);
        let rule = rule_from_pattern(&p, AUTO_RULE_PREFIX, 27);
        assert_eq!(rule.name, "자동-식비-스타벅스");
        assert_eq!(rule.condition_type, ConditionType::Contains);
        assert_eq!(rule.condition_value, "스타벅스");
        assert_eq!(rule.target_value, "식비");
        assert_eq!(rule.priority, 27);
        assert_eq!(rule.created_by, RuleCreator::Learned);
    }
}

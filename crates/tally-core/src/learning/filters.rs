//! Dynamic filters derived from applied patterns

use serde::Serialize;

use crate::config::FilterConfig;
use crate::models::{LearningPattern, PatternType, RuleType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    ContainsAny,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterCondition {
    pub field: String,
    pub operator: FilterOperator,
    pub values: Vec<String>,
}

impl FilterCondition {
    /// True if the field's value satisfies the condition
    pub fn matches(&self, value: &str) -> bool {
        match self.operator {
            FilterOperator::ContainsAny => {
                let value = value.to_lowercase();
                self.values
                    .iter()
                    .any(|v| value.contains(&v.to_lowercase()))
            }
        }
    }
}

/// A saved-search style filter over transactions
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DynamicFilter {
    pub name: String,
    pub description: String,
    pub pattern_type: PatternType,
    pub conditions: Vec<FilterCondition>,
}

impl DynamicFilter {
    /// Only `description` conditions are produced, so that is the only field checked
    pub fn matches_description(&self, description: &str) -> bool {
        self.conditions
            .iter()
            .filter(|c| c.field == "description")
            .all(|c| c.matches(description))
    }
}

fn filter_description(pattern_type: PatternType, value: &str) -> String {
    match pattern_type {
        RuleType::Category => format!("{} 관련 거래 (자동 생성)", value),
        RuleType::PaymentMethod => format!("{} 결제 방식 거래 (자동 생성)", value),
        RuleType::Filter => format!("{} 필터 대상 거래 (자동 생성)", value),
    }
}

/// One filter per pattern value, keyed on its most frequent pattern keys
///
/// `patterns` must already be the applied, frequent patterns of
/// `pattern_type`, ordered most frequent first.
pub fn build_filters(
    pattern_type: PatternType,
    patterns: &[LearningPattern],
    config: &FilterConfig,
) -> Vec<DynamicFilter> {
    let mut groups: Vec<(&str, Vec<String>)> = Vec::new();
    for pattern in patterns {
        let value = pattern.pattern_value.as_str();
        let idx = match groups.iter().position(|(v, _)| *v == value) {
            Some(idx) => idx,
            None => {
                groups.push((value, Vec::new()));
                groups.len() - 1
            }
        };
        let keys = &mut groups[idx].1;
        if keys.len() < config.max_keywords && !keys.contains(&pattern.pattern_key) {
            keys.push(pattern.pattern_key.clone());
        }
    }

    groups
        .into_iter()
        .map(|(value, keys)| DynamicFilter {
            name: format!("자동-{}", value),
            description: filter_description(pattern_type, value),
            pattern_type,
            conditions: vec![FilterCondition {
                field: "description".to_string(),
                operator: FilterOperator::ContainsAny,
                values: keys,
            }],
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Confidence, PatternMetadata, PatternStatus};
    use chrono::Utc;

    fn applied(key: &str, value: &str, count: i64) -> LearningPattern {
        LearningPattern {
            id: 0,
            pattern_type: RuleType::Category,
            pattern_name: format!("키워드-{}-{}", key, value),
            pattern_key: key.to_string(),
            pattern_value: value.to_string(),
            confidence: Confidence::High,
            occurrence_count: count,
            last_seen: Utc::now(),
            status: PatternStatus::Applied,
            metadata: PatternMetadata::default(),
        }
    }

    #[test]
    fn test_groups_by_value() {
        let patterns = vec![
            applied("스타벅스", "식비", 9),
            applied("택시", "교통비", 7),
            applied("식당", "식비", 5),
        ];

        let filters = build_filters(RuleType::Category, &patterns, &FilterConfig::default());
        assert_eq!(filters.len(), 2);
        assert_eq!(filters[0].name, "자동-식비");
        assert_eq!(filters[0].description, "식비 관련 거래 (자동 생성)");
        assert_eq!(filters[0].conditions[0].values, vec!["스타벅스", "식당"]);
        assert_eq!(filters[1].name, "자동-교통비");
    }

    #[test]
    fn test_keyword_cap() {
        let patterns: Vec<_> = ["가가", "나나", "다다", "라라", "마마", "바바"]
            .iter()
            .map(|k| applied(k, "식비", 3))
            .collect();

        let filters = build_filters(RuleType::Category, &patterns, &FilterConfig::default());
        assert_eq!(filters[0].conditions[0].values.len(), 5);
        assert!(!filters[0].conditions[0].values.contains(&"바바".to_string()));
    }

    #[test]
    fn test_payment_description_and_matching() {
        let patterns = vec![applied("토스페이", "간편결제", 4)];
        let filters = build_filters(RuleType::PaymentMethod, &patterns, &FilterConfig::default());

        assert_eq!(filters[0].description, "간편결제 결제 방식 거래 (자동 생성)");
        assert!(filters[0].matches_description("토스페이 편의점"));
        assert!(!filters[0].matches_description("현금"));
    }

    #[test]
    fn test_operator_serializes_snake_case() {
        let json = serde_json::to_string(&FilterOperator::ContainsAny).unwrap();
        assert_eq!(json, r#""contains_any""#);
    }
}

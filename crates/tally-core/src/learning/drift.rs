//! Spending drift between a recent and a previous window

use std::collections::HashMap;

use serde::Serialize;

use super::extract::extract_merchant;
use crate::config::ChangeConfig;
use crate::models::Transaction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    NewCategory,
    CategoryChange,
    NewPaymentMethod,
    PaymentMethodChange,
    NewMerchant,
    MerchantFrequencyChange,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewCategory => "new_category",
            Self::CategoryChange => "category_change",
            Self::NewPaymentMethod => "new_payment_method",
            Self::PaymentMethodChange => "payment_method_change",
            Self::NewMerchant => "new_merchant",
            Self::MerchantFrequencyChange => "merchant_frequency_change",
        }
    }
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeDirection {
    Increase,
    Decrease,
}

impl ChangeDirection {
    fn between(recent: f64, previous: f64) -> Self {
        if recent > previous {
            Self::Increase
        } else {
            Self::Decrease
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Increase => "증가",
            Self::Decrease => "감소",
        }
    }
}

/// A notable change in spending behavior
#[derive(Debug, Clone, Serialize)]
pub struct PatternChange {
    pub kind: ChangeKind,
    pub value: String,
    /// Transactions in the recent window
    pub count: usize,
    /// Share (category/payment) or daily frequency (merchant); absent for new groups
    pub recent_ratio: Option<f64>,
    pub previous_ratio: Option<f64>,
    pub change_score: f64,
    pub direction: Option<ChangeDirection>,
    pub description: String,
}

/// Group sizes in first-seen order
fn count_by<'t, F>(transactions: &'t [Transaction], key: F) -> Vec<(&'t str, usize)>
where
    F: Fn(&'t Transaction) -> Option<&'t str>,
{
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for tx in transactions {
        let Some(value) = key(tx).filter(|v| !v.is_empty()) else {
            continue;
        };
        match counts.iter_mut().find(|(v, _)| *v == value) {
            Some((_, n)) => *n += 1,
            None => counts.push((value, 1)),
        }
    }
    counts
}

fn merchant_of(tx: &Transaction) -> Option<&str> {
    extract_merchant(&tx.description)
}

fn relative_change(recent: f64, previous: f64) -> f64 {
    (recent - previous).abs() / previous.max(0.01)
}

/// Share-based changes for one field (category or payment method)
fn share_changes<'t, F>(
    recent: &'t [Transaction],
    previous: &'t [Transaction],
    key: F,
    (new_kind, change_kind): (ChangeKind, ChangeKind),
    config: &ChangeConfig,
) -> Vec<PatternChange>
where
    F: Fn(&'t Transaction) -> Option<&'t str> + Copy,
{
    let previous_counts: HashMap<&str, usize> = count_by(previous, key).into_iter().collect();
    let label = match new_kind {
        ChangeKind::NewPaymentMethod => "결제 방식",
        _ => "카테고리",
    };

    let mut changes = Vec::new();
    for (value, count) in count_by(recent, key) {
        if count < config.min_samples {
            continue;
        }

        let Some(&previous_count) = previous_counts.get(value) else {
            changes.push(PatternChange {
                kind: new_kind,
                value: value.to_string(),
                count,
                recent_ratio: None,
                previous_ratio: None,
                change_score: 1.0,
                direction: None,
                description: format!("새로운 {}: {} ({}건)", label, value, count),
            });
            continue;
        };

        let recent_ratio = count as f64 / recent.len() as f64;
        let previous_ratio = previous_count as f64 / previous.len() as f64;
        let change_ratio = relative_change(recent_ratio, previous_ratio);
        if change_ratio > config.threshold {
            let direction = ChangeDirection::between(recent_ratio, previous_ratio);
            changes.push(PatternChange {
                kind: change_kind,
                value: value.to_string(),
                count,
                recent_ratio: Some(recent_ratio),
                previous_ratio: Some(previous_ratio),
                change_score: change_ratio,
                direction: Some(direction),
                description: format!(
                    "{} 비율 변화: {} ({}, {:.2})",
                    label,
                    value,
                    direction.label(),
                    change_ratio
                ),
            });
        }
    }
    changes
}

/// Frequency-based changes per merchant
fn merchant_changes(
    recent: &[Transaction],
    previous: &[Transaction],
    config: &ChangeConfig,
) -> Vec<PatternChange> {
    let previous_counts: HashMap<&str, usize> =
        count_by(previous, merchant_of).into_iter().collect();

    let recent_days = config.recent_days as f64;
    let previous_days = (config.previous_days - config.recent_days) as f64;

    let mut changes = Vec::new();
    for (value, count) in count_by(recent, merchant_of) {
        if count < config.min_merchant_samples {
            continue;
        }

        let Some(&previous_count) = previous_counts.get(value) else {
            changes.push(PatternChange {
                kind: ChangeKind::NewMerchant,
                value: value.to_string(),
                count,
                recent_ratio: None,
                previous_ratio: None,
                change_score: config.new_merchant_score,
                direction: None,
                description: format!("새로운 상점: {} ({}건)", value, count),
            });
            continue;
        };

        let recent_freq = count as f64 / recent_days;
        let previous_freq = previous_count as f64 / previous_days;
        let change_ratio = relative_change(recent_freq, previous_freq);
        if change_ratio > config.threshold {
            let direction = ChangeDirection::between(recent_freq, previous_freq);
            changes.push(PatternChange {
                kind: ChangeKind::MerchantFrequencyChange,
                value: value.to_string(),
                count,
                recent_ratio: Some(recent_freq),
                previous_ratio: Some(previous_freq),
                change_score: change_ratio * config.merchant_weight,
                direction: Some(direction),
                description: format!(
                    "상점 방문 빈도 변화: {} ({}, {:.2})",
                    value,
                    direction.label(),
                    change_ratio
                ),
            });
        }
    }
    changes
}

/// Compare two windows; empty if either window is empty
///
/// Sorted by `change_score`, highest first.
pub fn detect_changes(
    recent: &[Transaction],
    previous: &[Transaction],
    config: &ChangeConfig,
) -> Vec<PatternChange> {
    if recent.is_empty() || previous.is_empty() {
        return Vec::new();
    }

    let mut changes = share_changes(
        recent,
        previous,
        |tx| tx.category.as_deref(),
        (ChangeKind::NewCategory, ChangeKind::CategoryChange),
        config,
    );
    changes.extend(share_changes(
        recent,
        previous,
        |tx| tx.payment_method.as_deref(),
        (ChangeKind::NewPaymentMethod, ChangeKind::PaymentMethodChange),
        config,
    ));
    changes.extend(merchant_changes(recent, previous, config));

    changes.sort_by(|a, b| b.change_score.total_cmp(&a.change_score));
    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::tx;

    fn with_category(description: &str, category: &str) -> Transaction {
        let mut t = tx(description, 10000.0);
        t.category = Some(category.to_string());
        t
    }

    fn repeat(n: usize, description: &str, category: &str) -> Vec<Transaction> {
        (0..n).map(|_| with_category(description, category)).collect()
    }

    #[test]
    fn test_empty_window_yields_nothing() {
        let recent = repeat(6, "스타벅스 라떼", "식비");
        assert!(detect_changes(&recent, &[], &ChangeConfig::default()).is_empty());
        assert!(detect_changes(&[], &recent, &ChangeConfig::default()).is_empty());
    }

    #[test]
    fn test_new_category_and_merchant() {
        let recent = repeat(5, "필라테스 수업", "운동");
        let previous = repeat(3, "스타벅스 라떼", "식비");

        let changes = detect_changes(&recent, &previous, &ChangeConfig::default());
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].kind, ChangeKind::NewCategory);
        assert_eq!(changes[0].value, "운동");
        assert_eq!(changes[0].change_score, 1.0);
        assert_eq!(changes[0].description, "새로운 카테고리: 운동 (5건)");
        assert_eq!(changes[1].kind, ChangeKind::NewMerchant);
        assert_eq!(changes[1].value, "필라테스");
        assert_eq!(changes[1].change_score, 0.8);
    }

    #[test]
    fn test_below_minimum_samples_ignored() {
        let recent = repeat(4, "필라테스 수업", "운동");
        let previous = repeat(3, "스타벅스 라떼", "식비");

        let changes = detect_changes(&recent, &previous, &ChangeConfig::default());
        // 4 < 5 category samples, but 4 >= 3 merchant samples
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::NewMerchant);
    }

    #[test]
    fn test_category_share_change() {
        // Recent: 식비 8 of 10; previous: 식비 2 of 10
        let mut recent = repeat(8, "식당 점심", "식비");
        recent.extend(repeat(2, "택시 출근", "교통비"));
        let mut previous = repeat(2, "식당 점심", "식비");
        previous.extend(repeat(8, "택시 출근", "교통비"));

        let changes = detect_changes(&recent, &previous, &ChangeConfig::default());
        let food = changes
            .iter()
            .find(|c| c.kind == ChangeKind::CategoryChange && c.value == "식비")
            .expect("식비 share change");
        assert_eq!(food.direction, Some(ChangeDirection::Increase));
        assert!((food.change_score - 3.0).abs() < 1e-9);
        assert_eq!(food.recent_ratio, Some(0.8));
        assert_eq!(food.previous_ratio, Some(0.2));

        // 교통비 has only 2 recent samples
        assert!(!changes
            .iter()
            .any(|c| c.kind == ChangeKind::CategoryChange && c.value == "교통비"));
    }

    #[test]
    fn test_merchant_frequency_change() {
        // Recent 6 visits / 30 days vs previous 3 visits / 60 days
        let recent = repeat(6, "스타벅스 라떼", "식비");
        let previous = repeat(3, "스타벅스 라떼", "식비");

        let changes = detect_changes(&recent, &previous, &ChangeConfig::default());
        let merchant = changes
            .iter()
            .find(|c| c.kind == ChangeKind::MerchantFrequencyChange)
            .expect("frequency change");
        // (0.2 - 0.05) / 0.05 = 3.0, weighted by 0.7
        assert!((merchant.change_score - 2.1).abs() < 1e-9);
        assert_eq!(merchant.direction, Some(ChangeDirection::Increase));

        // Same category share (100% in both windows) is not a change
        assert!(!changes.iter().any(|c| c.kind == ChangeKind::CategoryChange));
    }

    #[test]
    fn test_sorted_by_score() {
        let mut recent = repeat(6, "스타벅스 라떼", "식비");
        recent.extend(repeat(5, "필라테스 수업", "운동"));
        let previous = repeat(3, "스타벅스 라떼", "식비");

        let changes = detect_changes(&recent, &previous, &ChangeConfig::default());
        let scores: Vec<f64> = changes.iter().map(|c| c.change_score).collect();
        let mut sorted = scores.clone();
        sorted.sort_by(|a, b| b.total_cmp(a));
        assert_eq!(scores, sorted);
        assert_eq!(changes[0].kind, ChangeKind::MerchantFrequencyChange);
    }
}

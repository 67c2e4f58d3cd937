//! Keyword and merchant heuristics
//!
//! Tokenization is a plain whitespace split. Pattern keys are derived from
//! these tokens, so changing the rules here changes what existing patterns
//! match against.

use std::collections::HashSet;

use crate::config::ExtractionConfig;
use crate::models::Transaction;

/// Keywords of a description
///
/// Whitespace tokens with at least one letter and at least
/// `min_keyword_len` characters, de-duplicated in order, capped at
/// `max_keywords`.
pub fn extract_keywords(description: &str, config: &ExtractionConfig) -> Vec<String> {
    let mut seen = HashSet::new();
    description
        .split_whitespace()
        .filter(|word| word.chars().any(char::is_alphabetic))
        .filter(|word| word.chars().count() >= config.min_keyword_len)
        .filter(|word| seen.insert(*word))
        .take(config.max_keywords)
        .map(str::to_string)
        .collect()
}

/// Merchant of a description: its first whitespace token
pub fn extract_merchant(description: &str) -> Option<&str> {
    description.split_whitespace().next()
}

/// Heuristic similarity of two transactions in `[0, 1]`
///
/// - 0.5 when merchants match
/// - up to 0.3 for shared keywords (relative to the larger keyword set)
/// - 0.1 when amounts are within 10% of each other
/// - 0.05 each for matching category and payment method
pub fn similarity(a: &Transaction, b: &Transaction, config: &ExtractionConfig) -> f64 {
    let mut score = 0.0;

    if let (Some(ma), Some(mb)) = (
        extract_merchant(&a.description),
        extract_merchant(&b.description),
    ) {
        if ma == mb {
            score += 0.5;
        }
    }

    let ka: HashSet<String> = extract_keywords(&a.description, config).into_iter().collect();
    let kb: HashSet<String> = extract_keywords(&b.description, config).into_iter().collect();
    if !ka.is_empty() && !kb.is_empty() {
        let shared = ka.intersection(&kb).count() as f64;
        score += 0.3 * shared / ka.len().max(kb.len()) as f64;
    }

    // Signed ratio: an opposite-signed pair never earns the bonus
    if a.amount != 0.0 && b.amount != 0.0 {
        let ratio = a.amount.min(b.amount) / a.amount.max(b.amount);
        if ratio > 0.9 {
            score += 0.1;
        }
    }

    if a.category.is_some() && a.category == b.category {
        score += 0.05;
    }
    if a.payment_method.is_some() && a.payment_method == b.payment_method {
        score += 0.05;
    }

    score.clamp(0.0, 1.0)
}

/// Keywords present in every one of `others` as well as in `current`
///
/// Returned in `current`'s order. Empty when `others` is empty.
pub fn common_keywords(current: &[String], others: &[Vec<String>]) -> Vec<String> {
    if others.is_empty() {
        return Vec::new();
    }
    current
        .iter()
        .filter(|keyword| others.iter().all(|set| set.contains(keyword)))
        .cloned()
        .collect()
}

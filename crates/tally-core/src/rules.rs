//! Rule engine for transaction classification
//!
//! Rules of one type are evaluated in priority order (highest first, then
//! insertion order) and the first matching rule's target wins. Active rules
//! are cached per type and the cache is invalidated by every mutation that
//! goes through the engine. Rules changed behind the engine's back (directly
//! through the store) are not seen until [`RuleEngine::clear_cache`].
//!
//! The engine uses interior mutability for its cache and is not `Sync`.
//! Share it across threads only behind external locking.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use regex::{Regex, RegexBuilder};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::models::{ConditionType, NewRule, Rule, RuleCreator, RuleType, Transaction};
use crate::store::{RuleFilter, RuleStore};

/// Per-type cache of active rules, plus compiled regex conditions
#[derive(Default)]
pub struct RuleCache {
    rules: RefCell<HashMap<RuleType, Rc<Vec<Rule>>>>,
    /// `None` marks a pattern that failed to compile (warned once)
    regexes: RefCell<HashMap<String, Option<Regex>>>,
}

impl RuleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached rules for a type, loading them on a miss
    fn get_or_load<F>(&self, rule_type: RuleType, load: F) -> Result<Rc<Vec<Rule>>>
    where
        F: FnOnce() -> Result<Vec<Rule>>,
    {
        if let Some(rules) = self.rules.borrow().get(&rule_type) {
            debug!(rule_type = %rule_type, "Rule cache hit");
            return Ok(Rc::clone(rules));
        }

        let rules = Rc::new(load()?);
        debug!(rule_type = %rule_type, count = rules.len(), "Rule cache refreshed");
        self.rules.borrow_mut().insert(rule_type, Rc::clone(&rules));
        Ok(rules)
    }

    /// Drop a type's rules; compiled regexes are pruned too and recompiled on demand
    pub fn invalidate(&self, rule_type: RuleType) {
        if self.rules.borrow_mut().remove(&rule_type).is_some() {
            debug!(rule_type = %rule_type, "Rule cache invalidated");
        }
        self.regexes.borrow_mut().clear();
    }

    pub fn clear(&self) {
        self.rules.borrow_mut().clear();
        self.regexes.borrow_mut().clear();
    }

    pub fn is_cached(&self, rule_type: RuleType) -> bool {
        self.rules.borrow().contains_key(&rule_type)
    }

    /// Compile (once) a case-insensitive regex
    fn regex(&self, pattern: &str) -> Option<Regex> {
        if let Some(compiled) = self.regexes.borrow().get(pattern) {
            return compiled.clone();
        }

        let compiled = match RegexBuilder::new(pattern).case_insensitive(true).build() {
            Ok(re) => Some(re),
            Err(e) => {
                warn!(pattern, error = %e, "Invalid regex condition, treating as no match");
                None
            }
        };
        self.regexes
            .borrow_mut()
            .insert(pattern.to_string(), compiled.clone());
        compiled
    }
}

/// Parse an `amount_range` condition (`"min:max"`)
pub fn parse_amount_range(value: &str) -> Option<(f64, f64)> {
    let parts: Vec<&str> = value.split(':').collect();
    if parts.len() != 2 {
        return None;
    }
    let min: f64 = parts[0].trim().parse().ok()?;
    let max: f64 = parts[1].trim().parse().ok()?;
    if !min.is_finite() || !max.is_finite() {
        return None;
    }
    Some((min, max))
}

/// A pair of active rules with the same condition but different targets
#[derive(Debug, Clone, Serialize)]
pub struct RuleConflict {
    /// The highest-priority rule of the group (the runtime winner)
    pub higher: Rule,
    pub lower: Rule,
}

/// Summary of the active rules of one type
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RuleStats {
    pub total_rules: usize,
    pub condition_counts: BTreeMap<ConditionType, usize>,
    pub creator_counts: BTreeMap<RuleCreator, usize>,
    /// `(min, max)`; `(0, 0)` when there are no rules
    pub priority_range: (i32, i32),
    pub target_counts: BTreeMap<String, usize>,
}

/// Classifies transactions with stored rules
pub struct RuleEngine<'a> {
    store: &'a dyn RuleStore,
    cache: RuleCache,
}

impl<'a> RuleEngine<'a> {
    pub fn new(store: &'a dyn RuleStore) -> Self {
        Self {
            store,
            cache: RuleCache::new(),
        }
    }

    pub fn cache(&self) -> &RuleCache {
        &self.cache
    }

    fn active_rules(&self, rule_type: RuleType) -> Result<Rc<Vec<Rule>>> {
        self.cache
            .get_or_load(rule_type, || self.store.get_active_rules_by_type(rule_type))
    }

    /// Classify one transaction: the first matching rule's target, if any
    pub fn apply_rules(&self, tx: &Transaction, rule_type: RuleType) -> Result<Option<String>> {
        let rules = self.active_rules(rule_type)?;
        Ok(self.first_match(&rules, tx).map(|rule| rule.target_value.clone()))
    }

    /// Classify many transactions against one rule load
    ///
    /// Keyed by external `transaction_id`; unmatched transactions are omitted.
    pub fn apply_rules_batch(
        &self,
        transactions: &[Transaction],
        rule_type: RuleType,
    ) -> Result<HashMap<String, String>> {
        let rules = self.active_rules(rule_type)?;

        let results: HashMap<String, String> = transactions
            .iter()
            .filter_map(|tx| {
                self.first_match(&rules, tx)
                    .map(|rule| (tx.transaction_id.clone(), rule.target_value.clone()))
            })
            .collect();

        debug!(
            rule_type = %rule_type,
            total = transactions.len(),
            matched = results.len(),
            "Applied rules to batch"
        );
        Ok(results)
    }

    /// Every active rule of the type that matches, in evaluation order
    pub fn matching_rules(&self, tx: &Transaction, rule_type: RuleType) -> Result<Vec<Rule>> {
        let rules = self.active_rules(rule_type)?;
        Ok(rules
            .iter()
            .filter(|rule| self.condition_matches(rule, tx))
            .cloned()
            .collect())
    }

    fn first_match<'r>(&self, rules: &'r [Rule], tx: &Transaction) -> Option<&'r Rule> {
        let found = rules.iter().find(|rule| self.condition_matches(rule, tx));
        if let Some(rule) = found {
            debug!(rule_id = rule.id, rule = %rule.name, description = %tx.description, "Rule matched");
        }
        found
    }

    /// Evaluate a rule's condition; malformed conditions never match
    pub fn condition_matches(&self, rule: &Rule, tx: &Transaction) -> bool {
        let description = tx.description.to_lowercase();
        let value = rule.condition_value.to_lowercase();

        match rule.condition_type {
            ConditionType::Contains => description.contains(&value),
            ConditionType::Equals => description == value,
            ConditionType::Regex => self
                .cache
                .regex(&rule.condition_value)
                .is_some_and(|re| re.is_match(&tx.description)),
            ConditionType::AmountRange => match parse_amount_range(&rule.condition_value) {
                Some((min, max)) => min <= tx.amount && tx.amount <= max,
                None => {
                    warn!(
                        rule_id = rule.id,
                        value = %rule.condition_value,
                        "Invalid amount range, treating as no match"
                    );
                    false
                }
            },
        }
    }

    // ========== Rule Management ==========

    /// True if a rule with the same duplicate key already exists
    pub fn rule_exists(&self, rule: &NewRule) -> Result<bool> {
        Ok(!self
            .store
            .list_rules(&RuleFilter::same_key_as(rule))?
            .is_empty())
    }

    /// Create a rule, refusing logical duplicates
    pub fn add_rule(&self, rule: NewRule) -> Result<Rule> {
        if self.rule_exists(&rule)? {
            return Err(Error::DuplicateRule(rule.key().to_string()));
        }

        let created = self.store.create_rule(&rule)?;
        self.cache.invalidate(created.rule_type);
        info!(id = created.id, name = %created.name, priority = created.priority, "Added rule");
        Ok(created)
    }

    /// Persist changes to an existing rule
    pub fn update_rule(&self, rule: &Rule) -> Result<bool> {
        let previous = self.store.get_rule(rule.id)?;
        let updated = self.store.update_rule(rule)?;

        if let Some(previous) = previous {
            self.cache.invalidate(previous.rule_type);
        }
        self.cache.invalidate(rule.rule_type);
        Ok(updated)
    }

    /// Delete a rule by id; false if it does not exist
    pub fn delete_rule(&self, id: i64) -> Result<bool> {
        let Some(rule) = self.store.get_rule(id)? else {
            return Ok(false);
        };

        let deleted = self.store.delete_rule(id)?;
        self.cache.invalidate(rule.rule_type);
        Ok(deleted)
    }

    pub fn update_rule_priority(&self, id: i64, priority: i32) -> Result<bool> {
        let Some(mut rule) = self.store.get_rule(id)? else {
            return Ok(false);
        };
        rule.update_priority(priority);
        self.update_rule(&rule)
    }

    pub fn set_rule_active(&self, id: i64, active: bool) -> Result<bool> {
        let Some(mut rule) = self.store.get_rule(id)? else {
            return Ok(false);
        };
        if active {
            rule.activate();
        } else {
            rule.deactivate();
        }
        self.update_rule(&rule)
    }

    /// Drop all cached rules (after out-of-band store changes)
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    // ========== Audit ==========

    /// Report active rules sharing a condition but disagreeing on the target
    ///
    /// Each conflicting rule is paired with its group's highest-priority rule.
    /// Nothing is changed; priority order already decides the runtime winner.
    pub fn resolve_conflicts(&self, rule_type: RuleType) -> Result<Vec<RuleConflict>> {
        let rules = self.store.get_active_rules_by_type(rule_type)?;

        // Group by condition, keeping first-seen group order
        let mut groups: Vec<((ConditionType, &str), Vec<&Rule>)> = Vec::new();
        for rule in rules.iter() {
            let key = (rule.condition_type, rule.condition_value.as_str());
            match groups.iter_mut().find(|(k, _)| *k == key) {
                Some((_, group)) => group.push(rule),
                None => groups.push((key, vec![rule])),
            }
        }

        let mut conflicts = Vec::new();
        for (_, group) in groups {
            // Rules arrive priority DESC, so the first is the highest
            let Some((highest, rest)) = group.split_first() else {
                continue;
            };
            for rule in rest {
                if rule.target_value != highest.target_value {
                    conflicts.push(RuleConflict {
                        higher: (*highest).clone(),
                        lower: (*rule).clone(),
                    });
                }
            }
        }

        if !conflicts.is_empty() {
            warn!(rule_type = %rule_type, count = conflicts.len(), "Rule conflicts detected");
        }
        Ok(conflicts)
    }

    /// Counts over the active rules of one type
    pub fn get_rule_stats(&self, rule_type: RuleType) -> Result<RuleStats> {
        let rules = self.store.get_active_rules_by_type(rule_type)?;

        let mut stats = RuleStats {
            total_rules: rules.len(),
            ..Default::default()
        };
        for rule in &rules {
            *stats.condition_counts.entry(rule.condition_type).or_insert(0) += 1;
            *stats.creator_counts.entry(rule.created_by).or_insert(0) += 1;
            *stats
                .target_counts
                .entry(rule.target_value.clone())
                .or_insert(0) += 1;
        }

        let min = rules.iter().map(|r| r.priority).min().unwrap_or(0);
        let max = rules.iter().map(|r| r.priority).max().unwrap_or(0);
        stats.priority_range = (min, max);

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::test_utils::tx;

    fn contains(value: &str, target: &str, priority: i32) -> NewRule {
        NewRule::new(
            format!("{}-{}", target, value),
            RuleType::Category,
            ConditionType::Contains,
            value,
            target,
        )
        .priority(priority)
    }

    #[test]
    fn test_priority_order() {
        let db = Database::in_memory().unwrap();
        let engine = RuleEngine::new(&db);

        engine.add_rule(contains("식당", "식비", 100)).unwrap();
        engine.add_rule(contains("카페", "식비", 90)).unwrap();
        engine.add_rule(contains("스타벅스", "카페", 50)).unwrap();

        let result = engine
            .apply_rules(&tx("스타벅스 카페", 5000.0), RuleType::Category)
            .unwrap();
        assert_eq!(result.as_deref(), Some("식비"));
    }

    #[test]
    fn test_higher_priority_wins_regardless_of_insert_order() {
        let db = Database::in_memory().unwrap();
        let engine = RuleEngine::new(&db);

        engine.add_rule(contains("커피", "카페", 50)).unwrap();
        engine.add_rule(contains("커피", "식비", 100)).unwrap();

        let result = engine
            .apply_rules(&tx("동네 커피", 3000.0), RuleType::Category)
            .unwrap();
        assert_eq!(result.as_deref(), Some("식비"));
    }

    #[test]
    fn test_equal_priority_uses_insertion_order() {
        let db = Database::in_memory().unwrap();
        let engine = RuleEngine::new(&db);

        engine.add_rule(contains("마트", "생활용품", 10)).unwrap();
        engine.add_rule(contains("이마트", "식료품", 10)).unwrap();

        let result = engine
            .apply_rules(&tx("이마트 성수점", 42000.0), RuleType::Category)
            .unwrap();
        assert_eq!(result.as_deref(), Some("생활용품"));
    }

    #[test]
    fn test_no_match_returns_none() {
        let db = Database::in_memory().unwrap();
        let engine = RuleEngine::new(&db);
        engine.add_rule(contains("식당", "식비", 10)).unwrap();

        let result = engine
            .apply_rules(&tx("주유소", 60000.0), RuleType::Category)
            .unwrap();
        assert_eq!(result, None);

        // Other rule types are independent
        let result = engine
            .apply_rules(&tx("식당", 10000.0), RuleType::PaymentMethod)
            .unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn test_contains_and_equals_are_case_insensitive() {
        let db = Database::in_memory().unwrap();
        let engine = RuleEngine::new(&db);

        engine
            .add_rule(NewRule::new(
                "atm",
                RuleType::PaymentMethod,
                ConditionType::Contains,
                "atm",
                "ATM출금",
            ))
            .unwrap();
        engine
            .add_rule(NewRule::new(
                "netflix",
                RuleType::Category,
                ConditionType::Equals,
                "Netflix",
                "구독",
            ))
            .unwrap();

        assert_eq!(
            engine
                .apply_rules(&tx("신한 ATM 출금", 100000.0), RuleType::PaymentMethod)
                .unwrap()
                .as_deref(),
            Some("ATM출금")
        );
        assert_eq!(
            engine
                .apply_rules(&tx("NETFLIX", 17000.0), RuleType::Category)
                .unwrap()
                .as_deref(),
            Some("구독")
        );
        assert_eq!(
            engine
                .apply_rules(&tx("NETFLIX KOREA", 17000.0), RuleType::Category)
                .unwrap(),
            None
        );
    }

    #[test]
    fn test_regex_condition() {
        let db = Database::in_memory().unwrap();
        let engine = RuleEngine::new(&db);

        engine
            .add_rule(NewRule::new(
                "gs",
                RuleType::Category,
                ConditionType::Regex,
                r"^gs\d+",
                "편의점",
            ))
            .unwrap();

        assert_eq!(
            engine
                .apply_rules(&tx("GS25 역삼점", 3200.0), RuleType::Category)
                .unwrap()
                .as_deref(),
            Some("편의점")
        );
        assert_eq!(
            engine
                .apply_rules(&tx("역삼 GS25", 3200.0), RuleType::Category)
                .unwrap(),
            None
        );
    }

    #[test]
    fn test_regex_cache_pruned_on_mutation() {
        let db = Database::in_memory().unwrap();
        let engine = RuleEngine::new(&db);

        let rule = engine
            .add_rule(NewRule::new(
                "gs",
                RuleType::Category,
                ConditionType::Regex,
                r"^gs\d+",
                "편의점",
            ))
            .unwrap();
        engine
            .apply_rules(&tx("GS25 역삼점", 3200.0), RuleType::Category)
            .unwrap();
        assert!(engine.cache().regexes.borrow().contains_key(r"^gs\d+"));

        assert!(engine.delete_rule(rule.id).unwrap());
        assert!(engine.cache().regexes.borrow().is_empty());
        assert_eq!(
            engine
                .apply_rules(&tx("GS25 역삼점", 3200.0), RuleType::Category)
                .unwrap(),
            None
        );
    }

    #[test]
    fn test_malformed_regex_is_no_match() {
        let db = Database::in_memory().unwrap();
        let engine = RuleEngine::new(&db);

        engine
            .add_rule(
                NewRule::new("bad", RuleType::Category, ConditionType::Regex, "([", "깨짐")
                    .priority(100),
            )
            .unwrap();
        engine.add_rule(contains("식당", "식비", 10)).unwrap();

        let result = engine
            .apply_rules(&tx("김밥 식당", 8000.0), RuleType::Category)
            .unwrap();
        assert_eq!(result.as_deref(), Some("식비"));
    }

    #[test]
    fn test_amount_range_condition() {
        let db = Database::in_memory().unwrap();
        let engine = RuleEngine::new(&db);

        engine
            .add_rule(NewRule::new(
                "big",
                RuleType::Category,
                ConditionType::AmountRange,
                "100000:1000000",
                "고액지출",
            ))
            .unwrap();

        let classify = |amount: f64| {
            engine
                .apply_rules(&tx("아무개", amount), RuleType::Category)
                .unwrap()
        };
        assert_eq!(classify(100000.0).as_deref(), Some("고액지출"));
        assert_eq!(classify(1000000.0).as_deref(), Some("고액지출"));
        assert_eq!(classify(99999.0), None);
        assert_eq!(classify(1000001.0), None);
    }

    #[test]
    fn test_parse_amount_range() {
        assert_eq!(parse_amount_range("10:20"), Some((10.0, 20.0)));
        assert_eq!(parse_amount_range(" 0.5 : 1.5 "), Some((0.5, 1.5)));
        assert_eq!(parse_amount_range("10"), None);
        assert_eq!(parse_amount_range("1:2:3"), None);
        assert_eq!(parse_amount_range("a:b"), None);
        assert_eq!(parse_amount_range("NaN:10"), None);
    }

    #[test]
    fn test_malformed_amount_range_is_no_match() {
        let db = Database::in_memory().unwrap();
        let engine = RuleEngine::new(&db);
        engine
            .add_rule(NewRule::new(
                "bad range",
                RuleType::Category,
                ConditionType::AmountRange,
                "lots",
                "고액지출",
            ))
            .unwrap();

        let result = engine
            .apply_rules(&tx("아무개", 500.0), RuleType::Category)
            .unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn test_batch_omits_unmatched() {
        let db = Database::in_memory().unwrap();
        let engine = RuleEngine::new(&db);
        engine.add_rule(contains("카페", "식비", 10)).unwrap();

        let mut a = tx("블루보틀 카페", 6000.0);
        a.transaction_id = "a".into();
        let mut b = tx("주유소", 50000.0);
        b.transaction_id = "b".into();

        let results = engine
            .apply_rules_batch(&[a, b], RuleType::Category)
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results.get("a").map(String::as_str), Some("식비"));
        assert!(!results.contains_key("b"));
    }

    #[test]
    fn test_cache_coherence_after_add() {
        let db = Database::in_memory().unwrap();
        let engine = RuleEngine::new(&db);
        let t = tx("편의점 결제", 4500.0);

        assert_eq!(engine.apply_rules(&t, RuleType::Category).unwrap(), None);
        assert!(engine.cache().is_cached(RuleType::Category));

        engine.add_rule(contains("편의점", "생활", 10)).unwrap();
        assert!(!engine.cache().is_cached(RuleType::Category));
        assert_eq!(
            engine
                .apply_rules(&t, RuleType::Category)
                .unwrap()
                .as_deref(),
            Some("생활")
        );
    }

    #[test]
    fn test_cache_coherence_after_update_and_delete() {
        let db = Database::in_memory().unwrap();
        let engine = RuleEngine::new(&db);
        let t = tx("동네 커피", 3000.0);

        let low = engine.add_rule(contains("커피", "카페", 50)).unwrap();
        let high = engine.add_rule(contains("동네", "생활", 60)).unwrap();
        assert_eq!(
            engine.apply_rules(&t, RuleType::Category).unwrap().as_deref(),
            Some("생활")
        );

        assert!(engine.update_rule_priority(low.id, 70).unwrap());
        assert_eq!(
            engine.apply_rules(&t, RuleType::Category).unwrap().as_deref(),
            Some("카페")
        );

        assert!(engine.set_rule_active(low.id, false).unwrap());
        assert_eq!(
            engine.apply_rules(&t, RuleType::Category).unwrap().as_deref(),
            Some("생활")
        );

        assert!(engine.delete_rule(high.id).unwrap());
        assert_eq!(engine.apply_rules(&t, RuleType::Category).unwrap(), None);

        assert!(!engine.delete_rule(high.id).unwrap());
        assert!(!engine.update_rule_priority(9999, 1).unwrap());
    }

    #[test]
    fn test_out_of_band_change_needs_clear_cache() {
        let db = Database::in_memory().unwrap();
        let engine = RuleEngine::new(&db);
        let t = tx("헬스장 월회비", 50000.0);

        assert_eq!(engine.apply_rules(&t, RuleType::Category).unwrap(), None);

        db.create_rule(&contains("헬스장", "운동", 10)).unwrap();
        assert_eq!(engine.apply_rules(&t, RuleType::Category).unwrap(), None);

        engine.clear_cache();
        assert_eq!(
            engine.apply_rules(&t, RuleType::Category).unwrap().as_deref(),
            Some("운동")
        );
    }

    #[test]
    fn test_add_rule_rejects_duplicate() {
        let db = Database::in_memory().unwrap();
        let engine = RuleEngine::new(&db);

        engine.add_rule(contains("커피", "식비", 10)).unwrap();
        let result = engine.add_rule(contains("커피", "식비", 99));
        assert!(matches!(result, Err(Error::DuplicateRule(_))));

        // Same condition, different target is a conflict, not a duplicate
        assert!(engine.add_rule(contains("커피", "카페", 5)).is_ok());
    }

    #[test]
    fn test_resolve_conflicts() {
        let db = Database::in_memory().unwrap();
        let engine = RuleEngine::new(&db);

        let high = engine.add_rule(contains("커피", "식비", 100)).unwrap();
        let low = engine.add_rule(contains("커피", "카페", 50)).unwrap();
        engine.add_rule(contains("식당", "식비", 100)).unwrap();

        let conflicts = engine.resolve_conflicts(RuleType::Category).unwrap();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].higher.id, high.id);
        assert_eq!(conflicts[0].lower.id, low.id);
    }

    #[test]
    fn test_resolve_conflicts_skips_same_target_and_inactive() {
        let db = Database::in_memory().unwrap();
        let engine = RuleEngine::new(&db);

        engine.add_rule(contains("커피", "식비", 100)).unwrap();
        engine
            .add_rule(
                NewRule::new("regex", RuleType::Category, ConditionType::Regex, "커피", "카페")
                    .priority(90),
            )
            .unwrap();
        let inactive = engine.add_rule(contains("커피", "음료", 80)).unwrap();
        engine.set_rule_active(inactive.id, false).unwrap();

        // Different condition types never conflict; inactive rules are ignored
        assert!(engine
            .resolve_conflicts(RuleType::Category)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_rule_stats() {
        let db = Database::in_memory().unwrap();
        let engine = RuleEngine::new(&db);

        let empty = engine.get_rule_stats(RuleType::Category).unwrap();
        assert_eq!(empty.total_rules, 0);
        assert_eq!(empty.priority_range, (0, 0));

        engine.add_rule(contains("식당", "식비", 10)).unwrap();
        engine
            .add_rule(contains("카페", "식비", 30).created_by(RuleCreator::Learned))
            .unwrap();
        engine
            .add_rule(NewRule::new(
                "big",
                RuleType::Category,
                ConditionType::AmountRange,
                "100000:200000",
                "고액지출",
            ))
            .unwrap();

        let stats = engine.get_rule_stats(RuleType::Category).unwrap();
        assert_eq!(stats.total_rules, 3);
        assert_eq!(stats.condition_counts.get(&ConditionType::Contains), Some(&2));
        assert_eq!(stats.condition_counts.get(&ConditionType::AmountRange), Some(&1));
        assert_eq!(stats.creator_counts.get(&RuleCreator::User), Some(&2));
        assert_eq!(stats.creator_counts.get(&RuleCreator::Learned), Some(&1));
        assert_eq!(stats.priority_range, (0, 30));
        assert_eq!(stats.target_counts.get("식비"), Some(&2));
    }

    #[test]
    fn test_matching_rules_lists_all_in_order() {
        let db = Database::in_memory().unwrap();
        let engine = RuleEngine::new(&db);

        engine.add_rule(contains("카페", "식비", 10)).unwrap();
        engine.add_rule(contains("스타벅스", "카페", 50)).unwrap();

        let matched = engine
            .matching_rules(&tx("스타벅스 카페", 5000.0), RuleType::Category)
            .unwrap();
        let targets: Vec<&str> = matched.iter().map(|r| r.target_value.as_str()).collect();
        assert_eq!(targets, vec!["카페", "식비"]);
    }
}

use super::*;
use crate::db::Database;
use crate::models::{NewTransaction, Rule};
use crate::store::{RuleFilter, RuleStore};
use crate::test_utils::{insert_all, new_tx, tx};

fn setup() -> Database {
    Database::in_memory().unwrap()
}

fn pattern(db: &Database, key: &str, value: &str) -> LearningPattern {
    db.find_pattern(RuleType::Category, key, value)
        .unwrap()
        .unwrap_or_else(|| panic!("pattern {} -> {} exists", key, value))
}

fn learned_rules(db: &Database) -> Vec<Rule> {
    db.list_rules(&RuleFilter::new().created_by(RuleCreator::Learned))
        .unwrap()
}

fn categorized(description: &str, category: &str, today: NaiveDate, days_ago: i64) -> NewTransaction {
    let mut t = new_tx(description, 10000.0, today, days_ago);
    t.category = Some(category.to_string());
    t
}

#[test]
fn test_blank_correction_is_a_no_op() {
    let db = setup();
    let rules = RuleEngine::new(&db);
    let engine = LearningEngine::new(&db, &rules);

    let learned = engine
        .learn_from_correction(&tx("스타벅스 라떼", 5000.0), "category", None, "  ")
        .unwrap();
    assert!(!learned);
    assert_eq!(engine.counters(), LearningCounters::default());
    assert_eq!(db.count_patterns().unwrap(), 0);
    assert_eq!(db.count_rules().unwrap(), 0);
}

#[test]
fn test_unknown_field_counts_but_learns_nothing() {
    let db = setup();
    let rules = RuleEngine::new(&db);
    let engine = LearningEngine::new(&db, &rules);

    let learned = engine
        .learn_from_correction(&tx("스타벅스 라떼", 5000.0), "memo", None, "커피")
        .unwrap();
    assert!(!learned);
    assert_eq!(engine.counters().corrections_processed, 1);
    assert_eq!(db.count_patterns().unwrap(), 0);
}

#[test]
fn test_description_without_keywords() {
    let db = setup();
    let rules = RuleEngine::new(&db);
    let engine = LearningEngine::new(&db, &rules);

    let learned = engine
        .learn_from_correction(&tx("1234 5678", 5000.0), "category", None, "식비")
        .unwrap();
    assert!(!learned);
    assert_eq!(db.count_patterns().unwrap(), 0);
}

#[test]
fn test_learning_without_transaction_store() {
    let db = setup();
    let rules = RuleEngine::new(&db);
    let engine = LearningEngine::new(&db, &rules);

    let learned = engine
        .learn_from_correction(
            &tx("스타벅스 아메리카노", 4500.0),
            "category",
            Some("기타"),
            "식비",
        )
        .unwrap();
    assert!(learned);

    // Merchant and keyword share the key 스타벅스; the merchant candidate wins
    let merchant = pattern(&db, "스타벅스", "식비");
    assert_eq!(merchant.pattern_name, "상점-스타벅스-식비");
    assert_eq!(merchant.confidence, Confidence::Medium);
    assert_eq!(merchant.occurrence_count, 1);
    assert_eq!(merchant.status, PatternStatus::Pending);

    let keyword = pattern(&db, "아메리카노", "식비");
    assert_eq!(keyword.pattern_name, "키워드-아메리카노-식비");
    assert_eq!(keyword.confidence, Confidence::Low);
    assert_eq!(
        keyword.metadata.source_description.as_deref(),
        Some("스타벅스 아메리카노")
    );

    // Fallback rule from the longest keyword
    let rules = learned_rules(&db);
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].name, "학습-식비-아메리카노");
    assert_eq!(rules[0].condition_value, "아메리카노");
    assert_eq!(rules[0].priority, 20);

    let counters = engine.counters();
    assert_eq!(counters.corrections_processed, 1);
    assert_eq!(counters.patterns_extracted, 2);
    assert_eq!(counters.rules_generated, 1);
}

#[test]
fn test_repeated_corrections_escalate_and_auto_promote() {
    let db = setup();
    let rules = RuleEngine::new(&db);
    let engine = LearningEngine::new(&db, &rules);
    let coffee = tx("스타벅스 아메리카노", 4500.0);

    for _ in 0..4 {
        engine
            .learn_from_correction(&coffee, "category", None, "식비")
            .unwrap();
    }
    let keyword = pattern(&db, "아메리카노", "식비");
    assert_eq!(keyword.occurrence_count, 4);
    assert_eq!(keyword.confidence, Confidence::Medium);
    assert_eq!(learned_rules(&db).len(), 1);

    engine
        .learn_from_correction(&coffee, "category", None, "식비")
        .unwrap();

    let merchant = pattern(&db, "스타벅스", "식비");
    assert_eq!(merchant.occurrence_count, 5);
    assert_eq!(merchant.confidence, Confidence::High);
    assert_eq!(merchant.status, PatternStatus::Applied);

    // 아메리카노 already has the fallback rule, so its pattern stays pending
    assert_eq!(pattern(&db, "아메리카노", "식비").status, PatternStatus::Pending);

    let rules = learned_rules(&db);
    assert_eq!(rules.len(), 2);
    let promoted = rules
        .iter()
        .find(|r| r.name == "자동-식비-스타벅스")
        .expect("auto-promoted rule");
    // high 25 + 5 occurrences 3 + merchant 3 + recent 2
    assert_eq!(promoted.priority, 33);
    assert_eq!(engine.counters().patterns_applied, 1);
}

#[test]
fn test_common_keywords_from_similar_transactions() {
    let db = setup();
    let today = Utc::now().date_naive();
    let stored = insert_all(
        &db,
        &[
            new_tx("스타벅스 라떼", 5000.0, today, 1),
            new_tx("스타벅스 라떼", 5000.0, today, 2),
            new_tx("스타벅스 라떼", 5200.0, today, 3),
            new_tx("스타벅스 라떼", 5000.0, today, 0),
            new_tx("택시 출근", 12000.0, today, 0),
        ],
    );
    let rules = RuleEngine::new(&db);
    let engine = LearningEngine::new(&db, &rules).with_transactions(&db);
    let corrected = &stored[3];

    assert!(engine
        .learn_from_correction(corrected, "category", None, "식비")
        .unwrap());

    let merchant = pattern(&db, "스타벅스", "식비");
    assert_eq!(merchant.pattern_name, "공통-스타벅스-식비");
    assert_eq!(merchant.confidence, Confidence::High);
    assert_eq!(merchant.metadata.similar_count, Some(3));
    assert_eq!(pattern(&db, "라떼", "식비").confidence, Confidence::High);
    assert_eq!(db.count_patterns().unwrap(), 2);

    // No fallback rule when a transaction store is attached
    assert!(learned_rules(&db).is_empty());

    for _ in 0..2 {
        engine
            .learn_from_correction(corrected, "category", None, "식비")
            .unwrap();
    }

    let rules_created = learned_rules(&db);
    assert_eq!(rules_created.len(), 2);
    assert!(rules_created
        .iter()
        .all(|r| r.name.starts_with(AUTO_RULE_PREFIX) && r.priority == 31));

    let classified = rules
        .apply_rules(&tx("스타벅스 아이스티", 5500.0), RuleType::Category)
        .unwrap();
    assert_eq!(classified.as_deref(), Some("식비"));
}

#[test]
fn test_correcting_excluded_flag() {
    let db = setup();
    let rules = RuleEngine::new(&db);
    let engine = LearningEngine::new(&db, &rules);

    assert!(engine
        .learn_from_correction(&tx("내계좌 이체", 300000.0), "is_excluded", Some("false"), "true")
        .unwrap());

    let p = db
        .find_pattern(RuleType::Filter, "내계좌", "true")
        .unwrap()
        .unwrap();
    assert_eq!(p.pattern_type, RuleType::Filter);
}

#[test]
fn test_apply_patterns_to_rules() {
    let db = setup();
    let rules = RuleEngine::new(&db);
    let engine = LearningEngine::new(&db, &rules);
    let ride = tx("택시 출근", 12000.0);

    for _ in 0..2 {
        engine
            .learn_from_correction(&ride, "category", None, "교통비")
            .unwrap();
    }
    // Fallback picked the first of two equally long keywords
    assert_eq!(learned_rules(&db)[0].condition_value, "택시");

    assert_eq!(
        engine
            .apply_patterns_to_rules(RuleType::Category, Some(Confidence::High))
            .unwrap(),
        0
    );

    let created = engine
        .apply_patterns_to_rules(RuleType::Category, None)
        .unwrap();
    assert_eq!(created, 1);

    let promoted = learned_rules(&db)
        .into_iter()
        .find(|r| r.condition_value == "출근")
        .expect("promoted rule");
    assert_eq!(promoted.name, "학습-교통비-출근");
    assert_eq!(
        db.find_pattern(RuleType::Category, "출근", "교통비")
            .unwrap()
            .unwrap()
            .status,
        PatternStatus::Applied
    );

    // Promoting again creates nothing new
    assert_eq!(
        engine
            .apply_patterns_to_rules(RuleType::Category, None)
            .unwrap(),
        0
    );
    assert_eq!(learned_rules(&db).len(), 2);
}

#[test]
fn test_batch_learning() {
    let db = setup();
    let rules = RuleEngine::new(&db);
    let engine = LearningEngine::new(&db, &rules);

    let correction = |description: &str, value: &str| Correction {
        transaction: tx(description, 10000.0),
        field_name: "category".to_string(),
        previous_value: None,
        corrected_value: value.to_string(),
    };
    let corrections = vec![
        correction("스타벅스 라떼", "식비"),
        correction("택시 출근", "교통비"),
        correction("편의점 간식", ""),
    ];

    let result = engine.learn_from_corrections_batch(&corrections).unwrap();
    assert_eq!(result.total, 3);
    assert_eq!(result.success, 2);
    assert_eq!(result.failure, 1);
    assert_eq!(result.patterns_extracted, 4);
    assert_eq!(result.rules_generated, 2);

    // Deltas, not running totals
    let again = engine
        .learn_from_corrections_batch(&corrections[..1])
        .unwrap();
    assert_eq!(again.patterns_extracted, 2);
    assert_eq!(again.rules_generated, 0);
}

#[test]
fn test_detection_needs_transaction_store() {
    let db = setup();
    let rules = RuleEngine::new(&db);
    let engine = LearningEngine::new(&db, &rules);

    assert!(engine.detect_recurring_patterns(None).unwrap().is_empty());
    assert!(engine.detect_pattern_changes().unwrap().is_empty());
    assert!(engine.get_learning_stats().unwrap().pattern_changes.is_none());
}

#[test]
fn test_detect_recurring_within_window() {
    let db = setup();
    let today = Utc::now().date_naive();
    insert_all(
        &db,
        &[
            new_tx("월세 이체", 500000.0, today, 60),
            new_tx("월세 이체", 500000.0, today, 30),
            new_tx("월세 이체", 500000.0, today, 0),
            new_tx("편의점 간식", 3000.0, today, 5),
        ],
    );
    let rules = RuleEngine::new(&db);
    let engine = LearningEngine::new(&db, &rules).with_transactions(&db);

    let found = engine.detect_recurring_patterns(None).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].merchant, "월세");
    assert_eq!(found[0].interval_days, 30);
    assert_eq!(found[0].next_expected_date, today + chrono::Duration::days(30));

    // A 45 day window only sees two of the three charges
    assert!(engine.detect_recurring_patterns(Some(45)).unwrap().is_empty());
}

#[test]
fn test_detect_pattern_changes_between_windows() {
    let db = setup();
    let today = Utc::now().date_naive();
    let mut transactions: Vec<NewTransaction> = (0..5)
        .map(|i| categorized("필라테스 수업", "운동", today, i * 5))
        .collect();
    transactions.extend((0..3).map(|i| categorized("스타벅스 라떼", "식비", today, 40 + i * 10)));
    // Older than the previous window
    transactions.push(categorized("필라테스 수업", "운동", today, 120));
    insert_all(&db, &transactions);

    let rules = RuleEngine::new(&db);
    let engine = LearningEngine::new(&db, &rules).with_transactions(&db);

    let changes = engine.detect_pattern_changes().unwrap();
    assert_eq!(changes.len(), 2);
    assert_eq!(changes[0].kind, ChangeKind::NewCategory);
    assert_eq!(changes[0].value, "운동");
    assert_eq!(changes[1].kind, ChangeKind::NewMerchant);

    let stats = engine.get_learning_stats().unwrap();
    let summary = stats.pattern_changes.expect("change summary");
    assert_eq!(summary.total, 2);
    assert_eq!(summary.significant_changes, 2);
    assert_eq!(summary.top_changes.len(), 2);
}

#[test]
fn test_generate_dynamic_filters() {
    let db = setup();
    let rules = RuleEngine::new(&db);
    let engine = LearningEngine::new(&db, &rules);
    let coffee = tx("스타벅스 아메리카노", 4500.0);

    assert!(engine.generate_dynamic_filters().unwrap().is_empty());

    for _ in 0..5 {
        engine
            .learn_from_correction(&coffee, "category", None, "식비")
            .unwrap();
    }

    let filters = engine.generate_dynamic_filters().unwrap();
    assert_eq!(filters.len(), 1);
    assert_eq!(filters[0].name, "자동-식비");
    assert_eq!(filters[0].pattern_type, RuleType::Category);
    assert_eq!(filters[0].conditions[0].values, vec!["스타벅스"]);
    assert!(filters[0].matches_description("스타벅스 강남점"));
}

#[test]
fn test_stats_and_reset() {
    let db = setup();
    let rules = RuleEngine::new(&db);
    let engine = LearningEngine::new(&db, &rules);

    engine
        .learn_from_correction(&tx("스타벅스 라떼", 5000.0), "category", None, "식비")
        .unwrap();
    engine
        .learn_from_correction(&tx("토스페이 결제", 5000.0), "payment_method", None, "간편결제")
        .unwrap();

    let stats = engine.get_learning_stats().unwrap();
    assert_eq!(stats.counters.corrections_processed, 2);
    assert_eq!(stats.patterns[&RuleType::Category].total, 2);
    assert_eq!(stats.patterns[&RuleType::PaymentMethod].total, 2);
    assert_eq!(stats.patterns[&RuleType::Filter].total, 0);

    let json = serde_json::to_value(&stats).unwrap();
    assert_eq!(json["corrections_processed"], 2);

    engine.reset_stats();
    assert_eq!(engine.counters(), LearningCounters::default());
    // Stored patterns survive a counter reset
    assert_eq!(db.count_patterns().unwrap(), 4);
}

#[test]
fn test_pinned_clock_sets_last_seen() {
    let db = setup();
    let rules = RuleEngine::new(&db);
    let pinned = chrono::NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_opt(9, 0, 0)
        .unwrap()
        .and_utc();
    let engine = LearningEngine::new(&db, &rules).as_of(pinned);

    engine
        .learn_from_correction(&tx("스타벅스 라떼", 5000.0), "category", None, "식비")
        .unwrap();
    assert_eq!(pattern(&db, "스타벅스", "식비").last_seen, pinned);
}

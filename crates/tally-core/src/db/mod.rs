//! Database access layer with connection pooling and migrations
//!
//! This module is organized by domain:
//! - `rules` - Classification rule store
//! - `patterns` - Learning pattern store (upsert-by-key)
//! - `transactions` - Transaction store and manual entry
//! - `transaction_filter` - SQL builder for transaction queries

use std::str::FromStr;

use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use tracing::info;

use crate::error::Result;
use crate::models::{ConditionType, RuleCreator, RuleType};

mod patterns;
mod rules;
mod transaction_filter;
mod transactions;

pub use transaction_filter::{FilterResult, TransactionFilter};
pub use transactions::parse_excluded_flag;


pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// SQLite datetime format used for every timestamp column
pub(crate) const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parse a SQLite datetime string into a DateTime<Utc>
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    // SQLite stores as "YYYY-MM-DD HH:MM:SS" format
    chrono::NaiveDateTime::parse_from_str(s, DATETIME_FORMAT)
        .map(|dt| dt.and_utc())
        .unwrap_or_else(|_| Utc::now())
}

pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.format(DATETIME_FORMAT).to_string()
}

/// Parse an enum column, surfacing unknown values as a conversion error
pub(crate) fn parse_column<T>(idx: usize, value: &str) -> rusqlite::Result<T>
where
    T: FromStr<Err = String>,
{
    value.parse().map_err(|e: String| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            Box::<dyn std::error::Error + Send + Sync>::from(e),
        )
    })
}

/// True if the error is a UNIQUE/CHECK constraint failure
pub(crate) fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

/// Default system rules: (rule type, keyword, target)
const DEFAULT_RULES: &[(RuleType, &str, &str)] = &[
    (RuleType::Category, "식당", "식비"),
    (RuleType::Category, "카페", "식비"),
    (RuleType::Category, "배달", "식비"),
    (RuleType::Category, "택시", "교통비"),
    (RuleType::Category, "교통", "교통비"),
    (RuleType::Category, "전기요금", "공과금"),
    (RuleType::Category, "수도요금", "공과금"),
    (RuleType::Category, "가스요금", "공과금"),
    (RuleType::Category, "쿠팡", "온라인쇼핑"),
    (RuleType::Category, "마켓컬리", "온라인쇼핑"),
    (RuleType::Category, "11번가", "온라인쇼핑"),
    (RuleType::Category, "병원", "의료비"),
    (RuleType::Category, "약국", "의료비"),
    (RuleType::PaymentMethod, "토스뱅크카드", "체크카드결제"),
    (RuleType::PaymentMethod, "체크카드", "체크카드결제"),
    (RuleType::PaymentMethod, "ATM", "ATM출금"),
    (RuleType::PaymentMethod, "현금인출", "ATM출금"),
    (RuleType::PaymentMethod, "토스페이", "토스페이"),
    (RuleType::PaymentMethod, "이체", "계좌이체"),
    (RuleType::PaymentMethod, "송금", "계좌이체"),
];

/// Priority given to seeded system rules
const DEFAULT_RULE_PRIORITY: i32 = 10;

/// Database wrapper with connection pooling
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    /// Path to the database file
    db_path: String,
}

impl Database {
    /// Open (or create) a database file and run migrations
    pub fn new(path: &str) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::builder().max_size(10).build(manager)?;

        let db = Self {
            pool,
            db_path: path.to_string(),
        };
        db.run_migrations()?;

        Ok(db)
    }

    /// Get the path to the database file
    pub fn path(&self) -> &str {
        &self.db_path
    }

    /// Create a throwaway database (for testing)
    ///
    /// Note: Uses a temporary file rather than `:memory:` because each pooled
    /// connection to `:memory:` would see its own empty database.
    pub fn in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "tally_test_{}_{}.db",
            std::process::id(),
            id
        ));

        // Remove any existing file
        let _ = std::fs::remove_file(&path);

        Self::new(&path.to_string_lossy())
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- WAL mode: readers don't block writers
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;

            -- Classification rules
            CREATE TABLE IF NOT EXISTS classification_rules (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                rule_type TEXT NOT NULL
                    CHECK (rule_type IN ('category', 'payment_method', 'filter')),
                condition_type TEXT NOT NULL
                    CHECK (condition_type IN ('contains', 'equals', 'regex', 'amount_range')),
                condition_value TEXT NOT NULL,
                target_value TEXT NOT NULL,
                priority INTEGER NOT NULL DEFAULT 0,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_by TEXT NOT NULL DEFAULT 'user'
                    CHECK (created_by IN ('user', 'system', 'learned')),
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            -- One rule per logical key
            CREATE UNIQUE INDEX IF NOT EXISTS idx_rules_key
                ON classification_rules(rule_type, condition_type, condition_value, target_value);
            CREATE INDEX IF NOT EXISTS idx_rules_active
                ON classification_rules(rule_type, is_active, priority DESC);

            -- Learning patterns
            CREATE TABLE IF NOT EXISTS learning_patterns (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                pattern_type TEXT NOT NULL
                    CHECK (pattern_type IN ('category', 'payment_method', 'filter')),
                pattern_name TEXT NOT NULL,
                pattern_key TEXT NOT NULL,
                pattern_value TEXT NOT NULL,
                confidence TEXT NOT NULL DEFAULT 'medium'
                    CHECK (confidence IN ('low', 'medium', 'high')),
                occurrence_count INTEGER NOT NULL DEFAULT 1 CHECK (occurrence_count >= 1),
                last_seen DATETIME NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending'
                    CHECK (status IN ('pending', 'applied', 'rejected')),
                metadata TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_patterns_key
                ON learning_patterns(pattern_type, pattern_key, pattern_value);
            CREATE INDEX IF NOT EXISTS idx_patterns_status
                ON learning_patterns(pattern_type, status);

            -- Transactions
            CREATE TABLE IF NOT EXISTS transactions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                transaction_id TEXT NOT NULL UNIQUE,
                date DATE NOT NULL,
                description TEXT NOT NULL,
                amount REAL NOT NULL,
                transaction_type TEXT NOT NULL DEFAULT 'expense'
                    CHECK (transaction_type IN ('expense', 'income')),
                category TEXT,
                payment_method TEXT,
                source TEXT NOT NULL,
                is_excluded INTEGER NOT NULL DEFAULT 0,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_transactions_date ON transactions(date);
            CREATE INDEX IF NOT EXISTS idx_transactions_source ON transactions(source);
            "#,
        )?;

        Ok(())
    }

    /// Seed the default system rules (idempotent - skips existing rules)
    ///
    /// Returns the number of rules inserted.
    pub fn seed_default_rules(&self) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let mut inserted = 0;
        for (rule_type, keyword, target) in DEFAULT_RULES {
            inserted += tx.execute(
                r#"
                INSERT OR IGNORE INTO classification_rules
                    (name, rule_type, condition_type, condition_value, target_value,
                     priority, is_active, created_by)
                VALUES (?, ?, ?, ?, ?, ?, 1, ?)
                "#,
                params![
                    format!("{}-{}", target, keyword),
                    rule_type.as_str(),
                    ConditionType::Contains.as_str(),
                    keyword,
                    target,
                    DEFAULT_RULE_PRIORITY,
                    RuleCreator::System.as_str(),
                ],
            )?;
        }

        tx.commit()?;

        if inserted > 0 {
            info!(inserted, "Seeded default classification rules");
        }
        Ok(inserted)
    }

    pub fn count_rules(&self) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row("SELECT COUNT(*) FROM classification_rules", [], |row| {
            row.get(0)
        })?;
        Ok(count)
    }

    pub fn count_patterns(&self) -> Result<i64> {
        let conn = self.conn()?;
        let count =
            conn.query_row("SELECT COUNT(*) FROM learning_patterns", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn count_transactions(&self) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row("SELECT COUNT(*) FROM transactions", [], |row| row.get(0))?;
        Ok(count)
    }
}

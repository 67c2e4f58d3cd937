//! Transaction operations

use rusqlite::{params, OptionalExtension};
use tracing::{debug, info};

use super::{parse_column, parse_datetime, Database, TransactionFilter};
use crate::error::{Error, Result};
use crate::models::*;
use crate::store::{TransactionQuery, TransactionStore};

const TRANSACTION_COLUMNS: &str = "t.id, t.transaction_id, t.date, t.description, t.amount, \
     t.transaction_type, t.category, t.payment_method, t.source, t.is_excluded, t.created_at";

/// Parse an `is_excluded` correction value
pub fn parse_excluded_flag(value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "y" => Ok(true),
        "false" | "0" | "no" | "n" => Ok(false),
        other => Err(Error::InvalidData(format!(
            "Expected a boolean for is_excluded, got '{}'",
            other
        ))),
    }
}

impl Database {
    pub(crate) fn row_to_transaction(row: &rusqlite::Row) -> rusqlite::Result<Transaction> {
        let date_str: String = row.get(2)?;
        let transaction_type: String = row.get(5)?;
        let excluded: i64 = row.get(9)?;
        let created_at: String = row.get(10)?;
        Ok(Transaction {
            id: row.get(0)?,
            transaction_id: row.get(1)?,
            date: chrono::NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").unwrap_or_default(),
            description: row.get(3)?,
            amount: row.get(4)?,
            transaction_type: parse_column(5, &transaction_type)?,
            category: row.get(6)?,
            payment_method: row.get(7)?,
            source: row.get(8)?,
            is_excluded: excluded != 0,
            created_at: parse_datetime(&created_at),
        })
    }

    /// Insert a transaction
    ///
    /// Returns `None` if a transaction with the same external id already exists.
    pub fn insert_transaction(&self, tx: &NewTransaction) -> Result<Option<i64>> {
        if tx.transaction_id.trim().is_empty() {
            return Err(Error::InvalidData("transaction_id must not be empty".into()));
        }

        let conn = self.conn()?;
        let inserted = conn.execute(
            r#"
            INSERT OR IGNORE INTO transactions
                (transaction_id, date, description, amount, transaction_type,
                 category, payment_method, source)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                tx.transaction_id,
                tx.date.to_string(),
                tx.description,
                tx.amount,
                tx.transaction_type.as_str(),
                tx.category,
                tx.payment_method,
                tx.source,
            ],
        )?;

        if inserted == 0 {
            debug!(transaction_id = %tx.transaction_id, "Skipped duplicate transaction");
            return Ok(None);
        }
        Ok(Some(conn.last_insert_rowid()))
    }

    /// Get a single transaction by ID
    pub fn get_transaction(&self, id: i64) -> Result<Option<Transaction>> {
        let conn = self.conn()?;
        let tx = conn
            .query_row(
                &format!("SELECT {} FROM transactions t WHERE t.id = ?", TRANSACTION_COLUMNS),
                params![id],
                Self::row_to_transaction,
            )
            .optional()?;
        Ok(tx)
    }

    /// Get a single transaction by its external id
    pub fn get_transaction_by_external_id(
        &self,
        transaction_id: &str,
    ) -> Result<Option<Transaction>> {
        let conn = self.conn()?;
        let tx = conn
            .query_row(
                &format!(
                    "SELECT {} FROM transactions t WHERE t.transaction_id = ?",
                    TRANSACTION_COLUMNS
                ),
                params![transaction_id],
                Self::row_to_transaction,
            )
            .optional()?;
        Ok(tx)
    }

    /// Set the classified field a rule type controls
    ///
    /// `Filter` sets `is_excluded` from a boolean-like value.
    pub fn update_transaction_field(
        &self,
        id: i64,
        field: RuleType,
        value: &str,
    ) -> Result<bool> {
        let conn = self.conn()?;
        let updated = match field {
            RuleType::Category => conn.execute(
                "UPDATE transactions SET category = ? WHERE id = ?",
                params![value, id],
            )?,
            RuleType::PaymentMethod => conn.execute(
                "UPDATE transactions SET payment_method = ? WHERE id = ?",
                params![value, id],
            )?,
            RuleType::Filter => conn.execute(
                "UPDATE transactions SET is_excluded = ? WHERE id = ?",
                params![parse_excluded_flag(value)?, id],
            )?,
        };

        if updated > 0 {
            info!(id, field = %field, value, "Updated transaction");
        }
        Ok(updated > 0)
    }

    /// Count transactions matching a query (ignores order and limit)
    pub fn count_matching_transactions(&self, query: &TransactionQuery) -> Result<i64> {
        query.validate()?;
        let filter = TransactionFilter::from_query(query).build();

        let conn = self.conn()?;
        let count = conn.query_row(
            &filter.build_count_query(),
            filter.params_refs().as_slice(),
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

impl TransactionStore for Database {
    fn list_transactions(&self, query: &TransactionQuery) -> Result<Vec<Transaction>> {
        query.validate()?;
        let filter = TransactionFilter::from_query(query).build();

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&filter.build_select_query(TRANSACTION_COLUMNS))?;
        let transactions = stmt
            .query_map(filter.params_refs().as_slice(), Self::row_to_transaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(transactions)
    }
}

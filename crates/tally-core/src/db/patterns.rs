//! Learning pattern operations

use rusqlite::{params, OptionalExtension};
use tracing::debug;

use super::transaction_filter::escape_like;
use super::{format_datetime, parse_column, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::*;
use crate::store::{PatternFilter, PatternStats, PatternStore};

const PATTERN_COLUMNS: &str = "id, pattern_type, pattern_name, pattern_key, pattern_value, \
                               confidence, occurrence_count, last_seen, status, metadata";

impl Database {
    fn row_to_pattern(row: &rusqlite::Row) -> rusqlite::Result<LearningPattern> {
        let pattern_type: String = row.get(1)?;
        let confidence: String = row.get(5)?;
        let last_seen: String = row.get(7)?;
        let status: String = row.get(8)?;
        let metadata: Option<String> = row.get(9)?;
        Ok(LearningPattern {
            id: row.get(0)?,
            pattern_type: parse_column(1, &pattern_type)?,
            pattern_name: row.get(2)?,
            pattern_key: row.get(3)?,
            pattern_value: row.get(4)?,
            confidence: parse_column(5, &confidence)?,
            occurrence_count: row.get(6)?,
            last_seen: parse_datetime(&last_seen),
            status: parse_column(8, &status)?,
            metadata: metadata
                .and_then(|m| serde_json::from_str(&m).ok())
                .unwrap_or_default(),
        })
    }

    /// Pattern counts grouped by one column
    fn count_patterns_by(
        &self,
        column: &str,
        pattern_type: Option<PatternType>,
    ) -> Result<Vec<(String, usize)>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {col}, COUNT(*) FROM learning_patterns \
             WHERE (?1 IS NULL OR pattern_type = ?1) GROUP BY {col}",
            col = column
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![pattern_type.map(|t| t.as_str())], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

impl PatternStore for Database {
    fn upsert_pattern(&self, pattern: &NewLearningPattern) -> Result<LearningPattern> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let select_by_key = format!(
            "SELECT {} FROM learning_patterns \
             WHERE pattern_type = ? AND pattern_key = ? AND pattern_value = ?",
            PATTERN_COLUMNS
        );
        let existing = tx
            .query_row(
                &select_by_key,
                params![
                    pattern.pattern_type.as_str(),
                    pattern.pattern_key,
                    pattern.pattern_value
                ],
                Self::row_to_pattern,
            )
            .optional()?;

        let id = match existing {
            Some(mut found) => {
                found.record_occurrence(pattern.last_seen);
                tx.execute(
                    r#"
                    UPDATE learning_patterns
                    SET occurrence_count = ?, last_seen = ?, confidence = ?
                    WHERE id = ?
                    "#,
                    params![
                        found.occurrence_count,
                        format_datetime(&found.last_seen),
                        found.confidence.as_str(),
                        found.id,
                    ],
                )?;
                debug!(
                    id = found.id,
                    name = %found.pattern_name,
                    count = found.occurrence_count,
                    confidence = %found.confidence,
                    "Pattern observed again"
                );
                found.id
            }
            None => {
                tx.execute(
                    r#"
                    INSERT INTO learning_patterns
                        (pattern_type, pattern_name, pattern_key, pattern_value,
                         confidence, occurrence_count, last_seen, status, metadata)
                    VALUES (?, ?, ?, ?, ?, 1, ?, 'pending', ?)
                    "#,
                    params![
                        pattern.pattern_type.as_str(),
                        pattern.pattern_name,
                        pattern.pattern_key,
                        pattern.pattern_value,
                        pattern.confidence.as_str(),
                        format_datetime(&pattern.last_seen),
                        serde_json::to_string(&pattern.metadata)?,
                    ],
                )?;
                let id = tx.last_insert_rowid();
                debug!(id, name = %pattern.pattern_name, "New pattern");
                id
            }
        };

        let saved = tx.query_row(
            &format!("SELECT {} FROM learning_patterns WHERE id = ?", PATTERN_COLUMNS),
            params![id],
            Self::row_to_pattern,
        )?;
        tx.commit()?;

        Ok(saved)
    }

    fn update_pattern(&self, pattern: &LearningPattern) -> Result<bool> {
        let conn = self.conn()?;
        let updated = conn.execute(
            r#"
            UPDATE learning_patterns
            SET pattern_name = ?, confidence = ?, occurrence_count = ?, last_seen = ?,
                status = ?, metadata = ?
            WHERE id = ?
            "#,
            params![
                pattern.pattern_name,
                pattern.confidence.as_str(),
                pattern.occurrence_count,
                format_datetime(&pattern.last_seen),
                pattern.status.as_str(),
                serde_json::to_string(&pattern.metadata)?,
                pattern.id,
            ],
        )?;
        Ok(updated > 0)
    }

    fn get_pattern(&self, id: i64) -> Result<Option<LearningPattern>> {
        let conn = self.conn()?;
        let pattern = conn
            .query_row(
                &format!("SELECT {} FROM learning_patterns WHERE id = ?", PATTERN_COLUMNS),
                params![id],
                Self::row_to_pattern,
            )
            .optional()?;
        Ok(pattern)
    }

    fn find_pattern(
        &self,
        pattern_type: PatternType,
        key: &str,
        value: &str,
    ) -> Result<Option<LearningPattern>> {
        let conn = self.conn()?;
        let pattern = conn
            .query_row(
                &format!(
                    "SELECT {} FROM learning_patterns \
                     WHERE pattern_type = ? AND pattern_key = ? AND pattern_value = ?",
                    PATTERN_COLUMNS
                ),
                params![pattern_type.as_str(), key, value],
                Self::row_to_pattern,
            )
            .optional()?;
        Ok(pattern)
    }

    fn list_patterns(&self, filter: &PatternFilter) -> Result<Vec<LearningPattern>> {
        filter.validate()?;

        let mut conditions: Vec<&str> = Vec::new();
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(pattern_type) = filter.pattern_type {
            conditions.push("pattern_type = ?");
            values.push(Box::new(pattern_type.as_str()));
        }
        if let Some(status) = filter.status {
            conditions.push("status = ?");
            values.push(Box::new(status.as_str()));
        }
        if let Some(confidence) = filter.confidence {
            conditions.push("confidence = ?");
            values.push(Box::new(confidence.as_str()));
        }
        if let Some(min) = filter.min_occurrence {
            conditions.push("occurrence_count >= ?");
            values.push(Box::new(min));
        }
        if let Some(ref key) = filter.key_contains {
            if !key.trim().is_empty() {
                conditions.push("pattern_key LIKE ? ESCAPE '\\'");
                values.push(Box::new(format!("%{}%", escape_like(key.trim()))));
            }
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };
        let limit_clause = match filter.limit {
            Some(limit) => format!("LIMIT {}", limit),
            None => String::new(),
        };

        let sql = format!(
            "SELECT {} FROM learning_patterns {} \
             ORDER BY occurrence_count DESC, last_seen DESC, id ASC {}",
            PATTERN_COLUMNS, where_clause, limit_clause
        );

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let params: Vec<&dyn rusqlite::ToSql> = values.iter().map(|v| v.as_ref()).collect();
        let patterns = stmt
            .query_map(params.as_slice(), Self::row_to_pattern)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(patterns)
    }

    fn get_pattern_stats(&self, pattern_type: Option<PatternType>) -> Result<PatternStats> {
        let mut stats = PatternStats::default();

        for (status, count) in self.count_patterns_by("status", pattern_type)? {
            let status = status.parse::<PatternStatus>().map_err(Error::InvalidData)?;
            stats.total += count;
            stats.by_status.insert(status, count);
        }
        for (confidence, count) in self.count_patterns_by("confidence", pattern_type)? {
            let confidence = confidence.parse::<Confidence>().map_err(Error::InvalidData)?;
            stats.by_confidence.insert(confidence, count);
        }

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT {} FROM learning_patterns
            WHERE (?1 IS NULL OR pattern_type = ?1)
            ORDER BY last_seen DESC, id DESC
            LIMIT 5
            "#,
            PATTERN_COLUMNS
        ))?;
        stats.recent = stmt
            .query_map(
                params![pattern_type.map(|t| t.as_str())],
                Self::row_to_pattern,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(stats)
    }

    fn update_pattern_status(&self, id: i64, status: PatternStatus) -> Result<bool> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE learning_patterns SET status = ? WHERE id = ?",
            params![status.as_str(), id],
        )?;
        Ok(updated > 0)
    }
}

//! Classification rule operations

use rusqlite::{params, OptionalExtension};
use tracing::{debug, info};

use super::{is_constraint_violation, parse_column, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::*;
use crate::store::{RuleFilter, RuleStore};

const RULE_COLUMNS: &str = "id, name, rule_type, condition_type, condition_value, target_value, \
                            priority, is_active, created_by, created_at";

impl Database {
    fn row_to_rule(row: &rusqlite::Row) -> rusqlite::Result<Rule> {
        let rule_type: String = row.get(2)?;
        let condition_type: String = row.get(3)?;
        let active: i64 = row.get(7)?;
        let created_by: String = row.get(8)?;
        let created_at: String = row.get(9)?;
        Ok(Rule {
            id: row.get(0)?,
            name: row.get(1)?,
            rule_type: parse_column(2, &rule_type)?,
            condition_type: parse_column(3, &condition_type)?,
            condition_value: row.get(4)?,
            target_value: row.get(5)?,
            priority: row.get(6)?,
            active: active != 0,
            created_by: parse_column(8, &created_by)?,
            created_at: parse_datetime(&created_at),
        })
    }
}

impl RuleStore for Database {
    fn create_rule(&self, rule: &NewRule) -> Result<Rule> {
        let conn = self.conn()?;

        let result = conn.execute(
            r#"
            INSERT INTO classification_rules
                (name, rule_type, condition_type, condition_value, target_value,
                 priority, is_active, created_by)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                rule.name,
                rule.rule_type.as_str(),
                rule.condition_type.as_str(),
                rule.condition_value,
                rule.target_value,
                rule.priority,
                rule.active,
                rule.created_by.as_str(),
            ],
        );

        match result {
            Ok(_) => {}
            Err(e) if is_constraint_violation(&e) => {
                return Err(Error::DuplicateRule(rule.key().to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        let id = conn.last_insert_rowid();
        info!(id, name = %rule.name, key = %rule.key(), "Created rule");

        self.get_rule(id)?
            .ok_or_else(|| Error::NotFound(format!("rule {}", id)))
    }

    fn get_rule(&self, id: i64) -> Result<Option<Rule>> {
        let conn = self.conn()?;
        let rule = conn
            .query_row(
                &format!("SELECT {} FROM classification_rules WHERE id = ?", RULE_COLUMNS),
                params![id],
                Self::row_to_rule,
            )
            .optional()?;
        Ok(rule)
    }

    fn update_rule(&self, rule: &Rule) -> Result<bool> {
        let conn = self.conn()?;

        let result = conn.execute(
            r#"
            UPDATE classification_rules
            SET name = ?, rule_type = ?, condition_type = ?, condition_value = ?,
                target_value = ?, priority = ?, is_active = ?, created_by = ?
            WHERE id = ?
            "#,
            params![
                rule.name,
                rule.rule_type.as_str(),
                rule.condition_type.as_str(),
                rule.condition_value,
                rule.target_value,
                rule.priority,
                rule.active,
                rule.created_by.as_str(),
                rule.id,
            ],
        );

        match result {
            Ok(updated) => Ok(updated > 0),
            Err(e) if is_constraint_violation(&e) => Err(Error::DuplicateRule(rule.key().to_string())),
            Err(e) => Err(e.into()),
        }
    }

    fn delete_rule(&self, id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM classification_rules WHERE id = ?", params![id])?;
        if deleted > 0 {
            info!(id, "Deleted rule");
        }
        Ok(deleted > 0)
    }

    fn list_rules(&self, filter: &RuleFilter) -> Result<Vec<Rule>> {
        filter.validate()?;

        let mut conditions: Vec<&str> = Vec::new();
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(rule_type) = filter.rule_type {
            conditions.push("rule_type = ?");
            values.push(Box::new(rule_type.as_str()));
        }
        if let Some(active) = filter.active {
            conditions.push("is_active = ?");
            values.push(Box::new(active));
        }
        if let Some(created_by) = filter.created_by {
            conditions.push("created_by = ?");
            values.push(Box::new(created_by.as_str()));
        }
        if let Some(min) = filter.min_priority {
            conditions.push("priority >= ?");
            values.push(Box::new(min));
        }
        if let Some(max) = filter.max_priority {
            conditions.push("priority <= ?");
            values.push(Box::new(max));
        }
        if let Some(condition_type) = filter.condition_type {
            conditions.push("condition_type = ?");
            values.push(Box::new(condition_type.as_str()));
        }
        if let Some(ref condition_value) = filter.condition_value {
            conditions.push("condition_value = ?");
            values.push(Box::new(condition_value.clone()));
        }
        if let Some(ref target_value) = filter.target_value {
            conditions.push("target_value = ?");
            values.push(Box::new(target_value.clone()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let sql = format!(
            "SELECT {} FROM classification_rules {} ORDER BY priority DESC, id ASC",
            RULE_COLUMNS, where_clause
        );

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let params: Vec<&dyn rusqlite::ToSql> = values.iter().map(|v| v.as_ref()).collect();
        let rules = stmt
            .query_map(params.as_slice(), Self::row_to_rule)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rules)
    }

    fn get_active_rules_by_type(&self, rule_type: RuleType) -> Result<Vec<Rule>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT {} FROM classification_rules
            WHERE rule_type = ? AND is_active = 1
            ORDER BY priority DESC, id ASC
            "#,
            RULE_COLUMNS
        ))?;

        let rules = stmt
            .query_map(params![rule_type.as_str()], Self::row_to_rule)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        debug!(rule_type = %rule_type, count = rules.len(), "Loaded active rules");
        Ok(rules)
    }
}

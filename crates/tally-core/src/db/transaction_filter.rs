//! Transaction filter builder for constructing dynamic SQL queries
//!
//! Turns a [`TransactionQuery`] into WHERE/ORDER/LIMIT clauses plus boxed
//! parameters, shared by the list and count queries.

use chrono::NaiveDate;

use crate::store::{SortOrder, TransactionQuery};

/// Builder for constructing transaction query filters
///
/// The lifetime `'query` is the borrowed query's.
#[derive(Default)]
pub struct TransactionFilter<'query> {
    pub contains_any: &'query [String],
    pub merchant: Option<&'query str>,
    pub source: Option<&'query str>,
    pub category: Option<&'query str>,
    pub payment_method: Option<&'query str>,
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    pub skip_excluded: bool,
    pub order: SortOrder,
    pub limit: Option<usize>,
}

/// Result of building a filter - contains SQL components and parameters
pub struct FilterResult {
    /// WHERE clause including "WHERE" keyword (empty if no conditions)
    pub where_clause: String,
    /// ORDER BY clause including "ORDER BY" keyword
    pub order_clause: &'static str,
    /// LIMIT clause (empty if unlimited)
    pub limit_clause: String,
    /// Parameters for the query (boxed for rusqlite compatibility)
    pub params: Vec<Box<dyn rusqlite::ToSql>>,
}

/// Escape LIKE wildcards so terms match literally (used with `ESCAPE '\'`)
pub(crate) fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

impl<'query> TransactionFilter<'query> {
    /// Create a filter that borrows every field of `query`
    pub fn from_query(query: &'query TransactionQuery) -> Self {
        Self {
            contains_any: &query.description_contains_any,
            merchant: query.merchant.as_deref(),
            source: query.source.as_deref(),
            category: query.category.as_deref(),
            payment_method: query.payment_method.as_deref(),
            date_range: query.date_range,
            skip_excluded: query.skip_excluded,
            order: query.order,
            limit: query.limit,
        }
    }

    /// Build the filter components
    pub fn build(self) -> FilterResult {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        // Description contains any of the terms
        let terms: Vec<&str> = self
            .contains_any
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .collect();
        if !terms.is_empty() {
            let clauses: Vec<&str> = terms
                .iter()
                .map(|_| "t.description LIKE ? ESCAPE '\\'")
                .collect();
            conditions.push(format!("({})", clauses.join(" OR ")));
            for term in terms {
                params.push(Box::new(format!("%{}%", escape_like(term))));
            }
        }

        // Merchant is the first whitespace-delimited token
        if let Some(m) = self.merchant {
            if !m.trim().is_empty() {
                conditions
                    .push("(t.description = ? OR t.description LIKE ? ESCAPE '\\')".to_string());
                params.push(Box::new(m.trim().to_string()));
                params.push(Box::new(format!("{} %", escape_like(m.trim()))));
            }
        }

        if let Some(s) = self.source {
            conditions.push("t.source = ?".to_string());
            params.push(Box::new(s.to_string()));
        }

        if let Some(c) = self.category {
            conditions.push("t.category = ?".to_string());
            params.push(Box::new(c.to_string()));
        }

        if let Some(p) = self.payment_method {
            conditions.push("t.payment_method = ?".to_string());
            params.push(Box::new(p.to_string()));
        }

        // Date range filter
        if let Some((from_date, to_date)) = self.date_range {
            conditions.push("t.date >= ? AND t.date <= ?".to_string());
            params.push(Box::new(from_date.to_string()));
            params.push(Box::new(to_date.to_string()));
        }

        if self.skip_excluded {
            conditions.push("t.is_excluded = 0".to_string());
        }

        // Build WHERE clause
        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let order_clause = match self.order {
            SortOrder::DateAsc => "ORDER BY t.date ASC, t.id ASC",
            SortOrder::DateDesc => "ORDER BY t.date DESC, t.id DESC",
        };

        let limit_clause = match self.limit {
            Some(limit) => format!("LIMIT {}", limit),
            None => String::new(),
        };

        FilterResult {
            where_clause,
            order_clause,
            limit_clause,
            params,
        }
    }
}

impl FilterResult {
    /// Build a SELECT query for the given column list
    pub fn build_select_query(&self, columns: &str) -> String {
        format!(
            "SELECT {} FROM transactions t {} {} {}",
            columns, self.where_clause, self.order_clause, self.limit_clause
        )
    }

    /// Build a COUNT query
    pub fn build_count_query(&self) -> String {
        format!("SELECT COUNT(*) FROM transactions t {}", self.where_clause)
    }

    /// Get parameter references for query execution
    pub fn params_refs(&self) -> Vec<&dyn rusqlite::ToSql> {
        self.params.iter().map(|p| p.as_ref()).collect()
    }
}

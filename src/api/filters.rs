//! Query-string filtering shared by the listing and booking collections.
//!
//! Handlers translate their query parameters into a [`FilterSet`] (a list
//! of SQL conditions with typed bindings) plus an ORDER BY clause, then run
//! a single `SELECT`.

use sqlx::{query::QueryAs, sqlite::SqliteArguments, Sqlite};
use std::str::FromStr;

use super::error::ApiError;

/// A value bound to a `?` placeholder
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(String),
    Real(f64),
    Integer(i64),
    Bool(bool),
}

/// Conditions joined with AND, with their bindings in placeholder order
#[derive(Debug, Default)]
pub struct FilterSet {
    conditions: Vec<String>,
    bindings: Vec<SqlValue>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a condition with a single placeholder
    pub fn push(&mut self, condition: impl Into<String>, value: SqlValue) -> &mut Self {
        self.conditions.push(condition.into());
        self.bindings.push(value);
        self
    }

    /// Add a condition with one placeholder per value
    pub fn push_many(&mut self, condition: impl Into<String>, values: Vec<SqlValue>) -> &mut Self {
        self.conditions.push(condition.into());
        self.bindings.extend(values);
        self
    }

    /// Add `column = ?` when the parameter is present
    pub fn eq_text(&mut self, column: &str, value: Option<&str>) -> &mut Self {
        if let Some(v) = non_empty(value) {
            self.push(format!("{} = ?", column), SqlValue::Text(v.to_string()));
        }
        self
    }

    /// Every search term must match at least one of `columns`, case-insensitively.
    pub fn search(&mut self, raw: Option<&str>, columns: &[&str]) -> &mut Self {
        for term in search_terms(raw) {
            let pattern = format!("%{}%", escape_like(&term));
            let condition = columns
                .iter()
                .map(|c| format!("{} LIKE ? ESCAPE '\\'", c))
                .collect::<Vec<_>>()
                .join(" OR ");
            let values = columns
                .iter()
                .map(|_| SqlValue::Text(pattern.clone()))
                .collect();
            self.push_many(format!("({})", condition), values);
        }
        self
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// `WHERE ...` or an empty string
    pub fn where_clause(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.conditions.join(" AND "))
        }
    }

    /// Bind every value, in order, onto a query built from [`Self::where_clause`]
    pub fn bind<'q, O>(
        self,
        mut query: QueryAs<'q, Sqlite, O, SqliteArguments<'q>>,
    ) -> QueryAs<'q, Sqlite, O, SqliteArguments<'q>> {
        for value in self.bindings {
            query = match value {
                SqlValue::Text(v) => query.bind(v),
                SqlValue::Real(v) => query.bind(v),
                SqlValue::Integer(v) => query.bind(v),
                SqlValue::Bool(v) => query.bind(v),
            };
        }
        query
    }

    #[cfg(test)]
    fn bindings(&self) -> &[SqlValue] {
        &self.bindings
    }
}

/// Treat missing and blank parameters alike
pub fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Split a search string on whitespace and commas
pub fn search_terms(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(|c: char| c.is_whitespace() || c == ',')
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Build an ORDER BY body from an `ordering` parameter.
///
/// `raw` is a comma-separated list of fields, each optionally prefixed with
/// `-` for descending order. Fields outside `allowed` are ignored; if none
/// remain, `default` is used. Rows are tie-broken newest-inserted first.
pub fn order_by(raw: Option<&str>, allowed: &[&str], default: &str, table_prefix: &str) -> String {
    let mut terms = ordering_terms(raw.unwrap_or(""), allowed, table_prefix);
    if terms.is_empty() {
        terms = ordering_terms(default, allowed, table_prefix);
    }

    terms.push(format!("{}rowid DESC", table_prefix));
    terms.join(", ")
}

fn ordering_terms(raw: &str, allowed: &[&str], table_prefix: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    let mut seen: Vec<&str> = Vec::new();

    for token in raw.split(',').map(str::trim) {
        let (field, direction) = match token.strip_prefix('-') {
            Some(f) => (f, "DESC"),
            None => (token, "ASC"),
        };
        if let Some(known) = allowed.iter().find(|a| **a == field) {
            if !seen.contains(known) {
                seen.push(*known);
                terms.push(format!("{}{} {}", table_prefix, known, direction));
            }
        }
    }

    terms
}

/// Parse a boolean query parameter (`true`/`false`/`1`/`0`, any case)
pub fn parse_bool(field: &str, raw: &str) -> Result<bool, ApiError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(ApiError::validation_field(
            field,
            format!("'{}' is not a valid boolean", raw),
        )),
    }
}

fn not_a_number(field: &str, raw: &str) -> ApiError {
    ApiError::validation_field(field, format!("'{}' is not a valid number", raw))
}

/// Parse a numeric query parameter
pub fn parse_number<T: FromStr>(field: &str, raw: &str) -> Result<T, ApiError> {
    raw.trim().parse::<T>().map_err(|_| not_a_number(field, raw))
}

/// Parse a decimal query parameter; `NaN` and infinities are rejected
pub fn parse_finite(field: &str, raw: &str) -> Result<f64, ApiError> {
    let value: f64 = parse_number(field, raw)?;
    if !value.is_finite() {
        return Err(not_a_number(field, raw));
    }
    Ok(value)
}

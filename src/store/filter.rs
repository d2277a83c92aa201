//! Filter expressions
//!
//! Built as a tree, rendered to the store's filter syntax at the boundary.
//! The in-memory store evaluates the tree directly.

use crate::models::Record;
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    /// `field EXISTS`
    Exists(String),
    /// `field = 'value'`
    Equals(String, String),
    /// `NOT(expr)`
    Not(Box<FilterExpr>),
    /// `(expr)`
    Group(Box<FilterExpr>),
    /// `a AND b AND ...`
    And(Vec<FilterExpr>),
    /// `a OR b OR ...`
    Or(Vec<FilterExpr>),
}

impl FilterExpr {
    pub fn exists(field: impl Into<String>) -> Self {
        FilterExpr::Exists(field.into())
    }

    pub fn equals(field: impl Into<String>, value: impl Into<String>) -> Self {
        FilterExpr::Equals(field.into(), value.into())
    }

    pub fn not(expr: FilterExpr) -> Self {
        FilterExpr::Not(Box::new(expr))
    }

    pub fn group(expr: FilterExpr) -> Self {
        FilterExpr::Group(Box::new(expr))
    }

    /// OR-combine; `None` when there is nothing to combine
    pub fn any(mut exprs: Vec<FilterExpr>) -> Option<Self> {
        match exprs.len() {
            0 => None,
            1 => exprs.pop(),
            _ => Some(FilterExpr::Or(exprs)),
        }
    }

    /// Evaluate against a record
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            FilterExpr::Exists(field) => record.contains(field),
            FilterExpr::Equals(field, value) => record
                .get(field)
                .map(|v| value_equals(v, value))
                .unwrap_or(false),
            FilterExpr::Not(expr) => !expr.matches(record),
            FilterExpr::Group(expr) => expr.matches(record),
            FilterExpr::And(exprs) => exprs.iter().all(|e| e.matches(record)),
            FilterExpr::Or(exprs) => exprs.iter().any(|e| e.matches(record)),
        }
    }

    /// Every attribute the expression references
    pub fn attributes(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_attributes(&mut out);
        out.sort_unstable();
        out.dedup();
        out
    }

    fn collect_attributes<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            FilterExpr::Exists(field) | FilterExpr::Equals(field, _) => out.push(field),
            FilterExpr::Not(expr) | FilterExpr::Group(expr) => expr.collect_attributes(out),
            FilterExpr::And(exprs) | FilterExpr::Or(exprs) => {
                exprs.iter().for_each(|e| e.collect_attributes(out))
            }
        }
    }
}

fn value_equals(value: &Value, expected: &str) -> bool {
    match value {
        Value::String(s) => s == expected,
        Value::Number(n) => n.to_string() == expected,
        Value::Bool(b) => b.to_string() == expected,
        Value::Array(items) => items.iter().any(|item| value_equals(item, expected)),
        _ => false,
    }
}

fn join(f: &mut fmt::Formatter<'_>, exprs: &[FilterExpr], separator: &str) -> fmt::Result {
    for (i, expr) in exprs.iter().enumerate() {
        if i > 0 {
            f.write_str(separator)?;
        }
        write!(f, "{}", expr)?;
    }
    Ok(())
}

impl fmt::Display for FilterExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterExpr::Exists(field) => write!(f, "{} EXISTS", field),
            FilterExpr::Equals(field, value) => {
                let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
                write!(f, "{} = '{}'", field, escaped)
            }
            FilterExpr::Not(expr) => write!(f, "NOT({})", expr),
            FilterExpr::Group(expr) => write!(f, "({})", expr),
            FilterExpr::And(exprs) => join(f, exprs, " AND "),
            FilterExpr::Or(exprs) => join(f, exprs, " OR "),
        }
    }
}

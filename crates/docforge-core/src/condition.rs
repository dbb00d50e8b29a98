//! Predicates gating conditional regions.
//!
//! Two forms exist: `COLUMN=VALUE` (case-insensitive equality after trimming)
//! and a bare `COLUMN` (the value is non-empty after trimming).

use crate::record::{normalize_key, Record};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Predicate {
    /// `COLUMN=VALUE`
    Equals { column: String, expected: String },
    /// `COLUMN`
    Present { column: String },
}

impl Predicate {
    /// Parse a predicate, splitting on the first `=`.
    #[must_use]
    pub fn parse(source: &str) -> Self {
        match source.split_once('=') {
            Some((column, expected)) => Self::Equals {
                column: normalize_key(column),
                expected: expected.trim().to_string(),
            },
            None => Self::Present {
                column: normalize_key(source),
            },
        }
    }

    #[must_use]
    pub fn evaluate(&self, record: &Record) -> bool {
        match self {
            Self::Equals { column, expected } => {
                record.value(column).trim().to_lowercase() == expected.to_lowercase()
            }
            Self::Present { column } => !record.value(column).trim().is_empty(),
        }
    }
}

impl std::fmt::Display for Predicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Equals { column, expected } => write!(f, "{column}={expected}"),
            Self::Present { column } => f.write_str(column),
        }
    }
}

/// Parse and evaluate `predicate` against `record`.
#[must_use]
pub fn evaluate(predicate: &str, record: &Record) -> bool {
    Predicate::parse(predicate).evaluate(record)
}

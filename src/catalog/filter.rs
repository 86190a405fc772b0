//! Record selection constraints applied when querying the catalog.

use rusqlite::types::Value;

/// Caller-supplied constraints on which records take part in a run.
///
/// The engine treats the filter as opaque and hands it to
/// [`Catalog::query`](super::Catalog::query) unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    /// Minimum size in bytes (inclusive)
    pub min_size: Option<u64>,
    /// Maximum size in bytes (inclusive)
    pub max_size: Option<u64>,
    /// Path must contain every one of these substrings
    pub include: Vec<String>,
    /// Path must contain none of these substrings
    pub exclude: Vec<String>,
    /// Maximum number of records to return
    pub limit: Option<u64>,
}

impl RecordFilter {
    /// Set the minimum size.
    #[must_use]
    pub fn with_min_size(mut self, bytes: u64) -> Self {
        self.min_size = Some(bytes);
        self
    }

    /// Set the maximum size.
    #[must_use]
    pub fn with_max_size(mut self, bytes: u64) -> Self {
        self.max_size = Some(bytes);
        self
    }

    /// Require a path substring.
    #[must_use]
    pub fn with_include(mut self, pattern: impl Into<String>) -> Self {
        self.include.push(pattern.into());
        self
    }

    /// Reject a path substring.
    #[must_use]
    pub fn with_exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclude.push(pattern.into());
        self
    }

    /// Cap the number of records.
    #[must_use]
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Render the filter as SQL `WHERE` conditions and their bound values.
    ///
    /// Conditions are joined with `AND` and always include the
    /// not-deleted constraint.
    pub(crate) fn to_sql(&self) -> (String, Vec<Value>) {
        let mut clauses = vec!["time_deleted = 0".to_string()];
        let mut values = Vec::new();

        if let Some(min) = self.min_size {
            clauses.push("size >= ?".to_string());
            values.push(Value::Integer(saturating_i64(min)));
        }
        if let Some(max) = self.max_size {
            clauses.push("size <= ?".to_string());
            values.push(Value::Integer(saturating_i64(max)));
        }
        for pattern in &self.include {
            clauses.push("path LIKE ? ESCAPE '\\'".to_string());
            values.push(Value::Text(like_contains(pattern)));
        }
        for pattern in &self.exclude {
            clauses.push("path NOT LIKE ? ESCAPE '\\'".to_string());
            values.push(Value::Text(like_contains(pattern)));
        }

        (clauses.join(" AND "), values)
    }
}

fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Build a `%...%` LIKE pattern with wildcard characters escaped.
fn like_contains(pattern: &str) -> String {
    let mut escaped = String::with_capacity(pattern.len() + 2);
    escaped.push('%');
    for c in pattern.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

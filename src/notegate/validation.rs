//! Input checks shared by every request path.
//!
//! All of these run before the executor is touched. The SQL check is a syntactic
//! allow-list, not a parser: it looks at the leading keyword and scans for
//! mutating keywords on word boundaries. Keep it behind [`validate_sql`] so a
//! stricter implementation can replace it in one place.

use crate::error::{NotegateError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

pub const MAX_LIMIT: usize = 1000;
pub const MAX_VIEW_NAME_LEN: usize = 64;

const FORBIDDEN_KEYWORDS: [&str; 7] = [
    "insert", "update", "delete", "drop", "create", "alter", "truncate",
];

static FORBIDDEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)\b({})\b", FORBIDDEN_KEYWORDS.join("|")))
        .expect("valid keyword regex")
});

static READ_MARKDOWN_ARG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)read_markdown\s*\(\s*'((?:[^']|'')*)'").expect("valid read_markdown regex")
});

static VIEW_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid view name regex"));

/// Doubles single quotes for use inside a SQL string literal.
pub fn escape_sql_string(value: &str) -> String {
    value.replace('\'', "''")
}

/// Read-only allow-list for SQL reaching the executor.
pub fn validate_sql(sql: &str) -> Result<()> {
    let trimmed = sql.trim().to_lowercase();
    if !trimmed.starts_with("select") && !trimmed.starts_with("with") {
        return Err(NotegateError::InvalidSql(
            "only SELECT and WITH queries are allowed".to_string(),
        ));
    }

    if let Some(m) = FORBIDDEN_RE.find(sql) {
        return Err(NotegateError::DangerousSql {
            keyword: m.as_str().to_lowercase(),
        });
    }

    for cap in READ_MARKDOWN_ARG_RE.captures_iter(sql) {
        let arg = cap.get(1).map(|m| m.as_str()).unwrap_or_default();
        reject_traversal(arg)?;
        if Path::new(arg).is_absolute() {
            return Err(NotegateError::PathTraversal(arg.to_string()));
        }
    }
    Ok(())
}

/// Fails on any `..` in a path-bearing value.
pub fn reject_traversal(value: &str) -> Result<()> {
    if value.contains("..") {
        return Err(NotegateError::PathTraversal(value.to_string()));
    }
    Ok(())
}

/// A note path must be relative to the notebook, traversal-free and end in `.md`.
pub fn validate_note_path(path: &str) -> Result<()> {
    if path.trim().is_empty() {
        return Err(NotegateError::InvalidPath {
            path: path.to_string(),
            reason: "path is required".to_string(),
        });
    }
    reject_traversal(path)?;
    if Path::new(path).is_absolute() {
        return Err(NotegateError::PathTraversal(path.to_string()));
    }
    if !path.ends_with(".md") {
        return Err(NotegateError::InvalidPath {
            path: path.to_string(),
            reason: "must end with .md".to_string(),
        });
    }
    Ok(())
}

/// Glob patterns for listing follow the same confinement as note paths.
pub fn validate_pattern(pattern: &str) -> Result<()> {
    reject_traversal(pattern)?;
    if Path::new(pattern).is_absolute() {
        return Err(NotegateError::PathTraversal(pattern.to_string()));
    }
    Ok(())
}

pub fn validate_view_name(name: &str) -> Result<()> {
    if name.len() > MAX_VIEW_NAME_LEN || !VIEW_NAME_RE.is_match(name) {
        return Err(NotegateError::InvalidViewName(name.to_string()));
    }
    Ok(())
}

pub fn validate_pagination(limit: Option<usize>, _offset: usize) -> Result<()> {
    if let Some(limit) = limit {
        if limit < 1 {
            return Err(NotegateError::InvalidPagination(
                "limit must be at least 1".to_string(),
            ));
        }
        if limit > MAX_LIMIT {
            return Err(NotegateError::InvalidPagination(format!(
                "limit must be at most {}",
                MAX_LIMIT
            )));
        }
    }
    Ok(())
}

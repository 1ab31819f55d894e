//! Boolean filter translation.
//!
//! Conditions look like `field<op>value`. `data.<key>` reads frontmatter, `path`,
//! `title` and `content` map to fixed columns, anything else is used verbatim as a
//! column reference. The first operator wins, and `LIKE` only counts as a separate
//! word. Conditions that don't parse are dropped.

use crate::model::BooleanFilters;
use crate::validation::escape_sql_string;
use once_cell::sync::Lazy;
use regex::Regex;

static CONDITION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^([^=<>!]+?)(<=|>=|!=|=|<|>|\s+LIKE\b)(.*)$").expect("valid condition regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub field: String,
    pub op: String,
    pub value: String,
}

pub fn parse_condition(condition: &str) -> Option<Condition> {
    let caps = CONDITION_RE.captures(condition.trim())?;
    let field = caps.get(1)?.as_str().trim();
    if field.is_empty() {
        return None;
    }
    Some(Condition {
        field: field.to_string(),
        op: caps.get(2)?.as_str().trim().to_uppercase(),
        value: caps.get(3)?.as_str().trim().to_string(),
    })
}

fn column_for(field: &str) -> String {
    if let Some(key) = field.strip_prefix("data.") {
        return format!("metadata->>'{}'", escape_sql_string(key));
    }
    match field {
        "path" => "file_path".to_string(),
        "title" => "metadata->>'title'".to_string(),
        "content" => "content".to_string(),
        other => other.to_string(),
    }
}

impl Condition {
    pub fn to_sql(&self) -> String {
        format!(
            "{} {} '{}'",
            column_for(&self.field),
            self.op,
            escape_sql_string(&self.value)
        )
    }
}

fn translate(conditions: &[String]) -> impl Iterator<Item = String> + '_ {
    conditions.iter().filter_map(|c| match parse_condition(c) {
        Some(cond) => Some(cond.to_sql()),
        None => {
            tracing::debug!(condition = %c, "dropping malformed filter condition");
            None
        }
    })
}

/// Builds the predicate (without `WHERE`), or `None` when nothing survived parsing.
pub fn build_where(filters: &BooleanFilters) -> Option<String> {
    let mut and_group: Vec<String> = translate(&filters.and).collect();
    and_group.extend(translate(&filters.not).map(|c| format!("NOT ({})", c)));
    let or_group: Vec<String> = translate(&filters.or).collect();

    let and_part = (!and_group.is_empty()).then(|| and_group.join(" AND "));
    let or_part = (!or_group.is_empty()).then(|| format!("({})", or_group.join(" OR ")));

    match (and_part, or_part) {
        (Some(a), Some(o)) => Some(format!("{} AND {}", a, o)),
        (Some(a), None) => Some(a),
        (None, Some(o)) => Some(o),
        (None, None) => None,
    }
}

use crate::commands::{CmdResult, Runtime};
use crate::error::{classify_failure, FailureContext, NotegateError, Result};
use crate::executor::QueryExecutor;
use crate::model::{NoteContent, Row};
use crate::notebook::Notebook;
use crate::query::note_sql;
use serde_json::{Map, Value};
use std::path::Path;

fn frontmatter_of(row: &Row) -> Map<String, Value> {
    match row.get("frontmatter") {
        Some(Value::Object(map)) => map.clone(),
        Some(Value::String(s)) => serde_json::from_str(s).unwrap_or_default(),
        _ => Map::new(),
    }
}

fn word_count_of(row: &Row, content: Option<&str>) -> Option<u64> {
    if content.map(|c| c.trim().is_empty()).unwrap_or(false) {
        return Some(0);
    }
    row.get("wordCount")
        .and_then(|v| v.as_u64().or_else(|| v.as_f64().map(|f| f as u64)))
}

pub async fn run<E: QueryExecutor + ?Sized>(
    rt: &Runtime<'_, E>,
    notebook: &Notebook,
    path: &str,
    include_content: bool,
) -> Result<CmdResult> {
    let sql = note_sql(path)?;

    let rows = rt.execute(notebook, &sql).await.map_err(|e| match e {
        NotegateError::SearchFailed(diagnostic) => {
            classify_failure(&diagnostic, FailureContext::Note(path))
        }
        other => other,
    })?;
    let row = rows
        .into_iter()
        .find(|r| r.path().is_some())
        .ok_or_else(|| NotegateError::NoteNotFound(path.to_string()))?;

    let frontmatter = frontmatter_of(&row);
    let title = row
        .title()
        .map(str::to_string)
        .or_else(|| {
            Path::new(path)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
        });
    let raw_content = row.get_str("content");
    let word_count = word_count_of(&row, raw_content);

    let (content, truncated) = match raw_content {
        Some(text) if include_content => {
            let (text, cut) = rt.pagination.truncate_text(text, None);
            (Some(text), cut)
        }
        _ => (None, false),
    };

    let note = NoteContent {
        path: row.path().unwrap_or(path).to_string(),
        title,
        content,
        frontmatter,
        word_count,
        truncated,
    };
    Ok(CmdResult::default().with_note(note))
}

//! # Rendering
//!
//! Turns a `CmdResult` into markdown for the terminal. Every `render_*` function returns
//! a `String` so output can be tested without capturing stdout; only `print_messages`
//! writes directly.

use colored::Colorize;
use notegate::commands::{CmdMessage, CmdResult, MessageLevel, QuerySummary, ViewSummary};
use notegate::error::NotegateError;
use notegate::model::{NoteContent, NotebookInfo, Page, PaginationMeta, Row};
use serde_json::Value;

pub fn print_messages(messages: &[CmdMessage]) {
    for message in messages {
        match message.level {
            MessageLevel::Info => println!("{}", message.content.dimmed()),
            MessageLevel::Success => println!("{}", message.content.green()),
            MessageLevel::Warning => println!("{}", message.content.yellow()),
        }
    }
}

pub fn render_result(result: &CmdResult) -> String {
    let mut out = String::new();
    if let Some(query) = &result.query {
        out.push_str(&render_query(query));
    }
    if let Some(page) = &result.page {
        out.push_str(&render_page(page));
    }
    if let Some(note) = &result.note {
        out.push_str(&render_note(note));
    }
    if !result.views.is_empty() {
        out.push_str(&render_views(&result.views));
    }
    if !result.notebooks.is_empty() {
        out.push_str(&render_notebooks(&result.notebooks));
    }
    out
}

fn render_query(query: &QuerySummary) -> String {
    format!("## Results: {}\n\n", query.described_as)
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

pub fn render_row(row: &Row) -> String {
    let Some(path) = row.path() else {
        return match row {
            Row::Value(map) => map
                .iter()
                .map(|(k, v)| format!("{k}: {}", scalar(v)))
                .collect::<Vec<_>>()
                .join(" | "),
            Row::Note(_) => String::new(),
        };
    };

    let title = row.title().unwrap_or(path);
    let mut line = format!("**{title}** ({path})");
    let tags = row.tags();
    if !tags.is_empty() {
        line.push_str(&format!(" | Tags: {}", tags.join(", ")));
    }
    if let Some(modified) = row.get_str("modified") {
        line.push_str(&format!(" | Modified: {modified}"));
    }
    line
}

pub fn render_pagination(meta: &PaginationMeta) -> String {
    let mut line = format!(
        "Showing {} of {} | Page {}",
        meta.returned, meta.total, meta.page
    );
    if let Some(next) = meta.next_offset {
        line.push_str(&format!(" | More available (next offset: {next})"));
    }
    line
}

pub fn render_page(page: &Page) -> String {
    if page.items.is_empty() {
        return "No results found.\n".to_string();
    }
    let mut out = String::new();
    for row in &page.items {
        out.push_str(&format!("- {}\n", render_row(row)));
    }
    out.push('\n');
    out.push_str(&render_pagination(&page.pagination));
    out.push('\n');
    if page.truncated {
        out.push_str("*Output truncated to stay within the output budget*\n");
    }
    out
}

pub fn render_note(note: &NoteContent) -> String {
    let mut out = format!("# {}\n\n", note.title.as_deref().unwrap_or(&note.path));
    out.push_str(&format!("Path: {}\n", note.path));
    for (key, value) in &note.frontmatter {
        out.push_str(&format!("{key}: {}\n", scalar(value)));
    }
    if let Some(words) = note.word_count {
        out.push_str(&format!("*{words} words*\n"));
    }
    if let Some(content) = &note.content {
        out.push_str("\n---\n\n");
        out.push_str(content);
        if !content.ends_with('\n') {
            out.push('\n');
        }
        if note.truncated {
            out.push_str("\n*Content truncated*\n");
        }
    }
    out
}

pub fn render_views(views: &[ViewSummary]) -> String {
    let mut out = String::from("## Views\n\n");
    for view in views {
        out.push_str(&format!("**{}** ({})", view.name, view.origin));
        if let Some(description) = &view.description {
            out.push_str(&format!(" - {description}"));
        }
        out.push('\n');
        for param in &view.parameters {
            let mut line = format!("  - {}", param.name);
            if let Some(default) = &param.default {
                line.push_str(&format!(" (default: {default})"));
            } else if param.required {
                line.push_str(" (required)");
            }
            out.push_str(&line);
            out.push('\n');
        }
    }
    out
}

pub fn render_notebooks(notebooks: &[NotebookInfo]) -> String {
    let mut out = String::new();
    for nb in notebooks {
        let mut line = format!("**{}** | Path: {}", nb.name, nb.path.display());
        if let Some(count) = nb.note_count {
            line.push_str(&format!(" | Notes: {count}"));
        }
        line.push_str(&format!(" | Source: {}", nb.source));
        if nb.current {
            line.push_str(" | current");
        }
        out.push_str(&line);
        out.push('\n');
    }
    out
}

pub fn render_error(err: &NotegateError) -> String {
    let mut out = format!("**Error**: {err}\n**Code**: {}\n", err.kind().code());
    if let Some(hint) = err.hint() {
        out.push_str(&format!("**How to fix**: {hint}\n"));
    }
    if err.is_recoverable() {
        out.push_str("*This error can be fixed and retried.*\n");
    }
    out
}

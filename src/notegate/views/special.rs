//! Views computed over the whole link graph instead of a single SQL statement.

use crate::error::{NotegateError, Result};
use crate::model::Row;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap, HashSet};

/// Query feeding both special views.
pub const LINK_GRAPH_SQL: &str = "SELECT file_path as path, metadata->>'title' as title, \
     metadata->'tags' as tags, metadata->'links' as links, content \
     FROM read_markdown('**/*.md') ORDER BY file_path";

static MD_LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[[^\]]*\]\(([^)]+)\)").expect("valid markdown link regex"));

static WIKI_LINK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[\[([^\]|]+)(?:\|[^\]]+)?\]\]").expect("valid wiki link regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrphanDefinition {
    /// Nothing links to the note.
    NoIncoming,
    /// No incoming and no outgoing links.
    NoLinks,
    /// No links at all and no tags.
    Isolated,
}

impl OrphanDefinition {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim() {
            "no-incoming" => Ok(Self::NoIncoming),
            "no-links" => Ok(Self::NoLinks),
            "" | "isolated" => Ok(Self::Isolated),
            other => Err(NotegateError::InvalidParams {
                view: "orphans".to_string(),
                message: format!(
                    "definition must be no-incoming, no-links or isolated, got '{}'",
                    other
                ),
            }),
        }
    }
}

fn strings_in(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        Some(Value::String(s)) => serde_json::from_str::<Vec<String>>(s).unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// Raw link targets of a note in discovery order: frontmatter, markdown, wiki.
#[derive(Debug, Default)]
struct Links {
    frontmatter: Vec<String>,
    markdown: Vec<String>,
    wiki: Vec<String>,
}

fn links_of(row: &Row) -> Links {
    let content = row.get_str("content").unwrap_or_default();
    let markdown = MD_LINK_RE
        .captures_iter(content)
        .filter_map(|c| c.get(1).map(|m| m.as_str().trim().to_string()))
        .filter(|l| !l.starts_with("http://") && !l.starts_with("https://") && !l.starts_with('#'))
        .map(|l| match l.split_once('#') {
            Some((path, _)) => path.to_string(),
            None => l,
        })
        .collect();
    let wiki = WIKI_LINK_RE
        .captures_iter(content)
        .filter_map(|c| c.get(1).map(|m| m.as_str().trim().to_string()))
        .collect();
    Links {
        frontmatter: strings_in(row.get("links")),
        markdown,
        wiki,
    }
}

/// Every spelling under which a link can refer to a note.
fn link_keys(link: &str) -> [String; 2] {
    let bare = link.trim_start_matches("./");
    match bare.strip_suffix(".md") {
        Some(stem) => [bare.to_string(), stem.to_string()],
        None => [bare.to_string(), format!("{}.md", bare)],
    }
}

fn resolves(link: &str, existing: &HashSet<&str>) -> bool {
    link_keys(link).iter().any(|k| existing.contains(k.as_str()))
}

/// Notes containing at least one link to a note that does not exist.
pub fn broken_links(rows: &[Row]) -> Vec<Row> {
    let existing: HashSet<&str> = rows.iter().filter_map(Row::path).collect();

    rows.iter()
        .filter_map(|row| {
            let path = row.path()?;
            let links = links_of(row);
            let mut seen = BTreeSet::new();
            let broken: Vec<String> = links
                .frontmatter
                .into_iter()
                .chain(links.markdown)
                .chain(links.wiki)
                .filter(|l| !l.is_empty() && !resolves(l, &existing))
                .filter(|l| seen.insert(l.clone()))
                .collect();
            if broken.is_empty() {
                return None;
            }
            let mut out = Row::note(path).with_field("link_count", broken.len());
            if let Some(title) = row.title() {
                out = out.with_field("title", title);
            }
            Some(out.with_field("broken_links", broken))
        })
        .collect()
}

/// Notes matching `definition`, in input order.
pub fn orphans(rows: &[Row], definition: OrphanDefinition) -> Vec<Row> {
    let outgoing: HashMap<&str, HashSet<String>> = rows
        .iter()
        .filter_map(|row| {
            let path = row.path()?;
            let links = links_of(row);
            let keys = links
                .frontmatter
                .iter()
                .chain(&links.markdown)
                .chain(&links.wiki)
                .flat_map(|l| link_keys(l))
                .collect();
            Some((path, keys))
        })
        .collect();

    let has_incoming = |target: &str| {
        let stem = target.strip_suffix(".md").unwrap_or(target);
        outgoing
            .iter()
            .any(|(source, keys)| *source != target && (keys.contains(target) || keys.contains(stem)))
    };

    rows.iter()
        .filter(|row| {
            let Some(path) = row.path() else {
                return false;
            };
            let no_incoming = !has_incoming(path);
            let no_outgoing = outgoing.get(path).map(|k| k.is_empty()).unwrap_or(true);
            match definition {
                OrphanDefinition::NoIncoming => no_incoming,
                OrphanDefinition::NoLinks => no_incoming && no_outgoing,
                OrphanDefinition::Isolated => {
                    no_incoming && no_outgoing && row.tags().is_empty()
                }
            }
        })
        .map(|row| {
            let mut out = Row::note(row.path().unwrap_or_default());
            if let Some(title) = row.title() {
                out = out.with_field("title", title);
            }
            out.with_field("tags", row.tags())
        })
        .collect()
}

//! # Query Builder
//!
//! Turns a [`SearchRequest`] into something the executor can run. Only one request
//! variant is ever active; see [`SearchParams::into_request`] for how that variant
//! is chosen.
//!
//! | variant | plan                                   | paging               |
//! |---------|----------------------------------------|----------------------|
//! | text    | `LIKE` on title and content            | `LIMIT/OFFSET` + count |
//! | boolean | `WHERE` from [`filter::build_where`]   | `LIMIT/OFFSET` + count |
//! | sql     | caller SQL after [`validate_sql`]      | in memory            |
//! | fuzzy   | executor's native fuzzy search         | in memory            |
//! | view    | bound view template, or a link-graph view | in memory         |
//!
//! Text and boolean queries are built from escaped literals and never go through
//! the keyword allow-list, so searching for the word "update" works.
//!
//! [`SearchParams::into_request`]: crate::model::SearchParams::into_request

use crate::error::Result;
use crate::model::{ListOptions, SearchRequest, SpecialView, ViewBody, ViewConfig};
use crate::notebook::Notebook;
use crate::validation::{
    escape_sql_string, reject_traversal, validate_note_path, validate_pattern, validate_sql,
};
use crate::views::special::{OrphanDefinition, LINK_GRAPH_SQL};
use crate::views::{bind_parameters, render_sql, TemplateContext, ViewRegistry};
use std::collections::BTreeMap;

pub mod filter;
pub mod fuzzy;

/// Glob covering every note in a notebook.
pub const ALL_NOTES: &str = "**/*.md";

/// Columns selected for note listings.
pub const NOTE_COLUMNS: &str = "file_path as path, metadata->>'title' as title, \
     metadata->'tags' as tags, metadata->>'created' as created, \
     metadata->>'modified' as modified";

/// Where the `LIMIT/OFFSET` window is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Paging {
    /// The statement is already windowed; `count_sql` gives the total.
    InQuery,
    /// The executor returns everything; the caller slices.
    InMemory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkGraphView {
    Orphans(OrphanDefinition),
    BrokenLinks,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryPlan {
    Sql {
        sql: String,
        count_sql: Option<String>,
        paging: Paging,
    },
    Fuzzy {
        query: String,
    },
    /// Fetches the link graph with [`LINK_GRAPH_SQL`] and computes the view in memory.
    LinkGraph(LinkGraphView),
}

/// A ready-to-run query plus a description of what it does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltQuery {
    pub kind: &'static str,
    pub described_as: String,
    pub plan: QueryPlan,
}

impl BuiltQuery {
    /// The statement sent to the executor, if this plan runs SQL.
    pub fn sql(&self) -> Option<&str> {
        match &self.plan {
            QueryPlan::Sql { sql, .. } => Some(sql),
            QueryPlan::LinkGraph(_) => Some(LINK_GRAPH_SQL),
            QueryPlan::Fuzzy { .. } => None,
        }
    }
}

fn windowed(base: &str, order_by: &str, limit: usize, offset: usize) -> QueryPlan {
    QueryPlan::Sql {
        sql: format!("{} ORDER BY {} LIMIT {} OFFSET {}", base, order_by, limit, offset),
        count_sql: Some(format!("SELECT COUNT(*) AS count FROM ({})", base)),
        paging: Paging::InQuery,
    }
}

fn unpaged(sql: String) -> QueryPlan {
    QueryPlan::Sql {
        sql,
        count_sql: None,
        paging: Paging::InMemory,
    }
}

fn note_select(pattern: &str) -> String {
    format!(
        "SELECT {} FROM read_markdown('{}')",
        NOTE_COLUMNS,
        escape_sql_string(pattern)
    )
}

pub struct QueryBuilder<'a> {
    global_views: &'a BTreeMap<String, ViewConfig>,
    ctx: TemplateContext<'a>,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(global_views: &'a BTreeMap<String, ViewConfig>) -> Self {
        Self::with_context(global_views, TemplateContext::system())
    }

    pub fn with_context(global_views: &'a BTreeMap<String, ViewConfig>, ctx: TemplateContext<'a>) -> Self {
        Self { global_views, ctx }
    }

    pub fn registry<'n>(&self, notebook: &'n Notebook) -> ViewRegistry<'n>
    where
        'a: 'n,
    {
        ViewRegistry::new(&notebook.config.views, self.global_views)
    }

    /// Builds the query for `request`. Fails before anything runs if the request is
    /// unsafe or malformed.
    pub fn build(
        &self,
        request: &SearchRequest,
        notebook: &Notebook,
        limit: usize,
        offset: usize,
    ) -> Result<BuiltQuery> {
        let built = match request {
            SearchRequest::Text(text) => self.text(text, limit, offset),
            SearchRequest::Fuzzy(query) if query.trim().is_empty() => self.text("", limit, offset),
            SearchRequest::Fuzzy(query) => BuiltQuery {
                kind: "fuzzy",
                described_as: format!("fuzzy search for '{}'", query),
                plan: QueryPlan::Fuzzy {
                    query: query.clone(),
                },
            },
            SearchRequest::Sql(sql) => {
                validate_sql(sql)?;
                BuiltQuery {
                    kind: "sql",
                    described_as: "SQL query".to_string(),
                    plan: unpaged(sql.trim().to_string()),
                }
            }
            SearchRequest::Boolean(filters) => {
                for cond in filters.and.iter().chain(&filters.or).chain(&filters.not) {
                    if let Some(parsed) = filter::parse_condition(cond) {
                        if parsed.field == "path" {
                            reject_traversal(&parsed.value)?;
                        }
                    }
                }
                let mut base = note_select(ALL_NOTES);
                let described_as = match filter::build_where(filters) {
                    Some(predicate) => {
                        base = format!("{} WHERE {}", base, predicate);
                        format!("boolean filter: {}", predicate)
                    }
                    None => "boolean filter: (none)".to_string(),
                };
                BuiltQuery {
                    kind: "boolean",
                    described_as,
                    plan: windowed(&base, "file_path ASC", limit, offset),
                }
            }
            SearchRequest::View { name, params } => self.view(name, params, notebook)?,
        };

        tracing::debug!(kind = built.kind, sql = ?built.sql(), "built query");
        Ok(built)
    }

    fn text(&self, text: &str, limit: usize, offset: usize) -> BuiltQuery {
        let base = if text.is_empty() {
            note_select(ALL_NOTES)
        } else {
            let needle = escape_sql_string(text);
            format!(
                "{} WHERE content LIKE '%{}%' OR metadata->>'title' LIKE '%{}%'",
                note_select(ALL_NOTES),
                needle,
                needle
            )
        };
        let described_as = if text.is_empty() {
            "all notes".to_string()
        } else {
            format!("text search for '{}'", text)
        };
        BuiltQuery {
            kind: "text",
            described_as,
            plan: windowed(&base, "file_path ASC", limit, offset),
        }
    }

    fn view(
        &self,
        name: &str,
        params: &BTreeMap<String, String>,
        notebook: &Notebook,
    ) -> Result<BuiltQuery> {
        let def = self.registry(notebook).get(name)?;
        let bound = bind_parameters(&def, params)?;

        let plan = match &def.body {
            ViewBody::Sql(template) => unpaged(render_sql(&def, template, &bound, &self.ctx)?),
            ViewBody::Special(SpecialView::BrokenLinks) => {
                QueryPlan::LinkGraph(LinkGraphView::BrokenLinks)
            }
            ViewBody::Special(SpecialView::Orphans) => {
                let definition = bound.get("definition").map(String::as_str).unwrap_or("");
                QueryPlan::LinkGraph(LinkGraphView::Orphans(OrphanDefinition::parse(definition)?))
            }
        };

        Ok(BuiltQuery {
            kind: "view",
            described_as: format!("view '{}' ({})", def.name, def.origin),
            plan,
        })
    }

    /// Lists notes matching a glob, sorted with missing values last.
    pub fn list(&self, options: &ListOptions, limit: usize, offset: usize) -> Result<BuiltQuery> {
        let pattern = options.pattern.as_deref().unwrap_or(ALL_NOTES);
        validate_pattern(pattern)?;
        let base = note_select(pattern);
        let order_by = format!(
            "{} {} NULLS LAST",
            options.sort_by.column(),
            options.sort_order.keyword()
        );
        Ok(BuiltQuery {
            kind: "list",
            described_as: format!("notes matching '{}'", pattern),
            plan: windowed(&base, &order_by, limit, offset),
        })
    }
}

/// Statement fetching a single note with its frontmatter and word count.
pub fn note_sql(path: &str) -> Result<String> {
    validate_note_path(path)?;
    Ok(format!(
        "SELECT file_path as path, metadata->>'title' as title, content, \
         metadata as frontmatter, \
         length(content) - length(replace(content, ' ', '')) + 1 as wordCount \
         FROM read_markdown('{}')",
        escape_sql_string(path)
    ))
}

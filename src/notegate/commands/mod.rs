use crate::capability::CapabilityCache;
use crate::error::{or_degrade, FailureContext, NotegateError, Result};
use crate::executor::{run_cancellable, QueryExecutor};
use crate::model::{NoteContent, NotebookInfo, Page, Row};
use crate::notebook::Notebook;
use crate::pagination::PaginationEngine;
use crate::query::fuzzy::parse_listing;
use crate::query::{BuiltQuery, LinkGraphView, Paging, QueryPlan};
use crate::views::special::{self, LINK_GRAPH_SQL};
use serde::Serialize;
use std::path::Path;
use tokio_util::sync::CancellationToken;

pub mod get;
pub mod list;
pub mod notebooks;
pub mod search;
pub mod view;

pub use view::ViewSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLevel {
    Info,
    Success,
    Warning,
}

#[derive(Debug, Clone)]
pub struct CmdMessage {
    pub level: MessageLevel,
    pub content: String,
}

impl CmdMessage {
    pub fn info(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Info,
            content: content.into(),
        }
    }

    pub fn success(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Success,
            content: content.into(),
        }
    }

    pub fn warning(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Warning,
            content: content.into(),
        }
    }
}

/// What was run, for display next to the results.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuerySummary {
    pub kind: &'static str,
    pub described_as: String,
}

impl From<&BuiltQuery> for QuerySummary {
    fn from(built: &BuiltQuery) -> Self {
        Self {
            kind: built.kind,
            described_as: built.described_as.clone(),
        }
    }
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CmdResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<QuerySummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<Page>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<NoteContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notebooks: Vec<NotebookInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub views: Vec<ViewSummary>,
    #[serde(skip)]
    pub messages: Vec<CmdMessage>,
}

impl CmdResult {
    pub fn add_message(&mut self, message: CmdMessage) {
        self.messages.push(message);
    }

    pub fn with_query(mut self, built: &BuiltQuery) -> Self {
        self.query = Some(built.into());
        self
    }

    pub fn with_page(mut self, page: Page) -> Self {
        self.page = Some(page);
        self
    }

    pub fn with_note(mut self, note: NoteContent) -> Self {
        self.note = Some(note);
        self
    }

    pub fn with_notebooks(mut self, notebooks: Vec<NotebookInfo>) -> Self {
        self.notebooks = notebooks;
        self
    }

    pub fn with_views(mut self, views: Vec<ViewSummary>) -> Self {
        self.views = views;
        self
    }
}

/// Everything a command needs to talk to the executor.
pub struct Runtime<'a, E: QueryExecutor + ?Sized> {
    pub executor: &'a E,
    pub pagination: PaginationEngine,
    pub cancel: &'a CancellationToken,
    pub capability: Option<&'a CapabilityCache>,
}

impl<'a, E: QueryExecutor + ?Sized> Runtime<'a, E> {
    pub fn new(executor: &'a E, pagination: PaginationEngine, cancel: &'a CancellationToken) -> Self {
        Self {
            executor,
            pagination,
            cancel,
            capability: None,
        }
    }

    /// Probes the executor through `cache` before its first use.
    pub fn with_capability(mut self, cache: &'a CapabilityCache) -> Self {
        self.capability = Some(cache);
        self
    }

    async fn ready(&self) -> Result<()> {
        if let Some(cache) = self.capability {
            run_cancellable(self.cancel, cache.check(self.executor)).await?;
        }
        Ok(())
    }

    /// Runs `sql` against `notebook`, dropping any row that points outside it.
    pub async fn execute(&self, notebook: &Notebook, sql: &str) -> Result<Vec<Row>> {
        self.ready().await?;
        let rows = run_cancellable(self.cancel, self.executor.execute(notebook, sql)).await?;
        Ok(isolate(notebook, rows))
    }

    pub async fn fuzzy(&self, notebook: &Notebook, query: &str) -> Result<Vec<Row>> {
        self.ready().await?;
        let listing = run_cancellable(self.cancel, self.executor.fuzzy(notebook, query)).await?;
        Ok(isolate(notebook, parse_listing(&listing)))
    }

    /// Total from a `COUNT(*)` statement, or `fallback` if it can't be had.
    pub async fn count(&self, notebook: &Notebook, count_sql: &str, fallback: usize) -> Result<usize> {
        let counted = self
            .execute(notebook, count_sql)
            .await
            .and_then(|rows| count_of(&rows));
        or_degrade(counted.map(|n| n.max(fallback)), fallback)
    }

    /// Executes a built query and returns one bounded page.
    pub async fn fetch(
        &self,
        notebook: &Notebook,
        built: &BuiltQuery,
        limit: usize,
        offset: usize,
    ) -> Result<Page> {
        self.fetch_plan(notebook, built, limit, offset)
            .await
            .map_err(|e| e.reclassify(FailureContext::Notebook(&notebook.path)))
    }

    async fn fetch_plan(
        &self,
        notebook: &Notebook,
        built: &BuiltQuery,
        limit: usize,
        offset: usize,
    ) -> Result<Page> {
        match &built.plan {
            QueryPlan::Sql {
                sql,
                count_sql,
                paging: Paging::InQuery,
            } => {
                let rows = self.execute(notebook, sql).await?;
                let seen = offset.saturating_add(rows.len());
                let total = match count_sql {
                    Some(count_sql) => self.count(notebook, count_sql, seen).await?,
                    None => seen,
                };
                Ok(self.page(rows, total, limit, offset))
            }
            QueryPlan::Sql { sql, .. } => {
                let rows = self.execute(notebook, sql).await?;
                Ok(self.slice(rows, limit, offset))
            }
            QueryPlan::Fuzzy { query } => {
                let rows = self.fuzzy(notebook, query).await?;
                Ok(self.slice(rows, limit, offset))
            }
            QueryPlan::LinkGraph(view) => {
                let notes = self.execute(notebook, LINK_GRAPH_SQL).await?;
                let rows = match view {
                    LinkGraphView::Orphans(definition) => special::orphans(&notes, *definition),
                    LinkGraphView::BrokenLinks => special::broken_links(&notes),
                };
                Ok(self.slice(rows, limit, offset))
            }
        }
    }

    fn slice(&self, rows: Vec<Row>, limit: usize, offset: usize) -> Page {
        let total = rows.len();
        let window = rows.into_iter().skip(offset).take(limit).collect();
        self.page(window, total, limit, offset)
    }

    fn page(&self, rows: Vec<Row>, total: usize, limit: usize, offset: usize) -> Page {
        let fitted = self.pagination.fit_to_budget(
            rows,
            |row| serde_json::to_string(row).unwrap_or_default(),
            None,
        );
        let pagination = self
            .pagination
            .paginate(fitted.items.len(), total, limit, offset);
        Page {
            items: fitted.items,
            pagination,
            truncated: fitted.truncated,
        }
    }
}

fn count_of(rows: &[Row]) -> Result<usize> {
    rows.first()
        .and_then(|row| row.get("count"))
        .and_then(|v| v.as_u64().or_else(|| v.as_f64().map(|f| f as u64)))
        .map(|n| n as usize)
        .ok_or_else(|| NotegateError::Parse("count query returned no count".to_string()))
}

/// Drops rows whose path escapes the notebook.
fn isolate(notebook: &Notebook, rows: Vec<Row>) -> Vec<Row> {
    rows.into_iter()
        .filter(|row| match row.path() {
            Some(path) if !notebook.contains(Path::new(path)) => {
                tracing::warn!(
                    notebook = %notebook.path.display(),
                    path,
                    "dropping row from outside the notebook"
                );
                false
            }
            _ => true,
        })
        .collect()
}

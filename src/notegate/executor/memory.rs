use super::{ExecutorInfo, QueryExecutor};
use crate::error::{classify_failure, FailureContext, NotegateError, Result};
use crate::model::Row;
use crate::notebook::Notebook;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

static COUNT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*SELECT\s+COUNT\(\*\)").expect("valid count regex"));

static WINDOW_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bLIMIT\s+(\d+)(?:\s+OFFSET\s+(\d+))?\s*$").expect("valid window regex")
});

type Responder = dyn Fn(&Notebook, &str) -> Result<Vec<Row>> + Send + Sync;

/// In-process executor for tests.
///
/// Holds canned rows per notebook root. Count statements are answered with the
/// number of rows and a trailing `LIMIT n OFFSET m` is honoured, so paged queries
/// behave like they would against the real engine. Clones share the statement log.
#[derive(Clone, Default)]
pub struct InMemoryExecutor {
    rows: HashMap<PathBuf, Vec<Row>>,
    listings: HashMap<PathBuf, String>,
    responder: Option<Arc<Responder>>,
    failure: Option<String>,
    hang: bool,
    statements: Arc<Mutex<Vec<String>>>,
    probe_failures: Arc<AtomicUsize>,
    probes: Arc<AtomicUsize>,
}

impl InMemoryExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(mut self, root: impl AsRef<Path>, rows: Vec<Row>) -> Self {
        self.rows.insert(root.as_ref().to_path_buf(), rows);
        self
    }

    pub fn with_listing(mut self, root: impl AsRef<Path>, listing: impl Into<String>) -> Self {
        self.listings
            .insert(root.as_ref().to_path_buf(), listing.into());
        self
    }

    /// Answers every statement through `f` instead of the canned rows.
    pub fn with_responder<F>(mut self, f: F) -> Self
    where
        F: Fn(&Notebook, &str) -> Result<Vec<Row>> + Send + Sync + 'static,
    {
        self.responder = Some(Arc::new(f));
        self
    }

    /// Fails every call as if the executor had printed `diagnostic` on stderr.
    pub fn failing(mut self, diagnostic: impl Into<String>) -> Self {
        self.failure = Some(diagnostic.into());
        self
    }

    /// Never completes a call.
    pub fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }

    /// The next `n` probes fail.
    pub fn fail_probes(self, n: usize) -> Self {
        self.probe_failures.store(n, Ordering::SeqCst);
        self
    }

    pub async fn statements(&self) -> Vec<String> {
        self.statements.lock().await.clone()
    }

    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    async fn record(&self, statement: String) -> Result<()> {
        self.statements.lock().await.push(statement);
        if self.hang {
            std::future::pending::<()>().await;
        }
        match &self.failure {
            Some(diagnostic) => Err(classify_failure(diagnostic, FailureContext::Search)),
            None => Ok(()),
        }
    }

    fn canned(&self, notebook: &Notebook, sql: &str) -> Vec<Row> {
        let rows = self.rows.get(&notebook.path).cloned().unwrap_or_default();

        if COUNT_RE.is_match(sql) {
            return vec![Row::Value(serde_json::Map::new()).with_field("count", rows.len())];
        }

        match WINDOW_RE.captures(sql) {
            Some(caps) => {
                let limit = caps[1].parse().unwrap_or(usize::MAX);
                let offset = caps
                    .get(2)
                    .and_then(|m| m.as_str().parse().ok())
                    .unwrap_or(0);
                rows.into_iter().skip(offset).take(limit).collect()
            }
            None => rows,
        }
    }
}

#[async_trait]
impl QueryExecutor for InMemoryExecutor {
    async fn execute(&self, notebook: &Notebook, sql: &str) -> Result<Vec<Row>> {
        self.record(sql.to_string()).await?;
        match &self.responder {
            Some(respond) => respond(notebook, sql),
            None => Ok(self.canned(notebook, sql)),
        }
    }

    async fn fuzzy(&self, notebook: &Notebook, query: &str) -> Result<String> {
        self.record(format!("fuzzy:{}", query)).await?;
        Ok(self.listings.get(&notebook.path).cloned().unwrap_or_default())
    }

    async fn probe(&self) -> Result<ExecutorInfo> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        let remaining = self.probe_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.probe_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(NotegateError::ExecutorUnavailable("in-memory probe failure".into()));
        }
        Ok(ExecutorInfo {
            name: "memory".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }
}

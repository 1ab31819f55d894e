//! # Query Executor
//!
//! The markdown-aware SQL engine is an external collaborator. This module defines
//! the seam ([`QueryExecutor`]) and two implementations:
//!
//! - [`process::ProcessExecutor`]: runs the configured executor binary as a child
//!   process, one invocation per statement, with a timeout.
//! - [`memory::InMemoryExecutor`]: canned rows per notebook, for tests.
//!
//! Callers race every call against a cancellation token (see [`run_cancellable`]);
//! dropping the in-flight future kills any child process.

use crate::error::{NotegateError, Result};
use crate::model::Row;
use crate::notebook::Notebook;
use async_trait::async_trait;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub mod memory;
pub mod process;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutorInfo {
    pub name: String,
    pub version: String,
}

#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Runs a read-only statement against the notebook's notes.
    async fn execute(&self, notebook: &Notebook, sql: &str) -> Result<Vec<Row>>;

    /// Native ranked, typo-tolerant search. Returns the plain-text listing.
    async fn fuzzy(&self, notebook: &Notebook, query: &str) -> Result<String>;

    /// Checks that the executor is installed and reports its version.
    async fn probe(&self) -> Result<ExecutorInfo>;
}

#[async_trait]
impl<E: QueryExecutor + ?Sized> QueryExecutor for Arc<E> {
    async fn execute(&self, notebook: &Notebook, sql: &str) -> Result<Vec<Row>> {
        (**self).execute(notebook, sql).await
    }

    async fn fuzzy(&self, notebook: &Notebook, query: &str) -> Result<String> {
        (**self).fuzzy(notebook, query).await
    }

    async fn probe(&self) -> Result<ExecutorInfo> {
        (**self).probe().await
    }
}

/// Awaits `fut` unless `cancel` fires first, in which case it is dropped.
pub async fn run_cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    if cancel.is_cancelled() {
        return Err(NotegateError::Aborted);
    }
    tokio::select! {
        _ = cancel.cancelled() => Err(NotegateError::Aborted),
        result = fut => result,
    }
}

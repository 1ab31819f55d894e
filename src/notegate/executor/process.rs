use super::{ExecutorInfo, QueryExecutor};
use crate::config::Settings;
use crate::error::{classify_failure, FailureContext, NotegateError, Result};
use crate::model::Row;
use crate::notebook::Notebook;
use async_trait::async_trait;
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

/// Runs the external executor binary, one child process per call.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    binary: String,
    timeout: Duration,
}

impl ProcessExecutor {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.executor.clone(),
            Duration::from_millis(settings.executor_timeout_ms),
        )
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    async fn run(&self, args: &[&str], notebook: Option<&Notebook>) -> Result<Output> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args).kill_on_drop(true);
        if let Some(nb) = notebook {
            cmd.current_dir(nb.notes_root());
        }

        tracing::debug!(binary = %self.binary, ?args, "spawning executor");
        let child = cmd.output();
        let output = match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(NotegateError::ExecutorUnavailable(format!(
                    "'{}' not found in PATH",
                    self.binary
                )));
            }
            Ok(Err(e)) => return Err(NotegateError::Io(e)),
            Err(_) => return Err(NotegateError::QueryTimeout(self.timeout.as_millis() as u64)),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let diagnostic = if stderr.trim().is_empty() {
                format!("executor exited with {}", output.status)
            } else {
                stderr.into_owned()
            };
            return Err(classify_failure(&diagnostic, FailureContext::Search));
        }
        Ok(output)
    }
}

/// Executor stdout is a JSON array of row objects; nothing at all means no rows.
pub fn parse_rows(stdout: &str) -> Result<Vec<Row>> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(trimmed).map_err(|e| NotegateError::Parse(e.to_string()))
}

#[async_trait]
impl QueryExecutor for ProcessExecutor {
    async fn execute(&self, notebook: &Notebook, sql: &str) -> Result<Vec<Row>> {
        let root = notebook.path.to_string_lossy().into_owned();
        let output = self
            .run(
                &["notes", "search", "--sql", sql, "--notebook", root.as_str()],
                Some(notebook),
            )
            .await?;
        parse_rows(&String::from_utf8_lossy(&output.stdout))
    }

    async fn fuzzy(&self, notebook: &Notebook, query: &str) -> Result<String> {
        let root = notebook.path.to_string_lossy().into_owned();
        let output = self
            .run(
                &["notes", "search", "--fuzzy", query, "--notebook", root.as_str()],
                Some(notebook),
            )
            .await?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn probe(&self) -> Result<ExecutorInfo> {
        let output = self.run(&["version"], None).await?;
        let version = String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .unwrap_or_default()
            .trim()
            .to_string();
        Ok(ExecutorInfo {
            name: self.binary.clone(),
            version,
        })
    }
}

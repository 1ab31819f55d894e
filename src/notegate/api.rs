//! # API Facade
//!
//! The API layer is a thin facade over the command layer and the single entry point
//! for every notegate operation, whatever the front end.
//!
//! The facade:
//! - resolves the target notebook for each call (fresh from disk every time)
//! - assembles the per-call [`Runtime`] (executor, budget, cancellation token,
//!   capability cache) and the [`QueryBuilder`]
//! - persists the global config after operations that change it
//! - dispatches to `commands/*.rs` and returns [`CmdResult`]
//!
//! It does no formatting and writes nothing to stdout or stderr.
//!
//! `NotegateApi<E: QueryExecutor>` is generic over the executor:
//! `ProcessExecutor` in production, `InMemoryExecutor` in tests.

use crate::capability::CapabilityCache;
use crate::commands::{self, CmdResult, Runtime};
use crate::config::{GlobalConfig, Settings};
use crate::error::Result;
use crate::executor::{ExecutorInfo, QueryExecutor};
use crate::model::{ListOptions, PageRequest, SearchParams, ViewConfig};
use crate::notebook::Notebook;
use crate::pagination::PaginationEngine;
use crate::query::QueryBuilder;
use crate::resolve::NotebookResolver;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

pub struct NotegateApi<E: QueryExecutor> {
    executor: E,
    global: GlobalConfig,
    settings: Settings,
    config_path: PathBuf,
    cwd: PathBuf,
    capability: CapabilityCache,
    cancel: CancellationToken,
}

impl<E: QueryExecutor> NotegateApi<E> {
    pub fn new(executor: E, global: GlobalConfig, config_path: PathBuf, cwd: PathBuf) -> Self {
        Self {
            executor,
            settings: global.settings.clone(),
            global,
            config_path,
            cwd,
            capability: CapabilityCache::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Effective settings for this process; not written back to the config file.
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Token that aborts whatever executor call is in flight.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn global(&self) -> &GlobalConfig {
        &self.global
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn resolve(&self, notebook: Option<&Path>) -> Result<Notebook> {
        NotebookResolver::new(&self.global).resolve(notebook, &self.cwd)
    }

    pub async fn check_executor(&self) -> Result<ExecutorInfo> {
        self.capability.check(&self.executor).await
    }

    pub async fn recheck_executor(&self) -> Result<ExecutorInfo> {
        self.capability.invalidate().await;
        self.check_executor().await
    }

    fn runtime(&self) -> Runtime<'_, E> {
        Runtime::new(
            &self.executor,
            PaginationEngine::from_settings(&self.settings),
            &self.cancel,
        )
        .with_capability(&self.capability)
    }

    fn builder(&self) -> QueryBuilder<'_> {
        QueryBuilder::new(&self.global.views)
    }

    fn persist(&self) -> Result<()> {
        self.global.save_to(&self.config_path)
    }

    pub async fn search(
        &self,
        notebook: Option<&Path>,
        params: SearchParams,
        page: PageRequest,
    ) -> Result<CmdResult> {
        let nb = self.resolve(notebook)?;
        commands::search::run(&self.runtime(), &self.builder(), &nb, params, page).await
    }

    pub async fn run_view(
        &self,
        notebook: Option<&Path>,
        name: &str,
        params: BTreeMap<String, String>,
        page: PageRequest,
    ) -> Result<CmdResult> {
        let nb = self.resolve(notebook)?;
        commands::view::run(&self.runtime(), &self.builder(), &nb, name, params, page).await
    }

    pub fn list_views(&self, notebook: Option<&Path>) -> Result<CmdResult> {
        let nb = self.resolve(notebook)?;
        Ok(commands::view::list(&self.builder(), &nb))
    }

    pub fn save_view(
        &self,
        notebook: Option<&Path>,
        name: &str,
        config: ViewConfig,
    ) -> Result<CmdResult> {
        let mut nb = self.resolve(notebook)?;
        commands::view::save(&mut nb, name, config)
    }

    pub fn delete_view(&self, notebook: Option<&Path>, name: &str) -> Result<CmdResult> {
        let mut nb = self.resolve(notebook)?;
        commands::view::delete(&mut nb, name)
    }

    pub async fn list_notes(
        &self,
        notebook: Option<&Path>,
        options: &ListOptions,
        page: PageRequest,
    ) -> Result<CmdResult> {
        let nb = self.resolve(notebook)?;
        commands::list::run(&self.runtime(), &self.builder(), &nb, options, page).await
    }

    pub async fn get_note(
        &self,
        notebook: Option<&Path>,
        path: &str,
        include_content: bool,
    ) -> Result<CmdResult> {
        let nb = self.resolve(notebook)?;
        commands::get::run(&self.runtime(), &nb, path, include_content).await
    }

    pub fn list_notebooks(&self) -> Result<CmdResult> {
        commands::notebooks::list(&self.global, &self.cwd)
    }

    pub async fn notebook_info(&self, notebook: Option<&Path>) -> Result<CmdResult> {
        let nb = self.resolve(notebook)?;
        commands::notebooks::info(&self.runtime(), &nb).await
    }

    pub fn create_notebook(&mut self, name: &str, dir: Option<&Path>) -> Result<CmdResult> {
        let dir = self.absolute(dir);
        let result = commands::notebooks::create(&mut self.global, name, &dir)?;
        self.persist()?;
        Ok(result)
    }

    pub fn register_notebook(&mut self, dir: &Path) -> Result<CmdResult> {
        let dir = self.absolute(Some(dir));
        let result = commands::notebooks::register(&mut self.global, &dir)?;
        self.persist()?;
        Ok(result)
    }

    pub fn pin_notebook(&mut self, dir: Option<&Path>) -> Result<CmdResult> {
        let dir = dir.map(|d| self.absolute(Some(d)));
        let result = commands::notebooks::pin(&mut self.global, dir.as_deref())?;
        self.persist()?;
        Ok(result)
    }

    pub fn add_context(&self, notebook: Option<&Path>, context: Option<&Path>) -> Result<CmdResult> {
        let mut nb = self.resolve(notebook)?;
        let context = self.absolute(context);
        commands::notebooks::add_context(&mut nb, &context)
    }

    fn absolute(&self, dir: Option<&Path>) -> PathBuf {
        match dir {
            Some(d) => self.cwd.join(d),
            None => self.cwd.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::memory::InMemoryExecutor;
    use crate::model::Row;
    use tempfile::tempdir;

    #[tokio::test]
    async fn search_resolves_notebook_from_cwd() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config/config.json");
        let nb_dir = dir.path().join("notes");
        std::fs::create_dir_all(&nb_dir).unwrap();

        let mut api = NotegateApi::new(
            InMemoryExecutor::new(),
            GlobalConfig::default(),
            config_path.clone(),
            nb_dir.clone(),
        );
        api.create_notebook("Work", None).unwrap();
        assert!(config_path.exists());

        let nb = api.resolve(None).unwrap();
        let api = NotegateApi::new(
            InMemoryExecutor::new().with_rows(&nb.path, vec![Row::note("todo.md")]),
            GlobalConfig::load_from(&config_path).unwrap(),
            config_path,
            nb_dir,
        );
        let result = api
            .search(None, SearchParams::default(), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(result.page.unwrap().items[0].path(), Some("todo.md"));
        assert_eq!(api.executor().probe_count(), 1);
    }

    #[test]
    fn missing_notebook_is_reported() {
        let dir = tempdir().unwrap();
        let api = NotegateApi::new(
            InMemoryExecutor::new(),
            GlobalConfig::default(),
            dir.path().join("config.json"),
            dir.path().to_path_buf(),
        );
        let err = api.list_views(None).unwrap_err();
        assert_eq!(err.kind().code(), "NOTEGATE_NOTEBOOK_NOT_FOUND");
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn recheck_probes_again() {
        let dir = tempdir().unwrap();
        let api = NotegateApi::new(
            InMemoryExecutor::new(),
            GlobalConfig::default(),
            dir.path().join("config.json"),
            dir.path().to_path_buf(),
        );
        api.check_executor().await.unwrap();
        api.check_executor().await.unwrap();
        api.recheck_executor().await.unwrap();
        assert_eq!(api.executor().probe_count(), 2);
    }
}

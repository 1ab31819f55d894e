use crate::api::NotegateApi;
use crate::config::GlobalConfig;
use crate::error::Result;
use crate::executor::process::ProcessExecutor;
use std::path::{Path, PathBuf};

pub struct NotegateContext {
    pub api: NotegateApi<ProcessExecutor>,
    pub config_path: PathBuf,
}

/// Loads the global config (honouring `NOTEGATE_CONFIG`), applies the settings env
/// overrides and wires up the production executor.
pub fn initialize(cwd: &Path) -> Result<NotegateContext> {
    let config_path = GlobalConfig::default_path()?;
    let global = GlobalConfig::load_from(&config_path)?;
    let settings = global.settings.clone().with_env();

    tracing::debug!(
        config = %config_path.display(),
        executor = %settings.executor,
        "initialized"
    );

    let executor = ProcessExecutor::from_settings(&settings);
    let api = NotegateApi::new(executor, global, config_path.clone(), cwd.to_path_buf())
        .with_settings(settings);
    Ok(NotegateContext { api, config_path })
}

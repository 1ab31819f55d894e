use crate::error::{NotegateError, Result};
use crate::model::ViewConfig;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const GLOBAL_CONFIG_FILENAME: &str = "config.json";
/// Full path of the global config file, overriding the per-user location.
pub const CONFIG_ENV: &str = "NOTEGATE_CONFIG";

const DEFAULT_PAGE_SIZE: usize = 50;
const DEFAULT_MAX_OUTPUT_BYTES: usize = 50 * 1024;
const DEFAULT_MAX_OUTPUT_LINES: usize = 2000;
const DEFAULT_BUDGET_RATIO: f64 = 0.75;
const DEFAULT_EXECUTOR: &str = "opennotes";
const DEFAULT_EXECUTOR_TIMEOUT_MS: u64 = 30_000;

/// Process-wide configuration, stored in the user's config dir.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GlobalConfig {
    /// Registered notebook roots, in registration order.
    #[serde(default)]
    pub notebooks: Vec<PathBuf>,

    /// Explicitly pinned current notebook.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notebook_path: Option<PathBuf>,

    /// Views available in every notebook.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub views: BTreeMap<String, ViewConfig>,

    #[serde(default)]
    pub settings: Settings,
}

impl GlobalConfig {
    /// `$NOTEGATE_CONFIG` if set, otherwise `config.json` in the platform config dir.
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Ok(PathBuf::from(path));
        }
        let dirs = ProjectDirs::from("com", "notegate", "notegate").ok_or_else(|| {
            NotegateError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "could not determine config directory",
            ))
        })?;
        Ok(dirs.config_dir().join(GLOBAL_CONFIG_FILENAME))
    }

    pub fn load() -> Result<Self> {
        Self::load_from(Self::default_path()?)
    }

    /// Load from `path`, returning defaults if the file does not exist.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| NotegateError::ConfigParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(Self::default_path()?)
    }

    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Adds a notebook root. Returns false if it was already registered.
    pub fn register(&mut self, root: &Path) -> bool {
        if self.notebooks.iter().any(|p| p == root) {
            return false;
        }
        self.notebooks.push(root.to_path_buf());
        true
    }

    pub fn set_current(&mut self, root: Option<PathBuf>) {
        self.notebook_path = root;
    }
}

/// Tunables under the `settings` key of the global config.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,

    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,

    #[serde(default = "default_max_output_lines")]
    pub max_output_lines: usize,

    #[serde(default = "default_budget_ratio")]
    pub budget_ratio: f64,

    /// Query executor binary name or path.
    #[serde(default = "default_executor")]
    pub executor: String,

    #[serde(default = "default_executor_timeout_ms")]
    pub executor_timeout_ms: u64,
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_max_output_bytes() -> usize {
    DEFAULT_MAX_OUTPUT_BYTES
}

fn default_max_output_lines() -> usize {
    DEFAULT_MAX_OUTPUT_LINES
}

fn default_budget_ratio() -> f64 {
    DEFAULT_BUDGET_RATIO
}

fn default_executor() -> String {
    DEFAULT_EXECUTOR.to_string()
}

fn default_executor_timeout_ms() -> u64 {
    DEFAULT_EXECUTOR_TIMEOUT_MS
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            max_output_lines: DEFAULT_MAX_OUTPUT_LINES,
            budget_ratio: DEFAULT_BUDGET_RATIO,
            executor: DEFAULT_EXECUTOR.to_string(),
            executor_timeout_ms: DEFAULT_EXECUTOR_TIMEOUT_MS,
        }
    }
}

impl Settings {
    /// Applies `NOTEGATE_PAGE_SIZE`, `NOTEGATE_EXECUTOR` and `NOTEGATE_TIMEOUT_MS`.
    pub fn with_env(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Unparsable or non-positive values are ignored.
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(size) = lookup("NOTEGATE_PAGE_SIZE")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|v| *v > 0)
        {
            self.default_page_size = size;
        }
        if let Some(executor) = lookup("NOTEGATE_EXECUTOR").filter(|v| !v.trim().is_empty()) {
            self.executor = executor;
        }
        if let Some(timeout) = lookup("NOTEGATE_TIMEOUT_MS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|v| *v > 0)
        {
            self.executor_timeout_ms = timeout;
        }
        self
    }

    pub fn budget(&self) -> BudgetConfig {
        BudgetConfig::new(
            self.max_output_bytes,
            self.max_output_lines,
            self.budget_ratio,
        )
    }
}

/// Output allowance for a single response.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BudgetConfig {
    pub max_output_bytes: usize,
    pub max_output_lines: usize,
    pub budget_ratio: f64,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            max_output_lines: DEFAULT_MAX_OUTPUT_LINES,
            budget_ratio: DEFAULT_BUDGET_RATIO,
        }
    }
}

impl BudgetConfig {
    /// Out-of-range values fall back to the defaults.
    pub fn new(max_output_bytes: usize, max_output_lines: usize, budget_ratio: f64) -> Self {
        let defaults = Self::default();
        let ratio_ok = budget_ratio > 0.0 && budget_ratio <= 1.0;
        if max_output_bytes == 0 || max_output_lines == 0 || !ratio_ok {
            tracing::warn!(
                max_output_bytes,
                max_output_lines,
                budget_ratio,
                "invalid output budget, using defaults"
            );
        }
        Self {
            max_output_bytes: if max_output_bytes > 0 {
                max_output_bytes
            } else {
                defaults.max_output_bytes
            },
            max_output_lines: if max_output_lines > 0 {
                max_output_lines
            } else {
                defaults.max_output_lines
            },
            budget_ratio: if ratio_ok {
                budget_ratio
            } else {
                defaults.budget_ratio
            },
        }
    }

    /// Effective `(bytes, lines)` limits for `ratio`, or the configured ratio.
    pub fn limits(&self, ratio: Option<f64>) -> (usize, usize) {
        let ratio = ratio
            .filter(|r| *r > 0.0 && *r <= 1.0)
            .unwrap_or(self.budget_ratio);
        (
            (self.max_output_bytes as f64 * ratio).floor() as usize,
            (self.max_output_lines as f64 * ratio).floor() as usize,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.default_page_size, 50);
        assert_eq!(settings.max_output_bytes, 51200);
        assert_eq!(settings.max_output_lines, 2000);
        assert_eq!(settings.budget_ratio, 0.75);
        assert_eq!(settings.executor, "opennotes");
    }

    #[test]
    fn test_load_missing_config() {
        let temp = TempDir::new().unwrap();
        let config = GlobalConfig::load_from(temp.path().join("config.json")).unwrap();
        assert_eq!(config, GlobalConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("config.json");

        let mut config = GlobalConfig::default();
        assert!(config.register(Path::new("/notes/a")));
        assert!(!config.register(Path::new("/notes/a")));
        config.set_current(Some(PathBuf::from("/notes/a")));
        config.settings.default_page_size = 10;
        config.save_to(&path).unwrap();

        let loaded = GlobalConfig::load_from(&path).unwrap();
        assert_eq!(loaded.notebooks, vec![PathBuf::from("/notes/a")]);
        assert_eq!(loaded.notebook_path, Some(PathBuf::from("/notes/a")));
        assert_eq!(loaded.settings.default_page_size, 10);
    }

    #[test]
    fn test_partial_settings_use_defaults() {
        let config: GlobalConfig =
            serde_json::from_str(r#"{"notebooks":[],"settings":{"maxOutputLines":10}}"#).unwrap();
        assert_eq!(config.settings.max_output_lines, 10);
        assert_eq!(config.settings.max_output_bytes, 51200);
    }

    #[test]
    fn test_malformed_config_is_config_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        fs::write(&path, "{not json").unwrap();
        let err = GlobalConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, NotegateError::ConfigParse { .. }));
    }

    #[test]
    fn test_env_overrides() {
        let settings = Settings::default().with_overrides(|key| match key {
            "NOTEGATE_PAGE_SIZE" => Some("20".into()),
            "NOTEGATE_EXECUTOR" => Some("/bin/notes".into()),
            "NOTEGATE_TIMEOUT_MS" => Some("-5".into()),
            _ => None,
        });
        assert_eq!(settings.default_page_size, 20);
        assert_eq!(settings.executor, "/bin/notes");
        assert_eq!(settings.executor_timeout_ms, 30_000);
    }

    #[test]
    fn test_zero_page_size_override_ignored() {
        let settings = Settings::default().with_overrides(|key| {
            (key == "NOTEGATE_PAGE_SIZE").then(|| "0".to_string())
        });
        assert_eq!(settings.default_page_size, 50);
    }

    #[test]
    fn test_budget_limits() {
        let budget = BudgetConfig::new(1000, 100, 0.5);
        assert_eq!(budget.limits(None), (500, 50));
        assert_eq!(budget.limits(Some(1.0)), (1000, 100));
        assert_eq!(budget.limits(Some(7.0)), (500, 50));
    }

    #[test]
    fn test_invalid_budget_falls_back() {
        let budget = BudgetConfig::new(0, 0, 2.0);
        assert_eq!(budget, BudgetConfig::default());
    }
}

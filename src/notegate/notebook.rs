use crate::error::{NotegateError, Result};
use crate::model::{NotebookSource, ViewConfig};
use crate::views;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

pub const NOTEBOOK_CONFIG_FILENAME: &str = ".notegate.json";

fn default_root() -> String {
    ".".to_string()
}

/// A named set of globs with shared metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NotebookGroup {
    pub name: String,
    #[serde(default)]
    pub globs: Vec<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

/// Contents of `.notegate.json` at a notebook root.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NotebookConfig {
    pub name: String,

    /// Notes directory, relative to the config file.
    #[serde(default = "default_root")]
    pub root: String,

    /// Directories that select this notebook when they contain the cwd.
    #[serde(default)]
    pub contexts: Vec<PathBuf>,

    #[serde(default)]
    pub templates: BTreeMap<String, String>,

    #[serde(default)]
    pub groups: Vec<NotebookGroup>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub views: BTreeMap<String, ViewConfig>,
}

impl NotebookConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            root: default_root(),
            contexts: Vec::new(),
            templates: BTreeMap::new(),
            groups: Vec::new(),
            views: BTreeMap::new(),
        }
    }

    pub fn config_path(dir: &Path) -> PathBuf {
        dir.join(NOTEBOOK_CONFIG_FILENAME)
    }

    pub fn exists(dir: &Path) -> bool {
        Self::config_path(dir).is_file()
    }

    /// Reads and validates the config in `dir`. Relative contexts are resolved
    /// against `dir`, which must be absolute.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = Self::config_path(dir);
        let content = fs::read_to_string(&path)?;
        let mut config: NotebookConfig =
            serde_json::from_str(&content).map_err(|e| NotegateError::ConfigParse {
                path: path.clone(),
                message: e.to_string(),
            })?;
        config.validate().map_err(|e| NotegateError::ConfigParse {
            path: path.clone(),
            message: e.to_string(),
        })?;
        config.contexts = config
            .contexts
            .iter()
            .map(|c| normalize_path(&dir.join(c)))
            .collect();
        Ok(config)
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        self.validate()?;
        if !dir.exists() {
            fs::create_dir_all(dir)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(Self::config_path(dir), content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(NotegateError::Parse(
                "notebook name must not be empty".to_string(),
            ));
        }
        if self.root.split(['/', '\\']).any(|part| part == "..") {
            return Err(NotegateError::PathTraversal(self.root.clone()));
        }
        for (name, view) in &self.views {
            views::validate_view_config(name, view)?;
        }
        Ok(())
    }
}

/// A resolved notebook: where it lives, what it declares and how it was found.
#[derive(Debug, Clone, PartialEq)]
pub struct Notebook {
    pub path: PathBuf,
    pub config: NotebookConfig,
    pub source: NotebookSource,
}

impl Notebook {
    pub fn open(dir: &Path, source: NotebookSource) -> Result<Self> {
        let path = absolute(dir)?;
        let config = NotebookConfig::load(&path)?;
        Ok(Self {
            path,
            config,
            source,
        })
    }

    /// Writes a fresh config in `dir`, claiming `dir` as its first context.
    pub fn create(name: &str, dir: &Path) -> Result<Self> {
        let path = absolute(dir)?;
        if NotebookConfig::exists(&path) {
            return Err(NotegateError::NotebookExists(path));
        }
        let mut config = NotebookConfig::new(name.trim());
        config.contexts.push(path.clone());
        config.save(&path)?;
        tracing::debug!(path = %path.display(), name, "created notebook");
        Ok(Self {
            path,
            config,
            source: NotebookSource::Explicit,
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Directory holding the notes.
    pub fn notes_root(&self) -> PathBuf {
        normalize_path(&self.path.join(&self.config.root))
    }

    pub fn matches_context(&self, cwd: &Path) -> bool {
        let cwd = normalize_path(cwd);
        self.config.contexts.iter().any(|c| cwd.starts_with(c))
    }

    /// True if `path` (absolute, or relative to the notes root) stays inside this notebook.
    pub fn contains(&self, path: &Path) -> bool {
        let root = self.notes_root();
        let full = normalize_path(&root.join(path));
        full.starts_with(&root) || full.starts_with(&self.path)
    }

    /// Adds a context directory and persists. Returns false if it was already present.
    pub fn add_context(&mut self, context: &Path) -> Result<bool> {
        let context = normalize_path(&self.path.join(context));
        if self.config.contexts.contains(&context) {
            return Ok(false);
        }
        self.config.contexts.push(context);
        self.save()?;
        Ok(true)
    }

    /// Stores a notebook view and persists. Returns true if one was replaced.
    pub fn save_view(&mut self, name: &str, view: ViewConfig) -> Result<bool> {
        views::validate_view_config(name, &view)?;
        let overwritten = self.config.views.insert(name.to_string(), view).is_some();
        self.save()?;
        Ok(overwritten)
    }

    /// Removes a notebook view. Returns false if it did not exist.
    pub fn delete_view(&mut self, name: &str) -> Result<bool> {
        let existed = self.config.views.remove(name).is_some();
        if existed {
            self.save()?;
        }
        Ok(existed)
    }

    pub fn save(&self) -> Result<()> {
        self.config.save(&self.path)
    }
}

fn absolute(dir: &Path) -> Result<PathBuf> {
    if dir.is_absolute() {
        Ok(normalize_path(dir))
    } else {
        Ok(normalize_path(&std::env::current_dir()?.join(dir)))
    }
}

/// Lexically resolves `.` and `..` without touching the filesystem.
pub(crate) fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_and_open() {
        let temp = TempDir::new().unwrap();
        let nb = Notebook::create("Work", temp.path()).unwrap();
        assert_eq!(nb.name(), "Work");
        assert!(NotebookConfig::exists(temp.path()));

        let opened = Notebook::open(temp.path(), NotebookSource::Explicit).unwrap();
        assert_eq!(opened.config, nb.config);
        assert_eq!(opened.config.contexts, vec![nb.path.clone()]);
    }

    #[test]
    fn test_create_twice_fails() {
        let temp = TempDir::new().unwrap();
        Notebook::create("Work", temp.path()).unwrap();
        let err = Notebook::create("Again", temp.path()).unwrap_err();
        assert!(matches!(err, NotegateError::NotebookExists(_)));
    }

    #[test]
    fn test_empty_name_is_invalid() {
        let temp = TempDir::new().unwrap();
        fs::write(
            NotebookConfig::config_path(temp.path()),
            r#"{"name":"  "}"#,
        )
        .unwrap();
        let err = Notebook::open(temp.path(), NotebookSource::Explicit).unwrap_err();
        assert!(matches!(err, NotegateError::ConfigParse { .. }));
    }

    #[test]
    fn test_relative_contexts_become_absolute() {
        let temp = TempDir::new().unwrap();
        fs::write(
            NotebookConfig::config_path(temp.path()),
            r#"{"name":"n","contexts":["../projects/app", "."]}"#,
        )
        .unwrap();
        let nb = Notebook::open(temp.path(), NotebookSource::Explicit).unwrap();
        for ctx in &nb.config.contexts {
            assert!(ctx.is_absolute());
        }
        assert_eq!(nb.config.contexts[1], nb.path);
        assert!(nb.matches_context(&nb.path.join("sub/dir")));
    }

    #[test]
    fn test_add_context_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let mut nb = Notebook::create("Work", temp.path()).unwrap();
        let other = temp.path().join("elsewhere");
        assert!(nb.add_context(&other).unwrap());
        assert!(!nb.add_context(&other).unwrap());

        let reopened = Notebook::open(temp.path(), NotebookSource::Explicit).unwrap();
        assert_eq!(reopened.config.contexts.len(), 2);
    }

    #[test]
    fn test_save_and_delete_view() {
        let temp = TempDir::new().unwrap();
        let mut nb = Notebook::create("Work", temp.path()).unwrap();
        let view = ViewConfig {
            description: Some("drafts".into()),
            parameters: vec![],
            query: "SELECT * FROM read_markdown('**/*.md')".into(),
        };
        assert!(!nb.save_view("drafts", view.clone()).unwrap());
        assert!(nb.save_view("drafts", view).unwrap());
        assert!(nb.delete_view("drafts").unwrap());
        assert!(!nb.delete_view("drafts").unwrap());
    }

    #[test]
    fn test_save_view_rejects_bad_name() {
        let temp = TempDir::new().unwrap();
        let mut nb = Notebook::create("Work", temp.path()).unwrap();
        let view = ViewConfig {
            description: None,
            parameters: vec![],
            query: "SELECT 1".into(),
        };
        assert!(nb.save_view("bad name!", view).is_err());
    }

    #[test]
    fn test_contains() {
        let temp = TempDir::new().unwrap();
        let nb = Notebook::create("Work", temp.path()).unwrap();
        assert!(nb.contains(Path::new("notes/a.md")));
        assert!(nb.contains(&nb.path.join("a.md")));
        assert!(!nb.contains(Path::new("../other/a.md")));
        assert!(!nb.contains(Path::new("/somewhere/else.md")));
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path(Path::new("/a/b/../c/./d")),
            PathBuf::from("/a/c/d")
        );
    }
}

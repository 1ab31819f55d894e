//! Notebook resolution.
//!
//! Finds the single notebook a request operates on. Sources are tried in a fixed
//! order and the first hit wins:
//!
//! 1. an explicit path (an invalid one is an error, not a fallthrough; `..` is refused)
//! 2. the pinned `notebookPath` from the global config
//! 3. the first registered notebook whose contexts contain the cwd
//! 4. the nearest ancestor of the cwd holding a valid `.notegate.json`
//!
//! Nothing is cached: every call re-reads from disk.

use crate::config::GlobalConfig;
use crate::error::{NotegateError, Result};
use crate::model::NotebookSource;
use crate::notebook::{normalize_path, Notebook, NotebookConfig};
use crate::validation::reject_traversal;
use std::path::Path;

/// Upper bound on directories visited by the ancestor walk.
pub const MAX_ANCESTOR_DEPTH: usize = 256;

pub struct NotebookResolver<'a> {
    global: &'a GlobalConfig,
}

impl<'a> NotebookResolver<'a> {
    pub fn new(global: &'a GlobalConfig) -> Self {
        Self { global }
    }

    pub fn resolve(&self, explicit: Option<&Path>, cwd: &Path) -> Result<Notebook> {
        self.try_resolve(explicit, cwd)?
            .ok_or_else(|| NotegateError::NotebookNotFound {
                searched_from: cwd.to_path_buf(),
            })
    }

    /// Like [`resolve`](Self::resolve) but reports "nothing found" as `Ok(None)`.
    pub fn try_resolve(&self, explicit: Option<&Path>, cwd: &Path) -> Result<Option<Notebook>> {
        let cwd = normalize_path(cwd);

        if let Some(path) = explicit {
            reject_traversal(&path.to_string_lossy())?;
            let dir = normalize_path(&cwd.join(path));
            tracing::debug!(path = %dir.display(), "resolving explicit notebook");
            return open_explicit(&dir).map(Some);
        }

        if let Some(pinned) = &self.global.notebook_path {
            if let Some(nb) = open_quietly(pinned, NotebookSource::Registered) {
                tracing::debug!(path = %nb.path.display(), "using pinned notebook");
                return Ok(Some(nb));
            }
        }

        for root in &self.global.notebooks {
            if let Some(nb) = open_quietly(root, NotebookSource::Registered) {
                if nb.matches_context(&cwd) {
                    tracing::debug!(path = %nb.path.display(), "cwd matches notebook context");
                    return Ok(Some(nb));
                }
            }
        }

        let nb = find_ancestor_notebook(&cwd);
        if let Some(nb) = &nb {
            tracing::debug!(path = %nb.path.display(), "found ancestor notebook");
        }
        Ok(nb)
    }

    /// Registered notebooks that load cleanly, in registration order.
    pub fn registered(&self) -> Vec<Notebook> {
        self.global
            .notebooks
            .iter()
            .filter_map(|root| open_quietly(root, NotebookSource::Registered))
            .collect()
    }

    /// Every notebook config found walking up from `cwd`, nearest first.
    pub fn ancestors(&self, cwd: &Path) -> Vec<Notebook> {
        let mut found = Vec::new();
        let mut current = Some(normalize_path(cwd));
        let mut depth = 0;
        while let Some(dir) = current {
            if depth >= MAX_ANCESTOR_DEPTH {
                break;
            }
            if NotebookConfig::exists(&dir) {
                if let Some(nb) = open_quietly(&dir, NotebookSource::Ancestor) {
                    found.push(nb);
                }
            }
            current = dir.parent().map(Path::to_path_buf);
            depth += 1;
        }
        found
    }
}

fn open_explicit(dir: &Path) -> Result<Notebook> {
    if !NotebookConfig::exists(dir) {
        return Err(NotegateError::InvalidNotebookPath {
            path: dir.to_path_buf(),
            reason: "no .notegate.json found".to_string(),
        });
    }
    Notebook::open(dir, NotebookSource::Explicit)
}

/// Opens a candidate, treating a missing or malformed config as "not a notebook".
fn open_quietly(dir: &Path, source: NotebookSource) -> Option<Notebook> {
    if !NotebookConfig::exists(dir) {
        return None;
    }
    match Notebook::open(dir, source) {
        Ok(nb) => Some(nb),
        Err(e) => {
            tracing::warn!(path = %dir.display(), error = %e, "skipping invalid notebook");
            None
        }
    }
}

/// Walks up from `cwd` to the filesystem root. Malformed configs are passed over.
fn find_ancestor_notebook(cwd: &Path) -> Option<Notebook> {
    let mut current = cwd.to_path_buf();

    for _ in 0..MAX_ANCESTOR_DEPTH {
        if let Some(nb) = open_quietly(&current, NotebookSource::Ancestor) {
            return Some(nb);
        }

        match current.parent() {
            Some(parent) if parent != current => {
                current = parent.to_path_buf();
            }
            _ => return None,
        }
    }
    tracing::warn!(cwd = %cwd.display(), "ancestor search hit depth limit");
    None
}

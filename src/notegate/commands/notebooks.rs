use crate::commands::{CmdMessage, CmdResult, Runtime};
use crate::config::GlobalConfig;
use crate::error::{or_degrade, NotegateError, Result};
use crate::executor::QueryExecutor;
use crate::model::{NotebookInfo, NotebookSource};
use crate::notebook::Notebook;
use crate::query::ALL_NOTES;
use crate::resolve::NotebookResolver;
use crate::validation::escape_sql_string;
use std::collections::HashSet;
use std::path::Path;

fn info_of(nb: &Notebook, current: bool, note_count: Option<u64>) -> NotebookInfo {
    NotebookInfo {
        name: nb.name().to_string(),
        path: nb.path.clone(),
        source: nb.source,
        note_count,
        current,
    }
}

/// Registered notebooks followed by ancestors of `cwd`, each listed once.
pub fn list(global: &GlobalConfig, cwd: &Path) -> Result<CmdResult> {
    let resolver = NotebookResolver::new(global);
    let current = or_degrade(resolver.try_resolve(None, cwd), None)?.map(|nb| nb.path);

    let mut seen = HashSet::new();
    let notebooks: Vec<NotebookInfo> = resolver
        .registered()
        .into_iter()
        .chain(resolver.ancestors(cwd))
        .filter(|nb| seen.insert(nb.path.clone()))
        .map(|nb| {
            let is_current = current.as_ref() == Some(&nb.path);
            info_of(&nb, is_current, None)
        })
        .collect();

    let mut result = CmdResult::default();
    if notebooks.is_empty() {
        result.add_message(CmdMessage::info(
            "No notebooks found. Create one with `notegate notebook create <name>`.",
        ));
    }
    Ok(result.with_notebooks(notebooks))
}

/// Summary of one notebook. A failed note count is reported as absent.
pub async fn info<E: QueryExecutor + ?Sized>(
    rt: &Runtime<'_, E>,
    notebook: &Notebook,
) -> Result<CmdResult> {
    let sql = format!(
        "SELECT COUNT(*) as count FROM read_markdown('{}')",
        escape_sql_string(ALL_NOTES)
    );
    let counted = rt.execute(notebook, &sql).await.map(|rows| {
        rows.first()
            .and_then(|r| r.get("count"))
            .and_then(|v| v.as_u64())
    });
    let note_count = or_degrade(counted, None)?;
    Ok(CmdResult::default().with_notebooks(vec![info_of(notebook, true, note_count)]))
}

/// Creates a notebook in `dir` and registers it globally.
pub fn create(global: &mut GlobalConfig, name: &str, dir: &Path) -> Result<CmdResult> {
    if name.trim().is_empty() {
        return Err(NotegateError::InvalidNotebookPath {
            path: dir.to_path_buf(),
            reason: "notebook name must not be empty".to_string(),
        });
    }
    let nb = Notebook::create(name, dir)?;
    global.register(&nb.path);

    let mut result = CmdResult::default();
    result.add_message(CmdMessage::success(format!(
        "Created notebook '{}' at {}",
        nb.name(),
        nb.path.display()
    )));
    Ok(result.with_notebooks(vec![info_of(&nb, false, Some(0))]))
}

/// Registers an existing notebook so it is found from its contexts.
pub fn register(global: &mut GlobalConfig, dir: &Path) -> Result<CmdResult> {
    if !crate::notebook::NotebookConfig::exists(dir) {
        return Err(NotegateError::InvalidNotebookPath {
            path: dir.to_path_buf(),
            reason: "no .notegate.json found".to_string(),
        });
    }
    let nb = Notebook::open(dir, NotebookSource::Registered)?;

    let mut result = CmdResult::default();
    if global.register(&nb.path) {
        result.add_message(CmdMessage::success(format!(
            "Registered notebook '{}'",
            nb.name()
        )));
    } else {
        result.add_message(CmdMessage::info(format!(
            "Notebook '{}' is already registered",
            nb.name()
        )));
    }
    Ok(result.with_notebooks(vec![info_of(&nb, false, None)]))
}

/// Pins a notebook as current, or clears the pin with `None`.
pub fn pin(global: &mut GlobalConfig, dir: Option<&Path>) -> Result<CmdResult> {
    let mut result = CmdResult::default();
    match dir {
        Some(dir) => {
            let nb = Notebook::open(dir, NotebookSource::Registered)?;
            global.register(&nb.path);
            global.set_current(Some(nb.path.clone()));
            result.add_message(CmdMessage::success(format!(
                "Using notebook '{}'",
                nb.name()
            )));
        }
        None => {
            global.set_current(None);
            result.add_message(CmdMessage::success("Cleared the current notebook"));
        }
    }
    Ok(result)
}

pub fn add_context(notebook: &mut Notebook, context: &Path) -> Result<CmdResult> {
    let mut result = CmdResult::default();
    if notebook.add_context(context)? {
        result.add_message(CmdMessage::success(format!(
            "Added context {} to '{}'",
            context.display(),
            notebook.name()
        )));
    } else {
        result.add_message(CmdMessage::info(format!(
            "{} is already a context of '{}'",
            context.display(),
            notebook.name()
        )));
    }
    Ok(result)
}

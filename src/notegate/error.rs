use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Coarse grouping used by callers deciding how to react to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCategory {
    Resolution,
    Validation,
    Execution,
    NotFound,
    Security,
    Aborted,
}

/// Stable, machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotebookNotFound,
    NotebookInvalidPath,
    NotebookConfigError,
    NotebookExists,
    InvalidSql,
    QuerySecurity,
    InvalidPath,
    InvalidViewName,
    InvalidParams,
    InvalidPagination,
    NoteNotFound,
    ViewNotFound,
    SearchFailed,
    ViewExecuteFailed,
    QueryTimeout,
    ExecutorUnavailable,
    ParseError,
    Io,
    Aborted,
}

impl ErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::NotebookNotFound => "NOTEGATE_NOTEBOOK_NOT_FOUND",
            ErrorKind::NotebookInvalidPath => "NOTEGATE_NOTEBOOK_INVALID_PATH",
            ErrorKind::NotebookConfigError => "NOTEGATE_NOTEBOOK_CONFIG_ERROR",
            ErrorKind::NotebookExists => "NOTEGATE_NOTEBOOK_EXISTS",
            ErrorKind::InvalidSql => "NOTEGATE_INVALID_SQL",
            ErrorKind::QuerySecurity => "NOTEGATE_QUERY_SECURITY",
            ErrorKind::InvalidPath => "NOTEGATE_NOTE_INVALID_PATH",
            ErrorKind::InvalidViewName => "NOTEGATE_VIEW_INVALID_NAME",
            ErrorKind::InvalidParams => "NOTEGATE_VIEW_INVALID_PARAMS",
            ErrorKind::InvalidPagination => "NOTEGATE_INVALID_PAGINATION",
            ErrorKind::NoteNotFound => "NOTEGATE_NOTE_NOT_FOUND",
            ErrorKind::ViewNotFound => "NOTEGATE_VIEW_NOT_FOUND",
            ErrorKind::SearchFailed => "NOTEGATE_SEARCH_FAILED",
            ErrorKind::ViewExecuteFailed => "NOTEGATE_VIEW_EXECUTE_FAILED",
            ErrorKind::QueryTimeout => "NOTEGATE_QUERY_TIMEOUT",
            ErrorKind::ExecutorUnavailable => "NOTEGATE_EXECUTOR_NOT_FOUND",
            ErrorKind::ParseError => "NOTEGATE_PARSE_ERROR",
            ErrorKind::Io => "NOTEGATE_IO_ERROR",
            ErrorKind::Aborted => "NOTEGATE_ABORTED",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// What an executor failure was about, used to pick the not-found variant.
/// `Search` leaves the diagnostic unclassified as `SearchFailed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureContext<'a> {
    Notebook(&'a std::path::Path),
    Note(&'a str),
    View(&'a str),
    Search,
}

#[derive(Error, Debug)]
pub enum NotegateError {
    #[error("No notebook found from {}", searched_from.display())]
    NotebookNotFound { searched_from: PathBuf },

    #[error("Not a notebook: {} ({reason})", path.display())]
    InvalidNotebookPath { path: PathBuf, reason: String },

    #[error("Invalid notebook config {}: {message}", path.display())]
    ConfigParse { path: PathBuf, message: String },

    #[error("A notebook already exists at {}", .0.display())]
    NotebookExists(PathBuf),

    #[error("Invalid SQL: {0}")]
    InvalidSql(String),

    #[error("Forbidden keyword '{keyword}' in query")]
    DangerousSql { keyword: String },

    #[error("Path traversal is not allowed: {0}")]
    PathTraversal(String),

    #[error("Invalid note path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Invalid view name '{0}'")]
    InvalidViewName(String),

    #[error("Invalid parameters for view '{view}': {message}")]
    InvalidParams { view: String, message: String },

    #[error("Invalid pagination: {0}")]
    InvalidPagination(String),

    #[error("Note not found: {0}")]
    NoteNotFound(String),

    #[error("View not found: {name}")]
    ViewNotFound { name: String, available: Vec<String> },

    #[error("Search failed: {0}")]
    SearchFailed(String),

    #[error("View '{view}' failed: {message}")]
    ViewExecuteFailed { view: String, message: String },

    #[error("Query timed out after {0} ms")]
    QueryTimeout(u64),

    #[error("Query executor unavailable: {0}")]
    ExecutorUnavailable(String),

    #[error("Failed to parse executor output: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Operation aborted")]
    Aborted,
}

pub type Result<T> = std::result::Result<T, NotegateError>;

impl NotegateError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            NotegateError::NotebookNotFound { .. } => ErrorKind::NotebookNotFound,
            NotegateError::InvalidNotebookPath { .. } => ErrorKind::NotebookInvalidPath,
            NotegateError::ConfigParse { .. } => ErrorKind::NotebookConfigError,
            NotegateError::NotebookExists(_) => ErrorKind::NotebookExists,
            NotegateError::InvalidSql(_) => ErrorKind::InvalidSql,
            NotegateError::DangerousSql { .. } => ErrorKind::QuerySecurity,
            NotegateError::PathTraversal(_) => ErrorKind::QuerySecurity,
            NotegateError::InvalidPath { .. } => ErrorKind::InvalidPath,
            NotegateError::InvalidViewName(_) => ErrorKind::InvalidViewName,
            NotegateError::InvalidParams { .. } => ErrorKind::InvalidParams,
            NotegateError::InvalidPagination(_) => ErrorKind::InvalidPagination,
            NotegateError::NoteNotFound(_) => ErrorKind::NoteNotFound,
            NotegateError::ViewNotFound { .. } => ErrorKind::ViewNotFound,
            NotegateError::SearchFailed(_) => ErrorKind::SearchFailed,
            NotegateError::ViewExecuteFailed { .. } => ErrorKind::ViewExecuteFailed,
            NotegateError::QueryTimeout(_) => ErrorKind::QueryTimeout,
            NotegateError::ExecutorUnavailable(_) => ErrorKind::ExecutorUnavailable,
            NotegateError::Parse(_) | NotegateError::Serialization(_) => ErrorKind::ParseError,
            NotegateError::Io(_) => ErrorKind::Io,
            NotegateError::Aborted => ErrorKind::Aborted,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            NotegateError::NotebookNotFound { .. }
            | NotegateError::InvalidNotebookPath { .. }
            | NotegateError::ConfigParse { .. }
            | NotegateError::NotebookExists(_) => ErrorCategory::Resolution,
            NotegateError::InvalidSql(_)
            | NotegateError::InvalidPath { .. }
            | NotegateError::InvalidViewName(_)
            | NotegateError::InvalidParams { .. }
            | NotegateError::InvalidPagination(_) => ErrorCategory::Validation,
            NotegateError::DangerousSql { .. } | NotegateError::PathTraversal(_) => {
                ErrorCategory::Security
            }
            NotegateError::NoteNotFound(_) | NotegateError::ViewNotFound { .. } => {
                ErrorCategory::NotFound
            }
            NotegateError::Aborted => ErrorCategory::Aborted,
            _ => ErrorCategory::Execution,
        }
    }

    /// Remediation text shown next to the message.
    pub fn hint(&self) -> Option<String> {
        let hint = match self {
            NotegateError::NotebookNotFound { .. } => {
                "No notebook found in current directory or ancestors.\n\
                 Either:\n\
                 1. Navigate to a directory containing .notegate.json\n\
                 2. Pass a notebook path with --notebook /path/to/notebook\n\
                 3. Create one: notegate notebook create 'My Notes'"
                    .to_string()
            }
            NotegateError::InvalidNotebookPath { .. } => {
                "The path does not exist or is not a notebook.\n\
                 A notebook contains a .notegate.json config file."
                    .to_string()
            }
            NotegateError::ConfigParse { .. } => {
                "The notebook's .notegate.json file is invalid.\n\
                 Check for JSON syntax errors or a missing 'name'."
                    .to_string()
            }
            NotegateError::NotebookExists(_) => {
                "Use the existing notebook or pick another directory.".to_string()
            }
            NotegateError::InvalidSql(_) | NotegateError::DangerousSql { .. } => {
                "Only SELECT and WITH queries are allowed (read-only).\n\
                 Example: SELECT * FROM read_markdown('**/*.md') LIMIT 10"
                    .to_string()
            }
            NotegateError::PathTraversal(_) => {
                "Path traversal (../) is not allowed in queries.\n\
                 Use paths relative to the notebook root."
                    .to_string()
            }
            NotegateError::InvalidPath { .. } => {
                "Paths should be relative to the notebook root and end with .md".to_string()
            }
            NotegateError::InvalidViewName(_) => {
                "View names may only contain letters, digits, '-' and '_'.".to_string()
            }
            NotegateError::InvalidParams { .. } => {
                "Run `notegate view` without a name to see view parameters.".to_string()
            }
            NotegateError::InvalidPagination(_) => {
                "limit must be between 1 and 1000, offset must not be negative.".to_string()
            }
            NotegateError::NoteNotFound(_) => {
                "The note does not exist.\n\
                 Use `notegate list` to see available notes.\n\
                 Paths are relative to the notebook root (e.g. 'notes/my-note.md')."
                    .to_string()
            }
            NotegateError::ViewNotFound { available, .. } => {
                if available.is_empty() {
                    "Run `notegate view` to list available views.".to_string()
                } else {
                    format!("Available views: {}", available.join(", "))
                }
            }
            NotegateError::SearchFailed(_) => {
                "Search query failed. Check query syntax and try again.".to_string()
            }
            NotegateError::ViewExecuteFailed { .. } => {
                "The view's SQL may be invalid or target non-existent data.".to_string()
            }
            NotegateError::QueryTimeout(_) => {
                "Simplify the query or add LIMIT to reduce results.".to_string()
            }
            NotegateError::ExecutorUnavailable(_) => {
                "Install the query executor and make sure it is in PATH,\n\
                 or point settings.executor / NOTEGATE_EXECUTOR at it."
                    .to_string()
            }
            NotegateError::Parse(_) | NotegateError::Serialization(_) => {
                "The executor produced output that could not be read.\n\
                 This may indicate a version mismatch."
                    .to_string()
            }
            NotegateError::Aborted => "Operation was cancelled.".to_string(),
            NotegateError::Io(_) => return None,
        };
        Some(hint)
    }

    /// Whether the caller can fix the input or environment and retry.
    /// Security errors are never recoverable, even though they are raised during validation.
    pub fn is_recoverable(&self) -> bool {
        match self.category() {
            ErrorCategory::Resolution | ErrorCategory::Validation | ErrorCategory::NotFound => true,
            ErrorCategory::Execution => self.kind() == ErrorKind::ExecutorUnavailable,
            ErrorCategory::Security | ErrorCategory::Aborted => false,
        }
    }

    pub fn is_security(&self) -> bool {
        self.category() == ErrorCategory::Security
    }
}

/// Turns an executor diagnostic into the most specific error for `context`.
pub fn classify_failure(diagnostic: &str, context: FailureContext<'_>) -> NotegateError {
    let lowered = diagnostic.to_lowercase();
    let missing = lowered.contains("not found") || lowered.contains("no such file");

    match (missing, context) {
        (true, FailureContext::Notebook(path)) => NotegateError::NotebookNotFound {
            searched_from: path.to_path_buf(),
        },
        (true, FailureContext::Note(path)) => NotegateError::NoteNotFound(path.to_string()),
        (true, FailureContext::View(name)) => NotegateError::ViewNotFound {
            name: name.to_string(),
            available: Vec::new(),
        },
        (_, FailureContext::View(name)) => NotegateError::ViewExecuteFailed {
            view: name.to_string(),
            message: diagnostic.trim().to_string(),
        },
        _ => NotegateError::SearchFailed(diagnostic.trim().to_string()),
    }
}

impl NotegateError {
    /// Re-reads an unclassified `SearchFailed` diagnostic in a narrower context.
    pub fn reclassify(self, context: FailureContext<'_>) -> NotegateError {
        match self {
            NotegateError::SearchFailed(diagnostic) => classify_failure(&diagnostic, context),
            other => other,
        }
    }
}

/// Falls back to `default` for optional lookups, but never hides security errors.
pub fn or_degrade<T>(result: Result<T>, default: T) -> Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(e) if e.is_security() || e.kind() == ErrorKind::Aborted => Err(e),
        Err(e) => {
            tracing::warn!(error = %e, "optional lookup failed, using default");
            Ok(default)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn security_errors_are_categorized() {
        let err = NotegateError::DangerousSql {
            keyword: "drop".into(),
        };
        assert_eq!(err.category(), ErrorCategory::Security);
        assert_eq!(err.kind().code(), "NOTEGATE_QUERY_SECURITY");
        assert!(!err.is_recoverable());
    }

    #[test]
    fn resolution_and_validation_errors_are_recoverable() {
        let invalid = NotegateError::InvalidNotebookPath {
            path: PathBuf::from("/x"),
            reason: "no .notegate.json found".into(),
        };
        assert!(invalid.is_recoverable());
        assert!(NotegateError::InvalidPagination("limit".into()).is_recoverable());
        assert!(NotegateError::InvalidSql("shape".into()).is_recoverable());
        assert!(!NotegateError::PathTraversal("../x".into()).is_recoverable());
        assert!(!NotegateError::SearchFailed("boom".into()).is_recoverable());
        assert!(!NotegateError::Aborted.is_recoverable());
    }

    #[test]
    fn view_not_found_hint_lists_views() {
        let err = NotegateError::ViewNotFound {
            name: "nope".into(),
            available: vec!["today".into(), "recent".into()],
        };
        let hint = err.hint().unwrap();
        assert!(hint.contains("today"));
        assert!(hint.contains("recent"));
        assert!(err.is_recoverable());
    }

    #[test]
    fn classify_reclassifies_not_found() {
        let err = classify_failure("Error: file not found", FailureContext::Note("a.md"));
        assert!(matches!(err, NotegateError::NoteNotFound(p) if p == "a.md"));

        let err = classify_failure(
            "open /x: no such file or directory",
            FailureContext::Notebook(Path::new("/x")),
        );
        assert_eq!(err.kind(), ErrorKind::NotebookNotFound);
    }

    #[test]
    fn classify_defaults_to_search_failed() {
        let err = classify_failure("Parser Error: syntax error at or near", FailureContext::Search);
        assert_eq!(err.kind(), ErrorKind::SearchFailed);

        let err = classify_failure("boom", FailureContext::View("kanban"));
        assert_eq!(err.kind(), ErrorKind::ViewExecuteFailed);
    }

    #[test]
    fn reclassify_only_touches_unclassified_failures() {
        let nb = Path::new("/nb");
        let err = NotegateError::SearchFailed("Error: notebook not found".into())
            .reclassify(FailureContext::Notebook(nb));
        assert_eq!(err.kind(), ErrorKind::NotebookNotFound);

        let err = NotegateError::SearchFailed("syntax error".into())
            .reclassify(FailureContext::View("kanban"));
        assert!(matches!(err, NotegateError::ViewExecuteFailed { view, .. } if view == "kanban"));

        let err = NotegateError::NotebookNotFound {
            searched_from: nb.to_path_buf(),
        }
        .reclassify(FailureContext::View("kanban"));
        assert_eq!(err.kind(), ErrorKind::NotebookNotFound);
    }

    #[test]
    fn degrade_keeps_security_errors() {
        let r: Result<u32> = Err(NotegateError::PathTraversal("../x".into()));
        assert!(or_degrade(r, 0).is_err());

        let r: Result<u32> = Err(NotegateError::SearchFailed("boom".into()));
        assert_eq!(or_degrade(r, 7).unwrap(), 7);
    }
}

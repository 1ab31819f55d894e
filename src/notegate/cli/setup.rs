use clap::{Parser, Subcommand, ValueEnum};
use notegate::model::{SortBy, SortOrder};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Installs the stderr subscriber; `NOTEGATE_LOG` takes `EnvFilter` directives.
pub fn init_logging() {
    let filter = EnvFilter::try_from_env("NOTEGATE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum SortField {
    #[default]
    Modified,
    Created,
    Title,
    Path,
}

impl From<SortField> for SortBy {
    fn from(field: SortField) -> Self {
        match field {
            SortField::Modified => SortBy::Modified,
            SortField::Created => SortBy::Created,
            SortField::Title => SortBy::Title,
            SortField::Path => SortBy::Path,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum Direction {
    Asc,
    #[default]
    Desc,
}

impl From<Direction> for SortOrder {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Asc => SortOrder::Asc,
            Direction::Desc => SortOrder::Desc,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "notegate", bin_name = "notegate", version)]
#[command(about = "Notebook-aware, budget-bounded queries over markdown notes", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Notebook directory (skips resolution from the current directory)
    #[arg(long, global = true, env = "NOTEGATE_NOTEBOOK", help_heading = "Options")]
    pub notebook: Option<PathBuf>,

    /// Maximum number of results per page (1-1000)
    #[arg(
        long,
        global = true,
        value_parser = clap::value_parser!(u64).range(1..=1000),
        help_heading = "Options"
    )]
    pub limit: Option<u64>,

    /// Number of results to skip
    #[arg(long, global = true, default_value_t = 0, help_heading = "Options")]
    pub offset: usize,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t, help_heading = "Options")]
    pub format: OutputFormat,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Search notes by text, fuzzy match, boolean filters or raw SQL
    #[command(alias = "s", display_order = 1)]
    Search {
        /// Text to search for (omit to list everything)
        query: Option<String>,

        /// Fuzzy-match the query instead of substring search
        #[arg(long, requires = "query")]
        fuzzy: bool,

        /// Run a read-only SQL query
        #[arg(long, value_name = "SQL", conflicts_with_all = ["query", "fuzzy"])]
        sql: Option<String>,

        /// Condition that must hold (e.g. data.status=active)
        #[arg(long = "and", value_name = "COND")]
        and: Vec<String>,

        /// Condition of which at least one must hold
        #[arg(long = "or", value_name = "COND")]
        or: Vec<String>,

        /// Condition that must not hold
        #[arg(long = "not", value_name = "COND")]
        not: Vec<String>,
    },

    /// Run a view, or list views when no name is given
    #[command(alias = "v", display_order = 2)]
    View {
        /// View name
        name: Option<String>,

        /// View parameters (k=v,k2=v2)
        #[arg(short, long, requires = "name")]
        param: Option<String>,

        /// Save NAME as a notebook view with this SQL template
        #[arg(long, value_name = "SQL", requires = "name", conflicts_with = "param")]
        save: Option<String>,

        /// Description for a saved view
        #[arg(long, requires = "save")]
        description: Option<String>,

        /// Delete the notebook view NAME
        #[arg(long, requires = "name", conflicts_with_all = ["save", "param"])]
        delete: bool,
    },

    /// List notes
    #[command(alias = "ls", display_order = 3)]
    List {
        #[arg(long, value_enum, default_value_t)]
        sort_by: SortField,

        #[arg(long, value_enum, default_value_t)]
        sort_order: Direction,

        /// Glob relative to the notebook root
        #[arg(long)]
        pattern: Option<String>,
    },

    /// Show a single note
    #[command(display_order = 4)]
    Get {
        /// Path relative to the notebook root (e.g. notes/plan.md)
        path: String,

        /// Only show metadata
        #[arg(long)]
        no_content: bool,
    },

    /// Manage notebooks
    #[command(alias = "nb", display_order = 5)]
    Notebook {
        #[command(subcommand)]
        action: NotebookCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum NotebookCommands {
    /// List known notebooks
    #[command(alias = "ls")]
    List,

    /// Show the resolved notebook
    Info,

    /// Create a notebook and register it
    Create {
        name: String,
        /// Directory (defaults to the current one)
        path: Option<PathBuf>,
    },

    /// Register an existing notebook
    Register { path: PathBuf },

    /// Pin a notebook as current, or clear the pin when no path is given
    Use { path: Option<PathBuf> },

    /// Make a directory resolve to the notebook
    AddContext {
        /// Directory (defaults to the current one)
        path: Option<PathBuf>,
    },
}

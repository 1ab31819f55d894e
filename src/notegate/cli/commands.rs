//! # CLI Layer
//!
//! One client of the notegate API. This is the only place that:
//! - parses arguments (clap, in `setup.rs`)
//! - writes to stdout/stderr
//! - turns a `CmdResult` into markdown or JSON
//! - listens for Ctrl-C
//!
//! Handlers call exactly one API method and hand the result to `emit`.

use super::render::{print_messages, render_result};
use super::setup::{Cli, Commands, NotebookCommands, OutputFormat};
use clap::Parser;
use notegate::api::NotegateApi;
use notegate::commands::CmdResult;
use notegate::error::Result;
use notegate::executor::process::ProcessExecutor;
use notegate::init::initialize;
use notegate::model::{BooleanFilters, ListOptions, PageRequest, SearchParams, ViewConfig};
use notegate::views::parse_view_params;
use std::collections::BTreeMap;
use std::path::PathBuf;

struct AppContext {
    api: NotegateApi<ProcessExecutor>,
    notebook: Option<PathBuf>,
    page: PageRequest,
    format: OutputFormat,
}

impl AppContext {
    fn notebook(&self) -> Option<&std::path::Path> {
        self.notebook.as_deref()
    }
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let mut ctx = init_context(&cli)?;

    let cancel = ctx.api.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::debug!("interrupt received, cancelling");
            cancel.cancel();
        }
    });

    match cli.command {
        Commands::Search {
            query,
            fuzzy,
            sql,
            and,
            or,
            not,
        } => handle_search(&ctx, query, fuzzy, sql, BooleanFilters { and, or, not }).await,
        Commands::View {
            name,
            param,
            save,
            description,
            delete,
        } => match (name, save) {
            (None, _) => handle_list_views(&ctx),
            (Some(name), Some(query)) => handle_save_view(&ctx, &name, query, description),
            (Some(name), None) if delete => handle_delete_view(&ctx, &name),
            (Some(name), None) => handle_run_view(&ctx, &name, param).await,
        },
        Commands::List {
            sort_by,
            sort_order,
            pattern,
        } => {
            let options = ListOptions {
                sort_by: sort_by.into(),
                sort_order: sort_order.into(),
                pattern,
            };
            handle_list(&ctx, &options).await
        }
        Commands::Get { path, no_content } => handle_get(&ctx, &path, !no_content).await,
        Commands::Notebook { action } => match action {
            NotebookCommands::List => emit(&ctx, ctx.api.list_notebooks()?),
            NotebookCommands::Info => {
                let result = ctx.api.notebook_info(ctx.notebook()).await?;
                emit(&ctx, result)
            }
            NotebookCommands::Create { name, path } => {
                let result = ctx.api.create_notebook(&name, path.as_deref())?;
                emit(&ctx, result)
            }
            NotebookCommands::Register { path } => {
                let result = ctx.api.register_notebook(&path)?;
                emit(&ctx, result)
            }
            NotebookCommands::Use { path } => {
                let result = ctx.api.pin_notebook(path.as_deref())?;
                emit(&ctx, result)
            }
            NotebookCommands::AddContext { path } => {
                let result = ctx.api.add_context(ctx.notebook(), path.as_deref())?;
                emit(&ctx, result)
            }
        },
    }
}

fn init_context(cli: &Cli) -> Result<AppContext> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let ctx = initialize(&cwd)?;

    Ok(AppContext {
        api: ctx.api,
        notebook: cli.notebook.clone(),
        page: PageRequest::new(cli.limit.map(|l| l as usize), cli.offset),
        format: cli.format,
    })
}

fn emit(ctx: &AppContext, result: CmdResult) -> Result<()> {
    match ctx.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Text => {
            print!("{}", render_result(&result));
            print_messages(&result.messages);
        }
    }
    Ok(())
}

async fn handle_search(
    ctx: &AppContext,
    query: Option<String>,
    fuzzy: bool,
    sql: Option<String>,
    filters: BooleanFilters,
) -> Result<()> {
    let params = SearchParams {
        query,
        fuzzy,
        sql,
        filters: (!filters.is_empty()).then_some(filters),
        ..SearchParams::default()
    };
    let result = ctx.api.search(ctx.notebook(), params, ctx.page).await?;
    emit(ctx, result)
}

async fn handle_run_view(ctx: &AppContext, name: &str, param: Option<String>) -> Result<()> {
    let params = match param {
        Some(input) => parse_view_params(&input)?,
        None => BTreeMap::new(),
    };
    let result = ctx
        .api
        .run_view(ctx.notebook(), name, params, ctx.page)
        .await?;
    emit(ctx, result)
}

fn handle_list_views(ctx: &AppContext) -> Result<()> {
    emit(ctx, ctx.api.list_views(ctx.notebook())?)
}

fn handle_save_view(
    ctx: &AppContext,
    name: &str,
    query: String,
    description: Option<String>,
) -> Result<()> {
    let config = ViewConfig {
        description,
        parameters: Vec::new(),
        query,
    };
    emit(ctx, ctx.api.save_view(ctx.notebook(), name, config)?)
}

fn handle_delete_view(ctx: &AppContext, name: &str) -> Result<()> {
    emit(ctx, ctx.api.delete_view(ctx.notebook(), name)?)
}

async fn handle_list(ctx: &AppContext, options: &ListOptions) -> Result<()> {
    let result = ctx
        .api
        .list_notes(ctx.notebook(), options, ctx.page)
        .await?;
    emit(ctx, result)
}

async fn handle_get(ctx: &AppContext, path: &str, include_content: bool) -> Result<()> {
    let result = ctx
        .api
        .get_note(ctx.notebook(), path, include_content)
        .await?;
    emit(ctx, result)
}

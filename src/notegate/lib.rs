//! # Notegate Architecture
//!
//! Notegate is a **notebook-aware query gateway** for folders of markdown notes. It sits
//! between a caller (a person at a terminal, or an agent that can only afford a bounded
//! amount of output) and an external SQL-over-markdown executor.
//!
//! Like any gateway it is a library first; the CLI is one client of it.
//!
//! ## Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  CLI Layer (cli/, wired by main.rs)                         │
//! │  - Parses arguments, renders markdown or JSON, exit codes   │
//! │  - The ONLY place that knows about stdout/stderr            │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  API Layer (api.rs)                                         │
//! │  - Resolves the notebook for every call                     │
//! │  - Owns the capability cache and cancellation token         │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Command Layer (commands/*.rs)                              │
//! │  - Validate, build the query, execute, fit to the budget    │
//! │  - Operates on Rust types, returns `CmdResult`              │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Executor Layer (executor/)                                 │
//! │  - Abstract QueryExecutor trait                             │
//! │  - ProcessExecutor (production), InMemoryExecutor (testing) │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Key Principle: Validate Before Executing
//!
//! Every piece of caller input (SQL, note paths, glob patterns, view parameters, limits)
//! is checked in [`validation`] or [`views`] before the executor is contacted. A request
//! that fails validation never produces a statement. Rows that come back pointing outside
//! the queried notebook are dropped before they are paginated.
//!
//! ## Output Budget
//!
//! Results are paginated by count and then fitted to a byte/line budget
//! ([`pagination`]). The page metadata always reflects what was actually returned, so a
//! caller can continue from `nextOffset` without skipping anything.
//!
//! ## Module Overview
//!
//! - [`api`]: The API facade, entry point for all operations
//! - [`commands`]: Business logic for each operation
//! - [`executor`]: Executor trait, process and in-memory implementations
//! - [`capability`]: One-time executor probe cache
//! - [`query`]: Query builder, boolean filters and fuzzy listings
//! - [`views`]: Built-in, notebook and global views; parameter binding and templates
//! - [`pagination`]: Page metadata and output budget
//! - [`resolve`]: Notebook resolution (explicit, pinned, context, ancestor)
//! - [`notebook`]: Notebook config on disk
//! - [`config`]: Global configuration and settings
//! - [`validation`]: Input validation and SQL escaping
//! - [`model`]: Core data types
//! - [`error`]: Error types, codes and hints
//! - `cli`: Argument parsing and rendering for the binary (not part of the lib API)

pub mod api;
pub mod capability;
pub mod commands;
pub mod config;
pub mod error;
pub mod executor;
pub mod init;
pub mod model;
pub mod notebook;
pub mod pagination;
pub mod query;
pub mod resolve;
pub mod validation;
pub mod views;

//! # ape
//!
//! A plugin-based automation runner.
//!
//! `ape` reads one or more INI configuration files, looks up the plugins they
//! name in a [`plugin::PluginRegistry`], asks each plugin for an operation and
//! runs the operations in order under a countdown budget.
//!
//! ## Features
//!
//! - **Layered configuration**: a primary file pulls in more files through
//!   `config_glob`, with typed getters for lists, times and more
//! - **Plugins by name**: built-in and on-request plugin modules, looked up
//!   case-insensitively from a cached registry
//! - **Failure isolation**: one failing operation is logged and the run goes on
//! - **Time budgets**: stop early when the rest of the run would not fit
//!
//! ## Quick Start
//!
//! ```bash
//! # Write a sample configuration
//! ape fetch > ape.ini
//!
//! # Run it
//! ape run ape.ini
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

pub mod config;
pub mod plugin;
pub mod plugins;
pub mod runner;

// Re-export commonly used types
pub use config::{ConfigResolver, ConfigurationError, ConfigurationMap};
pub use plugin::{Plugin, PluginError, PluginRegistry, ProductContext};
pub use runner::{Budget, BudgetPolicy, CountdownTimer, Operation, OperationError, Orchestrator};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "ape";

//! Plugin system error types.

use thiserror::Error;

/// Result type for plugin lookups.
pub type PluginResult<T> = Result<T, PluginError>;

/// Errors that can occur while discovering or looking up plugins.
#[derive(Debug, Error)]
pub enum PluginError {
    /// No plugin is registered under this name.
    #[error("Unknown plugin: {0}")]
    NotFound(String),

    /// A requested plugin module is not in the catalog.
    #[error("Unknown plugin module: {0}")]
    UnknownModule(String),
}

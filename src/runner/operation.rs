//! Runnable operations and their failure modes.

use thiserror::Error;

/// A recoverable, per-operation failure.
///
/// The orchestrator logs it and moves on to the next operation.
#[derive(Debug, Error)]
#[error("{operation}: {message}")]
pub struct OperatorError {
    /// Name of the failing operation
    pub operation: String,
    /// What went wrong
    pub message: String,
}

impl OperatorError {
    /// Create a new operator error.
    pub fn new(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self { operation: operation.into(), message: message.into() }
    }
}

/// Outcome of a failed operation.
#[derive(Debug, Error)]
pub enum OperationError {
    /// The step failed but the run should continue.
    #[error(transparent)]
    Operator(#[from] OperatorError),

    /// Anything else; aborts the whole run.
    #[error(transparent)]
    Fatal(#[from] anyhow::Error),
}

impl OperationError {
    /// Whether the orchestrator may swallow this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Operator(_))
    }
}

/// Result of invoking an operation.
pub type OperationResult = Result<(), OperationError>;

/// A runnable unit produced by a plugin.
pub trait Operation {
    /// Human-readable identity used in progress reports.
    fn name(&self) -> &str;

    /// Run the operation.
    fn call(&mut self) -> OperationResult;
}

impl std::fmt::Debug for dyn Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Operation").field("name", &self.name()).finish()
    }
}

/// An operation built from a closure.
pub struct FnOperation<F> {
    name: String,
    function: F,
}

impl<F> FnOperation<F>
where
    F: FnMut() -> OperationResult,
{
    /// Wrap a closure as a named operation.
    pub fn new(name: impl Into<String>, function: F) -> Self {
        Self { name: name.into(), function }
    }
}

impl<F> Operation for FnOperation<F>
where
    F: FnMut() -> OperationResult,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn call(&mut self) -> OperationResult {
        (self.function)()
    }
}

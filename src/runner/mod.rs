//! Operation execution.
//!
//! Operations run one at a time, in order, on the calling thread. A
//! countdown budget decides whether the next one may start, and
//! recoverable per-operation failures never stop the run.

mod countdown;
mod executor;
mod operation;
mod orchestrator;

pub use countdown::{
    format_duration, Budget, BudgetPolicy, Clock, CountdownTimer, MonotonicClock,
};
pub use executor::{ExecutionResult, Executor, ShellCommand};
pub use operation::{FnOperation, Operation, OperationError, OperationResult, OperatorError};
pub use orchestrator::{Hortator, Orchestrator, RunReport};

//! Sequential execution of operations under a countdown budget.

use std::time::Duration;

use anyhow::Context;

use super::countdown::{format_duration, Budget, BudgetPolicy, CountdownTimer};
use super::operation::{Operation, OperationError, OperationResult};

const CRASH_BANNER: &str = "***** Operator Crash *****";

/// Summary of one orchestrated run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Operations in the list
    pub total: usize,
    /// Operations that were invoked
    pub attempted: usize,
    /// Recoverable failures, as `(operation, message)`
    pub failures: Vec<(String, String)>,
    /// Whether the budget ran out before the list did
    pub stopped_early: bool,
    /// Time spent on the whole run
    pub elapsed: Duration,
}

impl RunReport {
    /// Operations that ran without a recoverable failure.
    pub fn succeeded(&self) -> usize {
        self.attempted - self.failures.len()
    }
}

/// Drives an ordered list of operations.
///
/// Holds no per-run state: reuse it with a fresh list and a fresh budget.
#[derive(Debug, Clone, Copy, Default)]
pub struct Orchestrator;

impl Orchestrator {
    /// Create a new orchestrator.
    pub fn new() -> Self {
        Self
    }

    /// Run every operation in order.
    ///
    /// Recoverable failures are logged and skipped; anything else stops the
    /// run and is returned. The budget is advanced once per invoked
    /// operation, failed or not.
    pub fn run(
        &self,
        operations: &mut [Box<dyn Operation>],
        budget: &mut dyn Budget,
    ) -> anyhow::Result<RunReport> {
        let total = operations.len();
        let mut report = RunReport { total, ..RunReport::default() };

        budget.start();
        tracing::info!(total, "*** Starting operations ***");

        for (index, operation) in operations.iter_mut().enumerate() {
            if !budget.time_remaining() {
                tracing::info!(completed = index, total, "Time exceeded, quitting");
                report.stopped_early = true;
                break;
            }

            let position = index + 1;
            tracing::info!(position, total, operation = operation.name(), "** Operation **");
            match budget.remaining() {
                Some(remaining) => tracing::info!(
                    remaining = %format_duration(remaining),
                    "Estimated time remaining"
                ),
                None => tracing::debug!("No time estimate yet"),
            }

            report.attempted += 1;
            let outcome = operation.call();
            budget.next_iteration();

            match outcome {
                Ok(()) => {}
                Err(OperationError::Operator(error)) => {
                    tracing::error!("{CRASH_BANNER}");
                    tracing::error!(operation = operation.name(), error = %error.message);
                    tracing::error!("{}", "*".repeat(CRASH_BANNER.len()));
                    report.failures.push((operation.name().to_string(), error.message));
                }
                Err(OperationError::Fatal(error)) => {
                    return Err(error).with_context(|| {
                        format!(
                            "Operation {position} of {total} ('{}') failed",
                            operation.name()
                        )
                    });
                }
            }
        }

        report.elapsed = budget.elapsed();
        tracing::info!("*** Ending operations ***");
        if !report.failures.is_empty() {
            tracing::warn!(
                failed = report.failures.len(),
                attempted = report.attempted,
                "Some operations failed"
            );
        }
        tracing::info!(elapsed = %format_duration(report.elapsed), "** Total elapsed time **");
        Ok(report)
    }
}

/// An operation that runs a list of operations.
///
/// Lets composite plugins nest: every call gets a fresh countdown timer, so
/// a [`BudgetPolicy::Until`] deadline is measured from the call.
pub struct Hortator {
    name: String,
    operations: Vec<Box<dyn Operation>>,
    policy: BudgetPolicy,
    last_report: Option<RunReport>,
}

impl Hortator {
    /// Create a hortator over `operations`.
    pub fn new(
        name: impl Into<String>,
        operations: Vec<Box<dyn Operation>>,
        policy: BudgetPolicy,
    ) -> Self {
        Self { name: name.into(), operations, policy, last_report: None }
    }

    /// Number of operations held.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Whether there are no operations.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Names of the held operations, in run order.
    pub fn operation_names(&self) -> Vec<&str> {
        self.operations.iter().map(|operation| operation.name()).collect()
    }

    /// The budget policy applied on each call.
    pub fn policy(&self) -> BudgetPolicy {
        self.policy
    }

    /// Report of the most recent call.
    pub fn last_report(&self) -> Option<&RunReport> {
        self.last_report.as_ref()
    }
}

impl Operation for Hortator {
    fn name(&self) -> &str {
        &self.name
    }

    fn call(&mut self) -> OperationResult {
        let mut budget = CountdownTimer::new(self.operations.len(), self.policy);
        let report = Orchestrator::new().run(&mut self.operations, &mut budget)?;
        self.last_report = Some(report);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::runner::operation::{FnOperation, OperatorError};

    fn recording(name: &str, log: &Rc<RefCell<Vec<String>>>) -> Box<dyn Operation> {
        let log = Rc::clone(log);
        let label = name.to_string();
        Box::new(FnOperation::new(name, move || {
            log.borrow_mut().push(label.clone());
            Ok(())
        }))
    }

    #[test]
    fn test_runs_in_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut operations: Vec<_> = ["a", "b", "c"].iter().map(|n| recording(n, &log)).collect();
        let mut budget = CountdownTimer::new(operations.len(), BudgetPolicy::Iterations);

        let report = Orchestrator::new().run(&mut operations, &mut budget).unwrap();

        assert_eq!(*log.borrow(), vec!["a", "b", "c"]);
        assert_eq!(report.attempted, 3);
        assert_eq!(report.succeeded(), 3);
        assert!(!report.stopped_early);
    }

    #[test]
    fn test_fatal_error_aborts_run() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut operations: Vec<Box<dyn Operation>> = vec![
            recording("first", &log),
            Box::new(FnOperation::new("explode", || Err(anyhow::anyhow!("boom").into()))),
            recording("never", &log),
        ];
        let mut budget = CountdownTimer::new(operations.len(), BudgetPolicy::Iterations);

        let error = Orchestrator::new().run(&mut operations, &mut budget).unwrap_err();

        assert!(error.to_string().contains("'explode'"));
        assert_eq!(error.root_cause().to_string(), "boom");
        assert_eq!(*log.borrow(), vec!["first"]);
    }

    #[test]
    fn test_hortator_nests_and_swallows_operator_errors() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let inner: Vec<Box<dyn Operation>> = vec![
            Box::new(FnOperation::new("fails", || Err(OperatorError::new("fails", "nope").into()))),
            recording("inner", &log),
        ];
        let mut outer: Vec<Box<dyn Operation>> = vec![
            Box::new(Hortator::new("group", inner, BudgetPolicy::Iterations)),
            recording("outer", &log),
        ];
        let mut budget = CountdownTimer::new(outer.len(), BudgetPolicy::Iterations);

        let report = Orchestrator::new().run(&mut outer, &mut budget).unwrap();

        assert_eq!(*log.borrow(), vec!["inner", "outer"]);
        assert!(report.failures.is_empty());
    }

    #[test]
    fn test_hortator_records_report() {
        let mut hortator = Hortator::new(
            "APE",
            vec![Box::new(FnOperation::new("bad", || {
                Err(OperatorError::new("bad", "broken").into())
            }))],
            BudgetPolicy::Iterations,
        );
        assert_eq!(hortator.operation_names(), vec!["bad"]);

        hortator.call().unwrap();
        let report = hortator.last_report().unwrap();
        assert_eq!(report.failures, vec![("bad".to_string(), "broken".to_string())]);
    }
}

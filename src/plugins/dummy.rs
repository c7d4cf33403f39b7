//! A no-op plugin for exercising the infrastructure.

use crate::plugin::{HelpSections, Plugin, ProductContext};
use crate::runner::{Operation, OperationResult};

const DESCRIPTION: &str = "{bold}Dummy{reset} logs its calls and then returns. Use it to \
test the {blue}ape{reset} infrastructure without any real components.";

/// Plugin producing [`DummyOperation`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct Dummy;

impl Plugin for Dummy {
    fn name(&self) -> &'static str {
        "Dummy"
    }

    fn default_section(&self) -> &'static str {
        "DUMMY"
    }

    fn product(&self, context: &mut ProductContext<'_>) -> anyhow::Result<Box<dyn Operation>> {
        Ok(Box::new(DummyOperation::new(context.section())))
    }

    fn config(&self) -> String {
        "Dummy needs no configuration".to_string()
    }

    fn sections(&self) -> HelpSections {
        vec![
            ("Name", "{bold}Dummy{reset} -- a no-op".to_string()),
            ("Description", DESCRIPTION.to_string()),
            ("Configuration", self.config()),
            ("Example", "[APE]\nop_1 = Dummy".to_string()),
        ]
    }
}

/// Logs each call and succeeds.
#[derive(Debug, Clone)]
pub struct DummyOperation {
    name: String,
    calls: usize,
}

impl DummyOperation {
    /// Create a dummy named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), calls: 0 }
    }

    /// How many times it has been called.
    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl Operation for DummyOperation {
    fn name(&self) -> &str {
        &self.name
    }

    fn call(&mut self) -> OperationResult {
        self.calls += 1;
        tracing::info!(name = %self.name, calls = self.calls, "Dummy called");
        Ok(())
    }
}

//! Runs a shell command as an operation.

use std::path::PathBuf;
use std::time::Duration;

use crate::plugin::{HelpSections, Plugin, ProductContext};
use crate::runner::{
    format_duration, Executor, Operation, OperationResult, OperatorError, ShellCommand,
};

/// Section read by [`Shell`] when none is given.
pub const SHELL_SECTION: &str = "SHELL";

const COMMAND_OPTION: &str = "command";
const WORKING_DIR_OPTION: &str = "working_dir";
const TIMEOUT_OPTION: &str = "timeout";

const CONFIGURATION: &str = "[SHELL]
plugin = Shell
# the command line handed to the shell
command = echo hello
# optional
# working_dir = /tmp
# timeout = 5 minutes
";

/// Plugin producing [`ShellOperation`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct Shell;

impl Plugin for Shell {
    fn name(&self) -> &'static str {
        "Shell"
    }

    fn default_section(&self) -> &'static str {
        SHELL_SECTION
    }

    fn product(&self, context: &mut ProductContext<'_>) -> anyhow::Result<Box<dyn Operation>> {
        let configuration = context.configuration();
        let section = context.section();

        let mut command = ShellCommand::new(configuration.get(section, COMMAND_OPTION)?);
        if let Some(dir) = configuration.get_optional(section, WORKING_DIR_OPTION) {
            command = command.with_working_dir(PathBuf::from(dir));
        }

        let mut executor = Executor::new().capture(true);
        if let Some(timeout) = configuration.get_relativetime_optional(section, TIMEOUT_OPTION)? {
            executor = executor.timeout(timeout.to_std().unwrap_or(Duration::ZERO));
        }

        Ok(Box::new(ShellOperation::new(section, command, executor)))
    }

    fn config(&self) -> String {
        CONFIGURATION.to_string()
    }

    fn sections(&self) -> HelpSections {
        vec![
            ("Name", "{bold}Shell{reset} -- run a command line".to_string()),
            (
                "Description",
                "{bold}Shell{reset} hands {bold}command{reset} to the system shell. Its \
                 output is logged line by line once it ends. A non-zero exit status, a \
                 command that cannot be started or one that outlives its {bold}timeout{reset} \
                 is reported as a failed operation and the run goes on; the last line the \
                 command wrote to stderr is part of the report."
                    .to_string(),
            ),
            ("Configuration", CONFIGURATION.to_string()),
            (
                "Module",
                "parts (fetch with {bold}ape fetch --module parts Shell{reset})".to_string(),
            ),
        ]
    }
}

/// Runs one command line per call.
#[derive(Debug, Clone)]
pub struct ShellOperation {
    name: String,
    command: ShellCommand,
    executor: Executor,
}

impl ShellOperation {
    /// Create an operation running `command` with `executor`.
    pub fn new(name: impl Into<String>, command: ShellCommand, executor: Executor) -> Self {
        Self { name: name.into(), command, executor }
    }

    /// The command run on each call.
    pub fn command(&self) -> &ShellCommand {
        &self.command
    }
}

impl Operation for ShellOperation {
    fn name(&self) -> &str {
        &self.name
    }

    fn call(&mut self) -> OperationResult {
        tracing::info!(name = %self.name, command = %self.command.command, "Running command");

        let result = self
            .executor
            .execute(&self.command)
            .map_err(|error| OperatorError::new(&self.name, format!("Failed to start: {error}")))?;

        let stdout = result.stdout.as_deref().unwrap_or_default();
        let stderr = result.stderr.as_deref().unwrap_or_default();
        for line in stdout.lines().filter(|line| !line.trim().is_empty()) {
            tracing::info!(name = %self.name, "{line}");
        }
        for line in stderr.lines().filter(|line| !line.trim().is_empty()) {
            tracing::warn!(name = %self.name, "{line}");
        }

        if result.success() {
            tracing::debug!(
                name = %self.name,
                duration = %format_duration(result.duration),
                "Command done"
            );
            return Ok(());
        }

        let message = if result.timed_out {
            format!("Timed out after {}", format_duration(result.duration))
        } else {
            let status = result
                .code()
                .map_or_else(|| "a signal".to_string(), |code| format!("exit code {code}"));
            format!("Command ended with {status}")
        };

        let message = match last_line(stderr) {
            Some(line) => format!("{message}: {line}"),
            None => message,
        };
        Err(OperatorError::new(&self.name, message).into())
    }
}

fn last_line(output: &str) -> Option<&str> {
    output.lines().map(str::trim).rfind(|line| !line.is_empty())
}

#[cfg(all(test, unix))]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::config::{parse_ini_str, ConfigurationError, ConfigurationMap};
    use crate::plugin::PluginRegistry;
    use crate::runner::OperationError;

    fn build(text: &str) -> anyhow::Result<Box<dyn Operation>> {
        let config =
            ConfigurationMap::from_sections(parse_ini_str(text, Path::new("shell.ini")).unwrap());
        let mut registry = PluginRegistry::default();
        registry.set_external_modules(vec!["parts".to_string()]);
        let mut context = ProductContext::new(&config, &mut registry);
        context.build("Shell", None)
    }

    #[test]
    fn test_successful_command() {
        let mut operation = build("[SHELL]\ncommand = true\n").unwrap();
        assert_eq!(operation.name(), "SHELL");
        operation.call().unwrap();
    }

    #[test]
    fn test_failing_command_is_recoverable() {
        let mut operation = build("[SHELL]\ncommand = exit 4\n").unwrap();
        let error = operation.call().unwrap_err();
        assert!(error.is_recoverable());
        assert!(error.to_string().contains("exit code 4"));
    }

    #[test]
    fn test_timeout_is_recoverable() {
        let mut operation =
            build("[SHELL]\ncommand = exec sleep 5\ntimeout = 0.1 seconds\n").unwrap();
        match operation.call() {
            Err(OperationError::Operator(error)) => assert!(error.message.contains("Timed out")),
            other => panic!("expected an operator error, got {other:?}"),
        }
    }

    #[test]
    fn test_failure_reports_last_stderr_line() {
        let mut operation =
            build("[SHELL]\ncommand = echo first >&2; echo 'no such target' >&2; exit 2\n")
                .unwrap();
        match operation.call() {
            Err(OperationError::Operator(error)) => {
                assert_eq!(error.message, "Command ended with exit code 2: no such target");
            }
            other => panic!("expected an operator error, got {other:?}"),
        }
    }

    #[test]
    fn test_timeout_stops_background_work() {
        let temp_dir = tempfile::tempdir().unwrap();
        let marker = temp_dir.path().join("marker");
        let mut operation = build(&format!(
            "[SHELL]\ncommand = (sleep 1; touch '{}'); true\ntimeout = 0.1 seconds\n",
            marker.display()
        ))
        .unwrap();

        assert!(operation.call().unwrap_err().is_recoverable());
        std::thread::sleep(std::time::Duration::from_millis(1500));
        assert!(!marker.exists());
    }

    #[test]
    fn test_last_line() {
        assert_eq!(last_line("a\nb\n\n  \n"), Some("b"));
        assert_eq!(last_line(""), None);
    }

    #[test]
    fn test_missing_working_dir_is_recoverable() {
        let mut operation =
            build("[SHELL]\ncommand = true\nworking_dir = /nonexistent/ape/dir\n").unwrap();
        assert!(operation.call().unwrap_err().is_recoverable());
    }

    #[test]
    fn test_command_required() {
        let error = build("[SHELL]\ntimeout = 1 second\n").unwrap_err();
        assert!(matches!(
            error.downcast_ref::<ConfigurationError>(),
            Some(ConfigurationError::MissingOption { option, .. }) if option == "command"
        ));
    }
}

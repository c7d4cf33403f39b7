//! Shell command execution.
//!
//! Spawns `sh -c` (or `cmd /C`) processes, optionally capturing output and
//! killing the child when it outlives its timeout. On Unix the command gets
//! its own process group, and a timeout kills the whole group.

use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command as ProcessCommand, ExitStatus, Stdio};
use std::time::{Duration, Instant};

/// How often a running child is polled while a timeout is armed.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A shell command line and where to run it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellCommand {
    /// The command line passed to the shell
    pub command: String,

    /// Working directory
    pub working_dir: Option<PathBuf>,
}

impl ShellCommand {
    /// Create a new shell command.
    pub fn new(command: impl Into<String>) -> Self {
        Self { command: command.into(), ..Self::default() }
    }

    /// Set the working directory.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

/// Result of executing a command.
#[derive(Debug)]
pub struct ExecutionResult {
    /// Exit status of the command
    pub status: ExitStatus,

    /// Standard output (if captured)
    pub stdout: Option<String>,

    /// Standard error (if captured)
    pub stderr: Option<String>,

    /// Time taken to execute
    pub duration: Duration,

    /// Whether the child was killed for running past the timeout
    pub timed_out: bool,
}

impl ExecutionResult {
    /// Check if the command finished in time with exit code 0.
    pub fn success(&self) -> bool {
        !self.timed_out && self.status.success()
    }

    /// Get the exit code.
    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }
}

/// Command executor.
#[derive(Debug, Default, Clone, Copy)]
pub struct Executor {
    /// Whether to capture output (vs pass through to terminal)
    pub capture_output: bool,

    /// Timeout for command execution
    pub timeout: Option<Duration>,
}

impl Executor {
    /// Create a new executor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether to capture output.
    #[must_use]
    pub fn capture(mut self, capture: bool) -> Self {
        self.capture_output = capture;
        self
    }

    /// Set execution timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Execute a command and wait for it.
    pub fn execute(&self, command: &ShellCommand) -> anyhow::Result<ExecutionResult> {
        let start = Instant::now();

        let (shell, shell_arg) = get_shell();
        let mut cmd = ProcessCommand::new(shell);
        cmd.arg(shell_arg);
        cmd.arg(&command.command);

        if let Some(ref dir) = command.working_dir {
            cmd.current_dir(dir);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        if self.capture_output {
            cmd.stdout(Stdio::piped());
            cmd.stderr(Stdio::piped());
        } else {
            cmd.stdout(Stdio::inherit());
            cmd.stderr(Stdio::inherit());
        }
        cmd.stdin(Stdio::null());

        let mut child = cmd.spawn()?;

        // Drain pipes off-thread so a chatty child cannot block on a full pipe
        let stdout = child.stdout.take().map(|pipe| std::thread::spawn(move || drain(pipe)));
        let stderr = child.stderr.take().map(|pipe| std::thread::spawn(move || drain(pipe)));

        let (status, timed_out) = self.wait(&mut child, start)?;
        let duration = start.elapsed();

        let stdout = stdout.map(|handle| handle.join().unwrap_or_default());
        let stderr = stderr.map(|handle| handle.join().unwrap_or_default());

        Ok(ExecutionResult { status, stdout, stderr, duration, timed_out })
    }

    fn wait(&self, child: &mut Child, start: Instant) -> anyhow::Result<(ExitStatus, bool)> {
        let Some(timeout) = self.timeout else {
            return Ok((child.wait()?, false));
        };

        loop {
            if let Some(status) = child.try_wait()? {
                return Ok((status, false));
            }
            if start.elapsed() >= timeout {
                tracing::warn!(pid = child.id(), "Command timed out, killing it");
                if let Err(error) = kill_group(child) {
                    tracing::debug!(%error, "Could not kill the process group");
                    // The child may exit between try_wait and kill
                    let _ = child.kill();
                }
                return Ok((child.wait()?, true));
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }
}

/// Kill the process group led by `child`.
#[cfg(unix)]
fn kill_group(child: &Child) -> std::io::Result<()> {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let pid = i32::try_from(child.id()).map_err(std::io::Error::other)?;
    killpg(Pid::from_raw(pid), Signal::SIGKILL)?;
    Ok(())
}

#[cfg(not(unix))]
fn kill_group(_child: &Child) -> std::io::Result<()> {
    Err(std::io::ErrorKind::Unsupported.into())
}

fn drain(mut pipe: impl Read) -> String {
    let mut buffer = Vec::new();
    let _ = pipe.read_to_end(&mut buffer);
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Get the shell and argument for the current platform.
fn get_shell() -> (&'static str, &'static str) {
    if cfg!(target_os = "windows") {
        ("cmd", "/C")
    } else {
        ("sh", "-c")
    }
}

//! External process execution.
//!
//! Every command the installer runs goes through [`CommandExecutor`], which
//! takes a structured argument list (never a shell string), blocks until the
//! child exits, and captures both output streams. A non-zero exit status is
//! reported through [`CommandResult::exit_code`]; only a failure to spawn the
//! child is returned as an error.

use crate::error::{InstallerError, Result};
use camino::Utf8Path;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::process::{Command, Output};

/// Windows `CREATE_NO_WINDOW` process creation flag.
#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Captured outcome of one external command.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandResult {
    /// Process exit code; `-1` when the process was terminated by a signal.
    pub exit_code: i32,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl CommandResult {
    /// Returns `true` if the command exited with status 0.
    ///
    /// # Examples
    ///
    /// ```
    /// use source_installer::process::CommandResult;
    ///
    /// let ok = CommandResult { exit_code: 0, ..CommandResult::default() };
    /// assert!(ok.success());
    ///
    /// let failed = CommandResult { exit_code: 128, ..CommandResult::default() };
    /// assert!(!failed.success());
    /// ```
    #[must_use]
    pub const fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Returns the text that best explains a failure.
    ///
    /// Prefers trimmed standard error, falls back to trimmed standard output,
    /// and finally to a placeholder when the command printed nothing.
    ///
    /// # Examples
    ///
    /// ```
    /// use source_installer::process::CommandResult;
    ///
    /// let result = CommandResult {
    ///     exit_code: 1,
    ///     stdout: "Resolving dependencies\n".to_owned(),
    ///     stderr: String::new(),
    /// };
    /// assert_eq!(result.failure_detail(), "Resolving dependencies");
    /// ```
    #[must_use]
    pub fn failure_detail(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_owned();
        }
        let stdout = self.stdout.trim();
        if stdout.is_empty() {
            "unknown error".to_owned()
        } else {
            stdout.to_owned()
        }
    }

    /// Returns trimmed standard output.
    #[must_use]
    pub fn stdout_trimmed(&self) -> &str {
        self.stdout.trim()
    }
}

impl From<Output> for CommandResult {
    fn from(output: Output) -> Self {
        Self {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

/// Abstraction for running external commands.
#[cfg_attr(test, mockall::automock)]
pub trait CommandExecutor {
    /// Runs `program` with `args` in `cwd` and returns the captured result.
    ///
    /// # Errors
    ///
    /// Returns an error only if the process could not be started. A non-zero
    /// exit status is returned as a successful [`CommandResult`].
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use camino::Utf8Path;
    /// use source_installer::process::{CommandExecutor, SystemCommandExecutor};
    ///
    /// let executor = SystemCommandExecutor;
    /// let result = executor.run("git", &["--version"], Utf8Path::new("."))?;
    /// assert!(result.success());
    /// # Ok::<(), source_installer::error::InstallerError>(())
    /// ```
    fn run<'a>(&self, program: &str, args: &[&'a str], cwd: &Utf8Path) -> Result<CommandResult>;
}

/// Executes commands on the host system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandExecutor;

impl CommandExecutor for SystemCommandExecutor {
    fn run(&self, program: &str, args: &[&str], cwd: &Utf8Path) -> Result<CommandResult> {
        debug!("running `{}` in {cwd}", display_command(program, args));

        let mut cmd = Command::new(program);
        cmd.args(args).current_dir(cwd.as_std_path());
        hide_console_window(&mut cmd);

        let output = cmd.output().map_err(InstallerError::from)?;
        let result = CommandResult::from(output);
        debug!("`{program}` exited with {}", result.exit_code);
        Ok(result)
    }
}

#[cfg(windows)]
fn hide_console_window(cmd: &mut Command) {
    use std::os::windows::process::CommandExt;

    cmd.creation_flags(CREATE_NO_WINDOW);
}

#[cfg(not(windows))]
fn hide_console_window(_cmd: &mut Command) {}

/// Renders a command line for logs and dry-run output.
///
/// Arguments containing whitespace are quoted; the result is for display
/// only and is never handed to a shell.
#[must_use]
pub fn display_command(program: &str, args: &[&str]) -> String {
    let mut rendered = program.to_owned();
    for arg in args {
        rendered.push(' ');
        if arg.contains(char::is_whitespace) || arg.is_empty() {
            rendered.push('"');
            rendered.push_str(arg);
            rendered.push('"');
        } else {
            rendered.push_str(arg);
        }
    }
    rendered
}

/// A program plus its argument list, as stored in product profiles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Executable name or path.
    pub program: String,
    /// Arguments passed verbatim to the executable.
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandSpec {
    /// Creates a command spec from string slices.
    ///
    /// # Examples
    ///
    /// ```
    /// use source_installer::process::CommandSpec;
    ///
    /// let spec = CommandSpec::new("shards", &["build", "--release"]);
    /// assert_eq!(spec.to_string(), "shards build --release");
    /// ```
    #[must_use]
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_owned(),
            args: args.iter().map(|&arg| arg.to_owned()).collect(),
        }
    }

    /// Runs the command through `executor`.
    ///
    /// # Errors
    ///
    /// Propagates spawn failures from the executor.
    pub fn run(&self, executor: &dyn CommandExecutor, cwd: &Utf8Path) -> Result<CommandResult> {
        let args: Vec<&str> = self.args.iter().map(String::as_str).collect();
        executor.run(&self.program, &args, cwd)
    }

    /// Returns `true` if the command starts and exits with status 0.
    pub fn succeeds(&self, executor: &dyn CommandExecutor, cwd: &Utf8Path) -> bool {
        let args: Vec<&str> = self.args.iter().map(String::as_str).collect();
        command_succeeds(executor, &self.program, &args, cwd)
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args: Vec<&str> = self.args.iter().map(String::as_str).collect();
        f.write_str(&display_command(&self.program, &args))
    }
}

/// Returns `true` if the command starts and exits with status 0.
///
/// Spawn failures count as "not successful" rather than errors; this is how
/// tool presence is probed.
pub fn command_succeeds(
    executor: &dyn CommandExecutor,
    program: &str,
    args: &[&str],
    cwd: &Utf8Path,
) -> bool {
    executor
        .run(program, args, cwd)
        .is_ok_and(|result| result.success())
}

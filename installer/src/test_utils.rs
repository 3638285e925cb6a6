//! Shared test utilities for the installer crate.
//!
//! Available to unit tests and, through the `test-support` feature, to the
//! integration suites under `tests/`.

use crate::dirs::BaseDirs;
use crate::error::{InstallerError, Result};
use crate::events::Reporter;
use crate::path_registry::MachinePath;
use crate::platform::Platform;
use crate::privileges::PrivilegeProbe;
use crate::process::{CommandExecutor, CommandResult};
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Creates a successful command result with empty output.
#[must_use]
pub fn success_output() -> CommandResult {
    CommandResult::default()
}

/// Creates a successful command result with the given standard output.
#[must_use]
pub fn stdout_output(stdout: &str) -> CommandResult {
    CommandResult {
        exit_code: 0,
        stdout: stdout.to_owned(),
        stderr: String::new(),
    }
}

/// Creates a failed command result with the given standard error.
#[must_use]
pub fn failure_output(stderr: &str) -> CommandResult {
    CommandResult {
        exit_code: 1,
        stdout: String::new(),
        stderr: stderr.to_owned(),
    }
}

/// Creates the error returned when a binary cannot be found.
#[must_use]
pub fn not_found() -> InstallerError {
    std::io::Error::from(std::io::ErrorKind::NotFound).into()
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Represents an expected command invocation for testing.
#[derive(Debug)]
pub struct ExpectedCall {
    /// The program to execute (e.g., "git").
    pub program: &'static str,
    /// The arguments to pass to the program.
    pub args: Vec<&'static str>,
    /// The result to return when this command is invoked.
    pub result: Result<CommandResult>,
}

impl ExpectedCall {
    /// Expects `program args` and answers with `result`.
    #[must_use]
    pub fn new(
        program: &'static str,
        args: &[&'static str],
        result: Result<CommandResult>,
    ) -> Self {
        Self {
            program,
            args: args.to_vec(),
            result,
        }
    }

    /// Expects `program args` and answers with a successful empty result.
    #[must_use]
    pub fn ok(program: &'static str, args: &[&'static str]) -> Self {
        Self::new(program, args, Ok(success_output()))
    }
}

/// A scripted implementation of `CommandExecutor` for testing.
///
/// Expected invocations are consumed in order; an unexpected or mismatched
/// invocation answers with [`InstallerError::StubMismatch`] and is recorded
/// so the test can report it. Clones share the same script, so a test can
/// hand one clone to the pipeline and keep another for assertions.
#[derive(Debug, Clone, Default)]
pub struct StubExecutor {
    expected: Arc<Mutex<VecDeque<ExpectedCall>>>,
    mismatches: Arc<Mutex<Vec<String>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

/// One invocation seen by [`StubExecutor`]: program, arguments, and working
/// directory.
pub type RecordedCall = (String, Vec<String>, Utf8PathBuf);

impl StubExecutor {
    /// Creates a new `StubExecutor` with the given expected calls.
    #[must_use]
    pub fn new(expected: Vec<ExpectedCall>) -> Self {
        Self {
            expected: Arc::new(Mutex::new(expected.into())),
            ..Self::default()
        }
    }

    /// Returns every invocation seen so far as `(program, args, cwd)`.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }

    /// Asserts that all expected command invocations have been consumed and
    /// nothing unexpected was run.
    ///
    /// # Panics
    ///
    /// Panics if there are remaining expected calls or recorded mismatches.
    pub fn assert_finished(&self) {
        let mismatches = lock(&self.mismatches);
        assert!(mismatches.is_empty(), "stub mismatches: {mismatches:#?}");
        let expected = lock(&self.expected);
        assert!(
            expected.is_empty(),
            "expected further command invocations: {expected:#?}"
        );
    }
}

impl CommandExecutor for StubExecutor {
    fn run(&self, program: &str, args: &[&str], cwd: &Utf8Path) -> Result<CommandResult> {
        lock(&self.calls).push((
            program.to_owned(),
            args.iter().map(|&arg| arg.to_owned()).collect(),
            cwd.to_owned(),
        ));

        let Some(call) = lock(&self.expected).pop_front() else {
            let message = format!("unexpected invocation: {program} {args:?}");
            lock(&self.mismatches).push(message.clone());
            return Err(InstallerError::StubMismatch { message });
        };

        if call.program != program || call.args.as_slice() != args {
            let message = format!(
                "expected {} {:?}, got {program} {args:?}",
                call.program, call.args
            );
            lock(&self.mismatches).push(message.clone());
            return Err(InstallerError::StubMismatch { message });
        }

        call.result
    }
}

/// A privilege probe with a fixed answer.
#[derive(Debug, Clone, Copy)]
pub struct StubPrivileges(pub bool);

impl PrivilegeProbe for StubPrivileges {
    fn is_elevated(&self) -> bool {
        self.0
    }
}

/// Directory resolution pinned to a fixed home directory.
#[derive(Debug, Clone, Default)]
pub struct StubBaseDirs {
    /// The home directory, or `None` to simulate an unresolvable home.
    pub home: Option<Utf8PathBuf>,
}

impl StubBaseDirs {
    /// Resolves every directory under `home`.
    #[must_use]
    pub fn new(home: &Utf8Path) -> Self {
        Self {
            home: Some(home.to_owned()),
        }
    }
}

impl BaseDirs for StubBaseDirs {
    fn home_dir(&self) -> Option<Utf8PathBuf> {
        self.home.clone()
    }

    fn install_root(&self, _platform: Platform) -> Option<Utf8PathBuf> {
        self.home.clone()
    }
}

/// An in-memory machine PATH, shareable between the pipeline and the test.
#[derive(Debug, Clone, Default)]
pub struct MemoryMachinePath {
    value: Arc<Mutex<String>>,
    writes: Arc<Mutex<usize>>,
}

impl MemoryMachinePath {
    /// Creates a store holding `value`.
    #[must_use]
    pub fn new(value: &str) -> Self {
        Self {
            value: Arc::new(Mutex::new(value.to_owned())),
            writes: Arc::new(Mutex::new(0)),
        }
    }

    /// The current PATH value.
    #[must_use]
    pub fn value(&self) -> String {
        lock(&self.value).clone()
    }

    /// How many times the value was persisted.
    #[must_use]
    pub fn writes(&self) -> usize {
        *lock(&self.writes)
    }
}

impl MachinePath for MemoryMachinePath {
    fn read(&self) -> Result<String> {
        Ok(self.value())
    }

    fn write(&self, value: &str) -> Result<()> {
        value.clone_into(&mut lock(&self.value));
        *lock(&self.writes) += 1;
        Ok(())
    }
}

/// One reporter callback, as recorded by [`RecordingReporter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recorded {
    /// A progress update.
    Progress(u8),
    /// A title update.
    Title(String),
    /// An error report.
    Error(String),
}

/// Collects reporter callbacks in order.
#[derive(Debug, Clone, Default)]
pub struct RecordingReporter {
    events: Arc<Mutex<Vec<Recorded>>>,
}

impl RecordingReporter {
    /// All recorded callbacks.
    #[must_use]
    pub fn events(&self) -> Vec<Recorded> {
        lock(&self.events).clone()
    }

    /// Recorded progress values, in order.
    #[must_use]
    pub fn progress(&self) -> Vec<u8> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Recorded::Progress(percent) => Some(percent),
                _ => None,
            })
            .collect()
    }

    /// Recorded titles, in order.
    #[must_use]
    pub fn titles(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Recorded::Title(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    /// Recorded error messages, in order.
    #[must_use]
    pub fn errors(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Recorded::Error(message) => Some(message),
                _ => None,
            })
            .collect()
    }
}

impl Reporter for RecordingReporter {
    fn progress(&self, percent: u8) {
        lock(&self.events).push(Recorded::Progress(percent));
    }

    fn title(&self, text: &str) {
        lock(&self.events).push(Recorded::Title(text.to_owned()));
    }

    fn error(&self, message: &str) {
        lock(&self.events).push(Recorded::Error(message.to_owned()));
    }
}

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

use super::error::EngineError;
use super::invocation::Invocation;

/// What came out of one finished process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub command: String,
    pub exit_code: Option<i32>,
    pub success: bool,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
}

impl RunReport {
    pub fn succeeded(invocation: &Invocation) -> Self {
        Self {
            command: invocation.command_line(),
            exit_code: Some(0),
            success: true,
            stdout: None,
            stderr: None,
        }
    }

    /// Turns a non-zero exit into [`EngineError::ProcessFailed`].
    pub fn require_success(self) -> Result<Self, EngineError> {
        if self.success {
            return Ok(self);
        }
        Err(EngineError::ProcessFailed {
            status: match self.exit_code {
                Some(code) => format!("exit code {}", code),
                None => "a signal".to_string(),
            },
            command: self.command,
            stderr: self.stderr,
        })
    }
}

/// Runs external programs to completion.
pub trait ProcessRunner: Send + Sync {
    /// Fails only when the process cannot be started. A non-zero exit is a successful run whose
    /// report says so.
    fn run(&self, invocation: &Invocation) -> Result<RunReport, EngineError>;
}

/// Spawns real child processes and blocks until they exit.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> Result<RunReport, EngineError> {
        let command_line = invocation.command_line();
        info!(program = %invocation.program().display(), "Launching simulator");
        debug!(argv = %command_line, "Full command line");

        let mut command = invocation.to_command();
        let spawn_error = |e: std::io::Error| EngineError::Spawn {
            program: invocation.program().to_string_lossy().to_string(),
            source: e,
        };

        let report = if invocation.captures_output() {
            let output = command.output().map_err(spawn_error)?;
            RunReport {
                command: command_line,
                exit_code: output.status.code(),
                success: output.status.success(),
                stdout: Some(String::from_utf8_lossy(&output.stdout).into_owned()),
                stderr: Some(String::from_utf8_lossy(&output.stderr).into_owned()),
            }
        } else {
            let status = command.status().map_err(spawn_error)?;
            RunReport {
                command: command_line,
                exit_code: status.code(),
                success: status.success(),
                stdout: None,
                stderr: None,
            }
        };

        if !report.success {
            warn!(
                command = %report.command,
                exit_code = ?report.exit_code,
                "Simulator exited unsuccessfully"
            );
        }
        Ok(report)
    }
}

type RunHook = Box<dyn Fn(&Invocation) + Send + Sync>;

/// Records every invocation instead of spawning it and reports success.
///
/// Backs dry runs, and lets tests assert the exact command lines a workflow produces.
/// An optional hook runs for each invocation, e.g. to fake the files a simulator would write.
#[derive(Default)]
pub struct RecordingRunner {
    calls: Mutex<Vec<Invocation>>,
    hook: Option<RunHook>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hook(hook: impl Fn(&Invocation) + Send + Sync + 'static) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            hook: Some(Box::new(hook)),
        }
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    pub fn argvs(&self) -> Vec<Vec<String>> {
        self.invocations().iter().map(Invocation::argv).collect()
    }

    pub fn count(&self) -> usize {
        self.invocations().len()
    }
}

impl ProcessRunner for RecordingRunner {
    fn run(&self, invocation: &Invocation) -> Result<RunReport, EngineError> {
        info!(command = %invocation.command_line(), "Dry run");
        if let Some(hook) = &self.hook {
            hook(invocation);
        }
        match self.calls.lock() {
            Ok(mut calls) => calls.push(invocation.clone()),
            Err(poisoned) => poisoned.into_inner().push(invocation.clone()),
        }
        Ok(RunReport::succeeded(invocation))
    }
}

/// Whether runs whose expected output already exists are skipped.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub use_cached: bool,
}

impl CachePolicy {
    pub fn new(use_cached: bool) -> Self {
        Self { use_cached }
    }

    pub fn is_cached(&self, expected: &Path) -> bool {
        self.use_cached && expected.exists()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Cached(PathBuf),
    Ran(RunReport),
}

impl Outcome {
    pub fn was_cached(&self) -> bool {
        matches!(self, Outcome::Cached(_))
    }

    pub fn report(&self) -> Option<&RunReport> {
        match self {
            Outcome::Ran(report) => Some(report),
            Outcome::Cached(_) => None,
        }
    }

    pub fn require_success(self) -> Result<Self, EngineError> {
        match self {
            Outcome::Ran(report) => report.require_success().map(Outcome::Ran),
            cached => Ok(cached),
        }
    }
}

/// Runs `invocation` unless caching is on and `expected` already exists.
pub fn run_unless_cached(
    runner: &dyn ProcessRunner,
    cache: CachePolicy,
    expected: &Path,
    invocation: &Invocation,
) -> Result<Outcome, EngineError> {
    if cache.is_cached(expected) {
        debug!(path = %expected.display(), "Using cached results");
        return Ok(Outcome::Cached(expected.to_path_buf()));
    }
    runner.run(invocation).map(Outcome::Ran)
}

//! External tool invocation.
//!
//! HEASoft tools take `key=value` arguments and are driven through a shell
//! inside the workspace directory. [`ToolRunner`] is the seam between the
//! workflows and the processes they start, so tests can script tool
//! behaviour without HEASoft installed.

use crate::{Error, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};
use swiftmon_io::Workspace;
use tracing::{debug, info};

/// Pipeline stage a tool call belongs to, used in logs and errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Extract,
    Arf,
    Grouping,
    GtiCopy,
    BadPixAppend,
    ResponseCombine,
    ResponseStack,
    SpectrumSum,
    ExposureMap,
    Fold,
    Toa,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Extract => "extraction",
            Stage::Arf => "ARF generation",
            Stage::Grouping => "spectral grouping",
            Stage::GtiCopy => "GTI row copy",
            Stage::BadPixAppend => "BADPIX append",
            Stage::ResponseCombine => "ARF/RMF combination",
            Stage::ResponseStack => "response stacking",
            Stage::SpectrumSum => "spectrum summation",
            Stage::ExposureMap => "exposure map",
            Stage::Fold => "folding",
            Stage::Toa => "TOA measurement",
        };
        f.write_str(name)
    }
}

/// One external tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    stage: Stage,
    program: String,
    args: Vec<String>,
    artifact: Option<PathBuf>,
}

impl ToolCommand {
    #[must_use]
    pub fn new(stage: Stage, program: impl Into<String>) -> Self {
        Self {
            stage,
            program: program.into(),
            args: Vec::new(),
            artifact: None,
        }
    }

    /// Appends a positional argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends a `key=value` argument.
    #[must_use]
    pub fn kv(mut self, key: &str, value: impl fmt::Display) -> Self {
        self.args.push(format!("{key}={value}"));
        self
    }

    /// Records the primary file this call writes, for error reporting.
    #[must_use]
    pub fn producing(mut self, artifact: impl Into<PathBuf>) -> Self {
        self.artifact = Some(artifact.into());
        self
    }

    #[must_use]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    #[must_use]
    pub fn artifact(&self) -> Option<&Path> {
        self.artifact.as_deref()
    }

    /// Value of the first `key=value` argument with this key.
    #[must_use]
    pub fn value_of(&self, key: &str) -> Option<&str> {
        self.args.iter().find_map(|arg| {
            arg.split_once('=')
                .filter(|(k, _)| *k == key)
                .map(|(_, v)| v)
        })
    }

    /// Shell command line with each token quoted where needed.
    #[must_use]
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .map(shell_quote)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_line())
    }
}

fn shell_quote(token: &str) -> String {
    let plain = !token.is_empty()
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./=:,+%@".contains(c));
    if plain {
        token.to_string()
    } else {
        format!("'{}'", token.replace('\'', r"'\''"))
    }
}

/// Captured result of a finished tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code, `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    /// Wall-clock run time.
    pub elapsed: Duration,
}

impl ToolOutput {
    /// Output of a tool that exited with status 0.
    #[must_use]
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
            elapsed: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Converts a failed exit into [`Error::ExternalToolFailure`].
    ///
    /// # Errors
    /// Returns an error if the tool did not exit with status 0.
    pub fn check(self, command: &ToolCommand) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }
        Err(Error::ExternalToolFailure {
            stage: command.stage,
            command: command.command_line(),
            artifact: command.artifact.clone(),
            exit_code: self.exit_code,
            stderr: self.stderr.trim().to_string(),
        })
    }
}

/// Executes tool commands inside a workspace.
pub trait ToolRunner {
    /// Runs `command` to completion.
    ///
    /// # Errors
    /// Returns [`Error::ExternalToolFailure`] when the tool exits
    /// unsuccessfully, or an I/O error if it cannot be started.
    fn run(&self, workspace: &Workspace, command: &ToolCommand) -> Result<ToolOutput>;
}

impl<R: ToolRunner + ?Sized> ToolRunner for &R {
    fn run(&self, workspace: &Workspace, command: &ToolCommand) -> Result<ToolOutput> {
        (**self).run(workspace, command)
    }
}

/// Runs tools synchronously through `sh -c`.
#[derive(Debug, Clone)]
pub struct ShellRunner {
    shell: PathBuf,
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ShellRunner {
    #[must_use]
    pub fn new() -> Self {
        Self {
            shell: PathBuf::from("sh"),
        }
    }

    /// Uses a different POSIX shell.
    #[must_use]
    pub fn with_shell(mut self, shell: impl Into<PathBuf>) -> Self {
        self.shell = shell.into();
        self
    }
}

impl ToolRunner for ShellRunner {
    fn run(&self, workspace: &Workspace, command: &ToolCommand) -> Result<ToolOutput> {
        let line = command.command_line();
        info!(stage = %command.stage(), dir = %workspace.dir().display(), "{line}");

        let start = Instant::now();
        let output = Command::new(&self.shell)
            .arg("-c")
            .arg(&line)
            .current_dir(workspace.dir())
            .output()?;

        let result = ToolOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            elapsed: start.elapsed(),
        };
        info!(
            program = command.program(),
            exit_code = ?result.exit_code,
            "finished in {:.2} s",
            result.elapsed_secs()
        );
        if !result.stdout.is_empty() {
            debug!(program = command.program(), "stdout:\n{}", result.stdout);
        }

        result.check(command)
    }
}

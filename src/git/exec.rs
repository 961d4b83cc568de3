//! git::exec
//!
//! External command execution.
//!
//! This module is the **only place** that spawns processes. Every command is
//! built as an argument array ([`Invocation`]) and handed to the operating
//! system directly, so no shell ever interprets ref names, messages or
//! paths.
//!
//! # Failure model
//!
//! A command fails when it:
//! - cannot be spawned ([`ExecError::Spawn`])
//! - exits with a non-zero status ([`ExecError::Failed`])
//! - writes anything to stderr, even with exit status 0 ([`ExecError::Stderr`])
//! - writes more than the output limit to either stream
//!   ([`ExecError::OutputTooLarge`])
//!
//! There are no retries here. Exactly one process is spawned per call.
//!
//! # Example
//!
//! ```no_run
//! use shallowmirror::git::exec::{CommandRunner, Invocation, SystemRunner};
//!
//! # async fn demo() -> Result<(), shallowmirror::git::exec::ExecError> {
//! let runner = SystemRunner::default();
//! let out = runner
//!     .run(&Invocation::git(["describe", "--tags", "--always"]).current_dir("/srv/repo"))
//!     .await?;
//! println!("{}", out.trim());
//! # Ok(())
//! # }
//! ```

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, instrument};

/// Default per-stream cap on captured output (4 MiB).
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 4 * 1024 * 1024;

/// Errors from running an external command.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The process could not be started.
    #[error("failed to spawn `{command}`{}: {source}", location(.cwd))]
    Spawn {
        command: String,
        cwd: Option<PathBuf>,
        source: std::io::Error,
    },

    /// The process exited with a non-zero status.
    #[error("`{command}` failed{} ({}): {}", location(.cwd), exit(.code), trimmed(.stderr))]
    Failed {
        command: String,
        cwd: Option<PathBuf>,
        /// Exit code, `None` if killed by a signal
        code: Option<i32>,
        stderr: String,
    },

    /// The process exited successfully but wrote to stderr.
    #[error("`{command}` wrote to stderr{}: {}", location(.cwd), trimmed(.stderr))]
    Stderr {
        command: String,
        cwd: Option<PathBuf>,
        stderr: String,
    },

    /// The process produced more output than allowed.
    #[error("`{command}` exceeded the {limit} byte output limit{}", location(.cwd))]
    OutputTooLarge {
        command: String,
        cwd: Option<PathBuf>,
        limit: usize,
    },

    /// Reading output or waiting for the process failed.
    #[error("i/o error running `{command}`{}: {source}", location(.cwd))]
    Io {
        command: String,
        cwd: Option<PathBuf>,
        source: std::io::Error,
    },
}

fn location(cwd: &Option<PathBuf>) -> String {
    match cwd {
        Some(dir) => format!(" in {}", dir.display()),
        None => String::new(),
    }
}

fn trimmed(s: &str) -> &str {
    s.trim()
}

fn exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_string(),
    }
}

impl ExecError {
    /// The rendered command line that failed.
    pub fn command(&self) -> &str {
        match self {
            ExecError::Spawn { command, .. }
            | ExecError::Failed { command, .. }
            | ExecError::Stderr { command, .. }
            | ExecError::OutputTooLarge { command, .. }
            | ExecError::Io { command, .. } => command,
        }
    }

    /// Captured stderr, when the process got far enough to produce it.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            ExecError::Failed { stderr, .. } | ExecError::Stderr { stderr, .. } => Some(stderr),
            _ => None,
        }
    }
}

/// A single external command: program, argument array and working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    program: OsString,
    args: Vec<OsString>,
    cwd: Option<PathBuf>,
}

impl Invocation {
    /// Start building an invocation of `program`.
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: program.as_ref().to_os_string(),
            args: Vec::new(),
            cwd: None,
        }
    }

    /// Invocation of `git` with the given arguments.
    pub fn git<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        Self::new("git").args(args)
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Run in the given directory.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn program(&self) -> &OsStr {
        &self.program
    }

    pub fn arguments(&self) -> &[OsString] {
        &self.args
    }

    pub fn cwd(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    /// First argument, which for git is the subcommand.
    pub fn subcommand(&self) -> Option<String> {
        self.args
            .first()
            .map(|a| a.to_string_lossy().into_owned())
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.to_string_lossy())?;
        for arg in &self.args {
            let arg = arg.to_string_lossy();
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " {arg:?}")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// Something that can run an [`Invocation`] and return its stdout.
///
/// The production implementation is [`SystemRunner`]. Tests substitute
/// scripted runners to count and inspect invocations.
#[async_trait]
pub trait CommandRunner: Send + Sync + fmt::Debug {
    /// Run the command to completion and return its stdout.
    async fn run(&self, invocation: &Invocation) -> Result<String, ExecError>;
}

/// Runs commands as real child processes via `tokio::process`.
#[derive(Debug, Clone)]
pub struct SystemRunner {
    max_output_bytes: usize,
}

impl Default for SystemRunner {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_OUTPUT_BYTES)
    }
}

impl SystemRunner {
    /// Create a runner with a per-stream output cap.
    pub fn new(max_output_bytes: usize) -> Self {
        Self { max_output_bytes }
    }

    pub fn max_output_bytes(&self) -> usize {
        self.max_output_bytes
    }
}

enum CaptureError {
    Io(std::io::Error),
    Overflow,
}

/// Read a stream to the end, failing as soon as it exceeds `limit` bytes.
async fn capture<R>(reader: Option<R>, limit: usize) -> Result<Vec<u8>, CaptureError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    if let Some(reader) = reader {
        reader
            .take(limit as u64 + 1)
            .read_to_end(&mut buf)
            .await
            .map_err(CaptureError::Io)?;
    }
    if buf.len() > limit {
        return Err(CaptureError::Overflow);
    }
    Ok(buf)
}

#[async_trait]
impl CommandRunner for SystemRunner {
    #[instrument(level = "debug", skip(self), fields(command = %invocation, cwd = ?invocation.cwd()))]
    async fn run(&self, invocation: &Invocation) -> Result<String, ExecError> {
        let command = invocation.to_string();
        let cwd = invocation.cwd.clone();

        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args);
        if let Some(dir) = &cwd {
            cmd.current_dir(dir);
        }
        cmd.env("GIT_TERMINAL_PROMPT", "0");
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        debug!("spawning");

        let mut child = cmd.spawn().map_err(|source| ExecError::Spawn {
            command: command.clone(),
            cwd: cwd.clone(),
            source,
        })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let captured = tokio::try_join!(
            capture(stdout, self.max_output_bytes),
            capture(stderr, self.max_output_bytes)
        );

        let (stdout, stderr) = match captured {
            Ok(streams) => streams,
            Err(e) => {
                // The child may be blocked on a full pipe; don't wait for it.
                let _ = child.kill().await;
                return Err(match e {
                    CaptureError::Overflow => ExecError::OutputTooLarge {
                        command,
                        cwd,
                        limit: self.max_output_bytes,
                    },
                    CaptureError::Io(source) => ExecError::Io {
                        command,
                        cwd,
                        source,
                    },
                });
            }
        };

        let status = child.wait().await.map_err(|source| ExecError::Io {
            command: command.clone(),
            cwd: cwd.clone(),
            source,
        })?;

        let stderr = String::from_utf8_lossy(&stderr).into_owned();

        if !status.success() {
            return Err(ExecError::Failed {
                command,
                cwd,
                code: status.code(),
                stderr,
            });
        }

        if !stderr.is_empty() {
            return Err(ExecError::Stderr {
                command,
                cwd,
                stderr,
            });
        }

        debug!(bytes = stdout.len(), "command succeeded");
        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// External command execution.
//
// Discovery and spooling shell out to `powershell.exe`, `wmic`, `print`,
// `lpstat`, `lp` and `cancel`.  All of them go through `CommandRunner` so the
// parsing and fallback order can be exercised without the real tools.

use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, instrument};

use printagent_core::error::{AgentError, Result};

/// Operating system family that decides which tools are used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    MacOs,
    Linux,
    Other,
}

impl Platform {
    /// The platform this binary was compiled for.
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Self::Windows
        } else if cfg!(target_os = "macos") {
            Self::MacOs
        } else if cfg!(target_os = "linux") {
            Self::Linux
        } else {
            Self::Other
        }
    }

    /// Whether the CUPS command line tools (`lpstat`, `lp`, `cancel`) apply.
    pub fn is_cups(&self) -> bool {
        matches!(self, Self::MacOs | Self::Linux)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Windows => "windows",
            Self::MacOs => "macos",
            Self::Linux => "linux",
            Self::Other => std::env::consts::OS,
        }
    }
}

/// Runs a program and returns its standard output.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args`.  A non-zero exit status is an error.
    async fn run(&self, program: &str, args: &[String]) -> Result<String>;

    /// Run `program` with `line` appended to its command line as is.  Only
    /// meaningful on Windows, where some tools parse their own quoting.
    async fn run_raw(&self, program: &str, line: &str) -> Result<String>;
}

/// A program together with the arguments to run it with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    /// Arguments quoted by the process layer.
    Args { program: String, args: Vec<String> },
    /// Command line passed through verbatim.
    Raw { program: String, line: String },
}

impl Invocation {
    pub fn display(&self) -> String {
        match self {
            Self::Args { program, args } => display_command(program, args),
            Self::Raw { program, line } => format!("{program} {line}"),
        }
    }

    pub async fn run(&self, runner: &dyn CommandRunner) -> Result<String> {
        match self {
            Self::Args { program, args } => runner.run(program, args).await,
            Self::Raw { program, line } => runner.run_raw(program, line).await,
        }
    }
}

impl From<(String, Vec<String>)> for Invocation {
    fn from((program, args): (String, Vec<String>)) -> Self {
        Self::Args { program, args }
    }
}

/// Real process runner with a per-command timeout.
#[derive(Debug, Clone)]
pub struct ShellRunner {
    timeout: Duration,
}

impl ShellRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl CommandRunner for ShellRunner {
    #[instrument(skip(self, args))]
    async fn run(&self, program: &str, args: &[String]) -> Result<String> {
        let mut command = Command::new(program);
        command.args(args);
        self.execute(display_command(program, args), command).await
    }

    #[instrument(skip(self, line))]
    async fn run_raw(&self, program: &str, line: &str) -> Result<String> {
        let command_line = format!("{program} {line}");
        #[cfg(windows)]
        let result = {
            let mut command = Command::new(program);
            command.raw_arg(line);
            self.execute(command_line, command).await
        };
        #[cfg(not(windows))]
        let result = Err(AgentError::UnsupportedPlatform(format!(
            "verbatim command lines need Windows: {command_line}"
        )));
        result
    }
}

impl ShellRunner {
    async fn execute(&self, command_line: String, mut command: Command) -> Result<String> {
        debug!(command = %command_line, "running external command");

        let output = tokio::time::timeout(self.timeout, command.kill_on_drop(true).output())
            .await
            .map_err(|_| AgentError::Command {
                command: command_line.clone(),
                detail: format!("timed out after {}s", self.timeout.as_secs()),
            })?
            .map_err(|e| AgentError::Command {
                command: command_line.clone(),
                detail: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let detail = if stderr.is_empty() {
                format!("exited with {}", output.status)
            } else {
                stderr
            };
            return Err(AgentError::Command {
                command: command_line,
                detail,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Render a command line for log output.
pub fn display_command(program: &str, args: &[String]) -> String {
    let mut line = program.to_string();
    for arg in args {
        line.push(' ');
        if arg.contains(' ') {
            line.push('"');
            line.push_str(arg);
            line.push('"');
        } else {
            line.push_str(arg);
        }
    }
    line
}

/// Program and arguments for a non-interactive PowerShell script.
pub fn powershell(script: impl Into<String>) -> (String, Vec<String>) {
    (
        "powershell.exe".into(),
        vec![
            "-NoProfile".into(),
            "-NonInteractive".into(),
            "-ExecutionPolicy".into(),
            "Bypass".into(),
            "-Command".into(),
            script.into(),
        ],
    )
}

/// Quote a value as a PowerShell single-quoted literal.
pub fn ps_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

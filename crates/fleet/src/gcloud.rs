//! `gcloud` subprocess implementation of [`CloudLookup`] and [`CommandRunner`].

use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::command::RenderedCommand;
use crate::error::{LookupError, RunError};
use crate::traits::{CloudLookup, CommandRunner};

/// Executable searched for on `PATH` when no explicit path is given.
const GCLOUD: &str = "gcloud";

/// Stderr lines kept as failure detail.
const STDERR_TAIL_LINES: usize = 20;

/// Where the stdout of executed commands goes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChildStdout {
    /// Share the operator's stdout.
    #[default]
    Inherit,
    /// Send it to our stderr, leaving stdout to the report.
    Stderr,
}

/// Handle on the local gcloud installation.
#[derive(Debug, Clone)]
pub struct Gcloud {
    program: String,
    child_stdout: ChildStdout,
}

impl Gcloud {
    /// Use `program` if given, else the `gcloud` found on `PATH`, else the bare
    /// name (spawning will then report the failure).
    #[must_use]
    pub fn locate(program: Option<PathBuf>) -> Self {
        let program = program
            .or_else(|| which::which(GCLOUD).ok())
            .map_or_else(|| GCLOUD.to_string(), |p| p.to_string_lossy().to_string());
        debug!(program = %program, "Using gcloud executable");
        Self {
            program,
            child_stdout: ChildStdout::default(),
        }
    }

    /// Choose where executed commands write their stdout.
    #[must_use]
    pub fn with_child_stdout(mut self, target: ChildStdout) -> Self {
        self.child_stdout = target;
        self
    }

    /// Run a read-only query and return its trimmed stdout.
    async fn query(&self, what: &'static str, args: &[&str]) -> Result<String, LookupError> {
        debug!(what, ?args, "Querying gcloud");
        let output = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| LookupError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(LookupError::Failed {
                what,
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl CloudLookup for Gcloud {
    async fn resolve_active_project(&self) -> Result<String, LookupError> {
        let project = self
            .query("Project", &["config", "get-value", "project"])
            .await?;
        // gcloud prints "(unset)" on some versions instead of failing.
        if project.is_empty() || project == "(unset)" {
            return Err(LookupError::NoProject);
        }
        Ok(project)
    }

    async fn resolve_service_account(&self, project: &str) -> Result<String, LookupError> {
        let listing = self
            .query(
                "Service account",
                &[
                    "iam",
                    "service-accounts",
                    "list",
                    "--project",
                    project,
                    "--format=value(email)",
                ],
            )
            .await?;
        listing
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(String::from)
            .ok_or_else(|| LookupError::NoServiceAccount(project.to_string()))
    }
}

#[async_trait]
impl CommandRunner for Gcloud {
    async fn run(&self, command: &RenderedCommand) -> Result<(), RunError> {
        let label = command.label();
        debug!(command = %label, argc = command.argv.len(), "Spawning gcloud");

        let stdout = match self.child_stdout {
            ChildStdout::Inherit => Stdio::inherit(),
            ChildStdout::Stderr => Stdio::from(std::io::stderr()),
        };
        let mut child = Command::new(&self.program)
            .args(&command.argv)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| RunError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        // Forward stderr live and keep its tail for the report. Lines may not
        // be UTF-8, and the child is always waited on.
        let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
        if let Some(stderr) = child.stderr.take() {
            let mut reader = BufReader::new(stderr);
            let mut buf = Vec::new();
            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf).await {
                    Ok(0) => break,
                    Ok(_) => {
                        let line = String::from_utf8_lossy(&buf)
                            .trim_end_matches(['\r', '\n'])
                            .to_string();
                        eprintln!("[{label}] {line}");
                        if tail.len() == STDERR_TAIL_LINES {
                            tail.pop_front();
                        }
                        tail.push_back(line);
                    }
                    Err(e) => {
                        warn!(command = %label, error = %e, "Failed to read gcloud stderr");
                        break;
                    }
                }
            }
        }

        let status = child.wait().await?;
        if status.success() {
            return Ok(());
        }

        let stderr = tail.into_iter().collect::<Vec<_>>().join("\n");
        warn!(
            command = %label,
            exit_code = ?status.code(),
            "gcloud command failed"
        );
        Err(RunError::Exit {
            code: status.code().unwrap_or(-1),
            stderr: if stderr.trim().is_empty() {
                "(no error output)".to_string()
            } else {
                stderr
            },
        })
    }

    fn program(&self) -> &str {
        &self.program
    }
}

//! Printing or executing rendered commands.
//!
//! In apply mode the firewall and subnet commands run one after another
//! before any instance starts; instances then run concurrently, one task
//! each, and a failure never cancels a sibling.

use std::io::Write;
use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::command::RenderedCommand;
use crate::error::FleetResult;
use crate::request::Mode;
use crate::traits::CommandRunner;

/// Outcome of one executed command.
#[derive(Debug, Clone, Serialize)]
pub struct OperationResult {
    pub command: RenderedCommand,
    pub succeeded: bool,
    pub error_detail: Option<String>,
}

impl OperationResult {
    fn from_run(command: RenderedCommand, outcome: Result<(), String>) -> Self {
        match outcome {
            Ok(()) => Self {
                command,
                succeeded: true,
                error_detail: None,
            },
            Err(detail) => Self {
                command,
                succeeded: false,
                error_detail: Some(detail),
            },
        }
    }
}

/// Drives a batch of commands through a [`CommandRunner`].
pub struct Dispatcher {
    runner: Arc<dyn CommandRunner>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    /// Print or execute `commands` according to `mode`.
    ///
    /// Print mode writes one `Running: ...` line per command to `out` and
    /// returns no results. Apply mode returns one result per command, in the
    /// order of `commands`.
    ///
    /// # Errors
    /// Only fails if writing to `out` fails; command failures are reported in
    /// the returned results.
    pub async fn dispatch(
        &self,
        commands: Vec<RenderedCommand>,
        mode: Mode,
        out: &mut dyn Write,
    ) -> FleetResult<Vec<OperationResult>> {
        match mode {
            Mode::Print => {
                self.print(&commands, out)?;
                Ok(Vec::new())
            }
            Mode::Apply => Ok(self.apply(commands, out).await?),
        }
    }

    fn print(&self, commands: &[RenderedCommand], out: &mut dyn Write) -> std::io::Result<()> {
        for command in commands {
            writeln!(out, "Running: {}", command.shell_line(self.runner.program()))?;
        }
        out.flush()
    }

    async fn apply(
        &self,
        commands: Vec<RenderedCommand>,
        out: &mut dyn Write,
    ) -> std::io::Result<Vec<OperationResult>> {
        let total = commands.len();
        let (prelude, instances): (Vec<_>, Vec<_>) =
            commands.into_iter().enumerate().partition(|(_, c)| c.kind.is_prelude());

        let mut slots: Vec<Option<OperationResult>> = vec![None; total];

        for (index, command) in prelude {
            writeln!(out, "\nRunning: {}", command.shell_line(self.runner.program()))?;
            out.flush()?;
            info!(command = %command.label(), "Running prelude command");
            let outcome = self.runner.run(&command).await.map_err(|e| e.to_string());
            if let Err(detail) = &outcome {
                warn!(command = %command.label(), error = %detail, "Prelude command failed, continuing");
            }
            slots[index] = Some(OperationResult::from_run(command, outcome));
        }

        let mut set = JoinSet::new();
        let mut spawned = Vec::with_capacity(instances.len());
        for (index, command) in instances {
            writeln!(out, "\nRunning: {}", command.shell_line(self.runner.program()))?;
            let runner = Arc::clone(&self.runner);
            spawned.push((index, command.clone()));
            set.spawn(async move {
                let outcome = runner.run(&command).await.map_err(|e| e.to_string());
                (index, command, outcome)
            });
        }
        out.flush()?;
        debug!(tasks = set.len(), "Waiting for instance tasks");

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, command, outcome)) => {
                    debug!(command = %command.label(), ok = outcome.is_ok(), "Instance task finished");
                    slots[index] = Some(OperationResult::from_run(command, outcome));
                }
                Err(e) => warn!(error = %e, "Instance task panicked"),
            }
        }

        // A panicked task leaves its slot empty; record it as failed.
        for (index, command) in spawned {
            if slots[index].is_none() {
                slots[index] = Some(OperationResult::from_run(
                    command,
                    Err("task panicked before completing".to_string()),
                ));
            }
        }

        Ok(slots.into_iter().flatten().collect())
    }
}

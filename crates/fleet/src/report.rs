//! Per-operation outcome reporting.

use std::io::Write;

use serde::Serialize;

use crate::command::{CommandKind, RenderedCommand};
use crate::dispatch::OperationResult;
use crate::request::Mode;
use crate::ui;

/// How the final report is written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// All outcomes of one run.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub mode: Mode,
    /// Every rendered command, in execution order.
    pub commands: Vec<RenderedCommand>,
    /// Outcomes of executed commands; empty in print mode.
    pub results: Vec<OperationResult>,
}

impl Report {
    #[must_use]
    pub fn new(
        mode: Mode,
        commands: Vec<RenderedCommand>,
        results: Vec<OperationResult>,
    ) -> Self {
        Self {
            mode,
            commands,
            results,
        }
    }

    /// Instance creations that failed.
    pub fn failed_instances(&self) -> impl Iterator<Item = &OperationResult> {
        self.results
            .iter()
            .filter(|r| !r.succeeded && r.command.kind == CommandKind::InstanceCreate)
    }

    /// Firewall or subnet creations that failed. These are warnings only.
    pub fn warnings(&self) -> impl Iterator<Item = &OperationResult> {
        self.results
            .iter()
            .filter(|r| !r.succeeded && r.command.kind.is_prelude())
    }

    /// Process exit code: 1 if any instance failed to be created, else 0.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        i32::from(self.failed_instances().next().is_some())
    }

    /// Write the report in `format`.
    ///
    /// # Errors
    /// Returns an error if writing fails.
    pub fn write(&self, format: OutputFormat, out: &mut dyn Write) -> std::io::Result<()> {
        match format {
            OutputFormat::Text => self.write_text(out),
            OutputFormat::Json => {
                serde_json::to_writer_pretty(&mut *out, self)?;
                writeln!(out)
            }
        }
    }

    fn write_text(&self, out: &mut dyn Write) -> std::io::Result<()> {
        if self.mode == Mode::Print {
            writeln!(out, "\n{}", ui::success("Commands printed; nothing was executed."))?;
            return Ok(());
        }

        writeln!(out)?;
        for result in &self.results {
            writeln!(out, "{}", Self::line(result))?;
        }

        let instances = self
            .results
            .iter()
            .filter(|r| r.command.kind == CommandKind::InstanceCreate)
            .count();
        let failed = self.failed_instances().count();
        let summary = format!(
            "All VM creation operations complete: {} succeeded, {failed} failed.",
            instances - failed
        );
        writeln!(out)?;
        if failed == 0 {
            writeln!(out, "{}", ui::success(&summary))
        } else {
            writeln!(out, "{}", ui::error(&summary))
        }
    }

    fn line(result: &OperationResult) -> String {
        let target = result.command.target.as_deref().unwrap_or("");
        let detail = result.error_detail.as_deref().unwrap_or("unknown error");
        match (result.command.kind, result.succeeded) {
            (CommandKind::Firewall, true) => {
                ui::success(&format!("Firewall rule {target} created successfully"))
            }
            (CommandKind::Firewall, false) => ui::warning(&format!(
                "Failed to create firewall rule {target} (may already exist): {detail}"
            )),
            (CommandKind::Subnet, true) => {
                ui::success(&format!("Subnet {target} created successfully"))
            }
            (CommandKind::Subnet, false) => ui::warning(&format!(
                "Failed to create subnet {target} (may already exist): {detail}"
            )),
            (CommandKind::InstanceCreate, true) => {
                ui::success(&format!("VM {target} created successfully"))
            }
            (CommandKind::InstanceCreate, false) => {
                ui::error(&format!("Error creating VM {target}: {detail}"))
            }
        }
    }
}

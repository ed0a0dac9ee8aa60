//! Operator parameter collection.
//!
//! Every question has a documented default that a blank answer selects.
//! Values supplied on the command line skip their question but go through
//! the same validation.

use std::cell::RefCell;
use std::io::{self, BufRead, IsTerminal, Write};

use dialoguer::{theme::ColorfulTheme, Input};
use tracing::{debug, info};

use crate::config::{
    default_vm_name, Policy, DEFAULT_DISK_SIZE_GB, DEFAULT_MODE, DEFAULT_VM_COUNT, DEFAULT_ZONE,
};
use crate::error::{FleetError, FleetResult};
use crate::request::{validate_names, Mode, ProvisioningRequest, RequestParams};
use crate::traits::CloudLookup;

/// Source of operator answers.
pub trait Prompter {
    /// Ask `label`, showing `default`. Returns the raw answer; blank means
    /// "take the default".
    ///
    /// # Errors
    /// Returns [`FleetError::Prompt`] if input cannot be read.
    fn ask(&self, label: &str, default: &str) -> FleetResult<String>;
}

/// Terminal prompter backed by `dialoguer`. When stdin is not a terminal
/// (piped or scripted answers) it reads plain lines instead.
#[derive(Default)]
pub struct TerminalPrompter {
    theme: ColorfulTheme,
}

impl Prompter for TerminalPrompter {
    fn ask(&self, label: &str, default: &str) -> FleetResult<String> {
        if !io::stdin().is_terminal() {
            return LinePrompter::new(io::stdin().lock(), io::stderr()).ask(label, default);
        }

        let answer: String = Input::with_theme(&self.theme)
            .with_prompt(label)
            .default(default.to_string())
            .show_default(!default.is_empty())
            .allow_empty(true)
            .interact_text()?;
        Ok(answer)
    }
}

/// Reads one line per question from `input`, writing the question to
/// `output`. End of input counts as a blank answer.
pub struct LinePrompter<R, W> {
    input: RefCell<R>,
    output: RefCell<W>,
}

impl<R: BufRead, W: Write> LinePrompter<R, W> {
    #[must_use]
    pub fn new(input: R, output: W) -> Self {
        Self {
            input: RefCell::new(input),
            output: RefCell::new(output),
        }
    }
}

impl<R: BufRead, W: Write> Prompter for LinePrompter<R, W> {
    fn ask(&self, label: &str, default: &str) -> FleetResult<String> {
        let prompt_failed = |e: io::Error| FleetError::Prompt(e.to_string());

        let mut output = self.output.borrow_mut();
        if default.is_empty() {
            write!(output, "{label}: ").map_err(prompt_failed)?;
        } else {
            write!(output, "{label} (default: {default}): ").map_err(prompt_failed)?;
        }
        output.flush().map_err(prompt_failed)?;

        let mut line = String::new();
        self.input
            .borrow_mut()
            .read_line(&mut line)
            .map_err(prompt_failed)?;
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

/// Answers given up front on the command line.
#[derive(Debug, Clone, Default)]
pub struct Presets {
    pub project: Option<String>,
    pub count: Option<String>,
    pub names: Vec<String>,
    pub disk_size: Option<String>,
    pub zone: Option<String>,
    pub subnet_range: Option<String>,
    /// Run in apply mode without asking.
    pub apply: bool,
    /// Take defaults for everything not preset instead of prompting.
    pub assume_defaults: bool,
}

/// Asks the questions of one run in a fixed order.
pub struct Collector<'a> {
    prompter: &'a dyn Prompter,
    lookup: &'a dyn CloudLookup,
    presets: &'a Presets,
}

impl<'a> Collector<'a> {
    #[must_use]
    pub fn new(
        prompter: &'a dyn Prompter,
        lookup: &'a dyn CloudLookup,
        presets: &'a Presets,
    ) -> Self {
        Self {
            prompter,
            lookup,
            presets,
        }
    }

    /// Collect and validate a full request.
    ///
    /// # Errors
    /// Fails on the first invalid answer, on an unreadable terminal, or when
    /// the active project or service account cannot be resolved. Nothing is
    /// retried.
    pub async fn collect(&self, policy: &Policy) -> FleetResult<ProvisioningRequest> {
        let active_project = match &self.presets.project {
            Some(project) => project.clone(),
            None => self.lookup.resolve_active_project().await?,
        };
        let project_id = self.answer(
            self.presets.project.as_deref(),
            "Enter Project ID",
            &active_project,
        )?;

        let vm_names = validate_names(self.vm_names()?)?;

        let disk_size = self.answer(
            self.presets.disk_size.as_deref(),
            "Enter storage size (GB)",
            DEFAULT_DISK_SIZE_GB,
        )?;
        let storage_size_gb = parse_positive(&disk_size)
            .ok_or_else(|| FleetError::InvalidStorageSize(disk_size.clone()))?;

        let zone = self.answer(self.presets.zone.as_deref(), "Enter zone", DEFAULT_ZONE)?;

        let subnet_range = self.answer(
            self.presets.subnet_range.as_deref(),
            "Enter subnet CIDR range to create (blank to skip)",
            "",
        )?;

        let service_account = self.lookup.resolve_service_account(&project_id).await?;
        debug!(service_account = %service_account, "Resolved service account");

        let mode = if self.presets.apply {
            Mode::Apply
        } else {
            Mode::from_answer(&self.answer(
                None,
                "Type 'apply' to run the commands, or anything else to just print them",
                DEFAULT_MODE,
            )?)
        };

        let request = ProvisioningRequest::new(RequestParams {
            project_id,
            zone,
            storage_size_gb,
            vm_names,
            service_account,
            subnet_range: Some(subnet_range),
            subnet_prefix: policy.subnet_prefix.clone(),
            mode,
        })?;
        info!(
            project = request.project_id(),
            zone = request.zone(),
            vms = request.vm_names().len(),
            mode = %request.mode(),
            "Collected provisioning request"
        );
        Ok(request)
    }

    fn vm_names(&self) -> FleetResult<Vec<String>> {
        let preset_names = &self.presets.names;

        // Names given without a count imply the count.
        let count_default = if preset_names.is_empty() {
            DEFAULT_VM_COUNT.to_string()
        } else {
            preset_names.len().to_string()
        };
        let count_preset = self
            .presets
            .count
            .as_deref()
            .or((!preset_names.is_empty()).then_some(count_default.as_str()));
        let raw_count = self.answer(count_preset, "Enter number of VMs to create", &count_default)?;
        let count: usize =
            parse_positive(&raw_count).ok_or_else(|| FleetError::InvalidCount(raw_count.clone()))?;

        if !preset_names.is_empty() {
            if preset_names.len() != count {
                return Err(FleetError::NameCountMismatch {
                    expected: count,
                    actual: preset_names.len(),
                });
            }
            return Ok(preset_names.clone());
        }

        (1..=count)
            .map(|i| self.answer(None, &format!("Enter name for VM #{i}"), &default_vm_name(i)))
            .collect()
    }

    fn answer(&self, preset: Option<&str>, label: &str, default: &str) -> FleetResult<String> {
        if let Some(value) = preset {
            return Ok(value.trim().to_string());
        }
        if self.presets.assume_defaults {
            return Ok(default.to_string());
        }
        let raw = self.prompter.ask(label, default)?;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            Ok(default.to_string())
        } else {
            Ok(trimmed.to_string())
        }
    }
}

fn parse_positive<T>(raw: &str) -> Option<T>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    raw.trim().parse::<T>().ok().filter(|n| *n > T::default())
}

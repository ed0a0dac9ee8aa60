//! fleet - create a batch of Compute Engine VMs through gcloud.

// CLI binaries legitimately need println! for user output
#![allow(clippy::disallowed_macros)]

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use fleet::{
    build_commands, ui, ChildStdout, Collector, Dispatcher, Gcloud, OutputFormat, Policy, Presets,
    Report, TerminalPrompter,
};

/// Provision a firewall rule, an optional subnet and a batch of VMs with gcloud.
#[derive(Parser)]
#[command(
    name = "fleet",
    version,
    about = "Interactive Compute Engine batch provisioner",
    long_about = "Prompts for project, VM count, names, disk size and zone, then prints\n\
                  or runs the gcloud commands that create a firewall rule, an optional\n\
                  regional subnet and one VM per name.\n\n\
                  Blank answers accept the default shown. VMs are created concurrently."
)]
struct Cli {
    /// Project ID (skips the prompt).
    #[arg(long, env = "FLEET_PROJECT")]
    project: Option<String>,

    /// Number of VMs (skips the prompt).
    #[arg(short = 'n', long)]
    count: Option<String>,

    /// Comma-separated VM names (skips the name prompts).
    #[arg(long, value_delimiter = ',')]
    names: Vec<String>,

    /// Boot disk size in GB (skips the prompt).
    #[arg(long)]
    disk_size: Option<String>,

    /// Zone, e.g. us-west1-b (skips the prompt).
    #[arg(short, long, env = "FLEET_ZONE")]
    zone: Option<String>,

    /// CIDR range of a regional subnet to create (skips the prompt).
    #[arg(long)]
    subnet_range: Option<String>,

    /// Execute the commands instead of printing them.
    #[arg(long)]
    apply: bool,

    /// Accept defaults for every question not answered by a flag.
    #[arg(short = 'y', long)]
    yes: bool,

    /// TOML file overriding the built-in instance policy.
    #[arg(long, env = "FLEET_POLICY", value_name = "FILE")]
    policy: Option<PathBuf>,

    /// Path to the gcloud executable.
    #[arg(long, env = "FLEET_GCLOUD", value_name = "PATH")]
    gcloud: Option<PathBuf>,

    /// Report format.
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // RUST_LOG wins over the verbosity flag.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("info,fleet=debug")
        } else {
            EnvFilter::new("warn,fleet=info")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let policy = match &cli.policy {
        Some(path) => Policy::load(path).context("Failed to load policy")?,
        None => Policy::default(),
    };
    debug!(?policy, "Using policy");

    let presets = Presets {
        project: cli.project,
        count: cli.count,
        names: cli.names,
        disk_size: cli.disk_size,
        zone: cli.zone,
        subnet_range: cli.subnet_range,
        apply: cli.apply,
        assume_defaults: cli.yes,
    };

    // Keep stdout a single JSON document when a machine-readable report is requested.
    let child_stdout = match cli.format {
        OutputFormat::Text => ChildStdout::Inherit,
        OutputFormat::Json => ChildStdout::Stderr,
    };
    let gcloud = Arc::new(Gcloud::locate(cli.gcloud).with_child_stdout(child_stdout));
    let prompter = TerminalPrompter::default();

    let request = match Collector::new(&prompter, gcloud.as_ref(), &presets)
        .collect(&policy)
        .await
    {
        Ok(request) => request,
        Err(e) => {
            ui::print_error(&e.to_string());
            return Ok(ExitCode::FAILURE);
        }
    };

    if cli.format == OutputFormat::Text {
        ui::print_request_summary(&request);
    }

    let commands = build_commands(&request, &policy);
    if cli.format == OutputFormat::Text {
        ui::print_info(&format!("{} commands rendered", commands.len()));
    }

    let mut progress: Box<dyn std::io::Write> = match cli.format {
        OutputFormat::Text => Box::new(std::io::stdout()),
        OutputFormat::Json => Box::new(std::io::stderr()),
    };
    let results = Dispatcher::new(gcloud)
        .dispatch(commands.clone(), request.mode(), progress.as_mut())
        .await
        .context("Failed to dispatch commands")?;

    let report = Report::new(request.mode(), commands, results);
    report
        .write(cli.format, &mut std::io::stdout())
        .context("Failed to write report")?;

    Ok(if report.exit_code() == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

//! Interactive batch provisioning of Compute Engine VMs through `gcloud`.
//!
//! A run collects parameters from the operator, renders a firewall rule, an
//! optional regional subnet and one instance per VM as gcloud argument
//! vectors, and then either prints them or executes them: firewall and
//! subnet first, instances concurrently.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use fleet::{build_commands, Collector, Dispatcher, Gcloud, Policy, Presets, Report};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let gcloud = Arc::new(Gcloud::locate(None));
//!     let presets = Presets { assume_defaults: true, ..Presets::default() };
//!     let prompter = fleet::TerminalPrompter::default();
//!     let policy = Policy::default();
//!
//!     let request = Collector::new(&prompter, gcloud.as_ref(), &presets)
//!         .collect(&policy)
//!         .await?;
//!     let commands = build_commands(&request, &policy);
//!     let results = Dispatcher::new(gcloud)
//!         .dispatch(commands.clone(), request.mode(), &mut std::io::stdout())
//!         .await?;
//!     Report::new(request.mode(), commands, results)
//!         .write(Default::default(), &mut std::io::stdout())?;
//!     Ok(())
//! }
//! ```

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod command;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod gcloud;
pub mod prompt;
pub mod report;
pub mod request;
pub mod traits;
pub mod ui;

pub use command::{build_commands, CommandKind, RenderedCommand};
pub use config::Policy;
pub use dispatch::{Dispatcher, OperationResult};
pub use error::{FleetError, FleetResult, LookupError, RunError};
pub use gcloud::{ChildStdout, Gcloud};
pub use prompt::{Collector, LinePrompter, Presets, Prompter, TerminalPrompter};
pub use report::{OutputFormat, Report};
pub use request::{derive_region, Mode, ProvisioningRequest, RequestParams, SubnetSpec};
pub use traits::{CloudLookup, CommandRunner};

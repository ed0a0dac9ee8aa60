//! Seams to the external cloud CLI.
//!
//! The collector and dispatcher only talk to the outside world through these
//! traits, so tests can substitute scripted fakes for `gcloud`.

use async_trait::async_trait;

use crate::command::RenderedCommand;
use crate::error::{LookupError, RunError};

/// Reads the ambient cloud configuration.
#[async_trait]
pub trait CloudLookup: Send + Sync {
    /// Project the CLI is currently configured for.
    async fn resolve_active_project(&self) -> Result<String, LookupError>;

    /// Service account new instances run as in `project`.
    async fn resolve_service_account(&self, project: &str) -> Result<String, LookupError>;
}

/// Executes one rendered command.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `command` to completion. Output is streamed to the terminal as it
    /// is produced; `Err` carries the captured failure detail.
    async fn run(&self, command: &RenderedCommand) -> Result<(), RunError>;

    /// Program name shown in front of rendered argument vectors.
    fn program(&self) -> &str {
        "gcloud"
    }
}

//! Error types for parameter collection, cloud lookups and command execution.

use thiserror::Error;

/// Errors that abort a run before any command is executed.
#[derive(Debug, Error)]
pub enum FleetError {
    /// VM count was not a positive integer.
    #[error("Invalid number of VMs: '{0}'")]
    InvalidCount(String),

    /// Storage size was not a positive integer.
    #[error("Invalid storage size (GB): '{0}'")]
    InvalidStorageSize(String),

    /// A VM name was empty.
    #[error("VM #{0} has an empty name")]
    EmptyName(usize),

    /// The same VM name was given twice.
    #[error("Duplicate VM name: {0}")]
    DuplicateName(String),

    /// A required value was empty.
    #[error("{0} must not be empty")]
    Empty(&'static str),

    /// Pre-supplied names did not match the VM count.
    #[error("Expected {expected} VM names, got {actual}")]
    NameCountMismatch { expected: usize, actual: usize },

    /// The active project or service account could not be determined.
    #[error(transparent)]
    Lookup(#[from] LookupError),

    /// Reading operator input failed.
    #[error("Prompt failed: {0}")]
    Prompt(String),

    /// Policy file could not be read or parsed.
    #[error("Invalid policy file: {0}")]
    Policy(String),

    /// Writing output failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<dialoguer::Error> for FleetError {
    fn from(err: dialoguer::Error) -> Self {
        Self::Prompt(err.to_string())
    }
}

/// Errors from querying the ambient cloud CLI configuration.
#[derive(Debug, Error)]
pub enum LookupError {
    /// The CLI could not be launched.
    #[error("Failed to execute {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The CLI exited unsuccessfully.
    #[error("{what} lookup failed with exit code {code}: {stderr}")]
    Failed {
        what: &'static str,
        code: i32,
        stderr: String,
    },

    /// No active project is configured.
    #[error("No active project configured (run `gcloud config set project <ID>`)")]
    NoProject,

    /// The project has no service accounts.
    #[error("No service account found in project {0}")]
    NoServiceAccount(String),
}

/// Errors from running a single rendered command.
#[derive(Debug, Error)]
pub enum RunError {
    /// The subprocess could not be started.
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The subprocess ran and exited unsuccessfully.
    #[error("exit code {code}: {stderr}")]
    Exit { code: i32, stderr: String },

    /// Reading the subprocess output or waiting on it failed.
    #[error("I/O error while running command: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for collection and lookup steps.
pub type FleetResult<T> = Result<T, FleetError>;

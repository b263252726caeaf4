//! Unified error type hierarchy for GOATd Installer
//!
//! Provides structured error handling with CollectionError, ConfigError,
//! StepError, FailureCause, ExecutorFault and AppError.

use crate::models::StepId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use thiserror::Error;

/// Operator input errors raised while building an InstallPlan.
///
/// Every variant is raised before any privileged action takes place.
#[derive(Error, Debug)]
pub enum CollectionError {
    #[error("Username cannot be empty")]
    EmptyUsername,

    #[error("Username cannot contain whitespace")]
    UsernameWhitespace,

    #[error("Username is not a valid account name: {0}")]
    InvalidUsername(String),

    #[error("Password cannot be empty")]
    EmptyPassword,

    #[error("Password cannot contain line breaks")]
    InvalidPassword,

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("No block devices found")]
    NoDisks,

    #[error("Disk {0} is not among the enumerated block devices")]
    DiskNotEnumerated(String),

    #[error("Swap size is required when swap is enabled")]
    MissingSwapSize,

    #[error("Swap size is not valid (expected e.g. 2G or 512M): {0}")]
    InvalidSwapSize(String),

    #[error("Encryption passphrase is required when encryption is enabled")]
    MissingEncryptionPassword,

    #[error("Unsupported {field}: {value}")]
    UnknownChoice { field: &'static str, value: String },

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Device probe failed: {0}")]
    Probe(String),

    #[error("Installation aborted by operator")]
    Aborted,

    #[error("Invalid answer file: {0}")]
    AnswerFile(String),

    #[error("IO error during input collection: {0}")]
    IoError(#[from] io::Error),
}

/// Settings file parsing and validation errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Invalid TOML in config: {0}")]
    InvalidToml(#[from] toml::de::Error),

    #[error("Could not serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    #[error("IO error during config operations: {0}")]
    IoError(#[from] io::Error),
}

/// How an external command ended when it did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitState {
    /// Process exited with a non-zero code.
    Code(i32),
    /// Process was terminated by a signal.
    Signal,
    /// Step exceeded its time budget.
    Timeout { secs: u64 },
    /// Process could not be started at all.
    SpawnFailed(String),
}

impl fmt::Display for ExitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitState::Code(code) => write!(f, "exit code {}", code),
            ExitState::Signal => write!(f, "terminated by signal"),
            ExitState::Timeout { secs } => write!(f, "timed out after {}s", secs),
            ExitState::SpawnFailed(reason) => write!(f, "failed to start: {}", reason),
        }
    }
}

/// Failure of one provisioning step's external command.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Step {step} failed running '{command}': {exit}")]
pub struct StepError {
    pub step: StepId,
    /// Argument vector of the failing command (never carries secrets).
    pub command: String,
    pub exit: ExitState,
    /// Captured stderr (or stdout), redacted.
    pub diagnostics: String,
}

/// Contract violations detected by the executor itself.
///
/// These are orchestrator bugs, never operator or environment errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutorFault {
    #[error("Step {step} invoked with unmet precondition: {reason}")]
    Precondition { step: StepId, reason: String },
}

/// Terminal cause recorded in `Outcome::FailedAt`.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureCause {
    #[error("precondition violated: {0}")]
    PreconditionViolation(String),

    #[error("external command '{command}' failed ({exit_status}): {diagnostics}")]
    ExternalCommandFailure {
        command: String,
        exit_status: ExitState,
        diagnostics: String,
    },

    #[error("postcondition violated: {0}")]
    PostconditionViolation(String),
}

impl FailureCause {
    /// Short category label for operator reports.
    pub fn kind(&self) -> &'static str {
        match self {
            FailureCause::PreconditionViolation(_) => "PreconditionViolation",
            FailureCause::ExternalCommandFailure { .. } => "ExternalCommandFailure",
            FailureCause::PostconditionViolation(_) => "PostconditionViolation",
        }
    }
}

impl From<StepError> for FailureCause {
    fn from(e: StepError) -> Self {
        FailureCause::ExternalCommandFailure {
            command: e.command,
            exit_status: e.exit,
            diagnostics: e.diagnostics,
        }
    }
}

impl From<ExecutorFault> for FailureCause {
    fn from(e: ExecutorFault) -> Self {
        FailureCause::PreconditionViolation(e.to_string())
    }
}

/// Global error type for the installer front-end.
///
/// Provides unified error categorization and user-facing messages.
#[derive(Error, Debug, Clone)]
pub enum AppError {
    /// Host is not fit to run the installation
    #[error("Preflight check failed: {0}")]
    Preflight(String),

    /// State checkpoint could not be written or read
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    /// Illegal state machine transition
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// File I/O error (read/write/delete)
    #[error("I/O error: {0}")]
    Io(String),
}

impl AppError {
    /// Get a user-facing error message suitable for console display
    pub fn user_message(&self) -> String {
        match self {
            AppError::Preflight(msg) => format!("The system is not ready for installation: {}", msg),
            AppError::Checkpoint(msg) => format!("Could not persist installation state: {}", msg),
            AppError::InvalidTransition(msg) => format!("Internal orchestration error: {}", msg),
            AppError::Io(msg) => format!("File operation failed: {}", msg),
        }
    }
}

impl From<io::Error> for AppError {
    fn from(e: io::Error) -> Self {
        AppError::Io(e.to_string())
    }
}

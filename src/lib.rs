//! GOATd Installer
//!
//! Unattended Arch Linux provisioning: collect a validated `InstallPlan`,
//! then drive a fixed ten-step sequence of external tools against the
//! target disk, failing fast on the first error.
//!
//! The system is organized into functional modules:
//! - **error**: Unified error type hierarchy
//! - **models**: Plan, step and path types
//! - **hardware**: Block device discovery
//! - **collector**: Operator input and plan validation
//! - **config**: Installer settings and answer files
//! - **system**: External command invocations and the runner seam
//! - **log_collector**: Disk and console logging with secret redaction
//! - **orchestrator**: Step sequence, executor, state machine, checkpoints

// Core foundational modules
pub mod error;
pub mod models;

pub mod hardware;

// System abstraction (command runner, logging macros)
pub mod system;

pub mod config;

pub mod collector;

// Robust, decoupled logging system
pub mod log_collector;

pub mod orchestrator;

// Re-export the log crate for macro usage
pub use log;

pub use log_collector::{LogCollector, LogLine, Redactor};

// ============================================================================
// PUBLIC RE-EXPORTS FOR CONVENIENCE
// ============================================================================

pub use error::{
    AppError, CollectionError, ConfigError, ExecutorFault, ExitState, FailureCause, StepError,
};

pub use models::{
    Bootloader, DerivedPaths, Filesystem, InstallPlan, Locale, PathRole, Secret, StateDelta,
    StepId, SwapSize, Timezone,
};

pub use collector::{collect_plan, ConfigCollector, PlanBuilder, TerminalCollector};
pub use config::InstallerSettings;
pub use hardware::{DeviceProbe, LsblkProbe, StaticProbe};
pub use orchestrator::{InstallState, Orchestrator, Outcome, StepExecutor};
pub use system::{CommandOutput, CommandRunner, Invocation, SystemRunner};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

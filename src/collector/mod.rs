//! Plan collection: turns operator input into a validated InstallPlan.
//!
//! `ConfigCollector` is the single front-end interface; `TerminalCollector`
//! is its interactive implementation. Nothing in this module performs a
//! privileged action, so every failure here has zero side effects.

pub mod builder;
pub mod terminal;

pub use builder::PlanBuilder;
pub use terminal::TerminalCollector;

use crate::error::CollectionError;
use crate::hardware::DeviceProbe;
use crate::models::InstallPlan;

/// Front-end that gathers an InstallPlan from an operator.
pub trait ConfigCollector {
    /// Gather every choice and validate it against the enumerated disks.
    fn collect(&mut self, disks: &[String]) -> Result<InstallPlan, CollectionError>;

    /// Show the rendered plan and ask for explicit confirmation.
    fn confirm(&mut self, plan: &InstallPlan) -> Result<bool, CollectionError>;
}

/// Probe disks, collect a plan and require confirmation.
///
/// Returns the plan only once the operator has confirmed it.
pub fn collect_plan(
    collector: &mut dyn ConfigCollector,
    probe: &dyn DeviceProbe,
) -> Result<InstallPlan, CollectionError> {
    let disks = probe.list_disks()?;
    if disks.is_empty() {
        return Err(CollectionError::NoDisks);
    }
    log::info!("Found {} candidate disk(s): {}", disks.len(), disks.join(", "));

    let plan = collector.collect(&disks)?;

    if !collector.confirm(&plan)? {
        log::info!("Operator declined the installation summary");
        return Err(CollectionError::Aborted);
    }

    Ok(plan)
}

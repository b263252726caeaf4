//! Installation state tracking and the orchestrator's state machine.
//!
//! - `MachineState`: `Pending(i)` / `Running(i)` / `Succeeded` / `Failed(i)`
//!   with an explicit transition table.
//! - `InstallState`: progress record and derived paths, owned by the
//!   orchestrator and persisted to the checkpoint after every transition.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{AppError, FailureCause};
use crate::models::{DerivedPaths, PathRole, StateDelta, StepId};

/// Orchestrator state machine position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MachineState {
    /// About to evaluate the step at this index of the fixed sequence
    Pending(usize),
    /// Step at this index is being executed
    Running(usize),
    Succeeded,
    Failed(usize),
}

impl MachineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            MachineState::Pending(_) => "pending",
            MachineState::Running(_) => "running",
            MachineState::Succeeded => "succeeded",
            MachineState::Failed(_) => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, MachineState::Succeeded | MachineState::Failed(_))
    }

    /// Check if a transition to the given state is valid for a sequence of `len` steps.
    pub fn can_transition_to(&self, next: MachineState, len: usize) -> bool {
        match (*self, next) {
            // run the step, or skip it
            (MachineState::Pending(i), MachineState::Running(j)) => i == j && i < len,
            (MachineState::Pending(i), MachineState::Pending(j)) => j == i + 1 && i < len,
            (MachineState::Pending(i), MachineState::Succeeded) => i == len,
            // precondition violation happens before Running
            (MachineState::Pending(i), MachineState::Failed(j)) => i == j && i < len,
            (MachineState::Running(i), MachineState::Pending(j)) => j == i + 1,
            (MachineState::Running(i), MachineState::Failed(j)) => i == j,
            _ => false,
        }
    }
}

impl fmt::Display for MachineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MachineState::Pending(i) => write!(f, "Pending({})", i),
            MachineState::Running(i) => write!(f, "Running({})", i),
            MachineState::Succeeded => write!(f, "Succeeded"),
            MachineState::Failed(i) => write!(f, "Failed({})", i),
        }
    }
}

/// Final or current outcome of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    InProgress,
    Succeeded,
    FailedAt { step: StepId, cause: FailureCause },
}

impl Outcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Outcome::InProgress)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::InProgress => write!(f, "in progress"),
            Outcome::Succeeded => write!(f, "succeeded"),
            Outcome::FailedAt { step, cause } => {
                write!(f, "failed at step {}: {} ({})", step, cause.kind(), cause)
            }
        }
    }
}

/// Progress record of one installation run.
///
/// Created empty, mutated step by step, terminal exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallState {
    pub run_id: String,
    pub completed_steps: Vec<StepId>,
    pub skipped_steps: Vec<StepId>,
    pub current_step: Option<StepId>,
    pub derived_paths: DerivedPaths,
    pub outcome: Outcome,
    pub machine: MachineState,
    pub started_at: DateTime<Local>,
    pub updated_at: DateTime<Local>,
}

impl Default for InstallState {
    fn default() -> Self {
        InstallState::new()
    }
}

impl InstallState {
    pub fn new() -> Self {
        let now = Local::now();
        InstallState {
            run_id: now.format("%Y%m%d_%H%M%S").to_string(),
            completed_steps: Vec::new(),
            skipped_steps: Vec::new(),
            current_step: None,
            derived_paths: DerivedPaths::new(),
            outcome: Outcome::InProgress,
            machine: MachineState::Pending(0),
            started_at: now,
            updated_at: now,
        }
    }

    pub fn path(&self, role: PathRole) -> Option<&str> {
        self.derived_paths.get(&role).map(String::as_str)
    }

    pub fn has_path(&self, role: PathRole) -> bool {
        self.derived_paths.contains_key(&role)
    }

    pub fn is_terminal(&self) -> bool {
        self.outcome.is_terminal()
    }

    /// Steps that actually ran to completion, in order.
    pub fn executed_numbers(&self) -> Vec<u8> {
        self.completed_steps.iter().map(StepId::number).collect()
    }

    /// Move the state machine, rejecting illegal transitions.
    pub fn transition_to(&mut self, next: MachineState, len: usize) -> Result<(), AppError> {
        if !self.machine.can_transition_to(next, len) {
            return Err(AppError::InvalidTransition(format!(
                "{} -> {}",
                self.machine, next
            )));
        }
        self.machine = next;
        self.updated_at = Local::now();
        Ok(())
    }

    pub fn apply_delta(&mut self, delta: &StateDelta) {
        for (role, path) in &delta.paths {
            self.derived_paths.insert(*role, path.clone());
        }
        self.updated_at = Local::now();
    }

    pub fn begin_step(&mut self, step: StepId) {
        self.current_step = Some(step);
        self.updated_at = Local::now();
    }

    pub fn complete_step(&mut self, step: StepId) {
        self.completed_steps.push(step);
        self.current_step = None;
        self.updated_at = Local::now();
    }

    pub fn skip_step(&mut self, step: StepId) {
        self.skipped_steps.push(step);
        self.updated_at = Local::now();
    }

    /// Record the terminal outcome. A second terminal transition is rejected.
    pub fn finish(&mut self, outcome: Outcome) -> Result<(), AppError> {
        if self.outcome.is_terminal() {
            return Err(AppError::InvalidTransition(format!(
                "run already terminal ({})",
                self.outcome
            )));
        }
        if !outcome.is_terminal() {
            return Err(AppError::InvalidTransition(
                "cannot finish a run as in progress".to_string(),
            ));
        }
        self.outcome = outcome;
        self.updated_at = Local::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_machine_transitions() {
        assert!(MachineState::Pending(0).can_transition_to(MachineState::Running(0), 10));
        assert!(MachineState::Pending(1).can_transition_to(MachineState::Pending(2), 10));
        assert!(MachineState::Running(2).can_transition_to(MachineState::Pending(3), 10));
        assert!(MachineState::Running(2).can_transition_to(MachineState::Failed(2), 10));
        assert!(MachineState::Pending(10).can_transition_to(MachineState::Succeeded, 10));

        assert!(!MachineState::Pending(0).can_transition_to(MachineState::Running(1), 10));
        assert!(!MachineState::Pending(3).can_transition_to(MachineState::Succeeded, 10));
        assert!(!MachineState::Running(2).can_transition_to(MachineState::Failed(3), 10));
        assert!(!MachineState::Succeeded.can_transition_to(MachineState::Pending(0), 10));
        assert!(!MachineState::Failed(4).can_transition_to(MachineState::Running(4), 10));
    }

    #[test]
    fn test_invalid_transition_is_rejected() {
        let mut state = InstallState::new();
        assert!(state.transition_to(MachineState::Running(3), 10).is_err());
        assert_eq!(state.machine, MachineState::Pending(0));
    }

    #[test]
    fn test_terminal_exactly_once() {
        let mut state = InstallState::new();
        state.finish(Outcome::Succeeded).unwrap();
        let second = state.finish(Outcome::FailedAt {
            step: StepId::Format,
            cause: FailureCause::PostconditionViolation("late".to_string()),
        });
        assert!(second.is_err());
        assert_eq!(state.outcome, Outcome::Succeeded);
    }

    #[test]
    fn test_finish_rejects_in_progress() {
        let mut state = InstallState::new();
        assert!(state.finish(Outcome::InProgress).is_err());
    }

    #[test]
    fn test_apply_delta_overwrites_role() {
        let mut state = InstallState::new();
        state.apply_delta(&StateDelta::none().with_path(PathRole::MappedRoot, "/dev/sda1"));
        state.apply_delta(&StateDelta::none().with_path(PathRole::MappedRoot, "/dev/mapper/x"));
        assert_eq!(state.path(PathRole::MappedRoot), Some("/dev/mapper/x"));
    }

    #[test]
    fn test_state_serializes_roles_as_kebab_case() {
        let mut state = InstallState::new();
        state.apply_delta(&StateDelta::none().with_path(PathRole::RootPartition, "/dev/sda1"));
        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("\"root-partition\":\"/dev/sda1\""));
        let back: InstallState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}

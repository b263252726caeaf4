//! Installation orchestration: the fixed ten-step provisioning pipeline
//! (Partition -> Encrypt -> Format -> Swap -> Bootstrap -> Fstab ->
//! EnterTarget -> Localize -> CreateUser -> Bootloader).
//!
//! The orchestrator owns the `InstallState`, checks each step's pre- and
//! postconditions, applies deltas, reports every transition and stops at
//! the first failure. There is no retry and no rollback.

pub mod checkpoint;
pub mod executor;
pub mod phases;
pub mod state;
pub mod steps;

use std::path::PathBuf;
use std::sync::Arc;

pub use checkpoint::{load_checkpoint, save_checkpoint};
pub use executor::{ExecutionError, StepExecutor};
pub use state::{InstallState, MachineState, Outcome};
pub use steps::{partition_path, standard_sequence, Step, StepContext};

use crate::config::InstallerSettings;
use crate::error::{AppError, FailureCause};
use crate::log_collector::Redactor;
use crate::log_parsed;
use crate::models::{InstallPlan, StepId};
use crate::system::CommandRunner;

/// Drives one installation run from `Pending(0)` to a terminal state.
pub struct Orchestrator {
    steps: Vec<Step>,
    executor: StepExecutor,
    settings: InstallerSettings,
    state: InstallState,
    /// Where the state is persisted after every transition
    checkpoint_path: Option<PathBuf>,
}

impl Orchestrator {
    /// Create an orchestrator for the standard sequence.
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        settings: InstallerSettings,
        redactor: Redactor,
    ) -> Self {
        let executor = StepExecutor::new(runner, redactor).with_timeout(settings.step_timeout());
        Orchestrator {
            steps: standard_sequence(),
            executor,
            settings,
            state: InstallState::new(),
            checkpoint_path: None,
        }
    }

    /// Replace the step sequence.
    pub fn with_sequence(mut self, steps: Vec<Step>) -> Self {
        self.steps = steps;
        self
    }

    pub fn with_checkpoint(mut self, path: Option<PathBuf>) -> Self {
        self.checkpoint_path = path;
        self
    }

    pub fn state(&self) -> &InstallState {
        &self.state
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Run every step against `plan` and return the terminal state.
    ///
    /// Step failures are recorded in `Outcome::FailedAt`; `Err` is returned
    /// only for illegal state machine transitions.
    pub async fn run(mut self, plan: &InstallPlan) -> Result<InstallState, AppError> {
        let len = self.steps.len();

        log_parsed!(
            "Installation started (run {}): {} steps on {}",
            self.state.run_id,
            len,
            plan.target_disk()
        );
        for line in plan.summary().lines() {
            log::info!("[Plan] {}", line.trim());
        }
        self.checkpoint();

        for index in 0..len {
            let step = self.steps[index].clone();

            if !step.applies(plan) {
                let delta = {
                    let ctx = self.context(plan);
                    step.skip_delta(&ctx)
                };
                self.state.apply_delta(&delta);
                self.state.skip_step(step.id);
                self.state.transition_to(MachineState::Pending(index + 1), len)?;
                log_parsed!("Step {} skipped: not applicable to plan ({})", step.id, delta);
                self.checkpoint();
                continue;
            }

            let precondition = {
                let ctx = self.context(plan);
                step.precondition(&ctx)
            };
            if let Err(reason) = precondition {
                return self.fail(index, step.id, FailureCause::PreconditionViolation(reason));
            }

            self.state.transition_to(MachineState::Running(index), len)?;
            self.state.begin_step(step.id);
            log_parsed!("Step {} running: {}", step.id, step.description);
            self.checkpoint();

            let result = self
                .executor
                .execute(&step, plan, &self.state, &self.settings)
                .await;

            match result {
                Ok(delta) => {
                    self.state.apply_delta(&delta);
                    let postcondition = {
                        let ctx = self.context(plan);
                        step.postcondition(&ctx)
                    };
                    if let Err(reason) = postcondition {
                        return self.fail(
                            index,
                            step.id,
                            FailureCause::PostconditionViolation(reason),
                        );
                    }
                    self.state.complete_step(step.id);
                    self.state.transition_to(MachineState::Pending(index + 1), len)?;
                    log_parsed!("Step {} succeeded: {}", step.id, delta);
                    self.checkpoint();
                }
                Err(e) => return self.fail(index, step.id, e.into()),
            }
        }

        self.state.transition_to(MachineState::Succeeded, len)?;
        self.state.finish(Outcome::Succeeded)?;
        log_parsed!(
            "Installation succeeded: executed steps {:?}, skipped {:?}",
            self.state.executed_numbers(),
            self.state
                .skipped_steps
                .iter()
                .map(StepId::number)
                .collect::<Vec<_>>()
        );
        self.checkpoint();
        Ok(self.state)
    }

    fn context<'a>(&'a self, plan: &'a InstallPlan) -> StepContext<'a> {
        StepContext {
            plan,
            state: &self.state,
            settings: &self.settings,
        }
    }

    fn fail(
        mut self,
        index: usize,
        step: StepId,
        cause: FailureCause,
    ) -> Result<InstallState, AppError> {
        self.state.transition_to(MachineState::Failed(index), self.steps.len())?;
        self.state.current_step = Some(step);
        log::error!("[Orchestrator] {}", cause);
        log_parsed!("Step {} failed: {}", step, cause.kind());
        self.state.finish(Outcome::FailedAt { step, cause })?;
        log_parsed!("Installation failed; manual recovery required");
        self.checkpoint();
        Ok(self.state)
    }

    /// Persist the state; a failed write is reported but does not stop the run.
    fn checkpoint(&self) {
        if let Some(ref path) = self.checkpoint_path {
            if let Err(e) = save_checkpoint(&self.state, path) {
                log::warn!("[Orchestrator] {}", e);
            }
        }
    }
}

//! Step execution: precondition re-check, invocation spawning, failure capture.
//!
//! The executor never touches `InstallState`; it reads it and hands back the
//! step's `StateDelta`. Failures come back as typed errors for the
//! orchestrator to record.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

use crate::config::InstallerSettings;
use crate::error::{ExecutorFault, ExitState, FailureCause, StepError};
use crate::log_collector::Redactor;
use crate::models::{InstallPlan, StateDelta};
use crate::orchestrator::state::InstallState;
use crate::orchestrator::steps::{Step, StepContext};
use crate::system::{CommandOutput, CommandRunner, Invocation};

/// Upper bound on captured diagnostics kept in a failure record.
const MAX_DIAGNOSTICS: usize = 4096;

/// Why `StepExecutor::execute` did not return a delta.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error(transparent)]
    Fault(#[from] ExecutorFault),

    #[error(transparent)]
    Step(#[from] StepError),
}

impl From<ExecutionError> for FailureCause {
    fn from(e: ExecutionError) -> Self {
        match e {
            ExecutionError::Fault(fault) => fault.into(),
            ExecutionError::Step(err) => err.into(),
        }
    }
}

/// Runs one step's invocations in order, stopping at the first failure.
#[derive(Clone)]
pub struct StepExecutor {
    runner: Arc<dyn CommandRunner>,
    timeout: Option<Duration>,
    redactor: Redactor,
}

impl StepExecutor {
    pub fn new(runner: Arc<dyn CommandRunner>, redactor: Redactor) -> Self {
        StepExecutor {
            runner,
            timeout: None,
            redactor,
        }
    }

    /// Time budget for each whole step.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn execute(
        &self,
        step: &Step,
        plan: &InstallPlan,
        state: &InstallState,
        settings: &InstallerSettings,
    ) -> Result<StateDelta, ExecutionError> {
        let ctx = StepContext {
            plan,
            state,
            settings,
        };

        step.precondition(&ctx).map_err(|reason| ExecutorFault::Precondition {
            step: step.id,
            reason,
        })?;

        let invocations = step
            .invocations(&ctx)
            .map_err(|reason| ExecutorFault::Precondition {
                step: step.id,
                reason,
            })?;

        let deadline = self.timeout.map(|t| Instant::now() + t);

        for invocation in &invocations {
            // argv never carries secrets; they travel on stdin
            let command = invocation.command_line();
            log::info!("[Executor] step {}: {}", step.id, command);

            let result = match deadline {
                Some(deadline) => {
                    match tokio::time::timeout_at(deadline, self.runner.run(invocation)).await {
                        Ok(result) => result,
                        Err(_) => {
                            let secs = self.timeout.map_or(0, |t| t.as_secs());
                            log::error!(
                                "[Executor] step {} exceeded its {}s budget",
                                step.id,
                                secs
                            );
                            return Err(StepError {
                                step: step.id,
                                command,
                                exit: ExitState::Timeout { secs },
                                diagnostics: String::new(),
                            }
                            .into());
                        }
                    }
                }
                None => self.runner.run(invocation).await,
            };

            let output = match result {
                Ok(output) => output,
                Err(e) => {
                    return Err(StepError {
                        step: step.id,
                        command,
                        exit: ExitState::SpawnFailed(self.redactor.redact(&e.to_string())),
                        diagnostics: String::new(),
                    }
                    .into());
                }
            };

            if !output.success() {
                return Err(self.failure(step, invocation, &output).into());
            }
        }

        Ok(step.delta(&ctx))
    }

    fn failure(&self, step: &Step, invocation: &Invocation, output: &CommandOutput) -> StepError {
        let exit = match output.code {
            Some(code) => ExitState::Code(code),
            None => ExitState::Signal,
        };
        let raw = if output.stderr.trim().is_empty() {
            output.stdout.trim()
        } else {
            output.stderr.trim()
        };
        StepError {
            step: step.id,
            command: invocation.command_line(),
            exit,
            diagnostics: tail(&self.redactor.redact(raw), MAX_DIAGNOSTICS),
        }
    }
}

/// Last `max` bytes of `text`, cut on a char boundary.
fn tail(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut start = text.len() - max;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    text[start..].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tail_keeps_short_text() {
        assert_eq!(tail("abc", 10), "abc");
    }

    #[test]
    fn test_tail_respects_char_boundary() {
        let text = "ééé";
        let cut = tail(text, 3);
        assert_eq!(cut, "é");
    }

    #[test]
    fn test_execution_error_maps_to_cause() {
        let fault = ExecutionError::Fault(ExecutorFault::Precondition {
            step: crate::models::StepId::Format,
            reason: "mapped-root has not been resolved".to_string(),
        });
        assert_eq!(FailureCause::from(fault).kind(), "PreconditionViolation");
    }
}

//! Fixed, ordered bootstrap sequence.

use std::time::{Duration, Instant};

use crate::error::{BootstrapError, StepError};
use crate::services::status::{StatusRecorder, StepStatus};
use crate::services::step::{Step, StepContext, StepExecutor, StepOutcome, StepResult};

/// Results of one pipeline run, in execution order.
#[derive(Debug, Default)]
pub struct PipelineReport {
    pub results: Vec<StepResult>,
    /// Set when the run stopped early on request; names the step not started.
    pub interrupted_before: Option<Step>,
    pub elapsed: Duration,
}

impl PipelineReport {
    /// True iff no step failed and the run was not cut short.
    pub fn is_success(&self) -> bool {
        self.interrupted_before.is_none()
            && self.results.len() == Step::ALL.len()
            && self.results.iter().all(|r| r.outcome.is_success())
    }

    pub fn failure(&self) -> Option<(Step, &StepError)> {
        self.results.iter().find_map(|r| match &r.outcome {
            StepOutcome::Failed(e) => Some((r.step, e)),
            _ => None,
        })
    }

    /// Steps whose action ran in this invocation.
    pub fn applied(&self) -> Vec<Step> {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, StepOutcome::Applied))
            .map(|r| r.step)
            .collect()
    }

    /// Translate a failed or interrupted run into the error the process reports.
    pub fn error(&self) -> Option<BootstrapError> {
        if let Some((step, error)) = self.failure() {
            return Some(BootstrapError::from_step_failure(step.name(), error));
        }
        self.interrupted_before
            .map(|step| BootstrapError::Interrupted { step: step.name() })
    }
}

pub struct BootstrapPipeline {
    steps: Vec<Step>,
}

impl BootstrapPipeline {
    /// The quickstart sequence: admin user, ODB tables, cluster, servers.
    pub fn quickstart() -> Self {
        Self {
            steps: Step::ALL.to_vec(),
        }
    }

    /// Run every step in order, stopping at the first failure.
    pub async fn run(&self, ctx: &StepContext<'_>) -> PipelineReport {
        let started = Instant::now();
        let total = self.steps.len();
        let mut report = PipelineReport::default();

        // The first database touch is the connection itself; a database that
        // never comes up is reported against the first step.
        let status = match ctx.runner.connection().await {
            Ok(conn) => StatusRecorder::new(conn),
            Err(e) => {
                if let Some(&first) = self.steps.first() {
                    tracing::error!("[1/{}] {} failed: {}", total, first.display_name(), e);
                    report.results.push(StepResult {
                        step: first,
                        message: format!("{} failed: {}", first.display_name(), e),
                        outcome: StepOutcome::Failed(e.into()),
                        elapsed: started.elapsed(),
                    });
                }
                report.elapsed = started.elapsed();
                return report;
            }
        };

        if let Err(e) = status.initialize().await {
            tracing::warn!("Failed to initialize quickstart status: {}", e);
        }

        let executor = StepExecutor::new(ctx);
        for &step in &self.steps {
            if ctx.is_interrupted() {
                tracing::warn!(
                    "Interrupted, not starting step {} ({})",
                    step.position(),
                    step.name()
                );
                report.interrupted_before = Some(step);
                break;
            }

            tracing::info!("[{}/{}] {}...", step.position(), total, step.display_name());
            status
                .record(step, StepStatus::Running, "Running", None)
                .await;

            let result = executor.execute(step).await;
            match &result.outcome {
                StepOutcome::AlreadySatisfied => {
                    tracing::info!("[{}/{}] {}", step.position(), total, result.message);
                    status
                        .record(step, StepStatus::Satisfied, &result.message, None)
                        .await;
                }
                StepOutcome::Applied => {
                    tracing::info!(
                        "[{}/{}] {} ({:?})",
                        step.position(),
                        total,
                        result.message,
                        result.elapsed
                    );
                    status
                        .record(step, StepStatus::Applied, &result.message, None)
                        .await;
                }
                StepOutcome::Failed(e) => {
                    tracing::error!("[{}/{}] {}", step.position(), total, result.message);
                    status
                        .record(step, StepStatus::Failed, "Failed", Some(&e.to_string()))
                        .await;
                }
            }

            let failed = !result.outcome.is_success();
            report.results.push(result);
            if failed {
                break;
            }
        }

        report.elapsed = started.elapsed();
        report
    }
}

//! Decides whether provisioning runs at all, and records that it finished.

use chrono::Utc;

use crate::error::BootstrapError;
use crate::services::marker::{MarkerRecord, MarkerStore};
use crate::services::pipeline::{BootstrapPipeline, PipelineReport};
use crate::services::step::StepContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    NotStarted,
    Running,
    Completed,
    Failed,
}

#[derive(Debug)]
pub enum GateOutcome {
    /// The control flag is off.
    Disabled,
    /// The marker was already set; nothing else was touched.
    AlreadyProvisioned,
    Provisioned(PipelineReport),
}

impl GateOutcome {
    /// Outcome of a disabled instance; logs the skip.
    pub fn disabled() -> Self {
        tracing::info!("Quickstart provisioning disabled, skipping");
        GateOutcome::Disabled
    }
}

pub struct RunGate<M> {
    enabled: bool,
    marker: M,
    state: GateState,
}

impl<M: MarkerStore> RunGate<M> {
    pub fn new(enabled: bool, marker: M) -> Self {
        Self {
            enabled,
            marker,
            state: GateState::NotStarted,
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn marker(&self) -> &M {
        &self.marker
    }

    /// Run the pipeline unless disabled or already provisioned. The marker
    /// is set only after every step succeeded.
    pub async fn run(
        &mut self,
        pipeline: &BootstrapPipeline,
        ctx: &StepContext<'_>,
    ) -> Result<GateOutcome, BootstrapError> {
        if !self.enabled {
            return Ok(GateOutcome::disabled());
        }

        let provisioned = self
            .marker
            .is_set()
            .await
            .map_err(|source| self.marker_error(source))?;
        if provisioned {
            tracing::info!(
                "Quickstart already provisioned (marker {}), skipping",
                self.marker.location()
            );
            self.state = GateState::Completed;
            return Ok(GateOutcome::AlreadyProvisioned);
        }

        tracing::info!("Starting quickstart provisioning of cluster '{}'", ctx.config.cluster.name);
        self.state = GateState::Running;
        let report = pipeline.run(ctx).await;

        if let Some(error) = report.error() {
            self.state = GateState::Failed;
            tracing::error!("Quickstart provisioning failed: {}", error);
            return Err(error);
        }

        let record = MarkerRecord {
            cluster: ctx.config.cluster.name.clone(),
            servers: ctx.config.cluster.servers.clone(),
            completed_at: Utc::now(),
            version: ctx.config.version.clone(),
        };
        if let Err(source) = self.marker.set(&record).await {
            self.state = GateState::Failed;
            let error = self.marker_error(source);
            tracing::error!("{}", error);
            return Err(error);
        }

        self.state = GateState::Completed;
        tracing::info!(
            "Quickstart provisioning complete in {:?}, marker written to {}",
            report.elapsed,
            self.marker.location()
        );
        Ok(GateOutcome::Provisioned(report))
    }

    fn marker_error(&self, source: std::io::Error) -> BootstrapError {
        BootstrapError::Marker {
            location: self.marker.location(),
            source,
        }
    }
}

//! Per-step bookkeeping in the `quickstart_status` table.
//!
//! Operators read these rows to see how far a boot got. Nothing in the
//! pipeline consults them: whether a step runs is decided by inspecting
//! the ODB objects themselves.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::Serialize;

use crate::models::prelude::*;
use crate::models::quickstart_status;
use crate::services::step::Step;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Pending,
    Running,
    Applied,
    Satisfied,
    Failed,
}

impl StepStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Applied => "applied",
            StepStatus::Satisfied => "satisfied",
            StepStatus::Failed => "failed",
        }
    }

    fn is_final(self) -> bool {
        matches!(
            self,
            StepStatus::Applied | StepStatus::Satisfied | StepStatus::Failed
        )
    }
}

/// Status snapshot of one step
#[derive(Debug, Clone, Serialize)]
pub struct StepStatusView {
    pub step: String,
    pub position: i32,
    pub status: String,
    pub message: Option<String>,
    pub error: Option<String>,
}

pub struct StatusRecorder<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> StatusRecorder<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create a pending row for every step that has none yet
    pub async fn initialize(&self) -> Result<(), DbErr> {
        for step in Step::ALL {
            let existing = QuickstartStatus::find()
                .filter(quickstart_status::Column::Step.eq(step.name()))
                .one(self.db)
                .await?;

            if existing.is_none() {
                let status = quickstart_status::ActiveModel {
                    step: Set(step.name().to_string()),
                    position: Set(step.position() as i32),
                    status: Set(StepStatus::Pending.as_str().to_string()),
                    message: Set(Some("Waiting to run".to_string())),
                    ..Default::default()
                };
                status.insert(self.db).await?;
            }
        }
        Ok(())
    }

    pub async fn update(
        &self,
        step: Step,
        status: StepStatus,
        message: Option<&str>,
        error: Option<&str>,
    ) -> Result<(), DbErr> {
        let existing = QuickstartStatus::find()
            .filter(quickstart_status::Column::Step.eq(step.name()))
            .one(self.db)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound(format!("status of step {}", step.name())))?;

        let mut active: quickstart_status::ActiveModel = existing.into();
        active.status = Set(status.as_str().to_string());
        active.message = Set(message.map(str::to_string));
        active.error = Set(error.map(str::to_string));

        if status == StepStatus::Running {
            active.started_at = Set(Some(Utc::now()));
            active.completed_at = Set(None);
        }
        if status.is_final() {
            active.completed_at = Set(Some(Utc::now()));
        }

        active.update(self.db).await?;
        Ok(())
    }

    /// Best-effort variant used by the pipeline: failures are logged only.
    pub async fn record(&self, step: Step, status: StepStatus, message: &str, error: Option<&str>) {
        if let Err(e) = self.update(step, status, Some(message), error).await {
            tracing::warn!(
                "Failed to record status '{}' for step {}: {}",
                status.as_str(),
                step.name(),
                e
            );
        }
    }

    pub async fn get_status(&self) -> Result<Vec<StepStatusView>, DbErr> {
        let rows = QuickstartStatus::find()
            .order_by_asc(quickstart_status::Column::Position)
            .all(self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| StepStatusView {
                step: row.step,
                position: row.position,
                status: row.status,
                message: row.message,
                error: row.error,
            })
            .collect())
    }
}

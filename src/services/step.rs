//! The four bootstrap steps and how each one is checked and applied.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QuerySelect};

use crate::config::database::OdbTarget;
use crate::config::Config;
use crate::error::{ServiceError, SqlError, StepError};
use crate::models::prelude::*;
use crate::models::{admin_principal, cluster, server};
use crate::services::retry::{retry_transient, RetryError, RetryPolicy};
use crate::services::scripts::{ScriptId, ScriptParams};
use crate::services::security::{generate_server_token, hash_password};
use crate::services::service_admin::ServiceAdmin;
use crate::services::sql_runner::SqlActionRunner;

/// Address every quickstart server binds to.
pub const SERVER_BIND_HOST: &str = "0.0.0.0";
const CLUSTER_DESCRIPTION: &str = "Created by zato-quickstart";

/// Bootstrap steps, in the only order they may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    AdminPrincipal,
    OdbTables,
    OdbCluster,
    ServerCluster,
}

impl Step {
    pub const ALL: [Step; 4] = [
        Step::AdminPrincipal,
        Step::OdbTables,
        Step::OdbCluster,
        Step::ServerCluster,
    ];

    pub fn name(self) -> &'static str {
        self.script().name()
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Step::AdminPrincipal => "Admin user",
            Step::OdbTables => "ODB schema",
            Step::OdbCluster => "ODB cluster",
            Step::ServerCluster => "Server cluster membership",
        }
    }

    /// 1-based position in the pipeline.
    pub fn position(self) -> usize {
        match self {
            Step::AdminPrincipal => 1,
            Step::OdbTables => 2,
            Step::OdbCluster => 3,
            Step::ServerCluster => 4,
        }
    }

    pub fn script(self) -> ScriptId {
        match self {
            Step::AdminPrincipal => ScriptId::AdminUser,
            Step::OdbTables => ScriptId::OdbTables,
            Step::OdbCluster => ScriptId::OdbCluster,
            Step::ServerCluster => ScriptId::ServerCluster,
        }
    }

    /// The step whose result must already hold before this one may act.
    pub fn depends_on(self) -> Option<Step> {
        match self {
            Step::AdminPrincipal => None,
            Step::OdbTables => Some(Step::AdminPrincipal),
            Step::OdbCluster => Some(Step::OdbTables),
            Step::ServerCluster => Some(Step::OdbCluster),
        }
    }

    fn describe(self, config: &Config, applied: bool) -> String {
        let verb = if applied { "created" } else { "already exists" };
        match self {
            Step::AdminPrincipal => format!("Admin user '{}' {}", config.admin.username, verb),
            Step::OdbTables => format!("ODB schema {}", verb),
            Step::OdbCluster => format!("Cluster '{}' {}", config.cluster.name, verb),
            Step::ServerCluster if applied => format!(
                "Servers registered in cluster '{}': {}",
                config.cluster.name,
                config.cluster.servers.join(", ")
            ),
            Step::ServerCluster => format!(
                "Servers already registered in cluster '{}'",
                config.cluster.name
            ),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Everything a step needs to run. Borrowed for the duration of one run.
pub struct StepContext<'a> {
    pub config: &'a Config,
    pub runner: &'a SqlActionRunner,
    service: Option<&'a dyn ServiceAdmin>,
    service_retry: RetryPolicy,
    interrupted: Arc<AtomicBool>,
}

impl<'a> StepContext<'a> {
    pub fn new(config: &'a Config, runner: &'a SqlActionRunner) -> Self {
        let max_wait = config
            .service
            .as_ref()
            .map(|s| s.max_wait)
            .unwrap_or(Duration::from_secs(30));

        Self {
            config,
            runner,
            service: None,
            service_retry: RetryPolicy::service_default(max_wait),
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Confirm server registrations through the live service as well.
    pub fn with_service(mut self, service: &'a dyn ServiceAdmin) -> Self {
        self.service = Some(service);
        self
    }

    pub fn with_service_retry(mut self, policy: RetryPolicy) -> Self {
        self.service_retry = policy;
        self
    }

    /// Share a flag that, once set, stops the pipeline before its next step.
    pub fn with_interrupt_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupted = flag;
        self
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub enum StepOutcome {
    /// The precondition held; nothing was executed.
    AlreadySatisfied,
    /// The action ran and its postcondition holds.
    Applied,
    Failed(StepError),
}

impl StepOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, StepOutcome::Failed(_))
    }
}

#[derive(Debug)]
pub struct StepResult {
    pub step: Step,
    pub outcome: StepOutcome,
    pub message: String,
    pub elapsed: Duration,
}

/// Runs a single step: precondition, dependency guard, action, postcondition.
pub struct StepExecutor<'c, 'a> {
    ctx: &'c StepContext<'a>,
}

impl<'c, 'a> StepExecutor<'c, 'a> {
    pub fn new(ctx: &'c StepContext<'a>) -> Self {
        Self { ctx }
    }

    pub async fn execute(&self, step: Step) -> StepResult {
        let started = Instant::now();
        let outcome = match self.apply(step).await {
            Ok(outcome) => outcome,
            Err(e) => StepOutcome::Failed(e),
        };

        let message = match &outcome {
            StepOutcome::AlreadySatisfied => step.describe(self.ctx.config, false),
            StepOutcome::Applied => step.describe(self.ctx.config, true),
            StepOutcome::Failed(e) => format!("{} failed: {}", step.display_name(), e),
        };

        StepResult {
            step,
            outcome,
            message,
            elapsed: started.elapsed(),
        }
    }

    async fn apply(&self, step: Step) -> Result<StepOutcome, StepError> {
        if self.is_satisfied(step).await? {
            return Ok(StepOutcome::AlreadySatisfied);
        }

        if let Some(required) = step.depends_on() {
            if !self.is_satisfied(required).await? {
                return Err(StepError::UnmetDependency {
                    required: required.name(),
                });
            }
        }

        self.run_action(step).await?;

        if !self.is_satisfied(step).await? {
            return Err(StepError::Postcondition(format!(
                "script {} completed but {} is still missing",
                step.script().name(),
                step.display_name().to_lowercase()
            )));
        }

        if step == Step::ServerCluster {
            if let Some(service) = self.ctx.service {
                for name in &self.ctx.config.cluster.servers {
                    self.confirm_visible(service, name).await?;
                }
            }
        }

        Ok(StepOutcome::Applied)
    }

    /// Whether the ODB already holds what `step` would create. Serves as
    /// both precondition and postcondition.
    pub async fn is_satisfied(&self, step: Step) -> Result<bool, StepError> {
        let runner = self.ctx.runner;
        let config = self.ctx.config;

        match step {
            Step::AdminPrincipal => {
                if !runner.has_table("admin_principal").await? {
                    return Ok(false);
                }
                let username = config.admin.username.as_str();
                let count = runner
                    .query(|db| {
                        AdminPrincipal::find()
                            .filter(admin_principal::Column::Username.eq(username))
                            .count(db)
                    })
                    .await?;
                Ok(count > 0)
            }
            Step::OdbTables => {
                Ok(runner.has_table("cluster").await? && runner.has_table("server").await?)
            }
            Step::OdbCluster => {
                if !runner.has_table("cluster").await? {
                    return Ok(false);
                }
                let name = config.cluster.name.as_str();
                let count = runner
                    .query(|db| {
                        Cluster::find()
                            .filter(cluster::Column::Name.eq(name))
                            .count(db)
                    })
                    .await?;
                Ok(count > 0)
            }
            Step::ServerCluster => {
                if !runner.has_table("server").await? {
                    return Ok(false);
                }
                Ok(self.missing_servers().await?.is_empty())
            }
        }
    }

    /// Configured servers, with their 0-based index, that have no membership row.
    async fn missing_servers(&self) -> Result<Vec<(usize, &'a str)>, SqlError> {
        let config = self.ctx.config;
        let cluster = config.cluster.name.as_str();
        let registered: HashSet<String> = self
            .ctx
            .runner
            .query(|db| {
                Server::find()
                    .select_only()
                    .column(server::Column::Name)
                    .filter(server::Column::ClusterName.eq(cluster))
                    .into_tuple::<String>()
                    .all(db)
            })
            .await?
            .into_iter()
            .collect();

        Ok(config
            .cluster
            .servers
            .iter()
            .enumerate()
            .filter(|(_, name)| !registered.contains(name.as_str()))
            .map(|(idx, name)| (idx, name.as_str()))
            .collect())
    }

    async fn run_action(&self, step: Step) -> Result<(), StepError> {
        let config = self.ctx.config;
        let runner = self.ctx.runner;
        let script = step.script();

        match step {
            Step::AdminPrincipal => {
                let password = config.admin.password.clone();
                let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
                    .await
                    .map_err(|e| StepError::Action(format!("Password hashing aborted: {}", e)))??;

                let params = ScriptParams::new()
                    .with("admin_username", config.admin.username.as_str())
                    .with("password_hash", password_hash)
                    .with("created_at", Utc::now());
                runner.run_script(script, &params).await?;
            }
            Step::OdbTables => {
                runner.run_script(script, &ScriptParams::new()).await?;
            }
            Step::OdbCluster => {
                let database = &config.database;
                let (host, port, name) = match &database.target {
                    OdbTarget::Postgresql(pg) => (
                        Some(pg.host.clone()),
                        Some(i32::from(pg.port)),
                        Some(pg.name.clone()),
                    ),
                    OdbTarget::Sqlite { path } => {
                        (None, None, Some(path.display().to_string()))
                    }
                };

                let params = ScriptParams::new()
                    .with("cluster_name", config.cluster.name.as_str())
                    .with("description", CLUSTER_DESCRIPTION)
                    .with("odb_type", database.odb_type().as_str())
                    .with("odb_host", host)
                    .with("odb_port", port)
                    .with("odb_db_name", name)
                    .with("lb_host", config.cluster.lb_host.as_str())
                    .with("lb_port", config.cluster.lb_port)
                    .with("lb_agent_port", config.cluster.lb_agent_port)
                    .with("owner", config.admin.username.as_str())
                    .with("created_at", Utc::now());
                runner.run_script(script, &params).await?;
            }
            Step::ServerCluster => {
                for (idx, name) in self.missing_servers().await? {
                    tracing::debug!(
                        "Registering server '{}' in cluster '{}'",
                        name,
                        config.cluster.name
                    );
                    let port = config.cluster.server_port(idx).ok_or_else(|| {
                        StepError::Action(format!("No port left for server '{}'", name))
                    })?;
                    let params = ScriptParams::new()
                        .with("cluster_name", config.cluster.name.as_str())
                        .with("server_name", name)
                        .with("bind_host", SERVER_BIND_HOST)
                        .with("bind_port", i32::from(port))
                        .with("token", generate_server_token())
                        .with("created_at", Utc::now());
                    runner.run_script(script, &params).await?;
                }
            }
        }
        Ok(())
    }

    async fn confirm_visible(
        &self,
        service: &dyn ServiceAdmin,
        server: &str,
    ) -> Result<(), StepError> {
        let cluster = self.ctx.config.cluster.name.as_str();
        let what = format!("Server '{}' in service admin API", server);

        let result = retry_transient(
            &self.ctx.service_retry,
            &what,
            move || async move {
                match service.server_visible(cluster, server).await {
                    Ok(true) => Ok(()),
                    Ok(false) => Err(Visibility::NotYet),
                    Err(e) => Err(Visibility::Unreachable(e)),
                }
            },
            |_| true,
        )
        .await;

        match result {
            Ok(()) => {
                tracing::debug!("Server '{}' is visible to the service", server);
                Ok(())
            }
            Err(RetryError::Exhausted {
                waited,
                last: Visibility::Unreachable(e),
                ..
            }) => Err(StepError::ServiceUnreachable {
                waited,
                message: e.to_string(),
            }),
            Err(RetryError::Exhausted { waited, .. }) => Err(StepError::Postcondition(format!(
                "server '{}' stored in cluster '{}' but not visible to the service after {:?}",
                server, cluster, waited
            ))),
            Err(RetryError::Permanent(e)) => Err(StepError::Postcondition(e.to_string())),
        }
    }
}

enum Visibility {
    NotYet,
    Unreachable(ServiceError),
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Visibility::NotYet => f.write_str("not visible yet"),
            Visibility::Unreachable(e) => write!(f, "{}", e),
        }
    }
}

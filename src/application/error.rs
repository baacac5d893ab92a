use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Problems with the settings the process was started with. Never retried.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required setting {0}")]
    Missing(&'static str),

    #[error("Malformed setting {var}={value:?}: {reason}")]
    Malformed {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(#[from] validator::ValidationErrors),

    #[error("Cannot read settings file {}: {source}", .path.display())]
    SettingsFile {
        path: PathBuf,
        source: dotenvy::Error,
    },

    #[error("Cannot load SQL scripts from {}: {source}", .path.display())]
    Scripts {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Errors reported by the SQL action runner.
#[derive(Debug, Error)]
pub enum SqlError {
    #[error("Database unreachable after {attempts} attempt(s) over {waited:?}: {message}")]
    Connectivity {
        attempts: u32,
        waited: Duration,
        message: String,
    },

    #[error("Script {script} failed: {source}")]
    Script {
        script: &'static str,
        source: sea_orm::DbErr,
    },

    #[error("Script {script} timed out after {timeout:?}")]
    Timeout {
        script: &'static str,
        timeout: Duration,
    },

    #[error("Script {script} references unbound parameter :{name}")]
    UnboundParameter { script: &'static str, name: String },

    #[error("Database query failed: {0}")]
    Query(#[from] sea_orm::DbErr),
}

/// Errors talking to the running service's administrative API.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Service admin request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Service admin returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// Why a single bootstrap step failed.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("Requires step {required} to have completed first")]
    UnmetDependency { required: &'static str },

    #[error(transparent)]
    Sql(#[from] SqlError),

    #[error("{0}")]
    Action(String),

    #[error("Postcondition not met: {0}")]
    Postcondition(String),

    #[error("Service admin API unreachable for {waited:?}: {message}")]
    ServiceUnreachable { waited: Duration, message: String },
}

/// Top-level failure of a provisioning attempt.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Step {step} failed, dependency unreachable: {message}")]
    Connectivity { step: &'static str, message: String },

    #[error("Step {step} failed: {message}")]
    Action { step: &'static str, message: String },

    #[error("Step {step} ran but its result could not be verified: {message}")]
    Postcondition { step: &'static str, message: String },

    #[error("Bootstrap marker {location}: {source}")]
    Marker {
        location: String,
        source: std::io::Error,
    },

    #[error("Provisioning interrupted before step {step}")]
    Interrupted { step: &'static str },
}

impl BootstrapError {
    /// Classify a failed step into the operator-facing error kind.
    pub fn from_step_failure(step: &'static str, error: &StepError) -> Self {
        let message = error.to_string();
        match error {
            StepError::Sql(SqlError::Connectivity { .. }) | StepError::ServiceUnreachable { .. } => {
                BootstrapError::Connectivity { step, message }
            }
            StepError::Postcondition(_) => BootstrapError::Postcondition { step, message },
            StepError::UnmetDependency { .. } | StepError::Sql(_) | StepError::Action(_) => {
                BootstrapError::Action { step, message }
            }
        }
    }

    /// Name of the step this error is attributed to, if any.
    pub fn step(&self) -> Option<&'static str> {
        match self {
            BootstrapError::Connectivity { step, .. }
            | BootstrapError::Action { step, .. }
            | BootstrapError::Postcondition { step, .. }
            | BootstrapError::Interrupted { step } => Some(*step),
            BootstrapError::Configuration(_) | BootstrapError::Marker { .. } => None,
        }
    }

    /// Process exit status reported to the container supervisor.
    pub fn exit_code(&self) -> u8 {
        match self {
            BootstrapError::Configuration(_) => 2,
            BootstrapError::Connectivity { .. } => 3,
            BootstrapError::Action { .. } => 4,
            BootstrapError::Postcondition { .. } => 5,
            BootstrapError::Marker { .. } => 6,
            BootstrapError::Interrupted { .. } => 130,
        }
    }
}

pub type Result<T> = std::result::Result<T, BootstrapError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_impl() {
        assert_eq!(
            ConfigError::Missing("ZATO_CLUSTER_NAME").to_string(),
            "Missing required setting ZATO_CLUSTER_NAME"
        );
        assert_eq!(
            BootstrapError::Action {
                step: "odb-cluster",
                message: "boom".to_string()
            }
            .to_string(),
            "Step odb-cluster failed: boom"
        );
        assert_eq!(
            StepError::UnmetDependency {
                required: "admin-user"
            }
            .to_string(),
            "Requires step admin-user to have completed first"
        );
    }

    #[test]
    fn test_connectivity_failures_are_classified_as_connectivity() {
        let err = StepError::Sql(SqlError::Connectivity {
            attempts: 3,
            waited: Duration::from_secs(1),
            message: "connection refused".to_string(),
        });
        let mapped = BootstrapError::from_step_failure("admin-user", &err);
        assert!(matches!(mapped, BootstrapError::Connectivity { step: "admin-user", .. }));
        assert_eq!(mapped.exit_code(), 3);
    }

    #[test]
    fn test_postcondition_is_distinct_from_action() {
        let post = BootstrapError::from_step_failure(
            "odb-cluster",
            &StepError::Postcondition("cluster row missing".to_string()),
        );
        let action = BootstrapError::from_step_failure(
            "odb-cluster",
            &StepError::Sql(SqlError::Query(sea_orm::DbErr::Custom("syntax".to_string()))),
        );
        assert!(matches!(post, BootstrapError::Postcondition { .. }));
        assert!(matches!(action, BootstrapError::Action { .. }));
        assert_ne!(post.exit_code(), action.exit_code());
    }

    #[test]
    fn test_unmet_dependency_is_an_action_error() {
        let err = BootstrapError::from_step_failure(
            "odb-tables",
            &StepError::UnmetDependency {
                required: "admin-user",
            },
        );
        assert!(matches!(err, BootstrapError::Action { .. }));
        assert_eq!(err.step(), Some("odb-tables"));
    }

    #[test]
    fn test_exit_codes_are_non_zero() {
        let errors = [
            BootstrapError::Configuration(ConfigError::Missing("ZATO_ODB_HOST")),
            BootstrapError::Marker {
                location: "/tmp/marker".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
            },
            BootstrapError::Interrupted { step: "odb-tables" },
        ];
        for err in errors {
            assert_ne!(err.exit_code(), 0, "{err} must exit non-zero");
        }
    }
}

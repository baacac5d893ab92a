pub mod admin;
pub mod cluster;
pub mod database;
pub mod gate;
pub mod logging;
pub mod service;
pub mod source;

pub use source::SettingsSource;

use crate::error::ConfigError;

/// Everything the orchestrator needs, resolved once at process start and
/// shared read-only afterwards.
#[derive(Debug, Clone)]
pub struct Config {
    pub gate: gate::GateConfig,
    pub admin: admin::AdminConfig,
    pub database: database::DatabaseConfig,
    pub cluster: cluster::ClusterConfig,
    pub service: Option<service::ServiceAdminConfig>,
    pub logging: logging::LoggingConfig,

    // Build info
    pub version: String,
}

impl Config {
    pub fn from_source(source: &SettingsSource) -> Result<Self, ConfigError> {
        let gate = gate::GateConfig::from_source(source)?;
        let admin = admin::AdminConfig::from_source(source)?;
        let database =
            database::DatabaseConfig::from_source(source, &admin.username, &admin.password)?;

        Ok(Self {
            gate,
            database,
            cluster: cluster::ClusterConfig::from_source(source)?,
            service: service::ServiceAdminConfig::from_source(source)?,
            logging: logging::LoggingConfig::from_source(source),
            admin,

            version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }
}

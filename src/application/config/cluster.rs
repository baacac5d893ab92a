use std::collections::HashSet;

use validator::{Validate, ValidationError};

use super::source::{malformed, SettingsSource};
use crate::error::ConfigError;

/// Load-balancer defaults of a quickstart cluster.
pub const DEFAULT_LB_HOST: &str = "127.0.0.1";
pub const DEFAULT_LB_PORT: i32 = 11223;
pub const DEFAULT_LB_AGENT_PORT: i32 = 20151;
/// Servers get consecutive plain-HTTP ports starting here.
pub const FIRST_SERVER_PORT: u16 = 17010;
/// As many servers as there are ports from `FIRST_SERVER_PORT` up.
pub const MAX_SERVERS: usize = (u16::MAX - FIRST_SERVER_PORT) as usize + 1;

#[derive(Debug, Clone, PartialEq, Eq, Validate)]
pub struct ClusterConfig {
    #[validate(length(min = 1, max = 200, message = "ZATO_CLUSTER_NAME must be 1-200 characters"))]
    pub name: String,
    #[validate(custom(function = "validate_server_names"))]
    pub servers: Vec<String>,
    pub lb_host: String,
    pub lb_port: i32,
    pub lb_agent_port: i32,
}

impl ClusterConfig {
    /// Server names come from `ZATO_SERVER_NAMES` (comma-separated) or, failing
    /// that, `ZATO_SERVERS` servers named `server1..N`.
    pub fn from_source(source: &SettingsSource) -> Result<Self, ConfigError> {
        let servers = match source.get("ZATO_SERVER_NAMES") {
            Some(names) => names.split(',').map(|s| s.trim().to_string()).collect(),
            None => {
                let count = source.parse::<usize>("ZATO_SERVERS")?.unwrap_or(1);
                if count > MAX_SERVERS {
                    return Err(malformed(
                        "ZATO_SERVERS",
                        &count.to_string(),
                        format!("at most {} servers fit the port range", MAX_SERVERS),
                    ));
                }
                (1..=count).map(|idx| format!("server{}", idx)).collect()
            }
        };

        let config = Self {
            name: source.require("ZATO_CLUSTER_NAME")?,
            servers,
            lb_host: DEFAULT_LB_HOST.to_string(),
            lb_port: DEFAULT_LB_PORT,
            lb_agent_port: DEFAULT_LB_AGENT_PORT,
        };
        config.validate()?;
        Ok(config)
    }

    /// Port the server at `index` (0-based) listens on, if it fits.
    pub fn server_port(&self, index: usize) -> Option<u16> {
        u16::try_from(index)
            .ok()
            .and_then(|offset| FIRST_SERVER_PORT.checked_add(offset))
    }
}

#[allow(clippy::ptr_arg)]
fn validate_server_names(servers: &Vec<String>) -> Result<(), ValidationError> {
    if servers.is_empty() {
        return Err(ValidationError::new("no_servers")
            .with_message("at least one server is required".into()));
    }

    if servers.len() > MAX_SERVERS {
        return Err(ValidationError::new("too_many_servers")
            .with_message(format!("at most {} servers fit the port range", MAX_SERVERS).into()));
    }

    let mut seen = HashSet::new();
    for name in servers {
        if name.is_empty() || name.len() > 200 {
            return Err(ValidationError::new("server_name")
                .with_message("server names must be 1-200 characters".into()));
        }
        if !seen.insert(name.as_str()) {
            return Err(ValidationError::new("duplicate_server")
                .with_message(format!("server '{}' is listed twice", name).into()));
        }
    }
    Ok(())
}

use std::path::PathBuf;

use super::source::SettingsSource;
use crate::error::ConfigError;

pub const DEFAULT_MARKER_PATH: &str = "/opt/zato/env/qs-1/.quickstart-complete";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateConfig {
    /// `ZATO_QUICKSTART_ENABLED`: run the bootstrap phase on this boot.
    pub enabled: bool,
    /// File whose presence means provisioning already completed.
    pub marker_path: PathBuf,
}

impl GateConfig {
    pub fn from_source(source: &SettingsSource) -> Result<Self, ConfigError> {
        Ok(Self {
            enabled: source.flag("ZATO_QUICKSTART_ENABLED")?.unwrap_or(false),
            marker_path: source
                .path("ZATO_QUICKSTART_MARKER")
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MARKER_PATH)),
        })
    }
}

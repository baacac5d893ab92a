use std::fmt;

use validator::Validate;

use super::source::SettingsSource;
use crate::error::ConfigError;

/// The administrative principal created by the first bootstrap step.
#[derive(Clone, Validate)]
pub struct AdminConfig {
    #[validate(length(min = 1, max = 200, message = "ZATO_ADMIN_USERNAME must be 1-200 characters"))]
    pub username: String,
    #[validate(length(min = 1, message = "ZATO_ADMIN_PASSWORD must not be empty"))]
    pub password: String,
}

impl AdminConfig {
    pub fn from_source(source: &SettingsSource) -> Result<Self, ConfigError> {
        let config = Self {
            username: source.require("ZATO_ADMIN_USERNAME")?,
            password: source.require("ZATO_ADMIN_PASSWORD")?,
        };
        config.validate()?;
        Ok(config)
    }
}

impl fmt::Debug for AdminConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

use std::fmt;
use std::time::Duration;

use super::source::{malformed, SettingsSource};
use crate::error::ConfigError;

/// Administrative API of the running server fleet, used to confirm that
/// registrations are visible to the service and not only stored in the ODB.
#[derive(Clone)]
pub struct ServiceAdminConfig {
    pub base_url: reqwest::Url,
    pub username: String,
    pub password: Option<String>,
    /// How long to keep asking before giving up on visibility.
    pub max_wait: Duration,
    pub request_timeout: Duration,
}

impl ServiceAdminConfig {
    /// `None` when `ZATO_ADMIN_API_URL` is not set, which turns verification off.
    pub fn from_source(source: &SettingsSource) -> Result<Option<Self>, ConfigError> {
        let Some(raw_url) = source.get("ZATO_ADMIN_API_URL").filter(|v| !v.is_empty()) else {
            return Ok(None);
        };

        let base_url = reqwest::Url::parse(&raw_url)
            .map_err(|e| malformed("ZATO_ADMIN_API_URL", &raw_url, e.to_string()))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(malformed(
                "ZATO_ADMIN_API_URL",
                &raw_url,
                "expected an http or https URL",
            ));
        }

        Ok(Some(Self {
            base_url,
            username: source.get_or("ZATO_ADMIN_INVOKE_USERNAME", "admin.invoke"),
            password: source.get("ZATO_ADMIN_INVOKE_PASSWORD"),
            max_wait: source
                .seconds("ZATO_SERVICE_MAX_WAIT_SECS")?
                .unwrap_or(Duration::from_secs(30)),
            request_timeout: Duration::from_secs(10),
        }))
    }
}

impl fmt::Debug for ServiceAdminConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAdminConfig")
            .field("base_url", &self.base_url.as_str())
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("max_wait", &self.max_wait)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

use super::source::SettingsSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl LoggingConfig {
    /// Never fails: logging must come up even when the rest of the
    /// configuration is broken, so the failure can be reported.
    pub fn from_source(source: &SettingsSource) -> Self {
        let format = match source.get("ZATO_LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };
        Self {
            level: source.get_or("ZATO_LOG_LEVEL", "info"),
            format,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

/// Variable naming an optional dotenv-style settings file.
pub const SETTINGS_FILE_VAR: &str = "ZATO_SETTINGS_FILE";

/// Raw settings as read from the environment and the optional settings file.
///
/// Environment values take precedence over the file so a container can
/// override a mounted file without editing it.
#[derive(Debug, Clone, Default)]
pub struct SettingsSource {
    env: HashMap<String, String>,
    file: HashMap<String, String>,
}

impl SettingsSource {
    /// Snapshot the process environment, plus `ZATO_SETTINGS_FILE` if set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(std::env::vars().collect())
    }

    /// Build from an explicit environment map, reading the settings file it names.
    pub fn load(env: HashMap<String, String>) -> Result<Self, ConfigError> {
        let file = match env.get(SETTINGS_FILE_VAR) {
            Some(path) if !path.trim().is_empty() => read_settings_file(Path::new(path.trim()))?,
            _ => HashMap::new(),
        };
        Ok(Self { env, file })
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            env: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            file: HashMap::new(),
        }
    }

    /// Raw lookup, environment first. Values are trimmed.
    pub fn get(&self, var: &str) -> Option<String> {
        self.env
            .get(var)
            .or_else(|| self.file.get(var))
            .map(|v| v.trim().to_string())
    }

    pub fn get_or(&self, var: &str, default: &str) -> String {
        self.get(var).unwrap_or_else(|| default.to_string())
    }

    pub fn require(&self, var: &'static str) -> Result<String, ConfigError> {
        self.get(var).ok_or(ConfigError::Missing(var))
    }

    pub fn parse<T>(&self, var: &'static str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(var) {
            None => Ok(None),
            Some(value) => value
                .parse::<T>()
                .map(Some)
                .map_err(|e| malformed(var, &value, e.to_string())),
        }
    }

    pub fn flag(&self, var: &'static str) -> Result<Option<bool>, ConfigError> {
        match self.get(var) {
            None => Ok(None),
            Some(value) => match value.to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(Some(true)),
                "0" | "false" | "no" | "off" | "" => Ok(Some(false)),
                _ => Err(malformed(var, &value, "expected a boolean")),
            },
        }
    }

    /// Seconds, fractional values allowed (`"0.5"`).
    pub fn seconds(&self, var: &'static str) -> Result<Option<Duration>, ConfigError> {
        match self.parse::<f64>(var)? {
            None => Ok(None),
            Some(secs) => Duration::try_from_secs_f64(secs)
                .map(Some)
                .map_err(|e| malformed(var, &secs.to_string(), e.to_string())),
        }
    }

    pub fn millis(&self, var: &'static str) -> Result<Option<Duration>, ConfigError> {
        Ok(self.parse::<u64>(var)?.map(Duration::from_millis))
    }

    pub fn path(&self, var: &'static str) -> Option<PathBuf> {
        self.get(var).filter(|v| !v.is_empty()).map(PathBuf::from)
    }
}

pub(crate) fn malformed(var: &'static str, value: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Malformed {
        var,
        value: value.to_string(),
        reason: reason.into(),
    }
}

fn read_settings_file(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
    let to_error = |source| ConfigError::SettingsFile {
        path: path.to_path_buf(),
        source,
    };

    let mut values = HashMap::new();
    for item in dotenvy::from_path_iter(path).map_err(to_error)? {
        let (key, value) = item.map_err(to_error)?;
        values.insert(key, value);
    }

    tracing::debug!(
        "Loaded {} setting(s) from {}",
        values.len(),
        path.display()
    );
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_overrides_file() {
        let source = SettingsSource {
            env: HashMap::from([("ZATO_CLUSTER_NAME".to_string(), "from-env".to_string())]),
            file: HashMap::from([
                ("ZATO_CLUSTER_NAME".to_string(), "from-file".to_string()),
                ("ZATO_ODB_HOST".to_string(), "db".to_string()),
            ]),
        };
        assert_eq!(source.get("ZATO_CLUSTER_NAME").as_deref(), Some("from-env"));
        assert_eq!(source.get("ZATO_ODB_HOST").as_deref(), Some("db"));
    }

    #[test]
    fn test_flag_values() {
        let source = SettingsSource::from_pairs([("A", "yes"), ("B", "OFF"), ("C", "maybe")]);
        assert_eq!(source.flag("A").unwrap(), Some(true));
        assert_eq!(source.flag("B").unwrap(), Some(false));
        assert!(matches!(source.flag("C"), Err(ConfigError::Malformed { var: "C", .. })));
        assert_eq!(source.flag("D").unwrap(), None);
    }

    #[test]
    fn test_fractional_seconds() {
        let source = SettingsSource::from_pairs([("WAIT", "0.25"), ("BAD", "-1")]);
        assert_eq!(
            source.seconds("WAIT").unwrap(),
            Some(Duration::from_millis(250))
        );
        assert!(source.seconds("BAD").is_err());
    }
}

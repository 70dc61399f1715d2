//! Runtime configuration.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Default evaluation nesting limit.
pub const DEFAULT_MAX_DEPTH: usize = 256;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Evaluator settings. Every field has a default, so an empty file is valid.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "snake_case", deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Maximum nesting of operator calls and lambda invocations.
    pub max_depth: usize,
    /// Locale used by `format/*` and `time/relative` when none is given.
    pub locale: String,
    /// Currency code used by `format/currency` when none is given.
    pub currency: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            locale: "en-US".to_string(),
            currency: "USD".to_string(),
        }
    }
}

impl RuntimeConfig {
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    /// Loads a config file. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(source) => Self::from_toml(&source),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Io {
                path: path.display().to_string(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::from_toml("").unwrap();
        assert_eq!(config, RuntimeConfig::default());
        assert_eq!(config.max_depth, 256);
        assert_eq!(config.locale, "en-US");
        assert_eq!(config.currency, "USD");
    }

    #[test]
    fn test_partial_override() {
        let config = RuntimeConfig::from_toml("locale = \"de-DE\"\nmax_depth = 32\n").unwrap();
        assert_eq!(config.locale, "de-DE");
        assert_eq!(config.max_depth, 32);
        assert_eq!(config.currency, "USD");
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(matches!(
            RuntimeConfig::from_toml("colour = \"blue\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "currency = \"EUR\"").unwrap();
        let config = RuntimeConfig::load(file.path()).unwrap();
        assert_eq!(config.currency, "EUR");
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = RuntimeConfig::load(dir.path().join("orbital.toml")).unwrap();
        assert_eq!(config, RuntimeConfig::default());
    }
}

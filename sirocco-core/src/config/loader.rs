//! Configuration loader supporting YAML, TOML and JSON formats.
//!
//! Loads a [`FeedConfig`] from a file, applies environment variable
//! overrides, and validates the result. Override variables are flat and
//! millisecond-valued where they name a duration, e.g. with the default
//! prefix:
//!
//! ```text
//! SIROCCO_ACTIVE_LIMIT=4
//! SIROCCO_CACHE_DELAY_MS=30000
//! SIROCCO_CACHING_ENABLED=true
//! SIROCCO_RESPONSE_TIMEOUT_MS=2000
//! SIROCCO_THROTTLE_WINDOW_MS=1000
//! SIROCCO_THROTTLE_MAX_PER_WINDOW=5
//! ```

use super::FeedConfig;
use crate::error::ConfigError;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfigFormat {
    /// YAML format (.yaml, .yml)
    #[default]
    Yaml,
    /// TOML format (.toml)
    Toml,
    /// JSON format (.json)
    Json,
}

impl ConfigFormat {
    /// Detects the format from a file extension.
    ///
    /// Returns `None` if the extension is not recognized.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| match ext.to_lowercase().as_str() {
                "yaml" | "yml" => Some(Self::Yaml),
                "toml" => Some(Self::Toml),
                "json" => Some(Self::Json),
                _ => None,
            })
    }

    /// Returns the file extension for this format.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Yaml => "yaml",
            Self::Toml => "toml",
            Self::Json => "json",
        }
    }
}

/// Configuration loader with environment variable overrides.
///
/// # Example
///
/// ```rust,ignore
/// use sirocco_core::config::ConfigLoader;
///
/// let config = ConfigLoader::new()
///     .with_env_prefix("MYFEED")
///     .load_feed_config("feed.yaml")?;
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Environment variable prefix for overrides.
    env_prefix: String,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a loader with the default `SIROCCO` override prefix.
    #[must_use]
    pub fn new() -> Self {
        Self {
            env_prefix: "SIROCCO".to_string(),
        }
    }

    /// Sets the environment variable prefix for overrides.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Returns the environment variable prefix.
    #[must_use]
    pub fn env_prefix(&self) -> &str {
        &self.env_prefix
    }

    /// Loads any deserializable configuration from a file.
    ///
    /// The format is detected from the file extension.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, has an unrecognized
    /// extension, or fails to parse.
    pub fn load_file<T, P>(&self, path: P) -> Result<T, ConfigError>
    where
        T: DeserializeOwned,
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let format =
            ConfigFormat::from_path(path).ok_or_else(|| ConfigError::UnsupportedFormat {
                path: path.display().to_string(),
            })?;

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        self.load_str(&content, format)
    }

    /// Loads any deserializable configuration from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the content cannot be parsed.
    pub fn load_str<T>(&self, content: &str, format: ConfigFormat) -> Result<T, ConfigError>
    where
        T: DeserializeOwned,
    {
        match format {
            ConfigFormat::Yaml => serde_yaml::from_str(content)
                .map_err(|e| ConfigError::parse("<string>", format!("YAML parse error: {e}"))),
            ConfigFormat::Toml => toml::from_str(content)
                .map_err(|e| ConfigError::parse("<string>", format!("TOML parse error: {e}"))),
            ConfigFormat::Json => serde_json::from_str(content)
                .map_err(|e| ConfigError::parse("<string>", format!("JSON parse error: {e}"))),
        }
    }

    /// Loads a [`FeedConfig`] from a file, applies environment overrides and
    /// validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be loaded, an override variable
    /// fails to parse, or validation fails.
    pub fn load_feed_config<P: AsRef<Path>>(&self, path: P) -> Result<FeedConfig, ConfigError> {
        let mut config: FeedConfig = self.load_file(path)?;
        self.apply_env_overrides(&mut config)?;
        config.validate()?;
        Ok(config)
    }

    /// Builds a [`FeedConfig`] from defaults plus environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if an override variable fails to parse or validation
    /// fails.
    pub fn feed_config_from_env(&self) -> Result<FeedConfig, ConfigError> {
        let mut config = FeedConfig::default();
        self.apply_env_overrides(&mut config)?;
        config.validate()?;
        Ok(config)
    }

    /// Applies the recognized override variables to a config in place.
    fn apply_env_overrides(&self, config: &mut FeedConfig) -> Result<(), ConfigError> {
        if let Some(limit) = self.env_value::<i64>("ACTIVE_LIMIT")? {
            config.channel.active_limit = limit;
        }
        if let Some(enabled) = self.env_value::<bool>("CACHING_ENABLED")? {
            config.channel.caching_enabled = enabled;
        }
        if let Some(ms) = self.env_value::<u64>("CACHE_DELAY_MS")? {
            config.channel.deactivation_cache_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = self.env_value::<u64>("RESPONSE_TIMEOUT_MS")? {
            config.wire.response_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.env_value::<u64>("THROTTLE_WINDOW_MS")? {
            config.wire.throttle.window = Duration::from_millis(ms);
        }
        if let Some(max) = self.env_value::<u32>("THROTTLE_MAX_PER_WINDOW")? {
            config.wire.throttle.max_per_window = max;
        }
        Ok(())
    }

    /// Reads and parses one prefixed environment variable, if present.
    fn env_value<T: FromStr>(&self, suffix: &str) -> Result<Option<T>, ConfigError>
    where
        T::Err: std::fmt::Display,
    {
        let name = format!("{}_{suffix}", self.env_prefix);
        match std::env::var(&name) {
            Ok(raw) => {
                let value = raw.parse::<T>().map_err(|e| ConfigError::InvalidEnvVar {
                    name: name.clone(),
                    reason: e.to_string(),
                })?;
                debug!(var = %name, value = %raw, "applied config override");
                Ok(Some(value))
            }
            Err(_) => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_detection() {
        assert_eq!(
            ConfigFormat::from_path(Path::new("feed.yaml")),
            Some(ConfigFormat::Yaml)
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("feed.yml")),
            Some(ConfigFormat::Yaml)
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("feed.toml")),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("feed.json")),
            Some(ConfigFormat::Json)
        );
        assert_eq!(ConfigFormat::from_path(Path::new("feed.ini")), None);
        assert_eq!(ConfigFormat::from_path(Path::new("feed")), None);
        assert_eq!(ConfigFormat::Toml.extension(), "toml");
    }

    #[test]
    fn test_load_toml() {
        let toml = r"
[channel]
active_limit = 3

[wire.throttle]
max_per_window = 2
";
        let loader = ConfigLoader::new();
        let config: FeedConfig = loader.load_str(toml, ConfigFormat::Toml).unwrap();
        assert_eq!(config.channel.active_limit, 3);
        assert_eq!(config.wire.throttle.max_per_window, 2);
    }

    #[test]
    fn test_load_json() {
        let json = r#"{"channel": {"active_limit": 1}}"#;
        let loader = ConfigLoader::new();
        let config: FeedConfig = loader.load_str(json, ConfigFormat::Json).unwrap();
        assert_eq!(config.channel.active_limit, 1);
    }

    #[test]
    fn test_invalid_yaml() {
        let loader = ConfigLoader::new();
        let result: Result<FeedConfig, _> = loader.load_str("channel: [oops", ConfigFormat::Yaml);
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("YAML parse error"));
    }

    #[test]
    fn test_file_not_found() {
        let loader = ConfigLoader::new();
        let result: Result<FeedConfig, _> = loader.load_file("/nonexistent/feed.yaml");
        assert!(matches!(result, Err(ConfigError::FileRead { .. })));
    }

    #[test]
    fn test_unrecognized_extension() {
        let dir = std::env::temp_dir();
        let path = dir.join("sirocco_loader_test.ini");
        std::fs::write(&path, "whatever").unwrap();

        let loader = ConfigLoader::new();
        let result: Result<FeedConfig, _> = loader.load_file(&path);
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat { .. })));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_load_yaml_file() {
        let dir = std::env::temp_dir();
        let path = dir.join("sirocco_loader_test.yaml");
        std::fs::write(&path, "channel:\n  active_limit: 7\n").unwrap();

        let loader = ConfigLoader::new();
        let config: FeedConfig = loader.load_file(&path).unwrap();
        assert_eq!(config.channel.active_limit, 7);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_env_override() {
        // Prefix unique to this test so parallel tests cannot interfere.
        let loader = ConfigLoader::new().with_env_prefix("SIROCCO_LOADER_OVERRIDE_TEST");
        std::env::set_var("SIROCCO_LOADER_OVERRIDE_TEST_ACTIVE_LIMIT", "2");
        std::env::set_var("SIROCCO_LOADER_OVERRIDE_TEST_RESPONSE_TIMEOUT_MS", "2000");

        let config = loader.feed_config_from_env().unwrap();
        assert_eq!(config.channel.active_limit, 2);
        assert_eq!(config.wire.response_timeout, Duration::from_millis(2000));

        std::env::remove_var("SIROCCO_LOADER_OVERRIDE_TEST_ACTIVE_LIMIT");
        std::env::remove_var("SIROCCO_LOADER_OVERRIDE_TEST_RESPONSE_TIMEOUT_MS");
    }

    #[test]
    fn test_env_override_rejects_garbage() {
        let loader = ConfigLoader::new().with_env_prefix("SIROCCO_LOADER_GARBAGE_TEST");
        std::env::set_var("SIROCCO_LOADER_GARBAGE_TEST_ACTIVE_LIMIT", "many");

        let result = loader.feed_config_from_env();
        assert!(matches!(result, Err(ConfigError::InvalidEnvVar { .. })));

        std::env::remove_var("SIROCCO_LOADER_GARBAGE_TEST_ACTIVE_LIMIT");
    }

    #[test]
    fn test_env_prefix() {
        assert_eq!(ConfigLoader::new().env_prefix(), "SIROCCO");
        let custom = ConfigLoader::new().with_env_prefix("MYFEED");
        assert_eq!(custom.env_prefix(), "MYFEED");
    }
}

//! Feed engine configuration structures.

use crate::definition::ChannelKind;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Admission settings for one data channel.
///
/// # Examples
///
/// ```
/// use sirocco_core::config::ChannelConfig;
///
/// let config = ChannelConfig::default();
/// assert_eq!(config.active_limit, -1);
/// assert!(config.is_unbounded());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Maximum concurrently active subscriptions; -1 means unbounded.
    #[serde(default = "default_active_limit")]
    pub active_limit: i64,
    /// Whether released online subscriptions may linger in the cache.
    #[serde(default = "default_caching_enabled")]
    pub caching_enabled: bool,
    /// How long a released subscription stays cached; zero disables caching.
    #[serde(default = "default_cache_delay", with = "humantime_serde")]
    pub deactivation_cache_delay: Duration,
}

fn default_active_limit() -> i64 {
    -1
}

fn default_caching_enabled() -> bool {
    true
}

fn default_cache_delay() -> Duration {
    Duration::ZERO
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            active_limit: default_active_limit(),
            caching_enabled: default_caching_enabled(),
            deactivation_cache_delay: default_cache_delay(),
        }
    }
}

impl ChannelConfig {
    /// Returns true when the channel has no active limit.
    #[must_use]
    pub const fn is_unbounded(&self) -> bool {
        self.active_limit < 0
    }

    /// Returns true when released subscriptions are actually cached.
    #[must_use]
    pub fn caching_active(&self) -> bool {
        self.caching_enabled && !self.deactivation_cache_delay.is_zero()
    }

    /// Sets the active limit.
    #[must_use]
    pub fn with_active_limit(mut self, limit: i64) -> Self {
        self.active_limit = limit;
        self
    }

    /// Sets the cache delay.
    #[must_use]
    pub fn with_cache_delay(mut self, delay: Duration) -> Self {
        self.deactivation_cache_delay = delay;
        self
    }

    /// Enables or disables caching.
    #[must_use]
    pub fn with_caching(mut self, enabled: bool) -> Self {
        self.caching_enabled = enabled;
        self
    }

    /// Validates the channel settings.
    ///
    /// # Errors
    ///
    /// Returns an error if `active_limit` is below -1.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.active_limit < -1 {
            return Err(ConfigError::invalid_value(
                "active_limit",
                format!("must be -1 (unbounded) or >= 0, got {}", self.active_limit),
            ));
        }
        Ok(())
    }
}

/// Send-rate settings for the throttled normal queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrottleConfig {
    /// Length of one throttle window.
    #[serde(default = "default_throttle_window", with = "humantime_serde")]
    pub window: Duration,
    /// Requests allowed per window on the normal queue.
    #[serde(default = "default_max_per_window")]
    pub max_per_window: u32,
}

fn default_throttle_window() -> Duration {
    Duration::from_secs(1)
}

fn default_max_per_window() -> u32 {
    10
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            window: default_throttle_window(),
            max_per_window: default_max_per_window(),
        }
    }
}

impl ThrottleConfig {
    /// Validates the throttle settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the window is zero or the per-window budget is
    /// zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window.is_zero() {
            return Err(ConfigError::invalid_value("window", "must be non-zero"));
        }
        if self.max_per_window == 0 {
            return Err(ConfigError::invalid_value(
                "max_per_window",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Wire-level settings for one publisher connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireConfig {
    /// How long a sent request may wait for its first response.
    #[serde(default = "default_response_timeout", with = "humantime_serde")]
    pub response_timeout: Duration,
    /// Normal-queue throttle.
    #[serde(default)]
    pub throttle: ThrottleConfig,
}

fn default_response_timeout() -> Duration {
    Duration::from_secs(5)
}

impl Default for WireConfig {
    fn default() -> Self {
        Self {
            response_timeout: default_response_timeout(),
            throttle: ThrottleConfig::default(),
        }
    }
}

impl WireConfig {
    /// Validates the wire settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the response timeout is zero or the throttle
    /// settings are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.response_timeout.is_zero() {
            return Err(ConfigError::invalid_value(
                "response_timeout",
                "must be non-zero",
            ));
        }
        self.throttle.validate()
    }
}

/// Top-level feed engine configuration.
///
/// `channel` supplies the defaults for every data channel; `channels` holds
/// per-channel overrides keyed by channel kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Defaults applied to channels without an override.
    #[serde(default)]
    pub channel: ChannelConfig,
    /// Per-channel overrides.
    #[serde(default)]
    pub channels: BTreeMap<ChannelKind, ChannelConfig>,
    /// Wire-level settings.
    #[serde(default)]
    pub wire: WireConfig,
}

impl FeedConfig {
    /// Returns the effective settings for a channel, preferring an override
    /// over the defaults.
    #[must_use]
    pub fn channel_config(&self, kind: ChannelKind) -> &ChannelConfig {
        self.channels.get(&kind).unwrap_or(&self.channel)
    }

    /// Installs an override for one channel.
    #[must_use]
    pub fn with_channel(mut self, kind: ChannelKind, config: ChannelConfig) -> Self {
        self.channels.insert(kind, config);
        self
    }

    /// Validates the whole configuration.
    ///
    /// # Errors
    ///
    /// Returns the first invalid value found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.channel.validate()?;
        for config in self.channels.values() {
            config.validate()?;
        }
        self.wire.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FeedConfig::default();
        assert_eq!(config.channel.active_limit, -1);
        assert!(config.channel.caching_enabled);
        assert!(config.channel.deactivation_cache_delay.is_zero());
        assert!(!config.channel.caching_active());
        assert_eq!(config.wire.response_timeout, Duration::from_secs(5));
        assert_eq!(config.wire.throttle.max_per_window, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_channel_override() {
        let config = FeedConfig::default().with_channel(
            ChannelKind::Depth,
            ChannelConfig::default().with_active_limit(3),
        );
        assert_eq!(config.channel_config(ChannelKind::Depth).active_limit, 3);
        assert_eq!(config.channel_config(ChannelKind::Trades).active_limit, -1);
    }

    #[test]
    fn test_validate_rejects_bad_limit() {
        let config = FeedConfig {
            channel: ChannelConfig::default().with_active_limit(-2),
            ..FeedConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_zero_throttle() {
        let mut config = FeedConfig::default();
        config.wire.throttle.max_per_window = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_caching_active_requires_both() {
        let enabled = ChannelConfig::default().with_cache_delay(Duration::from_secs(30));
        assert!(enabled.caching_active());

        let disabled = enabled.clone().with_caching(false);
        assert!(!disabled.caching_active());
    }

    #[test]
    fn test_yaml_parse_with_partial_fields() {
        let yaml = r"
channel:
  active_limit: 4
  deactivation_cache_delay: 30s
channels:
  depth:
    active_limit: 2
wire:
  response_timeout: 2s
  throttle:
    window: 500ms
    max_per_window: 5
";
        let config: FeedConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.channel.active_limit, 4);
        assert_eq!(
            config.channel.deactivation_cache_delay,
            Duration::from_secs(30)
        );
        // Omitted fields in an override fall back to serde defaults.
        assert!(config.channel_config(ChannelKind::Depth).caching_enabled);
        assert_eq!(config.channel_config(ChannelKind::Depth).active_limit, 2);
        assert_eq!(config.wire.throttle.window, Duration::from_millis(500));
        assert!(config.validate().is_ok());
    }
}

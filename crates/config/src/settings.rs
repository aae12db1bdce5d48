//! Runtime settings
//!
//! Layered defaults < file < environment, matching how the rest of the
//! deployment configures services. Everything here is immutable once the
//! process starts.

use serde::{Deserialize, Serialize};

use frontdesk_core::Language;

use crate::ConfigError;

/// Live-transfer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Staff number or queue to bridge escalated calls to. `None` skips the
    /// transfer attempt entirely and goes straight to callback creation.
    pub target: Option<String>,
    /// Bounded wait for the bridge attempt, in seconds
    pub timeout_secs: u64,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            target: None,
            timeout_secs: 30,
        }
    }
}

/// Per-session bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionLimits {
    /// Hard cap on one call's wall-clock duration, in seconds
    pub max_duration_secs: u64,
    /// Hard cap on dialog turns before forcing wrapup
    pub max_turns: usize,
    /// Backoff before retrying an idempotent provider read, in milliseconds
    pub retry_delay_ms: u64,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            max_duration_secs: 300,
            max_turns: 40,
            retry_delay_ms: 500,
        }
    }
}

/// Top-level settings for the orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Business name spoken in greetings
    pub business_name: String,
    /// Language used until the caller picks one
    pub default_language: Language,
    /// Staff target for notification dispatch (phone or email)
    pub staff_notify_target: Option<String>,
    pub transfer: TransferConfig,
    pub limits: SessionLimits,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            business_name: "our office".to_string(),
            default_language: Language::En,
            staff_notify_target: None,
            transfer: TransferConfig::default(),
            limits: SessionLimits::default(),
        }
    }
}

/// Load settings from an optional YAML file plus `FRONTDESK_` environment
/// overrides (e.g. `FRONTDESK_TRANSFER__TIMEOUT_SECS=45`).
pub fn load_settings(path: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = config::Config::builder();

    if let Some(path) = path {
        builder = builder.add_source(config::File::with_name(path));
    }

    let cfg = builder
        .add_source(
            config::Environment::with_prefix("FRONTDESK")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    cfg.try_deserialize().map_err(ConfigError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.default_language, Language::En);
        assert_eq!(settings.transfer.timeout_secs, 30);
        assert!(settings.transfer.target.is_none());
        assert_eq!(settings.limits.max_duration_secs, 300);
    }

    #[test]
    fn test_load_without_file() {
        let settings = load_settings(None).expect("defaults should load");
        assert_eq!(settings.business_name, "our office");
    }

    #[test]
    fn test_yaml_roundtrip() {
        let yaml = serde_yaml::to_string(&Settings::default()).unwrap();
        let back: Settings = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back.limits.max_turns, 40);
    }
}

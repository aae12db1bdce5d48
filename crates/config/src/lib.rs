//! Configuration for the frontdesk call orchestrator
//!
//! Supports loading configuration from:
//! - YAML files
//! - Environment variables (FRONTDESK_ prefix)
//! - Built-in defaults
//!
//! All of this is read-only after startup and shared freely across call
//! sessions: guardrail term lists, escalation trigger lexicons, transfer
//! timeout, and thresholds all live here rather than hardcoded at call
//! sites.

pub mod guardrails;
pub mod settings;
pub mod triggers;

pub use guardrails::GuardrailConfig;
pub use settings::{load_settings, Settings, SessionLimits, TransferConfig};
pub use triggers::{EscalationThresholds, LanguageTriggers, TriggerLexicon};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

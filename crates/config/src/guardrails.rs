//! Guardrail configuration
//!
//! Field-name blocklist for sensitive data the receptionist must never
//! collect or store. Matching is substring-based on normalized field names,
//! so `customer_ssn` trips the `ssn` term.

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Sensitive-data guardrails applied to every proposed action
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardrailConfig {
    /// Field-name fragments that mark a field as sensitive
    pub sensitive_field_terms: Vec<String>,
    /// Upper bound on any single string field value, in characters
    pub max_field_chars: usize,
}

impl GuardrailConfig {
    /// True if a field name refers to data we refuse to handle
    pub fn is_sensitive_field(&self, field_name: &str) -> bool {
        let normalized = field_name.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        self.sensitive_field_terms
            .iter()
            .any(|term| normalized.contains(term.as_str()))
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            sensitive_field_terms: [
                "ssn",
                "social_security",
                "dob",
                "date_of_birth",
                "birth_date",
                "birthdate",
                "credit_card",
                "card_number",
                "cvv",
                "expiry",
                "payment",
                "bank_account",
                "routing_number",
                "pin",
                "password",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            max_field_chars: 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocklist_matches_substrings() {
        let guardrails = GuardrailConfig::default();
        assert!(guardrails.is_sensitive_field("ssn"));
        assert!(guardrails.is_sensitive_field("customer_ssn"));
        assert!(guardrails.is_sensitive_field("Date of Birth"));
        assert!(guardrails.is_sensitive_field("credit-card"));
        assert!(!guardrails.is_sensitive_field("callback_number"));
        assert!(!guardrails.is_sensitive_field("name"));
    }

    #[test]
    fn test_yaml_override_keeps_defaults_for_missing_keys() {
        let cfg = GuardrailConfig::from_yaml("max_field_chars: 200\n").unwrap();
        assert_eq!(cfg.max_field_chars, 200);
        assert!(cfg.is_sensitive_field("cvv"));
    }
}

//! Supported spoken languages

use serde::{Deserialize, Serialize};
use std::fmt;

/// Spoken language for a call
///
/// The orchestrator is bilingual. Adding a language means adding trigger
/// lexicon data and prompt text, not new detector logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// English
    #[default]
    En,
    /// Spanish
    Es,
}

impl Language {
    /// BCP-47-ish language tag used in records and lexicon keys
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Es => "es",
        }
    }

    /// Parse a language tag, accepting only the supported set
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "en" | "en-us" | "english" => Some(Language::En),
            "es" | "es-us" | "es-mx" | "spanish" | "espanol" => Some(Language::Es),
            _ => None,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tags() {
        assert_eq!(Language::parse("en"), Some(Language::En));
        assert_eq!(Language::parse("ES"), Some(Language::Es));
        assert_eq!(Language::parse("espanol"), Some(Language::Es));
        assert_eq!(Language::parse("fr"), None);
    }

    #[test]
    fn test_serde_roundtrip() {
        let json = serde_json::to_string(&Language::Es).unwrap();
        assert_eq!(json, "\"es\"");
        let lang: Language = serde_json::from_str("\"en\"").unwrap();
        assert_eq!(lang, Language::En);
    }
}

//! Escalation trigger lexicons
//!
//! Trigger phrase lists are data keyed by language tag, not code branches:
//! adding a third language means adding an entry here, the detector logic
//! does not change.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use frontdesk_core::Language;

use crate::ConfigError;

/// Trigger phrase sets for one language
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguageTriggers {
    /// Explicit requests for a human agent
    pub human_request: Vec<String>,
    /// Generic help phrases; only meaningful with supporting context
    pub help: Vec<String>,
    /// Emergency / distress indicators
    pub emergency: Vec<String>,
    /// Legal / claims-urgency indicators
    pub legal: Vec<String>,
    /// Frustration vocabulary
    pub frustration: Vec<String>,
    /// Intensifiers that boost frustration confidence
    pub intensifiers: Vec<String>,
    /// Phrases indicating the caller is repeating themselves
    pub repetition: Vec<String>,
}

/// Trigger lexicon for all supported languages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerLexicon {
    languages: HashMap<Language, LanguageTriggers>,
}

impl TriggerLexicon {
    pub fn for_language(&self, language: Language) -> Option<&LanguageTriggers> {
        self.languages.get(&language)
    }

    pub fn languages(&self) -> impl Iterator<Item = (&Language, &LanguageTriggers)> {
        self.languages.iter()
    }

    /// Load a lexicon from YAML, e.g. a per-deployment override file
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }
}

impl Default for TriggerLexicon {
    fn default() -> Self {
        let mut languages = HashMap::new();

        languages.insert(
            Language::En,
            LanguageTriggers {
                human_request: strings(&[
                    "human",
                    "agent",
                    "person",
                    "representative",
                    "operator",
                    "real person",
                    "talk to someone",
                    "speak to someone",
                    "speak with someone",
                    "talk to a human",
                    "speak to a human",
                    "talk to a person",
                    "speak to a person",
                    "transfer me",
                    "connect me",
                    "live agent",
                    "real human",
                ]),
                help: strings(&["help", "help me", "i need help", "can you help"]),
                emergency: strings(&[
                    "emergency",
                    "urgent",
                    "immediately",
                    "right now",
                    "911",
                    "police",
                    "ambulance",
                    "fire",
                ]),
                legal: strings(&[
                    "lawyer",
                    "attorney",
                    "sue",
                    "lawsuit",
                    "legal action",
                    "court",
                    "legal",
                    "my rights",
                    "discrimination",
                    "harassment",
                    "complaint",
                    "report you",
                ]),
                frustration: strings(&[
                    "frustrated",
                    "frustrating",
                    "annoyed",
                    "annoying",
                    "angry",
                    "mad",
                    "upset",
                    "ridiculous",
                    "terrible",
                    "awful",
                    "horrible",
                    "useless",
                    "stupid",
                    "incompetent",
                    "waste of time",
                    "unacceptable",
                    "disappointed",
                    "fed up",
                    "sick of",
                    "tired of",
                    "give up",
                    "forget it",
                    "never mind",
                ]),
                intensifiers: strings(&[
                    "very",
                    "really",
                    "so",
                    "extremely",
                    "totally",
                    "completely",
                    "absolutely",
                    "incredibly",
                ]),
                repetition: strings(&[
                    "i already said",
                    "i told you",
                    "i just said",
                    "again",
                    "repeat",
                    "already explained",
                    "how many times",
                ]),
            },
        );

        languages.insert(
            Language::Es,
            LanguageTriggers {
                human_request: strings(&[
                    "persona",
                    "agente",
                    "representante",
                    "operador",
                    "alguien",
                    "persona real",
                    "hablar con alguien",
                    "hablar con una persona",
                    "transferirme",
                    "conectarme",
                    "agente en vivo",
                ]),
                help: strings(&["ayuda", "ayudame", "necesito ayuda", "puede ayudarme"]),
                emergency: strings(&[
                    "emergencia",
                    "urgente",
                    "inmediatamente",
                    "ahora mismo",
                    "policia",
                    "ambulancia",
                    "bomberos",
                ]),
                legal: strings(&[
                    "abogado",
                    "demanda",
                    "demandar",
                    "accion legal",
                    "tribunal",
                    "legal",
                    "mis derechos",
                    "discriminacion",
                    "acoso",
                    "queja",
                    "reportar",
                ]),
                frustration: strings(&[
                    "frustrado",
                    "frustrante",
                    "molesto",
                    "enojado",
                    "furioso",
                    "ridiculo",
                    "terrible",
                    "horrible",
                    "inutil",
                    "estupido",
                    "incompetente",
                    "perdida de tiempo",
                    "inaceptable",
                    "decepcionado",
                    "harto",
                    "cansado de",
                    "me rindo",
                    "olvidalo",
                ]),
                intensifiers: strings(&[
                    "muy",
                    "realmente",
                    "tan",
                    "extremadamente",
                    "totalmente",
                    "completamente",
                    "absolutamente",
                    "increiblemente",
                ]),
                repetition: strings(&[
                    "ya dije",
                    "ya te dije",
                    "otra vez",
                    "repetir",
                    "ya explique",
                    "cuantas veces",
                ]),
            },
        );

        Self { languages }
    }
}

/// Thresholds for the escalation detector
///
/// The repeated-failure turn count and confidence floor are configuration,
/// not constants buried in detector code.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationThresholds {
    /// Minimum trigger confidence to escalate
    pub min_confidence: f32,
    /// Consecutive failed turns before the stuck-caller heuristic fires
    pub repeated_failure_turns: u32,
    /// Frustration words needed before the class scores above the floor
    pub frustration_word_threshold: usize,
}

impl Default for EscalationThresholds {
    fn default() -> Self {
        Self {
            min_confidence: 0.6,
            repeated_failure_turns: 3,
            frustration_word_threshold: 2,
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

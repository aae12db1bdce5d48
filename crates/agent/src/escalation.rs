//! Escalation detection
//!
//! Pure scoring of one utterance plus session signals against the trigger
//! lexicon for the utterance's language. Each trigger class is
//! independently sufficient; the highest-confidence class wins and the
//! session escalates when it clears the configured floor.
//!
//! The detector itself is stateless. Stickiness lives on the session: the
//! loop never un-escalates regardless of what later evaluations return.

use frontdesk_config::{EscalationThresholds, TriggerLexicon};
use frontdesk_core::Language;

/// Why a call escalated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationReason {
    ExplicitHumanRequest,
    HelpRequest,
    Emergency,
    LegalConcern,
    Frustration,
    Repetition,
    RepeatedFailure,
}

impl EscalationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            EscalationReason::ExplicitHumanRequest => "explicit-human-request",
            EscalationReason::HelpRequest => "help-request",
            EscalationReason::Emergency => "emergency",
            EscalationReason::LegalConcern => "legal-concern",
            EscalationReason::Frustration => "frustration",
            EscalationReason::Repetition => "repetition",
            EscalationReason::RepeatedFailure => "repeated-failure",
        }
    }

    /// Emergencies make the fallback callback urgent; everything else is high
    pub fn is_emergency(&self) -> bool {
        matches!(self, EscalationReason::Emergency)
    }
}

/// Per-turn session signals the lexicon cannot see
#[derive(Debug, Clone, Copy, Default)]
pub struct TurnSignals {
    /// Consecutive turns that ended in validation failure or scripted fallback
    pub consecutive_failed_turns: u32,
}

/// Outcome of one evaluation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub escalate: bool,
    pub reason: Option<EscalationReason>,
    pub confidence: f32,
}

impl Evaluation {
    fn none() -> Self {
        Self {
            escalate: false,
            reason: None,
            confidence: 0.0,
        }
    }
}

/// Trigger-based escalation detector
pub struct EscalationDetector {
    lexicon: TriggerLexicon,
    thresholds: EscalationThresholds,
}

impl EscalationDetector {
    pub fn new(lexicon: TriggerLexicon, thresholds: EscalationThresholds) -> Self {
        Self {
            lexicon,
            thresholds,
        }
    }

    /// Score one utterance in its language, plus session signals
    pub fn evaluate(&self, utterance: &str, language: Language, signals: &TurnSignals) -> Evaluation {
        let text = normalize(utterance);
        let mut best = Evaluation::none();

        let mut consider = |reason, confidence: f32| {
            if confidence > best.confidence {
                best = Evaluation {
                    escalate: false,
                    reason: Some(reason),
                    confidence,
                };
            }
        };

        if let Some(triggers) = self.lexicon.for_language(language) {
            let human = count_matches(&text, &triggers.human_request);
            if human > 0 {
                let confidence = (0.8 + 0.05 * (human - 1) as f32).min(0.95);
                consider(EscalationReason::ExplicitHumanRequest, confidence);
            }

            // Help phrases overlap heavily ("i need help" also matches
            // "help"), so the base sits well under the floor; only an
            // emphatic pile-up of pleas clears it on its own.
            let help = count_matches(&text, &triggers.help);
            if help > 0 {
                let confidence = (0.45 + 0.05 * (help - 1) as f32).min(0.7);
                consider(EscalationReason::HelpRequest, confidence);
            }

            let emergency = count_matches(&text, &triggers.emergency);
            if emergency > 0 {
                let confidence = (0.9 + 0.02 * (emergency - 1) as f32).min(0.98);
                consider(EscalationReason::Emergency, confidence);
            }

            let legal = count_matches(&text, &triggers.legal);
            if legal > 0 {
                let confidence = (0.75 + 0.1 * (legal - 1) as f32).min(0.95);
                consider(EscalationReason::LegalConcern, confidence);
            }

            let frustration = count_matches(&text, &triggers.frustration);
            if frustration >= self.thresholds.frustration_word_threshold {
                let mut confidence: f32 = 0.6;
                if count_matches(&text, &triggers.intensifiers) > 0 {
                    confidence += 0.15;
                }
                consider(EscalationReason::Frustration, confidence.min(0.9));
            }

            let repetition = count_matches(&text, &triggers.repetition);
            if repetition > 0 {
                let confidence = (0.5 + 0.1 * (repetition - 1) as f32).min(0.75);
                consider(EscalationReason::Repetition, confidence);
            }
        }

        if signals.consecutive_failed_turns >= self.thresholds.repeated_failure_turns {
            let extra = signals.consecutive_failed_turns - self.thresholds.repeated_failure_turns;
            let confidence = (0.7 + 0.05 * extra as f32).min(0.9);
            consider(EscalationReason::RepeatedFailure, confidence);
        }

        if best.confidence >= self.thresholds.min_confidence {
            best.escalate = true;
        } else {
            best.reason = None;
            best.confidence = 0.0;
        }
        best
    }
}

/// Lowercase, fold common Spanish diacritics, strip punctuation, collapse
/// whitespace. Matching is then a padded-substring check, which gives word
/// boundaries for free.
fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push(' ');
    let mut last_space = true;
    for c in text.chars() {
        let folded = match c.to_lowercase().next().unwrap_or(c) {
            'á' => 'a',
            'é' => 'e',
            'í' => 'i',
            'ó' => 'o',
            'ú' | 'ü' => 'u',
            'ñ' => 'n',
            other => other,
        };
        if folded.is_alphanumeric() {
            out.push(folded);
            last_space = false;
        } else if !last_space {
            out.push(' ');
            last_space = true;
        }
    }
    if !last_space {
        out.push(' ');
    }
    out
}

fn count_matches(normalized: &str, phrases: &[String]) -> usize {
    phrases
        .iter()
        .filter(|phrase| {
            let needle = normalize(phrase);
            needle.trim() != "" && normalized.contains(needle.as_str())
        })
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use frontdesk_config::{EscalationThresholds, TriggerLexicon};

    fn detector() -> EscalationDetector {
        EscalationDetector::new(TriggerLexicon::default(), EscalationThresholds::default())
    }

    #[test]
    fn test_explicit_human_request_english() {
        let eval = detector().evaluate(
            "I want to talk to a real person",
            Language::En,
            &TurnSignals::default(),
        );
        assert!(eval.escalate);
        assert_eq!(eval.reason, Some(EscalationReason::ExplicitHumanRequest));
        assert!(eval.confidence >= 0.8);
    }

    #[test]
    fn test_explicit_human_request_spanish() {
        let eval = detector().evaluate(
            "necesito hablar con una persona",
            Language::Es,
            &TurnSignals::default(),
        );
        assert!(eval.escalate);
        assert_eq!(eval.reason, Some(EscalationReason::ExplicitHumanRequest));
    }

    #[test]
    fn test_spanish_diacritics_fold() {
        let eval = detector().evaluate(
            "¡Es una emergencia, llame a la policía!",
            Language::Es,
            &TurnSignals::default(),
        );
        assert!(eval.escalate);
        assert_eq!(eval.reason, Some(EscalationReason::Emergency));
    }

    #[test]
    fn test_emergency_outranks_human_request() {
        let eval = detector().evaluate(
            "get me a person, this is an emergency",
            Language::En,
            &TurnSignals::default(),
        );
        assert!(eval.escalate);
        assert_eq!(eval.reason, Some(EscalationReason::Emergency));
        assert!(eval.confidence >= 0.9);
    }

    #[test]
    fn test_legal_keywords() {
        let eval = detector().evaluate(
            "I will speak to my lawyer about a lawsuit",
            Language::En,
            &TurnSignals::default(),
        );
        assert!(eval.escalate);
        assert_eq!(eval.reason, Some(EscalationReason::LegalConcern));
    }

    #[test]
    fn test_ordinary_help_request_stays_below_floor() {
        let eval = detector().evaluate(
            "can you help me move my appointment",
            Language::En,
            &TurnSignals::default(),
        );
        assert!(!eval.escalate);
    }

    #[test]
    fn test_piled_up_help_pleas_escalate() {
        let eval = detector().evaluate(
            "can you help me, i need help right away",
            Language::En,
            &TurnSignals::default(),
        );
        assert!(eval.escalate);
        assert_eq!(eval.reason, Some(EscalationReason::HelpRequest));
    }

    #[test]
    fn test_single_frustration_word_is_not_enough() {
        let eval = detector().evaluate(
            "this is terrible weather today",
            Language::En,
            &TurnSignals::default(),
        );
        assert!(!eval.escalate);
        assert_eq!(eval.reason, None);
    }

    #[test]
    fn test_frustration_with_intensifier() {
        let eval = detector().evaluate(
            "this is really ridiculous and useless",
            Language::En,
            &TurnSignals::default(),
        );
        assert!(eval.escalate);
        assert_eq!(eval.reason, Some(EscalationReason::Frustration));
        assert!(eval.confidence > 0.7);
    }

    #[test]
    fn test_repetition_alone_stays_below_floor() {
        let eval = detector().evaluate(
            "I already said that",
            Language::En,
            &TurnSignals::default(),
        );
        assert!(!eval.escalate);
    }

    #[test]
    fn test_repeated_failure_heuristic() {
        let eval = detector().evaluate(
            "okay",
            Language::En,
            &TurnSignals {
                consecutive_failed_turns: 3,
            },
        );
        assert!(eval.escalate);
        assert_eq!(eval.reason, Some(EscalationReason::RepeatedFailure));
    }

    #[test]
    fn test_neutral_utterance() {
        let eval = detector().evaluate(
            "I'd like to schedule an appointment for next week",
            Language::En,
            &TurnSignals::default(),
        );
        assert!(!eval.escalate);
        assert_eq!(eval.confidence, 0.0);
    }

    #[test]
    fn test_detection_parity_across_languages() {
        let d = detector();
        let en = d.evaluate(
            "I need to speak to a human now",
            Language::En,
            &TurnSignals::default(),
        );
        let es = d.evaluate(
            "necesito hablar con una persona ahora",
            Language::Es,
            &TurnSignals::default(),
        );
        assert_eq!(en.escalate, es.escalate);
        assert_eq!(en.reason, es.reason);
    }
}

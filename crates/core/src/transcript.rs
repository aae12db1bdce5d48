//! Append-only call transcript

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Language;

/// Who spoke a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    Caller,
    Agent,
}

impl Speaker {
    pub fn label(&self) -> &'static str {
        match self {
            Speaker::Caller => "Caller",
            Speaker::Agent => "Agent",
        }
    }
}

/// One spoken turn in a call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptTurn {
    pub speaker: Speaker,
    pub text: String,
    pub language: Language,
    pub timestamp: DateTime<Utc>,
}

/// Ordered sequence of turns, append-only
///
/// Turns are never mutated or removed after append; the rendering is what
/// gets persisted into the final call record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    turns: Vec<TranscriptTurn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, speaker: Speaker, text: impl Into<String>, language: Language) {
        self.turns.push(TranscriptTurn {
            speaker,
            text: text.into(),
            language,
            timestamp: Utc::now(),
        });
    }

    pub fn turns(&self) -> &[TranscriptTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Most recent `n` turns, oldest first
    pub fn recent(&self, n: usize) -> &[TranscriptTurn] {
        let start = self.turns.len().saturating_sub(n);
        &self.turns[start..]
    }

    /// Plain-text rendering with speaker labels
    pub fn render(&self) -> String {
        let mut out = String::new();
        for turn in &self.turns {
            out.push_str(turn.speaker.label());
            out.push_str(": ");
            out.push_str(&turn.text);
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_render() {
        let mut t = Transcript::new();
        t.append(Speaker::Agent, "Hello!", Language::En);
        t.append(Speaker::Caller, "Hola", Language::Es);

        assert_eq!(t.len(), 2);
        let rendered = t.render();
        assert!(rendered.starts_with("Agent: Hello!\n"));
        assert!(rendered.contains("Caller: Hola\n"));
    }

    #[test]
    fn test_recent_window() {
        let mut t = Transcript::new();
        for i in 0..10 {
            t.append(Speaker::Caller, format!("turn {i}"), Language::En);
        }
        let recent = t.recent(3);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].text, "turn 7");
        assert_eq!(t.recent(100).len(), 10);
    }
}

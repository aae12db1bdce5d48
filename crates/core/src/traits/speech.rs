//! Speech-to-text and text-to-speech interfaces

use async_trait::async_trait;

use crate::traits::telephony::AudioClip;
use crate::{Language, Result};

/// One transcribed caller utterance
#[derive(Debug, Clone)]
pub struct Utterance {
    pub text: String,
    /// Language the provider detected, if it could tell
    pub language: Option<Language>,
    /// Transcription confidence, 0.0 to 1.0
    pub confidence: f32,
}

impl Utterance {
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Speech-to-text interface
#[async_trait]
pub trait SpeechToText: Send + Sync + 'static {
    /// Transcribe a caller utterance.
    ///
    /// `language_hint` carries the session's selected language once known;
    /// providers may use it to bias recognition but may still report a
    /// different detected language.
    async fn transcribe(
        &self,
        audio: &AudioClip,
        language_hint: Option<Language>,
    ) -> Result<Utterance>;
}

/// Text-to-speech interface
#[async_trait]
pub trait TextToSpeech: Send + Sync + 'static {
    /// Synthesize a system utterance in the given language
    async fn synthesize(&self, text: &str, language: Language) -> Result<AudioClip>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedStt;

    #[async_trait]
    impl SpeechToText for FixedStt {
        async fn transcribe(
            &self,
            _audio: &AudioClip,
            language_hint: Option<Language>,
        ) -> Result<Utterance> {
            Ok(Utterance {
                text: "hello".to_string(),
                language: language_hint.or(Some(Language::En)),
                confidence: 0.92,
            })
        }
    }

    #[tokio::test]
    async fn test_trait_object_usage() {
        let stt: Box<dyn SpeechToText> = Box::new(FixedStt);
        let utterance = stt
            .transcribe(&AudioClip::default(), Some(Language::Es))
            .await
            .unwrap();
        assert_eq!(utterance.language, Some(Language::Es));
        assert!(!utterance.is_empty());
    }
}

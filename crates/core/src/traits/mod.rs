//! Provider capability traits
//!
//! Each external collaborator (telephony, speech, model, storage,
//! notifications) is a capability interface with one production variant and
//! one deterministic test-double variant. The orchestration core only ever
//! references these traits, never a concrete provider.

mod model;
mod notify;
mod speech;
mod store;
mod telephony;

pub use model::LanguageModel;
pub use notify::{DeliveryStatus, NotificationPayload, Notifier};
pub use speech::{SpeechToText, TextToSpeech, Utterance};
pub use store::CallStore;
pub use telephony::{AudioClip, CallEvent, CallInput, Telephony, TransferOutcome};

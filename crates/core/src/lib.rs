//! Core types and traits for the frontdesk call orchestrator
//!
//! This crate provides the foundational pieces used across all other crates:
//! - Provider traits for pluggable backends (telephony, STT, TTS, LLM,
//!   storage, notifications)
//! - Durable record shapes (call records, callback tasks)
//! - Conversation types (transcript, model messages, proposed actions)
//! - Error types

pub mod error;
pub mod language;
pub mod llm;
pub mod records;
pub mod traits;
pub mod transcript;

pub use error::{Error, Result, StorageError};
pub use language::Language;
pub use llm::{ChatMessage, ModelReply, ProposedAction, Role, TokenUsage, ToolSpec};
pub use records::{
    CallOutcome, CallRecord, CallRecordPatch, CallState, CallbackTask, CollectedFields,
    CustomerType, NewCallRecord, NewCallbackTask, TaskPriority, TaskStatus, UsageCounters,
};
pub use transcript::{Speaker, Transcript, TranscriptTurn};

pub use traits::{
    AudioClip, CallEvent, CallInput, CallStore, DeliveryStatus, LanguageModel, Notifier,
    NotificationPayload, SpeechToText, Telephony, TextToSpeech, TransferOutcome, Utterance,
};

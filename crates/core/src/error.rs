//! Error types shared across the orchestrator

use thiserror::Error;
use uuid::Uuid;

use crate::records::CallState;

/// Errors returned by the storage interface
///
/// Each storage call is atomic from the orchestrator's perspective;
/// partial-write recovery is the storage layer's problem.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("call record not found: {0}")]
    CallNotFound(Uuid),

    #[error("an open callback task already exists for call {0}")]
    DuplicateOpenTask(Uuid),

    #[error("status regression rejected for call {call_id}: {from} -> {to}")]
    StatusRegression {
        call_id: Uuid,
        from: CallState,
        to: CallState,
    },

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Top-level error type for provider and orchestration failures
#[derive(Error, Debug)]
pub enum Error {
    #[error("telephony error: {0}")]
    Telephony(String),

    #[error("speech-to-text error: {0}")]
    Stt(String),

    #[error("text-to-speech error: {0}")]
    Tts(String),

    #[error("language model error: {0}")]
    Model(String),

    #[error("notification error: {0}")]
    Notify(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

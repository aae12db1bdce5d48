//! Telephony transport interface

use async_trait::async_trait;
use std::time::Duration;

use crate::Result;

/// Opaque audio payload exchanged with the telephony transport
///
/// The orchestrator never inspects audio content; it only moves clips
/// between the transport and the speech interfaces and accounts duration.
#[derive(Debug, Clone, Default)]
pub struct AudioClip {
    pub bytes: Vec<u8>,
    pub duration_secs: f64,
}

impl AudioClip {
    pub fn new(bytes: Vec<u8>, duration_secs: f64) -> Self {
        Self {
            bytes,
            duration_secs,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Result of a live-transfer attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// Caller is bridged to the target; the session should end as transferred
    Bridged,
    /// Target line was busy
    Busy,
    /// Target did not pick up within the provider's ring window
    NoAnswer,
    /// Provider-side failure
    Failed(String),
}

impl TransferOutcome {
    pub fn bridged(&self) -> bool {
        matches!(self, TransferOutcome::Bridged)
    }
}

/// Inbound call event delivered to the session supervisor
#[derive(Debug, Clone)]
pub enum CallEvent {
    /// The call ended outside the orchestrator's control (caller hangup,
    /// carrier drop). The supervisor must force the session to a terminal
    /// state immediately.
    Ended { reason: String },
}

/// What `collect_utterance` resolved to: caller audio, or an event that
/// pre-empts the turn
#[derive(Debug, Clone)]
pub enum CallInput {
    Utterance(AudioClip),
    Event(CallEvent),
}

/// Telephony transport interface
///
/// One instance is bound to one call. All methods suspend only the owning
/// session's worker.
#[async_trait]
pub trait Telephony: Send + Sync + 'static {
    /// Answer the inbound call
    async fn answer(&self) -> Result<()>;

    /// Play synthesized audio to the caller
    async fn play(&self, audio: &AudioClip) -> Result<()>;

    /// Block until the caller finishes an utterance, or until the call
    /// ends out from under us
    async fn collect_utterance(&self) -> Result<CallInput>;

    /// Attempt to bridge the caller to a staff target, waiting at most
    /// `timeout`. Implementations should resolve with a non-bridged outcome
    /// rather than hanging past the bound.
    async fn transfer(&self, target: &str, timeout: Duration) -> Result<TransferOutcome>;

    /// Tell the provider to abandon an in-flight transfer attempt.
    ///
    /// Called when the orchestrator's own bounded wait elapses, so a late
    /// bridge success cannot double-commit the session's outcome.
    async fn abandon_transfer(&self) -> Result<()>;

    /// Terminate the call
    async fn hangup(&self) -> Result<()>;
}

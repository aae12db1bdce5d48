//! In-memory state of one active call
//!
//! A `CallSession` is owned exclusively by its supervisor's worker for
//! the duration of the call, so there is no interior locking. Everything
//! that must survive the call lives in the call record; the session is
//! the working copy plus orchestration-only state (blocked fields, retry
//! counters, the escalation latch).

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use frontdesk_config::GuardrailConfig;
use frontdesk_core::{
    CallOutcome, CallRecordPatch, CallState, CollectedFields, CustomerType, Language, Speaker,
    Transcript, UsageCounters,
};
use frontdesk_tools::{RecordUpdate, ValidationContext};

use crate::escalation::EscalationReason;
use crate::state_machine::{GuardFacts, StateMachine};

/// The escalation latch, once set never cleared
#[derive(Debug, Clone, Copy)]
pub struct EscalationMark {
    pub reason: EscalationReason,
    pub confidence: f32,
    pub at: DateTime<Utc>,
}

/// Per-turn bookkeeping for the reporting layer: what was said, which
/// actions were applied, and how long each provider took.
#[derive(Debug, Clone)]
pub struct TurnRecord {
    pub state: CallState,
    pub caller_text: Option<String>,
    pub agent_text: Option<String>,
    pub applied_actions: Vec<String>,
    pub stt_ms: Option<u64>,
    pub model_ms: Option<u64>,
    pub tts_ms: Option<u64>,
    pub failed: bool,
}

impl TurnRecord {
    pub fn new(state: CallState) -> Self {
        Self {
            state,
            caller_text: None,
            agent_text: None,
            applied_actions: Vec::new(),
            stt_ms: None,
            model_ms: None,
            tts_ms: None,
            failed: false,
        }
    }
}

/// Working state of one call
pub struct CallSession {
    pub record_id: Uuid,
    pub from_number: String,
    pub started_at: DateTime<Utc>,
    pub machine: StateMachine,
    pub language: Option<Language>,
    pub default_language: Language,
    pub customer_type: CustomerType,
    pub intent: Option<String>,
    pub summary: Option<String>,
    pub fields: CollectedFields,
    pub transcript: Transcript,
    pub usage: UsageCounters,
    pub disclosure_played: bool,
    pub blocked_fields: HashSet<String>,
    pub consecutive_failed_turns: u32,
    pub turns: usize,
    pub turn_log: Vec<TurnRecord>,
    escalation: Option<EscalationMark>,
    outcome: Option<CallOutcome>,
}

impl CallSession {
    pub fn new(record_id: Uuid, from_number: impl Into<String>, default_language: Language) -> Self {
        Self {
            record_id,
            from_number: from_number.into(),
            started_at: Utc::now(),
            machine: StateMachine::new(),
            language: None,
            default_language,
            customer_type: CustomerType::Unknown,
            intent: None,
            summary: None,
            fields: CollectedFields::default(),
            transcript: Transcript::new(),
            usage: UsageCounters::default(),
            disclosure_played: false,
            blocked_fields: HashSet::new(),
            consecutive_failed_turns: 0,
            turns: 0,
            turn_log: Vec::new(),
            escalation: None,
            outcome: None,
        }
    }

    pub fn state(&self) -> CallState {
        self.machine.current()
    }

    /// Selected language, or the configured default until one is chosen
    pub fn effective_language(&self) -> Language {
        self.language.unwrap_or(self.default_language)
    }

    /// Latch escalation. Returns true only the first time; later calls
    /// leave the original reason in place.
    pub fn escalate(&mut self, reason: EscalationReason, confidence: f32) -> bool {
        if self.escalation.is_some() {
            return false;
        }
        self.escalation = Some(EscalationMark {
            reason,
            confidence,
            at: Utc::now(),
        });
        tracing::info!(
            call_id = %self.record_id,
            reason = reason.as_str(),
            confidence,
            "session escalated"
        );
        true
    }

    pub fn escalation(&self) -> Option<&EscalationMark> {
        self.escalation.as_ref()
    }

    pub fn is_escalated(&self) -> bool {
        self.escalation.is_some()
    }

    /// Record the terminal outcome; the first write wins
    pub fn set_outcome(&mut self, outcome: CallOutcome) {
        if self.outcome.is_none() {
            self.outcome = Some(outcome);
        }
    }

    pub fn outcome(&self) -> Option<CallOutcome> {
        self.outcome
    }

    pub fn guard_facts(&self) -> GuardFacts {
        GuardFacts {
            language_resolved: self.language.is_some(),
            callback_number_present: self.fields.callback_number.is_some(),
        }
    }

    pub fn validation_context<'a>(
        &'a self,
        guardrails: &'a GuardrailConfig,
    ) -> ValidationContext<'a> {
        ValidationContext {
            state: self.state(),
            disclosure_played: self.disclosure_played,
            blocked_fields: &self.blocked_fields,
            guardrails,
        }
    }

    pub fn append_caller(&mut self, text: impl Into<String>, language: Language) {
        self.transcript.append(Speaker::Caller, text, language);
    }

    pub fn append_agent(&mut self, text: impl Into<String>, language: Language) {
        self.transcript.append(Speaker::Agent, text, language);
    }

    /// Merge a validated record update into the session; the returned
    /// patch is what gets written through to storage for the same effect.
    pub fn apply_update(&mut self, update: &RecordUpdate) -> CallRecordPatch {
        if let Some(language) = update.language {
            self.language = Some(language);
        }
        if let Some(customer_type) = update.customer_type {
            self.customer_type = customer_type;
        }
        if let Some(intent) = &update.intent {
            self.intent = Some(intent.clone());
        }
        if let Some(summary) = &update.summary {
            self.summary = Some(summary.clone());
        }
        self.fields.merge(&update.fields);

        CallRecordPatch {
            language: update.language,
            customer_type: update.customer_type,
            intent: update.intent.clone(),
            summary: update.summary.clone(),
            fields: Some(update.fields.clone()),
            ..Default::default()
        }
    }

    pub fn record_failed_turn(&mut self) {
        self.consecutive_failed_turns += 1;
    }

    pub fn record_clean_turn(&mut self) {
        self.consecutive_failed_turns = 0;
    }

    /// Final patch written exactly once at session close
    pub fn final_patch(&self) -> CallRecordPatch {
        CallRecordPatch {
            language: self.language,
            customer_type: Some(self.customer_type),
            intent: self.intent.clone(),
            status: Some(self.state()),
            outcome: self.outcome,
            fields: Some(self.fields.clone()),
            summary: self.summary.clone(),
            transcript: Some(self.transcript.render()),
            usage: Some(self.usage),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> CallSession {
        CallSession::new(Uuid::new_v4(), "+15550001111", Language::En)
    }

    #[test]
    fn test_escalation_is_sticky() {
        let mut s = session();
        assert!(s.escalate(EscalationReason::ExplicitHumanRequest, 0.85));
        assert!(!s.escalate(EscalationReason::Frustration, 0.99));
        assert_eq!(
            s.escalation().map(|e| e.reason),
            Some(EscalationReason::ExplicitHumanRequest)
        );
    }

    #[test]
    fn test_outcome_first_write_wins() {
        let mut s = session();
        s.set_outcome(CallOutcome::Transferred);
        s.set_outcome(CallOutcome::Error);
        assert_eq!(s.outcome(), Some(CallOutcome::Transferred));
    }

    #[test]
    fn test_effective_language_falls_back_to_default() {
        let mut s = session();
        assert_eq!(s.effective_language(), Language::En);
        s.language = Some(Language::Es);
        assert_eq!(s.effective_language(), Language::Es);
    }

    #[test]
    fn test_apply_update_merges_and_patches() {
        let mut s = session();
        let update = RecordUpdate {
            language: Some(Language::Es),
            intent: Some("reschedule appointment".into()),
            fields: CollectedFields {
                name: Some("Ana".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        let patch = s.apply_update(&update);
        assert_eq!(s.language, Some(Language::Es));
        assert_eq!(s.fields.name.as_deref(), Some("Ana"));
        assert_eq!(patch.intent.as_deref(), Some("reschedule appointment"));
        assert!(patch.status.is_none());
    }

    #[test]
    fn test_guard_facts_track_session() {
        let mut s = session();
        assert!(!s.guard_facts().language_resolved);
        s.language = Some(Language::En);
        s.fields.callback_number = Some("+15551234567".into());
        let facts = s.guard_facts();
        assert!(facts.language_resolved);
        assert!(facts.callback_number_present);
    }
}

//! Per-call session supervision
//!
//! `CallSupervisor::run_call` owns one call end to end: answer, open the
//! record, drive dialog turns, coordinate transfer or fallback, and
//! finalize. Every exit path, including caller hangup and unrecoverable
//! faults, flushes a final record patch and hangs up; no call ends
//! without a persisted record.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use frontdesk_config::{EscalationThresholds, GuardrailConfig, Settings, TriggerLexicon};
use frontdesk_core::traits::{
    CallStore, LanguageModel, Notifier, SpeechToText, Telephony, TextToSpeech,
};
use frontdesk_core::{
    CallOutcome, CallRecord, CallRecordPatch, CallState, NewCallRecord, NewCallbackTask,
    NotificationPayload, Result, TaskPriority,
};

use crate::escalation::EscalationDetector;
use crate::prompts;
use crate::session::CallSession;
use crate::transfer::TransferCoordinator;
use crate::turn_loop::{DialogLoop, TurnOutcome};
use crate::state_machine::TransitionTrigger;

/// Provider handles bound to one deployment
#[derive(Clone)]
pub struct Providers {
    pub telephony: Arc<dyn Telephony>,
    pub stt: Arc<dyn SpeechToText>,
    pub tts: Arc<dyn TextToSpeech>,
    pub model: Arc<dyn LanguageModel>,
    pub store: Arc<dyn CallStore>,
    pub notifier: Arc<dyn Notifier>,
}

/// Summary of a call currently in flight
#[derive(Debug, Clone)]
pub struct ActiveCall {
    pub from_number: String,
    pub started_at: DateTime<Utc>,
}

/// Active sessions, keyed by call record id
///
/// Sessions share nothing else; this map exists for the reporting layer
/// and shutdown accounting.
#[derive(Default)]
pub struct SessionRegistry {
    calls: DashMap<Uuid, ActiveCall>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self, call_id: Uuid, from_number: &str) {
        self.calls.insert(
            call_id,
            ActiveCall {
                from_number: from_number.to_string(),
                started_at: Utc::now(),
            },
        );
    }

    fn deregister(&self, call_id: Uuid) {
        self.calls.remove(&call_id);
    }

    pub fn active_count(&self) -> usize {
        self.calls.len()
    }

    pub fn is_active(&self, call_id: Uuid) -> bool {
        self.calls.contains_key(&call_id)
    }
}

/// Top-level per-call unit
pub struct CallSupervisor {
    providers: Providers,
    dialog: DialogLoop,
    coordinator: TransferCoordinator,
    settings: Settings,
    registry: Arc<SessionRegistry>,
}

impl CallSupervisor {
    pub fn new(
        providers: Providers,
        settings: Settings,
        guardrails: GuardrailConfig,
        lexicon: TriggerLexicon,
        thresholds: EscalationThresholds,
    ) -> Self {
        let detector = Arc::new(EscalationDetector::new(lexicon, thresholds));
        let dialog = DialogLoop::new(
            providers.telephony.clone(),
            providers.stt.clone(),
            providers.tts.clone(),
            providers.model.clone(),
            providers.store.clone(),
            providers.notifier.clone(),
            detector,
            guardrails,
            settings.clone(),
        );
        let coordinator = TransferCoordinator::new(
            providers.telephony.clone(),
            providers.tts.clone(),
            providers.store.clone(),
            providers.notifier.clone(),
            settings.clone(),
        );
        Self {
            providers,
            dialog,
            coordinator,
            settings,
            registry: Arc::new(SessionRegistry::new()),
        }
    }

    pub fn registry(&self) -> Arc<SessionRegistry> {
        self.registry.clone()
    }

    /// Handle one inbound call from answer to terminal outcome.
    ///
    /// Returns the finalized call record.
    pub async fn run_call(&self, from_number: &str) -> Result<CallRecord> {
        self.providers.telephony.answer().await?;

        let record = self
            .providers
            .store
            .create_call_record(NewCallRecord {
                from_number: from_number.to_string(),
                ..Default::default()
            })
            .await?;
        let mut session =
            CallSession::new(record.id, from_number, self.settings.default_language);
        self.registry.register(record.id, from_number);
        tracing::info!(call_id = %record.id, from_number, "call session started");

        if let Err(err) = self.drive(&mut session).await {
            tracing::error!(call_id = %session.record_id, error = %err, "unrecoverable session fault");
            session.set_outcome(CallOutcome::Error);
            self.best_effort_fallback(&session).await;
        }

        // Finalize exactly once, on every exit path
        if session.outcome().is_none() {
            session.set_outcome(CallOutcome::Completed);
        }
        session.machine.force_end(TransitionTrigger::Degradation);
        if let Err(err) = self
            .providers
            .store
            .update_call_record(session.record_id, session.final_patch())
            .await
        {
            tracing::error!(call_id = %session.record_id, error = %err, "final record flush failed");
        }
        if let Err(err) = self.providers.telephony.hangup().await {
            tracing::debug!(call_id = %session.record_id, error = %err, "hangup failed");
        }
        self.registry.deregister(session.record_id);
        tracing::info!(
            call_id = %session.record_id,
            outcome = ?session.outcome(),
            turns = session.turns,
            "call session finished"
        );

        self.providers.store.get_call_record(record.id).await.map_err(Into::into)
    }

    async fn drive(&self, session: &mut CallSession) -> Result<()> {
        let facts = session.guard_facts();
        if let Err(err) =
            session
                .machine
                .transition(CallState::Greet, TransitionTrigger::DialogFlow, &facts)
        {
            tracing::error!(call_id = %session.record_id, error = %err, "could not enter greet");
        }
        if let Err(err) = self
            .providers
            .store
            .update_call_record(
                session.record_id,
                CallRecordPatch {
                    status: Some(session.state()),
                    ..Default::default()
                },
            )
            .await
        {
            tracing::warn!(call_id = %session.record_id, error = %err, "status flush failed");
        }

        // Greeting carries the mandatory AI disclosure
        let greeting =
            prompts::greeting(session.effective_language(), &self.settings.business_name);
        self.dialog.speak(session, &greeting).await;
        session.disclosure_played = true;

        let started = tokio::time::Instant::now();
        let max_duration = Duration::from_secs(self.settings.limits.max_duration_secs);

        while !session.machine.is_terminal() && session.state() != CallState::TransferOrWrapup {
            if session.turns >= self.settings.limits.max_turns
                || started.elapsed() >= max_duration
            {
                tracing::info!(call_id = %session.record_id, turns = session.turns, "session limit reached, wrapping up");
                let _ = session.machine.force_wrapup(TransitionTrigger::Degradation);
                break;
            }

            match self.dialog.run_turn(session).await? {
                TurnOutcome::Continue => {}
                TurnOutcome::Escalated | TurnOutcome::TransferRequested => {
                    self.coordinator.resolve(session).await?;
                    break;
                }
                TurnOutcome::CallerGone { reason } => {
                    tracing::info!(call_id = %session.record_id, reason, "caller gone mid-call");
                    session.set_outcome(CallOutcome::Abandoned);
                    session.machine.force_end(TransitionTrigger::Hangup);
                    return Ok(());
                }
            }
        }

        if session.machine.is_terminal() {
            return Ok(());
        }

        // TransferOrWrapup: one closing turn so the model can hand off or
        // wrap up. Skipped when a limit or fault degraded the session here,
        // or when the call is already resolved.
        let degraded = matches!(
            session.machine.log().last().map(|t| t.trigger),
            Some(TransitionTrigger::Degradation)
        );
        if session.outcome().is_none() && !session.is_escalated() && !degraded {
            match self.dialog.run_turn(session).await? {
                TurnOutcome::Continue => {}
                TurnOutcome::Escalated | TurnOutcome::TransferRequested => {
                    self.coordinator.resolve(session).await?;
                }
                TurnOutcome::CallerGone { reason } => {
                    tracing::info!(call_id = %session.record_id, reason, "caller gone during wrapup");
                    session.set_outcome(CallOutcome::Abandoned);
                    session.machine.force_end(TransitionTrigger::Hangup);
                    return Ok(());
                }
            }
        }
        if session.machine.is_terminal() {
            return Ok(());
        }

        if session.is_escalated() && session.outcome().is_none() {
            self.coordinator.resolve(session).await?;
        }
        if session.outcome() != Some(CallOutcome::Transferred) {
            let goodbye = prompts::state_prompt(
                CallState::End,
                session.effective_language(),
                &self.settings.business_name,
            );
            self.dialog.speak(session, &goodbye).await;
        }
        if session.outcome().is_none() {
            session.set_outcome(CallOutcome::Completed);
        }

        let facts = session.guard_facts();
        if let Err(err) =
            session
                .machine
                .transition(CallState::End, TransitionTrigger::DialogFlow, &facts)
        {
            tracing::error!(call_id = %session.record_id, error = %err, "could not enter end state");
        }
        Ok(())
    }

    /// Error-path degradation: whatever was collected still becomes a
    /// callback task, and staff hear about the fault.
    async fn best_effort_fallback(&self, session: &CallSession) {
        match self
            .providers
            .store
            .get_open_callback_task(session.record_id)
            .await
        {
            Ok(Some(_)) => {}
            Ok(None) => {
                let new = NewCallbackTask {
                    call_id: session.record_id,
                    priority: TaskPriority::High,
                    name: session.fields.name.clone(),
                    callback_number: session
                        .fields
                        .callback_number
                        .clone()
                        .unwrap_or_else(|| session.from_number.clone()),
                    best_time_window: session.fields.best_time_window.clone(),
                    notes: Some("call ended in error".to_string()),
                };
                if let Err(err) = self.providers.store.create_callback_task(new).await {
                    tracing::warn!(call_id = %session.record_id, error = %err, "best-effort callback task failed");
                }
            }
            Err(err) => {
                tracing::warn!(call_id = %session.record_id, error = %err, "open-task lookup failed");
            }
        }

        if let Some(target) = &self.settings.staff_notify_target {
            let payload = NotificationPayload {
                call_id: session.record_id,
                subject: "Call ended in error".to_string(),
                body: format!(
                    "Call from {} hit an unrecoverable fault; please follow up.",
                    session.from_number
                ),
                priority: TaskPriority::High,
            };
            if let Err(err) = self.providers.notifier.notify(target, &payload).await {
                tracing::warn!(call_id = %session.record_id, error = %err, "error notification failed");
            }
        }
    }
}

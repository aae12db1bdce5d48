//! Transfer/fallback coordination
//!
//! Resolves an escalated or wrapup-bound session exactly once: try a live
//! bridge to staff inside a bounded wait, and on any failure degrade to a
//! priority callback task plus a staff notification. Invoking it again
//! for the same session observes the open task and is a no-op.
//!
//! The bounded wait is cooperative: when our own timer fires first, the
//! provider is told to abandon the attempt so a late bridge success
//! cannot double-commit the outcome.

use std::sync::Arc;
use std::time::Duration;

use frontdesk_config::Settings;
use frontdesk_core::traits::{CallStore, Notifier, Telephony, TextToSpeech};
use frontdesk_core::{
    CallOutcome, CallRecordPatch, NewCallbackTask, NotificationPayload, Result, StorageError,
    TaskPriority,
};

use crate::prompts;
use crate::session::CallSession;

/// How the coordinator resolved the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Caller was bridged to staff
    Transferred,
    /// Fallback callback task was created
    CallbackCreated,
    /// A previous invocation already resolved this session
    AlreadyResolved,
}

pub struct TransferCoordinator {
    telephony: Arc<dyn Telephony>,
    tts: Arc<dyn TextToSpeech>,
    store: Arc<dyn CallStore>,
    notifier: Arc<dyn Notifier>,
    settings: Settings,
}

impl TransferCoordinator {
    pub fn new(
        telephony: Arc<dyn Telephony>,
        tts: Arc<dyn TextToSpeech>,
        store: Arc<dyn CallStore>,
        notifier: Arc<dyn Notifier>,
        settings: Settings,
    ) -> Self {
        Self {
            telephony,
            tts,
            store,
            notifier,
            settings,
        }
    }

    /// Resolve the session: live transfer, or callback fallback
    pub async fn resolve(&self, session: &mut CallSession) -> Result<Resolution> {
        if session.outcome() == Some(CallOutcome::Transferred) {
            return Ok(Resolution::AlreadyResolved);
        }
        if self
            .store
            .get_open_callback_task(session.record_id)
            .await?
            .is_some()
        {
            tracing::info!(call_id = %session.record_id, "callback task already open, nothing to do");
            return Ok(Resolution::AlreadyResolved);
        }

        if let Some(target) = self.settings.transfer.target.clone() {
            if self.attempt_transfer(session, &target).await {
                session.set_outcome(CallOutcome::Transferred);
                self.persist_outcome(session).await?;
                return Ok(Resolution::Transferred);
            }
        } else {
            tracing::info!(call_id = %session.record_id, "no transfer target configured, going straight to callback");
        }

        self.create_fallback_task(session).await?;
        session.set_outcome(CallOutcome::CallbackCreated);
        self.persist_outcome(session).await?;
        self.speak(session, prompts::transfer_fallback(session.effective_language()))
            .await;
        self.notify_staff(session).await;
        Ok(Resolution::CallbackCreated)
    }

    /// True if the caller was bridged within the bounded wait
    async fn attempt_transfer(&self, session: &mut CallSession, target: &str) -> bool {
        self.speak(session, prompts::transfer_wait(session.effective_language()))
            .await;

        let bound = Duration::from_secs(self.settings.transfer.timeout_secs);
        match tokio::time::timeout(bound, self.telephony.transfer(target, bound)).await {
            Ok(Ok(outcome)) if outcome.bridged() => {
                tracing::info!(call_id = %session.record_id, target, "caller bridged to staff");
                true
            }
            Ok(Ok(outcome)) => {
                tracing::info!(call_id = %session.record_id, ?outcome, "transfer not bridged");
                false
            }
            Ok(Err(err)) => {
                tracing::warn!(call_id = %session.record_id, error = %err, "transfer attempt failed");
                false
            }
            Err(_) => {
                tracing::warn!(call_id = %session.record_id, "transfer wait elapsed, abandoning attempt");
                if let Err(err) = self.telephony.abandon_transfer().await {
                    tracing::warn!(call_id = %session.record_id, error = %err, "abandon request failed");
                }
                false
            }
        }
    }

    async fn create_fallback_task(&self, session: &CallSession) -> Result<()> {
        let priority = self.fallback_priority(session);
        let callback_number = session
            .fields
            .callback_number
            .clone()
            .unwrap_or_else(|| session.from_number.clone());

        let new = NewCallbackTask {
            call_id: session.record_id,
            priority,
            name: session.fields.name.clone(),
            callback_number,
            best_time_window: session.fields.best_time_window.clone(),
            notes: session
                .escalation()
                .map(|mark| format!("escalated: {}", mark.reason.as_str())),
        };
        match self.store.create_callback_task(new).await {
            Ok(task) => {
                tracing::info!(
                    call_id = %session.record_id,
                    task_id = %task.id,
                    priority = ?task.priority,
                    "fallback callback task created"
                );
                Ok(())
            }
            // Lost a race with a duplicate trigger; still resolved
            Err(StorageError::DuplicateOpenTask(_)) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Escalation elevates the fallback priority; emergencies go urgent
    fn fallback_priority(&self, session: &CallSession) -> TaskPriority {
        match session.escalation() {
            Some(mark) if mark.reason.is_emergency() => TaskPriority::Urgent,
            _ => TaskPriority::High,
        }
    }

    async fn notify_staff(&self, session: &CallSession) {
        let Some(target) = &self.settings.staff_notify_target else {
            return;
        };
        let reason = session
            .escalation()
            .map(|mark| mark.reason.as_str())
            .unwrap_or("wrapup");
        let payload = NotificationPayload {
            call_id: session.record_id,
            subject: format!("Callback needed ({reason})"),
            body: format!(
                "Caller {} needs a callback. Name: {}. Reason: {}.",
                session.from_number,
                session.fields.name.as_deref().unwrap_or("unknown"),
                session.intent.as_deref().unwrap_or("not captured"),
            ),
            priority: self.fallback_priority(session),
        };
        match self.notifier.notify(target, &payload).await {
            Ok(status) => {
                tracing::info!(call_id = %session.record_id, ?status, "staff notified");
            }
            Err(err) => {
                tracing::warn!(call_id = %session.record_id, error = %err, "staff notification failed");
            }
        }
    }

    async fn persist_outcome(&self, session: &CallSession) -> Result<()> {
        let patch = CallRecordPatch {
            outcome: session.outcome(),
            ..Default::default()
        };
        self.store
            .update_call_record(session.record_id, patch)
            .await?;
        Ok(())
    }

    async fn speak(&self, session: &mut CallSession, text: &str) {
        let language = session.effective_language();
        match self.tts.synthesize(text, language).await {
            Ok(audio) => {
                session.usage.add_speech_seconds(audio.duration_secs);
                if let Err(err) = self.telephony.play(&audio).await {
                    tracing::warn!(call_id = %session.record_id, error = %err, "audio playback failed");
                }
            }
            Err(err) => {
                tracing::warn!(call_id = %session.record_id, error = %err, "speech synthesis failed");
            }
        }
        session.append_agent(text, language);
    }
}

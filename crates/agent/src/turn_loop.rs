//! Dialog turn loop
//!
//! One `run_turn` call is one request/response cycle: collect the caller's
//! utterance, check escalation, ask the model, validate and apply its
//! proposed actions in order, speak the reply, advance state. Provider
//! failures degrade the turn (apology or scripted prompt), they never
//! abort the call from here.
//!
//! The action-retry budget is one per turn: a structural rejection
//! re-prompts the model once with the reason; if the second batch also
//! fails validation the turn falls back to the scripted prompt for the
//! current state.

use std::sync::Arc;
use std::time::Duration;

use frontdesk_config::{GuardrailConfig, Settings};
use frontdesk_core::traits::{
    CallEvent, CallInput, CallStore, LanguageModel, Notifier, SpeechToText, Telephony,
    TextToSpeech,
};
use frontdesk_core::{
    CallRecordPatch, CallState, ChatMessage, Language, ModelReply, NotificationPayload, Result,
    StorageError, Utterance,
};
use frontdesk_tools::{
    specs_for_state, validate, CallbackRequest, NotificationRequest, RejectionKind,
    ValidatedAction,
};

use crate::escalation::{EscalationDetector, TurnSignals};
use crate::prompts;
use crate::session::{CallSession, TurnRecord};
use crate::state_machine::{inactivity_timeout, TransitionError, TransitionTrigger};

/// Transcript turns fed back to the model each turn
const CONTEXT_WINDOW_TURNS: usize = 12;

/// How one turn ended, from the supervisor's point of view
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Keep looping
    Continue,
    /// The detector fired; coordinate transfer or fallback
    Escalated,
    /// The model requested a live transfer during wrapup
    TransferRequested,
    /// The caller is gone; finalize as abandoned
    CallerGone { reason: String },
}

/// Signal from applying one validated action
enum EffectSignal {
    None,
    TransferRequested,
}

/// Runs dialog turns for one session
///
/// Shares read-only configuration and provider handles; all mutable call
/// state lives on the `CallSession` passed into each turn.
pub struct DialogLoop {
    telephony: Arc<dyn Telephony>,
    stt: Arc<dyn SpeechToText>,
    tts: Arc<dyn TextToSpeech>,
    model: Arc<dyn LanguageModel>,
    store: Arc<dyn CallStore>,
    notifier: Arc<dyn Notifier>,
    detector: Arc<EscalationDetector>,
    guardrails: GuardrailConfig,
    settings: Settings,
}

impl DialogLoop {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        telephony: Arc<dyn Telephony>,
        stt: Arc<dyn SpeechToText>,
        tts: Arc<dyn TextToSpeech>,
        model: Arc<dyn LanguageModel>,
        store: Arc<dyn CallStore>,
        notifier: Arc<dyn Notifier>,
        detector: Arc<EscalationDetector>,
        guardrails: GuardrailConfig,
        settings: Settings,
    ) -> Self {
        Self {
            telephony,
            stt,
            tts,
            model,
            store,
            notifier,
            detector,
            guardrails,
            settings,
        }
    }

    /// Run one dialog turn
    pub async fn run_turn(&self, session: &mut CallSession) -> Result<TurnOutcome> {
        session.turns += 1;
        let mut turn = TurnRecord::new(session.state());
        let outcome = self.turn_inner(session, &mut turn).await;
        session.turn_log.push(turn);
        outcome
    }

    async fn turn_inner(
        &self,
        session: &mut CallSession,
        turn: &mut TurnRecord,
    ) -> Result<TurnOutcome> {
        let language = session.effective_language();
        let Some((window, timeout_target)) = inactivity_timeout(session.state()) else {
            return Ok(TurnOutcome::Continue);
        };

        let audio = match tokio::time::timeout(window, self.telephony.collect_utterance()).await {
            Ok(collected) => match collected? {
                CallInput::Utterance(audio) => audio,
                CallInput::Event(CallEvent::Ended { reason }) => {
                    return Ok(TurnOutcome::CallerGone { reason });
                }
            },
            Err(_) => return self.handle_silence(session, turn, timeout_target).await,
        };
        session.usage.add_speech_seconds(audio.duration_secs);

        let stt_started = tokio::time::Instant::now();
        let utterance = match self.transcribe_with_retry(&audio, session.language).await {
            Some(utterance) => {
                turn.stt_ms = Some(stt_started.elapsed().as_millis() as u64);
                utterance
            }
            None => {
                // Both attempts failed; apologize and count the turn failed
                turn.failed = true;
                session.record_failed_turn();
                turn.agent_text = Some(prompts::apology(language).to_string());
                turn.tts_ms = self.speak(session, prompts::apology(language)).await;
                return Ok(TurnOutcome::Continue);
            }
        };

        if utterance.is_empty() {
            turn.failed = true;
            session.record_failed_turn();
            let prompt = prompts::state_prompt(
                session.state(),
                language,
                &self.settings.business_name,
            );
            turn.agent_text = Some(prompt.clone());
            turn.tts_ms = self.speak(session, &prompt).await;
            return Ok(TurnOutcome::Continue);
        }

        let spoken_language = utterance.language.unwrap_or(language);
        turn.caller_text = Some(utterance.text.clone());
        session.append_caller(utterance.text.clone(), spoken_language);

        let signals = TurnSignals {
            consecutive_failed_turns: session.consecutive_failed_turns,
        };
        let evaluation = self
            .detector
            .evaluate(&utterance.text, spoken_language, &signals);
        if evaluation.escalate {
            if let Some(reason) = evaluation.reason {
                session.escalate(reason, evaluation.confidence);
            }
            if session.machine.force_escalation().is_ok() {
                self.persist_status(session).await?;
            }
            return Ok(TurnOutcome::Escalated);
        }

        let log_len_before = session.machine.log().len();
        let specs = specs_for_state(session.state());
        let messages = prompts::build_context(
            session,
            &self.settings.business_name,
            &specs,
            CONTEXT_WINDOW_TURNS,
        );

        let model_started = tokio::time::Instant::now();
        let reply = match self.model.complete(&messages, &specs).await {
            Ok(reply) => reply,
            Err(err) => {
                tracing::warn!(call_id = %session.record_id, error = %err, "model call failed");
                turn.failed = true;
                session.record_failed_turn();
                let prompt = prompts::state_prompt(
                    session.state(),
                    language,
                    &self.settings.business_name,
                );
                turn.agent_text = Some(prompt.clone());
                turn.tts_ms = self.speak(session, &prompt).await;
                return Ok(TurnOutcome::Continue);
            }
        };
        turn.model_ms = Some(model_started.elapsed().as_millis() as u64);
        session.usage.add_model_tokens(reply.usage.total());

        let (spoken, turn_failed, transfer_requested) =
            self.process_reply(session, turn, reply, &messages, &specs).await?;

        turn.agent_text = Some(spoken.clone());
        turn.tts_ms = self.speak(session, &spoken).await;

        turn.failed = turn_failed;
        if turn_failed {
            session.record_failed_turn();
        } else {
            session.record_clean_turn();
        }

        if transfer_requested {
            return Ok(TurnOutcome::TransferRequested);
        }

        // Advance only if nothing in this turn already moved the machine
        if session.machine.log().len() == log_len_before {
            self.advance(session).await?;
        }
        Ok(TurnOutcome::Continue)
    }

    /// The state's inactivity window elapsed with no caller input. Counts
    /// toward the repeated-failure heuristic, then moves the call to the
    /// state's timeout target. Silence in language selection resolves the
    /// language to the configured default first.
    async fn handle_silence(
        &self,
        session: &mut CallSession,
        turn: &mut TurnRecord,
        target: CallState,
    ) -> Result<TurnOutcome> {
        tracing::info!(
            call_id = %session.record_id,
            state = session.state().as_str(),
            to = target.as_str(),
            "inactivity window elapsed"
        );
        turn.failed = true;
        session.record_failed_turn();
        if session.state() == CallState::LanguageSelect && session.language.is_none() {
            session.language = Some(session.default_language);
        }
        if session.machine.force_timeout(target).is_ok() {
            self.persist_status(session).await?;
        }
        if !session.machine.is_terminal() && session.state() != CallState::TransferOrWrapup {
            let prompt = prompts::state_prompt(
                session.state(),
                session.effective_language(),
                &self.settings.business_name,
            );
            turn.agent_text = Some(prompt.clone());
            turn.tts_ms = self.speak(session, &prompt).await;
        }
        Ok(TurnOutcome::Continue)
    }

    async fn transcribe_with_retry(
        &self,
        audio: &frontdesk_core::AudioClip,
        hint: Option<Language>,
    ) -> Option<Utterance> {
        match self.stt.transcribe(audio, hint).await {
            Ok(utterance) => Some(utterance),
            Err(err) => {
                tracing::warn!(error = %err, "transcription failed, retrying once");
                tokio::time::sleep(Duration::from_millis(self.settings.limits.retry_delay_ms))
                    .await;
                self.stt.transcribe(audio, hint).await.ok()
            }
        }
    }

    /// Validate and apply the reply's actions in order, with the one-retry
    /// budget. Returns (text to speak, whether the turn counts as failed,
    /// whether a transfer was requested).
    async fn process_reply(
        &self,
        session: &mut CallSession,
        turn: &mut TurnRecord,
        reply: ModelReply,
        messages: &[ChatMessage],
        specs: &[frontdesk_core::ToolSpec],
    ) -> Result<(String, bool, bool)> {
        let mut spoken = reply.text.clone();
        let mut turn_failed = false;
        let mut transfer_requested = false;
        let mut pending = reply;
        let mut retried = false;

        loop {
            let mut retry_reason: Option<String> = None;

            for action in &pending.actions {
                let verdict = {
                    let ctx = session.validation_context(&self.guardrails);
                    validate(action, &ctx)
                };
                match verdict {
                    Ok(validated) => {
                        if let EffectSignal::TransferRequested =
                            self.apply_effect(session, validated).await?
                        {
                            transfer_requested = true;
                        }
                        turn.applied_actions.push(action.name.clone());
                    }
                    Err(rejection) => {
                        tracing::info!(
                            call_id = %session.record_id,
                            action = %action.name,
                            reason = %rejection.reason,
                            retryable = rejection.is_retryable(),
                            "action rejected"
                        );
                        if let Some(field) = &rejection.blocked_field {
                            session.blocked_fields.insert(field.clone());
                        }
                        turn_failed = true;
                        if rejection.kind != RejectionKind::Disclosure && !retried {
                            retry_reason = Some(rejection.reason.clone());
                        }
                        // Later actions in a rejected batch are discarded;
                        // the retry re-proposes the whole batch.
                        break;
                    }
                }
            }

            match retry_reason {
                Some(reason) if !retried => {
                    retried = true;
                    let mut retry_messages = messages.to_vec();
                    retry_messages.push(ChatMessage::system(format!(
                        "Your previous action was rejected: {reason}. Correct it, or reply without that action."
                    )));
                    match self.model.complete(&retry_messages, specs).await {
                        Ok(second) => {
                            session.usage.add_model_tokens(second.usage.total());
                            spoken = second.text.clone();
                            pending = second;
                            continue;
                        }
                        Err(err) => {
                            tracing::warn!(
                                call_id = %session.record_id,
                                error = %err,
                                "retry model call failed"
                            );
                            spoken = prompts::state_prompt(
                                session.state(),
                                session.effective_language(),
                                &self.settings.business_name,
                            );
                            break;
                        }
                    }
                }
                Some(_) => {
                    // Second batch failed too; scripted fallback
                    spoken = prompts::state_prompt(
                        session.state(),
                        session.effective_language(),
                        &self.settings.business_name,
                    );
                    break;
                }
                None => break,
            }
        }

        Ok((spoken, turn_failed, transfer_requested))
    }

    async fn apply_effect(
        &self,
        session: &mut CallSession,
        action: ValidatedAction,
    ) -> Result<EffectSignal> {
        match action {
            ValidatedAction::CreateCallRecord(update)
            | ValidatedAction::UpdateCallRecord(update) => {
                let patch = session.apply_update(&update);
                self.store
                    .update_call_record(session.record_id, patch)
                    .await?;
            }
            ValidatedAction::CreateCallbackTask(request) => {
                self.create_callback_task(session, request).await?;
            }
            ValidatedAction::TransferCall(request) => {
                tracing::info!(
                    call_id = %session.record_id,
                    reason = request.reason.as_deref().unwrap_or("unspecified"),
                    "model requested live transfer"
                );
                return Ok(EffectSignal::TransferRequested);
            }
            ValidatedAction::SendNotification(request) => {
                self.dispatch_notification(session, request).await;
            }
        }
        Ok(EffectSignal::None)
    }

    async fn create_callback_task(
        &self,
        session: &mut CallSession,
        request: CallbackRequest,
    ) -> Result<()> {
        // The action itself drives the state forward
        if session.state() == CallState::Confirmation {
            session.fields.callback_number = Some(request.contact_number.clone());
            self.transition(session, CallState::CreateCallbackTask, TransitionTrigger::ActionEffect)
                .await?;
        }

        let new = frontdesk_core::NewCallbackTask {
            call_id: session.record_id,
            priority: request.priority,
            name: request.contact_name.clone().or_else(|| session.fields.name.clone()),
            callback_number: request.contact_number.clone(),
            best_time_window: request
                .best_time_window
                .clone()
                .or_else(|| session.fields.best_time_window.clone()),
            notes: request.notes.clone(),
        };
        match self.store.create_callback_task(new).await {
            Ok(task) => {
                session.set_outcome(frontdesk_core::CallOutcome::CallbackCreated);
                tracing::info!(call_id = %session.record_id, task_id = %task.id, "callback task created");
            }
            Err(StorageError::DuplicateOpenTask(_)) => {
                tracing::info!(call_id = %session.record_id, "open callback task already exists");
            }
            Err(err) => return Err(err.into()),
        }

        session.fields.merge(&frontdesk_core::CollectedFields {
            name: request.contact_name,
            callback_number: Some(request.contact_number),
            best_time_window: request.best_time_window,
            notes: None,
        });

        if session.state() == CallState::CreateCallbackTask {
            self.transition(session, CallState::TransferOrWrapup, TransitionTrigger::ActionEffect)
                .await?;
        }
        Ok(())
    }

    async fn dispatch_notification(&self, session: &CallSession, request: NotificationRequest) {
        let Some(target) = &self.settings.staff_notify_target else {
            tracing::warn!(call_id = %session.record_id, "no staff notification target configured");
            return;
        };
        let payload = NotificationPayload {
            call_id: session.record_id,
            subject: request.subject,
            body: request.body,
            priority: request.priority,
        };
        // Delivery failure never fails the call
        if let Err(err) = self.notifier.notify(target, &payload).await {
            tracing::warn!(call_id = %session.record_id, error = %err, "staff notification failed");
        }
    }

    /// Natural next step once a state's goal is met
    fn suggest_next(&self, session: &CallSession) -> Option<CallState> {
        match session.state() {
            CallState::Greet => Some(CallState::LanguageSelect),
            CallState::LanguageSelect if session.language.is_some() => {
                Some(CallState::ClassifyCustomerType)
            }
            CallState::ClassifyCustomerType
                if session.customer_type != frontdesk_core::CustomerType::Unknown =>
            {
                Some(CallState::IntentDiscovery)
            }
            CallState::IntentDiscovery if session.intent.is_some() => {
                Some(CallState::InfoCollection)
            }
            CallState::InfoCollection
                if session.fields.name.is_some()
                    && session.fields.callback_number.is_some() =>
            {
                Some(CallState::Confirmation)
            }
            _ => None,
        }
    }

    async fn advance(&self, session: &mut CallSession) -> Result<()> {
        let Some(next) = self.suggest_next(session) else {
            return Ok(());
        };
        self.transition(session, next, TransitionTrigger::DialogFlow)
            .await
    }

    /// Transition with graceful degradation on internal faults: an
    /// illegal transition is logged and the session heads toward wrapup
    /// instead of crashing.
    async fn transition(
        &self,
        session: &mut CallSession,
        to: CallState,
        trigger: TransitionTrigger,
    ) -> Result<()> {
        let facts = session.guard_facts();
        match session.machine.transition(to, trigger, &facts) {
            Ok(()) => self.persist_status(session).await,
            Err(TransitionError::GuardFailed { reason, .. }) => {
                tracing::debug!(call_id = %session.record_id, to = to.as_str(), reason, "transition blocked by guard");
                Ok(())
            }
            Err(err) => {
                tracing::error!(call_id = %session.record_id, error = %err, "illegal transition, degrading to wrapup");
                if session.machine.force_wrapup(TransitionTrigger::Degradation).is_ok() {
                    self.persist_status(session).await?;
                }
                Ok(())
            }
        }
    }

    /// Synthesize and play one system utterance, returning the synthesis
    /// latency when it succeeded. Speech failures are logged and
    /// swallowed; the transcript records what we meant to say.
    pub(crate) async fn speak(&self, session: &mut CallSession, text: &str) -> Option<u64> {
        let language = session.effective_language();
        let started = tokio::time::Instant::now();
        let latency = match self.tts.synthesize(text, language).await {
            Ok(audio) => {
                let latency = started.elapsed().as_millis() as u64;
                session.usage.add_speech_seconds(audio.duration_secs);
                if let Err(err) = self.telephony.play(&audio).await {
                    tracing::warn!(call_id = %session.record_id, error = %err, "audio playback failed");
                }
                Some(latency)
            }
            Err(err) => {
                tracing::warn!(call_id = %session.record_id, error = %err, "speech synthesis failed");
                None
            }
        };
        session.append_agent(text, language);
        latency
    }

    async fn persist_status(&self, session: &CallSession) -> Result<()> {
        let patch = CallRecordPatch {
            status: Some(session.machine.furthest()),
            ..Default::default()
        };
        self.store
            .update_call_record(session.record_id, patch)
            .await?;
        Ok(())
    }
}

//! End-to-end orchestration tests against deterministic provider doubles
//!
//! The telephony double scripts the caller's side of the conversation as
//! `lang:text` encoded audio, the speech doubles decode it verbatim, and
//! the model double replays a queue of prepared replies. Storage is the
//! real in-memory backend.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;

use frontdesk_agent::supervisor::{CallSupervisor, Providers};
use frontdesk_agent::transfer::{Resolution, TransferCoordinator};
use frontdesk_agent::turn_loop::{DialogLoop, TurnOutcome};
use frontdesk_agent::{CallSession, EscalationDetector, EscalationReason, TransitionTrigger};
use frontdesk_config::{EscalationThresholds, GuardrailConfig, Settings, TriggerLexicon};
use frontdesk_core::traits::{
    CallEvent, CallInput, CallStore, LanguageModel, Notifier, SpeechToText, Telephony,
    TextToSpeech,
};
use frontdesk_core::{
    AudioClip, CallOutcome, CallState, ChatMessage, DeliveryStatus, Language, ModelReply,
    NotificationPayload, ProposedAction, Result, TaskPriority, ToolSpec, TransferOutcome,
    Utterance,
};
use frontdesk_storage::InMemoryCallStore;

struct ScriptedTelephony {
    inputs: Mutex<VecDeque<Option<CallInput>>>,
    transfer_outcome: TransferOutcome,
    transfer_delay: Duration,
    transfer_calls: AtomicUsize,
    abandon_calls: AtomicUsize,
    hangups: AtomicUsize,
}

impl ScriptedTelephony {
    fn new(inputs: Vec<CallInput>) -> Self {
        Self::with_pauses(inputs.into_iter().map(Some).collect())
    }

    /// `None` entries are scripted silence: collection pends until the
    /// state's inactivity window elapses, and the next turn pops the next
    /// entry.
    fn with_pauses(inputs: Vec<Option<CallInput>>) -> Self {
        Self {
            inputs: Mutex::new(inputs.into()),
            transfer_outcome: TransferOutcome::NoAnswer,
            transfer_delay: Duration::ZERO,
            transfer_calls: AtomicUsize::new(0),
            abandon_calls: AtomicUsize::new(0),
            hangups: AtomicUsize::new(0),
        }
    }

    fn with_transfer(mut self, outcome: TransferOutcome, delay: Duration) -> Self {
        self.transfer_outcome = outcome;
        self.transfer_delay = delay;
        self
    }
}

#[async_trait]
impl Telephony for ScriptedTelephony {
    async fn answer(&self) -> Result<()> {
        Ok(())
    }

    async fn play(&self, _audio: &AudioClip) -> Result<()> {
        Ok(())
    }

    async fn collect_utterance(&self) -> Result<CallInput> {
        let next = self.inputs.lock().pop_front();
        match next {
            Some(Some(input)) => Ok(input),
            Some(None) => std::future::pending::<Result<CallInput>>().await,
            None => Ok(CallInput::Event(CallEvent::Ended {
                reason: "script exhausted".to_string(),
            })),
        }
    }

    async fn transfer(&self, _target: &str, _timeout: Duration) -> Result<TransferOutcome> {
        self.transfer_calls.fetch_add(1, Ordering::SeqCst);
        if !self.transfer_delay.is_zero() {
            tokio::time::sleep(self.transfer_delay).await;
        }
        Ok(self.transfer_outcome.clone())
    }

    async fn abandon_transfer(&self) -> Result<()> {
        self.abandon_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn hangup(&self) -> Result<()> {
        self.hangups.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Decodes the `lang:text` payload the telephony script produced
struct DecodingStt;

#[async_trait]
impl SpeechToText for DecodingStt {
    async fn transcribe(
        &self,
        audio: &AudioClip,
        _language_hint: Option<Language>,
    ) -> Result<Utterance> {
        let payload = String::from_utf8(audio.bytes.clone()).unwrap_or_default();
        let (tag, text) = payload.split_once(':').unwrap_or(("en", payload.as_str()));
        Ok(Utterance {
            text: text.to_string(),
            language: Language::parse(tag),
            confidence: 0.92,
        })
    }
}

struct EchoTts;

#[async_trait]
impl TextToSpeech for EchoTts {
    async fn synthesize(&self, text: &str, _language: Language) -> Result<AudioClip> {
        Ok(AudioClip::new(text.as_bytes().to_vec(), 1.0))
    }
}

struct ScriptedModel {
    replies: Mutex<VecDeque<ModelReply>>,
    calls: AtomicUsize,
}

impl ScriptedModel {
    fn new(replies: Vec<ModelReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: AtomicUsize::new(0),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(
        &self,
        _messages: &[ChatMessage],
        _tools: &[ToolSpec],
    ) -> Result<ModelReply> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| ModelReply::text_only("Okay.")))
    }
}

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<(String, NotificationPayload)>>,
}

impl RecordingNotifier {
    fn count(&self) -> usize {
        self.sent.lock().len()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, target: &str, payload: &NotificationPayload) -> Result<DeliveryStatus> {
        self.sent.lock().push((target.to_string(), payload.clone()));
        Ok(DeliveryStatus::Delivered)
    }
}

fn caller(language: Language, text: &str) -> CallInput {
    CallInput::Utterance(AudioClip::new(
        format!("{}:{}", language.as_str(), text).into_bytes(),
        2.0,
    ))
}

fn reply_with(text: &str, actions: Vec<ProposedAction>) -> ModelReply {
    ModelReply {
        text: text.to_string(),
        actions,
        usage: Default::default(),
    }
}

fn settings() -> Settings {
    Settings {
        business_name: "Rivera Dental".to_string(),
        staff_notify_target: Some("front-desk@rivera.example".to_string()),
        ..Default::default()
    }
}

struct Harness {
    telephony: Arc<ScriptedTelephony>,
    model: Arc<ScriptedModel>,
    store: Arc<InMemoryCallStore>,
    notifier: Arc<RecordingNotifier>,
    supervisor: CallSupervisor,
}

fn harness(
    telephony: ScriptedTelephony,
    model: ScriptedModel,
    settings: Settings,
) -> Harness {
    let telephony = Arc::new(telephony);
    let model = Arc::new(model);
    let store = Arc::new(InMemoryCallStore::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let providers = Providers {
        telephony: telephony.clone(),
        stt: Arc::new(DecodingStt),
        tts: Arc::new(EchoTts),
        model: model.clone(),
        store: store.clone(),
        notifier: notifier.clone(),
    };
    let supervisor = CallSupervisor::new(
        providers,
        settings,
        GuardrailConfig::default(),
        TriggerLexicon::default(),
        EscalationThresholds::default(),
    );
    Harness {
        telephony,
        model,
        store,
        notifier,
        supervisor,
    }
}

#[tokio::test]
async fn spanish_human_request_escalates_to_priority_callback() {
    let telephony = ScriptedTelephony::new(vec![
        caller(Language::En, "hello"),
        caller(Language::Es, "español por favor"),
        caller(Language::Es, "si, soy cliente"),
        caller(Language::Es, "necesito hablar con una persona"),
    ]);
    let model = ScriptedModel::new(vec![
        ModelReply::text_only("Hello! Would you prefer English or Spanish?"),
        reply_with(
            "Perfecto, seguimos en español.",
            vec![ProposedAction::new("update_call_record")
                .with_field("language", json!("es"))],
        ),
        reply_with(
            "Gracias. ¿En qué puedo ayudarle?",
            vec![ProposedAction::new("update_call_record")
                .with_field("customer_type", json!("existing"))],
        ),
    ]);

    let h = harness(telephony, model, settings());
    let record = h.supervisor.run_call("+15550001111").await.unwrap();

    assert_eq!(record.outcome, Some(CallOutcome::CallbackCreated));
    assert_eq!(record.status, CallState::End);
    assert!(record
        .status_history
        .contains(&CallState::TransferOrWrapup));

    let tasks = h.store.tasks_for_call(record.id);
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].priority, TaskPriority::High);
    assert_eq!(tasks[0].callback_number, "+15550001111");
    assert_eq!(
        tasks[0].notes.as_deref(),
        Some("escalated: explicit-human-request")
    );
    // Fallback path notifies staff exactly once
    assert_eq!(h.notifier.count(), 1);
    assert_eq!(h.telephony.transfer_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn emergency_escalation_creates_urgent_callback() {
    let telephony = ScriptedTelephony::new(vec![caller(
        Language::En,
        "this is an emergency, I need someone right now",
    )]);
    let model = ScriptedModel::new(vec![]);

    let h = harness(telephony, model, settings());
    let record = h.supervisor.run_call("+15550002222").await.unwrap();

    assert_eq!(record.outcome, Some(CallOutcome::CallbackCreated));
    let task = h
        .store
        .get_open_callback_task(record.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(task.priority, TaskPriority::Urgent);
    // Escalation happened before any model call
    assert_eq!(h.model.call_count(), 0);
}

#[tokio::test]
async fn transfer_success_marks_record_transferred() {
    let telephony = ScriptedTelephony::new(vec![caller(
        Language::En,
        "I want to talk to a real person please",
    )])
    .with_transfer(TransferOutcome::Bridged, Duration::ZERO);
    let model = ScriptedModel::new(vec![]);

    let mut cfg = settings();
    cfg.transfer.target = Some("+15559990000".to_string());

    let h = harness(telephony, model, cfg);
    let record = h.supervisor.run_call("+15550003333").await.unwrap();

    assert_eq!(record.outcome, Some(CallOutcome::Transferred));
    assert_eq!(h.telephony.transfer_calls.load(Ordering::SeqCst), 1);
    assert!(h.store.tasks_for_call(record.id).is_empty());
    assert_eq!(h.notifier.count(), 0);
}

#[tokio::test]
async fn transfer_timeout_abandons_then_falls_back() {
    let telephony = ScriptedTelephony::new(vec![caller(
        Language::En,
        "can I speak to a human agent",
    )])
    .with_transfer(TransferOutcome::Bridged, Duration::from_millis(200));
    let model = ScriptedModel::new(vec![]);

    let mut cfg = settings();
    cfg.transfer.target = Some("+15559990000".to_string());
    cfg.transfer.timeout_secs = 0; // elapse immediately

    let h = harness(telephony, model, cfg);
    let record = h.supervisor.run_call("+15550004444").await.unwrap();

    // Late bridge success must not count; the attempt was abandoned
    assert_eq!(record.outcome, Some(CallOutcome::CallbackCreated));
    assert_eq!(h.telephony.abandon_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.store.tasks_for_call(record.id).len(), 1);
}

#[tokio::test]
async fn hangup_mid_collection_preserves_partial_record() {
    let telephony = ScriptedTelephony::new(vec![
        caller(Language::En, "hi"),
        caller(Language::En, "English is fine"),
        caller(Language::En, "first time calling"),
        caller(Language::En, "I'd like to ask about teeth whitening"),
        caller(Language::En, "I'm Dana, my number is 555-123-4567"),
        CallInput::Event(CallEvent::Ended {
            reason: "caller hangup".to_string(),
        }),
    ]);
    let model = ScriptedModel::new(vec![
        ModelReply::text_only("Hi! English or Spanish?"),
        reply_with(
            "Great, we'll continue in English.",
            vec![ProposedAction::new("update_call_record")
                .with_field("language", json!("en"))],
        ),
        reply_with(
            "Welcome! What can we help with?",
            vec![ProposedAction::new("update_call_record")
                .with_field("customer_type", json!("new"))],
        ),
        reply_with(
            "Happy to help with that. Could I get your name and number?",
            vec![ProposedAction::new("update_call_record")
                .with_field("intent", json!("teeth whitening inquiry"))],
        ),
        reply_with(
            "Thanks Dana, let me confirm.",
            vec![ProposedAction::new("update_call_record")
                .with_field("name", json!("Dana"))
                .with_field("callback_number", json!("555-123-4567"))],
        ),
    ]);

    let h = harness(telephony, model, settings());
    let record = h.supervisor.run_call("+15550005555").await.unwrap();

    assert_eq!(record.outcome, Some(CallOutcome::Abandoned));
    assert_eq!(record.status, CallState::End);
    // Partial data survives exactly as accepted
    assert_eq!(record.fields.name.as_deref(), Some("Dana"));
    assert_eq!(record.fields.callback_number.as_deref(), Some("555-123-4567"));
    assert_eq!(record.intent.as_deref(), Some("teeth whitening inquiry"));
    assert!(h.store.tasks_for_call(record.id).is_empty());
    // Status history never regresses
    let ranks: Vec<u8> = record.status_history.iter().map(|s| s.rank()).collect();
    assert!(ranks.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test]
async fn callback_action_drives_states_and_outcome() {
    let telephony = ScriptedTelephony::new(vec![
        caller(Language::En, "hello there"),
        caller(Language::En, "English please"),
        caller(Language::En, "I've been in before"),
        caller(Language::En, "I need to reschedule my cleaning"),
        caller(Language::En, "Sam Alvarez, 555-867-5309, afternoons work best"),
        caller(Language::En, "yes that's all correct"),
        caller(Language::En, "no, that's everything, thanks"),
    ]);
    let model = ScriptedModel::new(vec![
        ModelReply::text_only("Hello! English or Spanish?"),
        reply_with(
            "English it is.",
            vec![ProposedAction::new("update_call_record")
                .with_field("language", json!("en"))],
        ),
        reply_with(
            "Welcome back!",
            vec![ProposedAction::new("update_call_record")
                .with_field("customer_type", json!("existing"))],
        ),
        reply_with(
            "I can set that up. Your name and best number?",
            vec![ProposedAction::new("update_call_record")
                .with_field("intent", json!("reschedule cleaning"))],
        ),
        reply_with(
            "Got it, Sam. Let me confirm everything.",
            vec![ProposedAction::new("update_call_record")
                .with_field("name", json!("Sam Alvarez"))
                .with_field("callback_number", json!("555-867-5309"))
                .with_field("best_time_window", json!("afternoons"))],
        ),
        reply_with(
            "Perfect, someone will call you back in the afternoon.",
            vec![ProposedAction::new("create_callback_task")
                .with_field("contact_number", json!("555-867-5309"))
                .with_field("contact_name", json!("Sam Alvarez"))
                .with_field("best_time_window", json!("afternoons"))
                .with_field("priority", json!("normal"))],
        ),
    ]);

    let h = harness(telephony, model, settings());
    let record = h.supervisor.run_call("+15550006666").await.unwrap();

    assert_eq!(record.outcome, Some(CallOutcome::CallbackCreated));
    assert_eq!(record.status, CallState::End);
    for state in [
        CallState::Confirmation,
        CallState::CreateCallbackTask,
        CallState::TransferOrWrapup,
    ] {
        assert!(
            record.status_history.contains(&state),
            "missing {state:?} in {:?}",
            record.status_history
        );
    }

    let tasks = h.store.tasks_for_call(record.id);
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].callback_number, "555-867-5309");
    assert_eq!(tasks[0].best_time_window.as_deref(), Some("afternoons"));
    assert_eq!(tasks[0].priority, TaskPriority::Normal);

    // Accepted field values round-trip unchanged
    assert_eq!(record.fields.name.as_deref(), Some("Sam Alvarez"));
    assert_eq!(record.fields.best_time_window.as_deref(), Some("afternoons"));
    assert!(record.transcript.as_deref().unwrap_or("").contains("Caller:"));
    assert!(record.usage.model_tokens == 0 && record.usage.speech_seconds > 0.0);
}

#[tokio::test]
async fn turn_limit_forces_wrapup_and_completion() {
    let telephony = ScriptedTelephony::new(vec![
        caller(Language::En, "hello"),
        caller(Language::En, "just browsing"),
        caller(Language::En, "hmm"),
    ]);
    let model = ScriptedModel::new(vec![]);

    let mut cfg = settings();
    cfg.limits.max_turns = 2;

    let h = harness(telephony, model, cfg);
    let record = h.supervisor.run_call("+15550007777").await.unwrap();

    assert_eq!(record.outcome, Some(CallOutcome::Completed));
    assert_eq!(record.status, CallState::End);
    assert_eq!(h.telephony.hangups.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn create_record_before_disclosure_is_dropped_without_retry() {
    let telephony = Arc::new(ScriptedTelephony::new(vec![caller(
        Language::En,
        "hi, I'm Bob",
    )]));
    let model = Arc::new(ScriptedModel::new(vec![reply_with(
        "Nice to meet you Bob!",
        vec![ProposedAction::new("create_call_record").with_field("name", json!("Bob"))],
    )]));
    let store = Arc::new(InMemoryCallStore::new());
    let notifier = Arc::new(RecordingNotifier::default());

    let dialog = DialogLoop::new(
        telephony,
        Arc::new(DecodingStt),
        Arc::new(EchoTts),
        model.clone(),
        store.clone(),
        notifier,
        Arc::new(EscalationDetector::new(
            TriggerLexicon::default(),
            EscalationThresholds::default(),
        )),
        GuardrailConfig::default(),
        settings(),
    );

    let record = store
        .create_call_record(frontdesk_core::NewCallRecord {
            from_number: "+15550008888".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    let mut session = CallSession::new(record.id, "+15550008888", Language::En);
    session
        .machine
        .transition(
            CallState::Greet,
            TransitionTrigger::DialogFlow,
            &session.guard_facts(),
        )
        .unwrap();
    // Disclosure deliberately not played

    dialog.run_turn(&mut session).await.unwrap();

    // Fatal for the turn: no retry, no record mutation
    assert_eq!(model.call_count(), 1);
    assert_eq!(session.consecutive_failed_turns, 1);
    let stored = store.get_call_record(record.id).await.unwrap();
    assert!(stored.fields.name.is_none());

    // The turn is on the books as failed, with nothing applied
    assert_eq!(session.turn_log.len(), 1);
    let turn = &session.turn_log[0];
    assert!(turn.failed);
    assert!(turn.applied_actions.is_empty());
    assert_eq!(turn.caller_text.as_deref(), Some("hi, I'm Bob"));
}

#[tokio::test(start_paused = true)]
async fn silence_times_out_and_defaults_the_language() {
    let store = Arc::new(InMemoryCallStore::new());
    let dialog = DialogLoop::new(
        Arc::new(ScriptedTelephony::with_pauses(vec![None])),
        Arc::new(DecodingStt),
        Arc::new(EchoTts),
        Arc::new(ScriptedModel::new(vec![])),
        store.clone(),
        Arc::new(RecordingNotifier::default()),
        Arc::new(EscalationDetector::new(
            TriggerLexicon::default(),
            EscalationThresholds::default(),
        )),
        GuardrailConfig::default(),
        settings(),
    );

    let record = store
        .create_call_record(frontdesk_core::NewCallRecord {
            from_number: "+15550002020".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    let mut session = CallSession::new(record.id, "+15550002020", Language::En);
    for to in [CallState::Greet, CallState::LanguageSelect] {
        session
            .machine
            .transition(to, TransitionTrigger::DialogFlow, &session.guard_facts())
            .unwrap();
    }

    let outcome = dialog.run_turn(&mut session).await.unwrap();

    assert_eq!(outcome, TurnOutcome::Continue);
    assert_eq!(session.language, Some(Language::En));
    assert_eq!(session.state(), CallState::ClassifyCustomerType);
    assert_eq!(session.consecutive_failed_turns, 1);
    assert_eq!(
        session.machine.log().last().map(|t| t.trigger),
        Some(TransitionTrigger::Timeout)
    );
    let stored = store.get_call_record(record.id).await.unwrap();
    assert_eq!(stored.status, CallState::ClassifyCustomerType);
}

#[tokio::test(start_paused = true)]
async fn model_transfer_request_bridges_during_wrapup_turn() {
    let telephony = ScriptedTelephony::with_pauses(vec![
        None, // silence through the greeting
        None, // and through language selection; English is assumed
        Some(caller(Language::En, "I'm an existing customer")),
        None, // silence runs intent discovery out to wrapup
        Some(caller(Language::En, "sure, go ahead")),
    ])
    .with_transfer(TransferOutcome::Bridged, Duration::ZERO);
    let model = ScriptedModel::new(vec![
        reply_with(
            "Welcome back! What can I do for you?",
            vec![ProposedAction::new("update_call_record")
                .with_field("customer_type", json!("existing"))],
        ),
        reply_with(
            "Of course, connecting you to the front desk now.",
            vec![ProposedAction::new("transfer_call")
                .with_field("reason", json!("caller wants the front desk"))],
        ),
    ]);

    let mut cfg = settings();
    cfg.transfer.target = Some("+15550000001".to_string());

    let h = harness(telephony, model, cfg);
    let record = h.supervisor.run_call("+15550003030").await.unwrap();

    assert_eq!(record.outcome, Some(CallOutcome::Transferred));
    assert_eq!(record.status, CallState::End);
    assert_eq!(h.telephony.transfer_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.telephony.abandon_calls.load(Ordering::SeqCst), 0);
    // A bridged caller needs no callback task
    assert!(h.store.tasks_for_call(record.id).is_empty());
}

#[tokio::test]
async fn coordinator_is_idempotent_across_duplicate_triggers() {
    let telephony = Arc::new(ScriptedTelephony::new(vec![]));
    let store = Arc::new(InMemoryCallStore::new());
    let notifier = Arc::new(RecordingNotifier::default());

    let coordinator = TransferCoordinator::new(
        telephony,
        Arc::new(EchoTts),
        store.clone(),
        notifier.clone(),
        settings(),
    );

    let record = store
        .create_call_record(frontdesk_core::NewCallRecord {
            from_number: "+15550009999".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    let mut session = CallSession::new(record.id, "+15550009999", Language::En);
    session.escalate(EscalationReason::ExplicitHumanRequest, 0.85);

    let first = coordinator.resolve(&mut session).await.unwrap();
    let second = coordinator.resolve(&mut session).await.unwrap();

    assert_eq!(first, Resolution::CallbackCreated);
    assert_eq!(second, Resolution::AlreadyResolved);
    assert_eq!(store.tasks_for_call(record.id).len(), 1);
    assert_eq!(notifier.count(), 1);
}

#[tokio::test]
async fn guardrail_rejection_blocks_field_and_retries_once() {
    let telephony = ScriptedTelephony::new(vec![
        caller(Language::En, "hello"),
        caller(Language::En, "my social is 123-45-6789"),
    ]);
    let model = ScriptedModel::new(vec![
        ModelReply::text_only("Hello! English or Spanish?"),
        reply_with(
            "Let me note that down.",
            vec![ProposedAction::new("update_call_record")
                .with_field("notes", json!("ssn 123-45-6789"))],
        ),
        // Retry after the guardrail rejection proposes nothing sensitive
        ModelReply::text_only("I'm not able to take that number, and you never need to share it with us."),
    ]);

    let h = harness(telephony, model, settings());
    let record = h.supervisor.run_call("+15550001010").await.unwrap();

    // Sensitive value never reached storage
    assert!(record.fields.notes.is_none());
    assert_eq!(h.model.call_count(), 3);
}

//! Durable record shapes: call records and callback tasks
//!
//! These are the persisted projections of an in-flight call session. They
//! are created and updated through the [`CallStore`](crate::traits::CallStore)
//! interface; the orchestration core never caches them across turns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Language;

/// Call flow state
///
/// `Init` is the sole initial state and `End` the sole terminal state.
/// The legal transitions between states live in the agent crate's
/// adjacency table; this enum is shared so records can carry a status
/// that matches the state machine's log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CallState {
    #[default]
    Init,
    Greet,
    LanguageSelect,
    ClassifyCustomerType,
    IntentDiscovery,
    InfoCollection,
    Confirmation,
    CreateCallbackTask,
    TransferOrWrapup,
    End,
}

impl CallState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallState::Init => "init",
            CallState::Greet => "greet",
            CallState::LanguageSelect => "language_select",
            CallState::ClassifyCustomerType => "classify_customer_type",
            CallState::IntentDiscovery => "intent_discovery",
            CallState::InfoCollection => "info_collection",
            CallState::Confirmation => "confirmation",
            CallState::CreateCallbackTask => "create_callback_task",
            CallState::TransferOrWrapup => "transfer_or_wrapup",
            CallState::End => "end",
        }
    }

    /// Terminal states permit no further transitions or effects
    pub fn is_terminal(&self) -> bool {
        matches!(self, CallState::End)
    }

    /// Position in the forward call flow, used to enforce that a persisted
    /// status never regresses. Dialog may legally move backward (e.g.
    /// confirmation back to info collection) but the durable status only
    /// records forward progress.
    pub fn rank(&self) -> u8 {
        match self {
            CallState::Init => 0,
            CallState::Greet => 1,
            CallState::LanguageSelect => 2,
            CallState::ClassifyCustomerType => 3,
            CallState::IntentDiscovery => 4,
            CallState::InfoCollection => 5,
            CallState::Confirmation => 6,
            CallState::CreateCallbackTask => 7,
            CallState::TransferOrWrapup => 8,
            CallState::End => 9,
        }
    }
}

impl std::fmt::Display for CallState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a finished call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CallOutcome {
    /// Caller's need was resolved by the assistant
    Completed,
    /// Live transfer to staff succeeded
    Transferred,
    /// A callback task was left for staff
    CallbackCreated,
    /// Caller hung up before the flow finished
    Abandoned,
    /// Unrecoverable session fault
    Error,
}

impl CallOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallOutcome::Completed => "completed",
            CallOutcome::Transferred => "transferred",
            CallOutcome::CallbackCreated => "callback-created",
            CallOutcome::Abandoned => "abandoned",
            CallOutcome::Error => "error",
        }
    }
}

/// Caller classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CustomerType {
    New,
    Existing,
    #[default]
    Unknown,
}

impl CustomerType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "new" => Some(CustomerType::New),
            "existing" => Some(CustomerType::Existing),
            "unknown" => Some(CustomerType::Unknown),
            _ => None,
        }
    }
}

/// Callback task priority, ordered low to urgent
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl TaskPriority {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(TaskPriority::Low),
            "normal" => Some(TaskPriority::Normal),
            "high" => Some(TaskPriority::High),
            "urgent" => Some(TaskPriority::Urgent),
            _ => None,
        }
    }
}

/// Callback task lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Open,
    Contacted,
    Closed,
}

/// Structured contact fields collected during a call
///
/// Every value is stored exactly as accepted by the validator; nothing is
/// truncated or retyped on the way to storage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectedFields {
    pub name: Option<String>,
    pub callback_number: Option<String>,
    pub best_time_window: Option<String>,
    pub notes: Option<String>,
}

impl CollectedFields {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.callback_number.is_none()
            && self.best_time_window.is_none()
            && self.notes.is_none()
    }

    /// Overlay non-empty fields from `other` onto self
    pub fn merge(&mut self, other: &CollectedFields) {
        if other.name.is_some() {
            self.name = other.name.clone();
        }
        if other.callback_number.is_some() {
            self.callback_number = other.callback_number.clone();
        }
        if other.best_time_window.is_some() {
            self.best_time_window = other.best_time_window.clone();
        }
        if other.notes.is_some() {
            self.notes = other.notes.clone();
        }
    }
}

/// Monotonically increasing cost/usage counters for one call
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageCounters {
    /// Total speech seconds processed (STT input + TTS output)
    pub speech_seconds: f64,
    /// Total language-model tokens consumed
    pub model_tokens: u64,
}

impl UsageCounters {
    pub fn add_speech_seconds(&mut self, secs: f64) {
        if secs > 0.0 {
            self.speech_seconds += secs;
        }
    }

    pub fn add_model_tokens(&mut self, tokens: u64) {
        self.model_tokens += tokens;
    }
}

/// Durable record of one inbound call
///
/// Created at session start with minimal fields, updated incrementally,
/// finalized exactly once at session close. The `status_history` mirrors
/// the state machine's forward progress and never regresses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRecord {
    pub id: Uuid,
    pub from_number: String,
    pub language: Option<Language>,
    pub customer_type: Option<CustomerType>,
    pub intent: Option<String>,
    pub status: CallState,
    pub status_history: Vec<CallState>,
    pub outcome: Option<CallOutcome>,
    pub fields: CollectedFields,
    pub summary: Option<String>,
    pub transcript: Option<String>,
    pub usage: UsageCounters,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields needed to open a call record at session start
#[derive(Debug, Clone, Default)]
pub struct NewCallRecord {
    pub from_number: String,
    pub language: Option<Language>,
    pub customer_type: Option<CustomerType>,
    pub intent: Option<String>,
}

/// Partial update applied to an existing call record
///
/// All fields optional; `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct CallRecordPatch {
    pub language: Option<Language>,
    pub customer_type: Option<CustomerType>,
    pub intent: Option<String>,
    pub status: Option<CallState>,
    pub outcome: Option<CallOutcome>,
    pub fields: Option<CollectedFields>,
    pub summary: Option<String>,
    pub transcript: Option<String>,
    pub usage: Option<UsageCounters>,
}

/// Staff follow-up work item, at most one open per call record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackTask {
    pub id: Uuid,
    pub call_id: Uuid,
    pub priority: TaskPriority,
    pub assignee: Option<String>,
    pub name: Option<String>,
    pub callback_number: String,
    pub best_time_window: Option<String>,
    pub notes: Option<String>,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields needed to open a callback task
#[derive(Debug, Clone, Default)]
pub struct NewCallbackTask {
    pub call_id: Uuid,
    pub priority: TaskPriority,
    pub name: Option<String>,
    pub callback_number: String,
    pub best_time_window: Option<String>,
    pub notes: Option<String>,
}

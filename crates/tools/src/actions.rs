//! Typed payloads produced by validation
//!
//! A `ValidatedAction` is the only shape the dialog loop applies effects
//! from. Field values arrive exactly as the model sent them; validation
//! rejects, it never rewrites.

use frontdesk_core::{CollectedFields, CustomerType, Language, TaskPriority};

/// An action that passed structural and guardrail checks
#[derive(Debug, Clone, PartialEq)]
pub enum ValidatedAction {
    CreateCallRecord(RecordUpdate),
    UpdateCallRecord(RecordUpdate),
    CreateCallbackTask(CallbackRequest),
    TransferCall(TransferRequest),
    SendNotification(NotificationRequest),
}

/// Fields to merge into the call record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordUpdate {
    pub language: Option<Language>,
    pub customer_type: Option<CustomerType>,
    pub intent: Option<String>,
    pub summary: Option<String>,
    pub fields: CollectedFields,
}

impl RecordUpdate {
    /// True if nothing recognized was supplied
    pub fn is_empty(&self) -> bool {
        self.language.is_none()
            && self.customer_type.is_none()
            && self.intent.is_none()
            && self.summary.is_none()
            && self.fields.is_empty()
    }
}

/// Request to open a staff callback task
#[derive(Debug, Clone, PartialEq)]
pub struct CallbackRequest {
    pub contact_number: String,
    pub contact_name: Option<String>,
    pub best_time_window: Option<String>,
    pub notes: Option<String>,
    pub priority: TaskPriority,
}

/// Request to bridge the caller to staff
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransferRequest {
    pub reason: Option<String>,
}

/// Request to message staff about this call
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationRequest {
    pub subject: String,
    pub body: String,
    pub priority: TaskPriority,
}

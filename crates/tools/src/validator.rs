//! Schema and guardrail validation for proposed actions
//!
//! `validate` is a pure function over one proposal and the session's
//! validation context. Rejections carry a severity:
//!
//! - `Structural` — wrong shape, unknown action, bad enum value. The loop
//!   may re-prompt the model once with the reason.
//! - `Guardrail` — sensitive data the receptionist refuses to handle. The
//!   offending field is blocked for the rest of the session.
//! - `Disclosure` — an information-capture action before the opening
//!   disclosure statement was played. Fatal for the turn, no retry.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;

use frontdesk_config::GuardrailConfig;
use frontdesk_core::{
    CallState, CollectedFields, CustomerType, Language, ProposedAction, TaskPriority,
};

use crate::actions::{
    CallbackRequest, NotificationRequest, RecordUpdate, TransferRequest, ValidatedAction,
};
use crate::schema::{permitted_actions, ActionName};

// 9 digits, bare or with SSN-style separators. The separator form is
// anchored so 10-digit phone numbers never match.
static GOVT_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{3}[- ]\d{2}[- ]\d{4}\b|\b\d{9}\b").expect("govt id regex"));

// Full dates in either day-first or year-first order.
static DATE_OF_BIRTH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b\d{1,2}[/\-.]\d{1,2}[/\-.](?:19|20)\d{2}\b|\b(?:19|20)\d{2}[/\-.]\d{1,2}[/\-.]\d{1,2}\b")
        .expect("dob regex")
});

// 13 to 19 digits allowing single space/dash separators.
static PAYMENT_CARD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d(?:[ -]?\d){12,18}\b").expect("card regex"));

/// What a value looked like when the guardrail scan flagged it
fn sensitive_value_kind(text: &str) -> Option<&'static str> {
    if PAYMENT_CARD.is_match(text) {
        Some("a payment card number")
    } else if GOVT_ID.is_match(text) {
        Some("a government identification number")
    } else if DATE_OF_BIRTH.is_match(text) {
        Some("a full date of birth")
    } else {
        None
    }
}

/// Rejection severity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionKind {
    /// Bad shape; the model may retry this turn
    Structural,
    /// Sensitive data; the field is blocked for the session
    Guardrail,
    /// Capture attempted before disclosure; fatal for the turn
    Disclosure,
}

/// A refused proposal with the reason fed back to the model
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason}")]
pub struct Rejection {
    pub kind: RejectionKind,
    pub reason: String,
    /// Field to block for the rest of the session, guardrail kind only
    pub blocked_field: Option<String>,
}

impl Rejection {
    fn structural(reason: impl Into<String>) -> Self {
        Self {
            kind: RejectionKind::Structural,
            reason: reason.into(),
            blocked_field: None,
        }
    }

    fn guardrail(field: &str, reason: impl Into<String>) -> Self {
        Self {
            kind: RejectionKind::Guardrail,
            reason: reason.into(),
            blocked_field: Some(field.to_string()),
        }
    }

    fn disclosure(reason: impl Into<String>) -> Self {
        Self {
            kind: RejectionKind::Disclosure,
            reason: reason.into(),
            blocked_field: None,
        }
    }

    /// Structural rejections may be retried within the turn
    pub fn is_retryable(&self) -> bool {
        self.kind == RejectionKind::Structural
    }
}

/// Session facts the validator needs
///
/// Borrowed from the session each turn; the validator holds no state of
/// its own.
#[derive(Debug, Clone, Copy)]
pub struct ValidationContext<'a> {
    pub state: CallState,
    /// Whether the opening disclosure statement has been played
    pub disclosure_played: bool,
    /// Fields blocked by earlier guardrail rejections this session
    pub blocked_fields: &'a HashSet<String>,
    pub guardrails: &'a GuardrailConfig,
}

/// Validate one proposed action against schema and guardrails
pub fn validate(
    action: &ProposedAction,
    ctx: &ValidationContext<'_>,
) -> Result<ValidatedAction, Rejection> {
    let name = ActionName::parse(&action.name)
        .ok_or_else(|| Rejection::structural(format!("unknown action '{}'", action.name)))?;

    if !permitted_actions(ctx.state).contains(&name) {
        return Err(Rejection::structural(format!(
            "action '{}' is not permitted in the {} state",
            action.name,
            ctx.state.as_str()
        )));
    }

    if name == ActionName::CreateCallRecord && !ctx.disclosure_played {
        return Err(Rejection::disclosure(
            "no information may be recorded before the opening disclosure has been played",
        ));
    }

    scan_fields(action, ctx)?;

    match name {
        ActionName::CreateCallRecord => {
            Ok(ValidatedAction::CreateCallRecord(decode_record_update(action)?))
        }
        ActionName::UpdateCallRecord => {
            Ok(ValidatedAction::UpdateCallRecord(decode_record_update(action)?))
        }
        ActionName::CreateCallbackTask => {
            Ok(ValidatedAction::CreateCallbackTask(decode_callback(action)?))
        }
        ActionName::TransferCall => Ok(ValidatedAction::TransferCall(TransferRequest {
            reason: action.str_field("reason").map(str::to_string),
        })),
        ActionName::SendNotification => {
            Ok(ValidatedAction::SendNotification(decode_notification(action)?))
        }
    }
}

/// Guardrail scan over every field name and value, before decoding
fn scan_fields(action: &ProposedAction, ctx: &ValidationContext<'_>) -> Result<(), Rejection> {
    for (field, value) in &action.fields {
        if ctx.blocked_fields.contains(field) {
            return Err(Rejection::guardrail(
                field,
                format!("field '{field}' was blocked earlier this call; never request it again"),
            ));
        }

        if ctx.guardrails.is_sensitive_field(field) {
            return Err(Rejection::guardrail(
                field,
                format!("field '{field}' is sensitive data this service does not collect"),
            ));
        }

        let text = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };

        if text.chars().count() > ctx.guardrails.max_field_chars {
            return Err(Rejection::structural(format!(
                "value for '{field}' exceeds {} characters",
                ctx.guardrails.max_field_chars
            )));
        }

        if let Some(kind) = sensitive_value_kind(&text) {
            return Err(Rejection::guardrail(
                field,
                format!("value for '{field}' looks like {kind}; do not collect it"),
            ));
        }
    }
    Ok(())
}

fn decode_record_update(action: &ProposedAction) -> Result<RecordUpdate, Rejection> {
    let language = match action.str_field("language") {
        Some(tag) => Some(
            Language::parse(tag)
                .ok_or_else(|| Rejection::structural("language must be exactly 'en' or 'es'"))?,
        ),
        None => None,
    };

    let customer_type = match action.str_field("customer_type") {
        Some(s) => Some(CustomerType::parse(s).ok_or_else(|| {
            Rejection::structural("customer_type must be one of new, existing, unknown")
        })?),
        None => None,
    };

    let callback_number = match action.str_field("callback_number") {
        Some(number) => {
            check_phone_shape("callback_number", number)?;
            Some(number.to_string())
        }
        None => None,
    };

    let update = RecordUpdate {
        language,
        customer_type,
        intent: action.str_field("intent").map(str::to_string),
        summary: action.str_field("summary").map(str::to_string),
        fields: CollectedFields {
            name: action.str_field("name").map(str::to_string),
            callback_number,
            best_time_window: action.str_field("best_time_window").map(str::to_string),
            notes: action.str_field("notes").map(str::to_string),
        },
    };

    if update.is_empty() {
        return Err(Rejection::structural(
            "no recognized fields were supplied for the record update",
        ));
    }
    Ok(update)
}

fn decode_callback(action: &ProposedAction) -> Result<CallbackRequest, Rejection> {
    let contact_number = action
        .str_field("contact_number")
        .ok_or_else(|| Rejection::structural("contact_number is required"))?;
    check_phone_shape("contact_number", contact_number)?;

    Ok(CallbackRequest {
        contact_number: contact_number.to_string(),
        contact_name: action.str_field("contact_name").map(str::to_string),
        best_time_window: action.str_field("best_time_window").map(str::to_string),
        notes: action.str_field("notes").map(str::to_string),
        priority: parse_priority(action)?,
    })
}

fn decode_notification(action: &ProposedAction) -> Result<NotificationRequest, Rejection> {
    let subject = action
        .str_field("subject")
        .ok_or_else(|| Rejection::structural("subject is required"))?;
    let body = action
        .str_field("body")
        .ok_or_else(|| Rejection::structural("body is required"))?;

    Ok(NotificationRequest {
        subject: subject.to_string(),
        body: body.to_string(),
        priority: parse_priority(action)?,
    })
}

fn parse_priority(action: &ProposedAction) -> Result<TaskPriority, Rejection> {
    match action.str_field("priority") {
        Some(s) => TaskPriority::parse(s).ok_or_else(|| {
            Rejection::structural("priority must be one of low, normal, high, urgent")
        }),
        None => Ok(TaskPriority::Normal),
    }
}

fn check_phone_shape(field: &str, value: &str) -> Result<(), Rejection> {
    let digits = value.chars().filter(char::is_ascii_digit).count();
    let valid_chars = value
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '(' | ')' | ' ' | '.'));
    if !valid_chars || !(7..=15).contains(&digits) {
        return Err(Rejection::structural(format!(
            "value for '{field}' does not look like a phone number"
        )));
    }
    Ok(())
}

//! Action vocabulary and per-state permissions
//!
//! The vocabulary is fixed: five actions, each with a JSON schema the
//! model sees, and an adjacency of which dialog states may propose which
//! actions. States outside this table get an empty vocabulary, which is
//! how `INIT` and `END` propose nothing.

use serde::{Deserialize, Serialize};
use serde_json::json;

use frontdesk_core::{CallState, ToolSpec};

/// Names of the actions the model may propose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionName {
    CreateCallRecord,
    UpdateCallRecord,
    CreateCallbackTask,
    TransferCall,
    SendNotification,
}

impl ActionName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionName::CreateCallRecord => "create_call_record",
            ActionName::UpdateCallRecord => "update_call_record",
            ActionName::CreateCallbackTask => "create_callback_task",
            ActionName::TransferCall => "transfer_call",
            ActionName::SendNotification => "send_notification",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "create_call_record" => Some(ActionName::CreateCallRecord),
            "update_call_record" => Some(ActionName::UpdateCallRecord),
            "create_callback_task" => Some(ActionName::CreateCallbackTask),
            "transfer_call" => Some(ActionName::TransferCall),
            "send_notification" => Some(ActionName::SendNotification),
            _ => None,
        }
    }
}

/// Actions each dialog state is allowed to propose
pub fn permitted_actions(state: CallState) -> &'static [ActionName] {
    use ActionName::*;
    match state {
        CallState::Init | CallState::End => &[],
        CallState::Greet => &[CreateCallRecord],
        CallState::LanguageSelect => &[CreateCallRecord, UpdateCallRecord],
        CallState::ClassifyCustomerType => &[UpdateCallRecord],
        CallState::IntentDiscovery => &[UpdateCallRecord],
        CallState::InfoCollection => &[UpdateCallRecord],
        CallState::Confirmation => &[UpdateCallRecord, CreateCallbackTask],
        CallState::CreateCallbackTask => &[UpdateCallRecord, CreateCallbackTask],
        CallState::TransferOrWrapup => &[UpdateCallRecord, TransferCall, SendNotification],
    }
}

/// Tool specs advertised to the model for one dialog state
pub fn specs_for_state(state: CallState) -> Vec<ToolSpec> {
    permitted_actions(state).iter().map(|name| spec(*name)).collect()
}

fn spec(name: ActionName) -> ToolSpec {
    match name {
        ActionName::CreateCallRecord => ToolSpec {
            name: name.as_str().to_string(),
            description: "Record the caller's initial details once the call is underway"
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "language": {
                        "type": "string",
                        "enum": ["en", "es"],
                        "description": "Language the caller chose"
                    },
                    "name": { "type": "string", "description": "Caller's name" },
                    "intent": { "type": "string", "description": "Why the caller is calling" }
                }
            }),
        },
        ActionName::UpdateCallRecord => ToolSpec {
            name: name.as_str().to_string(),
            description: "Update fields on the current call's record as they are learned"
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "language": { "type": "string", "enum": ["en", "es"] },
                    "customer_type": {
                        "type": "string",
                        "enum": ["new", "existing", "unknown"],
                        "description": "Whether the caller is an existing customer"
                    },
                    "intent": { "type": "string" },
                    "summary": { "type": "string", "description": "Running summary of the call" },
                    "name": { "type": "string" },
                    "callback_number": { "type": "string", "description": "Best number to reach the caller" },
                    "best_time_window": { "type": "string", "description": "When the caller prefers to be reached" },
                    "notes": { "type": "string" }
                }
            }),
        },
        ActionName::CreateCallbackTask => ToolSpec {
            name: name.as_str().to_string(),
            description: "Create a follow-up task so staff call the caller back".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "contact_number": { "type": "string", "description": "Number staff should call" },
                    "contact_name": { "type": "string" },
                    "best_time_window": { "type": "string" },
                    "notes": { "type": "string" },
                    "priority": {
                        "type": "string",
                        "enum": ["low", "normal", "high", "urgent"]
                    }
                },
                "required": ["contact_number"]
            }),
        },
        ActionName::TransferCall => ToolSpec {
            name: name.as_str().to_string(),
            description: "Attempt to bridge the caller to a staff member now".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "reason": { "type": "string", "description": "Why a live transfer is needed" }
                }
            }),
        },
        ActionName::SendNotification => ToolSpec {
            name: name.as_str().to_string(),
            description: "Send staff a message about this call".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "subject": { "type": "string" },
                    "body": { "type": "string" },
                    "priority": {
                        "type": "string",
                        "enum": ["low", "normal", "high", "urgent"]
                    }
                },
                "required": ["subject", "body"]
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_roundtrip() {
        for name in [
            ActionName::CreateCallRecord,
            ActionName::UpdateCallRecord,
            ActionName::CreateCallbackTask,
            ActionName::TransferCall,
            ActionName::SendNotification,
        ] {
            assert_eq!(ActionName::parse(name.as_str()), Some(name));
        }
        assert_eq!(ActionName::parse("delete_everything"), None);
    }

    #[test]
    fn test_terminal_states_have_no_vocabulary() {
        assert!(permitted_actions(CallState::Init).is_empty());
        assert!(permitted_actions(CallState::End).is_empty());
    }

    #[test]
    fn test_specs_match_permissions() {
        let specs = specs_for_state(CallState::Confirmation);
        let names: Vec<&str> = specs.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["update_call_record", "create_callback_task"]);
    }

    #[test]
    fn test_transfer_only_in_wrapup() {
        for state in [
            CallState::Greet,
            CallState::LanguageSelect,
            CallState::ClassifyCustomerType,
            CallState::IntentDiscovery,
            CallState::InfoCollection,
            CallState::Confirmation,
            CallState::CreateCallbackTask,
        ] {
            assert!(!permitted_actions(state).contains(&ActionName::TransferCall));
        }
        assert!(permitted_actions(CallState::TransferOrWrapup)
            .contains(&ActionName::TransferCall));
    }
}

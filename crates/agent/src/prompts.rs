//! Scripted prompt text and model context building
//!
//! Every state has a deterministic prompt in both languages. These serve
//! three purposes: the greeting (which carries the mandatory AI
//! disclosure), the fallback line when the model fails or exhausts its
//! retry, and the seed instruction inside the model's system prompt.

use frontdesk_core::{CallState, ChatMessage, Language, ToolSpec};

use crate::session::CallSession;

/// Opening line, always the disclosure-bearing greeting
pub fn greeting(language: Language, business_name: &str) -> String {
    match language {
        Language::En => format!(
            "Thank you for calling {business_name}. You are speaking with an automated virtual assistant. How can I help you today? Para español, diga \"español\"."
        ),
        Language::Es => format!(
            "Gracias por llamar a {business_name}. Está hablando con un asistente virtual automatizado. ¿En qué puedo ayudarle hoy?"
        ),
    }
}

/// Deterministic prompt for a state, used as scripted fallback
pub fn state_prompt(state: CallState, language: Language, business_name: &str) -> String {
    match (state, language) {
        (CallState::Init | CallState::Greet, _) => greeting(language, business_name),

        (CallState::LanguageSelect, Language::En) => {
            "Would you prefer to continue in English or Spanish?".to_string()
        }
        (CallState::LanguageSelect, Language::Es) => {
            "¿Prefiere continuar en inglés o en español?".to_string()
        }

        (CallState::ClassifyCustomerType, Language::En) => {
            "Have you worked with us before, or is this your first time calling?".to_string()
        }
        (CallState::ClassifyCustomerType, Language::Es) => {
            "¿Ha trabajado con nosotros antes, o es la primera vez que llama?".to_string()
        }

        (CallState::IntentDiscovery, Language::En) => {
            "What can we help you with today?".to_string()
        }
        (CallState::IntentDiscovery, Language::Es) => {
            "¿En qué podemos ayudarle hoy?".to_string()
        }

        (CallState::InfoCollection, Language::En) => {
            "Could I get your name and the best number to reach you?".to_string()
        }
        (CallState::InfoCollection, Language::Es) => {
            "¿Me puede dar su nombre y el mejor número para comunicarnos con usted?".to_string()
        }

        (CallState::Confirmation, Language::En) => {
            "Let me confirm what I have so far. Is everything correct?".to_string()
        }
        (CallState::Confirmation, Language::Es) => {
            "Permítame confirmar lo que tengo hasta ahora. ¿Está todo correcto?".to_string()
        }

        (CallState::CreateCallbackTask, Language::En) => {
            "I'll have someone from our office call you back. When is the best time to reach you?"
                .to_string()
        }
        (CallState::CreateCallbackTask, Language::Es) => {
            "Haré que alguien de nuestra oficina le devuelva la llamada. ¿Cuál es el mejor momento para comunicarnos?"
                .to_string()
        }

        (CallState::TransferOrWrapup, Language::En) => {
            "Is there anything else I can help you with before we finish?".to_string()
        }
        (CallState::TransferOrWrapup, Language::Es) => {
            "¿Hay algo más en lo que pueda ayudarle antes de terminar?".to_string()
        }

        (CallState::End, Language::En) => {
            format!("Thank you for calling {business_name}. Goodbye.")
        }
        (CallState::End, Language::Es) => {
            format!("Gracias por llamar a {business_name}. Adiós.")
        }
    }
}

/// Apology line for provider failures; never exposes error detail
pub fn apology(language: Language) -> &'static str {
    match language {
        Language::En => "I'm sorry, I'm having a little trouble. Let's try that again.",
        Language::Es => "Lo siento, estoy teniendo un pequeño problema. Intentémoslo de nuevo.",
    }
}

/// Line played while a live transfer is attempted
pub fn transfer_wait(language: Language) -> &'static str {
    match language {
        Language::En => "One moment please, I'm connecting you with a member of our staff.",
        Language::Es => "Un momento por favor, le estoy comunicando con un miembro de nuestro personal.",
    }
}

/// Line played when the transfer failed and a callback was created instead
pub fn transfer_fallback(language: Language) -> &'static str {
    match language {
        Language::En => {
            "I wasn't able to reach our staff right now, but I've made sure someone will call you back as soon as possible."
        }
        Language::Es => {
            "No pude comunicarle con nuestro personal en este momento, pero me he asegurado de que alguien le devuelva la llamada lo antes posible."
        }
    }
}

/// Build the bounded model context for one turn: system instruction with
/// state, collected fields, and permitted actions, then a recent
/// transcript window.
pub fn build_context(
    session: &CallSession,
    business_name: &str,
    tools: &[ToolSpec],
    window: usize,
) -> Vec<ChatMessage> {
    let state = session.state();
    let language = session.effective_language();

    let mut system = format!(
        "You are the phone receptionist for {business_name}. You are an AI assistant and must say so if asked; never claim to be human. \
Speak {}. Keep replies to one or two short spoken sentences.\n\
Current dialog step: {}. Goal for this step: {}\n",
        match language {
            Language::En => "English",
            Language::Es => "Spanish",
        },
        state.as_str(),
        state_prompt(state, language, business_name),
    );

    system.push_str("Known so far:\n");
    if let Some(name) = &session.fields.name {
        system.push_str(&format!("- caller name: {name}\n"));
    }
    if let Some(number) = &session.fields.callback_number {
        system.push_str(&format!("- callback number: {number}\n"));
    }
    if let Some(window) = &session.fields.best_time_window {
        system.push_str(&format!("- best time to call: {window}\n"));
    }
    if let Some(intent) = &session.intent {
        system.push_str(&format!("- reason for calling: {intent}\n"));
    }

    if !tools.is_empty() {
        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        system.push_str(&format!(
            "You may use only these actions this step: {}.\n",
            names.join(", ")
        ));
    } else {
        system.push_str("No actions are available this step; reply with speech only.\n");
    }

    if !session.blocked_fields.is_empty() {
        let mut blocked: Vec<&str> =
            session.blocked_fields.iter().map(String::as_str).collect();
        blocked.sort_unstable();
        system.push_str(&format!(
            "Never request or record these fields again this call: {}.\n",
            blocked.join(", ")
        ));
    }

    let mut messages = vec![ChatMessage::system(system)];
    for turn in session.transcript.recent(window) {
        let message = match turn.speaker {
            frontdesk_core::Speaker::Caller => ChatMessage::user(turn.text.clone()),
            frontdesk_core::Speaker::Agent => ChatMessage::assistant(turn.text.clone()),
        };
        messages.push(message);
    }
    messages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greeting_carries_disclosure_in_both_languages() {
        assert!(greeting(Language::En, "Rivera Dental").contains("virtual assistant"));
        assert!(greeting(Language::Es, "Rivera Dental").contains("asistente virtual"));
    }

    #[test]
    fn test_every_state_has_a_prompt_in_both_languages() {
        for state in [
            CallState::Init,
            CallState::Greet,
            CallState::LanguageSelect,
            CallState::ClassifyCustomerType,
            CallState::IntentDiscovery,
            CallState::InfoCollection,
            CallState::Confirmation,
            CallState::CreateCallbackTask,
            CallState::TransferOrWrapup,
            CallState::End,
        ] {
            for language in [Language::En, Language::Es] {
                assert!(!state_prompt(state, language, "the office").is_empty());
            }
        }
    }
}

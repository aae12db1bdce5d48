//! Call lifecycle state machine
//!
//! Legal transitions live in one adjacency table keyed by current state,
//! with guards evaluated against facts the caller supplies. The machine
//! owns the transition log; the call record's status history is a
//! projection of it and must match.
//!
//! Escalation is the one exception to the table: once the detector fires,
//! `force_escalation` moves any non-terminal state straight to
//! `TransferOrWrapup`.

use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

use frontdesk_core::CallState;

/// What caused a transition, kept for audit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionTrigger {
    /// Natural dialog progress
    DialogFlow,
    /// A validated action drove the transition
    ActionEffect,
    /// Escalation pre-empted the normal path
    Escalation,
    /// Caller hangup or carrier drop
    Hangup,
    /// The state's inactivity window elapsed
    Timeout,
    /// Internal fault degraded the session toward wrapup
    Degradation,
}

impl TransitionTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionTrigger::DialogFlow => "dialog_flow",
            TransitionTrigger::ActionEffect => "action_effect",
            TransitionTrigger::Escalation => "escalation",
            TransitionTrigger::Hangup => "hangup",
            TransitionTrigger::Timeout => "timeout",
            TransitionTrigger::Degradation => "degradation",
        }
    }
}

/// One entry in the per-call transition log
#[derive(Debug, Clone)]
pub struct TransitionRecord {
    pub from: CallState,
    pub to: CallState,
    pub at: DateTime<Utc>,
    pub trigger: TransitionTrigger,
}

/// Session facts that transition guards check
#[derive(Debug, Clone, Copy, Default)]
pub struct GuardFacts {
    pub language_resolved: bool,
    pub callback_number_present: bool,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("illegal transition {from:?} -> {to:?}")]
    Illegal { from: CallState, to: CallState },

    #[error("transition {from:?} -> {to:?} blocked: {reason}")]
    GuardFailed {
        from: CallState,
        to: CallState,
        reason: &'static str,
    },

    #[error("state {0:?} is terminal")]
    Terminal(CallState),
}

/// Targets reachable from a state via the adjacency table
pub fn allowed_targets(state: CallState) -> &'static [CallState] {
    use CallState::*;
    match state {
        Init => &[Greet],
        Greet => &[LanguageSelect],
        LanguageSelect => &[ClassifyCustomerType],
        ClassifyCustomerType => &[IntentDiscovery],
        IntentDiscovery => &[InfoCollection, TransferOrWrapup],
        InfoCollection => &[Confirmation],
        // Corrections may reopen collection; the happy path goes forward.
        Confirmation => &[InfoCollection, CreateCallbackTask, TransferOrWrapup],
        CreateCallbackTask => &[TransferOrWrapup],
        TransferOrWrapup => &[End],
        End => &[],
    }
}

/// Inactivity window per state and where the call goes when it elapses.
/// Early states move forward on silence; collection states head to wrapup
/// so the call ends with whatever was captured. Terminal states have none.
pub fn inactivity_timeout(state: CallState) -> Option<(Duration, CallState)> {
    use CallState::*;
    let (secs, target) = match state {
        Init => (5, Greet),
        Greet => (10, LanguageSelect),
        LanguageSelect => (15, ClassifyCustomerType),
        ClassifyCustomerType => (20, IntentDiscovery),
        IntentDiscovery => (60, TransferOrWrapup),
        InfoCollection => (60, TransferOrWrapup),
        Confirmation => (30, TransferOrWrapup),
        CreateCallbackTask => (10, TransferOrWrapup),
        TransferOrWrapup => (30, End),
        End => return None,
    };
    Some((Duration::from_secs(secs), target))
}

fn guard(from: CallState, to: CallState, facts: &GuardFacts) -> Result<(), TransitionError> {
    let failed = |reason| Err(TransitionError::GuardFailed { from, to, reason });
    match (from, to) {
        (CallState::LanguageSelect, CallState::ClassifyCustomerType)
            if !facts.language_resolved =>
        {
            failed("language has not been resolved")
        }
        (CallState::Confirmation, CallState::CreateCallbackTask)
            if !facts.callback_number_present =>
        {
            failed("no callback number has been collected")
        }
        _ => Ok(()),
    }
}

/// Authoritative lifecycle state of one call
///
/// Owned by the session worker; mutated only through `transition` and
/// `force_escalation`, both of which append to the log. A rejected
/// transition never mutates state.
#[derive(Debug)]
pub struct StateMachine {
    current: CallState,
    log: Vec<TransitionRecord>,
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            current: CallState::Init,
            log: Vec::new(),
        }
    }

    pub fn current(&self) -> CallState {
        self.current
    }

    pub fn is_terminal(&self) -> bool {
        self.current.is_terminal()
    }

    pub fn log(&self) -> &[TransitionRecord] {
        &self.log
    }

    /// Furthest forward state reached so far. Dialog may legally step
    /// backward, but the persisted status only ever records this.
    pub fn furthest(&self) -> CallState {
        self.log
            .iter()
            .map(|t| t.to)
            .chain([self.current])
            .max_by_key(|s| s.rank())
            .unwrap_or(self.current)
    }

    /// Check legality without mutating
    pub fn can_transition(&self, to: CallState, facts: &GuardFacts) -> Result<(), TransitionError> {
        if self.current.is_terminal() {
            return Err(TransitionError::Terminal(self.current));
        }
        if !allowed_targets(self.current).contains(&to) {
            return Err(TransitionError::Illegal {
                from: self.current,
                to,
            });
        }
        guard(self.current, to, facts)
    }

    pub fn transition(
        &mut self,
        to: CallState,
        trigger: TransitionTrigger,
        facts: &GuardFacts,
    ) -> Result<(), TransitionError> {
        self.can_transition(to, facts)?;
        self.record(to, trigger);
        Ok(())
    }

    /// Escalation override: jump to `TransferOrWrapup` from any
    /// non-terminal state, bypassing the adjacency table. A no-op when
    /// already there.
    pub fn force_escalation(&mut self) -> Result<(), TransitionError> {
        self.force_wrapup(TransitionTrigger::Escalation)
    }

    /// Jump to `TransferOrWrapup` outside the table. Used by escalation
    /// and by safe degradation when the session hits a limit or an
    /// internal fault.
    pub fn force_wrapup(&mut self, trigger: TransitionTrigger) -> Result<(), TransitionError> {
        if self.current.is_terminal() {
            return Err(TransitionError::Terminal(self.current));
        }
        if self.current != CallState::TransferOrWrapup {
            self.record(CallState::TransferOrWrapup, trigger);
        }
        Ok(())
    }

    /// Forced jump to a state's timeout target when its inactivity window
    /// elapses. Logged like any other transition; guards are not consulted,
    /// the caller resolves them first (e.g. defaulting the language).
    pub fn force_timeout(&mut self, to: CallState) -> Result<(), TransitionError> {
        if self.current.is_terminal() {
            return Err(TransitionError::Terminal(self.current));
        }
        if self.current != to {
            self.record(to, TransitionTrigger::Timeout);
        }
        Ok(())
    }

    /// Terminal jump when the caller is gone; any non-terminal state may end
    pub fn force_end(&mut self, trigger: TransitionTrigger) {
        if !self.current.is_terminal() {
            self.record(CallState::End, trigger);
        }
    }

    fn record(&mut self, to: CallState, trigger: TransitionTrigger) {
        let entry = TransitionRecord {
            from: self.current,
            to,
            at: Utc::now(),
            trigger,
        };
        tracing::debug!(
            from = entry.from.as_str(),
            to = entry.to.as_str(),
            trigger = trigger.as_str(),
            "state transition"
        );
        self.current = to;
        self.log.push(entry);
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facts() -> GuardFacts {
        GuardFacts {
            language_resolved: true,
            callback_number_present: true,
        }
    }

    #[test]
    fn test_happy_path_to_end() {
        let mut machine = StateMachine::new();
        for to in [
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
            machine
                .transition(to, TransitionTrigger::DialogFlow, &facts())
                .unwrap();
        }
        assert!(machine.is_terminal());
        assert_eq!(machine.log().len(), 9);
    }

    #[test]
    fn test_end_only_reachable_from_wrapup() {
        for state in [
            CallState::Init,
            CallState::Greet,
            CallState::LanguageSelect,
            CallState::ClassifyCustomerType,
            CallState::IntentDiscovery,
            CallState::InfoCollection,
            CallState::Confirmation,
            CallState::CreateCallbackTask,
        ] {
            assert!(
                !allowed_targets(state).contains(&CallState::End),
                "{state:?} must not reach END directly"
            );
        }
        assert_eq!(allowed_targets(CallState::TransferOrWrapup), &[CallState::End]);
    }

    #[test]
    fn test_illegal_transition_does_not_mutate() {
        let mut machine = StateMachine::new();
        let err = machine
            .transition(CallState::Confirmation, TransitionTrigger::DialogFlow, &facts())
            .unwrap_err();
        assert!(matches!(err, TransitionError::Illegal { .. }));
        assert_eq!(machine.current(), CallState::Init);
        assert!(machine.log().is_empty());
    }

    #[test]
    fn test_language_guard() {
        let mut machine = StateMachine::new();
        machine
            .transition(CallState::Greet, TransitionTrigger::DialogFlow, &facts())
            .unwrap();
        machine
            .transition(CallState::LanguageSelect, TransitionTrigger::DialogFlow, &facts())
            .unwrap();

        let unresolved = GuardFacts::default();
        let err = machine
            .transition(
                CallState::ClassifyCustomerType,
                TransitionTrigger::DialogFlow,
                &unresolved,
            )
            .unwrap_err();
        assert!(matches!(err, TransitionError::GuardFailed { .. }));
        assert_eq!(machine.current(), CallState::LanguageSelect);
    }

    #[test]
    fn test_escalation_overrides_table_from_any_state() {
        let mut machine = StateMachine::new();
        machine
            .transition(CallState::Greet, TransitionTrigger::DialogFlow, &facts())
            .unwrap();
        machine.force_escalation().unwrap();
        assert_eq!(machine.current(), CallState::TransferOrWrapup);
        assert_eq!(
            machine.log().last().map(|t| t.trigger),
            Some(TransitionTrigger::Escalation)
        );
    }

    #[test]
    fn test_escalation_noop_when_already_in_wrapup() {
        let mut machine = StateMachine::new();
        machine
            .transition(CallState::Greet, TransitionTrigger::DialogFlow, &facts())
            .unwrap();
        machine.force_escalation().unwrap();
        let len = machine.log().len();
        machine.force_escalation().unwrap();
        assert_eq!(machine.log().len(), len);
    }

    #[test]
    fn test_no_transitions_after_end() {
        let mut machine = StateMachine::new();
        machine
            .transition(CallState::Greet, TransitionTrigger::DialogFlow, &facts())
            .unwrap();
        machine.force_end(TransitionTrigger::Hangup);
        assert!(machine.is_terminal());
        assert!(matches!(
            machine.force_escalation(),
            Err(TransitionError::Terminal(CallState::End))
        ));
        let err = machine
            .transition(CallState::Greet, TransitionTrigger::DialogFlow, &facts())
            .unwrap_err();
        assert!(matches!(err, TransitionError::Terminal(_)));
    }

    #[test]
    fn test_every_live_state_has_an_inactivity_window() {
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
        ] {
            assert!(inactivity_timeout(state).is_some(), "{state:?} has no timeout");
        }
        assert!(inactivity_timeout(CallState::End).is_none());
    }

    #[test]
    fn test_timeout_transition_is_logged_with_its_trigger() {
        let mut machine = StateMachine::new();
        machine
            .transition(CallState::Greet, TransitionTrigger::DialogFlow, &facts())
            .unwrap();
        let (_, target) = inactivity_timeout(CallState::Greet).unwrap();
        machine.force_timeout(target).unwrap();
        assert_eq!(machine.current(), CallState::LanguageSelect);
        assert_eq!(
            machine.log().last().map(|t| t.trigger),
            Some(TransitionTrigger::Timeout)
        );
    }

    #[test]
    fn test_confirmation_may_reopen_collection() {
        let mut machine = StateMachine::new();
        for to in [
            CallState::Greet,
            CallState::LanguageSelect,
            CallState::ClassifyCustomerType,
            CallState::IntentDiscovery,
            CallState::InfoCollection,
            CallState::Confirmation,
        ] {
            machine
                .transition(to, TransitionTrigger::DialogFlow, &facts())
                .unwrap();
        }
        machine
            .transition(CallState::InfoCollection, TransitionTrigger::DialogFlow, &facts())
            .unwrap();
        assert_eq!(machine.current(), CallState::InfoCollection);
    }
}

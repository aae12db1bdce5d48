//! Call orchestration core
//!
//! Drives one inbound phone call from answer to terminal outcome:
//!
//! - `state_machine` — the fixed adjacency table of legal call states,
//!   with guards, the escalation override, and the audit transition log
//! - `escalation` — pure bilingual trigger scoring over each utterance
//! - `session` — the in-memory working state of one call, owned by its
//!   supervisor's worker
//! - `turn_loop` — one caller-utterance/system-reply cycle, including
//!   action validation and effect application
//! - `transfer` — live-transfer attempt with bounded wait, degrading to
//!   a priority callback task
//! - `supervisor` — per-call top level; guarantees a persisted record on
//!   every exit path
//! - `prompts` — scripted bilingual prompt text and model context
//!   building
//!
//! All external collaborators are consumed through the capability traits
//! in `frontdesk-core`, so the whole core runs against deterministic test
//! doubles without network I/O.

pub mod escalation;
pub mod prompts;
pub mod session;
pub mod state_machine;
pub mod supervisor;
pub mod transfer;
pub mod turn_loop;

pub use escalation::{EscalationDetector, EscalationReason, Evaluation, TurnSignals};
pub use session::{CallSession, TurnRecord};
pub use state_machine::{
    allowed_targets, inactivity_timeout, GuardFacts, StateMachine, TransitionError,
    TransitionRecord, TransitionTrigger,
};
pub use supervisor::{ActiveCall, CallSupervisor, Providers, SessionRegistry};
pub use transfer::{Resolution, TransferCoordinator};
pub use turn_loop::{DialogLoop, TurnOutcome};

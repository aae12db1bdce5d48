//! Action vocabulary and guardrail validation
//!
//! The language model never touches the call record directly. It proposes
//! named actions with fields; everything here is the pure checking layer
//! between those proposals and their effects:
//!
//! - `schema` declares the action vocabulary, the JSON schemas advertised
//!   to the model, and which actions each dialog state permits
//! - `validator` turns a `ProposedAction` into a typed `ValidatedAction`
//!   or a `Rejection`, enforcing structural rules and sensitive-data
//!   guardrails
//! - `actions` holds the typed payloads that validated proposals decode to
//!
//! Nothing in this crate performs I/O. The dialog loop owns applying
//! effects and deciding what a rejection means for the turn.

pub mod actions;
pub mod schema;
pub mod validator;

pub use actions::{
    CallbackRequest, NotificationRequest, RecordUpdate, TransferRequest, ValidatedAction,
};
pub use schema::{permitted_actions, specs_for_state, ActionName};
pub use validator::{validate, Rejection, RejectionKind, ValidationContext};

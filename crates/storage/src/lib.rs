//! Storage backends for call records and callback tasks
//!
//! The orchestrator only ever sees the [`frontdesk_core::traits::CallStore`]
//! interface. This crate provides the in-memory backend used for a single
//! office deployment and for tests; it enforces the two store-level
//! invariants (no status regression, one open callback task per call) so
//! callers cannot violate them regardless of how they drive the interface.

mod memory;

pub use memory::InMemoryCallStore;

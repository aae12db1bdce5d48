//! Call record and callback task storage interface

use async_trait::async_trait;
use uuid::Uuid;

use crate::records::{CallRecord, CallRecordPatch, CallbackTask, NewCallRecord, NewCallbackTask};
use crate::StorageError;

/// Storage interface for call records and callback tasks
///
/// Each method is atomic from the orchestrator's perspective. The store
/// enforces two invariants itself so no caller can violate them:
/// a call record's status never regresses, and at most one open callback
/// task exists per call record.
#[async_trait]
pub trait CallStore: Send + Sync + 'static {
    /// Open a call record at session start with minimal fields
    async fn create_call_record(&self, new: NewCallRecord) -> Result<CallRecord, StorageError>;

    /// Apply a partial update; a regressing status is rejected
    async fn update_call_record(
        &self,
        id: Uuid,
        patch: CallRecordPatch,
    ) -> Result<CallRecord, StorageError>;

    /// Fetch a call record (reporting layer and tests)
    async fn get_call_record(&self, id: Uuid) -> Result<CallRecord, StorageError>;

    /// Create a callback task; rejected with [`StorageError::DuplicateOpenTask`]
    /// if an open task already exists for the call
    async fn create_callback_task(
        &self,
        new: NewCallbackTask,
    ) -> Result<CallbackTask, StorageError>;

    /// Open callback task for a call, if any
    async fn get_open_callback_task(
        &self,
        call_id: Uuid,
    ) -> Result<Option<CallbackTask>, StorageError>;
}

//! In-memory call store
//!
//! Two maps behind one lock so the duplicate-open-task check and the
//! insert are atomic. Sessions never contend on the same call id, so the
//! lock is effectively uncontended per record.

use std::collections::HashMap;

use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use async_trait::async_trait;
use frontdesk_core::traits::CallStore;
use frontdesk_core::{
    CallRecord, CallRecordPatch, CallbackTask, NewCallRecord, NewCallbackTask, StorageError,
    TaskStatus, UsageCounters,
};

#[derive(Default)]
struct Tables {
    records: HashMap<Uuid, CallRecord>,
    tasks: HashMap<Uuid, CallbackTask>,
}

/// Call store backed by process memory
#[derive(Default)]
pub struct InMemoryCallStore {
    tables: RwLock<Tables>,
}

impl InMemoryCallStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All tasks for a call, any status (reporting layer and tests)
    pub fn tasks_for_call(&self, call_id: Uuid) -> Vec<CallbackTask> {
        let tables = self.tables.read();
        let mut tasks: Vec<CallbackTask> = tables
            .tasks
            .values()
            .filter(|t| t.call_id == call_id)
            .cloned()
            .collect();
        tasks.sort_by_key(|t| t.created_at);
        tasks
    }
}

#[async_trait]
impl CallStore for InMemoryCallStore {
    async fn create_call_record(&self, new: NewCallRecord) -> Result<CallRecord, StorageError> {
        let now = Utc::now();
        let record = CallRecord {
            id: Uuid::new_v4(),
            from_number: new.from_number,
            language: new.language,
            customer_type: new.customer_type,
            intent: new.intent,
            status: frontdesk_core::CallState::Init,
            status_history: vec![frontdesk_core::CallState::Init],
            outcome: None,
            fields: Default::default(),
            summary: None,
            transcript: None,
            usage: UsageCounters::default(),
            created_at: now,
            updated_at: now,
        };

        let mut tables = self.tables.write();
        tables.records.insert(record.id, record.clone());
        tracing::debug!(call_id = %record.id, "call record opened");
        Ok(record)
    }

    async fn update_call_record(
        &self,
        id: Uuid,
        patch: CallRecordPatch,
    ) -> Result<CallRecord, StorageError> {
        let mut tables = self.tables.write();
        let record = tables
            .records
            .get_mut(&id)
            .ok_or(StorageError::CallNotFound(id))?;

        if let Some(status) = patch.status {
            if status.rank() < record.status.rank() {
                return Err(StorageError::StatusRegression {
                    call_id: id,
                    from: record.status,
                    to: status,
                });
            }
            if status != record.status {
                record.status = status;
                record.status_history.push(status);
            }
        }

        if let Some(language) = patch.language {
            record.language = Some(language);
        }
        if let Some(customer_type) = patch.customer_type {
            record.customer_type = Some(customer_type);
        }
        if let Some(intent) = patch.intent {
            record.intent = Some(intent);
        }
        if let Some(outcome) = patch.outcome {
            record.outcome = Some(outcome);
        }
        if let Some(fields) = patch.fields {
            record.fields.merge(&fields);
        }
        if let Some(summary) = patch.summary {
            record.summary = Some(summary);
        }
        if let Some(transcript) = patch.transcript {
            record.transcript = Some(transcript);
        }
        if let Some(usage) = patch.usage {
            record.usage = usage;
        }
        record.updated_at = Utc::now();

        Ok(record.clone())
    }

    async fn get_call_record(&self, id: Uuid) -> Result<CallRecord, StorageError> {
        self.tables
            .read()
            .records
            .get(&id)
            .cloned()
            .ok_or(StorageError::CallNotFound(id))
    }

    async fn create_callback_task(
        &self,
        new: NewCallbackTask,
    ) -> Result<CallbackTask, StorageError> {
        let mut tables = self.tables.write();

        if !tables.records.contains_key(&new.call_id) {
            return Err(StorageError::CallNotFound(new.call_id));
        }

        let already_open = tables
            .tasks
            .values()
            .any(|t| t.call_id == new.call_id && t.status == TaskStatus::Open);
        if already_open {
            return Err(StorageError::DuplicateOpenTask(new.call_id));
        }

        let now = Utc::now();
        let task = CallbackTask {
            id: Uuid::new_v4(),
            call_id: new.call_id,
            priority: new.priority,
            assignee: None,
            name: new.name,
            callback_number: new.callback_number,
            best_time_window: new.best_time_window,
            notes: new.notes,
            status: TaskStatus::Open,
            created_at: now,
            updated_at: now,
        };
        tables.tasks.insert(task.id, task.clone());
        tracing::debug!(call_id = %task.call_id, task_id = %task.id, "callback task opened");
        Ok(task)
    }

    async fn get_open_callback_task(
        &self,
        call_id: Uuid,
    ) -> Result<Option<CallbackTask>, StorageError> {
        let tables = self.tables.read();
        Ok(tables
            .tasks
            .values()
            .find(|t| t.call_id == call_id && t.status == TaskStatus::Open)
            .cloned())
    }
}

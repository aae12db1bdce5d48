//! Staff notification interface

use async_trait::async_trait;
use uuid::Uuid;

use crate::records::TaskPriority;
use crate::Result;

/// Notification content dispatched to staff
#[derive(Debug, Clone)]
pub struct NotificationPayload {
    pub call_id: Uuid,
    pub subject: String,
    pub body: String,
    pub priority: TaskPriority,
}

/// Delivery result; failure is logged by the caller but never fails a call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    Delivered,
    Failed,
}

/// Outbound notification interface (SMS/email delivery lives behind it)
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn notify(&self, target: &str, payload: &NotificationPayload) -> Result<DeliveryStatus>;
}

//! Push delivery contract.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::CoreResult;

/// Largest number of messages a push channel accepts per call.
pub const MAX_NOTIFICATION_BATCH: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
}

/// One message addressed to a single device token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushMessage {
    pub token: String,
    pub notification: Notification,
    pub data: BTreeMap<String, String>,
}

/// Per-call delivery counts reported by the channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchResponse {
    pub success_count: usize,
    pub failure_count: usize,
}

/// Outbound push channel. Delivery is best-effort from the engine's side.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn max_batch_size(&self) -> usize {
        MAX_NOTIFICATION_BATCH
    }

    /// Sends up to [`NotificationChannel::max_batch_size`] messages in one call.
    async fn send_batch(&self, messages: Vec<PushMessage>) -> CoreResult<BatchResponse>;
}

/// Channel used when no push backend is configured: logs every message and
/// reports it delivered.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingChannel;

#[async_trait]
impl NotificationChannel for TracingChannel {
    async fn send_batch(&self, messages: Vec<PushMessage>) -> CoreResult<BatchResponse> {
        for message in &messages {
            info!(
                title = %message.notification.title,
                body = %message.notification.body,
                report_id = message.data.get("reportId").map(String::as_str).unwrap_or(""),
                "push notification"
            );
        }
        Ok(BatchResponse {
            success_count: messages.len(),
            failure_count: 0,
        })
    }
}

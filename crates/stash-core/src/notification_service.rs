//! Weekly trend messages and their best-effort delivery.

use std::{collections::BTreeMap, sync::Arc};

use stash_domain::WeeklyReport;
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::{
    batching::chunked,
    format::format_amount,
    notify::{Notification, NotificationChannel, PushMessage, MAX_NOTIFICATION_BATCH},
};

pub const WEEKLY_REPORT_TITLE: &str = "Your Weekly Savings Report";
pub const WEEKLY_REPORT_TYPE: &str = "weekly_report";

/// Body text for a weekly net change, e.g.
/// `Your savings decreased by $42.51 this week.`
pub fn weekly_body(net: f64) -> String {
    let trend = if net >= 0.0 { "increased" } else { "decreased" };
    format!(
        "Your savings {trend} by ${} this week.",
        format_amount(net.abs())
    )
}

/// Outcome of handing a set of messages to the channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliverySummary {
    pub attempted: usize,
    pub delivered: usize,
    pub chunks: usize,
    pub failed_chunks: usize,
}

/// Builds weekly report messages and dispatches them in capped, concurrent chunks.
#[derive(Clone)]
pub struct NotificationComposer {
    channel: Arc<dyn NotificationChannel>,
    title: String,
    batch_size: usize,
}

impl NotificationComposer {
    pub fn new(channel: Arc<dyn NotificationChannel>) -> Self {
        Self {
            channel,
            title: WEEKLY_REPORT_TITLE.to_string(),
            batch_size: MAX_NOTIFICATION_BATCH,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn compose_weekly(&self, token: &str, report: &WeeklyReport) -> PushMessage {
        let mut data = BTreeMap::new();
        data.insert("type".to_string(), WEEKLY_REPORT_TYPE.to_string());
        data.insert("reportId".to_string(), report.id.clone());
        PushMessage {
            token: token.to_string(),
            notification: Notification {
                title: self.title.clone(),
                body: weekly_body(report.net),
            },
            data,
        }
    }

    /// Sends every message; a failing chunk is logged and never affects the others.
    pub async fn dispatch(&self, messages: Vec<PushMessage>) -> DeliverySummary {
        let mut summary = DeliverySummary {
            attempted: messages.len(),
            ..DeliverySummary::default()
        };
        if messages.is_empty() {
            return summary;
        }

        let limit = self.batch_size.min(self.channel.max_batch_size()).max(1);
        let mut sends = JoinSet::new();
        for (index, chunk) in chunked(messages, limit).into_iter().enumerate() {
            let channel = Arc::clone(&self.channel);
            summary.chunks += 1;
            sends.spawn(async move { (index, channel.send_batch(chunk).await) });
        }

        while let Some(joined) = sends.join_next().await {
            match joined {
                Ok((_, Ok(response))) => summary.delivered += response.success_count,
                Ok((index, Err(err))) => {
                    summary.failed_chunks += 1;
                    error!(chunk = index, error = %err, "error sending notifications");
                }
                Err(err) => {
                    summary.failed_chunks += 1;
                    error!(error = %err, "notification task aborted");
                }
            }
        }

        info!(
            attempted = summary.attempted,
            delivered = summary.delivered,
            failed_chunks = summary.failed_chunks,
            "notifications dispatched"
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BatchResponse, CoreError, CoreResult};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use stash_domain::{DateWindow, WindowTotals};
    use std::sync::Mutex;

    struct FlakyChannel {
        calls: Mutex<Vec<usize>>,
        reject_call_with: usize,
    }

    #[async_trait]
    impl NotificationChannel for FlakyChannel {
        async fn send_batch(&self, messages: Vec<PushMessage>) -> CoreResult<BatchResponse> {
            assert!(messages.len() <= self.max_batch_size());
            self.calls.lock().unwrap().push(messages.len());
            if messages.len() == self.reject_call_with {
                return Err(CoreError::Notification("quota exceeded".into()));
            }
            Ok(BatchResponse {
                success_count: messages.len(),
                failure_count: 0,
            })
        }
    }

    fn message(n: usize) -> PushMessage {
        PushMessage {
            token: format!("token-{n}"),
            notification: Notification {
                title: WEEKLY_REPORT_TITLE.into(),
                body: weekly_body(n as f64),
            },
            data: BTreeMap::new(),
        }
    }

    #[test]
    fn body_reports_direction_and_absolute_cents() {
        assert_eq!(
            weekly_body(-42.505),
            "Your savings decreased by $42.51 this week."
        );
        assert_eq!(weekly_body(0.0), "Your savings increased by $0.00 this week.");
        assert_eq!(weekly_body(12.3), "Your savings increased by $12.30 this week.");
    }

    #[test]
    fn weekly_message_carries_report_payload() {
        let now = Utc.with_ymd_and_hms(2024, 4, 8, 12, 0, 0).unwrap();
        let window = DateWindow::trailing_days(now, 7).unwrap();
        let totals = WindowTotals {
            deposits: 20.0,
            withdrawals: 50.0,
        };
        let report = WeeklyReport::new("r-1", &window, &totals, now);
        let composer = NotificationComposer::new(Arc::new(crate::TracingChannel));

        let message = composer.compose_weekly("device", &report);
        assert_eq!(message.token, "device");
        assert_eq!(message.notification.title, WEEKLY_REPORT_TITLE);
        assert_eq!(
            message.notification.body,
            "Your savings decreased by $30.00 this week."
        );
        assert_eq!(message.data["type"], "weekly_report");
        assert_eq!(message.data["reportId"], "r-1");
    }

    #[tokio::test]
    async fn failed_chunk_does_not_stop_the_others() {
        let channel = Arc::new(FlakyChannel {
            calls: Mutex::new(Vec::new()),
            reject_call_with: 200,
        });
        let composer = NotificationComposer::new(channel.clone());
        let messages = (0..1_200).map(message).collect();

        let summary = composer.dispatch(messages).await;

        assert_eq!(summary.attempted, 1_200);
        assert_eq!(summary.chunks, 3);
        assert_eq!(summary.failed_chunks, 1);
        assert_eq!(summary.delivered, 1_000);
        let mut calls = channel.calls.lock().unwrap().clone();
        calls.sort_unstable();
        assert_eq!(calls, vec![200, 500, 500]);
    }

    #[tokio::test]
    async fn configured_batch_size_below_channel_cap_wins() {
        let channel = Arc::new(FlakyChannel {
            calls: Mutex::new(Vec::new()),
            reject_call_with: usize::MAX,
        });
        let composer = NotificationComposer::new(channel.clone()).with_batch_size(4);

        let summary = composer.dispatch((0..10).map(message).collect()).await;

        assert_eq!(summary.chunks, 3);
        assert_eq!(summary.delivered, 10);
        assert_eq!(summary.failed_chunks, 0);
    }
}

//! Trailing-week reports for users who opted into notifications.

use std::{collections::BTreeMap, sync::Arc};

use stash_domain::{DateWindow, User, WeeklyReport, WindowTotals};
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::{
    batching::commit_in_chunks, BatchWrite, Clock, CoreError, CoreResult, LedgerStore,
    NotificationComposer, MAX_BATCH_WRITES,
};

pub const DEFAULT_WEEKLY_WINDOW_DAYS: u32 = 7;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WeeklyRunOutcome {
    pub reports_written: usize,
    pub notifications_attempted: usize,
    pub notifications_delivered: usize,
    pub failed_notification_chunks: usize,
}

/// Deposit and withdrawal totals across all of a user's categories inside `window`.
pub async fn summarize_user_window(
    store: &dyn LedgerStore,
    user_id: &str,
    window: &DateWindow,
) -> CoreResult<WindowTotals> {
    let mut totals = WindowTotals::default();
    for category in store.list_categories(user_id).await? {
        let transactions = store
            .query_transactions(user_id, &category.id, window)
            .await?;
        totals.merge(&WindowTotals::from_transactions(&transactions));
    }
    Ok(totals)
}

/// Appends a `weeklyReports` document per opted-in user and notifies those
/// with a delivery token.
///
/// Report persistence and notification delivery are independent: reports are
/// committed first, and a failed delivery is logged without touching them.
pub struct WeeklyReportService {
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
    composer: NotificationComposer,
    window_days: u32,
    batch_size: usize,
}

impl WeeklyReportService {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        clock: Arc<dyn Clock>,
        composer: NotificationComposer,
    ) -> Self {
        Self {
            store,
            clock,
            composer,
            window_days: DEFAULT_WEEKLY_WINDOW_DAYS,
            batch_size: MAX_BATCH_WRITES,
        }
    }

    pub fn with_window_days(mut self, days: u32) -> Self {
        self.window_days = days;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub async fn run(&self) -> CoreResult<WeeklyRunOutcome> {
        let users = self.store.list_users_with_notifications().await?;
        if users.is_empty() {
            info!("no users with notifications enabled");
            return Ok(WeeklyRunOutcome::default());
        }

        let window = DateWindow::trailing_days(self.clock.now(), self.window_days)?;
        info!(
            users = users.len(),
            start = %window.start,
            end = %window.end,
            "computing weekly reports"
        );

        let mut tasks = JoinSet::new();
        for user in users {
            let store = Arc::clone(&self.store);
            tasks.spawn(async move {
                let totals = summarize_user_window(store.as_ref(), &user.id, &window).await?;
                Ok::<_, CoreError>((user, totals))
            });
        }

        let mut per_user: BTreeMap<String, (User, WindowTotals)> = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            let (user, totals) = joined??;
            per_user.insert(user.id.clone(), (user, totals));
        }

        let created_at = self.store.server_timestamp();
        let mut writes = Vec::with_capacity(per_user.len());
        let mut messages = Vec::new();
        for (user_id, (user, totals)) in per_user {
            let report = WeeklyReport::new(self.store.generate_id(), &window, &totals, created_at);
            debug!(user_id = %user_id, report_id = %report.id, net = report.net, "weekly report built");
            match user.delivery_token() {
                Some(token) => messages.push(self.composer.compose_weekly(token, &report)),
                None => debug!(user_id = %user_id, "no delivery token, skipping notification"),
            }
            writes.push(BatchWrite::WeeklyReport { user_id, report });
        }

        let reports_written =
            commit_in_chunks(self.store.as_ref(), writes, self.batch_size).await?;
        let delivery = self.composer.dispatch(messages).await;

        Ok(WeeklyRunOutcome {
            reports_written,
            notifications_attempted: delivery.attempted,
            notifications_delivered: delivery.delivered,
            failed_notification_chunks: delivery.failed_chunks,
        })
    }
}

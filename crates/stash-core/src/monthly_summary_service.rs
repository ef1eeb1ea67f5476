//! Calendar-month aggregation for every user.

use std::{collections::BTreeMap, sync::Arc};

use stash_domain::{
    CategorySummary, DateWindow, MonthKey, MonthlySummary, Timestamp, WindowTotals,
};
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::{
    batching::commit_in_chunks, BatchWrite, Clock, CoreError, CoreResult, LedgerStore,
    MAX_BATCH_WRITES,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthlyRunOutcome {
    pub month: MonthKey,
    pub summaries_written: usize,
}

/// Builds one user's summary for `month`. Every category is listed in
/// `byCategory`, including those without activity in the window.
pub async fn summarize_user_month(
    store: &dyn LedgerStore,
    user_id: &str,
    month: MonthKey,
    window: &DateWindow,
    created_at: Timestamp,
) -> CoreResult<MonthlySummary> {
    let mut totals = WindowTotals::default();
    let mut by_category = BTreeMap::new();

    for category in store.list_categories(user_id).await? {
        let transactions = store
            .query_transactions(user_id, &category.id, window)
            .await?;
        let category_totals = WindowTotals::from_transactions(&transactions);
        totals.merge(&category_totals);
        by_category.insert(
            category.id.clone(),
            CategorySummary::new(category.name.as_str(), &category_totals),
        );
    }

    debug!(user_id, month = %month, net = totals.net(), "monthly totals computed");
    Ok(MonthlySummary::new(month, &totals, by_category, created_at))
}

/// Writes `users/{user}/monthlySummaries/{YYYY-MM}` for every user.
///
/// Scheduled on the first of each month for the month that just ended. The
/// document id is the month key, so re-running a month overwrites it.
pub struct MonthlySummaryService {
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
    batch_size: usize,
}

impl MonthlySummaryService {
    pub fn new(store: Arc<dyn LedgerStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            batch_size: MAX_BATCH_WRITES,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Summarizes the calendar month (UTC) preceding the clock's current time.
    pub async fn run(&self) -> CoreResult<MonthlyRunOutcome> {
        let month = MonthKey::preceding(self.clock.now())?;
        self.run_for(month).await
    }

    pub async fn run_for(&self, month: MonthKey) -> CoreResult<MonthlyRunOutcome> {
        let window = month.window()?;
        let users = self.store.list_users().await?;
        info!(month = %month, users = users.len(), "computing monthly summaries");

        let created_at = self.store.server_timestamp();
        let mut tasks = JoinSet::new();
        for user in users {
            let store = Arc::clone(&self.store);
            tasks.spawn(async move {
                let summary =
                    summarize_user_month(store.as_ref(), &user.id, month, &window, created_at)
                        .await?;
                Ok::<_, CoreError>((user.id, summary))
            });
        }

        let mut summaries = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            let (user_id, summary) = joined??;
            summaries.insert(user_id, summary);
        }

        let writes: Vec<BatchWrite> = summaries
            .into_iter()
            .map(|(user_id, summary)| BatchWrite::MonthlySummary { user_id, summary })
            .collect();
        let summaries_written =
            commit_in_chunks(self.store.as_ref(), writes, self.batch_size).await?;

        info!(month = %month, summaries_written, "monthly summaries stored");
        Ok(MonthlyRunOutcome {
            month,
            summaries_written,
        })
    }
}

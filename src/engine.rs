//! Wires configuration, store, push channel and clock into the reactive
//! handlers and the scheduled jobs.

use std::sync::Arc;

use stash_config::Config;
use stash_core::{
    Clock, LedgerStore, MonthlyRunOutcome, MonthlySummaryService, NotificationChannel,
    NotificationComposer, SettleReport, SystemClock, TracingChannel, TriggerOutcome,
    TriggerRouter, WeeklyReportService, WeeklyRunOutcome, WriteEvent,
};
use stash_domain::MonthKey;
use stash_storage_json::JsonLedgerStore;
use tracing::info;

use crate::EngineError;

/// Entry points for a trigger or scheduler adapter.
pub struct AggregationEngine {
    store: Arc<dyn LedgerStore>,
    router: TriggerRouter,
    monthly: MonthlySummaryService,
    weekly: WeeklyReportService,
}

impl AggregationEngine {
    /// Opens the configured JSON snapshot with the wall clock and a logging-only channel.
    pub fn open(config: &Config) -> Result<Self, EngineError> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let path = config.store.resolve_snapshot_path();
        let store = JsonLedgerStore::open(path, Arc::clone(&clock))?
            .with_max_transaction_attempts(config.store.max_transaction_attempts)
            .with_max_batch_writes(config.store.max_batch_writes);
        Ok(Self::new(
            config,
            Arc::new(store),
            Arc::new(TracingChannel),
            clock,
        ))
    }

    pub fn new(
        config: &Config,
        store: Arc<dyn LedgerStore>,
        channel: Arc<dyn NotificationChannel>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let composer = NotificationComposer::new(channel)
            .with_title(config.jobs.notification_title.as_str())
            .with_batch_size(config.jobs.notification_batch_size);
        let monthly = MonthlySummaryService::new(Arc::clone(&store), Arc::clone(&clock))
            .with_batch_size(config.store.max_batch_writes);
        let weekly = WeeklyReportService::new(Arc::clone(&store), clock, composer)
            .with_window_days(config.jobs.weekly_window_days)
            .with_batch_size(config.store.max_batch_writes);
        Self {
            router: TriggerRouter::new(Arc::clone(&store)),
            store,
            monthly,
            weekly,
        }
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    /// Routes a single write event to its recalculation.
    pub async fn on_document_written(
        &self,
        event: &WriteEvent,
    ) -> Result<TriggerOutcome, EngineError> {
        Ok(self.router.dispatch(event).await?)
    }

    /// Processes pending write events until balances and totals are settled.
    pub async fn settle(&self) -> Result<SettleReport, EngineError> {
        let report = self.router.settle().await?;
        if report.events > 0 {
            info!(
                rounds = report.rounds,
                events = report.events,
                recalculations = report.recalculations,
                "write events settled"
            );
        }
        Ok(report)
    }

    /// Monthly tick: summarizes the calendar month that just ended.
    pub async fn run_monthly(&self) -> Result<MonthlyRunOutcome, EngineError> {
        Ok(self.monthly.run().await?)
    }

    pub async fn run_monthly_for(&self, month: MonthKey) -> Result<MonthlyRunOutcome, EngineError> {
        Ok(self.monthly.run_for(month).await?)
    }

    /// Weekly tick: appends reports and notifies opted-in users.
    pub async fn run_weekly(&self) -> Result<WeeklyRunOutcome, EngineError> {
        let outcome = self.weekly.run().await?;
        info!(
            reports = outcome.reports_written,
            delivered = outcome.notifications_delivered,
            "weekly run finished"
        );
        Ok(outcome)
    }
}

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use stash_domain::{
    Category, DateWindow, DocumentPath, MonthlySummary, Timestamp, Transaction, User,
    WeeklyReport,
};

use crate::CoreResult;

/// Per-commit document limit for batch writes.
pub const MAX_BATCH_WRITES: usize = 500;

/// Default number of attempts an atomic transaction gets before giving up on conflicts.
pub const DEFAULT_TRANSACTION_ATTEMPTS: usize = 5;

/// Body of an atomic read-modify-write.
///
/// The closure may run several times: the store re-invokes it with a fresh
/// scope whenever a concurrent writer touched something it read. It returns
/// the derived figure it wrote so the caller can log or report it.
pub type TransactionWork<'a> =
    &'a (dyn Fn(&mut dyn TransactionScope) -> CoreResult<f64> + Send + Sync);

/// Reads and staged writes available inside one atomic transaction.
///
/// All reads must happen before the first write.
pub trait TransactionScope {
    fn user(&mut self, user_id: &str) -> CoreResult<Option<User>>;
    fn categories(&mut self, user_id: &str) -> CoreResult<Vec<Category>>;
    fn transactions(&mut self, user_id: &str, category_id: &str) -> CoreResult<Vec<Transaction>>;
    fn set_category_amount(&mut self, user_id: &str, category_id: &str, amount: f64)
        -> CoreResult<()>;
    /// Stages `totalSavings` together with a server-stamped `lastUpdated`.
    fn set_user_savings(&mut self, user_id: &str, total_savings: f64) -> CoreResult<()>;
}

/// One document write inside a bulk commit.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchWrite {
    /// Full overwrite of `users/{user}/monthlySummaries/{YYYY-MM}`.
    MonthlySummary {
        user_id: String,
        summary: MonthlySummary,
    },
    /// Creation of `users/{user}/weeklyReports/{report.id}`.
    WeeklyReport {
        user_id: String,
        report: WeeklyReport,
    },
}

impl BatchWrite {
    pub fn path(&self) -> DocumentPath {
        match self {
            BatchWrite::MonthlySummary { user_id, summary } => {
                DocumentPath::monthly_summary(user_id.as_str(), summary.key())
            }
            BatchWrite::WeeklyReport { user_id, report } => {
                DocumentPath::weekly_report(user_id.as_str(), report.id.as_str())
            }
        }
    }
}

/// A document change as delivered to reactive handlers.
///
/// `before` is `None` for creations and `after` is `None` for deletions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteEvent {
    pub path: DocumentPath,
    pub before: Option<Value>,
    pub after: Option<Value>,
}

impl WriteEvent {
    pub fn new(path: DocumentPath, before: Option<Value>, after: Option<Value>) -> Self {
        Self {
            path,
            before,
            after,
        }
    }
}

/// Abstraction over the hierarchical document store holding every user's ledger.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn get_user(&self, user_id: &str) -> CoreResult<Option<User>>;

    async fn list_users(&self) -> CoreResult<Vec<User>>;

    /// Users whose `notificationsEnabled` flag is set.
    async fn list_users_with_notifications(&self) -> CoreResult<Vec<User>> {
        let users = self.list_users().await?;
        Ok(users
            .into_iter()
            .filter(|user| user.notifications_enabled)
            .collect())
    }

    async fn list_categories(&self, user_id: &str) -> CoreResult<Vec<Category>>;

    /// Transactions of one category whose `date` falls inside `window`.
    async fn query_transactions(
        &self,
        user_id: &str,
        category_id: &str,
        window: &DateWindow,
    ) -> CoreResult<Vec<Transaction>>;

    /// Runs `work` atomically against a consistent snapshot, retrying on conflict.
    async fn run_transaction(&self, work: TransactionWork<'_>) -> CoreResult<f64>;

    /// Applies every write or none of them.
    async fn commit_batch(&self, writes: Vec<BatchWrite>) -> CoreResult<()>;

    fn max_batch_writes(&self) -> usize {
        MAX_BATCH_WRITES
    }

    fn server_timestamp(&self) -> Timestamp;

    fn generate_id(&self) -> String;

    /// Removes and returns the write events recorded since the last drain.
    async fn drain_events(&self) -> CoreResult<Vec<WriteEvent>>;
}

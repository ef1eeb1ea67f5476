use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use stash_domain::{
    new_document_id, Category, DateWindow, DocumentPath, MonthKey, Timestamp, Transaction, User,
};

use crate::{
    BatchResponse, BatchWrite, CoreError, CoreResult, FixedClock, LedgerStore,
    MonthlySummaryService, NotificationChannel, NotificationComposer, PushMessage,
    TransactionScope, TransactionWork, TriggerOutcome, TriggerRouter, WeeklyReportService,
    WriteEvent,
};

#[derive(Default)]
struct Tree {
    users: BTreeMap<String, User>,
    categories: BTreeMap<(String, String), Category>,
    transactions: BTreeMap<(String, String), Vec<Transaction>>,
    committed: Vec<Vec<BatchWrite>>,
    events: Vec<WriteEvent>,
}

/// Single-threaded stand-in for the document store; no conflict detection.
struct FakeStore {
    tree: Mutex<Tree>,
    now: Timestamp,
    fail_commit_number: Option<usize>,
    commit_calls: Mutex<usize>,
    max_batch: usize,
}

impl FakeStore {
    fn new(now: Timestamp) -> Self {
        Self {
            tree: Mutex::new(Tree::default()),
            now,
            fail_commit_number: None,
            commit_calls: Mutex::new(0),
            max_batch: 500,
        }
    }

    fn add_user(&self, user: User) {
        self.tree.lock().unwrap().users.insert(user.id.clone(), user);
    }

    fn add_category(&self, user_id: &str, category: Category) {
        self.tree
            .lock()
            .unwrap()
            .categories
            .insert((user_id.to_string(), category.id.clone()), category);
    }

    fn add_transaction(&self, user_id: &str, category_id: &str, txn: Transaction) {
        self.tree
            .lock()
            .unwrap()
            .transactions
            .entry((user_id.to_string(), category_id.to_string()))
            .or_default()
            .push(txn);
    }

    fn committed(&self) -> Vec<BatchWrite> {
        self.tree
            .lock()
            .unwrap()
            .committed
            .iter()
            .flatten()
            .cloned()
            .collect()
    }
}

struct FakeScope<'a> {
    tree: &'a mut Tree,
    now: Timestamp,
}

impl TransactionScope for FakeScope<'_> {
    fn user(&mut self, user_id: &str) -> CoreResult<Option<User>> {
        Ok(self.tree.users.get(user_id).cloned())
    }

    fn categories(&mut self, user_id: &str) -> CoreResult<Vec<Category>> {
        Ok(self
            .tree
            .categories
            .iter()
            .filter(|((owner, _), _)| owner == user_id)
            .map(|(_, category)| category.clone())
            .collect())
    }

    fn transactions(&mut self, user_id: &str, category_id: &str) -> CoreResult<Vec<Transaction>> {
        Ok(self
            .tree
            .transactions
            .get(&(user_id.to_string(), category_id.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    fn set_category_amount(
        &mut self,
        user_id: &str,
        category_id: &str,
        amount: f64,
    ) -> CoreResult<()> {
        let key = (user_id.to_string(), category_id.to_string());
        let category = self
            .tree
            .categories
            .get_mut(&key)
            .ok_or_else(|| CoreError::NotFound(category_id.to_string()))?;
        category.amount = Some(amount);
        self.tree
            .events
            .push(WriteEvent::new(DocumentPath::category(user_id, category_id), None, None));
        Ok(())
    }

    fn set_user_savings(&mut self, user_id: &str, total_savings: f64) -> CoreResult<()> {
        let user = self
            .tree
            .users
            .get_mut(user_id)
            .ok_or_else(|| CoreError::NotFound(user_id.to_string()))?;
        user.total_savings = total_savings;
        user.last_updated = Some(self.now);
        self.tree
            .events
            .push(WriteEvent::new(DocumentPath::user(user_id), None, None));
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for FakeStore {
    async fn get_user(&self, user_id: &str) -> CoreResult<Option<User>> {
        Ok(self.tree.lock().unwrap().users.get(user_id).cloned())
    }

    async fn list_users(&self) -> CoreResult<Vec<User>> {
        Ok(self.tree.lock().unwrap().users.values().cloned().collect())
    }

    async fn list_categories(&self, user_id: &str) -> CoreResult<Vec<Category>> {
        let mut tree = self.tree.lock().unwrap();
        let mut scope = FakeScope {
            tree: &mut tree,
            now: self.now,
        };
        scope.categories(user_id)
    }

    async fn query_transactions(
        &self,
        user_id: &str,
        category_id: &str,
        window: &DateWindow,
    ) -> CoreResult<Vec<Transaction>> {
        let mut tree = self.tree.lock().unwrap();
        let mut scope = FakeScope {
            tree: &mut tree,
            now: self.now,
        };
        Ok(scope
            .transactions(user_id, category_id)?
            .into_iter()
            .filter(|txn| window.contains(txn.date))
            .collect())
    }

    async fn run_transaction(&self, work: TransactionWork<'_>) -> CoreResult<f64> {
        let mut tree = self.tree.lock().unwrap();
        let mut scope = FakeScope {
            tree: &mut tree,
            now: self.now,
        };
        work(&mut scope)
    }

    async fn commit_batch(&self, writes: Vec<BatchWrite>) -> CoreResult<()> {
        let call = {
            let mut calls = self.commit_calls.lock().unwrap();
            *calls += 1;
            *calls
        };
        if writes.len() > self.max_batch_writes() {
            return Err(CoreError::BatchTooLarge {
                size: writes.len(),
                limit: self.max_batch_writes(),
            });
        }
        if self.fail_commit_number == Some(call) {
            return Err(CoreError::Storage("deadline exceeded".into()));
        }
        self.tree.lock().unwrap().committed.push(writes);
        Ok(())
    }

    fn max_batch_writes(&self) -> usize {
        self.max_batch
    }

    fn server_timestamp(&self) -> Timestamp {
        self.now
    }

    fn generate_id(&self) -> String {
        new_document_id()
    }

    async fn drain_events(&self) -> CoreResult<Vec<WriteEvent>> {
        Ok(std::mem::take(&mut self.tree.lock().unwrap().events))
    }
}

#[derive(Default)]
struct RecordingChannel {
    sent: Mutex<Vec<PushMessage>>,
    fail: bool,
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    async fn send_batch(&self, messages: Vec<PushMessage>) -> CoreResult<BatchResponse> {
        if self.fail {
            return Err(CoreError::Notification("channel unavailable".into()));
        }
        let count = messages.len();
        self.sent.lock().unwrap().extend(messages);
        Ok(BatchResponse {
            success_count: count,
            failure_count: 0,
        })
    }
}

fn monday_morning() -> Timestamp {
    Utc.with_ymd_and_hms(2024, 4, 8, 12, 0, 0).unwrap()
}

fn weekly_service(
    store: &Arc<FakeStore>,
    channel: &Arc<RecordingChannel>,
) -> WeeklyReportService {
    WeeklyReportService::new(
        store.clone(),
        Arc::new(FixedClock::new(monday_morning())),
        NotificationComposer::new(channel.clone()),
    )
}

fn seeded_store() -> Arc<FakeStore> {
    let store = Arc::new(FakeStore::new(monday_morning()));
    store.add_user(User::new("alice").with_notifications(Some("token-a")));
    store.add_user(User::new("bob").with_notifications(None));
    store.add_user(User::new("carol"));
    for user in ["alice", "bob", "carol"] {
        store.add_category(user, Category::new("Main").with_id("main"));
        store.add_transaction(
            user,
            "main",
            Transaction::withdrawal(42.505, monday_morning() - Duration::days(2)),
        );
    }
    store
}

#[tokio::test]
async fn weekly_run_honours_skip_policy() {
    let store = seeded_store();
    let channel = Arc::new(RecordingChannel::default());

    let outcome = weekly_service(&store, &channel).run().await.unwrap();

    assert_eq!(outcome.reports_written, 2);
    let users: Vec<String> = store
        .committed()
        .iter()
        .map(|write| write.path().user_id().to_string())
        .collect();
    assert_eq!(users, vec!["alice".to_string(), "bob".to_string()]);

    let sent = channel.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].token, "token-a");
    assert_eq!(
        sent[0].notification.body,
        "Your savings decreased by $42.51 this week."
    );
}

#[tokio::test]
async fn weekly_run_appends_a_new_report_each_time() {
    let store = seeded_store();
    let channel = Arc::new(RecordingChannel::default());
    let service = weekly_service(&store, &channel);

    service.run().await.unwrap();
    service.run().await.unwrap();

    let reports: Vec<_> = store
        .committed()
        .into_iter()
        .filter_map(|write| match write {
            BatchWrite::WeeklyReport { user_id, report } if user_id == "alice" => Some(report),
            _ => None,
        })
        .collect();
    assert_eq!(reports.len(), 2);
    assert_ne!(reports[0].id, reports[1].id);
    assert_eq!(reports[0].net, reports[1].net);
    assert_eq!(reports[0].start_date, reports[1].start_date);
}

#[tokio::test]
async fn weekly_run_without_opted_in_users_writes_nothing() {
    let store = Arc::new(FakeStore::new(monday_morning()));
    store.add_user(User::new("dave"));
    let channel = Arc::new(RecordingChannel::default());

    let outcome = weekly_service(&store, &channel).run().await.unwrap();

    assert_eq!(outcome, Default::default());
    assert_eq!(*store.commit_calls.lock().unwrap(), 0);
}

#[tokio::test]
async fn delivery_failure_keeps_committed_reports() {
    let store = seeded_store();
    let channel = Arc::new(RecordingChannel {
        sent: Mutex::new(Vec::new()),
        fail: true,
    });

    let outcome = weekly_service(&store, &channel).run().await.unwrap();

    assert_eq!(outcome.reports_written, 2);
    assert_eq!(outcome.notifications_attempted, 1);
    assert_eq!(outcome.notifications_delivered, 0);
    assert_eq!(outcome.failed_notification_chunks, 1);
    assert_eq!(store.committed().len(), 2);
}

#[tokio::test]
async fn failed_report_commit_suppresses_notifications() {
    let mut store = FakeStore::new(monday_morning());
    store.fail_commit_number = Some(1);
    let store = Arc::new(store);
    store.add_user(User::new("erin").with_notifications(Some("token-e")));
    let channel = Arc::new(RecordingChannel::default());

    let err = weekly_service(&store, &channel).run().await.unwrap_err();

    assert!(matches!(err, CoreError::PartialCommit { .. }), "{err:?}");
    assert!(channel.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn monthly_run_attempts_every_chunk_and_reports_failures() {
    let mut store = FakeStore::new(monday_morning());
    store.fail_commit_number = Some(2);
    store.max_batch = 2;
    let store = Arc::new(store);
    for n in 0..5 {
        store.add_user(User::new(format!("user-{n}")));
    }
    let service = MonthlySummaryService::new(store.clone(), Arc::new(FixedClock::new(monday_morning())));

    let err = service.run().await.unwrap_err();

    match err {
        CoreError::PartialCommit {
            failed_chunks,
            total_chunks,
            ..
        } => {
            assert_eq!(failed_chunks, vec![1]);
            assert_eq!(total_chunks, 3);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(*store.commit_calls.lock().unwrap(), 3);
    assert_eq!(store.committed().len(), 3);
}

#[tokio::test]
async fn monthly_run_targets_previous_month() {
    let store = seeded_store();
    let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()));
    let service = MonthlySummaryService::new(store.clone(), clock);

    let outcome = service.run().await.unwrap();

    assert_eq!(outcome.month, MonthKey::new(2024, 4).unwrap());
    assert_eq!(outcome.summaries_written, 3);
    match &store.committed()[0] {
        BatchWrite::MonthlySummary { user_id, summary } => {
            assert_eq!(user_id, "alice");
            assert_eq!(summary.key(), "2024-04");
            assert_eq!(summary.withdrawals, 42.505);
            assert_eq!(summary.by_category["main"].name, "Main");
        }
        other => panic!("unexpected write: {other:?}"),
    }
}

#[tokio::test]
async fn router_chains_balance_into_savings() {
    let store = Arc::new(FakeStore::new(monday_morning()));
    store.add_user(User::new("frank"));
    store.add_category("frank", Category::new("Rainy day").with_id("rainy"));
    store.add_category("frank", Category::new("Holiday").with_id("holiday").with_amount(-10.0));
    for txn in [
        Transaction::deposit(100.0, monday_morning()),
        Transaction::withdrawal(30.0, monday_morning()),
        Transaction::deposit(5.0, monday_morning()),
    ] {
        store.add_transaction("frank", "rainy", txn);
    }
    let router = TriggerRouter::new(store.clone());

    let event = WriteEvent::new(DocumentPath::transaction("frank", "rainy", "t1"), None, None);
    let outcome = router.dispatch(&event).await.unwrap();
    assert_eq!(
        outcome,
        TriggerOutcome::CategoryBalance {
            user_id: "frank".into(),
            category_id: "rainy".into(),
            balance: 75.0,
        }
    );

    let report = router.settle().await.unwrap();
    assert_eq!(report.recalculations, 1);
    let user = store.get_user("frank").await.unwrap().unwrap();
    assert_eq!(user.total_savings, 65.0);
    assert_eq!(user.last_updated, Some(monday_morning()));

    let ignored = WriteEvent::new(DocumentPath::user("frank"), None, None);
    assert_eq!(router.dispatch(&ignored).await.unwrap(), TriggerOutcome::Ignored);
}

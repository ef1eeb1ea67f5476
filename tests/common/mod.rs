#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use stash::AggregationEngine;
use stash_config::Config;
use stash_core::{
    BatchResponse, CoreResult, FixedClock, LedgerStore, NotificationChannel, PushMessage,
};
use stash_domain::{Category, Timestamp, Transaction, User};
use stash_storage_json::JsonLedgerStore;
use tempfile::TempDir;

/// Channel that keeps every message it is handed.
#[derive(Default)]
pub struct RecordingChannel {
    pub sent: Mutex<Vec<PushMessage>>,
}

impl RecordingChannel {
    pub fn messages(&self) -> Vec<PushMessage> {
        self.sent.lock().expect("channel lock").clone()
    }
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    async fn send_batch(&self, messages: Vec<PushMessage>) -> CoreResult<BatchResponse> {
        let count = messages.len();
        self.sent.lock().expect("channel lock").extend(messages);
        Ok(BatchResponse {
            success_count: count,
            failure_count: 0,
        })
    }
}

/// An engine over a file-backed store in its own temp directory.
pub struct Harness {
    pub dir: TempDir,
    pub clock: Arc<FixedClock>,
    pub store: Arc<JsonLedgerStore>,
    pub channel: Arc<RecordingChannel>,
    pub engine: AggregationEngine,
}

pub fn utc(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Timestamp {
    Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
        .single()
        .expect("valid timestamp")
}

pub fn harness_at(now: Timestamp) -> Harness {
    harness_with(now, |store| store)
}

/// Builds a harness whose engine talks to `wrap(store)` instead of the store itself.
pub fn harness_with(
    now: Timestamp,
    wrap: impl FnOnce(Arc<dyn LedgerStore>) -> Arc<dyn LedgerStore>,
) -> Harness {
    let dir = TempDir::new().expect("create temp dir");
    let clock = Arc::new(FixedClock::new(now));
    let store = Arc::new(
        JsonLedgerStore::open(dir.path().join("ledger.json"), clock.clone())
            .expect("open ledger store"),
    );
    let channel = Arc::new(RecordingChannel::default());
    let shared: Arc<dyn LedgerStore> = store.clone();
    let engine = AggregationEngine::new(
        &Config::default(),
        wrap(shared),
        channel.clone(),
        clock.clone(),
    );
    Harness {
        dir,
        clock,
        store,
        channel,
        engine,
    }
}

impl Harness {
    pub fn user(&self, user: User) {
        self.store.put_user(user).expect("put user");
    }

    pub fn category(&self, user_id: &str, category_id: &str, name: &str) {
        self.store
            .put_category(user_id, Category::new(name).with_id(category_id))
            .expect("put category");
    }

    pub fn deposit(&self, user_id: &str, category_id: &str, amount: f64, at: Timestamp) -> String {
        self.store
            .put_transaction(user_id, category_id, Transaction::deposit(amount, at))
            .expect("put deposit")
    }

    pub fn withdrawal(
        &self,
        user_id: &str,
        category_id: &str,
        amount: f64,
        at: Timestamp,
    ) -> String {
        self.store
            .put_transaction(user_id, category_id, Transaction::withdrawal(amount, at))
            .expect("put withdrawal")
    }

    pub async fn settle(&self) {
        self.engine.settle().await.expect("settle");
    }
}

//! In-process ledger document store with JSON snapshot persistence.
//!
//! The tree mirrors `users/{user}/categories/{category}/transactions/{txn}`
//! plus the `monthlySummaries` and `weeklyReports` sub-collections. Every
//! document change is recorded in an outbox that [`LedgerStore::drain_events`]
//! hands to the trigger router.

mod scope;
mod tree;

use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use stash_core::{
    BatchWrite, Clock, CoreError, CoreResult, LedgerStore, TransactionWork, WriteEvent,
    DEFAULT_TRANSACTION_ATTEMPTS, MAX_BATCH_WRITES,
};
use stash_domain::{
    new_document_id, Category, DateWindow, DocumentPath, MonthlySummary, Timestamp, Transaction,
    User, WeeklyReport,
};
use tracing::{debug, info, warn};

use crate::{
    scope::{JsonScope, StagedWrite},
    tree::{CategoryNode, LedgerTree, ReadMark, UserNode},
};

const TMP_SUFFIX: &str = "tmp";

/// Filesystem-backed JSON document store for every user's ledger.
///
/// Without a snapshot path the store lives purely in memory. With one, every
/// committed change is written through to disk atomically.
///
/// Each commit clones the tree and rewrites the whole snapshot with blocking
/// `std::fs` calls while the write lock is held, so the store is meant for
/// small ledgers. Larger deployments belong behind another [`LedgerStore`].
pub struct JsonLedgerStore {
    tree: RwLock<LedgerTree>,
    events: Mutex<Vec<WriteEvent>>,
    clock: Arc<dyn Clock>,
    snapshot_path: Option<PathBuf>,
    max_attempts: usize,
    max_batch_writes: usize,
}

impl JsonLedgerStore {
    pub fn in_memory(clock: Arc<dyn Clock>) -> Self {
        Self::with_tree(LedgerTree::default(), clock, None)
    }

    /// Opens the snapshot at `path`, starting empty when the file does not exist yet.
    pub fn open(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> CoreResult<Self> {
        let path = path.into();
        let tree = if path.exists() {
            load_tree_from_path(&path)?
        } else {
            LedgerTree::default()
        };
        info!(path = %path.display(), users = tree.users.len(), "ledger store opened");
        Ok(Self::with_tree(tree, clock, Some(path)))
    }

    fn with_tree(tree: LedgerTree, clock: Arc<dyn Clock>, snapshot_path: Option<PathBuf>) -> Self {
        Self {
            tree: RwLock::new(tree),
            events: Mutex::new(Vec::new()),
            clock,
            snapshot_path,
            max_attempts: DEFAULT_TRANSACTION_ATTEMPTS,
            max_batch_writes: MAX_BATCH_WRITES,
        }
    }

    pub fn with_max_transaction_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_max_batch_writes(mut self, limit: usize) -> Self {
        self.max_batch_writes = limit.max(1);
        self
    }

    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }

    /// Writes the whole tree to `path`, independent of the configured snapshot.
    pub fn save_to_path(&self, path: &Path) -> CoreResult<()> {
        let tree = self.read_tree()?;
        save_tree_to_path(&tree, path)
    }

    /// Creates or replaces a user document, keeping its sub-collections.
    pub fn put_user(&self, user: User) -> CoreResult<()> {
        let mut guard = self.write_tree()?;
        let mut tree = guard.clone();
        let path = DocumentPath::user(user.id.as_str());
        let after = to_value(&user)?;
        let before = match tree.users.get_mut(&user.id) {
            Some(node) => {
                let before = to_value(&node.user)?;
                node.user = user;
                node.version += 1;
                Some(before)
            }
            None => {
                tree.users.insert(user.id.clone(), UserNode::new(user));
                None
            }
        };
        self.finish_write(&mut guard, tree, vec![WriteEvent::new(path, before, Some(after))])
    }

    /// Creates or replaces a category, keeping its transactions. Returns its id.
    pub fn put_category(&self, user_id: &str, mut category: Category) -> CoreResult<String> {
        if category.id.is_empty() {
            category.id = new_document_id();
        }
        let mut guard = self.write_tree()?;
        let mut tree = guard.clone();
        let node = user_node_mut(&mut tree, user_id)?;
        let id = category.id.clone();
        let after = to_value(&category)?;
        let before = match node.categories.get_mut(&id) {
            Some(existing) => {
                let before = to_value(&existing.category)?;
                existing.category = category;
                Some(before)
            }
            None => {
                node.categories.insert(id.clone(), CategoryNode::new(category));
                None
            }
        };
        node.categories_version += 1;
        let path = DocumentPath::category(user_id, id.as_str());
        let event = WriteEvent::new(path, before, Some(after));
        self.finish_write(&mut guard, tree, vec![event])?;
        Ok(id)
    }

    /// Removes a category together with its transactions.
    pub fn delete_category(&self, user_id: &str, category_id: &str) -> CoreResult<bool> {
        let mut guard = self.write_tree()?;
        let mut tree = guard.clone();
        let node = user_node_mut(&mut tree, user_id)?;
        let Some(removed) = node.categories.remove(category_id) else {
            return Ok(false);
        };
        node.categories_version += 1;
        let before = to_value(&removed.category)?;
        let path = DocumentPath::category(user_id, category_id);
        let event = WriteEvent::new(path, Some(before), None);
        self.finish_write(&mut guard, tree, vec![event])?;
        Ok(true)
    }

    /// Creates or replaces a transaction. Returns its id.
    pub fn put_transaction(
        &self,
        user_id: &str,
        category_id: &str,
        mut transaction: Transaction,
    ) -> CoreResult<String> {
        if transaction.id.is_empty() {
            transaction.id = new_document_id();
        }
        let mut guard = self.write_tree()?;
        let mut tree = guard.clone();
        let node = category_node_mut(&mut tree, user_id, category_id)?;
        let id = transaction.id.clone();
        let after = to_value(&transaction)?;
        let before = node
            .transactions
            .insert(id.clone(), transaction)
            .map(|previous| to_value(&previous))
            .transpose()?;
        node.transactions_version += 1;
        let path = DocumentPath::transaction(user_id, category_id, id.as_str());
        self.finish_write(&mut guard, tree, vec![WriteEvent::new(path, before, Some(after))])?;
        Ok(id)
    }

    pub fn delete_transaction(
        &self,
        user_id: &str,
        category_id: &str,
        transaction_id: &str,
    ) -> CoreResult<bool> {
        let mut guard = self.write_tree()?;
        let mut tree = guard.clone();
        let node = category_node_mut(&mut tree, user_id, category_id)?;
        let Some(removed) = node.transactions.remove(transaction_id) else {
            return Ok(false);
        };
        node.transactions_version += 1;
        let path = DocumentPath::transaction(user_id, category_id, transaction_id);
        let event = WriteEvent::new(path, Some(to_value(&removed)?), None);
        self.finish_write(&mut guard, tree, vec![event])?;
        Ok(true)
    }

    pub fn category(&self, user_id: &str, category_id: &str) -> CoreResult<Option<Category>> {
        let tree = self.read_tree()?;
        Ok(tree
            .users
            .get(user_id)
            .and_then(|node| node.categories.get(category_id))
            .map(|node| node.category.clone()))
    }

    pub fn monthly_summary(
        &self,
        user_id: &str,
        month_key: &str,
    ) -> CoreResult<Option<MonthlySummary>> {
        let tree = self.read_tree()?;
        Ok(tree
            .users
            .get(user_id)
            .and_then(|node| node.monthly_summaries.get(month_key))
            .cloned())
    }

    /// Weekly reports for a user, oldest first.
    pub fn weekly_reports(&self, user_id: &str) -> CoreResult<Vec<WeeklyReport>> {
        let tree = self.read_tree()?;
        let mut reports: Vec<WeeklyReport> = tree
            .users
            .get(user_id)
            .map(|node| node.weekly_reports.values().cloned().collect())
            .unwrap_or_default();
        reports.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(reports)
    }

    pub(crate) fn read_tree(&self) -> CoreResult<RwLockReadGuard<'_, LedgerTree>> {
        self.tree
            .read()
            .map_err(|_| CoreError::Storage("ledger tree lock poisoned".into()))
    }

    fn write_tree(&self) -> CoreResult<RwLockWriteGuard<'_, LedgerTree>> {
        self.tree
            .write()
            .map_err(|_| CoreError::Storage("ledger tree lock poisoned".into()))
    }

    /// Installs `next` over `current` once it is persisted (when backed by a
    /// file), then queues the change events. A failed save leaves `current`
    /// and the outbox untouched.
    fn finish_write(
        &self,
        current: &mut LedgerTree,
        next: LedgerTree,
        events: Vec<WriteEvent>,
    ) -> CoreResult<()> {
        if let Some(path) = &self.snapshot_path {
            save_tree_to_path(&next, path)?;
        }
        *current = next;
        if events.is_empty() {
            return Ok(());
        }
        let mut outbox = self
            .events
            .lock()
            .map_err(|_| CoreError::Storage("event outbox lock poisoned".into()))?;
        outbox.extend(events);
        Ok(())
    }

    /// Commits one transaction attempt. `Ok(false)` means a read went stale.
    fn apply_staged(&self, reads: &[ReadMark], writes: Vec<StagedWrite>) -> CoreResult<bool> {
        let mut guard = self.write_tree()?;
        if !reads.iter().all(|mark| guard.still_valid(mark)) {
            return Ok(false);
        }
        let mut tree = guard.clone();
        let now = self.clock.now();
        let mut events = Vec::with_capacity(writes.len());
        for write in writes {
            match write {
                StagedWrite::CategoryAmount {
                    user_id,
                    category_id,
                    amount,
                } => {
                    let user = user_node_mut(&mut tree, &user_id)?;
                    user.categories_version += 1;
                    let node = user.categories.get_mut(&category_id).ok_or_else(|| {
                        not_found(DocumentPath::category(
                            user_id.as_str(),
                            category_id.as_str(),
                        ))
                    })?;
                    let before = to_value(&node.category)?;
                    node.category.amount = Some(amount);
                    let after = to_value(&node.category)?;
                    events.push(WriteEvent::new(
                        DocumentPath::category(user_id, category_id),
                        Some(before),
                        Some(after),
                    ));
                }
                StagedWrite::UserSavings {
                    user_id,
                    total_savings,
                } => {
                    let node = user_node_mut(&mut tree, &user_id)?;
                    let before = to_value(&node.user)?;
                    node.user.total_savings = total_savings;
                    node.user.last_updated = Some(now);
                    node.version += 1;
                    let after = to_value(&node.user)?;
                    events.push(WriteEvent::new(
                        DocumentPath::user(user_id),
                        Some(before),
                        Some(after),
                    ));
                }
            }
        }
        self.finish_write(&mut guard, tree, events)?;
        Ok(true)
    }
}

#[async_trait]
impl LedgerStore for JsonLedgerStore {
    async fn get_user(&self, user_id: &str) -> CoreResult<Option<User>> {
        let tree = self.read_tree()?;
        Ok(tree.users.get(user_id).map(|node| node.user.clone()))
    }

    async fn list_users(&self) -> CoreResult<Vec<User>> {
        let tree = self.read_tree()?;
        Ok(tree.users.values().map(|node| node.user.clone()).collect())
    }

    async fn list_categories(&self, user_id: &str) -> CoreResult<Vec<Category>> {
        let tree = self.read_tree()?;
        Ok(tree
            .users
            .get(user_id)
            .map(|node| {
                node.categories
                    .values()
                    .map(|category| category.category.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn query_transactions(
        &self,
        user_id: &str,
        category_id: &str,
        window: &DateWindow,
    ) -> CoreResult<Vec<Transaction>> {
        let tree = self.read_tree()?;
        let mut matches: Vec<Transaction> = tree
            .users
            .get(user_id)
            .and_then(|node| node.categories.get(category_id))
            .map(|node| {
                node.transactions
                    .values()
                    .filter(|txn| window.contains(txn.date))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        matches.sort_by_key(|txn| txn.date);
        Ok(matches)
    }

    async fn run_transaction(&self, work: TransactionWork<'_>) -> CoreResult<f64> {
        for attempt in 1..=self.max_attempts {
            let (value, reads, writes) = {
                let mut scope = JsonScope::new(self);
                let value = work(&mut scope)?;
                (value, scope.reads, scope.writes)
            };
            if self.apply_staged(&reads, writes)? {
                debug!(attempt, "transaction committed");
                return Ok(value);
            }
            warn!(attempt, max_attempts = self.max_attempts, "transaction conflict, retrying");
            tokio::task::yield_now().await;
        }
        Err(CoreError::Conflict {
            attempts: self.max_attempts,
        })
    }

    async fn commit_batch(&self, writes: Vec<BatchWrite>) -> CoreResult<()> {
        if writes.len() > self.max_batch_writes {
            return Err(CoreError::BatchTooLarge {
                size: writes.len(),
                limit: self.max_batch_writes,
            });
        }
        let mut guard = self.write_tree()?;
        if let Some(orphan) = writes
            .iter()
            .map(BatchWrite::path)
            .find(|path| !guard.users.contains_key(path.user_id()))
        {
            return Err(not_found(orphan));
        }
        let mut tree = guard.clone();

        let size = writes.len();
        let mut events = Vec::with_capacity(size);
        for write in writes {
            let path = write.path();
            match write {
                BatchWrite::MonthlySummary { user_id, summary } => {
                    let node = user_node_mut(&mut tree, &user_id)?;
                    let after = to_value(&summary)?;
                    let before = node
                        .monthly_summaries
                        .insert(summary.key(), summary)
                        .map(|previous| to_value(&previous))
                        .transpose()?;
                    events.push(WriteEvent::new(path, before, Some(after)));
                }
                BatchWrite::WeeklyReport { user_id, report } => {
                    let node = user_node_mut(&mut tree, &user_id)?;
                    let after = to_value(&report)?;
                    let before = node
                        .weekly_reports
                        .insert(report.id.clone(), report)
                        .map(|previous| to_value(&previous))
                        .transpose()?;
                    events.push(WriteEvent::new(path, before, Some(after)));
                }
            }
        }
        self.finish_write(&mut guard, tree, events)?;
        debug!(size, "batch committed");
        Ok(())
    }

    fn max_batch_writes(&self) -> usize {
        self.max_batch_writes
    }

    fn server_timestamp(&self) -> Timestamp {
        self.clock.now()
    }

    fn generate_id(&self) -> String {
        new_document_id()
    }

    async fn drain_events(&self) -> CoreResult<Vec<WriteEvent>> {
        let mut outbox = self
            .events
            .lock()
            .map_err(|_| CoreError::Storage("event outbox lock poisoned".into()))?;
        Ok(std::mem::take(&mut *outbox))
    }
}

fn user_node_mut<'t>(tree: &'t mut LedgerTree, user_id: &str) -> CoreResult<&'t mut UserNode> {
    tree.users
        .get_mut(user_id)
        .ok_or_else(|| not_found(DocumentPath::user(user_id)))
}

fn category_node_mut<'t>(
    tree: &'t mut LedgerTree,
    user_id: &str,
    category_id: &str,
) -> CoreResult<&'t mut CategoryNode> {
    user_node_mut(tree, user_id)?
        .categories
        .get_mut(category_id)
        .ok_or_else(|| not_found(DocumentPath::category(user_id, category_id)))
}

fn not_found(path: DocumentPath) -> CoreError {
    CoreError::NotFound(path.to_string())
}

fn to_value<T: Serialize>(document: &T) -> CoreResult<Value> {
    Ok(serde_json::to_value(document)?)
}

/// Loads a tree snapshot, re-deriving document ids from their keys.
fn load_tree_from_path(path: &Path) -> CoreResult<LedgerTree> {
    let data = fs::read_to_string(path)?;
    let mut tree: LedgerTree = serde_json::from_str(&data)?;
    for (user_id, node) in tree.users.iter_mut() {
        node.user.id = user_id.clone();
        for (category_id, category) in node.categories.iter_mut() {
            category.category.id = category_id.clone();
            for (txn_id, txn) in category.transactions.iter_mut() {
                txn.id = txn_id.clone();
            }
        }
        for (report_id, report) in node.weekly_reports.iter_mut() {
            report.id = report_id.clone();
        }
    }
    Ok(tree)
}

fn save_tree_to_path(tree: &LedgerTree, path: &Path) -> CoreResult<()> {
    let data = serde_json::to_string_pretty(tree)?;
    let tmp = tmp_path(path);
    write_atomic(&tmp, &data)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.to_path_buf();
    let ext = match path.extension().and_then(|ext| ext.to_str()) {
        Some(existing) => format!("{}.{}", existing, TMP_SUFFIX),
        None => TMP_SUFFIX.to_string(),
    };
    tmp.set_extension(ext);
    tmp
}

fn write_atomic(path: &Path, data: &str) -> CoreResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    file.write_all(data.as_bytes())?;
    file.flush()?;
    Ok(())
}

//! Persisted shape of the document tree.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use stash_domain::{Category, MonthlySummary, Transaction, User, WeeklyReport};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LedgerTree {
    #[serde(default)]
    pub users: BTreeMap<String, UserNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UserNode {
    pub user: User,
    #[serde(default)]
    pub categories: BTreeMap<String, CategoryNode>,
    #[serde(default)]
    pub monthly_summaries: BTreeMap<String, MonthlySummary>,
    #[serde(default)]
    pub weekly_reports: BTreeMap<String, WeeklyReport>,
    /// Bumped on every write to the user document.
    #[serde(default)]
    pub version: u64,
    /// Bumped whenever any category document under the user changes.
    #[serde(default)]
    pub categories_version: u64,
}

impl UserNode {
    pub fn new(user: User) -> Self {
        Self {
            user,
            categories: BTreeMap::new(),
            monthly_summaries: BTreeMap::new(),
            weekly_reports: BTreeMap::new(),
            version: 0,
            categories_version: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CategoryNode {
    pub category: Category,
    #[serde(default)]
    pub transactions: BTreeMap<String, Transaction>,
    /// Bumped whenever a transaction in this category is created, updated or deleted.
    #[serde(default)]
    pub transactions_version: u64,
}

impl CategoryNode {
    pub fn new(category: Category) -> Self {
        Self {
            category,
            transactions: BTreeMap::new(),
            transactions_version: 0,
        }
    }
}

/// A version observed by a transaction read. `None` records that the
/// document or collection owner was absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ReadMark {
    User {
        user_id: String,
        version: Option<u64>,
    },
    Categories {
        user_id: String,
        version: Option<u64>,
    },
    Transactions {
        user_id: String,
        category_id: String,
        version: Option<u64>,
    },
}

impl LedgerTree {
    pub fn user_version(&self, user_id: &str) -> Option<u64> {
        self.users.get(user_id).map(|node| node.version)
    }

    pub fn categories_version(&self, user_id: &str) -> Option<u64> {
        self.users.get(user_id).map(|node| node.categories_version)
    }

    pub fn transactions_version(&self, user_id: &str, category_id: &str) -> Option<u64> {
        self.users
            .get(user_id)
            .and_then(|node| node.categories.get(category_id))
            .map(|node| node.transactions_version)
    }

    /// True when nothing a transaction read has changed since it was read.
    pub fn still_valid(&self, mark: &ReadMark) -> bool {
        match mark {
            ReadMark::User { user_id, version } => self.user_version(user_id) == *version,
            ReadMark::Categories { user_id, version } => {
                self.categories_version(user_id) == *version
            }
            ReadMark::Transactions {
                user_id,
                category_id,
                version,
            } => self.transactions_version(user_id, category_id) == *version,
        }
    }
}

use stash_core::{CoreError, CoreResult, TransactionScope};
use stash_domain::{Category, Transaction, User};

use crate::{tree::ReadMark, JsonLedgerStore};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum StagedWrite {
    CategoryAmount {
        user_id: String,
        category_id: String,
        amount: f64,
    },
    UserSavings {
        user_id: String,
        total_savings: f64,
    },
}

/// One attempt of an optimistic transaction: versioned reads, buffered writes.
pub(crate) struct JsonScope<'a> {
    store: &'a JsonLedgerStore,
    pub reads: Vec<ReadMark>,
    pub writes: Vec<StagedWrite>,
}

impl<'a> JsonScope<'a> {
    pub fn new(store: &'a JsonLedgerStore) -> Self {
        Self {
            store,
            reads: Vec::new(),
            writes: Vec::new(),
        }
    }

    fn ensure_reading(&self) -> CoreResult<()> {
        if self.writes.is_empty() {
            Ok(())
        } else {
            Err(CoreError::InvalidOperation(
                "transactions must perform all reads before any write".into(),
            ))
        }
    }
}

impl TransactionScope for JsonScope<'_> {
    fn user(&mut self, user_id: &str) -> CoreResult<Option<User>> {
        self.ensure_reading()?;
        let tree = self.store.read_tree()?;
        let node = tree.users.get(user_id);
        self.reads.push(ReadMark::User {
            user_id: user_id.to_string(),
            version: node.map(|node| node.version),
        });
        Ok(node.map(|node| node.user.clone()))
    }

    fn categories(&mut self, user_id: &str) -> CoreResult<Vec<Category>> {
        self.ensure_reading()?;
        let tree = self.store.read_tree()?;
        self.reads.push(ReadMark::Categories {
            user_id: user_id.to_string(),
            version: tree.categories_version(user_id),
        });
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

    fn transactions(&mut self, user_id: &str, category_id: &str) -> CoreResult<Vec<Transaction>> {
        self.ensure_reading()?;
        let tree = self.store.read_tree()?;
        self.reads.push(ReadMark::Transactions {
            user_id: user_id.to_string(),
            category_id: category_id.to_string(),
            version: tree.transactions_version(user_id, category_id),
        });
        Ok(tree
            .users
            .get(user_id)
            .and_then(|node| node.categories.get(category_id))
            .map(|node| node.transactions.values().cloned().collect())
            .unwrap_or_default())
    }

    fn set_category_amount(
        &mut self,
        user_id: &str,
        category_id: &str,
        amount: f64,
    ) -> CoreResult<()> {
        self.writes.push(StagedWrite::CategoryAmount {
            user_id: user_id.to_string(),
            category_id: category_id.to_string(),
            amount,
        });
        Ok(())
    }

    fn set_user_savings(&mut self, user_id: &str, total_savings: f64) -> CoreResult<()> {
        self.writes.push(StagedWrite::UserSavings {
            user_id: user_id.to_string(),
            total_savings,
        });
        Ok(())
    }
}

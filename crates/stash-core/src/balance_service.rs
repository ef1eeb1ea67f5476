//! Category balance recalculation.

use stash_domain::Transaction;
use tracing::debug;

use crate::{CoreResult, LedgerStore};

/// Net balance of a transaction set: deposits minus withdrawals.
pub fn fold_balance<'a, I>(transactions: I) -> f64
where
    I: IntoIterator<Item = &'a Transaction>,
{
    transactions
        .into_iter()
        .fold(0.0, |balance, txn| balance + txn.signed_amount())
}

/// Keeps `Category.amount` equal to the fold of its current transactions.
///
/// Invoked on every create, update, or delete under
/// `users/{user}/categories/{category}/transactions`. The triggering change is
/// never consulted; the balance is re-derived from the full set so duplicate or
/// out-of-order triggers converge on the same value.
pub struct BalanceService;

impl BalanceService {
    /// Recomputes and writes the category balance atomically, returning it.
    pub async fn recalculate(
        store: &dyn LedgerStore,
        user_id: &str,
        category_id: &str,
    ) -> CoreResult<f64> {
        let balance = store
            .run_transaction(&|scope| {
                let transactions = scope.transactions(user_id, category_id)?;
                let balance = fold_balance(&transactions);
                scope.set_category_amount(user_id, category_id, balance)?;
                Ok(balance)
            })
            .await?;
        debug!(user_id, category_id, balance, "category balance recalculated");
        Ok(balance)
    }
}

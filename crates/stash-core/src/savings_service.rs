//! User total savings recalculation.

use stash_domain::Category;
use tracing::debug;

use crate::{CoreResult, LedgerStore};

/// Sum of category balances; categories without a computed balance count as zero.
pub fn sum_savings<'a, I>(categories: I) -> f64
where
    I: IntoIterator<Item = &'a Category>,
{
    categories
        .into_iter()
        .fold(0.0, |total, category| total + category.balance())
}

/// Keeps `User.totalSavings` equal to the sum of the user's category balances.
///
/// Invoked on every write under `users/{user}/categories`, including the
/// balance writes made by [`crate::BalanceService`]. Writes only the user
/// document, which no handler watches.
pub struct SavingsService;

impl SavingsService {
    /// Recomputes `totalSavings` and stamps `lastUpdated` atomically.
    pub async fn recalculate(store: &dyn LedgerStore, user_id: &str) -> CoreResult<f64> {
        let total = store
            .run_transaction(&|scope| {
                let categories = scope.categories(user_id)?;
                let total = sum_savings(&categories);
                scope.set_user_savings(user_id, total)?;
                Ok(total)
            })
            .await?;
        debug!(user_id, total_savings = total, "user savings recalculated");
        Ok(total)
    }
}

//! Routes document write events to the reactive recalculations.
//!
//! transaction write -> category balance -> category write -> user savings.
//! User documents are not routed anywhere, so the chain always settles.

use std::{collections::BTreeSet, sync::Arc};

use stash_domain::DocumentPath;
use tracing::{debug, error, warn};

use crate::{BalanceService, CoreError, CoreResult, LedgerStore, SavingsService, WriteEvent};

const DEFAULT_MAX_SETTLE_ROUNDS: usize = 8;

#[derive(Debug, Clone, PartialEq)]
pub enum TriggerOutcome {
    CategoryBalance {
        user_id: String,
        category_id: String,
        balance: f64,
    },
    UserSavings {
        user_id: String,
        total_savings: f64,
    },
    Ignored,
}

/// Which recalculation a path maps to. Ordering groups duplicates within a round.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Route {
    Balance { user_id: String, category_id: String },
    Savings { user_id: String },
}

impl Route {
    fn for_path(path: &DocumentPath) -> Option<Self> {
        match path {
            DocumentPath::Transaction {
                user_id,
                category_id,
                ..
            } => Some(Route::Balance {
                user_id: user_id.clone(),
                category_id: category_id.clone(),
            }),
            DocumentPath::Category { user_id, .. } => Some(Route::Savings {
                user_id: user_id.clone(),
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SettleReport {
    pub rounds: usize,
    pub events: usize,
    pub recalculations: usize,
}

pub struct TriggerRouter {
    store: Arc<dyn LedgerStore>,
    max_settle_rounds: usize,
}

impl TriggerRouter {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self {
            store,
            max_settle_rounds: DEFAULT_MAX_SETTLE_ROUNDS,
        }
    }

    pub fn with_max_settle_rounds(mut self, rounds: usize) -> Self {
        self.max_settle_rounds = rounds.max(1);
        self
    }

    /// Handles a single write event. Snapshots are not consulted.
    pub async fn dispatch(&self, event: &WriteEvent) -> CoreResult<TriggerOutcome> {
        match Route::for_path(&event.path) {
            Some(route) => self.execute(route).await,
            None => {
                debug!(path = %event.path, "no handler for path");
                Ok(TriggerOutcome::Ignored)
            }
        }
    }

    /// Drains the store's pending events and dispatches them until none remain.
    ///
    /// Events targeting the same category or user within one round collapse
    /// into a single recalculation. Every route in a round is attempted; the
    /// first failure is returned once the round completes.
    pub async fn settle(&self) -> CoreResult<SettleReport> {
        let mut report = SettleReport::default();
        loop {
            let events = self.store.drain_events().await?;
            if events.is_empty() {
                return Ok(report);
            }
            if report.rounds == self.max_settle_rounds {
                warn!(pending = events.len(), "write events still pending after settle limit");
                return Err(CoreError::InvalidOperation(format!(
                    "write events did not settle within {} rounds",
                    self.max_settle_rounds
                )));
            }
            report.rounds += 1;
            report.events += events.len();

            let routes: BTreeSet<Route> = events
                .iter()
                .filter_map(|event| Route::for_path(&event.path))
                .collect();
            let mut first_error = None;
            for route in routes {
                match self.execute(route.clone()).await {
                    Ok(_) => report.recalculations += 1,
                    Err(err) => {
                        error!(route = ?route, error = %err, "recalculation failed");
                        first_error.get_or_insert(err);
                    }
                }
            }
            if let Some(err) = first_error {
                return Err(err);
            }
        }
    }

    async fn execute(&self, route: Route) -> CoreResult<TriggerOutcome> {
        match route {
            Route::Balance {
                user_id,
                category_id,
            } => {
                let balance =
                    BalanceService::recalculate(self.store.as_ref(), &user_id, &category_id)
                        .await?;
                Ok(TriggerOutcome::CategoryBalance {
                    user_id,
                    category_id,
                    balance,
                })
            }
            Route::Savings { user_id } => {
                let total_savings =
                    SavingsService::recalculate(self.store.as_ref(), &user_id).await?;
                Ok(TriggerOutcome::UserSavings {
                    user_id,
                    total_savings,
                })
            }
        }
    }
}

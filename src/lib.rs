//! Stash keeps every user's savings figures derived from their transaction
//! ledger: category balances, total savings, monthly summaries and weekly
//! reports with push notifications.

pub mod engine;
pub mod errors;
pub mod utils;

pub use engine::AggregationEngine;
pub use errors::EngineError;

use std::sync::Once;

static INIT_TRACING: Once = Once::new();

/// Initializes global tracing and emits a startup info log.
pub fn init() {
    INIT_TRACING.call_once(|| {
        utils::init_tracing();
        tracing::info!("Stash tracing initialized.");
    });
}

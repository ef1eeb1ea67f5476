//! stash-core
//!
//! The aggregation engine: balance and savings recalculation, monthly and
//! weekly window aggregation, and weekly notification composition.
//! Depends on stash-domain. Talks to storage and push delivery only through
//! the [`LedgerStore`] and [`NotificationChannel`] traits.

pub mod balance_service;
pub mod batching;
pub mod error;
pub mod format;
pub mod monthly_summary_service;
pub mod notification_service;
pub mod notify;
pub mod savings_service;
pub mod storage;
pub mod time;
pub mod trigger;
pub mod weekly_report_service;

#[cfg(test)]
mod tests;

pub use balance_service::*;
pub use batching::*;
pub use error::{CoreError, CoreResult};
pub use monthly_summary_service::*;
pub use notification_service::*;
pub use notify::*;
pub use savings_service::*;
pub use storage::*;
pub use time::*;
pub use trigger::*;
pub use weekly_report_service::*;

//! Derived reporting documents and the window accumulator that produces them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    common::*,
    transaction::{Transaction, TransactionType},
    window::{DateWindow, MonthKey},
};

/// Running deposit/withdrawal totals for one window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowTotals {
    pub deposits: f64,
    pub withdrawals: f64,
}

impl WindowTotals {
    pub fn record(&mut self, transaction: &Transaction) {
        match transaction.transaction_type {
            TransactionType::Deposit => self.deposits += transaction.amount,
            TransactionType::Withdrawal => self.withdrawals += transaction.amount,
            TransactionType::Unknown(_) => {}
        }
    }

    pub fn from_transactions<'a, I>(transactions: I) -> Self
    where
        I: IntoIterator<Item = &'a Transaction>,
    {
        let mut totals = Self::default();
        for txn in transactions {
            totals.record(txn);
        }
        totals
    }

    pub fn merge(&mut self, other: &WindowTotals) {
        self.deposits += other.deposits;
        self.withdrawals += other.withdrawals;
    }

    pub fn net(&self) -> f64 {
        self.deposits - self.withdrawals
    }
}

/// Per-category line of a [`MonthlySummary`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategorySummary {
    pub name: String,
    pub deposits: f64,
    pub withdrawals: f64,
    pub net: f64,
}

impl CategorySummary {
    pub fn new(name: impl Into<String>, totals: &WindowTotals) -> Self {
        Self {
            name: name.into(),
            deposits: totals.deposits,
            withdrawals: totals.withdrawals,
            net: totals.net(),
        }
    }
}

/// Month-level aggregate for one user, stored under `monthlySummaries/{YYYY-MM}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MonthlySummary {
    pub year: i32,
    pub month: u32,
    pub deposits: f64,
    pub withdrawals: f64,
    pub net: f64,
    pub by_category: BTreeMap<String, CategorySummary>,
    pub created_at: Timestamp,
}

impl MonthlySummary {
    pub fn new(
        key: MonthKey,
        totals: &WindowTotals,
        by_category: BTreeMap<String, CategorySummary>,
        created_at: Timestamp,
    ) -> Self {
        Self {
            year: key.year(),
            month: key.month(),
            deposits: totals.deposits,
            withdrawals: totals.withdrawals,
            net: totals.net(),
            by_category,
            created_at,
        }
    }

    /// The `YYYY-MM` document key of this summary.
    pub fn key(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }
}

/// Trailing-window report for one user. Every run appends a new document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyReport {
    /// Document key; lives in the path, not the body.
    #[serde(default, skip_serializing)]
    pub id: String,
    pub start_date: Timestamp,
    pub end_date: Timestamp,
    pub deposits: f64,
    pub withdrawals: f64,
    pub net: f64,
    pub created_at: Timestamp,
}

impl WeeklyReport {
    pub fn new(
        id: impl Into<String>,
        window: &DateWindow,
        totals: &WindowTotals,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id: id.into(),
            start_date: window.start,
            end_date: window.end,
            deposits: totals.deposits,
            withdrawals: totals.withdrawals,
            net: totals.net(),
            created_at,
        }
    }
}

impl Identifiable for WeeklyReport {
    fn id(&self) -> &str {
        &self.id
    }
}

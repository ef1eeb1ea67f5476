//! Domain models for ledger transactions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::common::*;

/// A single deposit or withdrawal recorded under a category.
///
/// Transactions are written by clients and only ever read by the aggregation
/// engine; nothing in this workspace edits them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    #[serde(default)]
    pub id: String,
    pub transaction_type: TransactionType,
    pub amount: f64,
    pub date: Timestamp,
}

impl Transaction {
    pub fn new(transaction_type: TransactionType, amount: f64, date: Timestamp) -> Self {
        Self {
            id: new_document_id(),
            transaction_type,
            amount,
            date,
        }
    }

    pub fn deposit(amount: f64, date: Timestamp) -> Self {
        Self::new(TransactionType::Deposit, amount, date)
    }

    pub fn withdrawal(amount: f64, date: Timestamp) -> Self {
        Self::new(TransactionType::Withdrawal, amount, date)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Contribution of this transaction to a running balance.
    pub fn signed_amount(&self) -> f64 {
        match self.transaction_type {
            TransactionType::Deposit => self.amount,
            TransactionType::Withdrawal => -self.amount,
            TransactionType::Unknown(_) => 0.0,
        }
    }
}

impl Identifiable for Transaction {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Amounted for Transaction {
    fn amount(&self) -> f64 {
        self.signed_amount()
    }
}

/// Direction of a transaction. Unrecognised tags are kept verbatim and
/// contribute nothing to balances or window totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    Unknown(String),
}

impl TransactionType {
    pub fn as_str(&self) -> &str {
        match self {
            TransactionType::Deposit => "deposit",
            TransactionType::Withdrawal => "withdrawal",
            TransactionType::Unknown(tag) => tag,
        }
    }
}

impl From<String> for TransactionType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "deposit" => TransactionType::Deposit,
            "withdrawal" => TransactionType::Withdrawal,
            _ => TransactionType::Unknown(value),
        }
    }
}

impl From<TransactionType> for String {
    fn from(value: TransactionType) -> Self {
        match value {
            TransactionType::Unknown(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

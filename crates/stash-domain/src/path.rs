//! Typed addresses for documents in the ledger tree.
//!
//! ```text
//! users/{user}
//! users/{user}/categories/{category}
//! users/{user}/categories/{category}/transactions/{transaction}
//! users/{user}/monthlySummaries/{YYYY-MM}
//! users/{user}/weeklyReports/{report}
//! ```

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

pub const USERS: &str = "users";
pub const CATEGORIES: &str = "categories";
pub const TRANSACTIONS: &str = "transactions";
pub const MONTHLY_SUMMARIES: &str = "monthlySummaries";
pub const WEEKLY_REPORTS: &str = "weeklyReports";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DocumentPath {
    User {
        user_id: String,
    },
    Category {
        user_id: String,
        category_id: String,
    },
    Transaction {
        user_id: String,
        category_id: String,
        transaction_id: String,
    },
    MonthlySummary {
        user_id: String,
        month_key: String,
    },
    WeeklyReport {
        user_id: String,
        report_id: String,
    },
}

impl DocumentPath {
    pub fn user(user_id: impl Into<String>) -> Self {
        DocumentPath::User {
            user_id: user_id.into(),
        }
    }

    pub fn category(user_id: impl Into<String>, category_id: impl Into<String>) -> Self {
        DocumentPath::Category {
            user_id: user_id.into(),
            category_id: category_id.into(),
        }
    }

    pub fn transaction(
        user_id: impl Into<String>,
        category_id: impl Into<String>,
        transaction_id: impl Into<String>,
    ) -> Self {
        DocumentPath::Transaction {
            user_id: user_id.into(),
            category_id: category_id.into(),
            transaction_id: transaction_id.into(),
        }
    }

    pub fn monthly_summary(user_id: impl Into<String>, month_key: impl Into<String>) -> Self {
        DocumentPath::MonthlySummary {
            user_id: user_id.into(),
            month_key: month_key.into(),
        }
    }

    pub fn weekly_report(user_id: impl Into<String>, report_id: impl Into<String>) -> Self {
        DocumentPath::WeeklyReport {
            user_id: user_id.into(),
            report_id: report_id.into(),
        }
    }

    /// Every document lives under exactly one user.
    pub fn user_id(&self) -> &str {
        match self {
            DocumentPath::User { user_id }
            | DocumentPath::Category { user_id, .. }
            | DocumentPath::Transaction { user_id, .. }
            | DocumentPath::MonthlySummary { user_id, .. }
            | DocumentPath::WeeklyReport { user_id, .. } => user_id,
        }
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentPath::User { user_id } => write!(f, "{USERS}/{user_id}"),
            DocumentPath::Category {
                user_id,
                category_id,
            } => write!(f, "{USERS}/{user_id}/{CATEGORIES}/{category_id}"),
            DocumentPath::Transaction {
                user_id,
                category_id,
                transaction_id,
            } => write!(
                f,
                "{USERS}/{user_id}/{CATEGORIES}/{category_id}/{TRANSACTIONS}/{transaction_id}"
            ),
            DocumentPath::MonthlySummary { user_id, month_key } => {
                write!(f, "{USERS}/{user_id}/{MONTHLY_SUMMARIES}/{month_key}")
            }
            DocumentPath::WeeklyReport { user_id, report_id } => {
                write!(f, "{USERS}/{user_id}/{WEEKLY_REPORTS}/{report_id}")
            }
        }
    }
}

impl FromStr for DocumentPath {
    type Err = DocumentPathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let segments: Vec<&str> = s.trim_matches('/').split('/').collect();
        if segments.iter().any(|segment| segment.is_empty()) {
            return Err(DocumentPathError(s.to_string()));
        }
        let path = match segments.as_slice() {
            [USERS, user] => DocumentPath::user(*user),
            [USERS, user, CATEGORIES, category] => DocumentPath::category(*user, *category),
            [USERS, user, CATEGORIES, category, TRANSACTIONS, txn] => {
                DocumentPath::transaction(*user, *category, *txn)
            }
            [USERS, user, MONTHLY_SUMMARIES, key] => DocumentPath::monthly_summary(*user, *key),
            [USERS, user, WEEKLY_REPORTS, report] => DocumentPath::weekly_report(*user, *report),
            _ => return Err(DocumentPathError(s.to_string())),
        };
        Ok(path)
    }
}

impl TryFrom<String> for DocumentPath {
    type Error = DocumentPathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DocumentPath> for String {
    fn from(value: DocumentPath) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Raised when a string does not name a document in the ledger tree.
pub struct DocumentPathError(pub String);

impl fmt::Display for DocumentPathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}` is not a ledger document path", self.0)
    }
}

impl std::error::Error for DocumentPathError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_parse_and_render_symmetrically() {
        let raw = "users/u1/categories/c9/transactions/t3";
        let path: DocumentPath = raw.parse().unwrap();
        assert_eq!(path, DocumentPath::transaction("u1", "c9", "t3"));
        assert_eq!(path.to_string(), raw);
        assert_eq!(path.user_id(), "u1");

        let summary: DocumentPath = "/users/u1/monthlySummaries/2024-01/".parse().unwrap();
        assert_eq!(summary, DocumentPath::monthly_summary("u1", "2024-01"));
    }

    #[test]
    fn unknown_shapes_are_rejected() {
        assert!("users".parse::<DocumentPath>().is_err());
        assert!("users/u1/budgets/b1".parse::<DocumentPath>().is_err());
        assert!("users//categories/c1".parse::<DocumentPath>().is_err());
    }
}

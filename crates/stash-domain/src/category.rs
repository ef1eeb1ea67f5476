//! Domain types representing savings categories.

use serde::{Deserialize, Serialize};

use crate::common::*;

/// A named bucket of transactions owned by a user.
///
/// `amount` is derived: it is rewritten from the full transaction set every
/// time that set changes, and is absent until the first recalculation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
}

impl Category {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: new_document_id(),
            name: name.into(),
            amount: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_amount(mut self, amount: f64) -> Self {
        self.amount = Some(amount);
        self
    }

    /// Current balance, treating a never-computed balance as zero.
    pub fn balance(&self) -> f64 {
        self.amount.unwrap_or(0.0)
    }
}

impl Identifiable for Category {
    fn id(&self) -> &str {
        &self.id
    }
}

impl NamedEntity for Category {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Amounted for Category {
    fn amount(&self) -> f64 {
        self.balance()
    }
}

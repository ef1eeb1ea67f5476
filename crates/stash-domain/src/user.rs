//! The user document at the root of every ledger tree.

use serde::{Deserialize, Serialize};

use crate::common::*;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub total_savings: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<Timestamp>,
    #[serde(default)]
    pub notifications_enabled: bool,
    /// Push delivery token registered by the user's device.
    #[serde(
        default,
        rename = "fcmToken",
        alias = "notificationToken",
        skip_serializing_if = "Option::is_none"
    )]
    pub notification_token: Option<String>,
}

impl User {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            total_savings: 0.0,
            last_updated: None,
            notifications_enabled: false,
            notification_token: None,
        }
    }

    pub fn with_notifications(mut self, token: Option<&str>) -> Self {
        self.notifications_enabled = true;
        self.notification_token = token.map(str::to_string);
        self
    }

    /// Returns the delivery token when one is on file. Blank tokens count as absent.
    pub fn delivery_token(&self) -> Option<&str> {
        self.notification_token
            .as_deref()
            .filter(|token| !token.trim().is_empty())
    }
}

impl Identifiable for User {
    fn id(&self) -> &str {
        &self.id
    }
}

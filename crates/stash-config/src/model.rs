use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Runtime settings for the aggregation engine. Every field has a default,
/// so an empty JSON object is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub store: StoreSettings,
    pub jobs: JobSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    /// Location of the ledger snapshot. Defaults to `<data dir>/stash/ledger.json`.
    pub snapshot_path: Option<PathBuf>,
    pub max_transaction_attempts: usize,
    pub max_batch_writes: usize,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            snapshot_path: None,
            max_transaction_attempts: 5,
            max_batch_writes: 500,
        }
    }
}

impl StoreSettings {
    pub fn resolve_snapshot_path(&self) -> PathBuf {
        if let Some(path) = &self.snapshot_path {
            return path.clone();
        }

        let base = dirs::data_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."));

        base.join("stash").join("ledger.json")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobSettings {
    pub weekly_window_days: u32,
    pub notification_batch_size: usize,
    pub notification_title: String,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            weekly_window_days: 7,
            notification_batch_size: 500,
            notification_title: "Your Weekly Savings Report".into(),
        }
    }
}

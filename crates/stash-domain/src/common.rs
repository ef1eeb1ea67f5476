//! Shared traits and identifiers for ledger documents.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Point in time as stored in the ledger (UTC, millisecond precision in practice).
pub type Timestamp = DateTime<Utc>;

/// Exposes the document identifier of an entity stored in the ledger.
pub trait Identifiable {
    fn id(&self) -> &str;
}

/// Provides read-only access to an entity's display name.
pub trait NamedEntity {
    fn name(&self) -> &str;
}

/// Supplies a common contract for the balance contribution of a document.
pub trait Amounted {
    fn amount(&self) -> f64;
}

/// Generates a fresh document identifier in the store's auto-id format.
pub fn new_document_id() -> String {
    Uuid::new_v4().simple().to_string()
}

//! Sync metadata and reconciliation results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The singleton sync metadata record.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SyncMeta {
    /// Completion time of the last successful full sync.
    pub synced_at: Option<DateTime<Utc>>,
    pub dao_count: i64,
    pub document_count: i64,
}

/// Result of a full reconciliation pass.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SyncSummary {
    pub dao_count: usize,
    pub document_count: usize,
    /// Records skipped because they failed to decode or store.
    pub failed: usize,
    pub synced_at: Option<DateTime<Utc>>,
}

/// What an upsert did to the cache.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UpsertOutcome {
    Created,
    Updated,
    Unchanged,
}

/// Which kind of projection an attestation maps to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Dao,
    Document,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Dao => "dao",
            RecordKind::Document => "document",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "dao" => Some(RecordKind::Dao),
            "document" => Some(RecordKind::Document),
            _ => None,
        }
    }
}

/// Result of reconciling a single attestation.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", tag = "result")]
pub enum SyncOneOutcome {
    /// The indexer does not know the uid (private or still pending).
    NotIndexed { uid: String },
    Synced {
        uid: String,
        kind: RecordKind,
        outcome: UpsertOutcome,
    },
}

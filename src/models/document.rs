//! Document projection model.

use serde::{Deserialize, Serialize};

/// Lifecycle of a document. `Revoked` is terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Active,
    Revoked,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Active => "active",
            DocumentStatus::Revoked => "revoked",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(DocumentStatus::Active),
            "revoked" => Some(DocumentStatus::Revoked),
            _ => None,
        }
    }
}

/// Fields of a document projection that come from its attestation.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentChainFields {
    pub id: String,
    pub dao_id: String,
    pub title: String,
    pub document_type: String,
    pub hash: String,
    pub ipfs_cid: Option<String>,
    pub version: String,
    pub previous_version_id: Option<String>,
    pub schema_version: String,
    pub attester: String,
    pub attested_at: i64,
    pub revoked: bool,
}

impl DocumentChainFields {
    pub fn status(&self) -> DocumentStatus {
        if self.revoked {
            DocumentStatus::Revoked
        } else {
            DocumentStatus::Active
        }
    }
}

/// Cached document record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DocumentProjection {
    pub id: String,
    pub dao_id: String,
    pub title: String,
    pub document_type: String,
    pub hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipfs_cid: Option<String>,
    pub version: String,
    pub previous_version_id: Option<String>,
    pub status: DocumentStatus,
    pub attester: String,
    pub schema_version: String,
    /// Attestation time, Unix seconds.
    pub attested_at: i64,
    pub created_at: String,
    pub updated_at: String,
}

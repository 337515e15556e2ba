//! DAO projection model.

use serde::{Deserialize, Serialize};

/// Registry status of a DAO. Owned by the cache, not by the attestation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DaoStatus {
    Active,
    Inactive,
}

impl DaoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DaoStatus::Active => "active",
            DaoStatus::Inactive => "inactive",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(DaoStatus::Active),
            "inactive" => Some(DaoStatus::Inactive),
            _ => None,
        }
    }
}

/// Fields of a DAO projection that come from its attestation.
#[derive(Debug, Clone, PartialEq)]
pub struct DaoChainFields {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub member_count: Option<u64>,
    pub size: Option<String>,
    pub admin_address: Option<String>,
    pub founding_date: Option<String>,
    pub attester: String,
    pub attested_at: i64,
    pub revoked: bool,
}

/// Cached DAO record: attestation-derived fields merged with cache-only profile fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DaoProjection {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub founding_date: Option<String>,
    pub attester: String,
    /// Attestation time, Unix seconds.
    pub attested_at: i64,
    pub revoked: bool,

    // Cache-only fields, preserved across re-sync.
    pub status: DaoStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub twitter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discord: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    /// Internal version for optimistic concurrency control of profile edits
    #[serde(default)]
    pub version: i64,
}

/// Request body for editing the cache-only profile of a DAO.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDaoProfileRequest {
    #[serde(default)]
    pub status: Option<DaoStatus>,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub twitter: Option<String>,
    #[serde(default)]
    pub discord: Option<String>,
    /// Expected version for optimistic concurrency control
    #[serde(default)]
    pub expected_version: Option<i64>,
}

impl UpdateDaoProfileRequest {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.logo_url.is_none()
            && self.website.is_none()
            && self.contact_email.is_none()
            && self.twitter.is_none()
            && self.discord.is_none()
    }
}

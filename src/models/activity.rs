//! Activity feed entries.

use serde::Serialize;

use super::{DaoProjection, DocumentProjection, RecordKind};

/// One entry of the merged DAO/document activity feed.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActivityItem {
    pub kind: RecordKind,
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dao_id: Option<String>,
    pub attester: String,
    /// Attestation time, Unix seconds.
    pub timestamp: i64,
    pub status: String,
}

impl From<&DaoProjection> for ActivityItem {
    fn from(dao: &DaoProjection) -> Self {
        Self {
            kind: RecordKind::Dao,
            id: dao.id.clone(),
            title: dao.name.clone(),
            dao_id: None,
            attester: dao.attester.clone(),
            timestamp: dao.attested_at,
            status: dao.status.as_str().to_string(),
        }
    }
}

impl From<&DocumentProjection> for ActivityItem {
    fn from(doc: &DocumentProjection) -> Self {
        Self {
            kind: RecordKind::Document,
            id: doc.id.clone(),
            title: doc.title.clone(),
            dao_id: Some(doc.dao_id.clone()),
            attester: doc.attester.clone(),
            timestamp: doc.attested_at,
            status: doc.status.as_str().to_string(),
        }
    }
}

/// Merge DAO and document projections, newest first, truncated to `limit`.
pub fn merge_activity(
    daos: &[DaoProjection],
    documents: &[DocumentProjection],
    limit: usize,
) -> Vec<ActivityItem> {
    let mut items: Vec<ActivityItem> = daos
        .iter()
        .map(ActivityItem::from)
        .chain(documents.iter().map(ActivityItem::from))
        .collect();
    items.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.id.cmp(&b.id)));
    items.truncate(limit);
    items
}

//! Database repository for projection and sync metadata operations.
//!
//! Upserts only ever write on-chain-derived columns; profile columns are
//! written exclusively by `update_dao_profile`.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::errors::AppError;
use crate::models::{
    DaoChainFields, DaoProjection, DaoStatus, DocumentChainFields, DocumentProjection,
    DocumentStatus, SyncMeta, UpdateDaoProfileRequest, UpsertOutcome,
};

/// Upper bound on `previousVersionId` hops followed by `version_chain`.
pub const MAX_VERSION_CHAIN_HOPS: usize = 50;

const DAO_COLUMNS: &str = "id, name, description, location, member_count, size, admin_address, \
    founding_date, attester, attested_at, revoked, status, logo_url, website, contact_email, \
    twitter, discord, created_at, updated_at, version";

const DOCUMENT_COLUMNS: &str = "id, dao_id, title, document_type, hash, ipfs_cid, version, \
    previous_version_id, status, attester, schema_version, attested_at, created_at, updated_at";

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ==================== SYNC METADATA ====================

    /// Read the sync metadata singleton.
    pub async fn get_sync_meta(&self) -> Result<SyncMeta, AppError> {
        let row =
            sqlx::query("SELECT synced_at, dao_count, document_count FROM sync_meta WHERE id = 1")
                .fetch_one(&self.pool)
                .await?;
        let synced_at: Option<i64> = row.get("synced_at");
        Ok(SyncMeta {
            synced_at: synced_at.and_then(DateTime::<Utc>::from_timestamp_millis),
            dao_count: row.get("dao_count"),
            document_count: row.get("document_count"),
        })
    }

    /// Record a completed full pass. A pass older than the stored one is ignored,
    /// so `synced_at` never moves backwards. Returns whether the record was written.
    pub async fn record_sync(
        &self,
        synced_at: DateTime<Utc>,
        dao_count: usize,
        document_count: usize,
    ) -> Result<bool, AppError> {
        let millis = synced_at.timestamp_millis();
        let result = sqlx::query(
            "UPDATE sync_meta SET synced_at = ?, dao_count = ?, document_count = ? \
             WHERE id = 1 AND (synced_at IS NULL OR synced_at <= ?)",
        )
        .bind(millis)
        .bind(dao_count as i64)
        .bind(document_count as i64)
        .bind(millis)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    // ==================== DAO OPERATIONS ====================

    /// List all DAOs, newest attestation first.
    pub async fn list_daos(&self) -> Result<Vec<DaoProjection>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM daos ORDER BY attested_at DESC, id",
            DAO_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(dao_from_row).collect())
    }

    /// The `limit` most recently attested DAOs.
    pub async fn recent_daos(&self, limit: usize) -> Result<Vec<DaoProjection>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM daos ORDER BY attested_at DESC, id LIMIT ?",
            DAO_COLUMNS
        ))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(dao_from_row).collect())
    }

    /// Get a DAO by attestation id.
    pub async fn get_dao(&self, id: &str) -> Result<Option<DaoProjection>, AppError> {
        let row = sqlx::query(&format!("SELECT {} FROM daos WHERE id = ?", DAO_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(dao_from_row))
    }

    /// Insert or refresh the on-chain fields of a DAO projection.
    ///
    /// Profile fields are left untouched. The first observed revocation moves
    /// the DAO to `inactive`; after that `status` belongs to profile edits again.
    /// Nothing is written when no on-chain field differs.
    pub async fn upsert_dao(&self, fields: &DaoChainFields) -> Result<UpsertOutcome, AppError> {
        let existed = self.exists("daos", &fields.id).await?;
        let now = Utc::now().to_rfc3339();
        let initial_status = if fields.revoked {
            DaoStatus::Inactive
        } else {
            DaoStatus::Active
        };

        let result = sqlx::query(
            r#"INSERT INTO daos (
                id, name, description, location, member_count, size, admin_address,
                founding_date, attester, attested_at, revoked, status, created_at, updated_at, version
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                description = excluded.description,
                location = excluded.location,
                member_count = excluded.member_count,
                size = excluded.size,
                admin_address = excluded.admin_address,
                founding_date = excluded.founding_date,
                attester = excluded.attester,
                attested_at = excluded.attested_at,
                status = CASE WHEN excluded.revoked = 1 AND daos.revoked = 0
                              THEN 'inactive' ELSE daos.status END,
                revoked = MAX(daos.revoked, excluded.revoked),
                updated_at = excluded.updated_at
            WHERE daos.name IS NOT excluded.name
               OR daos.description IS NOT excluded.description
               OR daos.location IS NOT excluded.location
               OR daos.member_count IS NOT excluded.member_count
               OR daos.size IS NOT excluded.size
               OR daos.admin_address IS NOT excluded.admin_address
               OR daos.founding_date IS NOT excluded.founding_date
               OR daos.attester IS NOT excluded.attester
               OR daos.attested_at IS NOT excluded.attested_at
               OR daos.revoked < excluded.revoked"#,
        )
        .bind(&fields.id)
        .bind(&fields.name)
        .bind(&fields.description)
        .bind(&fields.location)
        .bind(fields.member_count.and_then(|n| i64::try_from(n).ok()))
        .bind(&fields.size)
        .bind(&fields.admin_address)
        .bind(&fields.founding_date)
        .bind(&fields.attester)
        .bind(fields.attested_at)
        .bind(fields.revoked as i32)
        .bind(initial_status.as_str())
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(upsert_outcome(existed, result.rows_affected()))
    }

    /// Update the cache-only profile of a DAO with optimistic concurrency control.
    pub async fn update_dao_profile(
        &self,
        id: &str,
        request: &UpdateDaoProfileRequest,
    ) -> Result<DaoProjection, AppError> {
        let existing = self
            .get_dao(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("DAO {} not found", id)))?;

        // Check version for optimistic concurrency
        if let Some(expected) = request.expected_version {
            if existing.version != expected {
                return Err(AppError::Conflict {
                    message: format!(
                        "Version mismatch: expected {}, current {}",
                        expected, existing.version
                    ),
                    current_version: existing.version,
                });
            }
        }

        let now = Utc::now().to_rfc3339();
        let new_version = existing.version + 1;

        let status = request.status.unwrap_or(existing.status);
        let logo_url = request.logo_url.clone().or(existing.logo_url.clone());
        let website = request.website.clone().or(existing.website.clone());
        let contact_email = request
            .contact_email
            .clone()
            .or(existing.contact_email.clone());
        let twitter = request.twitter.clone().or(existing.twitter.clone());
        let discord = request.discord.clone().or(existing.discord.clone());

        // Conditional UPDATE with version check to catch concurrent edits
        let result = sqlx::query(
            "UPDATE daos SET status = ?, logo_url = ?, website = ?, contact_email = ?, twitter = ?, discord = ?, updated_at = ?, version = ? WHERE id = ? AND version = ?"
        )
        .bind(status.as_str())
        .bind(&logo_url)
        .bind(&website)
        .bind(&contact_email)
        .bind(&twitter)
        .bind(&discord)
        .bind(&now)
        .bind(new_version)
        .bind(id)
        .bind(existing.version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let current = self.get_dao(id).await?;
            return Err(AppError::Conflict {
                message: "Concurrent modification detected".to_string(),
                current_version: current.map(|d| d.version).unwrap_or(0),
            });
        }

        Ok(DaoProjection {
            status,
            logo_url,
            website,
            contact_email,
            twitter,
            discord,
            updated_at: now,
            version: new_version,
            ..existing
        })
    }

    // ==================== DOCUMENT OPERATIONS ====================

    /// List all documents, newest attestation first.
    pub async fn list_documents(&self) -> Result<Vec<DocumentProjection>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM documents ORDER BY attested_at DESC, id",
            DOCUMENT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(document_from_row).collect())
    }

    /// Documents registered for one DAO, newest first.
    pub async fn list_documents_for_dao(
        &self,
        dao_id: &str,
    ) -> Result<Vec<DocumentProjection>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM documents WHERE dao_id = ? ORDER BY attested_at DESC, id",
            DOCUMENT_COLUMNS
        ))
        .bind(dao_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(document_from_row).collect())
    }

    /// The `limit` most recently attested documents.
    pub async fn recent_documents(&self, limit: usize) -> Result<Vec<DocumentProjection>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM documents ORDER BY attested_at DESC, id LIMIT ?",
            DOCUMENT_COLUMNS
        ))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(document_from_row).collect())
    }

    /// Get a document by attestation id.
    pub async fn get_document(&self, id: &str) -> Result<Option<DocumentProjection>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM documents WHERE id = ?",
            DOCUMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(document_from_row))
    }

    /// Insert or refresh a document projection. `revoked` is terminal.
    pub async fn upsert_document(
        &self,
        fields: &DocumentChainFields,
    ) -> Result<UpsertOutcome, AppError> {
        let existed = self.exists("documents", &fields.id).await?;
        let now = Utc::now().to_rfc3339();

        let result = sqlx::query(
            r#"INSERT INTO documents (
                id, dao_id, title, document_type, hash, ipfs_cid, version, previous_version_id,
                status, attester, schema_version, attested_at, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                dao_id = excluded.dao_id,
                title = excluded.title,
                document_type = excluded.document_type,
                hash = excluded.hash,
                ipfs_cid = excluded.ipfs_cid,
                version = excluded.version,
                previous_version_id = excluded.previous_version_id,
                status = CASE WHEN documents.status = 'revoked'
                              THEN 'revoked' ELSE excluded.status END,
                attester = excluded.attester,
                schema_version = excluded.schema_version,
                attested_at = excluded.attested_at,
                updated_at = excluded.updated_at
            WHERE documents.dao_id IS NOT excluded.dao_id
               OR documents.title IS NOT excluded.title
               OR documents.document_type IS NOT excluded.document_type
               OR documents.hash IS NOT excluded.hash
               OR documents.ipfs_cid IS NOT excluded.ipfs_cid
               OR documents.version IS NOT excluded.version
               OR documents.previous_version_id IS NOT excluded.previous_version_id
               OR documents.attester IS NOT excluded.attester
               OR documents.schema_version IS NOT excluded.schema_version
               OR documents.attested_at IS NOT excluded.attested_at
               OR (documents.status <> 'revoked' AND excluded.status = 'revoked')"#,
        )
        .bind(&fields.id)
        .bind(&fields.dao_id)
        .bind(&fields.title)
        .bind(&fields.document_type)
        .bind(&fields.hash)
        .bind(&fields.ipfs_cid)
        .bind(&fields.version)
        .bind(&fields.previous_version_id)
        .bind(fields.status().as_str())
        .bind(&fields.attester)
        .bind(&fields.schema_version)
        .bind(fields.attested_at)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(upsert_outcome(existed, result.rows_affected()))
    }

    /// Follow `previousVersionId` links from `id`, newest first.
    ///
    /// Stops at a missing link, at an already visited id, or after
    /// `MAX_VERSION_CHAIN_HOPS` hops.
    pub async fn version_chain(&self, id: &str) -> Result<Vec<DocumentProjection>, AppError> {
        let head = self
            .get_document(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Document {} not found", id)))?;

        let mut visited = HashSet::from([head.id.clone()]);
        let mut next = head.previous_version_id.clone();
        let mut chain = vec![head];

        while let Some(previous_id) = next.take() {
            if chain.len() > MAX_VERSION_CHAIN_HOPS {
                tracing::warn!(
                    "Version chain of {} exceeds {} hops, truncating",
                    id,
                    MAX_VERSION_CHAIN_HOPS
                );
                break;
            }
            if !visited.insert(previous_id.clone()) {
                tracing::warn!("Version chain of {} loops back to {}", id, previous_id);
                break;
            }
            match self.get_document(&previous_id).await? {
                Some(doc) => {
                    next = doc.previous_version_id.clone();
                    chain.push(doc);
                }
                None => {
                    tracing::debug!("Version chain of {} ends at uncached {}", id, previous_id);
                }
            }
        }

        Ok(chain)
    }

    async fn exists(&self, table: &'static str, id: &str) -> Result<bool, AppError> {
        let row = sqlx::query(&format!("SELECT 1 FROM {} WHERE id = ?", table))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }
}

fn upsert_outcome(existed: bool, rows_affected: u64) -> UpsertOutcome {
    match (existed, rows_affected) {
        (false, _) => UpsertOutcome::Created,
        (true, 0) => UpsertOutcome::Unchanged,
        (true, _) => UpsertOutcome::Updated,
    }
}

// Helper functions for row conversion

fn dao_from_row(row: &sqlx::sqlite::SqliteRow) -> DaoProjection {
    let revoked: i32 = row.get("revoked");
    let status: String = row.get("status");
    DaoProjection {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        location: row.get("location"),
        member_count: row.get("member_count"),
        size: row.get("size"),
        admin_address: row.get("admin_address"),
        founding_date: row.get("founding_date"),
        attester: row.get("attester"),
        attested_at: row.get("attested_at"),
        revoked: revoked != 0,
        status: DaoStatus::from_str(&status).unwrap_or(DaoStatus::Active),
        logo_url: row.get("logo_url"),
        website: row.get("website"),
        contact_email: row.get("contact_email"),
        twitter: row.get("twitter"),
        discord: row.get("discord"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        version: row.get("version"),
    }
}

fn document_from_row(row: &sqlx::sqlite::SqliteRow) -> DocumentProjection {
    let status: String = row.get("status");
    DocumentProjection {
        id: row.get("id"),
        dao_id: row.get("dao_id"),
        title: row.get("title"),
        document_type: row.get("document_type"),
        hash: row.get("hash"),
        ipfs_cid: row.get("ipfs_cid"),
        version: row.get("version"),
        previous_version_id: row.get("previous_version_id"),
        status: DocumentStatus::from_str(&status).unwrap_or(DocumentStatus::Active),
        attester: row.get("attester"),
        schema_version: row.get("schema_version"),
        attested_at: row.get("attested_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_database;
    use crate::models::fixtures::{dao, document, uid};
    use tempfile::TempDir;

    async fn repo() -> (Repository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_database(&temp_dir.path().join("test.sqlite"))
            .await
            .unwrap();
        (Repository::new(pool), temp_dir)
    }

    #[tokio::test]
    async fn test_upsert_dao_outcomes() {
        let (repo, _dir) = repo().await;
        let fields = dao(1, "Alpha", 100).decode_dao().unwrap();

        assert_eq!(repo.upsert_dao(&fields).await.unwrap(), UpsertOutcome::Created);
        let first = repo.get_dao(&fields.id).await.unwrap().unwrap();

        assert_eq!(repo.upsert_dao(&fields).await.unwrap(), UpsertOutcome::Unchanged);
        let second = repo.get_dao(&fields.id).await.unwrap().unwrap();
        assert_eq!(first, second);

        let renamed = DaoChainFields {
            name: "Alpha Renamed".to_string(),
            ..fields
        };
        assert_eq!(repo.upsert_dao(&renamed).await.unwrap(), UpsertOutcome::Updated);
        let third = repo.get_dao(&renamed.id).await.unwrap().unwrap();
        assert_eq!(third.name, "Alpha Renamed");
        assert_eq!(third.created_at, first.created_at);
    }

    #[tokio::test]
    async fn test_upsert_dao_preserves_profile_fields() {
        let (repo, _dir) = repo().await;
        let fields = dao(1, "Alpha", 100).decode_dao().unwrap();
        repo.upsert_dao(&fields).await.unwrap();

        let edit = UpdateDaoProfileRequest {
            logo_url: Some("https://alpha.example/logo.png".to_string()),
            website: Some("https://alpha.example".to_string()),
            ..Default::default()
        };
        repo.update_dao_profile(&fields.id, &edit).await.unwrap();

        let renamed = DaoChainFields {
            name: "Alpha II".to_string(),
            ..fields.clone()
        };
        repo.upsert_dao(&renamed).await.unwrap();

        let stored = repo.get_dao(&fields.id).await.unwrap().unwrap();
        assert_eq!(stored.name, "Alpha II");
        assert_eq!(
            stored.logo_url.as_deref(),
            Some("https://alpha.example/logo.png")
        );
        assert_eq!(stored.website.as_deref(), Some("https://alpha.example"));
        assert_eq!(stored.version, 2);
    }

    #[tokio::test]
    async fn test_dao_revocation_deactivates_once() {
        let (repo, _dir) = repo().await;
        let fields = dao(1, "Alpha", 100).decode_dao().unwrap();
        repo.upsert_dao(&fields).await.unwrap();

        let revoked = DaoChainFields {
            revoked: true,
            ..fields.clone()
        };
        assert_eq!(repo.upsert_dao(&revoked).await.unwrap(), UpsertOutcome::Updated);
        let stored = repo.get_dao(&fields.id).await.unwrap().unwrap();
        assert!(stored.revoked);
        assert_eq!(stored.status, DaoStatus::Inactive);

        // A manual reactivation survives later passes
        let edit = UpdateDaoProfileRequest {
            status: Some(DaoStatus::Active),
            ..Default::default()
        };
        repo.update_dao_profile(&fields.id, &edit).await.unwrap();
        assert_eq!(repo.upsert_dao(&revoked).await.unwrap(), UpsertOutcome::Unchanged);
        let stored = repo.get_dao(&fields.id).await.unwrap().unwrap();
        assert_eq!(stored.status, DaoStatus::Active);

        // Revocation never reverts
        repo.upsert_dao(&fields).await.unwrap();
        assert!(repo.get_dao(&fields.id).await.unwrap().unwrap().revoked);
    }

    #[tokio::test]
    async fn test_document_revocation_is_terminal() {
        let (repo, _dir) = repo().await;
        let fields = document(10, 1, "Charter", None, 100)
            .decode_document()
            .unwrap();
        repo.upsert_document(&fields).await.unwrap();

        let revoked = DocumentChainFields {
            revoked: true,
            ..fields.clone()
        };
        assert_eq!(
            repo.upsert_document(&revoked).await.unwrap(),
            UpsertOutcome::Updated
        );
        assert_eq!(
            repo.upsert_document(&fields).await.unwrap(),
            UpsertOutcome::Unchanged
        );
        let stored = repo.get_document(&fields.id).await.unwrap().unwrap();
        assert_eq!(stored.status, DocumentStatus::Revoked);
    }

    #[tokio::test]
    async fn test_update_profile_version_conflict() {
        let (repo, _dir) = repo().await;
        let fields = dao(1, "Alpha", 100).decode_dao().unwrap();
        repo.upsert_dao(&fields).await.unwrap();

        let edit = UpdateDaoProfileRequest {
            twitter: Some("@alpha".to_string()),
            expected_version: Some(1),
            ..Default::default()
        };
        repo.update_dao_profile(&fields.id, &edit).await.unwrap();

        let stale = repo.update_dao_profile(&fields.id, &edit).await;
        match stale {
            Err(AppError::Conflict {
                current_version, ..
            }) => assert_eq!(current_version, 2),
            other => panic!("expected conflict, got {:?}", other),
        }

        let missing = repo.update_dao_profile(&uid(99), &edit).await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_version_chain_follows_links() {
        let (repo, _dir) = repo().await;
        for (n, previous) in [(10, None), (11, Some(10)), (12, Some(11))] {
            let fields = document(n, 1, &format!("Charter {}", n), previous, n as i64)
                .decode_document()
                .unwrap();
            repo.upsert_document(&fields).await.unwrap();
        }

        let chain = repo.version_chain(&uid(12)).await.unwrap();
        let ids: Vec<_> = chain.iter().map(|d| d.id.clone()).collect();
        assert_eq!(ids, vec![uid(12), uid(11), uid(10)]);
    }

    #[tokio::test]
    async fn test_version_chain_terminates_on_cycle() {
        let (repo, _dir) = repo().await;
        // 20 -> 21 -> 20
        for (n, previous) in [(20, 21), (21, 20)] {
            let fields = document(n, 1, "Loop", Some(previous), n as i64)
                .decode_document()
                .unwrap();
            repo.upsert_document(&fields).await.unwrap();
        }

        let chain = repo.version_chain(&uid(20)).await.unwrap();
        assert_eq!(chain.len(), 2);
    }

    #[tokio::test]
    async fn test_version_chain_is_bounded() {
        let (repo, _dir) = repo().await;
        let total = MAX_VERSION_CHAIN_HOPS as u64 + 10;
        for n in 1..=total {
            let previous = if n > 1 { Some(n - 1) } else { None };
            let fields = document(n, 1000, "Long", previous, n as i64)
                .decode_document()
                .unwrap();
            repo.upsert_document(&fields).await.unwrap();
        }

        let chain = repo.version_chain(&uid(total)).await.unwrap();
        assert_eq!(chain.len(), MAX_VERSION_CHAIN_HOPS + 1);
    }

    #[tokio::test]
    async fn test_version_chain_missing_head() {
        let (repo, _dir) = repo().await;
        assert!(matches!(
            repo.version_chain(&uid(5)).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_record_sync_is_monotonic() {
        let (repo, _dir) = repo().await;
        assert!(repo.get_sync_meta().await.unwrap().synced_at.is_none());

        let later = DateTime::<Utc>::from_timestamp_millis(2_000_000).unwrap();
        let earlier = DateTime::<Utc>::from_timestamp_millis(1_000_000).unwrap();

        assert!(repo.record_sync(later, 3, 4).await.unwrap());
        assert!(!repo.record_sync(earlier, 9, 9).await.unwrap());

        let meta = repo.get_sync_meta().await.unwrap();
        assert_eq!(meta.synced_at, Some(later));
        assert_eq!(meta.dao_count, 3);
        assert_eq!(meta.document_count, 4);
    }

    #[tokio::test]
    async fn test_recent_queries_order_and_limit() {
        let (repo, _dir) = repo().await;
        for n in 1..=5 {
            repo.upsert_dao(&dao(n, &format!("DAO {}", n), n as i64 * 10).decode_dao().unwrap())
                .await
                .unwrap();
        }
        let recent = repo.recent_daos(3).await.unwrap();
        let names: Vec<_> = recent.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["DAO 5", "DAO 4", "DAO 3"]);
    }
}

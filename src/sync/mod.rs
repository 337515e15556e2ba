//! Reconciliation of the projection cache against the attestation indexer.
//!
//! The indexer owns on-chain fields; the cache owns profile fields. A pass
//! only ever writes the former, so re-running it is harmless.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SubsecRound, Utc};

use crate::db::Repository;
use crate::errors::AppError;
use crate::indexer::AttestationIndexer;
use crate::models::{
    is_valid_uid, Attestation, RecordKind, SyncMeta, SyncOneOutcome, SyncSummary, UpsertOutcome,
};
use crate::search::SearchIndex;

/// Schema UIDs that identify registry attestations.
#[derive(Debug, Clone)]
pub struct RegistrySchemas {
    pub dao: String,
    pub document: String,
}

impl RegistrySchemas {
    fn kind_of(&self, attestation: &Attestation) -> Option<RecordKind> {
        let schema = attestation.schema_id.as_str();
        if !self.dao.is_empty() && schema.eq_ignore_ascii_case(&self.dao) {
            Some(RecordKind::Dao)
        } else if !self.document.is_empty() && schema.eq_ignore_ascii_case(&self.document) {
            Some(RecordKind::Document)
        } else {
            None
        }
    }
}

/// Keeps projections in agreement with the indexer.
pub struct SyncService {
    repo: Arc<Repository>,
    search: Arc<SearchIndex>,
    indexer: Arc<dyn AttestationIndexer>,
    schemas: RegistrySchemas,
    stale_after: Duration,
    lazy_in_flight: AtomicBool,
}

impl SyncService {
    pub fn new(
        repo: Arc<Repository>,
        search: Arc<SearchIndex>,
        indexer: Arc<dyn AttestationIndexer>,
        schemas: RegistrySchemas,
        stale_after: Duration,
    ) -> Self {
        Self {
            repo,
            search,
            indexer,
            schemas,
            stale_after,
            lazy_in_flight: AtomicBool::new(false),
        }
    }

    /// Reconcile every DAO and document attestation.
    ///
    /// Fails only when the indexer cannot be read. Records that fail to decode
    /// or store are logged, counted in `failed` and skipped.
    pub async fn sync_all(&self) -> Result<SyncSummary, AppError> {
        let dao_attestations = self.fetch_schema(&self.schemas.dao, RecordKind::Dao).await?;
        let document_attestations = self
            .fetch_schema(&self.schemas.document, RecordKind::Document)
            .await?;

        let mut summary = SyncSummary::default();

        for attestation in &dao_attestations {
            match self.apply_dao(attestation).await {
                Ok(_) => summary.dao_count += 1,
                Err(e) => {
                    summary.failed += 1;
                    tracing::warn!(uid = %attestation.id, "Skipping DAO attestation: {}", e);
                }
            }
        }

        for attestation in &document_attestations {
            match self.apply_document(attestation).await {
                Ok(_) => summary.document_count += 1,
                Err(e) => {
                    summary.failed += 1;
                    tracing::warn!(uid = %attestation.id, "Skipping document attestation: {}", e);
                }
            }
        }

        // Only after every upsert of this pass was attempted. Stored at
        // millisecond precision.
        let synced_at = Utc::now().trunc_subsecs(3);
        let recorded = self
            .repo
            .record_sync(synced_at, summary.dao_count, summary.document_count)
            .await?;
        if !recorded {
            tracing::debug!("A newer sync pass was already recorded");
        }
        summary.synced_at = Some(synced_at);

        if let Err(e) = self.refresh_search_index().await {
            tracing::warn!("Failed to rebuild search index after sync: {}", e);
        }

        tracing::info!(
            daos = summary.dao_count,
            documents = summary.document_count,
            failed = summary.failed,
            "Full sync completed"
        );
        Ok(summary)
    }

    /// Reconcile a single attestation by uid.
    ///
    /// The uid format is checked before the indexer is contacted. An uid the
    /// indexer does not know is not an error.
    pub async fn sync_one(&self, uid: &str) -> Result<SyncOneOutcome, AppError> {
        if !is_valid_uid(uid) {
            return Err(AppError::Validation(format!(
                "Invalid attestation uid '{}': expected 0x followed by 64 hex characters",
                uid
            )));
        }

        let Some(attestation) = self.indexer.fetch_attestation(uid).await? else {
            tracing::info!(uid, "Attestation not indexed yet, nothing to sync");
            return Ok(SyncOneOutcome::NotIndexed {
                uid: uid.to_string(),
            });
        };

        let kind = self.schemas.kind_of(&attestation).ok_or_else(|| {
            AppError::Unprocessable(format!(
                "Attestation {} uses schema {}, which is not a registry schema",
                attestation.id, attestation.schema_id
            ))
        })?;

        let outcome = match kind {
            RecordKind::Dao => {
                let outcome = self.apply_dao(&attestation).await?;
                if let Some(dao) = self.repo.get_dao(&attestation.id).await? {
                    if let Err(e) = self.search.index_dao(&dao).await {
                        tracing::warn!("Failed to index DAO {}: {}", dao.id, e);
                    }
                }
                outcome
            }
            RecordKind::Document => {
                let outcome = self.apply_document(&attestation).await?;
                if let Some(document) = self.repo.get_document(&attestation.id).await? {
                    if let Err(e) = self.search.index_document(&document).await {
                        tracing::warn!("Failed to index document {}: {}", document.id, e);
                    }
                }
                outcome
            }
        };

        tracing::info!(uid, kind = kind.as_str(), ?outcome, "Attestation synced");
        Ok(SyncOneOutcome::Synced {
            uid: attestation.id,
            kind,
            outcome,
        })
    }

    /// Start a full sync in the background when the cache is stale.
    ///
    /// Returns immediately. At most one lazy pass runs at a time; its failures
    /// and panics are logged and never reach the caller.
    pub fn trigger_lazy_sync(self: &Arc<Self>) {
        if self.lazy_in_flight.swap(true, Ordering::AcqRel) {
            tracing::trace!("Lazy sync already in flight");
            return;
        }

        let worker = Arc::clone(self);
        let task = tokio::spawn(async move { worker.sync_if_stale().await });

        let service = Arc::clone(self);
        tokio::spawn(async move {
            match task.await {
                Ok(Ok(Some(summary))) => tracing::debug!(
                    daos = summary.dao_count,
                    documents = summary.document_count,
                    "Lazy sync refreshed the cache"
                ),
                Ok(Ok(None)) => {}
                Ok(Err(e)) => log_background_failure("lazy sync", &e),
                Err(join_error) => log_background_failure("lazy sync", &join_error),
            }
            service.lazy_in_flight.store(false, Ordering::Release);
        });
    }

    /// Run a full sync if the last one is older than the staleness threshold.
    pub async fn sync_if_stale(&self) -> Result<Option<SyncSummary>, AppError> {
        let meta = self.repo.get_sync_meta().await?;
        if !self.is_stale(&meta, Utc::now()) {
            return Ok(None);
        }
        self.sync_all().await.map(Some)
    }

    /// Current sync metadata.
    pub async fn sync_status(&self) -> Result<SyncMeta, AppError> {
        self.repo.get_sync_meta().await
    }

    fn is_stale(&self, meta: &SyncMeta, now: DateTime<Utc>) -> bool {
        match meta.synced_at {
            None => true,
            Some(synced_at) => now
                .signed_duration_since(synced_at)
                .to_std()
                .map(|age| age > self.stale_after)
                .unwrap_or(false),
        }
    }

    #[cfg(test)]
    fn lazy_sync_running(&self) -> bool {
        self.lazy_in_flight.load(Ordering::Acquire)
    }

    async fn fetch_schema(
        &self,
        schema_id: &str,
        kind: RecordKind,
    ) -> Result<Vec<Attestation>, AppError> {
        if schema_id.is_empty() {
            tracing::warn!("No schema UID configured for {} attestations", kind.as_str());
            return Ok(Vec::new());
        }
        self.indexer.fetch_attestations(schema_id).await
    }

    async fn apply_dao(&self, attestation: &Attestation) -> Result<UpsertOutcome, AppError> {
        let fields = attestation.decode_dao()?;
        self.repo.upsert_dao(&fields).await
    }

    async fn apply_document(&self, attestation: &Attestation) -> Result<UpsertOutcome, AppError> {
        let fields = attestation.decode_document()?;
        self.repo.upsert_document(&fields).await
    }

    async fn refresh_search_index(&self) -> Result<(), AppError> {
        let daos = self.repo.list_daos().await?;
        let documents = self.repo.list_documents().await?;
        self.search.rebuild(&daos, &documents).await
    }
}

/// Sink for failures of detached tasks, which have no caller to report to.
fn log_background_failure(task: &str, error: &dyn std::fmt::Display) {
    tracing::error!(target: "background", task, "Background task failed: {}", error);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_database;
    use crate::indexer::mock::MockIndexer;
    use crate::models::fixtures::{self, dao, document, uid};
    use crate::models::{DaoStatus, DocumentStatus, UpdateDaoProfileRequest};
    use tempfile::TempDir;

    struct Harness {
        service: Arc<SyncService>,
        repo: Arc<Repository>,
        indexer: Arc<MockIndexer>,
        _temp_dir: TempDir,
    }

    async fn harness(stale_after: Duration) -> Harness {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_database(&temp_dir.path().join("test.sqlite"))
            .await
            .unwrap();
        let repo = Arc::new(Repository::new(pool));
        let search = Arc::new(SearchIndex::open(&temp_dir.path().join("index")).unwrap());
        let indexer = Arc::new(MockIndexer::new());
        let service = Arc::new(SyncService::new(
            repo.clone(),
            search,
            indexer.clone(),
            RegistrySchemas {
                dao: fixtures::DAO_SCHEMA.to_string(),
                document: fixtures::DOCUMENT_SCHEMA.to_string(),
            },
            stale_after,
        ));
        Harness {
            service,
            repo,
            indexer,
            _temp_dir: temp_dir,
        }
    }

    fn seed(indexer: &MockIndexer) {
        indexer.put(dao(1, "Alpha", 100));
        indexer.put(dao(2, "Beta", 200));
        indexer.put(document(10, 1, "Charter", None, 300));
        indexer.put(document(11, 1, "Charter v2", Some(10), 400));
    }

    #[tokio::test]
    async fn test_sync_all_creates_projections() {
        let h = harness(Duration::from_secs(300)).await;
        seed(&h.indexer);

        let summary = h.service.sync_all().await.unwrap();
        assert_eq!(summary.dao_count, 2);
        assert_eq!(summary.document_count, 2);
        assert_eq!(summary.failed, 0);

        let meta = h.service.sync_status().await.unwrap();
        assert_eq!(meta.synced_at, summary.synced_at);
        assert_eq!(meta.dao_count, 2);

        let charter = h.repo.get_document(&uid(11)).await.unwrap().unwrap();
        assert_eq!(charter.previous_version_id, Some(uid(10)));
        assert_eq!(charter.status, DocumentStatus::Active);
    }

    #[tokio::test]
    async fn test_sync_all_is_idempotent() {
        let h = harness(Duration::from_secs(300)).await;
        seed(&h.indexer);

        let first = h.service.sync_all().await.unwrap();
        let daos_before = h.repo.list_daos().await.unwrap();
        let documents_before = h.repo.list_documents().await.unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = h.service.sync_all().await.unwrap();

        assert_eq!(h.repo.list_daos().await.unwrap(), daos_before);
        assert_eq!(h.repo.list_documents().await.unwrap(), documents_before);
        assert!(second.synced_at > first.synced_at);
        assert_eq!(
            h.service.sync_status().await.unwrap().synced_at,
            second.synced_at
        );
    }

    #[tokio::test]
    async fn test_sync_all_preserves_profile_fields() {
        let h = harness(Duration::from_secs(300)).await;
        seed(&h.indexer);
        h.service.sync_all().await.unwrap();

        let edit = UpdateDaoProfileRequest {
            status: Some(DaoStatus::Inactive),
            logo_url: Some("https://alpha.example/logo.svg".to_string()),
            ..Default::default()
        };
        let edited = h.repo.update_dao_profile(&uid(1), &edit).await.unwrap();

        h.service.sync_all().await.unwrap();

        let after = h.repo.get_dao(&uid(1)).await.unwrap().unwrap();
        assert_eq!(after, edited);
    }

    #[tokio::test]
    async fn test_sync_all_fails_when_indexer_fails() {
        let h = harness(Duration::from_secs(300)).await;
        seed(&h.indexer);
        h.indexer.set_failing(true);

        let err = h.service.sync_all().await.unwrap_err();
        assert!(matches!(err, AppError::Upstream { .. }));
        assert!(h.service.sync_status().await.unwrap().synced_at.is_none());
        assert!(h.repo.list_daos().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sync_all_skips_bad_records() {
        let h = harness(Duration::from_secs(300)).await;
        seed(&h.indexer);
        let mut broken = dao(3, "Broken", 500);
        broken.decoded_data_json = "not json".to_string();
        h.indexer.put(broken);

        let summary = h.service.sync_all().await.unwrap();
        assert_eq!(summary.dao_count, 2);
        assert_eq!(summary.failed, 1);
        assert!(h.repo.get_dao(&uid(3)).await.unwrap().is_none());
        assert!(summary.synced_at.is_some());
    }

    #[tokio::test]
    async fn test_sync_one_rejects_malformed_uid_before_indexer() {
        let h = harness(Duration::from_secs(300)).await;

        let err = h.service.sync_one("not-a-valid-hex-id").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(h.indexer.calls(), 0);
    }

    #[tokio::test]
    async fn test_sync_one_missing_attestation_is_noop() {
        let h = harness(Duration::from_secs(300)).await;

        let outcome = h.service.sync_one(&uid(42)).await.unwrap();
        assert_eq!(outcome, SyncOneOutcome::NotIndexed { uid: uid(42) });
        assert!(h.repo.list_daos().await.unwrap().is_empty());
        assert!(h.repo.list_documents().await.unwrap().is_empty());
        assert_eq!(h.repo.get_sync_meta().await.unwrap(), SyncMeta::default());
    }

    #[tokio::test]
    async fn test_sync_one_applies_revocation() {
        let h = harness(Duration::from_secs(300)).await;
        seed(&h.indexer);
        h.service.sync_all().await.unwrap();

        h.indexer.revoke(&uid(10));
        let outcome = h.service.sync_one(&uid(10)).await.unwrap();
        assert_eq!(
            outcome,
            SyncOneOutcome::Synced {
                uid: uid(10),
                kind: RecordKind::Document,
                outcome: UpsertOutcome::Updated,
            }
        );

        let doc = h.repo.get_document(&uid(10)).await.unwrap().unwrap();
        assert_eq!(doc.status, DocumentStatus::Revoked);
    }

    #[tokio::test]
    async fn test_sync_one_rejects_foreign_schema() {
        let h = harness(Duration::from_secs(300)).await;
        let mut foreign = dao(7, "Elsewhere", 1);
        foreign.schema_id = uid(999);
        h.indexer.put(foreign);

        let err = h.service.sync_one(&uid(7)).await.unwrap_err();
        assert!(matches!(err, AppError::Unprocessable(_)));
    }

    #[tokio::test]
    async fn test_sync_if_stale_skips_fresh_cache() {
        let h = harness(Duration::from_secs(300)).await;
        seed(&h.indexer);

        assert!(h.service.sync_if_stale().await.unwrap().is_some());
        let calls = h.indexer.calls();

        assert!(h.service.sync_if_stale().await.unwrap().is_none());
        assert_eq!(h.indexer.calls(), calls);
    }

    #[tokio::test]
    async fn test_is_stale() {
        let h = harness(Duration::from_secs(60)).await;
        let now = Utc::now();
        let meta = |age_secs: i64| SyncMeta {
            synced_at: Some(now - chrono::Duration::seconds(age_secs)),
            ..Default::default()
        };

        assert!(h.service.is_stale(&SyncMeta::default(), now));
        assert!(!h.service.is_stale(&meta(30), now));
        assert!(h.service.is_stale(&meta(61), now));
        // Clock skew: a pass "in the future" is fresh
        assert!(!h.service.is_stale(&meta(-30), now));
    }

    async fn wait_for_lazy_sync(service: &SyncService) {
        for _ in 0..200 {
            if !service.lazy_sync_running() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("lazy sync did not finish");
    }

    #[tokio::test]
    async fn test_trigger_lazy_sync_refreshes_in_background() {
        let h = harness(Duration::from_secs(300)).await;
        seed(&h.indexer);

        h.service.trigger_lazy_sync();
        wait_for_lazy_sync(&h.service).await;

        assert!(h.service.sync_status().await.unwrap().synced_at.is_some());
        assert_eq!(h.repo.list_daos().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_trigger_lazy_sync_swallows_failures() {
        let h = harness(Duration::from_secs(300)).await;
        h.indexer.set_failing(true);

        h.service.trigger_lazy_sync();
        wait_for_lazy_sync(&h.service).await;

        assert!(h.service.sync_status().await.unwrap().synced_at.is_none());

        // The in-flight flag is released, so a later trigger runs again
        h.indexer.set_failing(false);
        seed(&h.indexer);
        h.service.trigger_lazy_sync();
        wait_for_lazy_sync(&h.service).await;
        assert!(h.service.sync_status().await.unwrap().synced_at.is_some());
    }
}

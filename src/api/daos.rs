//! DAO API endpoints.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};

use super::{bad_body, success, ApiResult, ClientIp};
use crate::errors::AppError;
use crate::models::{
    is_valid_uid, DaoProjection, DocumentProjection, SyncOneOutcome, UpdateDaoProfileRequest,
};
use crate::rate_limit;
use crate::AppState;

/// GET /api/daos - List all cached DAOs.
pub async fn list_daos(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
) -> ApiResult<Vec<DaoProjection>> {
    state.limiter.enforce(rate_limit::READ, &ip)?;
    success(state.repo.list_daos().await?)
}

/// GET /api/daos/:id - Get a single DAO.
///
/// A cache miss for a well-formed uid pulls the attestation from the indexer,
/// so a freshly registered DAO is visible before the next full sync. That
/// fallback is charged to the single-record sync budget.
pub async fn get_dao(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Path(id): Path<String>,
) -> ApiResult<DaoProjection> {
    state.limiter.enforce(rate_limit::READ, &ip)?;

    if let Some(dao) = state.repo.get_dao(&id).await? {
        return success(dao);
    }

    let not_found = || AppError::NotFound(format!("DAO {} not found", id));
    if !is_valid_uid(&id) {
        return Err(not_found());
    }

    state.limiter.enforce(rate_limit::SYNC_ONE, &ip)?;
    match state.sync.sync_one(&id).await? {
        SyncOneOutcome::NotIndexed { .. } => Err(not_found()),
        SyncOneOutcome::Synced { uid, .. } => match state.repo.get_dao(&uid).await? {
            Some(dao) => success(dao),
            // The uid belongs to a document
            None => Err(not_found()),
        },
    }
}

/// PATCH /api/daos/:id - Edit the cache-only profile of a DAO.
pub async fn update_dao_profile(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Path(id): Path<String>,
    body: Result<Json<UpdateDaoProfileRequest>, JsonRejection>,
) -> ApiResult<DaoProjection> {
    state.limiter.enforce(rate_limit::READ, &ip)?;
    let Json(request) = body.map_err(bad_body)?;

    if request.is_empty() {
        return Err(AppError::Validation(
            "At least one profile field is required".to_string(),
        ));
    }
    if let Some(email) = request.contact_email.as_deref() {
        if !email.is_empty() && !email.contains('@') {
            return Err(AppError::Validation(format!(
                "Invalid contact email '{}'",
                email
            )));
        }
    }

    let dao = state.repo.update_dao_profile(&id, &request).await?;

    if let Err(e) = state.search.index_dao(&dao).await {
        tracing::warn!("Failed to index DAO {}: {}", dao.id, e);
    }

    tracing::info!(id = %dao.id, version = dao.version, "DAO profile updated");
    success(dao)
}

/// GET /api/daos/:id/documents - Documents attached to a DAO.
pub async fn list_dao_documents(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Path(id): Path<String>,
) -> ApiResult<Vec<DocumentProjection>> {
    state.limiter.enforce(rate_limit::READ, &ip)?;

    if state.repo.get_dao(&id).await?.is_none() {
        return Err(AppError::NotFound(format!("DAO {} not found", id)));
    }

    success(state.repo.list_documents_for_dao(&id).await?)
}

//! Document API endpoints.

use axum::extract::{Path, State};

use super::{success, ApiResult, ClientIp};
use crate::errors::AppError;
use crate::models::DocumentProjection;
use crate::rate_limit;
use crate::AppState;

/// GET /api/documents/:id - Get a single document.
pub async fn get_document(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Path(id): Path<String>,
) -> ApiResult<DocumentProjection> {
    state.limiter.enforce(rate_limit::READ, &ip)?;

    match state.repo.get_document(&id).await? {
        Some(document) => success(document),
        None => Err(AppError::NotFound(format!("Document {} not found", id))),
    }
}

/// GET /api/documents/:id/versions - The version chain, newest first.
pub async fn get_document_versions(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Path(id): Path<String>,
) -> ApiResult<Vec<DocumentProjection>> {
    state.limiter.enforce(rate_limit::READ, &ip)?;
    success(state.repo.version_chain(&id).await?)
}

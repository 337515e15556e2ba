//! Sync API endpoints.

use axum::extract::{Path, State};

use super::{success, ApiResult, ClientIp};
use crate::models::{SyncMeta, SyncOneOutcome, SyncSummary};
use crate::rate_limit;
use crate::AppState;

/// GET /api/sync - Last sync time and record counts.
pub async fn get_sync_status(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
) -> ApiResult<SyncMeta> {
    state.limiter.enforce(rate_limit::READ, &ip)?;
    success(state.sync.sync_status().await?)
}

/// POST /api/sync - Reconcile every registry attestation.
pub async fn sync_all(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
) -> ApiResult<SyncSummary> {
    state.limiter.enforce(rate_limit::SYNC_ALL, &ip)?;
    success(state.sync.sync_all().await?)
}

/// POST /api/sync/:uid - Reconcile one attestation right after it was made.
pub async fn sync_one(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Path(uid): Path<String>,
) -> ApiResult<SyncOneOutcome> {
    state.limiter.enforce(rate_limit::SYNC_ONE, &ip)?;
    success(state.sync.sync_one(&uid).await?)
}

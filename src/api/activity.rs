//! Activity feed endpoint.

use axum::extract::State;

use super::{success, ApiResult, ClientIp};
use crate::models::{merge_activity, ActivityItem};
use crate::rate_limit;
use crate::AppState;

/// Number of entries in the activity feed.
const ACTIVITY_LIMIT: usize = 20;

/// GET /api/activity - Most recent DAOs and documents, newest first.
///
/// Serves from the cache and refreshes it in the background when stale.
pub async fn get_activity(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
) -> ApiResult<Vec<ActivityItem>> {
    state.limiter.enforce(rate_limit::ACTIVITY, &ip)?;

    state.sync.trigger_lazy_sync();

    let daos = state.repo.recent_daos(ACTIVITY_LIMIT).await?;
    let documents = state.repo.recent_documents(ACTIVITY_LIMIT).await?;

    success(merge_activity(&daos, &documents, ACTIVITY_LIMIT))
}

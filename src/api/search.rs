//! Search API endpoints.

use axum::extract::{Query, State};
use serde::{Deserialize, Serialize};

use super::{success, ApiResult, ClientIp};
use crate::errors::AppError;
use crate::models::{DaoProjection, DocumentProjection, RecordKind};
use crate::rate_limit;
use crate::search::MAX_RESULT_WINDOW;
use crate::AppState;

/// Search query parameters.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    /// Search query string.
    #[serde(default)]
    pub q: String,
    /// Maximum number of results (default: 20).
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Offset for pagination (default: 0).
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    20
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub results: Vec<SearchHit>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

/// Single search hit with the full projection.
#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SearchHit {
    Dao { dao: DaoProjection, score: f32 },
    Document {
        document: DocumentProjection,
        score: f32,
    },
}

/// Maximum number of search results allowed.
const MAX_SEARCH_LIMIT: usize = 100;

/// Maximum pagination offset allowed.
const MAX_SEARCH_OFFSET: usize = MAX_RESULT_WINDOW - MAX_SEARCH_LIMIT;

/// GET /api/search - Full-text search over DAOs and documents.
pub async fn search_registry(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Query(params): Query<SearchQuery>,
) -> ApiResult<SearchResponse> {
    state.limiter.enforce(rate_limit::READ, &ip)?;

    if params.offset > MAX_SEARCH_OFFSET {
        return Err(AppError::Validation(format!(
            "offset must be at most {}",
            MAX_SEARCH_OFFSET
        )));
    }
    let limit = params.limit.min(MAX_SEARCH_LIMIT);
    let hits = state.search.search(&params.q, limit, params.offset)?;

    // Index entries can briefly outlive their projection; skip those
    let mut results = Vec::with_capacity(hits.len());
    for hit in hits {
        let resolved = match hit.kind {
            RecordKind::Dao => state
                .repo
                .get_dao(&hit.record_id)
                .await?
                .map(|dao| SearchHit::Dao {
                    dao,
                    score: hit.score,
                }),
            RecordKind::Document => state
                .repo
                .get_document(&hit.record_id)
                .await?
                .map(|document| SearchHit::Document {
                    document,
                    score: hit.score,
                }),
        };
        results.extend(resolved);
    }

    let total = results.len();
    success(SearchResponse {
        results,
        total,
        limit,
        offset: params.offset,
    })
}

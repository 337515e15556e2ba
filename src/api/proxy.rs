//! Read-only GraphQL proxy to the attestation indexer.

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde_json::Value;

use super::{bad_body, ClientIp};
use crate::errors::AppError;
use crate::firewall::ProxyRequest;
use crate::rate_limit;
use crate::AppState;

/// POST /api/eas-proxy - Forward an allow-listed query.
///
/// On success the indexer's JSON is returned as is, without the envelope.
pub async fn eas_proxy(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    body: Result<Json<ProxyRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    state.limiter.enforce(rate_limit::EAS_PROXY, &ip)?;
    let Json(request) = body.map_err(bad_body)?;
    let response = state.firewall.proxy(&request).await?;
    Ok(Json(response))
}

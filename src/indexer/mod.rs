//! Read-only client for the EAS GraphQL attestation indexer.

#[cfg(test)]
pub(crate) mod mock;

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::errors::AppError;
use crate::models::Attestation;

/// Attestations requested per page when scanning a schema.
const PAGE_SIZE: usize = 100;

/// Hard cap on pages per schema scan.
const MAX_PAGES: usize = 100;

const ATTESTATION_FIELDS: &str = "id attester time revoked schemaId decodedDataJson";

/// Source of attestation records.
#[async_trait]
pub trait AttestationIndexer: Send + Sync {
    /// Every attestation issued under `schema_id`.
    async fn fetch_attestations(&self, schema_id: &str) -> Result<Vec<Attestation>, AppError>;

    /// One attestation by uid, `None` when the indexer does not know it.
    async fn fetch_attestation(&self, uid: &str) -> Result<Option<Attestation>, AppError>;

    /// Relay an already validated, serialized GraphQL request body and return the raw response.
    async fn execute_raw(&self, body: &str) -> Result<Value, AppError>;
}

#[derive(Debug, Deserialize)]
struct GraphQLResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQLError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQLError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct AttestationsData {
    attestations: Vec<Attestation>,
}

#[derive(Debug, Deserialize)]
struct AttestationData {
    attestation: Option<Attestation>,
}

/// `AttestationIndexer` backed by an EAS GraphQL endpoint.
pub struct EasGraphqlClient {
    endpoint: String,
    client: reqwest::Client,
}

impl EasGraphqlClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("dao-registry-backend/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build indexer client: {}", e)))?;

        Ok(Self {
            endpoint: endpoint.into(),
            client,
        })
    }

    async fn post(&self, body: String) -> Result<String, AppError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            tracing::warn!(
                status = status.as_u16(),
                "Indexer request failed: {}",
                truncate(&text, 200)
            );
            return Err(AppError::Upstream {
                status: Some(status.as_u16()),
                message: format!("Attestation indexer responded with {}", status),
            });
        }

        Ok(response.text().await?)
    }

    async fn query<T: serde::de::DeserializeOwned>(
        &self,
        query: &str,
        variables: Value,
    ) -> Result<T, AppError> {
        let body = json!({ "query": query, "variables": variables }).to_string();
        let text = self.post(body).await?;

        let response: GraphQLResponse<T> = serde_json::from_str(&text).map_err(|e| {
            tracing::error!("Unreadable indexer response: {}", e);
            AppError::Upstream {
                status: None,
                message: "Attestation indexer returned an unreadable response".to_string(),
            }
        })?;

        if let Some(errors) = response.errors.filter(|e| !e.is_empty()) {
            let joined = errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            return Err(AppError::Upstream {
                status: None,
                message: format!("Attestation indexer errors: {}", joined),
            });
        }

        response.data.ok_or_else(|| AppError::Upstream {
            status: None,
            message: "Attestation indexer returned no data".to_string(),
        })
    }
}

#[async_trait]
impl AttestationIndexer for EasGraphqlClient {
    async fn fetch_attestations(&self, schema_id: &str) -> Result<Vec<Attestation>, AppError> {
        let query = format!(
            "query SchemaAttestations($schemaId: String!, $take: Int!, $skip: Int!) {{ \
             attestations(where: {{ schemaId: {{ equals: $schemaId }} }}, \
             orderBy: [{{ time: asc }}], take: $take, skip: $skip) {{ {} }} }}",
            ATTESTATION_FIELDS
        );

        let mut all = Vec::new();
        for page in 0..MAX_PAGES {
            let data: AttestationsData = self
                .query(
                    &query,
                    json!({ "schemaId": schema_id, "take": PAGE_SIZE, "skip": page * PAGE_SIZE }),
                )
                .await?;
            let fetched = data.attestations.len();
            all.extend(data.attestations);
            if fetched < PAGE_SIZE {
                return Ok(all);
            }
        }

        tracing::warn!(
            "Schema {} scan stopped after {} attestations",
            schema_id,
            all.len()
        );
        Ok(all)
    }

    async fn fetch_attestation(&self, uid: &str) -> Result<Option<Attestation>, AppError> {
        let query = format!(
            "query Attestation($id: String!) {{ attestation(where: {{ id: $id }}) {{ {} }} }}",
            ATTESTATION_FIELDS
        );
        let data: AttestationData = self.query(&query, json!({ "id": uid })).await?;
        Ok(data.attestation)
    }

    async fn execute_raw(&self, body: &str) -> Result<Value, AppError> {
        let text = self.post(body.to_string()).await?;
        serde_json::from_str(&text).map_err(|e| {
            tracing::error!("Unreadable indexer response: {}", e);
            AppError::Upstream {
                status: None,
                message: "Attestation indexer returned an unreadable response".to_string(),
            }
        })
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_attestations_response() {
        let raw = r#"{
            "data": {
                "attestations": [{
                    "id": "0x0000000000000000000000000000000000000000000000000000000000000001",
                    "attester": "0x1111111111111111111111111111111111111111",
                    "time": 1700000000,
                    "revoked": true,
                    "schemaId": "0xabc",
                    "decodedDataJson": "[]"
                }]
            }
        }"#;
        let parsed: GraphQLResponse<AttestationsData> = serde_json::from_str(raw).unwrap();
        let attestations = parsed.data.unwrap().attestations;
        assert_eq!(attestations.len(), 1);
        assert!(attestations[0].revoked);
        assert_eq!(attestations[0].time, 1_700_000_000);
    }

    #[test]
    fn test_parse_missing_attestation() {
        let raw = r#"{ "data": { "attestation": null } }"#;
        let parsed: GraphQLResponse<AttestationData> = serde_json::from_str(raw).unwrap();
        assert!(parsed.data.unwrap().attestation.is_none());
    }

    #[test]
    fn test_parse_graphql_errors() {
        let raw = r#"{ "data": null, "errors": [{ "message": "boom" }] }"#;
        let parsed: GraphQLResponse<AttestationData> = serde_json::from_str(raw).unwrap();
        assert!(parsed.data.is_none());
        assert_eq!(parsed.errors.unwrap()[0].message, "boom");
    }

    #[tokio::test]
    async fn test_unreachable_indexer_is_upstream_error() {
        // Port 9 (discard) on localhost is expected to refuse connections
        let client =
            EasGraphqlClient::new("http://127.0.0.1:9/graphql", Duration::from_secs(2)).unwrap();
        let err = client.fetch_attestation("0x01").await.unwrap_err();
        assert!(matches!(err, AppError::Upstream { .. }));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("abc", 10), "abc");
    }
}

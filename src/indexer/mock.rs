//! In-memory indexer for tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use super::AttestationIndexer;
use crate::errors::AppError;
use crate::models::Attestation;

#[derive(Default)]
pub struct MockIndexer {
    attestations: Mutex<Vec<Attestation>>,
    failing: AtomicBool,
    calls: AtomicUsize,
    raw_calls: AtomicUsize,
}

impl MockIndexer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an attestation.
    pub fn put(&self, attestation: Attestation) {
        let mut all = self.attestations.lock();
        match all.iter_mut().find(|a| a.id == attestation.id) {
            Some(existing) => *existing = attestation,
            None => all.push(attestation),
        }
    }

    pub fn revoke(&self, uid: &str) {
        if let Some(att) = self.attestations.lock().iter_mut().find(|a| a.id == uid) {
            att.revoked = true;
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of attestation fetches (single or schema scan) served.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of raw proxied requests served.
    pub fn raw_calls(&self) -> usize {
        self.raw_calls.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<(), AppError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::Upstream {
                status: Some(503),
                message: "Attestation indexer responded with 503".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl AttestationIndexer for MockIndexer {
    async fn fetch_attestations(&self, schema_id: &str) -> Result<Vec<Attestation>, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(self
            .attestations
            .lock()
            .iter()
            .filter(|a| a.schema_id == schema_id)
            .cloned()
            .collect())
    }

    async fn fetch_attestation(&self, uid: &str) -> Result<Option<Attestation>, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(self
            .attestations
            .lock()
            .iter()
            .find(|a| a.id.eq_ignore_ascii_case(uid))
            .cloned())
    }

    async fn execute_raw(&self, body: &str) -> Result<Value, AppError> {
        self.raw_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        let request: Value = serde_json::from_str(body)?;
        Ok(json!({
            "data": { "echo": request["query"], "served": self.raw_calls() }
        }))
    }
}

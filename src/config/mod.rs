//! Configuration module for the registry backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Public EAS GraphQL endpoint used when none is configured.
pub const DEFAULT_INDEXER_URL: &str = "https://optimism.easscan.org/graphql";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared key guarding profile edits (required in production)
    pub api_psk: Option<String>,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Path to Tantivy search index directory
    pub index_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// EAS GraphQL endpoint
    pub indexer_url: String,
    /// Schema UID of DAO registration attestations
    pub dao_schema_uid: String,
    /// Schema UID of document attestations
    pub document_schema_uid: String,
    /// Age of the last full sync after which reads trigger a lazy sync
    pub lazy_sync_stale_after: Duration,
    /// Timeout applied to every indexer HTTP request
    pub indexer_timeout: Duration,
    /// Take the client address from `x-forwarded-for`/`x-real-ip`. Only safe
    /// behind a reverse proxy that overwrites those headers.
    pub trust_proxy_headers: bool,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let api_psk = env::var("REGISTRY_API_PSK").ok();

        let db_path = env::var("REGISTRY_DB_PATH")
            .unwrap_or_else(|_| "./data/registry.sqlite".to_string())
            .into();

        let index_path = env::var("REGISTRY_INDEX_PATH")
            .unwrap_or_else(|_| "./data/index".to_string())
            .into();

        let bind_addr = env::var("REGISTRY_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()
            .expect("Invalid REGISTRY_BIND_ADDR format");

        let log_level = env::var("REGISTRY_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let indexer_url =
            env::var("REGISTRY_INDEXER_URL").unwrap_or_else(|_| DEFAULT_INDEXER_URL.to_string());

        let dao_schema_uid = env::var("REGISTRY_DAO_SCHEMA_UID").unwrap_or_default();
        let document_schema_uid = env::var("REGISTRY_DOCUMENT_SCHEMA_UID").unwrap_or_default();

        let lazy_sync_stale_after = Duration::from_secs(secs_from_env(
            "REGISTRY_LAZY_SYNC_STALE_SECS",
            300,
        ));
        let indexer_timeout =
            Duration::from_secs(secs_from_env("REGISTRY_INDEXER_TIMEOUT_SECS", 30));

        let trust_proxy_headers = flag_from_env("REGISTRY_TRUST_PROXY_HEADERS");

        Self {
            api_psk,
            db_path,
            index_path,
            bind_addr,
            log_level,
            indexer_url,
            dao_schema_uid,
            document_schema_uid,
            lazy_sync_stale_after,
            indexer_timeout,
            trust_proxy_headers,
        }
    }
}

fn flag_from_env(key: &str) -> bool {
    env::var(key)
        .map(|raw| matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

fn secs_from_env(key: &str, default: u64) -> u64 {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring invalid {}={:?}, using {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        // Clear any existing env vars
        for key in [
            "REGISTRY_API_PSK",
            "REGISTRY_DB_PATH",
            "REGISTRY_INDEX_PATH",
            "REGISTRY_BIND_ADDR",
            "REGISTRY_LOG_LEVEL",
            "REGISTRY_INDEXER_URL",
            "REGISTRY_DAO_SCHEMA_UID",
            "REGISTRY_DOCUMENT_SCHEMA_UID",
            "REGISTRY_LAZY_SYNC_STALE_SECS",
            "REGISTRY_INDEXER_TIMEOUT_SECS",
            "REGISTRY_TRUST_PROXY_HEADERS",
        ] {
            env::remove_var(key);
        }

        let config = Config::from_env();

        assert!(config.api_psk.is_none());
        assert_eq!(config.db_path, PathBuf::from("./data/registry.sqlite"));
        assert_eq!(config.index_path, PathBuf::from("./data/index"));
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.indexer_url, DEFAULT_INDEXER_URL);
        assert!(config.dao_schema_uid.is_empty());
        assert_eq!(config.lazy_sync_stale_after, Duration::from_secs(300));
        assert_eq!(config.indexer_timeout, Duration::from_secs(30));
        assert!(!config.trust_proxy_headers);
    }

    #[test]
    fn test_flag_from_env() {
        assert!(!flag_from_env("REGISTRY_TEST_FLAG_UNSET"));
        env::set_var("REGISTRY_TEST_FLAG", "TRUE");
        assert!(flag_from_env("REGISTRY_TEST_FLAG"));
        env::set_var("REGISTRY_TEST_FLAG", "off");
        assert!(!flag_from_env("REGISTRY_TEST_FLAG"));
        env::remove_var("REGISTRY_TEST_FLAG");
    }

    #[test]
    fn test_invalid_seconds_fall_back_to_default() {
        env::set_var("REGISTRY_TEST_SECS_PARSE", "soon");
        assert_eq!(secs_from_env("REGISTRY_TEST_SECS_PARSE", 42), 42);
        env::set_var("REGISTRY_TEST_SECS_PARSE", "7");
        assert_eq!(secs_from_env("REGISTRY_TEST_SECS_PARSE", 42), 7);
        env::remove_var("REGISTRY_TEST_SECS_PARSE");
    }
}

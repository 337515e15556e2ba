//! DAO Registry Backend
//!
//! Caches EAS attestations for DAOs and their governance documents in SQLite,
//! serves them over REST with Tantivy full-text search, and proxies a vetted
//! subset of GraphQL queries to the attestation indexer.

mod api;
mod auth;
mod config;
mod db;
mod errors;
mod firewall;
mod indexer;
mod models;
mod rate_limit;
mod search;
mod sync;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::Config;
use db::Repository;
use firewall::QueryFirewall;
use indexer::{AttestationIndexer, EasGraphqlClient};
use rate_limit::RateLimiter;
use search::SearchIndex;
use sync::{RegistrySchemas, SyncService};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub search: Arc<SearchIndex>,
    pub config: Arc<Config>,
    pub sync: Arc<SyncService>,
    pub firewall: Arc<QueryFirewall>,
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    /// Wire the services around an indexer.
    pub fn new(
        config: Config,
        repo: Arc<Repository>,
        search: Arc<SearchIndex>,
        indexer: Arc<dyn AttestationIndexer>,
    ) -> Self {
        let schemas = RegistrySchemas {
            dao: config.dao_schema_uid.clone(),
            document: config.document_schema_uid.clone(),
        };
        let sync = Arc::new(SyncService::new(
            repo.clone(),
            search.clone(),
            indexer.clone(),
            schemas,
            config.lazy_sync_stale_after,
        ));

        Self {
            repo,
            search,
            config: Arc::new(config),
            sync,
            firewall: Arc::new(QueryFirewall::new(indexer)),
            limiter: Arc::new(RateLimiter::new()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env();

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting DAO Registry Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Index path: {:?}", config.index_path);
    tracing::info!("Indexer endpoint: {}", config.indexer_url);
    tracing::info!("Bind address: {}", config.bind_addr);

    if config.api_psk.is_none() {
        tracing::warn!("No API PSK configured (REGISTRY_API_PSK). Profile edits are unauthenticated!");
    }
    if config.dao_schema_uid.is_empty() || config.document_schema_uid.is_empty() {
        tracing::warn!(
            "REGISTRY_DAO_SCHEMA_UID or REGISTRY_DOCUMENT_SCHEMA_UID is not set; \
             attestations of that kind will not be synced"
        );
    }

    // Initialize database
    let pool = db::init_database(&config.db_path).await?;
    let repo = Arc::new(Repository::new(pool));

    // Initialize search index
    let search = Arc::new(SearchIndex::open(&config.index_path)?);

    // Build initial search index from the cache
    tracing::info!("Building search index...");
    let daos = repo.list_daos().await?;
    let documents = repo.list_documents().await?;
    search.rebuild(&daos, &documents).await?;

    let indexer: Arc<dyn AttestationIndexer> = Arc::new(EasGraphqlClient::new(
        config.indexer_url.clone(),
        config.indexer_timeout,
    )?);

    let bind_addr = config.bind_addr;
    let state = AppState::new(config, repo, search, indexer);

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("Server listening on {}", bind_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Clone PSK for the auth layer
    let psk = state.config.api_psk.clone();
    let require_psk =
        middleware::from_fn(move |req, next| auth::psk_auth_layer(psk.clone(), req, next));

    // API routes
    let api_routes = Router::new()
        // Sync
        .route("/sync", get(api::get_sync_status))
        .route("/sync", post(api::sync_all))
        .route("/sync/{uid}", post(api::sync_one))
        // Indexer proxy
        .route("/eas-proxy", post(api::eas_proxy))
        // Activity
        .route("/activity", get(api::get_activity))
        // DAOs
        .route("/daos", get(api::list_daos))
        .route("/daos/{id}", get(api::get_dao))
        .route(
            "/daos/{id}",
            patch(api::update_dao_profile).route_layer(require_psk),
        )
        .route("/daos/{id}/documents", get(api::list_dao_documents))
        // Documents
        .route("/documents/{id}", get(api::get_document))
        .route("/documents/{id}/versions", get(api::get_document_versions))
        // Search
        .route("/search", get(api::search_registry));

    // Health check
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

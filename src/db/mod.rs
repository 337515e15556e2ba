//! Database module for SQLite persistence.
//!
//! SQLite holds the projection cache. The attestation indexer is the source
//! of truth for on-chain fields; SQLite is the source of truth for profile fields.

mod repository;

pub use repository::*;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// Initialize the database connection pool and run migrations.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

/// Run database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    // synced_at is Unix milliseconds; NULL until the first full pass completes
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sync_meta (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            synced_at INTEGER,
            dao_count INTEGER NOT NULL DEFAULT 0,
            document_count INTEGER NOT NULL DEFAULT 0
        );

        INSERT OR IGNORE INTO sync_meta (id, synced_at, dao_count, document_count)
        VALUES (1, NULL, 0, 0);
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS daos (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT,
            location TEXT,
            member_count INTEGER,
            size TEXT,
            admin_address TEXT,
            founding_date TEXT,
            attester TEXT NOT NULL,
            attested_at INTEGER NOT NULL,
            revoked INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'active',
            logo_url TEXT,
            website TEXT,
            contact_email TEXT,
            twitter TEXT,
            discord TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            version INTEGER NOT NULL DEFAULT 1
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            dao_id TEXT NOT NULL,
            title TEXT NOT NULL,
            document_type TEXT NOT NULL,
            hash TEXT NOT NULL,
            ipfs_cid TEXT,
            version TEXT NOT NULL,
            previous_version_id TEXT,
            status TEXT NOT NULL DEFAULT 'active',
            attester TEXT NOT NULL,
            schema_version TEXT NOT NULL,
            attested_at INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes for common queries
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_daos_attested_at ON daos(attested_at);
        CREATE INDEX IF NOT EXISTS idx_daos_name ON daos(name);
        CREATE INDEX IF NOT EXISTS idx_documents_dao_id ON documents(dao_id);
        CREATE INDEX IF NOT EXISTS idx_documents_attested_at ON documents(attested_at);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

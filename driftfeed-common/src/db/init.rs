//! Database initialization
//!
//! Creates the driftfeed schema on first run and seeds default settings.
//! All schema statements are idempotent (`CREATE TABLE IF NOT EXISTS`),
//! so startup is safe to repeat against an existing database.

use crate::Result;
use rand::RngCore;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::{info, warn};

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    configure_connection(&pool).await?;
    create_schema(&pool).await?;
    init_default_settings(&pool).await?;

    Ok(pool)
}

/// Open an in-memory database with the full schema (test support)
pub async fn init_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;

    configure_connection(&pool).await?;
    create_schema(&pool).await?;
    init_default_settings(&pool).await?;

    Ok(pool)
}

async fn configure_connection(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON").execute(pool).await?;

    // WAL allows concurrent readers with one writer; feed reads and
    // view recording run on the same pool
    sqlx::query("PRAGMA journal_mode = WAL").execute(pool).await?;

    sqlx::query("PRAGMA busy_timeout = 5000").execute(pool).await?;

    Ok(())
}

/// Create all tables and indexes
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_settings_table(pool).await?;
    create_content_table(pool).await?;
    create_view_history_table(pool).await?;
    create_interest_events_table(pool).await?;
    Ok(())
}

/// Create the settings table
///
/// Stores service configuration key-value pairs.
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the content table
///
/// Candidate snapshots are owned by the ingestion subsystem; this core
/// only reads them. The table exists here so the candidate source and
/// tests have a concrete backing.
pub async fn create_content_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS content (
            id TEXT PRIMARY KEY,
            category TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            tags TEXT NOT NULL DEFAULT '[]',
            trend_score REAL NOT NULL DEFAULT 0.0,
            published_at TIMESTAMP NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            CHECK (trend_score >= 0.0 AND trend_score <= 1.0)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_content_category ON content(category)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_content_published ON content(published_at)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the view_history table
///
/// The partial unique index enforces at most one `seen` row per
/// `(visitor_key, content_id)` pair. Idempotent seen-recording relies on
/// this constraint plus INSERT OR IGNORE, not on application locking.
pub async fn create_view_history_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS view_history (
            id TEXT PRIMARY KEY,
            visitor_key TEXT NOT NULL,
            content_id TEXT NOT NULL,
            view_type TEXT NOT NULL CHECK (view_type IN ('seen', 'clicked', 'read')),
            occurred_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            dwell_seconds REAL,
            CHECK (dwell_seconds IS NULL OR dwell_seconds >= 0.0)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_view_history_seen_once
        ON view_history(visitor_key, content_id) WHERE view_type = 'seen'
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_view_history_visitor ON view_history(visitor_key, occurred_at)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_view_history_content ON view_history(content_id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the interest_events table (write-once, append-only)
pub async fn create_interest_events_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS interest_events (
            id TEXT PRIMARY KEY,
            visitor_key TEXT NOT NULL,
            content_id TEXT NOT NULL,
            interest_score INTEGER NOT NULL,
            hover_duration_ms INTEGER NOT NULL,
            movement_detected INTEGER NOT NULL DEFAULT 0,
            slowdown_count INTEGER NOT NULL DEFAULT 0,
            click_count INTEGER NOT NULL DEFAULT 0,
            was_afk INTEGER NOT NULL DEFAULT 0,
            trigger_kind TEXT NOT NULL CHECK (trigger_kind IN ('hover_end', 'viewport_exit')),
            occurred_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            CHECK (interest_score >= 0),
            CHECK (hover_duration_ms >= 0)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_interest_events_visitor ON interest_events(visitor_key, occurred_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Initialize or update default settings
///
/// Ensures all required settings exist with default values and resets
/// NULL values back to defaults.
async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    // Feed assembly settings
    ensure_setting(pool, "feed_page_size", "20").await?;
    ensure_setting(pool, "feed_max_page_size", "100").await?;
    ensure_setting(pool, "feed_diversity_interval", "3").await?;
    ensure_setting(pool, "feed_candidate_multiplier", "3").await?;
    ensure_setting(pool, "feed_request_timeout_ms", "10000").await?;

    // Profile building settings
    ensure_setting(pool, "profile_window_days", "30").await?;

    // Cursor signing secret: generated once per database, then stable
    ensure_cursor_secret(pool).await?;

    info!("Default settings initialized");
    Ok(())
}

/// Ensure a setting exists with the specified default value
///
/// If the setting doesn't exist, it will be created with the default.
/// If the setting exists but has a NULL value, it will be reset to the default.
pub async fn ensure_setting(pool: &SqlitePool, key: &str, default_value: &str) -> Result<()> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM settings WHERE key = ?)")
        .bind(key)
        .fetch_one(pool)
        .await?;

    if !exists {
        // INSERT OR IGNORE handles concurrent initialization races:
        // multiple tasks may pass the exists check simultaneously
        sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(default_value)
            .execute(pool)
            .await?;

        info!("Initialized setting '{}' with default value: {}", key, default_value);
        return Ok(());
    }

    let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_one(pool)
        .await?;

    if value.is_none() {
        sqlx::query("UPDATE settings SET value = ? WHERE key = ?")
            .bind(default_value)
            .bind(key)
            .execute(pool)
            .await?;

        warn!("Setting '{}' was NULL, reset to default: {}", key, default_value);
    }

    Ok(())
}

/// Read a setting value, if present and non-NULL
pub async fn get_setting(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    let value: Option<Option<String>> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await?;

    Ok(value.flatten())
}

/// Generate and persist the cursor signing secret on first run.
///
/// The secret never leaves the database; regenerating it only invalidates
/// in-flight cursors, which fail closed to page 1.
async fn ensure_cursor_secret(pool: &SqlitePool) -> Result<()> {
    let existing = get_setting(pool, "cursor_secret").await?;
    if existing.is_some() {
        return Ok(());
    }

    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    let secret: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();

    sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES ('cursor_secret', ?)")
        .bind(&secret)
        .execute(pool)
        .await?;

    info!("Generated cursor signing secret");
    Ok(())
}

use chrono::Utc;
use sqlx::{Row, SqlitePool};

use super::SqliteInitError;

/// Latest schema version known to this build.
pub const SCHEMA_VERSION: i64 = 2;

/// Version 1: word deck, wrong-answer log and per-word wrong stats.
const V1: &[&str] = &[
    r"
    CREATE TABLE IF NOT EXISTS decks (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        name TEXT NOT NULL,
        created_at TEXT NOT NULL
    );
    ",
    r"
    CREATE TABLE IF NOT EXISTS deck_words (
        position INTEGER PRIMARY KEY CHECK (position >= 0),
        word TEXT NOT NULL,
        meaning TEXT NOT NULL
    );
    ",
    r"
    CREATE TABLE IF NOT EXISTS wrong_log (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        word TEXT NOT NULL,
        meaning TEXT NOT NULL,
        recorded_at TEXT NOT NULL
    );
    ",
    r"
    CREATE TABLE IF NOT EXISTS wrong_stats (
        word TEXT PRIMARY KEY,
        wrong_count INTEGER NOT NULL CHECK (wrong_count >= 0),
        last_wrong_at TEXT NOT NULL
    );
    ",
];

/// Version 2: session checkpoint and the two asset caches.
const V2: &[&str] = &[
    r"
    CREATE TABLE IF NOT EXISTS session_checkpoint (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        deck_name TEXT NOT NULL,
        saved_at TEXT NOT NULL
    );
    ",
    r"
    CREATE TABLE IF NOT EXISTS audio_cache (
        key TEXT PRIMARY KEY,
        payload BLOB NOT NULL,
        stored_at TEXT NOT NULL
    );
    ",
    r"
    CREATE INDEX IF NOT EXISTS idx_audio_cache_stored_at
        ON audio_cache (stored_at);
    ",
    r"
    CREATE TABLE IF NOT EXISTS image_cache (
        key TEXT PRIMARY KEY,
        payload BLOB NOT NULL,
        stored_at TEXT NOT NULL
    );
    ",
];

const MIGRATIONS: &[(i64, &[&str])] = &[(1, V1), (2, V2)];

async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
    let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
        .bind(version)
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}

/// Applies every migration up to `target` that has not run yet.
///
/// Each version runs in its own transaction and only creates objects that
/// are missing, so re-running is harmless and existing rows are never touched.
pub async fn run_migrations(pool: &SqlitePool, target: i64) -> Result<(), SqliteInitError> {
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        );
        ",
    )
    .execute(pool)
    .await?;

    for (version, statements) in MIGRATIONS {
        if *version > target || is_applied(pool, *version).await? {
            continue;
        }

        let mut tx = pool.begin().await?;
        for statement in *statements {
            sqlx::query(*statement).execute(&mut *tx).await?;
        }
        sqlx::query(
            r"
            INSERT INTO schema_migrations (version, applied_at)
            VALUES (?1, ?2)
            ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(*version)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::debug!(version = *version, "applied schema migration");
    }

    Ok(())
}

pub async fn current_version(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    let row = sqlx::query("SELECT COALESCE(MAX(version), 0) AS version FROM schema_migrations")
        .fetch_one(pool)
        .await?;
    row.try_get("version")
}

use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Runs versioned migrations for the session schema.
///
/// Version 1 creates the activity catalog, groups, sessions and session
/// activities.
///
/// `session_activities.session_id` is a plain foreign key with no
/// `ON DELETE CASCADE`. Deleting a session that still has activities fails
/// with a constraint violation, so callers remove the activities first
/// (`SessionLifecycleService` does this for single deletes and the purge).
/// `sessions.group_id` uses `ON DELETE SET NULL`.
#[allow(clippy::too_many_lines)]
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

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

    if is_applied(pool, 1).await? {
        return Ok(());
    }

    let mut tx = pool.begin().await?;

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS study_activities (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                description TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL
            );
        ",
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS groups (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                description TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL
            );
        ",
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                activity_id INTEGER NOT NULL CHECK (activity_id > 0),
                group_id INTEGER,
                start_time TEXT NOT NULL,
                end_time TEXT,
                score INTEGER NOT NULL DEFAULT 0 CHECK (score >= 0),
                created_at TEXT NOT NULL,
                FOREIGN KEY (activity_id) REFERENCES study_activities(id),
                FOREIGN KEY (group_id) REFERENCES groups(id) ON DELETE SET NULL
            );
        ",
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS session_activities (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id INTEGER NOT NULL,
                activity_id INTEGER NOT NULL,
                challenge TEXT NOT NULL CHECK (length(trim(challenge)) > 0),
                answer TEXT NOT NULL CHECK (length(trim(answer)) > 0),
                input TEXT NOT NULL DEFAULT '',
                result TEXT CHECK (result IS NULL OR result IN ('success', 'failure')),
                score INTEGER NOT NULL DEFAULT 0 CHECK (score BETWEEN 0 AND 100),
                created_at TEXT NOT NULL,
                -- no cascade: activities must be deleted before their session
                FOREIGN KEY (session_id) REFERENCES sessions(id),
                FOREIGN KEY (activity_id) REFERENCES study_activities(id)
            );
        ",
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r"
            CREATE INDEX IF NOT EXISTS idx_sessions_created
                ON sessions (created_at, id);
        ",
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r"
            CREATE INDEX IF NOT EXISTS idx_session_activities_session_created
                ON session_activities (session_id, created_at, id);
        ",
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r"
            INSERT INTO schema_migrations (version, applied_at)
            VALUES (?1, ?2)
            ON CONFLICT(version) DO NOTHING
        ",
    )
    .bind(1_i64)
    .bind(Utc::now())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    tracing::info!(version = 1, "applied schema migration");

    Ok(())
}

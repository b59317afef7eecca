use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::types::Json;

use rolegate_application::{ModerationLogEntry, ModerationLogRepository};
use rolegate_core::{AppError, AppResult};

/// PostgreSQL-backed append-only moderation log.
#[derive(Clone)]
pub struct PostgresModerationLogRepository {
    pool: PgPool,
}

impl PostgresModerationLogRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ModerationLogRepository for PostgresModerationLogRepository {
    async fn append_entry(&self, entry: ModerationLogEntry) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO moderation_log_entries (actor_id, action, details, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(entry.actor_id.as_uuid())
        .bind(entry.action.as_str())
        .bind(Json(&entry.details))
        .bind(entry.created_at)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to append moderation log entry '{}': {error}",
                entry.action.as_str()
            ))
        })?;

        Ok(())
    }
}

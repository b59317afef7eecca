use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rolegate_core::AppResult;
use rolegate_domain::{ModerationAction, UserId};
use serde_json::Value;

/// Moderation log record written for privileged role changes.
#[derive(Debug, Clone, PartialEq)]
pub struct ModerationLogEntry {
    /// Acting user.
    pub actor_id: UserId,
    /// Stable action identifier.
    pub action: ModerationAction,
    /// Structured action details.
    pub details: Value,
    /// Entry timestamp.
    pub created_at: DateTime<Utc>,
}

/// Port for appending moderation log entries.
#[async_trait]
pub trait ModerationLogRepository: Send + Sync {
    /// Appends one entry.
    async fn append_entry(&self, entry: ModerationLogEntry) -> AppResult<()>;
}

use async_trait::async_trait;
use rolegate_core::AppResult;
use rolegate_domain::{RoleId, UserId};
use serde::{Deserialize, Serialize};

/// User notification emitted by role administration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RoleNotification {
    /// The user received a public role.
    #[serde(rename_all = "camelCase")]
    RoleAssigned {
        /// Assigned role.
        role_id: RoleId,
    },
}

impl RoleNotification {
    /// Returns the stable notification kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RoleAssigned { .. } => "roleAssigned",
        }
    }
}

/// Port for enqueueing user notifications.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Enqueues one notification for a user.
    async fn notify(&self, user_id: UserId, notification: RoleNotification) -> AppResult<()>;
}

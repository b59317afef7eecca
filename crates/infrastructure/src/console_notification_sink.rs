//! Console notification sink for development. Logs notifications to tracing output.

use async_trait::async_trait;
use rolegate_application::{NotificationSink, RoleNotification};
use rolegate_core::AppResult;
use rolegate_domain::UserId;
use tracing::info;

/// Development notification sink that logs notifications to the console.
#[derive(Clone)]
pub struct ConsoleNotificationSink;

impl ConsoleNotificationSink {
    /// Creates a new console notification sink.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for ConsoleNotificationSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationSink for ConsoleNotificationSink {
    async fn notify(&self, user_id: UserId, notification: RoleNotification) -> AppResult<()> {
        match notification {
            RoleNotification::RoleAssigned { role_id } => {
                info!(
                    user_id = %user_id,
                    role_id = %role_id,
                    kind = notification.kind(),
                    "user notification (console)"
                );
            }
        }

        Ok(())
    }
}

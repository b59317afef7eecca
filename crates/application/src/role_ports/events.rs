use async_trait::async_trait;
use rolegate_core::AppResult;
use rolegate_domain::{Role, RoleAssignment};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Cache invalidation message broadcast between processes.
///
/// Every variant carries the full record so receivers can apply it by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "body", rename_all = "camelCase")]
pub enum RoleEvent {
    /// A role definition was created.
    RoleCreated(Role),
    /// A role definition was replaced.
    RoleUpdated(Role),
    /// A role definition was removed.
    RoleDeleted(Role),
    /// A manual assignment was created.
    UserRoleAssigned(RoleAssignment),
    /// A manual assignment was removed.
    UserRoleUnassigned(RoleAssignment),
}

impl RoleEvent {
    /// Returns the stable wire name of this event.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RoleCreated(_) => "roleCreated",
            Self::RoleUpdated(_) => "roleUpdated",
            Self::RoleDeleted(_) => "roleDeleted",
            Self::UserRoleAssigned(_) => "userRoleAssigned",
            Self::UserRoleUnassigned(_) => "userRoleUnassigned",
        }
    }
}

/// Stream of events delivered to one subscriber.
#[derive(Debug)]
pub struct RoleEventSubscription {
    receiver: mpsc::UnboundedReceiver<RoleEvent>,
}

impl RoleEventSubscription {
    /// Wraps the receiving half of a channel fed by a bus adapter.
    #[must_use]
    pub fn new(receiver: mpsc::UnboundedReceiver<RoleEvent>) -> Self {
        Self { receiver }
    }

    /// Waits for the next event. Returns `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<RoleEvent> {
        self.receiver.recv().await
    }
}

/// Broadcast port used to keep role caches of all processes in step.
#[async_trait]
pub trait RoleEventBus: Send + Sync {
    /// Publishes one event to every subscriber, including this process.
    async fn publish(&self, event: &RoleEvent) -> AppResult<()>;

    /// Opens a new subscription.
    async fn subscribe(&self) -> AppResult<RoleEventSubscription>;
}

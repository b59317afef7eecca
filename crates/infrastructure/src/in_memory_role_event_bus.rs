use async_trait::async_trait;
use rolegate_application::{RoleEvent, RoleEventBus, RoleEventSubscription};
use rolegate_core::AppResult;
use tokio::sync::{Mutex, mpsc};
use tracing::debug;

/// In-process event bus for single-process deployments and tests.
///
/// Every subscriber receives every published event. Closed subscriptions
/// are dropped on the next publish.
#[derive(Debug, Default)]
pub struct InMemoryRoleEventBus {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<RoleEvent>>>,
}

impl InMemoryRoleEventBus {
    /// Creates a bus without subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl RoleEventBus for InMemoryRoleEventBus {
    async fn publish(&self, event: &RoleEvent) -> AppResult<()> {
        let mut subscribers = self.subscribers.lock().await;
        subscribers.retain(|sender| sender.send(event.clone()).is_ok());
        debug!(
            event = event.as_str(),
            subscribers = subscribers.len(),
            "published role event"
        );

        Ok(())
    }

    async fn subscribe(&self) -> AppResult<RoleEventSubscription> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.subscribers.lock().await.push(sender);

        Ok(RoleEventSubscription::new(receiver))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rolegate_application::{RoleEvent, RoleEventBus};
    use rolegate_domain::{RoleAssignment, RoleAssignmentId, RoleId, UserId};

    use super::InMemoryRoleEventBus;

    fn assigned() -> RoleEvent {
        RoleEvent::UserRoleAssigned(RoleAssignment {
            id: RoleAssignmentId::new(),
            role_id: RoleId::new(),
            user_id: UserId::new(),
            expires_at: None,
            created_at: Utc::now(),
        })
    }

    #[tokio::test]
    async fn every_subscriber_receives_published_events() {
        let bus = InMemoryRoleEventBus::new();
        let Ok(mut first) = bus.subscribe().await else {
            panic!("subscription should open");
        };
        let Ok(mut second) = bus.subscribe().await else {
            panic!("subscription should open");
        };

        let event = assigned();
        assert!(bus.publish(&event).await.is_ok());

        assert_eq!(first.recv().await, Some(event.clone()));
        assert_eq!(second.recv().await, Some(event));
    }

    #[tokio::test]
    async fn dropped_subscribers_do_not_fail_publish() {
        let bus = InMemoryRoleEventBus::new();
        let Ok(subscription) = bus.subscribe().await else {
            panic!("subscription should open");
        };
        drop(subscription);

        assert!(bus.publish(&assigned()).await.is_ok());
        assert!(bus.subscribers.lock().await.is_empty());
    }
}

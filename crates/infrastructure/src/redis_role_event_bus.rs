//! Redis pub/sub-backed role event bus.
//!
//! Pub/sub is not durable: a process that is disconnected while an event is
//! published misses it and relies on its cache TTL to converge.

use async_trait::async_trait;
use futures::StreamExt;
use redis::AsyncCommands;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use rolegate_application::{RoleEvent, RoleEventBus, RoleEventSubscription};
use rolegate_core::{AppError, AppResult};

/// Default pub/sub channel for role events.
pub const DEFAULT_ROLE_EVENT_CHANNEL: &str = "rolegate:role-events";

/// Role event bus broadcasting JSON payloads over one Redis channel.
#[derive(Clone)]
pub struct RedisRoleEventBus {
    client: redis::Client,
    channel: String,
}

impl RedisRoleEventBus {
    /// Creates a bus from a Redis client and channel name.
    #[must_use]
    pub fn new(client: redis::Client, channel: impl Into<String>) -> Self {
        Self {
            client,
            channel: channel.into(),
        }
    }

    /// Returns the channel name.
    #[must_use]
    pub fn channel(&self) -> &str {
        self.channel.as_str()
    }
}

fn encode_event(event: &RoleEvent) -> AppResult<String> {
    serde_json::to_string(event).map_err(|error| {
        AppError::Internal(format!(
            "failed to serialize role event '{}': {error}",
            event.as_str()
        ))
    })
}

fn decode_event(payload: &str) -> Result<RoleEvent, serde_json::Error> {
    serde_json::from_str(payload)
}

#[async_trait]
impl RoleEventBus for RedisRoleEventBus {
    async fn publish(&self, event: &RoleEvent) -> AppResult<()> {
        let payload = encode_event(event)?;
        let mut connection = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to connect to redis: {error}"))
            })?;

        let receivers: i64 = connection
            .publish(self.channel.as_str(), payload)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to publish role event '{}' to redis channel '{}': {error}",
                    event.as_str(),
                    self.channel
                ))
            })?;
        debug!(event = event.as_str(), receivers, "published role event");

        Ok(())
    }

    async fn subscribe(&self) -> AppResult<RoleEventSubscription> {
        let mut pubsub = self.client.get_async_pubsub().await.map_err(|error| {
            AppError::Internal(format!("failed to open redis pub/sub connection: {error}"))
        })?;
        pubsub
            .subscribe(self.channel.as_str())
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to subscribe to redis channel '{}': {error}",
                    self.channel
                ))
            })?;

        let (sender, receiver) = mpsc::unbounded_channel();
        let channel = self.channel.clone();
        tokio::spawn(async move {
            let mut messages = pubsub.into_on_message();
            while let Some(message) = messages.next().await {
                let payload = match message.get_payload::<String>() {
                    Ok(payload) => payload,
                    Err(error) => {
                        warn!(
                            channel = %channel,
                            error = %error,
                            "skipped unreadable role event"
                        );
                        continue;
                    }
                };

                let event = match decode_event(payload.as_str()) {
                    Ok(event) => event,
                    Err(error) => {
                        warn!(
                            channel = %channel,
                            error = %error,
                            "skipped undecodable role event"
                        );
                        continue;
                    }
                };

                if sender.send(event).is_err() {
                    break;
                }
            }
            debug!(channel = %channel, "role event subscription closed");
        });

        Ok(RoleEventSubscription::new(receiver))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;
    use rolegate_application::{RoleEvent, RoleEventBus};
    use rolegate_domain::{RoleAssignment, RoleAssignmentId, RoleId, UserId};
    use uuid::Uuid;

    use super::{RedisRoleEventBus, decode_event, encode_event};

    fn unassigned() -> RoleEvent {
        RoleEvent::UserRoleUnassigned(RoleAssignment {
            id: RoleAssignmentId::new(),
            role_id: RoleId::new(),
            user_id: UserId::new(),
            expires_at: Some(Utc::now()),
            created_at: Utc::now(),
        })
    }

    #[test]
    fn payload_carries_type_and_body() {
        let event = unassigned();
        let Ok(payload) = encode_event(&event) else {
            panic!("event should serialize");
        };
        let value: serde_json::Value = serde_json::from_str(&payload).unwrap_or_default();

        assert_eq!(value["type"], "userRoleUnassigned");
        assert!(value["body"]["roleId"].is_string());
        assert_eq!(decode_event(&payload).ok(), Some(event));
    }

    #[test]
    fn foreign_payloads_are_rejected() {
        assert!(decode_event("not json").is_err());
        assert!(decode_event(r#"{"type":"noteCreated","body":{}}"#).is_err());
    }

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let Ok(redis_url) = std::env::var("REDIS_URL") else {
            return;
        };
        let Ok(client) = redis::Client::open(redis_url) else {
            panic!("REDIS_URL should be a valid redis url");
        };

        let bus = RedisRoleEventBus::new(client, format!("rolegate:test:{}", Uuid::new_v4()));
        let Ok(mut subscription) = bus.subscribe().await else {
            panic!("subscription should open");
        };

        let event = unassigned();
        assert!(bus.publish(&event).await.is_ok());

        let received = tokio::time::timeout(Duration::from_secs(5), subscription.recv()).await;
        assert_eq!(received.ok().flatten(), Some(event));
    }
}

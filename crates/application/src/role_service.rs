use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rolegate_core::{AppError, AppResult, NonEmptyString};
use rolegate_domain::{
    Actor, ModerationAction, Role, RoleAssignment, RoleAssignmentId, RoleCondition, RoleId,
    RolePolicies, RolePolicyOverrides, RoleTarget, UserId,
};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::condition_evaluator::ConditionEvaluator;
use crate::role_cache::{RoleCache, RoleCacheConfig};
use crate::role_ports::{
    InstancePolicyProvider, ModerationLogEntry, ModerationLogRepository, NotificationSink,
    RoleEvent, RoleEventBus, RoleNotification, RoleRepository, StaticInstancePolicyProvider,
    UserStatsProvider,
};

mod assignments;
mod definitions;
mod policies;
mod privileges;
mod resolution;
mod sync;

pub use definitions::{CreateRoleInput, UpdateRoleInput};
pub use sync::RoleCacheSyncHandle;

/// Role resolution, policy aggregation and role administration.
#[derive(Clone)]
pub struct RoleService {
    repository: Arc<dyn RoleRepository>,
    user_stats: Arc<dyn UserStatsProvider>,
    event_bus: Arc<dyn RoleEventBus>,
    instance_policies: Arc<dyn InstancePolicyProvider>,
    notification_sink: Option<Arc<dyn NotificationSink>>,
    moderation_log: Option<Arc<dyn ModerationLogRepository>>,
    cache: Arc<RoleCache>,
    evaluator: ConditionEvaluator,
}

impl RoleService {
    /// Creates a role service with default cache lifetimes and no instance
    /// policy overrides.
    #[must_use]
    pub fn new(
        repository: Arc<dyn RoleRepository>,
        user_stats: Arc<dyn UserStatsProvider>,
        event_bus: Arc<dyn RoleEventBus>,
    ) -> Self {
        Self {
            cache: Arc::new(RoleCache::new(
                repository.clone(),
                RoleCacheConfig::default(),
            )),
            evaluator: ConditionEvaluator::new(user_stats.clone()),
            repository,
            user_stats,
            event_bus,
            instance_policies: Arc::new(StaticInstancePolicyProvider::default()),
            notification_sink: None,
            moderation_log: None,
        }
    }

    /// Replaces the cache with one using `config`.
    #[must_use]
    pub fn with_cache_config(mut self, config: RoleCacheConfig) -> Self {
        self.cache = Arc::new(RoleCache::new(self.repository.clone(), config));
        self
    }

    /// Adds the source of instance-wide policy overrides.
    #[must_use]
    pub fn with_instance_policies(
        mut self,
        instance_policies: Arc<dyn InstancePolicyProvider>,
    ) -> Self {
        self.instance_policies = instance_policies;
        self
    }

    /// Adds user notifications for public role assignments.
    #[must_use]
    pub fn with_notification_sink(mut self, notification_sink: Arc<dyn NotificationSink>) -> Self {
        self.notification_sink = Some(notification_sink);
        self
    }

    /// Adds moderation logging for actor-driven changes.
    #[must_use]
    pub fn with_moderation_log(mut self, moderation_log: Arc<dyn ModerationLogRepository>) -> Self {
        self.moderation_log = Some(moderation_log);
        self
    }

    /// Applies an event locally and broadcasts it to other processes.
    async fn emit(&self, event: RoleEvent) -> AppResult<()> {
        self.cache.apply(&event).await;
        self.event_bus.publish(&event).await
    }

    async fn touch_last_used(&self, role_id: RoleId, used_at: DateTime<Utc>) {
        if let Err(error) = self.repository.touch_role_last_used(role_id, used_at).await {
            warn!(
                role_id = %role_id,
                error = %error,
                "failed to update role last use"
            );
        }
    }

    async fn notify(&self, user_id: UserId, notification: RoleNotification) {
        let Some(notification_sink) = &self.notification_sink else {
            return;
        };

        if let Err(error) = notification_sink.notify(user_id, notification).await {
            warn!(
                user_id = %user_id,
                kind = notification.kind(),
                error = %error,
                "failed to enqueue role notification"
            );
        }
    }

    async fn log_moderation(
        &self,
        actor: Option<&Actor>,
        action: ModerationAction,
        details: Value,
    ) {
        let (Some(actor), Some(moderation_log)) = (actor, &self.moderation_log) else {
            return;
        };

        let entry = ModerationLogEntry {
            actor_id: actor.user_id,
            action,
            details,
            created_at: Utc::now(),
        };

        if let Err(error) = moderation_log.append_entry(entry).await {
            warn!(
                actor_id = %actor.user_id,
                action = action.as_str(),
                error = %error,
                "failed to write moderation log entry"
            );
        }
    }
}

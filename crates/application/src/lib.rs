//! Application services and ports.

#![forbid(unsafe_code)]

mod condition_evaluator;
mod role_cache;
mod role_ports;
mod role_service;

pub use condition_evaluator::ConditionEvaluator;
pub use role_cache::{RoleCache, RoleCacheConfig};
pub use role_ports::{
    InstancePolicyProvider, ModerationLogEntry, ModerationLogRepository, NotificationSink,
    RoleEvent, RoleEventBus, RoleEventSubscription, RoleNotification, RoleRepository,
    StaticInstancePolicyProvider, UserStatsProvider,
};
pub use role_service::{CreateRoleInput, RoleCacheSyncHandle, RoleService, UpdateRoleInput};

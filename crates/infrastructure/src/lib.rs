//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod console_notification_sink;
mod in_memory_role_event_bus;
mod in_memory_role_repository;
mod postgres_instance_policy_provider;
mod postgres_moderation_log_repository;
mod postgres_role_repository;
mod postgres_user_stats_provider;
mod redis_role_event_bus;

pub use console_notification_sink::ConsoleNotificationSink;
pub use in_memory_role_event_bus::InMemoryRoleEventBus;
pub use in_memory_role_repository::InMemoryRoleRepository;
pub use postgres_instance_policy_provider::PostgresInstancePolicyProvider;
pub use postgres_moderation_log_repository::PostgresModerationLogRepository;
pub use postgres_role_repository::PostgresRoleRepository;
pub use postgres_user_stats_provider::PostgresUserStatsProvider;
pub use redis_role_event_bus::{DEFAULT_ROLE_EVENT_CHANNEL, RedisRoleEventBus};

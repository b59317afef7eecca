mod events;
mod instance;
mod moderation;
mod notifications;
mod repository;
mod statistics;

pub use events::{RoleEvent, RoleEventBus, RoleEventSubscription};
pub use instance::{InstancePolicyProvider, StaticInstancePolicyProvider};
pub use moderation::{ModerationLogEntry, ModerationLogRepository};
pub use notifications::{NotificationSink, RoleNotification};
pub use repository::RoleRepository;
pub use statistics::UserStatsProvider;

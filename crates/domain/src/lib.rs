//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod condition;
mod moderation;
mod policy;
mod role;
mod user;

pub use condition::{
    AgeBound, AgeSubject, Comparison, MAX_CONDITION_DEPTH, RoleCondition, UserFlag, UserMetric,
};
pub use moderation::ModerationAction;
pub use policy::{
    InstancePolicyOverrides, PolicyCombinator, PolicyKind, PolicyName, PolicyOverride,
    PolicyPriority, PolicyValue, RolePolicies, RolePolicyOverrides,
};
pub use role::{Role, RoleAssignment, RoleAssignmentId, RoleId, RoleTarget};
pub use user::{Actor, UserId, UserProfileSnapshot, UserSnapshot};

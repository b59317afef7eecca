use chrono::{DateTime, Utc};
use rolegate_core::NonEmptyString;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{RoleCondition, RolePolicyOverrides, UserId};

/// Unique identifier for a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoleId(Uuid);

impl RoleId {
    /// Creates a new random role identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a role identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RoleId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RoleId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Unique identifier for a role assignment row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoleAssignmentId(Uuid);

impl RoleAssignmentId {
    /// Creates a new random assignment identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an assignment identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RoleAssignmentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RoleAssignmentId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// How members of a role are determined.
///
/// A conditional role always carries its formula and a manual role never
/// does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "condition", rename_all = "snake_case")]
pub enum RoleTarget {
    /// Members are explicit assignments.
    Manual,
    /// Members are users matching the formula.
    Conditional(RoleCondition),
}

impl RoleTarget {
    /// Returns stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Conditional(_) => "conditional",
        }
    }

    /// Returns the formula of a conditional role.
    #[must_use]
    pub fn condition(&self) -> Option<&RoleCondition> {
        match self {
            Self::Manual => None,
            Self::Conditional(condition) => Some(condition),
        }
    }
}

/// Immutable snapshot of one role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    /// Stable role identifier.
    pub id: RoleId,
    /// Display name.
    pub name: NonEmptyString,
    /// Free-form description.
    pub description: String,
    /// Optional display color.
    pub color: Option<String>,
    /// Optional icon URL.
    pub icon_url: Option<String>,
    /// Membership rule.
    pub target: RoleTarget,
    /// Whether members are notified and the role is shown publicly.
    pub is_public: bool,
    /// Grants moderator privileges.
    pub is_moderator: bool,
    /// Grants administrator privileges.
    pub is_administrator: bool,
    /// Whether the role can be browsed.
    pub is_explorable: bool,
    /// Whether the role is shown as a badge.
    pub as_badge: bool,
    /// Whether moderators may edit members.
    pub can_edit_members_by_moderator: bool,
    /// Sort key for display, larger first.
    pub display_order: i32,
    /// Per-policy overrides.
    pub policies: RolePolicyOverrides,
    /// Last definition change.
    pub updated_at: DateTime<Utc>,
    /// Last assignment change.
    pub last_used_at: DateTime<Utc>,
}

impl Role {
    /// Returns whether membership is computed from a formula.
    #[must_use]
    pub fn is_conditional(&self) -> bool {
        matches!(self.target, RoleTarget::Conditional(_))
    }

    /// Returns whether the role grants moderator or administrator privileges.
    #[must_use]
    pub fn grants_moderation(&self) -> bool {
        self.is_moderator || self.is_administrator
    }
}

/// Manual membership of a user in a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleAssignment {
    /// Stable assignment identifier.
    pub id: RoleAssignmentId,
    /// Assigned role.
    pub role_id: RoleId,
    /// Assigned user.
    pub user_id: UserId,
    /// Optional expiry, `None` never expires.
    pub expires_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl RoleAssignment {
    /// Returns whether the assignment has expired at `now`.
    ///
    /// An assignment whose expiry equals `now` is expired.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    /// Returns whether the assignment is in effect at `now`.
    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_expired_at(now)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::{RoleAssignment, RoleAssignmentId, RoleId, RoleTarget};
    use crate::{RoleCondition, UserFlag, UserId};

    fn assignment(expires_in: Option<Duration>) -> RoleAssignment {
        let now = Utc::now();
        RoleAssignment {
            id: RoleAssignmentId::new(),
            role_id: RoleId::new(),
            user_id: UserId::new(),
            expires_at: expires_in.map(|offset| now + offset),
            created_at: now,
        }
    }

    #[test]
    fn assignment_without_expiry_stays_active() {
        let value = assignment(None);
        assert!(value.is_active_at(Utc::now() + Duration::days(3650)));
    }

    #[test]
    fn assignment_expires_at_its_deadline() {
        let value = assignment(Some(Duration::minutes(5)));
        let Some(expires_at) = value.expires_at else {
            panic!("expiry must be set");
        };

        assert!(value.is_active_at(expires_at - Duration::seconds(1)));
        assert!(value.is_expired_at(expires_at));
        assert!(value.is_expired_at(expires_at + Duration::seconds(1)));
    }

    #[test]
    fn target_serializes_with_condition() {
        let target = RoleTarget::Conditional(RoleCondition::Flag(UserFlag::IsBot));
        let value = serde_json::to_value(&target).unwrap_or_default();

        assert_eq!(
            value,
            serde_json::json!({ "kind": "conditional", "condition": { "type": "isBot" } })
        );
        assert_eq!(target.as_str(), "conditional");
    }
}

//! Conditional role formulas.
//!
//! A formula is an owned tree: combinators own their children and leaves carry
//! no references back up, so a formula can never contain a cycle. Editing a
//! formula replaces the whole tree. Depth is bounded when a tree is built from
//! its wire form.

use rolegate_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

use crate::RoleId;

/// Maximum nesting accepted for a formula tree.
pub const MAX_CONDITION_DEPTH: usize = 64;

/// Boolean user attributes a formula can test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserFlag {
    /// User has no remote host.
    IsLocal,
    /// User has a remote host.
    IsRemote,
    /// Account is a bot.
    IsBot,
    /// Account is suspended.
    IsSuspended,
    /// Account is flagged as a cat.
    IsCat,
    /// At least one security key is registered and 2FA is on.
    HasSecurityKey,
    /// Two-factor authentication is on.
    HasTwoFactorAuth,
    /// Email address is verified.
    HasEmailVerified,
    /// Passwordless login is on.
    HasPasswordLessLogin,
    /// Today is the user's birthday.
    Birthday,
}

impl UserFlag {
    /// Returns whether the flag needs a profile lookup.
    #[must_use]
    pub fn requires_profile(self) -> bool {
        matches!(
            self,
            Self::HasSecurityKey
                | Self::HasTwoFactorAuth
                | Self::HasEmailVerified
                | Self::HasPasswordLessLogin
                | Self::Birthday
        )
    }
}

/// Timestamps that age predicates measure from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgeSubject {
    /// Account creation.
    AccountCreated,
    /// Last profile update.
    ProfileUpdated,
}

/// Direction of an age predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgeBound {
    /// The timestamp is more recent than `now - seconds`.
    LessThan,
    /// The timestamp is older than `now - seconds`.
    MoreThan,
}

/// Aggregated user statistics a threshold predicate can compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserMetric {
    /// Total bytes stored in the user's drive.
    DriveUsage,
    /// Distinct calendar dates with a login.
    LoginDays,
    /// Followers.
    Followers,
    /// Followed accounts.
    Following,
    /// Notes posted.
    Notes,
    /// Reactions given.
    ReactionsSent,
    /// Reactions received on own notes.
    ReactionsReceived,
    /// Renotes made.
    RenotesSent,
    /// Renotes of own notes.
    RenotesReceived,
    /// Replies made.
    RepliesSent,
    /// Replies to own notes.
    RepliesReceived,
    /// Poll votes cast.
    VotesSent,
    /// Votes on own polls.
    VotesReceived,
}

/// Inclusive comparison used by threshold predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparison {
    /// `actual <= threshold`.
    LessThanOrEq,
    /// `actual >= threshold`.
    MoreThanOrEq,
}

impl Comparison {
    /// Applies the comparison.
    #[must_use]
    pub fn holds(self, actual: u64, threshold: u64) -> bool {
        match self {
            Self::LessThanOrEq => actual <= threshold,
            Self::MoreThanOrEq => actual >= threshold,
        }
    }
}

/// Validated formula tree of a conditional role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ConditionNode", into = "ConditionNode")]
pub enum RoleCondition {
    /// All children hold. An empty list holds.
    And(Vec<RoleCondition>),
    /// At least one child holds. An empty list does not hold.
    Or(Vec<RoleCondition>),
    /// The child does not hold.
    Not(Box<RoleCondition>),
    /// The user is manually assigned to the role.
    RoleAssignedTo(RoleId),
    /// A boolean user attribute.
    Flag(UserFlag),
    /// Age of a user timestamp against a number of seconds.
    Age {
        /// Timestamp measured.
        subject: AgeSubject,
        /// Direction of the comparison.
        bound: AgeBound,
        /// Threshold in seconds.
        seconds: u64,
    },
    /// Aggregated statistic against an inclusive threshold.
    Threshold {
        /// Statistic compared.
        metric: UserMetric,
        /// Comparison direction.
        comparison: Comparison,
        /// Threshold value.
        value: u64,
    },
}

impl RoleCondition {
    /// Builds an `and` node.
    pub fn and(values: Vec<RoleCondition>) -> AppResult<Self> {
        Self::And(values).validated()
    }

    /// Builds an `or` node.
    pub fn or(values: Vec<RoleCondition>) -> AppResult<Self> {
        Self::Or(values).validated()
    }

    /// Builds a `not` node.
    pub fn not(value: RoleCondition) -> AppResult<Self> {
        Self::Not(Box::new(value)).validated()
    }

    /// Builds a threshold leaf.
    #[must_use]
    pub fn threshold(metric: UserMetric, comparison: Comparison, value: u64) -> Self {
        Self::Threshold {
            metric,
            comparison,
            value,
        }
    }

    /// Builds an age leaf.
    #[must_use]
    pub fn age(subject: AgeSubject, bound: AgeBound, seconds: u64) -> Self {
        Self::Age {
            subject,
            bound,
            seconds,
        }
    }

    /// Returns the nesting depth, a leaf has depth 1.
    #[must_use]
    pub fn depth(&self) -> usize {
        match self {
            Self::And(values) | Self::Or(values) => {
                1 + values.iter().map(Self::depth).max().unwrap_or(0)
            }
            Self::Not(value) => 1 + value.depth(),
            _ => 1,
        }
    }

    /// Returns the stable wire name of this node kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        ConditionNode::from(self.clone()).kind()
    }

    fn validated(self) -> AppResult<Self> {
        let depth = self.depth();
        if depth > MAX_CONDITION_DEPTH {
            return Err(AppError::Validation(format!(
                "role condition depth {depth} exceeds the maximum of {MAX_CONDITION_DEPTH}"
            )));
        }

        Ok(self)
    }
}

/// Wire form of a formula node, one tag per node kind.
///
/// Every node may carry an `id` used by editors; it is accepted and dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum ConditionNode {
    And { values: Vec<RoleCondition> },
    Or { values: Vec<RoleCondition> },
    Not { value: Box<RoleCondition> },
    #[serde(rename_all = "camelCase")]
    RoleAssignedTo { role_id: RoleId },
    IsLocal {},
    IsRemote {},
    IsBot {},
    IsSuspended {},
    IsCat {},
    HasSecurityKey {},
    HasTwoFactorAuth {},
    HasEmailVerified {},
    HasPasswordLessLogin {},
    Birthday {},
    CreatedLessThan { sec: u64 },
    CreatedMoreThan { sec: u64 },
    UserInfoUpdatedLessThan { sec: u64 },
    UserInfoUpdatedMoreThan { sec: u64 },
    LoginDaysLessThanOrEq { day: u64 },
    LoginDaysMoreThanOrEq { day: u64 },
    #[serde(rename_all = "camelCase")]
    DriveUsageLessThanOrEq { usage_size: u64 },
    #[serde(rename_all = "camelCase")]
    DriveUsageMoreThanOrEq { usage_size: u64 },
    FollowersLessThanOrEq { count: u64 },
    FollowersMoreThanOrEq { count: u64 },
    FollowingLessThanOrEq { count: u64 },
    FollowingMoreThanOrEq { count: u64 },
    NotesLessThanOrEq { count: u64 },
    NotesMoreThanOrEq { count: u64 },
    ReactionsLessThanOrEq { count: u64 },
    ReactionsMoreThanOrEq { count: u64 },
    ReactionsReceivedLessThanOrEq { count: u64 },
    ReactionsReceivedMoreThanOrEq { count: u64 },
    RenotesLessThanOrEq { count: u64 },
    RenotesMoreThanOrEq { count: u64 },
    RenotesReceivedLessThanOrEq { count: u64 },
    RenotesReceivedMoreThanOrEq { count: u64 },
    RepliesLessThanOrEq { count: u64 },
    RepliesMoreThanOrEq { count: u64 },
    RepliesReceivedLessThanOrEq { count: u64 },
    RepliesReceivedMoreThanOrEq { count: u64 },
    VotesLessThanOrEq { count: u64 },
    VotesMoreThanOrEq { count: u64 },
    VotesReceivedLessThanOrEq { count: u64 },
    VotesReceivedMoreThanOrEq { count: u64 },
}

impl ConditionNode {
    fn kind(&self) -> &'static str {
        match self {
            Self::And { .. } => "and",
            Self::Or { .. } => "or",
            Self::Not { .. } => "not",
            Self::RoleAssignedTo { .. } => "roleAssignedTo",
            Self::IsLocal {} => "isLocal",
            Self::IsRemote {} => "isRemote",
            Self::IsBot {} => "isBot",
            Self::IsSuspended {} => "isSuspended",
            Self::IsCat {} => "isCat",
            Self::HasSecurityKey {} => "hasSecurityKey",
            Self::HasTwoFactorAuth {} => "hasTwoFactorAuth",
            Self::HasEmailVerified {} => "hasEmailVerified",
            Self::HasPasswordLessLogin {} => "hasPasswordLessLogin",
            Self::Birthday {} => "birthday",
            Self::CreatedLessThan { .. } => "createdLessThan",
            Self::CreatedMoreThan { .. } => "createdMoreThan",
            Self::UserInfoUpdatedLessThan { .. } => "userInfoUpdatedLessThan",
            Self::UserInfoUpdatedMoreThan { .. } => "userInfoUpdatedMoreThan",
            Self::LoginDaysLessThanOrEq { .. } => "loginDaysLessThanOrEq",
            Self::LoginDaysMoreThanOrEq { .. } => "loginDaysMoreThanOrEq",
            Self::DriveUsageLessThanOrEq { .. } => "driveUsageLessThanOrEq",
            Self::DriveUsageMoreThanOrEq { .. } => "driveUsageMoreThanOrEq",
            Self::FollowersLessThanOrEq { .. } => "followersLessThanOrEq",
            Self::FollowersMoreThanOrEq { .. } => "followersMoreThanOrEq",
            Self::FollowingLessThanOrEq { .. } => "followingLessThanOrEq",
            Self::FollowingMoreThanOrEq { .. } => "followingMoreThanOrEq",
            Self::NotesLessThanOrEq { .. } => "notesLessThanOrEq",
            Self::NotesMoreThanOrEq { .. } => "notesMoreThanOrEq",
            Self::ReactionsLessThanOrEq { .. } => "reactionsLessThanOrEq",
            Self::ReactionsMoreThanOrEq { .. } => "reactionsMoreThanOrEq",
            Self::ReactionsReceivedLessThanOrEq { .. } => "reactionsReceivedLessThanOrEq",
            Self::ReactionsReceivedMoreThanOrEq { .. } => "reactionsReceivedMoreThanOrEq",
            Self::RenotesLessThanOrEq { .. } => "renotesLessThanOrEq",
            Self::RenotesMoreThanOrEq { .. } => "renotesMoreThanOrEq",
            Self::RenotesReceivedLessThanOrEq { .. } => "renotesReceivedLessThanOrEq",
            Self::RenotesReceivedMoreThanOrEq { .. } => "renotesReceivedMoreThanOrEq",
            Self::RepliesLessThanOrEq { .. } => "repliesLessThanOrEq",
            Self::RepliesMoreThanOrEq { .. } => "repliesMoreThanOrEq",
            Self::RepliesReceivedLessThanOrEq { .. } => "repliesReceivedLessThanOrEq",
            Self::RepliesReceivedMoreThanOrEq { .. } => "repliesReceivedMoreThanOrEq",
            Self::VotesLessThanOrEq { .. } => "votesLessThanOrEq",
            Self::VotesMoreThanOrEq { .. } => "votesMoreThanOrEq",
            Self::VotesReceivedLessThanOrEq { .. } => "votesReceivedLessThanOrEq",
            Self::VotesReceivedMoreThanOrEq { .. } => "votesReceivedMoreThanOrEq",
        }
    }
}

impl TryFrom<ConditionNode> for RoleCondition {
    type Error = AppError;

    fn try_from(node: ConditionNode) -> Result<Self, Self::Error> {
        use AgeBound::{LessThan, MoreThan};
        use AgeSubject::{AccountCreated, ProfileUpdated};
        use Comparison::{LessThanOrEq as Le, MoreThanOrEq as Ge};
        use UserMetric as M;

        let threshold = RoleCondition::threshold;
        let condition = match node {
            ConditionNode::And { values } => RoleCondition::And(values),
            ConditionNode::Or { values } => RoleCondition::Or(values),
            ConditionNode::Not { value } => RoleCondition::Not(value),
            ConditionNode::RoleAssignedTo { role_id } => RoleCondition::RoleAssignedTo(role_id),
            ConditionNode::IsLocal {} => RoleCondition::Flag(UserFlag::IsLocal),
            ConditionNode::IsRemote {} => RoleCondition::Flag(UserFlag::IsRemote),
            ConditionNode::IsBot {} => RoleCondition::Flag(UserFlag::IsBot),
            ConditionNode::IsSuspended {} => RoleCondition::Flag(UserFlag::IsSuspended),
            ConditionNode::IsCat {} => RoleCondition::Flag(UserFlag::IsCat),
            ConditionNode::HasSecurityKey {} => RoleCondition::Flag(UserFlag::HasSecurityKey),
            ConditionNode::HasTwoFactorAuth {} => RoleCondition::Flag(UserFlag::HasTwoFactorAuth),
            ConditionNode::HasEmailVerified {} => RoleCondition::Flag(UserFlag::HasEmailVerified),
            ConditionNode::HasPasswordLessLogin {} => {
                RoleCondition::Flag(UserFlag::HasPasswordLessLogin)
            }
            ConditionNode::Birthday {} => RoleCondition::Flag(UserFlag::Birthday),
            ConditionNode::CreatedLessThan { sec } => {
                RoleCondition::age(AccountCreated, LessThan, sec)
            }
            ConditionNode::CreatedMoreThan { sec } => {
                RoleCondition::age(AccountCreated, MoreThan, sec)
            }
            ConditionNode::UserInfoUpdatedLessThan { sec } => {
                RoleCondition::age(ProfileUpdated, LessThan, sec)
            }
            ConditionNode::UserInfoUpdatedMoreThan { sec } => {
                RoleCondition::age(ProfileUpdated, MoreThan, sec)
            }
            ConditionNode::LoginDaysLessThanOrEq { day } => threshold(M::LoginDays, Le, day),
            ConditionNode::LoginDaysMoreThanOrEq { day } => threshold(M::LoginDays, Ge, day),
            ConditionNode::DriveUsageLessThanOrEq { usage_size } => {
                threshold(M::DriveUsage, Le, usage_size)
            }
            ConditionNode::DriveUsageMoreThanOrEq { usage_size } => {
                threshold(M::DriveUsage, Ge, usage_size)
            }
            ConditionNode::FollowersLessThanOrEq { count } => threshold(M::Followers, Le, count),
            ConditionNode::FollowersMoreThanOrEq { count } => threshold(M::Followers, Ge, count),
            ConditionNode::FollowingLessThanOrEq { count } => threshold(M::Following, Le, count),
            ConditionNode::FollowingMoreThanOrEq { count } => threshold(M::Following, Ge, count),
            ConditionNode::NotesLessThanOrEq { count } => threshold(M::Notes, Le, count),
            ConditionNode::NotesMoreThanOrEq { count } => threshold(M::Notes, Ge, count),
            ConditionNode::ReactionsLessThanOrEq { count } => {
                threshold(M::ReactionsSent, Le, count)
            }
            ConditionNode::ReactionsMoreThanOrEq { count } => {
                threshold(M::ReactionsSent, Ge, count)
            }
            ConditionNode::ReactionsReceivedLessThanOrEq { count } => {
                threshold(M::ReactionsReceived, Le, count)
            }
            ConditionNode::ReactionsReceivedMoreThanOrEq { count } => {
                threshold(M::ReactionsReceived, Ge, count)
            }
            ConditionNode::RenotesLessThanOrEq { count } => threshold(M::RenotesSent, Le, count),
            ConditionNode::RenotesMoreThanOrEq { count } => threshold(M::RenotesSent, Ge, count),
            ConditionNode::RenotesReceivedLessThanOrEq { count } => {
                threshold(M::RenotesReceived, Le, count)
            }
            ConditionNode::RenotesReceivedMoreThanOrEq { count } => {
                threshold(M::RenotesReceived, Ge, count)
            }
            ConditionNode::RepliesLessThanOrEq { count } => threshold(M::RepliesSent, Le, count),
            ConditionNode::RepliesMoreThanOrEq { count } => threshold(M::RepliesSent, Ge, count),
            ConditionNode::RepliesReceivedLessThanOrEq { count } => {
                threshold(M::RepliesReceived, Le, count)
            }
            ConditionNode::RepliesReceivedMoreThanOrEq { count } => {
                threshold(M::RepliesReceived, Ge, count)
            }
            ConditionNode::VotesLessThanOrEq { count } => threshold(M::VotesSent, Le, count),
            ConditionNode::VotesMoreThanOrEq { count } => threshold(M::VotesSent, Ge, count),
            ConditionNode::VotesReceivedLessThanOrEq { count } => {
                threshold(M::VotesReceived, Le, count)
            }
            ConditionNode::VotesReceivedMoreThanOrEq { count } => {
                threshold(M::VotesReceived, Ge, count)
            }
        };

        condition.validated()
    }
}

impl From<RoleCondition> for ConditionNode {
    fn from(condition: RoleCondition) -> Self {
        use AgeBound::{LessThan, MoreThan};
        use AgeSubject::{AccountCreated, ProfileUpdated};
        use Comparison::{LessThanOrEq as Le, MoreThanOrEq as Ge};
        use UserMetric as M;

        match condition {
            RoleCondition::And(values) => Self::And { values },
            RoleCondition::Or(values) => Self::Or { values },
            RoleCondition::Not(value) => Self::Not { value },
            RoleCondition::RoleAssignedTo(role_id) => Self::RoleAssignedTo { role_id },
            RoleCondition::Flag(flag) => match flag {
                UserFlag::IsLocal => Self::IsLocal {},
                UserFlag::IsRemote => Self::IsRemote {},
                UserFlag::IsBot => Self::IsBot {},
                UserFlag::IsSuspended => Self::IsSuspended {},
                UserFlag::IsCat => Self::IsCat {},
                UserFlag::HasSecurityKey => Self::HasSecurityKey {},
                UserFlag::HasTwoFactorAuth => Self::HasTwoFactorAuth {},
                UserFlag::HasEmailVerified => Self::HasEmailVerified {},
                UserFlag::HasPasswordLessLogin => Self::HasPasswordLessLogin {},
                UserFlag::Birthday => Self::Birthday {},
            },
            RoleCondition::Age {
                subject,
                bound,
                seconds: sec,
            } => match (subject, bound) {
                (AccountCreated, LessThan) => Self::CreatedLessThan { sec },
                (AccountCreated, MoreThan) => Self::CreatedMoreThan { sec },
                (ProfileUpdated, LessThan) => Self::UserInfoUpdatedLessThan { sec },
                (ProfileUpdated, MoreThan) => Self::UserInfoUpdatedMoreThan { sec },
            },
            RoleCondition::Threshold {
                metric,
                comparison,
                value: count,
            } => match (metric, comparison) {
                (M::LoginDays, Le) => Self::LoginDaysLessThanOrEq { day: count },
                (M::LoginDays, Ge) => Self::LoginDaysMoreThanOrEq { day: count },
                (M::DriveUsage, Le) => Self::DriveUsageLessThanOrEq { usage_size: count },
                (M::DriveUsage, Ge) => Self::DriveUsageMoreThanOrEq { usage_size: count },
                (M::Followers, Le) => Self::FollowersLessThanOrEq { count },
                (M::Followers, Ge) => Self::FollowersMoreThanOrEq { count },
                (M::Following, Le) => Self::FollowingLessThanOrEq { count },
                (M::Following, Ge) => Self::FollowingMoreThanOrEq { count },
                (M::Notes, Le) => Self::NotesLessThanOrEq { count },
                (M::Notes, Ge) => Self::NotesMoreThanOrEq { count },
                (M::ReactionsSent, Le) => Self::ReactionsLessThanOrEq { count },
                (M::ReactionsSent, Ge) => Self::ReactionsMoreThanOrEq { count },
                (M::ReactionsReceived, Le) => Self::ReactionsReceivedLessThanOrEq { count },
                (M::ReactionsReceived, Ge) => Self::ReactionsReceivedMoreThanOrEq { count },
                (M::RenotesSent, Le) => Self::RenotesLessThanOrEq { count },
                (M::RenotesSent, Ge) => Self::RenotesMoreThanOrEq { count },
                (M::RenotesReceived, Le) => Self::RenotesReceivedLessThanOrEq { count },
                (M::RenotesReceived, Ge) => Self::RenotesReceivedMoreThanOrEq { count },
                (M::RepliesSent, Le) => Self::RepliesLessThanOrEq { count },
                (M::RepliesSent, Ge) => Self::RepliesMoreThanOrEq { count },
                (M::RepliesReceived, Le) => Self::RepliesReceivedLessThanOrEq { count },
                (M::RepliesReceived, Ge) => Self::RepliesReceivedMoreThanOrEq { count },
                (M::VotesSent, Le) => Self::VotesLessThanOrEq { count },
                (M::VotesSent, Ge) => Self::VotesMoreThanOrEq { count },
                (M::VotesReceived, Le) => Self::VotesReceivedLessThanOrEq { count },
                (M::VotesReceived, Ge) => Self::VotesReceivedMoreThanOrEq { count },
            },
        }
    }
}

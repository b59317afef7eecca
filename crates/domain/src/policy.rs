//! Role policies and the rules for merging them.
//!
//! Every policy name is declared once below together with its value kind and
//! its combinator. Resolution folds over that fixed table; nothing is looked
//! up by field name at runtime.

use std::collections::BTreeMap;
use std::str::FromStr;

use rolegate_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Value type carried by a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyKind {
    /// Capability switch.
    Flag,
    /// Integer limit or capacity.
    Limit,
    /// Numeric multiplier.
    Factor,
}

/// How the values of several roles are merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyCombinator {
    /// Granted if any role grants it.
    AnyGranted,
    /// The most generous value wins.
    Max,
}

/// Names of all role policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PolicyName {
    /// Global timeline access.
    GtlAvailable,
    /// Local timeline access.
    LtlAvailable,
    /// Posting public notes.
    CanPublicNote,
    /// Mentions per note.
    MentionLimit,
    /// Creating invitation codes.
    CanInvite,
    /// Invitation codes per cycle.
    InviteLimit,
    /// Invitation cycle length in minutes.
    InviteLimitCycle,
    /// Invitation code lifetime in minutes.
    InviteExpirationTime,
    /// Managing custom emojis.
    CanManageCustomEmojis,
    /// Managing avatar decorations.
    CanManageAvatarDecorations,
    /// Full-text note search.
    CanSearchNotes,
    /// Translation service access.
    CanUseTranslator,
    /// Hiding ads.
    CanHideAds,
    /// Drive capacity in megabytes.
    DriveCapacityMb,
    /// Forcing NSFW marks on uploads.
    AlwaysMarkNsfw,
    /// Pinned notes.
    PinLimit,
    /// Antennas.
    AntennaLimit,
    /// Muted words.
    WordMuteLimit,
    /// Webhooks.
    WebhookLimit,
    /// Clips.
    ClipLimit,
    /// Notes per clip.
    NoteEachClipsLimit,
    /// User lists.
    UserListLimit,
    /// Users per list.
    UserEachUserListsLimit,
    /// Rate limit multiplier.
    RateLimitFactor,
    /// Avatar decorations worn at once.
    AvatarDecorationLimit,
}

impl PolicyName {
    /// Returns a stable storage value for this policy.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GtlAvailable => "gtlAvailable",
            Self::LtlAvailable => "ltlAvailable",
            Self::CanPublicNote => "canPublicNote",
            Self::MentionLimit => "mentionLimit",
            Self::CanInvite => "canInvite",
            Self::InviteLimit => "inviteLimit",
            Self::InviteLimitCycle => "inviteLimitCycle",
            Self::InviteExpirationTime => "inviteExpirationTime",
            Self::CanManageCustomEmojis => "canManageCustomEmojis",
            Self::CanManageAvatarDecorations => "canManageAvatarDecorations",
            Self::CanSearchNotes => "canSearchNotes",
            Self::CanUseTranslator => "canUseTranslator",
            Self::CanHideAds => "canHideAds",
            Self::DriveCapacityMb => "driveCapacityMb",
            Self::AlwaysMarkNsfw => "alwaysMarkNsfw",
            Self::PinLimit => "pinLimit",
            Self::AntennaLimit => "antennaLimit",
            Self::WordMuteLimit => "wordMuteLimit",
            Self::WebhookLimit => "webhookLimit",
            Self::ClipLimit => "clipLimit",
            Self::NoteEachClipsLimit => "noteEachClipsLimit",
            Self::UserListLimit => "userListLimit",
            Self::UserEachUserListsLimit => "userEachUserListsLimit",
            Self::RateLimitFactor => "rateLimitFactor",
            Self::AvatarDecorationLimit => "avatarDecorationLimit",
        }
    }

    /// Returns all known policies.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[PolicyName] = &[
            PolicyName::GtlAvailable,
            PolicyName::LtlAvailable,
            PolicyName::CanPublicNote,
            PolicyName::MentionLimit,
            PolicyName::CanInvite,
            PolicyName::InviteLimit,
            PolicyName::InviteLimitCycle,
            PolicyName::InviteExpirationTime,
            PolicyName::CanManageCustomEmojis,
            PolicyName::CanManageAvatarDecorations,
            PolicyName::CanSearchNotes,
            PolicyName::CanUseTranslator,
            PolicyName::CanHideAds,
            PolicyName::DriveCapacityMb,
            PolicyName::AlwaysMarkNsfw,
            PolicyName::PinLimit,
            PolicyName::AntennaLimit,
            PolicyName::WordMuteLimit,
            PolicyName::WebhookLimit,
            PolicyName::ClipLimit,
            PolicyName::NoteEachClipsLimit,
            PolicyName::UserListLimit,
            PolicyName::UserEachUserListsLimit,
            PolicyName::RateLimitFactor,
            PolicyName::AvatarDecorationLimit,
        ];

        ALL
    }

    /// Returns the value kind of this policy.
    #[must_use]
    pub fn kind(&self) -> PolicyKind {
        match self {
            Self::GtlAvailable
            | Self::LtlAvailable
            | Self::CanPublicNote
            | Self::CanInvite
            | Self::CanManageCustomEmojis
            | Self::CanManageAvatarDecorations
            | Self::CanSearchNotes
            | Self::CanUseTranslator
            | Self::CanHideAds
            | Self::AlwaysMarkNsfw => PolicyKind::Flag,
            Self::RateLimitFactor => PolicyKind::Factor,
            Self::MentionLimit
            | Self::InviteLimit
            | Self::InviteLimitCycle
            | Self::InviteExpirationTime
            | Self::DriveCapacityMb
            | Self::PinLimit
            | Self::AntennaLimit
            | Self::WordMuteLimit
            | Self::WebhookLimit
            | Self::ClipLimit
            | Self::NoteEachClipsLimit
            | Self::UserListLimit
            | Self::UserEachUserListsLimit
            | Self::AvatarDecorationLimit => PolicyKind::Limit,
        }
    }

    /// Returns the combinator used to merge role values.
    #[must_use]
    pub fn combinator(&self) -> PolicyCombinator {
        match self.kind() {
            PolicyKind::Flag => PolicyCombinator::AnyGranted,
            PolicyKind::Limit | PolicyKind::Factor => PolicyCombinator::Max,
        }
    }
}

impl FromStr for PolicyName {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .find(|name| name.as_str() == value)
            .copied()
            .ok_or_else(|| AppError::Validation(format!("unknown policy value '{value}'")))
    }
}

/// Concrete value of one policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PolicyValue {
    /// Capability switch.
    Flag(bool),
    /// Integer limit.
    Limit(i64),
    /// Numeric multiplier.
    Factor(f64),
}

impl PolicyValue {
    /// Returns the flag value.
    #[must_use]
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Self::Flag(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the limit value.
    #[must_use]
    pub fn as_limit(&self) -> Option<i64> {
        match self {
            Self::Limit(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the value as a factor, widening limits.
    #[must_use]
    pub fn as_factor(&self) -> Option<f64> {
        match self {
            Self::Factor(value) => Some(*value),
            Self::Limit(value) => Some(*value as f64),
            Self::Flag(_) => None,
        }
    }

    /// Converts the value to the kind required by `name`.
    ///
    /// Integers are accepted for factors and whole numbers for limits.
    pub fn coerce_for(self, name: PolicyName) -> AppResult<Self> {
        let coerced = match (name.kind(), self) {
            (PolicyKind::Flag, Self::Flag(value)) => Some(Self::Flag(value)),
            (PolicyKind::Limit, Self::Limit(value)) => Some(Self::Limit(value)),
            (PolicyKind::Limit, Self::Factor(value))
                if value.is_finite() && value.fract() == 0.0 =>
            {
                Some(Self::Limit(value as i64))
            }
            (PolicyKind::Factor, Self::Factor(value)) if value.is_finite() => {
                Some(Self::Factor(value))
            }
            (PolicyKind::Factor, Self::Limit(value)) => Some(Self::Factor(value as f64)),
            _ => None,
        };

        coerced.ok_or_else(|| {
            AppError::Validation(format!(
                "value {self:?} does not fit policy '{}'",
                name.as_str()
            ))
        })
    }
}

/// Override tier. Higher tiers shadow lower ones entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum PolicyPriority {
    /// Tier 0.
    #[default]
    Low,
    /// Tier 1.
    Medium,
    /// Tier 2.
    High,
}

impl TryFrom<u8> for PolicyPriority {
    type Error = AppError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Low),
            1 => Ok(Self::Medium),
            2 => Ok(Self::High),
            _ => Err(AppError::Validation(format!(
                "policy priority must be 0, 1 or 2, got {value}"
            ))),
        }
    }
}

impl From<PolicyPriority> for u8 {
    fn from(value: PolicyPriority) -> Self {
        match value {
            PolicyPriority::Low => 0,
            PolicyPriority::Medium => 1,
            PolicyPriority::High => 2,
        }
    }
}

/// One role's setting for one policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyOverride {
    /// Use the instance value instead of `value`.
    pub use_default: bool,
    /// Override tier.
    #[serde(default)]
    pub priority: PolicyPriority,
    /// Explicit value, required unless `use_default` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<PolicyValue>,
}

impl PolicyOverride {
    /// Entry assumed for roles that say nothing about a policy.
    #[must_use]
    pub fn inherit() -> Self {
        Self {
            use_default: true,
            priority: PolicyPriority::Low,
            value: None,
        }
    }

    /// Creates an explicit override.
    #[must_use]
    pub fn explicit(priority: PolicyPriority, value: PolicyValue) -> Self {
        Self {
            use_default: false,
            priority,
            value: Some(value),
        }
    }

    /// Returns the effective value given the instance value.
    #[must_use]
    pub fn resolve(&self, base: PolicyValue) -> PolicyValue {
        match self.value {
            Some(value) if !self.use_default => value,
            _ => base,
        }
    }

    fn validated_for(self, name: PolicyName) -> AppResult<Self> {
        let value = match (self.use_default, self.value) {
            (_, Some(value)) => Some(value.coerce_for(name)?),
            (true, None) => None,
            (false, None) => {
                return Err(AppError::Validation(format!(
                    "policy '{}' override needs a value when useDefault is false",
                    name.as_str()
                )));
            }
        };

        Ok(Self { value, ..self })
    }
}

/// Policy overrides attached to a role.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<PolicyName, PolicyOverride>",
    into = "BTreeMap<PolicyName, PolicyOverride>"
)]
pub struct RolePolicyOverrides(BTreeMap<PolicyName, PolicyOverride>);

impl RolePolicyOverrides {
    /// Creates validated overrides.
    pub fn new(entries: BTreeMap<PolicyName, PolicyOverride>) -> AppResult<Self> {
        let mut overrides = Self::default();
        for (name, entry) in entries {
            overrides.insert(name, entry)?;
        }

        Ok(overrides)
    }

    /// Inserts or replaces one override after type-checking it.
    pub fn insert(&mut self, name: PolicyName, entry: PolicyOverride) -> AppResult<()> {
        self.0.insert(name, entry.validated_for(name)?);
        Ok(())
    }

    /// Returns the override for a policy.
    #[must_use]
    pub fn get(&self, name: PolicyName) -> Option<&PolicyOverride> {
        self.0.get(&name)
    }

    /// Returns whether no policy is overridden.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<BTreeMap<PolicyName, PolicyOverride>> for RolePolicyOverrides {
    type Error = AppError;

    fn try_from(value: BTreeMap<PolicyName, PolicyOverride>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RolePolicyOverrides> for BTreeMap<PolicyName, PolicyOverride> {
    fn from(value: RolePolicyOverrides) -> Self {
        value.0
    }
}

/// Instance-configured replacements for the built-in defaults.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<PolicyName, PolicyValue>",
    into = "BTreeMap<PolicyName, PolicyValue>"
)]
pub struct InstancePolicyOverrides(BTreeMap<PolicyName, PolicyValue>);

impl InstancePolicyOverrides {
    /// Creates validated instance overrides.
    pub fn new(entries: BTreeMap<PolicyName, PolicyValue>) -> AppResult<Self> {
        entries
            .into_iter()
            .map(|(name, value)| Ok((name, value.coerce_for(name)?)))
            .collect::<AppResult<BTreeMap<_, _>>>()
            .map(Self)
    }

    /// Iterates over configured values.
    pub fn iter(&self) -> impl Iterator<Item = (PolicyName, PolicyValue)> + '_ {
        self.0.iter().map(|(name, value)| (*name, *value))
    }
}

impl TryFrom<BTreeMap<PolicyName, PolicyValue>> for InstancePolicyOverrides {
    type Error = AppError;

    fn try_from(value: BTreeMap<PolicyName, PolicyValue>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<InstancePolicyOverrides> for BTreeMap<PolicyName, PolicyValue> {
    fn from(value: InstancePolicyOverrides) -> Self {
        value.0
    }
}

/// Fully resolved policy values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[allow(missing_docs)]
pub struct RolePolicies {
    pub gtl_available: bool,
    pub ltl_available: bool,
    pub can_public_note: bool,
    pub mention_limit: i64,
    pub can_invite: bool,
    pub invite_limit: i64,
    pub invite_limit_cycle: i64,
    pub invite_expiration_time: i64,
    pub can_manage_custom_emojis: bool,
    pub can_manage_avatar_decorations: bool,
    pub can_search_notes: bool,
    pub can_use_translator: bool,
    pub can_hide_ads: bool,
    pub drive_capacity_mb: i64,
    pub always_mark_nsfw: bool,
    pub pin_limit: i64,
    pub antenna_limit: i64,
    pub word_mute_limit: i64,
    pub webhook_limit: i64,
    pub clip_limit: i64,
    pub note_each_clips_limit: i64,
    pub user_list_limit: i64,
    pub user_each_user_lists_limit: i64,
    pub rate_limit_factor: f64,
    pub avatar_decoration_limit: i64,
}

impl Default for RolePolicies {
    fn default() -> Self {
        Self {
            gtl_available: true,
            ltl_available: true,
            can_public_note: true,
            mention_limit: 20,
            can_invite: false,
            invite_limit: 0,
            invite_limit_cycle: 60 * 24 * 7,
            invite_expiration_time: 0,
            can_manage_custom_emojis: false,
            can_manage_avatar_decorations: false,
            can_search_notes: false,
            can_use_translator: true,
            can_hide_ads: false,
            drive_capacity_mb: 100,
            always_mark_nsfw: false,
            pin_limit: 5,
            antenna_limit: 5,
            word_mute_limit: 200,
            webhook_limit: 3,
            clip_limit: 10,
            note_each_clips_limit: 200,
            user_list_limit: 10,
            user_each_user_lists_limit: 50,
            rate_limit_factor: 1.0,
            avatar_decoration_limit: 1,
        }
    }
}

impl RolePolicies {
    /// Returns built-in defaults with instance overrides applied.
    #[must_use]
    pub fn with_instance_overrides(overrides: &InstancePolicyOverrides) -> Self {
        let mut policies = Self::default();
        for (name, value) in overrides.iter() {
            policies.store(name, value);
        }

        policies
    }

    /// Returns the value of one policy.
    #[must_use]
    pub fn get(&self, name: PolicyName) -> PolicyValue {
        use PolicyValue::{Factor, Flag, Limit};

        match name {
            PolicyName::GtlAvailable => Flag(self.gtl_available),
            PolicyName::LtlAvailable => Flag(self.ltl_available),
            PolicyName::CanPublicNote => Flag(self.can_public_note),
            PolicyName::MentionLimit => Limit(self.mention_limit),
            PolicyName::CanInvite => Flag(self.can_invite),
            PolicyName::InviteLimit => Limit(self.invite_limit),
            PolicyName::InviteLimitCycle => Limit(self.invite_limit_cycle),
            PolicyName::InviteExpirationTime => Limit(self.invite_expiration_time),
            PolicyName::CanManageCustomEmojis => Flag(self.can_manage_custom_emojis),
            PolicyName::CanManageAvatarDecorations => Flag(self.can_manage_avatar_decorations),
            PolicyName::CanSearchNotes => Flag(self.can_search_notes),
            PolicyName::CanUseTranslator => Flag(self.can_use_translator),
            PolicyName::CanHideAds => Flag(self.can_hide_ads),
            PolicyName::DriveCapacityMb => Limit(self.drive_capacity_mb),
            PolicyName::AlwaysMarkNsfw => Flag(self.always_mark_nsfw),
            PolicyName::PinLimit => Limit(self.pin_limit),
            PolicyName::AntennaLimit => Limit(self.antenna_limit),
            PolicyName::WordMuteLimit => Limit(self.word_mute_limit),
            PolicyName::WebhookLimit => Limit(self.webhook_limit),
            PolicyName::ClipLimit => Limit(self.clip_limit),
            PolicyName::NoteEachClipsLimit => Limit(self.note_each_clips_limit),
            PolicyName::UserListLimit => Limit(self.user_list_limit),
            PolicyName::UserEachUserListsLimit => Limit(self.user_each_user_lists_limit),
            PolicyName::RateLimitFactor => Factor(self.rate_limit_factor),
            PolicyName::AvatarDecorationLimit => Limit(self.avatar_decoration_limit),
        }
    }

    /// Sets one policy after type-checking the value.
    pub fn set(&mut self, name: PolicyName, value: PolicyValue) -> AppResult<()> {
        let value = value.coerce_for(name)?;
        self.store(name, value);
        Ok(())
    }

    /// Merges role overrides over `base`.
    ///
    /// For each policy the highest priority tier present among the roles is
    /// selected and only that tier is aggregated. Roles without an entry count
    /// as tier 0 with `useDefault`. With no roles, `base` is returned as is.
    #[must_use]
    pub fn resolve(base: &RolePolicies, roles: &[&RolePolicyOverrides]) -> RolePolicies {
        if roles.is_empty() {
            return base.clone();
        }

        let mut resolved = base.clone();
        for name in PolicyName::all() {
            let entries: Vec<PolicyOverride> = roles
                .iter()
                .map(|overrides| {
                    overrides
                        .get(*name)
                        .copied()
                        .unwrap_or_else(PolicyOverride::inherit)
                })
                .collect();

            let base_value = base.get(*name);
            let values: Vec<PolicyValue> = select_tier(&entries)
                .into_iter()
                .map(|entry| entry.resolve(base_value))
                .collect();

            resolved.store(*name, aggregate(*name, &values, base_value));
        }

        resolved
    }

    fn store(&mut self, name: PolicyName, value: PolicyValue) {
        match name.kind() {
            PolicyKind::Flag => {
                if let Some(flag) = value.as_flag()
                    && let Some(field) = self.flag_mut(name)
                {
                    *field = flag;
                }
            }
            PolicyKind::Limit => {
                if let Some(limit) = value.as_limit()
                    && let Some(field) = self.limit_mut(name)
                {
                    *field = limit;
                }
            }
            PolicyKind::Factor => {
                if let Some(factor) = value.as_factor() {
                    self.rate_limit_factor = factor;
                }
            }
        }
    }

    fn flag_mut(&mut self, name: PolicyName) -> Option<&mut bool> {
        match name {
            PolicyName::GtlAvailable => Some(&mut self.gtl_available),
            PolicyName::LtlAvailable => Some(&mut self.ltl_available),
            PolicyName::CanPublicNote => Some(&mut self.can_public_note),
            PolicyName::CanInvite => Some(&mut self.can_invite),
            PolicyName::CanManageCustomEmojis => Some(&mut self.can_manage_custom_emojis),
            PolicyName::CanManageAvatarDecorations => {
                Some(&mut self.can_manage_avatar_decorations)
            }
            PolicyName::CanSearchNotes => Some(&mut self.can_search_notes),
            PolicyName::CanUseTranslator => Some(&mut self.can_use_translator),
            PolicyName::CanHideAds => Some(&mut self.can_hide_ads),
            PolicyName::AlwaysMarkNsfw => Some(&mut self.always_mark_nsfw),
            _ => None,
        }
    }

    fn limit_mut(&mut self, name: PolicyName) -> Option<&mut i64> {
        match name {
            PolicyName::MentionLimit => Some(&mut self.mention_limit),
            PolicyName::InviteLimit => Some(&mut self.invite_limit),
            PolicyName::InviteLimitCycle => Some(&mut self.invite_limit_cycle),
            PolicyName::InviteExpirationTime => Some(&mut self.invite_expiration_time),
            PolicyName::DriveCapacityMb => Some(&mut self.drive_capacity_mb),
            PolicyName::PinLimit => Some(&mut self.pin_limit),
            PolicyName::AntennaLimit => Some(&mut self.antenna_limit),
            PolicyName::WordMuteLimit => Some(&mut self.word_mute_limit),
            PolicyName::WebhookLimit => Some(&mut self.webhook_limit),
            PolicyName::ClipLimit => Some(&mut self.clip_limit),
            PolicyName::NoteEachClipsLimit => Some(&mut self.note_each_clips_limit),
            PolicyName::UserListLimit => Some(&mut self.user_list_limit),
            PolicyName::UserEachUserListsLimit => Some(&mut self.user_each_user_lists_limit),
            PolicyName::AvatarDecorationLimit => Some(&mut self.avatar_decoration_limit),
            _ => None,
        }
    }
}

fn select_tier(entries: &[PolicyOverride]) -> Vec<&PolicyOverride> {
    for tier in [PolicyPriority::High, PolicyPriority::Medium] {
        let selected: Vec<&PolicyOverride> = entries
            .iter()
            .filter(|entry| entry.priority == tier)
            .collect();
        if !selected.is_empty() {
            return selected;
        }
    }

    entries.iter().collect()
}

fn aggregate(name: PolicyName, values: &[PolicyValue], base: PolicyValue) -> PolicyValue {
    match (name.combinator(), name.kind()) {
        (PolicyCombinator::AnyGranted, _) => {
            PolicyValue::Flag(values.iter().any(|value| value.as_flag() == Some(true)))
        }
        (PolicyCombinator::Max, PolicyKind::Factor) => values
            .iter()
            .filter_map(PolicyValue::as_factor)
            .reduce(f64::max)
            .map_or(base, PolicyValue::Factor),
        (PolicyCombinator::Max, _) => values
            .iter()
            .filter_map(PolicyValue::as_limit)
            .max()
            .map_or(base, PolicyValue::Limit),
    }
}

//! User-side inputs to role resolution.
//!
//! These are read-only snapshots supplied by the surrounding application. The
//! engine never mutates users; it only reads the attributes a role condition
//! can refer to.

use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a user record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(Uuid);

impl UserId {
    /// Creates a new random user identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a user identifier from an existing UUID value.
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

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// User attributes read directly from the user record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSnapshot {
    /// User identifier.
    pub id: UserId,
    /// Username, used in moderation log entries.
    pub username: String,
    /// Remote host, `None` for local users.
    pub host: Option<String>,
    /// Whether the account is a bot.
    pub is_bot: bool,
    /// Whether the account is suspended.
    pub is_suspended: bool,
    /// Whether the account is flagged as a cat.
    pub is_cat: bool,
    /// Whether the account is the instance root.
    pub is_root: bool,
    /// Account creation time.
    pub created_at: DateTime<Utc>,
    /// Last profile update, `None` if never updated.
    pub updated_at: Option<DateTime<Utc>>,
    /// Denormalised follower count.
    pub followers_count: u64,
    /// Denormalised following count.
    pub following_count: u64,
    /// Denormalised note count.
    pub notes_count: u64,
}

impl UserSnapshot {
    /// Returns whether the user belongs to this instance.
    #[must_use]
    pub fn is_local(&self) -> bool {
        self.host.is_none()
    }

    /// Returns whether the user belongs to another instance.
    #[must_use]
    pub fn is_remote(&self) -> bool {
        self.host.is_some()
    }
}

/// Profile fields that require a separate lookup.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfileSnapshot {
    /// Whether TOTP two-factor authentication is enabled.
    pub two_factor_enabled: bool,
    /// Whether the email address has been verified.
    pub email_verified: bool,
    /// Whether passwordless login is enabled.
    pub use_password_less_login: bool,
    /// Birthday, year is ignored when matching.
    pub birthday: Option<NaiveDate>,
    /// Calendar dates on which the user logged in.
    pub logged_in_dates: Vec<NaiveDate>,
}

impl UserProfileSnapshot {
    /// Returns the number of distinct login dates.
    #[must_use]
    pub fn login_day_count(&self) -> u64 {
        let distinct: BTreeSet<&NaiveDate> = self.logged_in_dates.iter().collect();
        u64::try_from(distinct.len()).unwrap_or(u64::MAX)
    }

    /// Returns whether `today` falls on the stored birthday.
    #[must_use]
    pub fn is_birthday(&self, today: NaiveDate) -> bool {
        self.birthday.is_some_and(|birthday| {
            birthday.month() == today.month() && birthday.day() == today.day()
        })
    }
}

/// Privileged user performing an administrative operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    /// Acting user.
    pub user_id: UserId,
    /// Whether the actor is the instance root.
    pub is_root: bool,
}

impl Actor {
    /// Creates an actor for a regular user.
    #[must_use]
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            is_root: false,
        }
    }

    /// Creates the root actor.
    #[must_use]
    pub fn root(user_id: UserId) -> Self {
        Self {
            user_id,
            is_root: true,
        }
    }
}

use async_trait::async_trait;
use rolegate_core::AppResult;
use rolegate_domain::{UserId, UserMetric, UserProfileSnapshot, UserSnapshot};

/// Read-only port for the user attributes role conditions refer to.
#[async_trait]
pub trait UserStatsProvider: Send + Sync {
    /// Returns the user record.
    async fn find_user(&self, user_id: UserId) -> AppResult<Option<UserSnapshot>>;

    /// Returns the user profile.
    async fn find_profile(&self, user_id: UserId) -> AppResult<Option<UserProfileSnapshot>>;

    /// Counts registered security keys.
    async fn count_security_keys(&self, user_id: UserId) -> AppResult<u64>;

    /// Returns an aggregated statistic.
    ///
    /// Only metrics that are not carried on [`UserSnapshot`] or
    /// [`UserProfileSnapshot`] are requested through this method.
    async fn aggregate(&self, user_id: UserId, metric: UserMetric) -> AppResult<u64>;
}

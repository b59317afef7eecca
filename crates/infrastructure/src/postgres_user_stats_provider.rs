use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use rolegate_application::UserStatsProvider;
use rolegate_core::{AppError, AppResult};
use rolegate_domain::{UserId, UserMetric, UserProfileSnapshot, UserSnapshot};

/// PostgreSQL-backed reader for the user attributes role conditions use.
#[derive(Clone)]
pub struct PostgresUserStatsProvider {
    pool: PgPool,
}

impl PostgresUserStatsProvider {
    /// Creates a provider with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    host: Option<String>,
    is_bot: bool,
    is_suspended: bool,
    is_cat: bool,
    is_root: bool,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
    followers_count: i64,
    following_count: i64,
    notes_count: i64,
}

impl From<UserRow> for UserSnapshot {
    fn from(row: UserRow) -> Self {
        Self {
            id: UserId::from_uuid(row.id),
            username: row.username,
            host: row.host,
            is_bot: row.is_bot,
            is_suspended: row.is_suspended,
            is_cat: row.is_cat,
            is_root: row.is_root,
            created_at: row.created_at,
            updated_at: row.updated_at,
            followers_count: count(row.followers_count),
            following_count: count(row.following_count),
            notes_count: count(row.notes_count),
        }
    }
}

#[derive(Debug, FromRow)]
struct ProfileRow {
    two_factor_enabled: bool,
    email_verified: bool,
    use_password_less_login: bool,
    birthday: Option<NaiveDate>,
    logged_in_dates: Vec<NaiveDate>,
}

impl From<ProfileRow> for UserProfileSnapshot {
    fn from(row: ProfileRow) -> Self {
        Self {
            two_factor_enabled: row.two_factor_enabled,
            email_verified: row.email_verified,
            use_password_less_login: row.use_password_less_login,
            birthday: row.birthday,
            logged_in_dates: row.logged_in_dates,
        }
    }
}

/// Negative counters are treated as zero.
fn count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or_default()
}

/// Returns the table and column holding a metric.
fn metric_source(metric: UserMetric) -> (&'static str, &'static str) {
    match metric {
        UserMetric::Followers => ("users", "followers_count"),
        UserMetric::Following => ("users", "following_count"),
        UserMetric::Notes => ("users", "notes_count"),
        UserMetric::LoginDays => (
            "user_profiles",
            "(SELECT COUNT(DISTINCT day) FROM unnest(logged_in_dates) AS day)",
        ),
        UserMetric::DriveUsage => ("user_statistics", "drive_usage"),
        UserMetric::ReactionsSent => ("user_statistics", "reactions_sent"),
        UserMetric::ReactionsReceived => ("user_statistics", "reactions_received"),
        UserMetric::RenotesSent => ("user_statistics", "renotes_sent"),
        UserMetric::RenotesReceived => ("user_statistics", "renotes_received"),
        UserMetric::RepliesSent => ("user_statistics", "replies_sent"),
        UserMetric::RepliesReceived => ("user_statistics", "replies_received"),
        UserMetric::VotesSent => ("user_statistics", "votes_sent"),
        UserMetric::VotesReceived => ("user_statistics", "votes_received"),
    }
}

#[async_trait]
impl UserStatsProvider for PostgresUserStatsProvider {
    async fn find_user(&self, user_id: UserId) -> AppResult<Option<UserSnapshot>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT
                id, username, host, is_bot, is_suspended, is_cat, is_root,
                created_at, updated_at, followers_count, following_count, notes_count
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find user '{user_id}': {error}")))?;

        Ok(row.map(UserSnapshot::from))
    }

    async fn find_profile(&self, user_id: UserId) -> AppResult<Option<UserProfileSnapshot>> {
        let row = sqlx::query_as::<_, ProfileRow>(
            r#"
            SELECT
                two_factor_enabled, email_verified, use_password_less_login,
                birthday, logged_in_dates
            FROM user_profiles
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to find profile of user '{user_id}': {error}"
            ))
        })?;

        Ok(row.map(UserProfileSnapshot::from))
    }

    async fn count_security_keys(&self, user_id: UserId) -> AppResult<u64> {
        let keys = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM user_security_keys WHERE user_id = $1",
        )
        .bind(user_id.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to count security keys of user '{user_id}': {error}"
            ))
        })?;

        Ok(count(keys))
    }

    async fn aggregate(&self, user_id: UserId, metric: UserMetric) -> AppResult<u64> {
        let (table, column) = metric_source(metric);
        let key = if table == "users" { "id" } else { "user_id" };
        let value = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT ({column})::BIGINT FROM {table} WHERE {key} = $1"
        ))
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to aggregate {metric:?} for user '{user_id}': {error}"
            ))
        })?;

        Ok(value.map(count).unwrap_or_default())
    }
}

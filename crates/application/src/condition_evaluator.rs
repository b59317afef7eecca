//! Interpreter for conditional role formulas.
//!
//! Combinators short-circuit in child order. Leaves that need a lookup go
//! through [`UserStatsProvider`]; a failing lookup turns that leaf into
//! `false` and is logged, so a formula always yields a boolean.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rolegate_core::AppError;
use rolegate_domain::{
    AgeBound, AgeSubject, RoleCondition, RoleId, UserFlag, UserMetric, UserProfileSnapshot,
    UserSnapshot,
};
use thiserror::Error;
use tracing::warn;

use crate::role_ports::UserStatsProvider;

type EvaluationFuture<'a> = Pin<Box<dyn Future<Output = bool> + Send + 'a>>;

/// Failure inside a single leaf. Never leaves the evaluator.
#[derive(Debug, Error)]
enum ConditionEvaluationError {
    #[error("user statistics lookup failed: {0}")]
    Lookup(#[from] AppError),
}

/// Per-call state shared by all nodes of one formula.
struct EvaluationContext<'c> {
    user: &'c UserSnapshot,
    manual_roles: &'c HashSet<RoleId>,
    now: DateTime<Utc>,
    profile: Option<Option<UserProfileSnapshot>>,
}

/// Evaluates role formulas against one user.
#[derive(Clone)]
pub struct ConditionEvaluator {
    user_stats: Arc<dyn UserStatsProvider>,
}

impl ConditionEvaluator {
    /// Creates an evaluator reading statistics from `user_stats`.
    #[must_use]
    pub fn new(user_stats: Arc<dyn UserStatsProvider>) -> Self {
        Self { user_stats }
    }

    /// Returns whether `condition` holds for `user` at `now`.
    ///
    /// `manual_roles` are the roles the user holds through active manual
    /// assignments; `roleAssignedTo` leaves test against this set only.
    pub async fn evaluate(
        &self,
        user: &UserSnapshot,
        manual_roles: &HashSet<RoleId>,
        condition: &RoleCondition,
        now: DateTime<Utc>,
    ) -> bool {
        let mut context = EvaluationContext {
            user,
            manual_roles,
            now,
            profile: None,
        };

        self.evaluate_node(&mut context, condition).await
    }

    fn evaluate_node<'a, 'c: 'a>(
        &'a self,
        context: &'a mut EvaluationContext<'c>,
        condition: &'a RoleCondition,
    ) -> EvaluationFuture<'a> {
        Box::pin(async move {
            match condition {
                RoleCondition::And(values) => {
                    for value in values {
                        if !self.evaluate_node(context, value).await {
                            return false;
                        }
                    }
                    true
                }
                RoleCondition::Or(values) => {
                    for value in values {
                        if self.evaluate_node(context, value).await {
                            return true;
                        }
                    }
                    false
                }
                RoleCondition::Not(value) => !self.evaluate_node(context, value).await,
                leaf => {
                    let outcome = self.evaluate_leaf(context, leaf).await;
                    match outcome {
                        Ok(matched) => matched,
                        Err(error) => {
                            warn!(
                                user_id = %context.user.id,
                                condition = leaf.kind(),
                                error = %error,
                                "role condition evaluated to false after a failed lookup"
                            );
                            false
                        }
                    }
                }
            }
        })
    }

    async fn evaluate_leaf(
        &self,
        context: &mut EvaluationContext<'_>,
        condition: &RoleCondition,
    ) -> Result<bool, ConditionEvaluationError> {
        match condition {
            RoleCondition::RoleAssignedTo(role_id) => Ok(context.manual_roles.contains(role_id)),
            RoleCondition::Flag(flag) => self.evaluate_flag(context, *flag).await,
            RoleCondition::Age {
                subject,
                bound,
                seconds,
            } => {
                let since = match subject {
                    AgeSubject::AccountCreated => Some(context.user.created_at),
                    AgeSubject::ProfileUpdated => context.user.updated_at,
                };

                Ok(since.is_some_and(|since| age_matches(*bound, since, context.now, *seconds)))
            }
            RoleCondition::Threshold {
                metric,
                comparison,
                value,
            } => {
                let actual = match metric {
                    UserMetric::Followers => Some(context.user.followers_count),
                    UserMetric::Following => Some(context.user.following_count),
                    UserMetric::Notes => Some(context.user.notes_count),
                    UserMetric::LoginDays => self
                        .profile(context)
                        .await?
                        .map(UserProfileSnapshot::login_day_count),
                    _ => Some(self.user_stats.aggregate(context.user.id, *metric).await?),
                };

                Ok(actual.is_some_and(|actual| comparison.holds(actual, *value)))
            }
            RoleCondition::And(_) | RoleCondition::Or(_) | RoleCondition::Not(_) => Ok(false),
        }
    }

    async fn evaluate_flag(
        &self,
        context: &mut EvaluationContext<'_>,
        flag: UserFlag,
    ) -> Result<bool, ConditionEvaluationError> {
        let user = context.user;
        if !flag.requires_profile() {
            return Ok(match flag {
                UserFlag::IsLocal => user.is_local(),
                UserFlag::IsRemote => user.is_remote(),
                UserFlag::IsBot => user.is_bot,
                UserFlag::IsSuspended => user.is_suspended,
                UserFlag::IsCat => user.is_cat,
                _ => false,
            });
        }

        let today = context.now.date_naive();
        let Some(profile) = self.profile(context).await? else {
            return Ok(false);
        };

        Ok(match flag {
            UserFlag::HasTwoFactorAuth => profile.two_factor_enabled,
            UserFlag::HasEmailVerified => profile.email_verified,
            UserFlag::HasPasswordLessLogin => profile.use_password_less_login,
            UserFlag::Birthday => profile.is_birthday(today),
            UserFlag::HasSecurityKey => {
                profile.two_factor_enabled
                    && self.user_stats.count_security_keys(user.id).await? > 0
            }
            _ => false,
        })
    }

    /// Loads the profile once per formula.
    async fn profile<'p>(
        &self,
        context: &'p mut EvaluationContext<'_>,
    ) -> Result<Option<&'p UserProfileSnapshot>, ConditionEvaluationError> {
        if context.profile.is_none() {
            let profile = self.user_stats.find_profile(context.user.id).await?;
            context.profile = Some(profile);
        }

        Ok(context.profile.as_ref().and_then(Option::as_ref))
    }
}

/// `LessThan` holds strictly below the threshold and `MoreThan` strictly
/// above it, so neither holds at exactly `seconds`.
fn age_matches(bound: AgeBound, since: DateTime<Utc>, now: DateTime<Utc>, seconds: u64) -> bool {
    let elapsed_ms = i128::from((now - since).num_milliseconds());
    let threshold_ms = i128::from(seconds) * 1000;

    match bound {
        AgeBound::LessThan => elapsed_ms < threshold_ms,
        AgeBound::MoreThan => elapsed_ms > threshold_ms,
    }
}

use chrono::{TimeDelta, Utc};
use rolegate_application::RoleRepository;
use rolegate_core::{AppError, NonEmptyString};
use rolegate_domain::{
    Comparison, PolicyName, PolicyOverride, PolicyPriority, PolicyValue, Role, RoleAssignment,
    RoleAssignmentId, RoleCondition, RoleId, RolePolicyOverrides, RoleTarget, UserId, UserMetric,
};
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;

use super::PostgresRoleRepository;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

async fn test_pool() -> Option<PgPool> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        return None;
    };

    let pool = match PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url.as_str())
        .await
    {
        Ok(pool) => pool,
        Err(error) => panic!("failed to connect to DATABASE_URL in test: {error}"),
    };

    if let Err(error) = MIGRATOR.run(&pool).await {
        panic!("failed to run migrations for postgres role tests: {error}");
    }

    Some(pool)
}

fn role(name: &str, target: RoleTarget) -> Role {
    let now = Utc::now();
    let Ok(name) = NonEmptyString::new(name) else {
        panic!("role name should be valid");
    };

    Role {
        id: RoleId::new(),
        name,
        description: "created by postgres tests".to_owned(),
        color: Some("#336699".to_owned()),
        icon_url: None,
        target,
        is_public: true,
        is_moderator: false,
        is_administrator: false,
        is_explorable: true,
        as_badge: false,
        can_edit_members_by_moderator: false,
        display_order: 1,
        policies: RolePolicyOverrides::default(),
        updated_at: now,
        last_used_at: now,
    }
}

fn assignment(user_id: UserId, role_id: RoleId, expires_in: Option<i64>) -> RoleAssignment {
    let now = Utc::now();
    RoleAssignment {
        id: RoleAssignmentId::new(),
        role_id,
        user_id,
        expires_at: expires_in.map(|seconds| now + TimeDelta::seconds(seconds)),
        created_at: now,
    }
}

#[tokio::test]
async fn role_round_trips_condition_and_policies() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresRoleRepository::new(pool);
    let condition = RoleCondition::threshold(UserMetric::Followers, Comparison::MoreThanOrEq, 10);
    let mut stored = role("popular", RoleTarget::Conditional(condition));
    let mut policies = RolePolicyOverrides::default();
    assert!(
        policies
            .insert(
                PolicyName::DriveCapacityMb,
                PolicyOverride::explicit(PolicyPriority::High, PolicyValue::Limit(4096)),
            )
            .is_ok()
    );
    stored.policies = policies;

    assert!(repository.insert_role(stored.clone()).await.is_ok());

    let Ok(Some(loaded)) = repository.find_role(stored.id).await else {
        panic!("inserted role should be found");
    };
    assert_eq!(loaded.target, stored.target);
    assert_eq!(loaded.policies, stored.policies);
    assert_eq!(loaded.name, stored.name);
    assert!(loaded.is_conditional());
}

#[tokio::test]
async fn update_of_missing_role_is_rejected() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresRoleRepository::new(pool);
    let result = repository
        .update_role(role("missing", RoleTarget::Manual))
        .await;
    assert!(matches!(result, Err(AppError::RoleNotFound(_))));
}

#[tokio::test]
async fn duplicate_assignment_maps_unique_violation() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresRoleRepository::new(pool);
    let stored = role("assignable", RoleTarget::Manual);
    assert!(repository.insert_role(stored.clone()).await.is_ok());

    let user_id = UserId::new();
    assert!(
        repository
            .insert_assignment(assignment(user_id, stored.id, None))
            .await
            .is_ok()
    );

    let duplicate = repository
        .insert_assignment(assignment(user_id, stored.id, None))
        .await;
    assert!(matches!(duplicate, Err(AppError::AlreadyAssigned { .. })));

    let unknown_role = repository
        .insert_assignment(assignment(user_id, RoleId::new(), None))
        .await;
    assert!(matches!(unknown_role, Err(AppError::RoleNotFound(_))));
}

#[tokio::test]
async fn deleting_role_cascades_to_assignments() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresRoleRepository::new(pool);
    let stored = role("temporary", RoleTarget::Manual);
    assert!(repository.insert_role(stored.clone()).await.is_ok());

    let user_id = UserId::new();
    assert!(
        repository
            .insert_assignment(assignment(user_id, stored.id, None))
            .await
            .is_ok()
    );

    assert!(repository.delete_role(stored.id).await.is_ok());
    let remaining = repository
        .list_assignments_for_user(user_id)
        .await
        .unwrap_or_default();
    assert!(remaining.is_empty());
    assert!(matches!(
        repository.delete_role(stored.id).await,
        Err(AppError::RoleNotFound(_))
    ));
}

#[tokio::test]
async fn expired_assignments_are_listed_until_deleted() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresRoleRepository::new(pool);
    let stored = role("expiring", RoleTarget::Manual);
    assert!(repository.insert_role(stored.clone()).await.is_ok());

    let expired_user = UserId::new();
    let active_user = UserId::new();
    let expired = assignment(expired_user, stored.id, Some(-60));
    let active = assignment(active_user, stored.id, Some(3600));
    assert!(repository.insert_assignment(expired.clone()).await.is_ok());
    assert!(repository.insert_assignment(active.clone()).await.is_ok());

    let listed = repository
        .list_expired_assignments(Utc::now(), 1_000)
        .await
        .unwrap_or_default();
    assert!(listed.iter().any(|value| value.id == expired.id));
    assert!(!listed.iter().any(|value| value.id == active.id));

    assert!(matches!(
        repository.delete_assignment(expired.id).await,
        Ok(true)
    ));
    assert!(matches!(
        repository.delete_assignment(expired.id).await,
        Ok(false)
    ));

    let by_role = repository
        .list_assignments_for_roles(&[stored.id])
        .await
        .unwrap_or_default();
    assert_eq!(by_role.len(), 1);
    assert_eq!(by_role[0].user_id, active_user);
}

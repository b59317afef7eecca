use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::{Mutex, Notify};

use rolegate_core::{AppResult, NonEmptyString};
use rolegate_domain::{
    Role, RoleAssignment, RoleAssignmentId, RoleId, RolePolicyOverrides, RoleTarget, UserId,
};

use crate::role_ports::{RoleEvent, RoleRepository};

use super::{RoleCache, RoleCacheConfig};

/// Holds one user's assignment load until released.
struct LoadGate {
    user_id: UserId,
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

#[derive(Default)]
struct FakeRoleRepository {
    roles: Mutex<Vec<Role>>,
    assignments: Mutex<Vec<RoleAssignment>>,
    role_loads: Mutex<usize>,
    assignment_loads: Mutex<usize>,
    gate: Mutex<Option<LoadGate>>,
}

impl FakeRoleRepository {
    async fn hold_loads_for(&self, user_id: UserId) -> (Arc<Notify>, Arc<Notify>) {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        *self.gate.lock().await = Some(LoadGate {
            user_id,
            entered: Arc::clone(&entered),
            release: Arc::clone(&release),
        });
        (entered, release)
    }
}

#[async_trait]
impl RoleRepository for FakeRoleRepository {
    async fn list_roles(&self) -> AppResult<Vec<Role>> {
        *self.role_loads.lock().await += 1;
        Ok(self.roles.lock().await.clone())
    }

    async fn find_role(&self, role_id: RoleId) -> AppResult<Option<Role>> {
        Ok(self
            .roles
            .lock()
            .await
            .iter()
            .find(|role| role.id == role_id)
            .cloned())
    }

    async fn insert_role(&self, role: Role) -> AppResult<()> {
        self.roles.lock().await.push(role);
        Ok(())
    }

    async fn update_role(&self, _role: Role) -> AppResult<()> {
        Ok(())
    }

    async fn delete_role(&self, _role_id: RoleId) -> AppResult<()> {
        Ok(())
    }

    async fn touch_role_last_used(
        &self,
        _role_id: RoleId,
        _used_at: DateTime<Utc>,
    ) -> AppResult<()> {
        Ok(())
    }

    async fn list_assignments_for_user(&self, user_id: UserId) -> AppResult<Vec<RoleAssignment>> {
        *self.assignment_loads.lock().await += 1;
        let loaded: Vec<RoleAssignment> = self
            .assignments
            .lock()
            .await
            .iter()
            .filter(|assignment| assignment.user_id == user_id)
            .cloned()
            .collect();

        let gate = self
            .gate
            .lock()
            .await
            .as_ref()
            .filter(|gate| gate.user_id == user_id)
            .map(|gate| (Arc::clone(&gate.entered), Arc::clone(&gate.release)));
        if let Some((entered, release)) = gate {
            entered.notify_one();
            release.notified().await;
        }

        Ok(loaded)
    }

    async fn find_assignment(
        &self,
        _user_id: UserId,
        _role_id: RoleId,
    ) -> AppResult<Option<RoleAssignment>> {
        Ok(None)
    }

    async fn insert_assignment(&self, assignment: RoleAssignment) -> AppResult<()> {
        self.assignments.lock().await.push(assignment);
        Ok(())
    }

    async fn delete_assignment(&self, _assignment_id: RoleAssignmentId) -> AppResult<bool> {
        Ok(false)
    }

    async fn list_assignments_for_roles(
        &self,
        _role_ids: &[RoleId],
    ) -> AppResult<Vec<RoleAssignment>> {
        Ok(Vec::new())
    }

    async fn list_expired_assignments(
        &self,
        _now: DateTime<Utc>,
        _limit: usize,
    ) -> AppResult<Vec<RoleAssignment>> {
        Ok(Vec::new())
    }
}

fn role(name: &str) -> Role {
    let now = Utc::now();
    Role {
        id: RoleId::new(),
        name: NonEmptyString::new(name).unwrap_or_else(|_| panic!("role name must be valid")),
        description: String::new(),
        color: None,
        icon_url: None,
        target: RoleTarget::Manual,
        is_public: false,
        is_moderator: false,
        is_administrator: false,
        is_explorable: false,
        as_badge: false,
        can_edit_members_by_moderator: false,
        display_order: 0,
        policies: RolePolicyOverrides::default(),
        updated_at: now,
        last_used_at: now,
    }
}

fn assignment(user_id: UserId, role_id: RoleId) -> RoleAssignment {
    RoleAssignment {
        id: RoleAssignmentId::new(),
        role_id,
        user_id,
        expires_at: None,
        created_at: Utc::now(),
    }
}

fn cache(repository: Arc<FakeRoleRepository>) -> RoleCache {
    RoleCache::new(repository, RoleCacheConfig::with_ttl(Duration::from_secs(60)))
}

#[tokio::test(start_paused = true)]
async fn role_snapshot_is_reused_until_ttl_expires() {
    let repository = Arc::new(FakeRoleRepository::default());
    repository.roles.lock().await.push(role("staff"));
    let cache = cache(repository.clone());

    assert_eq!(cache.roles().await.map(|roles| roles.len()).unwrap_or(0), 1);
    assert!(cache.roles().await.is_ok());
    assert_eq!(*repository.role_loads.lock().await, 1);

    tokio::time::advance(Duration::from_secs(61)).await;
    assert!(cache.roles().await.is_ok());
    assert_eq!(*repository.role_loads.lock().await, 2);
}

#[tokio::test]
async fn duplicate_role_update_is_idempotent() {
    let repository = Arc::new(FakeRoleRepository::default());
    let original = role("staff");
    repository.roles.lock().await.push(original.clone());
    let cache = cache(repository);
    assert!(cache.roles().await.is_ok());

    let mut updated = original.clone();
    updated.name = NonEmptyString::new("moderators").unwrap_or_else(|_| panic!("valid name"));
    updated.updated_at = original.updated_at + TimeDelta::seconds(1);
    let event = RoleEvent::RoleUpdated(updated.clone());

    cache.apply(&event).await;
    let once = cache.roles().await.map(|roles| roles.as_ref().clone());
    cache.apply(&event).await;
    let twice = cache.roles().await.map(|roles| roles.as_ref().clone());

    assert!(once.is_ok());
    assert_eq!(once.ok(), twice.ok());
    assert_eq!(
        cache.roles().await.ok().map(|roles| roles.as_ref().clone()),
        Some(vec![updated])
    );
}

#[tokio::test]
async fn stale_role_update_does_not_overwrite_newer_snapshot() {
    let repository = Arc::new(FakeRoleRepository::default());
    let current = role("staff");
    repository.roles.lock().await.push(current.clone());
    let cache = cache(repository);
    assert!(cache.roles().await.is_ok());

    let mut stale = current.clone();
    stale.is_moderator = true;
    stale.updated_at = current.updated_at - TimeDelta::seconds(5);
    cache.apply(&RoleEvent::RoleUpdated(stale)).await;

    let roles = cache.roles().await.unwrap_or_default();
    assert_eq!(roles.as_ref(), &vec![current]);
}

#[tokio::test]
async fn role_events_patch_warm_snapshot_by_id() {
    let repository = Arc::new(FakeRoleRepository::default());
    let kept = role("kept");
    let removed = role("removed");
    repository
        .roles
        .lock()
        .await
        .extend([kept.clone(), removed.clone()]);
    let cache = cache(repository.clone());
    let before = cache.roles().await.unwrap_or_default();

    let created = role("created");
    cache.apply(&RoleEvent::RoleCreated(created.clone())).await;
    cache.apply(&RoleEvent::RoleCreated(created.clone())).await;
    cache.apply(&RoleEvent::RoleDeleted(removed.clone())).await;
    cache.apply(&RoleEvent::RoleDeleted(removed)).await;

    let after = cache.roles().await.unwrap_or_default();
    assert_eq!(after.as_ref(), &vec![kept, created]);
    assert_eq!(before.len(), 2);
    assert_eq!(*repository.role_loads.lock().await, 1);
}

#[tokio::test]
async fn update_for_unknown_role_is_ignored() {
    let repository = Arc::new(FakeRoleRepository::default());
    let cache = cache(repository);
    assert!(cache.roles().await.is_ok());

    cache.apply(&RoleEvent::RoleUpdated(role("ghost"))).await;
    assert!(cache.roles().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn events_on_cold_cache_are_dropped() {
    let repository = Arc::new(FakeRoleRepository::default());
    let stored = role("stored");
    repository.roles.lock().await.push(stored.clone());
    let cache = cache(repository.clone());
    let user_id = UserId::new();

    cache.apply(&RoleEvent::RoleCreated(role("unpersisted"))).await;
    cache
        .apply(&RoleEvent::UserRoleAssigned(assignment(user_id, stored.id)))
        .await;

    assert_eq!(
        cache.roles().await.unwrap_or_default().as_ref(),
        &vec![stored]
    );
    assert!(cache.user_assignments(user_id).await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn assignment_events_patch_warm_user_lists() {
    let repository = Arc::new(FakeRoleRepository::default());
    let cache = cache(repository.clone());
    let user_id = UserId::new();
    let other_user = UserId::new();
    assert!(cache.user_assignments(user_id).await.is_ok());

    let granted = assignment(user_id, RoleId::new());
    cache.apply(&RoleEvent::UserRoleAssigned(granted.clone())).await;
    cache.apply(&RoleEvent::UserRoleAssigned(granted.clone())).await;
    cache
        .apply(&RoleEvent::UserRoleAssigned(assignment(other_user, RoleId::new())))
        .await;

    let held = cache.user_assignments(user_id).await.unwrap_or_default();
    assert_eq!(held.as_ref(), &vec![granted.clone()]);

    cache.apply(&RoleEvent::UserRoleUnassigned(granted.clone())).await;
    cache.apply(&RoleEvent::UserRoleUnassigned(granted)).await;
    assert!(cache.user_assignments(user_id).await.unwrap_or_default().is_empty());
    assert_eq!(*repository.assignment_loads.lock().await, 1);
}

#[tokio::test]
async fn reassignment_replaces_previous_row_for_same_role() {
    let repository = Arc::new(FakeRoleRepository::default());
    let cache = cache(repository);
    let user_id = UserId::new();
    let role_id = RoleId::new();
    assert!(cache.user_assignments(user_id).await.is_ok());

    let first = assignment(user_id, role_id);
    let second = assignment(user_id, role_id);
    cache.apply(&RoleEvent::UserRoleAssigned(first)).await;
    cache.apply(&RoleEvent::UserRoleAssigned(second.clone())).await;

    let held = cache.user_assignments(user_id).await.unwrap_or_default();
    assert_eq!(held.as_ref(), &vec![second]);
}

#[tokio::test]
async fn late_event_for_older_row_keeps_newer_assignment() {
    let repository = Arc::new(FakeRoleRepository::default());
    let cache = cache(repository);
    let user_id = UserId::new();
    let role_id = RoleId::new();
    assert!(cache.user_assignments(user_id).await.is_ok());

    let mut older = assignment(user_id, role_id);
    older.created_at = Utc::now() - TimeDelta::seconds(10);
    let newer = assignment(user_id, role_id);
    cache.apply(&RoleEvent::UserRoleAssigned(newer.clone())).await;
    cache.apply(&RoleEvent::UserRoleAssigned(older)).await;
    cache.apply(&RoleEvent::UserRoleAssigned(newer.clone())).await;

    let held = cache.user_assignments(user_id).await.unwrap_or_default();
    assert_eq!(held.as_ref(), &vec![newer]);
}

#[tokio::test]
async fn slow_load_does_not_block_other_readers() {
    let repository = Arc::new(FakeRoleRepository::default());
    let cache = Arc::new(cache(repository.clone()));
    let warm_user = UserId::new();
    let slow_user = UserId::new();
    assert!(cache.user_assignments(warm_user).await.is_ok());

    let (entered, release) = repository.hold_loads_for(slow_user).await;
    let loading = tokio::spawn({
        let cache = Arc::clone(&cache);
        async move { cache.user_assignments(slow_user).await }
    });
    entered.notified().await;

    let limit = Duration::from_secs(1);
    let warm = tokio::time::timeout(limit, cache.user_assignments(warm_user)).await;
    assert!(matches!(warm, Ok(Ok(_))));
    let cold = tokio::time::timeout(limit, cache.user_assignments(UserId::new())).await;
    assert!(matches!(cold, Ok(Ok(_))));
    let roles = tokio::time::timeout(limit, cache.roles()).await;
    assert!(matches!(roles, Ok(Ok(_))));

    release.notify_one();
    assert!(matches!(loading.await, Ok(Ok(_))));
}

#[tokio::test]
async fn load_overlapping_an_event_is_not_cached() {
    let repository = Arc::new(FakeRoleRepository::default());
    let cache = Arc::new(cache(repository.clone()));
    let user_id = UserId::new();

    let (entered, release) = repository.hold_loads_for(user_id).await;
    let loading = tokio::spawn({
        let cache = Arc::clone(&cache);
        async move { cache.user_assignments(user_id).await }
    });
    entered.notified().await;

    let granted = assignment(user_id, RoleId::new());
    repository.assignments.lock().await.push(granted.clone());
    cache.apply(&RoleEvent::UserRoleAssigned(granted.clone())).await;
    *repository.gate.lock().await = None;
    release.notify_one();

    let Ok(Ok(stale)) = loading.await else {
        panic!("overlapping load should still return");
    };
    assert!(stale.is_empty());

    let held = cache.user_assignments(user_id).await.unwrap_or_default();
    assert_eq!(held.as_ref(), &vec![granted]);
    assert_eq!(*repository.assignment_loads.lock().await, 2);
}

#[tokio::test]
async fn readers_keep_their_snapshot_across_updates() {
    let repository = Arc::new(FakeRoleRepository::default());
    repository.roles.lock().await.push(role("first"));
    let cache = cache(repository);

    let snapshot = cache.roles().await.unwrap_or_default();
    cache.apply(&RoleEvent::RoleCreated(role("second"))).await;

    assert_eq!(snapshot.len(), 1);
    assert_eq!(cache.roles().await.map(|roles| roles.len()).unwrap_or(0), 2);
}

#[tokio::test(start_paused = true)]
async fn prune_evicts_expired_user_lists() {
    let repository = Arc::new(FakeRoleRepository::default());
    let cache = cache(repository.clone());
    let stale_user = UserId::new();
    assert!(cache.user_assignments(stale_user).await.is_ok());

    tokio::time::advance(Duration::from_secs(45)).await;
    let fresh_user = UserId::new();
    assert!(cache.user_assignments(fresh_user).await.is_ok());

    tokio::time::advance(Duration::from_secs(30)).await;
    assert_eq!(cache.prune().await, 1);

    assert!(cache.user_assignments(fresh_user).await.is_ok());
    assert_eq!(*repository.assignment_loads.lock().await, 2);
}

#[tokio::test]
async fn clear_forces_reload() {
    let repository = Arc::new(FakeRoleRepository::default());
    let cache = cache(repository.clone());
    let user_id = UserId::new();
    assert!(cache.roles().await.is_ok());
    assert!(cache.user_assignments(user_id).await.is_ok());

    cache.clear().await;
    assert!(cache.roles().await.is_ok());
    assert!(cache.user_assignments(user_id).await.is_ok());

    assert_eq!(*repository.role_loads.lock().await, 2);
    assert_eq!(*repository.assignment_loads.lock().await, 2);
}

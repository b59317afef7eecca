use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rolegate_application::RoleRepository;
use rolegate_core::{AppError, AppResult};
use rolegate_domain::{Role, RoleAssignment, RoleAssignmentId, RoleId, UserId};
use tokio::sync::RwLock;

/// In-memory role repository implementation.
///
/// Roles are listed in insertion order.
#[derive(Debug, Default)]
pub struct InMemoryRoleRepository {
    roles: RwLock<Vec<Role>>,
    assignments: RwLock<HashMap<RoleAssignmentId, RoleAssignment>>,
}

impl InMemoryRoleRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self {
            roles: RwLock::new(Vec::new()),
            assignments: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl RoleRepository for InMemoryRoleRepository {
    async fn list_roles(&self) -> AppResult<Vec<Role>> {
        Ok(self.roles.read().await.clone())
    }

    async fn find_role(&self, role_id: RoleId) -> AppResult<Option<Role>> {
        let roles = self.roles.read().await;
        Ok(roles.iter().find(|role| role.id == role_id).cloned())
    }

    async fn insert_role(&self, role: Role) -> AppResult<()> {
        let mut roles = self.roles.write().await;
        if roles.iter().any(|existing| existing.id == role.id) {
            return Err(AppError::Conflict(format!(
                "role '{}' already exists",
                role.id
            )));
        }

        roles.push(role);
        Ok(())
    }

    async fn update_role(&self, role: Role) -> AppResult<()> {
        let mut roles = self.roles.write().await;
        let existing = roles
            .iter_mut()
            .find(|existing| existing.id == role.id)
            .ok_or_else(|| AppError::RoleNotFound(role.id.to_string()))?;

        *existing = role;
        Ok(())
    }

    async fn delete_role(&self, role_id: RoleId) -> AppResult<()> {
        let mut roles = self.roles.write().await;
        let before = roles.len();
        roles.retain(|role| role.id != role_id);
        if roles.len() == before {
            return Err(AppError::RoleNotFound(role_id.to_string()));
        }

        self.assignments
            .write()
            .await
            .retain(|_, assignment| assignment.role_id != role_id);
        Ok(())
    }

    async fn touch_role_last_used(
        &self,
        role_id: RoleId,
        used_at: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut roles = self.roles.write().await;
        if let Some(role) = roles.iter_mut().find(|role| role.id == role_id) {
            role.last_used_at = used_at;
        }

        Ok(())
    }

    async fn list_assignments_for_user(&self, user_id: UserId) -> AppResult<Vec<RoleAssignment>> {
        let assignments = self.assignments.read().await;
        let mut values: Vec<RoleAssignment> = assignments
            .values()
            .filter(|assignment| assignment.user_id == user_id)
            .cloned()
            .collect();
        values.sort_by_key(|assignment| assignment.created_at);

        Ok(values)
    }

    async fn find_assignment(
        &self,
        user_id: UserId,
        role_id: RoleId,
    ) -> AppResult<Option<RoleAssignment>> {
        let assignments = self.assignments.read().await;
        Ok(assignments
            .values()
            .find(|assignment| assignment.user_id == user_id && assignment.role_id == role_id)
            .cloned())
    }

    async fn insert_assignment(&self, assignment: RoleAssignment) -> AppResult<()> {
        let mut assignments = self.assignments.write().await;
        let duplicate = assignments.values().any(|existing| {
            existing.user_id == assignment.user_id && existing.role_id == assignment.role_id
        });
        if duplicate {
            return Err(AppError::AlreadyAssigned {
                role_id: assignment.role_id.to_string(),
                user_id: assignment.user_id.to_string(),
            });
        }

        assignments.insert(assignment.id, assignment);
        Ok(())
    }

    async fn delete_assignment(&self, assignment_id: RoleAssignmentId) -> AppResult<bool> {
        Ok(self
            .assignments
            .write()
            .await
            .remove(&assignment_id)
            .is_some())
    }

    async fn list_assignments_for_roles(
        &self,
        role_ids: &[RoleId],
    ) -> AppResult<Vec<RoleAssignment>> {
        let assignments = self.assignments.read().await;
        Ok(assignments
            .values()
            .filter(|assignment| role_ids.contains(&assignment.role_id))
            .cloned()
            .collect())
    }

    async fn list_expired_assignments(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> AppResult<Vec<RoleAssignment>> {
        let assignments = self.assignments.read().await;
        let mut expired: Vec<RoleAssignment> = assignments
            .values()
            .filter(|assignment| assignment.is_expired_at(now))
            .cloned()
            .collect();
        expired.sort_by_key(|assignment| (assignment.expires_at, assignment.id));
        expired.truncate(limit);

        Ok(expired)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeDelta, Utc};
    use rolegate_application::RoleRepository;
    use rolegate_core::{AppError, NonEmptyString};
    use rolegate_domain::{
        Role, RoleAssignment, RoleAssignmentId, RoleId, RolePolicyOverrides, RoleTarget, UserId,
    };

    use super::InMemoryRoleRepository;

    fn role(name: &str) -> Role {
        let now = Utc::now();
        Role {
            id: RoleId::new(),
            name: NonEmptyString::new(name).unwrap_or_else(|_| unreachable!()),
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
    async fn update_of_missing_role_is_rejected() {
        let repository = InMemoryRoleRepository::new();
        let result = repository.update_role(role("ghost")).await;
        assert!(matches!(result, Err(AppError::RoleNotFound(_))));
    }

    #[tokio::test]
    async fn duplicate_assignment_is_rejected() {
        let repository = InMemoryRoleRepository::new();
        let moderators = role("moderators");
        let role_id = moderators.id;
        assert!(repository.insert_role(moderators).await.is_ok());

        let user_id = UserId::new();
        assert!(
            repository
                .insert_assignment(assignment(user_id, role_id, None))
                .await
                .is_ok()
        );

        let duplicate = repository
            .insert_assignment(assignment(user_id, role_id, None))
            .await;
        assert!(matches!(duplicate, Err(AppError::AlreadyAssigned { .. })));
    }

    #[tokio::test]
    async fn deleting_a_role_removes_its_assignments() {
        let repository = InMemoryRoleRepository::new();
        let kept = role("kept");
        let dropped = role("dropped");
        let (kept_id, dropped_id) = (kept.id, dropped.id);
        assert!(repository.insert_role(kept).await.is_ok());
        assert!(repository.insert_role(dropped).await.is_ok());

        let user_id = UserId::new();
        for role_id in [kept_id, dropped_id] {
            assert!(
                repository
                    .insert_assignment(assignment(user_id, role_id, None))
                    .await
                    .is_ok()
            );
        }

        assert!(repository.delete_role(dropped_id).await.is_ok());

        let remaining = repository
            .list_assignments_for_user(user_id)
            .await
            .unwrap_or_default();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].role_id, kept_id);
        assert!(matches!(
            repository.delete_role(dropped_id).await,
            Err(AppError::RoleNotFound(_))
        ));
    }

    #[tokio::test]
    async fn expired_assignments_are_listed_oldest_first_up_to_limit() {
        let repository = InMemoryRoleRepository::new();
        let user_id = UserId::new();
        let mut role_ids = Vec::new();
        for name in ["a", "b", "c", "d"] {
            let value = role(name);
            role_ids.push(value.id);
            assert!(repository.insert_role(value).await.is_ok());
        }

        let oldest = assignment(user_id, role_ids[0], Some(-300));
        let older = assignment(user_id, role_ids[1], Some(-60));
        let active = assignment(user_id, role_ids[2], Some(3600));
        let permanent = assignment(user_id, role_ids[3], None);
        for value in [&older, &active, &permanent, &oldest] {
            assert!(repository.insert_assignment(value.clone()).await.is_ok());
        }

        let expired = repository
            .list_expired_assignments(Utc::now(), 10)
            .await
            .unwrap_or_default();
        let ids: Vec<RoleAssignmentId> = expired.iter().map(|value| value.id).collect();
        assert_eq!(ids, vec![oldest.id, older.id]);

        let limited = repository
            .list_expired_assignments(Utc::now(), 1)
            .await
            .unwrap_or_default();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].id, oldest.id);
    }

    #[tokio::test]
    async fn touch_updates_last_used_timestamp() {
        let repository = InMemoryRoleRepository::new();
        let value = role("touched");
        let role_id = value.id;
        assert!(repository.insert_role(value).await.is_ok());

        let used_at = Utc::now() + TimeDelta::minutes(5);
        assert!(
            repository
                .touch_role_last_used(role_id, used_at)
                .await
                .is_ok()
        );

        let stored = repository.find_role(role_id).await.ok().flatten();
        assert_eq!(stored.map(|role| role.last_used_at), Some(used_at));
    }
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rolegate_core::AppResult;
use rolegate_domain::{Role, RoleAssignment, RoleAssignmentId, RoleId, UserId};

/// Repository port for role definitions and manual assignments.
#[async_trait]
pub trait RoleRepository: Send + Sync {
    /// Lists every role definition.
    async fn list_roles(&self) -> AppResult<Vec<Role>>;

    /// Returns one role by id.
    async fn find_role(&self, role_id: RoleId) -> AppResult<Option<Role>>;

    /// Inserts a new role definition.
    async fn insert_role(&self, role: Role) -> AppResult<()>;

    /// Replaces an existing role definition.
    ///
    /// Returns [`rolegate_core::AppError::RoleNotFound`] when the role is missing.
    async fn update_role(&self, role: Role) -> AppResult<()>;

    /// Deletes a role definition together with its assignments.
    async fn delete_role(&self, role_id: RoleId) -> AppResult<()>;

    /// Updates the last-used timestamp of a role.
    async fn touch_role_last_used(
        &self,
        role_id: RoleId,
        used_at: DateTime<Utc>,
    ) -> AppResult<()>;

    /// Lists raw assignments of one user, expired rows included.
    async fn list_assignments_for_user(&self, user_id: UserId) -> AppResult<Vec<RoleAssignment>>;

    /// Returns the assignment row for one (user, role) pair.
    async fn find_assignment(
        &self,
        user_id: UserId,
        role_id: RoleId,
    ) -> AppResult<Option<RoleAssignment>>;

    /// Inserts an assignment.
    ///
    /// The (user, role) pair is unique. A concurrent duplicate fails with
    /// [`rolegate_core::AppError::AlreadyAssigned`].
    async fn insert_assignment(&self, assignment: RoleAssignment) -> AppResult<()>;

    /// Deletes one assignment. Returns whether a row was removed.
    async fn delete_assignment(&self, assignment_id: RoleAssignmentId) -> AppResult<bool>;

    /// Lists raw assignments for any of the given roles.
    async fn list_assignments_for_roles(
        &self,
        role_ids: &[RoleId],
    ) -> AppResult<Vec<RoleAssignment>>;

    /// Lists up to `limit` assignments with `expires_at <= now`, oldest first.
    async fn list_expired_assignments(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> AppResult<Vec<RoleAssignment>>;
}

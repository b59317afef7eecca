use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use rolegate_application::RoleRepository;
use rolegate_core::{AppError, AppResult, NonEmptyString};
use rolegate_domain::{
    Role, RoleAssignment, RoleAssignmentId, RoleId, RolePolicyOverrides, RoleTarget, UserId,
};

/// PostgreSQL-backed repository for role definitions and assignments.
#[derive(Clone)]
pub struct PostgresRoleRepository {
    pool: PgPool,
}

impl PostgresRoleRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct RoleRow {
    id: Uuid,
    name: String,
    description: String,
    color: Option<String>,
    icon_url: Option<String>,
    target: Json<RoleTarget>,
    is_public: bool,
    is_moderator: bool,
    is_administrator: bool,
    is_explorable: bool,
    as_badge: bool,
    can_edit_members_by_moderator: bool,
    display_order: i32,
    policies: Json<RolePolicyOverrides>,
    updated_at: DateTime<Utc>,
    last_used_at: DateTime<Utc>,
}

impl TryFrom<RoleRow> for Role {
    type Error = AppError;

    fn try_from(row: RoleRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: RoleId::from_uuid(row.id),
            name: NonEmptyString::new(row.name)?,
            description: row.description,
            color: row.color,
            icon_url: row.icon_url,
            target: row.target.0,
            is_public: row.is_public,
            is_moderator: row.is_moderator,
            is_administrator: row.is_administrator,
            is_explorable: row.is_explorable,
            as_badge: row.as_badge,
            can_edit_members_by_moderator: row.can_edit_members_by_moderator,
            display_order: row.display_order,
            policies: row.policies.0,
            updated_at: row.updated_at,
            last_used_at: row.last_used_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct AssignmentRow {
    id: Uuid,
    role_id: Uuid,
    user_id: Uuid,
    expires_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<AssignmentRow> for RoleAssignment {
    fn from(row: AssignmentRow) -> Self {
        Self {
            id: RoleAssignmentId::from_uuid(row.id),
            role_id: RoleId::from_uuid(row.role_id),
            user_id: UserId::from_uuid(row.user_id),
            expires_at: row.expires_at,
            created_at: row.created_at,
        }
    }
}

const ROLE_COLUMNS: &str = r#"
    id, name, description, color, icon_url, target, is_public, is_moderator,
    is_administrator, is_explorable, as_badge, can_edit_members_by_moderator,
    display_order, policies, updated_at, last_used_at
"#;

#[async_trait]
impl RoleRepository for PostgresRoleRepository {
    async fn list_roles(&self) -> AppResult<Vec<Role>> {
        let rows = sqlx::query_as::<_, RoleRow>(&format!(
            "SELECT {ROLE_COLUMNS} FROM roles ORDER BY display_order DESC, id"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list roles: {error}")))?;

        rows.into_iter().map(Role::try_from).collect()
    }

    async fn find_role(&self, role_id: RoleId) -> AppResult<Option<Role>> {
        let row = sqlx::query_as::<_, RoleRow>(&format!(
            "SELECT {ROLE_COLUMNS} FROM roles WHERE id = $1"
        ))
        .bind(role_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to find role '{role_id}': {error}"))
        })?;

        row.map(Role::try_from).transpose()
    }

    async fn insert_role(&self, role: Role) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO roles (
                id, name, description, color, icon_url, target, is_public, is_moderator,
                is_administrator, is_explorable, as_badge, can_edit_members_by_moderator,
                display_order, policies, updated_at, last_used_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(role.id.as_uuid())
        .bind(role.name.as_str())
        .bind(role.description.as_str())
        .bind(role.color.as_deref())
        .bind(role.icon_url.as_deref())
        .bind(Json(&role.target))
        .bind(role.is_public)
        .bind(role.is_moderator)
        .bind(role.is_administrator)
        .bind(role.is_explorable)
        .bind(role.as_badge)
        .bind(role.can_edit_members_by_moderator)
        .bind(role.display_order)
        .bind(Json(&role.policies))
        .bind(role.updated_at)
        .bind(role.last_used_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(error) => {
                if let sqlx::Error::Database(database_error) = &error
                    && database_error.code().as_deref() == Some("23505")
                {
                    return Err(AppError::Conflict(format!(
                        "role '{}' already exists",
                        role.id
                    )));
                }

                Err(AppError::Internal(format!(
                    "failed to insert role '{}': {error}",
                    role.id
                )))
            }
        }
    }

    async fn update_role(&self, role: Role) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE roles
            SET name = $2,
                description = $3,
                color = $4,
                icon_url = $5,
                target = $6,
                is_public = $7,
                is_moderator = $8,
                is_administrator = $9,
                is_explorable = $10,
                as_badge = $11,
                can_edit_members_by_moderator = $12,
                display_order = $13,
                policies = $14,
                updated_at = $15,
                last_used_at = $16
            WHERE id = $1
            "#,
        )
        .bind(role.id.as_uuid())
        .bind(role.name.as_str())
        .bind(role.description.as_str())
        .bind(role.color.as_deref())
        .bind(role.icon_url.as_deref())
        .bind(Json(&role.target))
        .bind(role.is_public)
        .bind(role.is_moderator)
        .bind(role.is_administrator)
        .bind(role.is_explorable)
        .bind(role.as_badge)
        .bind(role.can_edit_members_by_moderator)
        .bind(role.display_order)
        .bind(Json(&role.policies))
        .bind(role.updated_at)
        .bind(role.last_used_at)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to update role '{}': {error}", role.id))
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::RoleNotFound(role.id.to_string()));
        }

        Ok(())
    }

    async fn delete_role(&self, role_id: RoleId) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(role_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to delete role '{role_id}': {error}"))
            })?;

        if result.rows_affected() == 0 {
            return Err(AppError::RoleNotFound(role_id.to_string()));
        }

        Ok(())
    }

    async fn touch_role_last_used(
        &self,
        role_id: RoleId,
        used_at: DateTime<Utc>,
    ) -> AppResult<()> {
        sqlx::query("UPDATE roles SET last_used_at = $2 WHERE id = $1")
            .bind(role_id.as_uuid())
            .bind(used_at)
            .execute(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to update last use of role '{role_id}': {error}"
                ))
            })?;

        Ok(())
    }

    async fn list_assignments_for_user(&self, user_id: UserId) -> AppResult<Vec<RoleAssignment>> {
        let rows = sqlx::query_as::<_, AssignmentRow>(
            r#"
            SELECT id, role_id, user_id, expires_at, created_at
            FROM role_assignments
            WHERE user_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to list role assignments for user '{user_id}': {error}"
            ))
        })?;

        Ok(rows.into_iter().map(RoleAssignment::from).collect())
    }

    async fn find_assignment(
        &self,
        user_id: UserId,
        role_id: RoleId,
    ) -> AppResult<Option<RoleAssignment>> {
        let row = sqlx::query_as::<_, AssignmentRow>(
            r#"
            SELECT id, role_id, user_id, expires_at, created_at
            FROM role_assignments
            WHERE user_id = $1 AND role_id = $2
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(role_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to find assignment of role '{role_id}' to user '{user_id}': {error}"
            ))
        })?;

        Ok(row.map(RoleAssignment::from))
    }

    async fn insert_assignment(&self, assignment: RoleAssignment) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO role_assignments (id, role_id, user_id, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(assignment.id.as_uuid())
        .bind(assignment.role_id.as_uuid())
        .bind(assignment.user_id.as_uuid())
        .bind(assignment.expires_at)
        .bind(assignment.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(error) => {
                if let sqlx::Error::Database(database_error) = &error {
                    match database_error.code().as_deref() {
                        Some("23505") => {
                            return Err(AppError::AlreadyAssigned {
                                role_id: assignment.role_id.to_string(),
                                user_id: assignment.user_id.to_string(),
                            });
                        }
                        Some("23503") => {
                            return Err(AppError::RoleNotFound(assignment.role_id.to_string()));
                        }
                        _ => {}
                    }
                }

                Err(AppError::Internal(format!(
                    "failed to insert assignment of role '{}' to user '{}': {error}",
                    assignment.role_id, assignment.user_id
                )))
            }
        }
    }

    async fn delete_assignment(&self, assignment_id: RoleAssignmentId) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM role_assignments WHERE id = $1")
            .bind(assignment_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to delete role assignment '{assignment_id}': {error}"
                ))
            })?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_assignments_for_roles(
        &self,
        role_ids: &[RoleId],
    ) -> AppResult<Vec<RoleAssignment>> {
        if role_ids.is_empty() {
            return Ok(Vec::new());
        }

        let role_uuids: Vec<Uuid> = role_ids.iter().map(RoleId::as_uuid).collect();
        let rows = sqlx::query_as::<_, AssignmentRow>(
            r#"
            SELECT id, role_id, user_id, expires_at, created_at
            FROM role_assignments
            WHERE role_id = ANY($1)
            "#,
        )
        .bind(role_uuids)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list assignments for roles: {error}"))
        })?;

        Ok(rows.into_iter().map(RoleAssignment::from).collect())
    }

    async fn list_expired_assignments(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> AppResult<Vec<RoleAssignment>> {
        let rows = sqlx::query_as::<_, AssignmentRow>(
            r#"
            SELECT id, role_id, user_id, expires_at, created_at
            FROM role_assignments
            WHERE expires_at IS NOT NULL AND expires_at <= $1
            ORDER BY expires_at, id
            LIMIT $2
            "#,
        )
        .bind(now)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list expired role assignments: {error}"))
        })?;

        Ok(rows.into_iter().map(RoleAssignment::from).collect())
    }
}

#[cfg(test)]
mod tests;

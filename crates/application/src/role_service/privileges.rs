use super::*;

impl RoleService {
    /// Returns whether the actor has moderator or administrator privileges.
    pub async fn is_moderator(&self, actor: Option<&Actor>) -> AppResult<bool> {
        let Some(actor) = actor else {
            return Ok(false);
        };
        if actor.is_root {
            return Ok(true);
        }

        let roles = self.get_user_roles(actor.user_id).await?;
        Ok(roles.iter().any(Role::grants_moderation))
    }

    /// Returns whether the actor has administrator privileges.
    pub async fn is_administrator(&self, actor: Option<&Actor>) -> AppResult<bool> {
        let Some(actor) = actor else {
            return Ok(false);
        };
        if actor.is_root {
            return Ok(true);
        }

        let roles = self.get_user_roles(actor.user_id).await?;
        Ok(roles.iter().any(|role| role.is_administrator))
    }

    /// Returns whether a role may be browsed. Unknown roles are not.
    pub async fn is_explorable(&self, role_id: RoleId) -> AppResult<bool> {
        Ok(self
            .repository
            .find_role(role_id)
            .await?
            .is_some_and(|role| role.is_explorable))
    }

    /// Returns users manually assigned to a moderator role, and to an
    /// administrator role when `include_admins` is set.
    pub async fn get_moderator_ids(&self, include_admins: bool) -> AppResult<Vec<UserId>> {
        self.privileged_user_ids(|role| {
            role.is_moderator || (include_admins && role.is_administrator)
        })
        .await
    }

    /// Returns users manually assigned to an administrator role.
    pub async fn get_administrator_ids(&self) -> AppResult<Vec<UserId>> {
        self.privileged_user_ids(|role| role.is_administrator).await
    }

    async fn privileged_user_ids(
        &self,
        privileged: impl Fn(&Role) -> bool,
    ) -> AppResult<Vec<UserId>> {
        let roles = self.cache.roles().await?;
        let role_ids: Vec<RoleId> = roles
            .iter()
            .filter(|role| privileged(role))
            .map(|role| role.id)
            .collect();
        if role_ids.is_empty() {
            return Ok(Vec::new());
        }

        let now = Utc::now();
        let mut user_ids: Vec<UserId> = self
            .repository
            .list_assignments_for_roles(&role_ids)
            .await?
            .into_iter()
            .filter(|assignment| assignment.is_active_at(now))
            .map(|assignment| assignment.user_id)
            .collect();
        user_ids.sort();
        user_ids.dedup();

        Ok(user_ids)
    }
}

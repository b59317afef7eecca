use super::*;

impl RoleService {
    /// Returns built-in defaults merged with the instance overrides.
    pub async fn base_policies(&self) -> AppResult<RolePolicies> {
        let overrides = self.instance_policies.instance_policies().await?;
        Ok(RolePolicies::with_instance_overrides(&overrides))
    }

    /// Returns the effective policies of a user, or the base policies for
    /// anonymous callers.
    pub async fn get_user_policies(&self, user_id: Option<UserId>) -> AppResult<RolePolicies> {
        let base = self.base_policies().await?;
        let Some(user_id) = user_id else {
            return Ok(base);
        };

        let roles = self.get_user_roles(user_id).await?;
        let overrides: Vec<&RolePolicyOverrides> =
            roles.iter().map(|role| &role.policies).collect();

        Ok(RolePolicies::resolve(&base, &overrides))
    }
}

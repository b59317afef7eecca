use super::*;

impl RoleService {
    /// Returns the roles in effect for a user: active manual assignments
    /// first, then conditional roles whose formula matches.
    ///
    /// When the user record is missing only the manual roles are returned.
    pub async fn get_user_roles(&self, user_id: UserId) -> AppResult<Vec<Role>> {
        self.resolve_roles(user_id, Utc::now()).await
    }

    /// Returns the effective roles flagged for badge display.
    ///
    /// Only badge roles take part: `roleAssignedTo` leaves see manual badge
    /// roles only, and formulas of other roles are not evaluated.
    pub async fn get_user_badge_roles(&self, user_id: UserId) -> AppResult<Vec<Role>> {
        self.resolve_roles_matching(user_id, Utc::now(), |role| role.as_badge)
            .await
    }

    /// Returns the user's active manual assignments.
    pub async fn get_user_assignments(&self, user_id: UserId) -> AppResult<Vec<RoleAssignment>> {
        let now = Utc::now();
        let assignments = self.cache.user_assignments(user_id).await?;

        Ok(assignments
            .iter()
            .filter(|assignment| assignment.is_active_at(now))
            .cloned()
            .collect())
    }

    pub(super) async fn resolve_roles(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<Role>> {
        self.resolve_roles_matching(user_id, now, |_| true).await
    }

    /// Resolves the user's roles among those accepted by `eligible`.
    async fn resolve_roles_matching(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
        eligible: impl Fn(&Role) -> bool,
    ) -> AppResult<Vec<Role>> {
        let roles = self.cache.roles().await?;
        let assignments = self.cache.user_assignments(user_id).await?;

        let assigned: HashSet<RoleId> = assignments
            .iter()
            .filter(|assignment| assignment.is_active_at(now))
            .map(|assignment| assignment.role_id)
            .collect();

        let mut resolved: Vec<Role> = roles
            .iter()
            .filter(|role| eligible(role) && assigned.contains(&role.id))
            .cloned()
            .collect();
        let manual_roles: HashSet<RoleId> = resolved.iter().map(|role| role.id).collect();

        let conditional: Vec<(&Role, &RoleCondition)> = roles
            .iter()
            .filter(|role| eligible(role) && !manual_roles.contains(&role.id))
            .filter_map(|role| role.target.condition().map(|condition| (role, condition)))
            .collect();
        if conditional.is_empty() {
            return Ok(resolved);
        }

        let Some(user) = self.user_stats.find_user(user_id).await? else {
            return Ok(resolved);
        };

        for (role, condition) in conditional {
            if self
                .evaluator
                .evaluate(&user, &manual_roles, condition, now)
                .await
            {
                resolved.push(role.clone());
            }
        }

        Ok(resolved)
    }
}

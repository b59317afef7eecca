use super::*;

/// Input payload for creating a role.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateRoleInput {
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Optional display color.
    pub color: Option<String>,
    /// Optional icon URL.
    pub icon_url: Option<String>,
    /// Membership rule.
    pub target: RoleTarget,
    /// Notify members and show the role publicly.
    pub is_public: bool,
    /// Grant moderator privileges.
    pub is_moderator: bool,
    /// Grant administrator privileges.
    pub is_administrator: bool,
    /// Allow browsing the role.
    pub is_explorable: bool,
    /// Show the role as a badge.
    pub as_badge: bool,
    /// Allow moderators to edit members.
    pub can_edit_members_by_moderator: bool,
    /// Sort key for display.
    pub display_order: i32,
    /// Per-policy overrides.
    pub policies: RolePolicyOverrides,
}

impl CreateRoleInput {
    /// Creates input for a plain manual role.
    #[must_use]
    pub fn manual(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
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
        }
    }

    /// Creates input for a conditional role.
    #[must_use]
    pub fn conditional(name: impl Into<String>, condition: RoleCondition) -> Self {
        Self {
            target: RoleTarget::Conditional(condition),
            ..Self::manual(name)
        }
    }
}

/// Partial update of a role. `None` keeps the current value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UpdateRoleInput {
    /// New display name.
    pub name: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New color, `Some(None)` clears it.
    pub color: Option<Option<String>>,
    /// New icon URL, `Some(None)` clears it.
    pub icon_url: Option<Option<String>>,
    /// New membership rule. A formula is replaced as a whole.
    pub target: Option<RoleTarget>,
    /// New public flag.
    pub is_public: Option<bool>,
    /// New moderator flag.
    pub is_moderator: Option<bool>,
    /// New administrator flag.
    pub is_administrator: Option<bool>,
    /// New explorable flag.
    pub is_explorable: Option<bool>,
    /// New badge flag.
    pub as_badge: Option<bool>,
    /// New moderator member editing flag.
    pub can_edit_members_by_moderator: Option<bool>,
    /// New sort key.
    pub display_order: Option<i32>,
    /// New policy overrides, replacing all existing ones.
    pub policies: Option<RolePolicyOverrides>,
}

impl RoleService {
    /// Creates a role and broadcasts it.
    pub async fn create_role(
        &self,
        input: CreateRoleInput,
        actor: Option<&Actor>,
    ) -> AppResult<Role> {
        let now = Utc::now();
        let role = Role {
            id: RoleId::new(),
            name: NonEmptyString::new(input.name)?,
            description: input.description,
            color: input.color,
            icon_url: input.icon_url,
            target: input.target,
            is_public: input.is_public,
            is_moderator: input.is_moderator,
            is_administrator: input.is_administrator,
            is_explorable: input.is_explorable,
            as_badge: input.as_badge,
            can_edit_members_by_moderator: input.can_edit_members_by_moderator,
            display_order: input.display_order,
            policies: input.policies,
            updated_at: now,
            last_used_at: now,
        };

        self.repository.insert_role(role.clone()).await?;
        self.emit(RoleEvent::RoleCreated(role.clone())).await?;
        info!(role_id = %role.id, role_name = role.name.as_str(), "created role");

        self.log_moderation(
            actor,
            ModerationAction::CreateRole,
            json!({ "roleId": role.id, "role": role }),
        )
        .await;

        Ok(role)
    }

    /// Applies a partial update and broadcasts the new snapshot.
    pub async fn update_role(
        &self,
        role_id: RoleId,
        input: UpdateRoleInput,
        actor: Option<&Actor>,
    ) -> AppResult<Role> {
        let before = self
            .repository
            .find_role(role_id)
            .await?
            .ok_or_else(|| AppError::RoleNotFound(role_id.to_string()))?;

        let mut after = before.clone();
        if let Some(name) = input.name {
            after.name = NonEmptyString::new(name)?;
        }
        if let Some(description) = input.description {
            after.description = description;
        }
        if let Some(color) = input.color {
            after.color = color;
        }
        if let Some(icon_url) = input.icon_url {
            after.icon_url = icon_url;
        }
        if let Some(target) = input.target {
            after.target = target;
        }
        if let Some(is_public) = input.is_public {
            after.is_public = is_public;
        }
        if let Some(is_moderator) = input.is_moderator {
            after.is_moderator = is_moderator;
        }
        if let Some(is_administrator) = input.is_administrator {
            after.is_administrator = is_administrator;
        }
        if let Some(is_explorable) = input.is_explorable {
            after.is_explorable = is_explorable;
        }
        if let Some(as_badge) = input.as_badge {
            after.as_badge = as_badge;
        }
        if let Some(can_edit_members_by_moderator) = input.can_edit_members_by_moderator {
            after.can_edit_members_by_moderator = can_edit_members_by_moderator;
        }
        if let Some(display_order) = input.display_order {
            after.display_order = display_order;
        }
        if let Some(policies) = input.policies {
            after.policies = policies;
        }
        after.updated_at = Utc::now().max(before.updated_at);

        self.repository.update_role(after.clone()).await?;
        self.emit(RoleEvent::RoleUpdated(after.clone())).await?;
        info!(role_id = %role_id, "updated role");

        self.log_moderation(
            actor,
            ModerationAction::UpdateRole,
            json!({ "roleId": role_id, "before": before, "after": after }),
        )
        .await;

        Ok(after)
    }

    /// Deletes a role with its assignments and broadcasts the removal.
    pub async fn delete_role(&self, role_id: RoleId, actor: Option<&Actor>) -> AppResult<()> {
        let role = self
            .repository
            .find_role(role_id)
            .await?
            .ok_or_else(|| AppError::RoleNotFound(role_id.to_string()))?;

        self.repository.delete_role(role_id).await?;
        self.emit(RoleEvent::RoleDeleted(role.clone())).await?;
        info!(role_id = %role_id, "deleted role");

        self.log_moderation(
            actor,
            ModerationAction::DeleteRole,
            json!({ "roleId": role_id, "role": role }),
        )
        .await;

        Ok(())
    }
}

use super::*;

impl RoleService {
    /// Assigns a role to a user.
    ///
    /// An expired row for the same pair is removed first. Public roles notify
    /// the user and an actor gets a moderation log entry.
    pub async fn assign(
        &self,
        user_id: UserId,
        role_id: RoleId,
        expires_at: Option<DateTime<Utc>>,
        actor: Option<&Actor>,
    ) -> AppResult<RoleAssignment> {
        let now = Utc::now();
        let role = self
            .repository
            .find_role(role_id)
            .await?
            .ok_or_else(|| AppError::RoleNotFound(role_id.to_string()))?;

        if let Some(existing) = self.repository.find_assignment(user_id, role_id).await? {
            if existing.is_active_at(now) {
                return Err(AppError::AlreadyAssigned {
                    role_id: role_id.to_string(),
                    user_id: user_id.to_string(),
                });
            }

            self.remove_expired(existing).await?;
        }

        let assignment = RoleAssignment {
            id: RoleAssignmentId::new(),
            role_id,
            user_id,
            expires_at,
            created_at: now,
        };

        self.repository.insert_assignment(assignment.clone()).await?;
        self.touch_last_used(role_id, now).await;
        self.emit(RoleEvent::UserRoleAssigned(assignment.clone()))
            .await?;

        if role.is_public {
            self.notify(user_id, RoleNotification::RoleAssigned { role_id })
                .await;
        }

        self.log_moderation(
            actor,
            ModerationAction::AssignRole,
            json!({
                "roleId": role_id,
                "roleName": role.name.as_str(),
                "userId": user_id,
                "expiresAt": expires_at,
            }),
        )
        .await;

        Ok(assignment)
    }

    /// Removes a role from a user.
    ///
    /// Fails with [`AppError::NotAssigned`] when no active row exists. An
    /// expired row is deleted before failing.
    pub async fn unassign(
        &self,
        user_id: UserId,
        role_id: RoleId,
        actor: Option<&Actor>,
    ) -> AppResult<()> {
        let now = Utc::now();
        let not_assigned = || AppError::NotAssigned {
            role_id: role_id.to_string(),
            user_id: user_id.to_string(),
        };

        let existing = self
            .repository
            .find_assignment(user_id, role_id)
            .await?
            .ok_or_else(not_assigned)?;

        if existing.is_expired_at(now) {
            self.remove_expired(existing).await?;
            return Err(not_assigned());
        }

        self.repository.delete_assignment(existing.id).await?;
        self.touch_last_used(role_id, now).await;
        self.emit(RoleEvent::UserRoleUnassigned(existing)).await?;

        let role_name = self
            .repository
            .find_role(role_id)
            .await?
            .map(|role| role.name.as_str().to_owned());
        self.log_moderation(
            actor,
            ModerationAction::UnassignRole,
            json!({
                "roleId": role_id,
                "roleName": role_name,
                "userId": user_id,
            }),
        )
        .await;

        Ok(())
    }

    /// Deletes assignments whose expiry has passed, `batch_size` rows at a
    /// time, and broadcasts each removal. Returns the number of rows removed.
    pub async fn sweep_expired_assignments(&self, batch_size: usize) -> AppResult<usize> {
        if batch_size == 0 {
            return Err(AppError::Validation(
                "batch_size must be greater than zero".to_owned(),
            ));
        }

        let now = Utc::now();
        let mut removed = 0;
        loop {
            let batch = self
                .repository
                .list_expired_assignments(now, batch_size)
                .await?;
            let batch_len = batch.len();
            let removed_before = removed;

            for assignment in batch {
                if self.repository.delete_assignment(assignment.id).await? {
                    removed += 1;
                    self.emit(RoleEvent::UserRoleUnassigned(assignment)).await?;
                }
            }

            if batch_len < batch_size || removed == removed_before {
                break;
            }
        }

        if removed > 0 {
            info!(removed, "swept expired role assignments");
        }

        Ok(removed)
    }

    async fn remove_expired(&self, assignment: RoleAssignment) -> AppResult<()> {
        if self.repository.delete_assignment(assignment.id).await? {
            self.emit(RoleEvent::UserRoleUnassigned(assignment)).await?;
        }

        Ok(())
    }
}

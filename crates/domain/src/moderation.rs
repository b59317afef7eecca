use serde::{Deserialize, Serialize};

/// Moderation log actions emitted by role administration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ModerationAction {
    /// A role definition was created.
    CreateRole,
    /// A role definition was changed.
    UpdateRole,
    /// A role definition was removed.
    DeleteRole,
    /// A role was assigned to a user.
    AssignRole,
    /// A role was removed from a user.
    UnassignRole,
}

impl ModerationAction {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateRole => "createRole",
            Self::UpdateRole => "updateRole",
            Self::DeleteRole => "deleteRole",
            Self::AssignRole => "assignRole",
            Self::UnassignRole => "unassignRole",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ModerationAction;

    #[test]
    fn storage_value_matches_serialized_form() {
        for action in [
            ModerationAction::CreateRole,
            ModerationAction::UpdateRole,
            ModerationAction::DeleteRole,
            ModerationAction::AssignRole,
            ModerationAction::UnassignRole,
        ] {
            let serialized = serde_json::to_value(action).unwrap_or_default();
            assert_eq!(serialized, serde_json::json!(action.as_str()));
        }
    }
}

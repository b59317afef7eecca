use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::types::Json;

use rolegate_application::InstancePolicyProvider;
use rolegate_core::{AppError, AppResult};
use rolegate_domain::InstancePolicyOverrides;

/// Reads instance-wide policy overrides from the `instance_meta` row.
///
/// A missing row means no overrides.
#[derive(Clone)]
pub struct PostgresInstancePolicyProvider {
    pool: PgPool,
}

impl PostgresInstancePolicyProvider {
    /// Creates a provider with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InstancePolicyProvider for PostgresInstancePolicyProvider {
    async fn instance_policies(&self) -> AppResult<InstancePolicyOverrides> {
        let policies = sqlx::query_scalar::<_, Json<serde_json::Value>>(
            "SELECT policies FROM instance_meta WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to load instance policies: {error}"))
        })?;

        let Some(Json(policies)) = policies else {
            return Ok(InstancePolicyOverrides::default());
        };

        serde_json::from_value(policies).map_err(|error| {
            AppError::Validation(format!("invalid instance policies: {error}"))
        })
    }
}

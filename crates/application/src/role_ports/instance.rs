use async_trait::async_trait;
use rolegate_core::AppResult;
use rolegate_domain::InstancePolicyOverrides;

/// Port for instance-wide policy overrides.
#[async_trait]
pub trait InstancePolicyProvider: Send + Sync {
    /// Returns the configured subset of policy values.
    async fn instance_policies(&self) -> AppResult<InstancePolicyOverrides>;
}

/// Provider returning a fixed set of overrides.
#[derive(Debug, Clone, Default)]
pub struct StaticInstancePolicyProvider {
    overrides: InstancePolicyOverrides,
}

impl StaticInstancePolicyProvider {
    /// Creates a provider from fixed overrides.
    #[must_use]
    pub fn new(overrides: InstancePolicyOverrides) -> Self {
        Self { overrides }
    }
}

#[async_trait]
impl InstancePolicyProvider for StaticInstancePolicyProvider {
    async fn instance_policies(&self) -> AppResult<InstancePolicyOverrides> {
        Ok(self.overrides.clone())
    }
}

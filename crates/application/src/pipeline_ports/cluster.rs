use async_trait::async_trait;
use helmspan_core::{AppError, AppResult};
use helmspan_domain::DeploymentDescriptor;
use thiserror::Error;

/// Structured rollout failure reported by the orchestration cluster.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RolloutError {
    /// The cluster rejected the descriptor before applying anything.
    #[error("rollout rejected: {0}")]
    Rejected(String),

    /// The apply was accepted but the workload never became healthy; the
    /// cluster reverted to the last-known-good state.
    #[error("rollout health check failed, reverted: {0}")]
    HealthCheckFailed(String),

    /// The cluster could not be reached; retryable.
    #[error("cluster unreachable: {0}")]
    Unreachable(String),
}

impl From<RolloutError> for AppError {
    fn from(value: RolloutError) -> Self {
        match value {
            RolloutError::Rejected(detail) => {
                AppError::Validation(format!("rollout rejected: {detail}"))
            }
            other => AppError::Internal(other.to_string()),
        }
    }
}

/// Port over the orchestration cluster API.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Applies a descriptor atomically inside its namespace and blocks
    /// until the workload is healthy or the change is reverted.
    ///
    /// Re-applying an already-rolled-out descriptor is a no-op beyond
    /// confirming health.
    async fn apply(
        &self,
        descriptor: &DeploymentDescriptor,
        release_id: &str,
    ) -> Result<(), RolloutError>;

    /// Toggles network ingress for a namespace; reversible, never
    /// destructive.
    async fn set_ingress_enabled(&self, namespace: &str, enabled: bool) -> AppResult<()>;
}

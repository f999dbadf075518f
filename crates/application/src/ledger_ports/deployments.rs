use async_trait::async_trait;
use helmspan_core::{AppResult, DeploymentId};
use helmspan_domain::{Deployment, DeploymentStatus};

/// Repository port for deployment attempt records.
#[async_trait]
pub trait DeploymentRepository: Send + Sync {
    /// Creates a pending deployment for a freshly issued slot.
    async fn create_deployment(&self, deployment: Deployment) -> AppResult<()>;

    /// Returns one deployment by id.
    async fn find_deployment(&self, deployment_id: DeploymentId)
    -> AppResult<Option<Deployment>>;

    /// Records the stored-artifact location.
    ///
    /// The location is written exactly once; a second write fails with a
    /// conflict, which makes upload slots single-use.
    async fn set_artifact_location(
        &self,
        deployment_id: DeploymentId,
        location: &str,
    ) -> AppResult<()>;

    /// Updates the pipeline status of a deployment.
    async fn set_status(
        &self,
        deployment_id: DeploymentId,
        status: DeploymentStatus,
    ) -> AppResult<()>;
}

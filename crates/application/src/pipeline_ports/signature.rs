use helmspan_core::{AppResult, DeploymentId};

/// Port over the operator-keyed signature scheme for upload URLs.
pub trait UploadSigner: Send + Sync {
    /// Signs a deployment id for minting an upload URL.
    fn sign(&self, deployment_id: DeploymentId) -> AppResult<String>;

    /// Verifies a presented signature against a deployment id.
    fn verify(&self, deployment_id: DeploymentId, signature: &str) -> AppResult<bool>;
}

use std::path::PathBuf;

use async_trait::async_trait;
use helmspan_core::{AppResult, DeploymentId};
use helmspan_domain::ArtifactTree;

/// An unpacked artifact ready for validation and building.
#[derive(Debug, Clone)]
pub struct ExtractedArtifact {
    /// Parsed manifest plus the top-level directories present.
    pub tree: ArtifactTree,
    /// Directory holding the unpacked source tree.
    pub source_dir: PathBuf,
}

/// Port over durable artifact storage and extraction.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Stores one uploaded archive; returns the stored-artifact location.
    async fn store(&self, deployment_id: DeploymentId, archive: &[u8]) -> AppResult<String>;

    /// Unpacks a stored archive and parses its manifest.
    async fn extract(&self, location: &str) -> AppResult<ExtractedArtifact>;
}

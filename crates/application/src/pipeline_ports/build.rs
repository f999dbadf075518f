use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use helmspan_core::{AppError, AppResult};
use helmspan_domain::DeployTarget;

/// Published image references keyed by deploy target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageRefs(BTreeMap<DeployTarget, String>);

impl ImageRefs {
    /// Creates an empty reference set.
    #[must_use]
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Records the published image for one target.
    pub fn insert(&mut self, target: DeployTarget, image: impl Into<String>) {
        self.0.insert(target, image.into());
    }

    /// Returns the published image for one target.
    pub fn get(&self, target: DeployTarget) -> AppResult<&str> {
        self.0.get(&target).map(String::as_str).ok_or_else(|| {
            AppError::Internal(format!(
                "no image was built for target '{}'",
                target.as_str()
            ))
        })
    }
}

/// Port over the external image build toolchain.
#[async_trait]
pub trait ImageBuilder: Send + Sync {
    /// Builds and publishes the image for one target's source directory.
    async fn build_and_publish(
        &self,
        source_dir: &Path,
        target: DeployTarget,
        release_id: &str,
    ) -> AppResult<String>;
}

//! Ports over the external capabilities the deployment pipeline drives.

mod artifacts;
mod build;
mod cluster;
mod notify;
mod signature;

pub use artifacts::{ArtifactStore, ExtractedArtifact};
pub use build::{ImageBuilder, ImageRefs};
pub use cluster::{ClusterApi, RolloutError};
pub use notify::NotificationService;
pub use signature::UploadSigner;

//! Application services and ports.

#![forbid(unsafe_code)]

mod artifact_validator;
mod billing_ports;
mod billing_service;
mod ledger_ports;
mod manifest_synthesizer;
mod pipeline_ports;
mod pipeline_service;
mod project_service;

pub use artifact_validator::validate_artifact;
pub use billing_ports::MetricsBackend;
pub use billing_service::{BillingConfig, BillingService, TopUpInput};
pub use ledger_ports::{
    AccountingRepository, DeploymentRepository, LedgerQuery, LogQuery, LogRepository,
    ProjectRepository,
};
pub use manifest_synthesizer::{ManifestSynthesizer, SynthesizerConfig, project_namespace};
pub use pipeline_ports::{
    ArtifactStore, ClusterApi, ExtractedArtifact, ImageBuilder, ImageRefs, NotificationService,
    RolloutError, UploadSigner,
};
pub use pipeline_service::{IssuedSlot, PipelineService};
pub use project_service::{AddAdminInput, CreateProjectInput, CreatedProject, ProjectService};

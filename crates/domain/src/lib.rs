//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod billing;
mod deployment;
mod descriptor;
mod manifest;
mod project;

pub use billing::{
    AccountingEntry, BillingRates, CostBreakdown, DEFAULT_THRESHOLD_LADDER, EntryKind,
    ThresholdLadder, UsageSample, price_interval,
};
pub use deployment::{Deployment, DeploymentStatus, LogEntry, PipelineStep};
pub use descriptor::{
    ContainerSpec, DeploymentDescriptor, RouteRule, StatefulStores, StoreSpec, WorkloadSpec,
};
pub use manifest::{
    AppManifest, ArtifactTree, DeployTarget, MANIFEST_FILE_NAME, MANIFEST_SCHEMA, PROVIDER_TAG,
    ProviderBlock, SUPPORTED_CONTRACT_LANGUAGE, ValidatedManifest, ValidationFailure,
};
pub use project::{NetworkSelector, Project, ProjectAdmin, ProjectInput};

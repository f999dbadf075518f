use std::collections::BTreeSet;

use helmspan_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Schema identifier a manifest must declare to be accepted.
pub const MANIFEST_SCHEMA: &str = "helmspan-app";

/// Provider tag selecting this control plane's configuration block.
pub const PROVIDER_TAG: &str = "helmspan";

/// The only smart-contract language a backend target may declare.
pub const SUPPORTED_CONTRACT_LANGUAGE: &str = "rust";

/// File name of the manifest at the artifact root.
pub const MANIFEST_FILE_NAME: &str = "helmspan.json";

/// Build targets an artifact may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployTarget {
    /// Static or server-rendered public-facing service.
    Frontend,
    /// API-facing service with persistent stores.
    Backend,
}

impl DeployTarget {
    /// Returns the stable target name used in manifests and descriptors.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Frontend => "frontend",
            Self::Backend => "backend",
        }
    }
}

/// Reasons an uploaded artifact fails validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationFailure {
    /// Manifest declares a schema this control plane does not recognize.
    #[error("manifest schema '{found}' is not '{MANIFEST_SCHEMA}'")]
    SchemaMismatch {
        /// Schema identifier found in the manifest.
        found: String,
    },

    /// No provider block matches this control plane and project.
    #[error("manifest has no configuration block for provider '{PROVIDER_TAG}' and this project")]
    NoMatchingConfig,

    /// The selected block targets a different network than the project.
    #[error("manifest targets network '{found}' but the project is on '{expected}'")]
    NetworkMismatch {
        /// Network the project is configured for.
        expected: String,
        /// Network declared by the manifest block.
        found: String,
    },

    /// The selected block declares no deploy targets.
    #[error("manifest declares no deploy targets")]
    NoDeployTargets,

    /// A declared target is not one of the supported target names.
    #[error("unknown deploy target '{target}'")]
    UnknownDeployTarget {
        /// The unrecognized target name.
        target: String,
    },

    /// A declared target has no matching source directory in the artifact.
    #[error("artifact has no source directory for target '{target}'")]
    MissingTargetSource {
        /// The target whose directory is missing.
        target: String,
    },

    /// The backend declares a contract language other than the supported one.
    #[error("contract language '{language}' is not supported, only '{SUPPORTED_CONTRACT_LANGUAGE}'")]
    UnsupportedContractLanguage {
        /// The unsupported language.
        language: String,
    },
}

impl From<ValidationFailure> for AppError {
    fn from(value: ValidationFailure) -> Self {
        AppError::Validation(value.to_string())
    }
}

/// One provider-specific configuration block inside a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderBlock {
    provider: String,
    project_id: String,
    network: String,
    #[serde(default)]
    targets: Vec<String>,
    #[serde(default)]
    contract_language: Option<String>,
}

impl ProviderBlock {
    /// Creates a provider block, mainly for tests and manifest tooling.
    #[must_use]
    pub fn new(
        provider: impl Into<String>,
        project_id: impl Into<String>,
        network: impl Into<String>,
        targets: Vec<String>,
        contract_language: Option<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            project_id: project_id.into(),
            network: network.into(),
            targets,
            contract_language,
        }
    }

    /// Returns the provider tag this block is addressed to.
    #[must_use]
    pub fn provider(&self) -> &str {
        self.provider.as_str()
    }

    /// Returns the external project id this block is scoped to.
    #[must_use]
    pub fn project_id(&self) -> &str {
        self.project_id.as_str()
    }

    /// Returns the network the block targets.
    #[must_use]
    pub fn network(&self) -> &str {
        self.network.as_str()
    }

    /// Returns the declared deploy target names.
    #[must_use]
    pub fn targets(&self) -> &[String] {
        self.targets.as_slice()
    }

    /// Returns the declared smart-contract language, when any.
    #[must_use]
    pub fn contract_language(&self) -> Option<&str> {
        self.contract_language.as_deref()
    }
}

/// Parsed artifact manifest as uploaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppManifest {
    schema: String,
    #[serde(default)]
    providers: Vec<ProviderBlock>,
}

impl AppManifest {
    /// Creates a manifest, mainly for tests and manifest tooling.
    #[must_use]
    pub fn new(schema: impl Into<String>, providers: Vec<ProviderBlock>) -> Self {
        Self {
            schema: schema.into(),
            providers,
        }
    }

    /// Returns the declared schema identifier.
    #[must_use]
    pub fn schema(&self) -> &str {
        self.schema.as_str()
    }

    /// Returns all provider configuration blocks.
    #[must_use]
    pub fn providers(&self) -> &[ProviderBlock] {
        self.providers.as_slice()
    }
}

/// Extracted artifact contents the validator operates on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactTree {
    manifest: AppManifest,
    directories: BTreeSet<String>,
}

impl ArtifactTree {
    /// Creates an artifact tree from a parsed manifest and top-level directories.
    #[must_use]
    pub fn new(manifest: AppManifest, directories: BTreeSet<String>) -> Self {
        Self {
            manifest,
            directories,
        }
    }

    /// Returns the parsed manifest.
    #[must_use]
    pub fn manifest(&self) -> &AppManifest {
        &self.manifest
    }

    /// Returns whether a top-level directory exists in the artifact.
    #[must_use]
    pub fn has_directory(&self, name: &str) -> bool {
        self.directories.contains(name)
    }
}

/// Outcome of a successful artifact validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedManifest {
    targets: BTreeSet<DeployTarget>,
    contract_language: Option<String>,
}

impl ValidatedManifest {
    /// Creates a validated manifest from an accepted target set.
    pub fn new(
        targets: BTreeSet<DeployTarget>,
        contract_language: Option<String>,
    ) -> AppResult<Self> {
        if targets.is_empty() {
            return Err(ValidationFailure::NoDeployTargets.into());
        }

        Ok(Self {
            targets,
            contract_language,
        })
    }

    /// Returns the accepted deploy targets in stable order.
    #[must_use]
    pub fn targets(&self) -> &BTreeSet<DeployTarget> {
        &self.targets
    }

    /// Returns whether a frontend build was requested.
    #[must_use]
    pub fn wants_frontend(&self) -> bool {
        self.targets.contains(&DeployTarget::Frontend)
    }

    /// Returns whether a backend build was requested.
    #[must_use]
    pub fn wants_backend(&self) -> bool {
        self.targets.contains(&DeployTarget::Backend)
    }

    /// Returns the accepted contract language, when declared.
    #[must_use]
    pub fn contract_language(&self) -> Option<&str> {
        self.contract_language.as_deref()
    }
}

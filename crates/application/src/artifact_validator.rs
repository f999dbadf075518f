//! Pure validation of an extracted artifact against its project.

use std::collections::BTreeSet;

use helmspan_domain::{
    ArtifactTree, DeployTarget, MANIFEST_SCHEMA, PROVIDER_TAG, Project,
    SUPPORTED_CONTRACT_LANGUAGE, ValidatedManifest, ValidationFailure,
};

/// Validates an extracted artifact tree for one project.
///
/// Pure check with no side effects; every failure is reported as a value so
/// the pipeline can log and respond without crashing.
pub fn validate_artifact(
    tree: &ArtifactTree,
    project: &Project,
) -> Result<ValidatedManifest, ValidationFailure> {
    let manifest = tree.manifest();

    if manifest.schema() != MANIFEST_SCHEMA {
        return Err(ValidationFailure::SchemaMismatch {
            found: manifest.schema().to_owned(),
        });
    }

    let project_handle = project.id().to_string();
    let block = manifest
        .providers()
        .iter()
        .find(|block| block.provider() == PROVIDER_TAG && block.project_id() == project_handle)
        .ok_or(ValidationFailure::NoMatchingConfig)?;

    if block.network() != project.network().as_str() {
        return Err(ValidationFailure::NetworkMismatch {
            expected: project.network().as_str().to_owned(),
            found: block.network().to_owned(),
        });
    }

    if block.targets().is_empty() {
        return Err(ValidationFailure::NoDeployTargets);
    }

    let mut targets = BTreeSet::new();
    for name in block.targets() {
        let target = match name.as_str() {
            "frontend" => DeployTarget::Frontend,
            "backend" => DeployTarget::Backend,
            other => {
                return Err(ValidationFailure::UnknownDeployTarget {
                    target: other.to_owned(),
                });
            }
        };

        if !tree.has_directory(target.as_str()) {
            return Err(ValidationFailure::MissingTargetSource {
                target: target.as_str().to_owned(),
            });
        }

        targets.insert(target);
    }

    let contract_language = match block.contract_language() {
        Some(language) if targets.contains(&DeployTarget::Backend) => {
            if language != SUPPORTED_CONTRACT_LANGUAGE {
                return Err(ValidationFailure::UnsupportedContractLanguage {
                    language: language.to_owned(),
                });
            }
            Some(language.to_owned())
        }
        _ => None,
    };

    ValidatedManifest::new(targets, contract_language)
        .map_err(|_| ValidationFailure::NoDeployTargets)
}

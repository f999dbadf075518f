use chrono::{DateTime, Utc};
use helmspan_core::{AppError, AppResult, DeploymentId, NonEmptyString, ProjectId};
use serde::{Deserialize, Serialize};

/// Terminal and in-flight states of one deployment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    /// Slot issued, artifact not yet uploaded.
    Pending,
    /// Pipeline is processing the uploaded artifact.
    Running,
    /// Pipeline finished and the rollout is healthy.
    Succeeded,
    /// Pipeline stopped on a failed step.
    Failed,
}

impl DeploymentStatus {
    /// Returns the stable status name used in storage and responses.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    /// Parses a status from its stable name.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            other => Err(AppError::Validation(format!(
                "unknown deployment status '{other}'"
            ))),
        }
    }

    /// Returns whether the status is terminal.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// Ordered steps of the deployment pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PipelineStep {
    /// Signed upload slot issued.
    SlotIssued,
    /// Artifact stored.
    Uploaded,
    /// Artifact archive unpacked.
    Extracted,
    /// Manifest validated against the project.
    Validated,
    /// Container images built and published.
    ImagesBuilt,
    /// Deployment descriptor synthesized.
    ManifestSynthesized,
    /// Descriptor applied and workload healthy.
    RolledOut,
    /// Pipeline finished successfully.
    Complete,
    /// Pipeline stopped on an error.
    Failed,
}

impl PipelineStep {
    /// Returns the stable step label used in the audit log.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SlotIssued => "slot-issued",
            Self::Uploaded => "uploaded",
            Self::Extracted => "extracted",
            Self::Validated => "validated",
            Self::ImagesBuilt => "images-built",
            Self::ManifestSynthesized => "manifest-synthesized",
            Self::RolledOut => "rolled-out",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }
}

/// One artifact-upload-to-rollout attempt for a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    id: DeploymentId,
    project_id: ProjectId,
    created_by: NonEmptyString,
    artifact_location: Option<String>,
    status: DeploymentStatus,
    created_at: DateTime<Utc>,
}

impl Deployment {
    /// Creates a pending deployment for a freshly issued slot.
    pub fn new(
        id: DeploymentId,
        project_id: ProjectId,
        created_by: impl Into<String>,
    ) -> AppResult<Self> {
        Ok(Self {
            id,
            project_id,
            created_by: NonEmptyString::new(created_by)?,
            artifact_location: None,
            status: DeploymentStatus::Pending,
            created_at: Utc::now(),
        })
    }

    /// Restores a deployment from persisted state.
    pub fn from_parts(
        id: DeploymentId,
        project_id: ProjectId,
        created_by: impl Into<String>,
        artifact_location: Option<String>,
        status: DeploymentStatus,
        created_at: DateTime<Utc>,
    ) -> AppResult<Self> {
        Ok(Self {
            id,
            project_id,
            created_by: NonEmptyString::new(created_by)?,
            artifact_location,
            status,
            created_at,
        })
    }

    /// Returns the deployment identifier.
    #[must_use]
    pub fn id(&self) -> DeploymentId {
        self.id
    }

    /// Returns the owning project identifier.
    #[must_use]
    pub fn project_id(&self) -> ProjectId {
        self.project_id
    }

    /// Returns the subject that requested the slot.
    #[must_use]
    pub fn created_by(&self) -> &NonEmptyString {
        &self.created_by
    }

    /// Returns the stored-artifact location once the upload completed.
    #[must_use]
    pub fn artifact_location(&self) -> Option<&str> {
        self.artifact_location.as_deref()
    }

    /// Returns the current pipeline status.
    #[must_use]
    pub fn status(&self) -> DeploymentStatus {
        self.status
    }

    /// Returns the slot creation timestamp.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Append-only audit record scoped to a project and optionally a deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    project_id: ProjectId,
    deployment_id: Option<DeploymentId>,
    label: NonEmptyString,
    message: String,
    created_at: DateTime<Utc>,
}

impl LogEntry {
    /// Creates a pipeline log entry for one deployment step.
    pub fn for_step(
        project_id: ProjectId,
        deployment_id: DeploymentId,
        step: PipelineStep,
        message: impl Into<String>,
    ) -> AppResult<Self> {
        Ok(Self {
            project_id,
            deployment_id: Some(deployment_id),
            label: NonEmptyString::new(step.as_str())?,
            message: message.into(),
            created_at: Utc::now(),
        })
    }

    /// Creates a project-level log entry with no deployment scope.
    pub fn for_project(
        project_id: ProjectId,
        label: impl Into<String>,
        message: impl Into<String>,
    ) -> AppResult<Self> {
        Ok(Self {
            project_id,
            deployment_id: None,
            label: NonEmptyString::new(label)?,
            message: message.into(),
            created_at: Utc::now(),
        })
    }

    /// Restores a log entry from persisted state.
    pub fn from_parts(
        project_id: ProjectId,
        deployment_id: Option<DeploymentId>,
        label: impl Into<String>,
        message: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> AppResult<Self> {
        Ok(Self {
            project_id,
            deployment_id,
            label: NonEmptyString::new(label)?,
            message: message.into(),
            created_at,
        })
    }

    /// Returns the owning project identifier.
    #[must_use]
    pub fn project_id(&self) -> ProjectId {
        self.project_id
    }

    /// Returns the scoped deployment, when the entry is deployment-level.
    #[must_use]
    pub fn deployment_id(&self) -> Option<DeploymentId> {
        self.deployment_id
    }

    /// Returns the step or event label.
    #[must_use]
    pub fn label(&self) -> &NonEmptyString {
        &self.label
    }

    /// Returns the human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        self.message.as_str()
    }

    /// Returns the append timestamp.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[cfg(test)]
mod tests {
    use helmspan_core::{DeploymentId, ProjectId};

    use super::{Deployment, DeploymentStatus, LogEntry, PipelineStep};

    #[test]
    fn new_deployment_starts_pending_without_artifact() {
        let deployment = Deployment::new(DeploymentId::new(), ProjectId::new(), "alice");
        assert!(deployment.is_ok());
        let deployment = deployment.unwrap_or_else(|_| unreachable!());
        assert_eq!(deployment.status(), DeploymentStatus::Pending);
        assert_eq!(deployment.artifact_location(), None);
    }

    #[test]
    fn deployment_status_parse_rejects_unknown_values() {
        assert!(DeploymentStatus::parse("succeeded").is_ok());
        assert!(DeploymentStatus::parse("finished").is_err());
    }

    #[test]
    fn step_log_entry_carries_deployment_scope() {
        let deployment_id = DeploymentId::new();
        let entry = LogEntry::for_step(
            ProjectId::new(),
            deployment_id,
            PipelineStep::Validated,
            "manifest accepted",
        );
        assert!(entry.is_ok());
        let entry = entry.unwrap_or_else(|_| unreachable!());
        assert_eq!(entry.deployment_id(), Some(deployment_id));
        assert_eq!(entry.label().as_str(), "validated");
    }

    #[test]
    fn project_log_entry_has_no_deployment_scope() {
        let entry = LogEntry::for_project(ProjectId::new(), "billing", "debited 42");
        assert!(entry.is_ok());
        assert_eq!(
            entry.unwrap_or_else(|_| unreachable!()).deployment_id(),
            None
        );
    }
}

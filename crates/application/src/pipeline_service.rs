//! The deployment pipeline, from slot issuance to rollout.

use std::collections::HashMap;
use std::sync::Arc;

use helmspan_core::{AdminIdentity, AppError, AppResult, DeploymentId, ProjectId};
use helmspan_domain::{Deployment, DeploymentStatus, LogEntry, PipelineStep, Project};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::artifact_validator::validate_artifact;
use crate::ledger_ports::{DeploymentRepository, LogQuery, LogRepository, ProjectRepository};
use crate::manifest_synthesizer::ManifestSynthesizer;
use crate::pipeline_ports::{
    ArtifactStore, ClusterApi, ImageBuilder, ImageRefs, NotificationService, UploadSigner,
};

/// A freshly issued single-use upload slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedSlot {
    /// Identifier of the pending deployment.
    pub deployment_id: DeploymentId,
    /// Signature the uploader must present with the archive.
    pub signature: String,
}

/// Drives deployment attempts through upload, validation, build,
/// synthesis, and rollout.
pub struct PipelineService {
    projects: Arc<dyn ProjectRepository>,
    deployments: Arc<dyn DeploymentRepository>,
    logs: Arc<dyn LogRepository>,
    artifacts: Arc<dyn ArtifactStore>,
    builder: Arc<dyn ImageBuilder>,
    cluster: Arc<dyn ClusterApi>,
    notifier: Arc<dyn NotificationService>,
    signer: Arc<dyn UploadSigner>,
    synthesizer: ManifestSynthesizer,
    // One lock per project so concurrent uploads for the same project
    // serialize while different projects proceed in parallel.
    project_locks: Mutex<HashMap<ProjectId, Arc<Mutex<()>>>>,
}

impl PipelineService {
    /// Creates the pipeline service over its ports.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        projects: Arc<dyn ProjectRepository>,
        deployments: Arc<dyn DeploymentRepository>,
        logs: Arc<dyn LogRepository>,
        artifacts: Arc<dyn ArtifactStore>,
        builder: Arc<dyn ImageBuilder>,
        cluster: Arc<dyn ClusterApi>,
        notifier: Arc<dyn NotificationService>,
        signer: Arc<dyn UploadSigner>,
        synthesizer: ManifestSynthesizer,
    ) -> Self {
        Self {
            projects,
            deployments,
            logs,
            artifacts,
            builder,
            cluster,
            notifier,
            signer,
            synthesizer,
            project_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Issues a pending deployment slot with a signed upload credential.
    pub async fn issue_slot(&self, identity: &AdminIdentity) -> AppResult<IssuedSlot> {
        let project = self.require_project(identity.project_id()).await?;

        let deployment =
            Deployment::new(DeploymentId::new(), project.id(), identity.subject())?;
        let deployment_id = deployment.id();
        self.deployments.create_deployment(deployment).await?;

        let signature = self.signer.sign(deployment_id)?;
        self.log_step(
            project.id(),
            deployment_id,
            PipelineStep::SlotIssued,
            format!("upload slot issued by {}", identity.subject()),
        )
        .await?;

        info!(project_id = %project.id(), deployment_id = %deployment_id, "issued upload slot");
        Ok(IssuedSlot {
            deployment_id,
            signature,
        })
    }

    /// Accepts one artifact upload and runs the pipeline to completion.
    ///
    /// The slot is single-use: a second upload against the same deployment
    /// fails with a conflict. Uploads for projects at or below zero balance
    /// are refused before any work happens.
    pub async fn upload_artifact(
        &self,
        deployment_id: DeploymentId,
        signature: &str,
        archive: &[u8],
    ) -> AppResult<()> {
        let deployment = self
            .deployments
            .find_deployment(deployment_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("deployment {deployment_id} not found")))?;

        if !self.signer.verify(deployment_id, signature)? {
            return Err(AppError::Unauthorized(
                "upload signature is invalid".to_owned(),
            ));
        }

        Self::ensure_slot_unused(&deployment)?;

        let project = self.require_project(deployment.project_id()).await?;
        if project.balance() <= 0 {
            return Err(AppError::Forbidden(
                "project balance is exhausted; top up before deploying".to_owned(),
            ));
        }

        let lock = self.project_lock(project.id()).await;
        let _guard = lock.lock().await;

        // Re-check under the lock: a concurrent upload may have consumed
        // the slot between the pre-lock check and acquisition.
        let deployment = self
            .deployments
            .find_deployment(deployment_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("deployment {deployment_id} not found")))?;
        Self::ensure_slot_unused(&deployment)?;

        self.deployments
            .set_status(deployment_id, DeploymentStatus::Running)
            .await?;

        match self.run_steps(&project, deployment_id, archive).await {
            Ok(()) => {
                self.deployments
                    .set_status(deployment_id, DeploymentStatus::Succeeded)
                    .await?;
                self.log_step(
                    project.id(),
                    deployment_id,
                    PipelineStep::Complete,
                    "deployment is live",
                )
                .await?;
                info!(project_id = %project.id(), deployment_id = %deployment_id, "pipeline complete");
                Ok(())
            }
            Err(error) => {
                self.log_step(
                    project.id(),
                    deployment_id,
                    PipelineStep::Failed,
                    error.to_string(),
                )
                .await?;
                self.deployments
                    .set_status(deployment_id, DeploymentStatus::Failed)
                    .await?;
                self.notify_failure(&project, deployment_id, &error).await;
                warn!(project_id = %project.id(), deployment_id = %deployment_id, %error, "pipeline failed");
                Err(error)
            }
        }
    }

    /// Returns one deployment scoped to the caller's project.
    pub async fn deployment(
        &self,
        identity: &AdminIdentity,
        deployment_id: DeploymentId,
    ) -> AppResult<Deployment> {
        let deployment = self
            .deployments
            .find_deployment(deployment_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("deployment {deployment_id} not found")))?;

        if deployment.project_id() != identity.project_id() {
            return Err(AppError::Forbidden(
                "deployment belongs to another project".to_owned(),
            ));
        }

        Ok(deployment)
    }

    /// Lists audit log entries for the caller's project.
    pub async fn logs(
        &self,
        identity: &AdminIdentity,
        query: LogQuery,
    ) -> AppResult<Vec<LogEntry>> {
        self.logs.list_logs(identity.project_id(), query).await
    }

    async fn run_steps(
        &self,
        project: &Project,
        deployment_id: DeploymentId,
        archive: &[u8],
    ) -> AppResult<()> {
        let location = self.artifacts.store(deployment_id, archive).await?;
        self.deployments
            .set_artifact_location(deployment_id, &location)
            .await?;
        self.log_step(
            project.id(),
            deployment_id,
            PipelineStep::Uploaded,
            format!("artifact stored at {location}"),
        )
        .await?;

        let extracted = self.artifacts.extract(&location).await?;
        self.log_step(
            project.id(),
            deployment_id,
            PipelineStep::Extracted,
            "artifact unpacked",
        )
        .await?;

        let manifest = validate_artifact(&extracted.tree, project)?;
        self.log_step(
            project.id(),
            deployment_id,
            PipelineStep::Validated,
            "manifest accepted",
        )
        .await?;

        let release_id = deployment_id.to_string();
        let mut images = ImageRefs::new();
        for target in manifest.targets() {
            let source_dir = extracted.source_dir.join(target.as_str());
            let image = self
                .builder
                .build_and_publish(&source_dir, *target, &release_id)
                .await?;
            images.insert(*target, image);
        }
        self.log_step(
            project.id(),
            deployment_id,
            PipelineStep::ImagesBuilt,
            "container images published",
        )
        .await?;

        let descriptor = self.synthesizer.synthesize(project, &manifest, &images)?;
        self.log_step(
            project.id(),
            deployment_id,
            PipelineStep::ManifestSynthesized,
            "deployment descriptor synthesized",
        )
        .await?;

        self.cluster.apply(&descriptor, &release_id).await?;
        self.log_step(
            project.id(),
            deployment_id,
            PipelineStep::RolledOut,
            "workload healthy",
        )
        .await?;

        Ok(())
    }

    async fn notify_failure(
        &self,
        project: &Project,
        deployment_id: DeploymentId,
        error: &AppError,
    ) {
        let recipients = match self.projects.list_admins(project.id()).await {
            Ok(admins) => admins
                .into_iter()
                .filter_map(|admin| admin.email().map(str::to_owned))
                .collect::<Vec<String>>(),
            Err(error) => {
                warn!(project_id = %project.id(), %error, "could not list admins for notification");
                return;
            }
        };

        if recipients.is_empty() {
            return;
        }

        let subject = format!("Deployment {deployment_id} failed");
        let body = format!(
            "Deployment {deployment_id} for project '{}' failed: {error}",
            project.display_name()
        );
        if let Err(error) = self.notifier.notify(&recipients, &subject, &body).await {
            warn!(project_id = %project.id(), %error, "failure notification was not delivered");
        }
    }

    fn ensure_slot_unused(deployment: &Deployment) -> AppResult<()> {
        if deployment.artifact_location().is_some()
            || deployment.status() != DeploymentStatus::Pending
        {
            return Err(AppError::Conflict(format!(
                "upload slot for deployment {} was already used",
                deployment.id()
            )));
        }
        Ok(())
    }

    async fn require_project(&self, project_id: ProjectId) -> AppResult<Project> {
        self.projects
            .find_project(project_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("project {project_id} not found")))
    }

    async fn project_lock(&self, project_id: ProjectId) -> Arc<Mutex<()>> {
        let mut locks = self.project_locks.lock().await;
        locks
            .entry(project_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn log_step(
        &self,
        project_id: ProjectId,
        deployment_id: DeploymentId,
        step: PipelineStep,
        message: impl Into<String>,
    ) -> AppResult<()> {
        let entry = LogEntry::for_step(project_id, deployment_id, step, message)?;
        self.logs.append_log(entry).await
    }
}

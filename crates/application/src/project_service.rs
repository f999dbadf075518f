//! Project lifecycle and admin membership management.

use std::fmt::Write as _;
use std::sync::Arc;

use helmspan_core::{AdminIdentity, AppError, AppResult, ProjectId};
use helmspan_domain::{LogEntry, NetworkSelector, Project, ProjectAdmin, ProjectInput};
use serde_json::Value;
use tracing::info;

use crate::ledger_ports::{LogRepository, ProjectRepository};

/// Input for registering a new project.
#[derive(Debug, Clone)]
pub struct CreateProjectInput {
    /// Human-readable project name.
    pub display_name: String,
    /// Network the project deploys and bills against.
    pub network: NetworkSelector,
    /// Funding private key material.
    pub funding_key: String,
    /// Starting balance in the smallest monetary unit.
    pub initial_balance: i64,
    /// Free-form engine configuration object.
    pub engine_config: Value,
    /// Optional verified custom domain for the public-facing service.
    pub frontend_domain: Option<String>,
    /// Optional verified custom domain for the API-facing service.
    pub backend_domain: Option<String>,
    /// Subject of the first admin.
    pub admin_subject: String,
    /// Notification email of the first admin.
    pub admin_email: Option<String>,
}

/// A freshly registered project and its bearer credential.
///
/// The token is returned exactly once, at creation.
#[derive(Debug, Clone)]
pub struct CreatedProject {
    /// The persisted project snapshot.
    pub project: Project,
    /// The admin bearer credential for the project.
    pub admin_token: String,
}

/// Input for granting admin rights.
#[derive(Debug, Clone)]
pub struct AddAdminInput {
    /// Stable subject of the new admin.
    pub subject: String,
    /// Notification email of the new admin.
    pub email: Option<String>,
}

/// Manages project records, bearer credentials, and admin memberships.
pub struct ProjectService {
    projects: Arc<dyn ProjectRepository>,
    logs: Arc<dyn LogRepository>,
}

impl ProjectService {
    /// Creates the project service over its ports.
    pub fn new(projects: Arc<dyn ProjectRepository>, logs: Arc<dyn LogRepository>) -> Self {
        Self { projects, logs }
    }

    /// Registers a project with a generated bearer credential and its
    /// first admin.
    pub async fn create_project(&self, input: CreateProjectInput) -> AppResult<CreatedProject> {
        let admin_token = generate_token()?;
        let project = Project::new(ProjectInput {
            id: ProjectId::new(),
            display_name: input.display_name,
            network: input.network,
            funding_key: input.funding_key,
            balance: input.initial_balance,
            engine_config: input.engine_config,
            frontend_domain: input.frontend_domain,
            backend_domain: input.backend_domain,
            admin_token: admin_token.clone(),
        })?;

        let initial_admin =
            ProjectAdmin::new(project.id(), input.admin_subject, input.admin_email)?;
        self.projects
            .create_project(project.clone(), initial_admin)
            .await?;

        let entry = LogEntry::for_project(project.id(), "project", "project registered")?;
        self.logs.append_log(entry).await?;

        info!(project_id = %project.id(), "project registered");
        Ok(CreatedProject {
            project,
            admin_token,
        })
    }

    /// Resolves a bearer credential to an admin identity.
    ///
    /// When a subject is presented it must be an admin of the project the
    /// token belongs to; otherwise the identity is attributed to the
    /// project's first admin.
    pub async fn resolve_token(
        &self,
        admin_token: &str,
        subject: Option<&str>,
    ) -> AppResult<AdminIdentity> {
        let project = self
            .projects
            .find_project_by_admin_token(admin_token)
            .await?
            .ok_or_else(|| AppError::Unauthorized("unknown bearer credential".to_owned()))?;

        let admins = self.projects.list_admins(project.id()).await?;
        let admin = match subject {
            Some(subject) => admins
                .iter()
                .find(|admin| admin.subject().as_str() == subject)
                .ok_or_else(|| {
                    AppError::Forbidden(format!("'{subject}' is not an admin of this project"))
                })?,
            None => admins.first().ok_or_else(|| {
                AppError::Internal("project has no admins on record".to_owned())
            })?,
        };

        Ok(AdminIdentity::new(
            admin.subject().as_str(),
            admin.email().map(str::to_owned),
            project.id(),
        ))
    }

    /// Returns the caller's own project.
    pub async fn project(&self, identity: &AdminIdentity) -> AppResult<Project> {
        self.require_project(identity.project_id()).await
    }

    /// Deletes the caller's project and all dependent records.
    pub async fn delete_project(&self, identity: &AdminIdentity) -> AppResult<()> {
        let project = self.require_project(identity.project_id()).await?;
        self.projects.delete_project(project.id()).await?;
        info!(project_id = %project.id(), "project deleted");
        Ok(())
    }

    /// Lists current admins of the caller's project.
    pub async fn list_admins(&self, identity: &AdminIdentity) -> AppResult<Vec<ProjectAdmin>> {
        self.projects.list_admins(identity.project_id()).await
    }

    /// Grants admin rights on the caller's project.
    pub async fn add_admin(
        &self,
        identity: &AdminIdentity,
        input: AddAdminInput,
    ) -> AppResult<ProjectAdmin> {
        let admin = ProjectAdmin::new(identity.project_id(), input.subject, input.email)?;
        self.projects.add_admin(admin.clone()).await?;

        let entry = LogEntry::for_project(
            identity.project_id(),
            "project",
            format!("admin '{}' added by '{}'", admin.subject(), identity.subject()),
        )?;
        self.logs.append_log(entry).await?;
        Ok(admin)
    }

    /// Revokes admin rights on the caller's project.
    ///
    /// The repository refuses to remove the last remaining admin.
    pub async fn remove_admin(&self, identity: &AdminIdentity, subject: &str) -> AppResult<()> {
        self.projects
            .remove_admin(identity.project_id(), subject)
            .await?;

        let entry = LogEntry::for_project(
            identity.project_id(),
            "project",
            format!("admin '{subject}' removed by '{}'", identity.subject()),
        )?;
        self.logs.append_log(entry).await
    }

    async fn require_project(&self, project_id: ProjectId) -> AppResult<Project> {
        self.projects
            .find_project(project_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("project {project_id} not found")))
    }
}

fn generate_token() -> AppResult<String> {
    let mut bytes = [0u8; 32];
    getrandom::fill(&mut bytes)
        .map_err(|error| AppError::Internal(format!("failed to generate token: {error}")))?;

    let mut token = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(token, "{byte:02x}");
    }
    Ok(token)
}

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use helmspan_core::{AppResult, ProjectId};
use helmspan_domain::{Project, ProjectAdmin};

/// Repository port for project records and admin memberships.
#[async_trait]
pub trait ProjectRepository: Send + Sync {
    /// Creates a project together with its first admin.
    async fn create_project(&self, project: Project, initial_admin: ProjectAdmin)
    -> AppResult<()>;

    /// Returns one project by id.
    async fn find_project(&self, project_id: ProjectId) -> AppResult<Option<Project>>;

    /// Returns the project owning an admin bearer credential.
    async fn find_project_by_admin_token(&self, admin_token: &str)
    -> AppResult<Option<Project>>;

    /// Lists every project id, for the billing tick.
    async fn list_project_ids(&self) -> AppResult<Vec<ProjectId>>;

    /// Deletes a project and all dependent records.
    async fn delete_project(&self, project_id: ProjectId) -> AppResult<()>;

    /// Lists current admins of a project.
    async fn list_admins(&self, project_id: ProjectId) -> AppResult<Vec<ProjectAdmin>>;

    /// Adds an admin membership.
    async fn add_admin(&self, admin: ProjectAdmin) -> AppResult<()>;

    /// Removes an admin membership.
    ///
    /// Removing the last remaining admin fails with a conflict; a project
    /// must always keep at least one admin.
    async fn remove_admin(&self, project_id: ProjectId, subject: &str) -> AppResult<()>;
}

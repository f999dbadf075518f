//! PostgreSQL-backed project and admin membership repository.

use async_trait::async_trait;
use helmspan_application::ProjectRepository;
use helmspan_core::{AppError, AppResult, ProjectId};
use helmspan_domain::{NetworkSelector, Project, ProjectAdmin, ProjectInput};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

/// PostgreSQL-backed project repository.
#[derive(Clone)]
pub struct PostgresProjectRepository {
    pool: PgPool,
}

impl PostgresProjectRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ProjectRow {
    id: Uuid,
    display_name: String,
    network: String,
    funding_key: String,
    balance: i64,
    engine_config: Value,
    frontend_domain: Option<String>,
    backend_domain: Option<String>,
    admin_token: String,
}

impl ProjectRow {
    fn into_project(self) -> AppResult<Project> {
        Project::new(ProjectInput {
            id: ProjectId::from_uuid(self.id),
            display_name: self.display_name,
            network: NetworkSelector::parse(self.network.as_str())?,
            funding_key: self.funding_key,
            balance: self.balance,
            engine_config: self.engine_config,
            frontend_domain: self.frontend_domain,
            backend_domain: self.backend_domain,
            admin_token: self.admin_token,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AdminRow {
    project_id: Uuid,
    subject: String,
    email: Option<String>,
}

impl AdminRow {
    fn into_admin(self) -> AppResult<ProjectAdmin> {
        ProjectAdmin::new(ProjectId::from_uuid(self.project_id), self.subject, self.email)
    }
}

const PROJECT_COLUMNS: &str = "id, display_name, network, funding_key, balance, engine_config, \
                               frontend_domain, backend_domain, admin_token";

#[async_trait]
impl ProjectRepository for PostgresProjectRepository {
    async fn create_project(
        &self,
        project: Project,
        initial_admin: ProjectAdmin,
    ) -> AppResult<()> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to begin transaction: {error}"))
        })?;

        sqlx::query(
            r#"
            INSERT INTO projects (
                id, display_name, network, funding_key, balance,
                engine_config, frontend_domain, backend_domain, admin_token
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(project.id().as_uuid())
        .bind(project.display_name().as_str())
        .bind(project.network().as_str())
        .bind(project.funding_key().as_str())
        .bind(project.balance())
        .bind(project.engine_config())
        .bind(project.frontend_domain())
        .bind(project.backend_domain())
        .bind(project.admin_token().as_str())
        .execute(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to create project: {error}")))?;

        sqlx::query(
            r#"
            INSERT INTO project_admins (project_id, subject, email)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(initial_admin.project_id().as_uuid())
        .bind(initial_admin.subject().as_str())
        .bind(initial_admin.email())
        .execute(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to create first admin: {error}")))?;

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit transaction: {error}"))
        })?;

        Ok(())
    }

    async fn find_project(&self, project_id: ProjectId) -> AppResult<Option<Project>> {
        let row = sqlx::query_as::<_, ProjectRow>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1"
        ))
        .bind(project_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load project: {error}")))?;

        row.map(ProjectRow::into_project).transpose()
    }

    async fn find_project_by_admin_token(&self, admin_token: &str) -> AppResult<Option<Project>> {
        let row = sqlx::query_as::<_, ProjectRow>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE admin_token = $1"
        ))
        .bind(admin_token)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to resolve bearer credential: {error}"))
        })?;

        row.map(ProjectRow::into_project).transpose()
    }

    async fn list_project_ids(&self) -> AppResult<Vec<ProjectId>> {
        let ids = sqlx::query_scalar::<_, Uuid>("SELECT id FROM projects ORDER BY created_at")
            .fetch_all(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to list projects: {error}"))
            })?;

        Ok(ids.into_iter().map(ProjectId::from_uuid).collect())
    }

    async fn delete_project(&self, project_id: ProjectId) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(project_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to delete project: {error}"))
            })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "project {project_id} not found"
            )));
        }

        Ok(())
    }

    async fn list_admins(&self, project_id: ProjectId) -> AppResult<Vec<ProjectAdmin>> {
        let rows = sqlx::query_as::<_, AdminRow>(
            r#"
            SELECT project_id, subject, email
            FROM project_admins
            WHERE project_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(project_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list admins: {error}")))?;

        rows.into_iter().map(AdminRow::into_admin).collect()
    }

    async fn add_admin(&self, admin: ProjectAdmin) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO project_admins (project_id, subject, email)
            VALUES ($1, $2, $3)
            ON CONFLICT (project_id, subject) DO NOTHING
            "#,
        )
        .bind(admin.project_id().as_uuid())
        .bind(admin.subject().as_str())
        .bind(admin.email())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to add admin: {error}")))?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict(format!(
                "'{}' is already an admin",
                admin.subject()
            )));
        }

        Ok(())
    }

    async fn remove_admin(&self, project_id: ProjectId, subject: &str) -> AppResult<()> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to begin transaction: {error}"))
        })?;

        // Lock the membership rows so two concurrent removals cannot both
        // observe more than one remaining admin.
        let subjects = sqlx::query_scalar::<_, String>(
            r#"
            SELECT subject
            FROM project_admins
            WHERE project_id = $1
            FOR UPDATE
            "#,
        )
        .bind(project_id.as_uuid())
        .fetch_all(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to lock admins: {error}")))?;

        if !subjects.iter().any(|stored| stored == subject) {
            return Err(AppError::NotFound(format!("admin '{subject}' not found")));
        }

        if subjects.len() <= 1 {
            return Err(AppError::Conflict(
                "a project must keep at least one admin".to_owned(),
            ));
        }

        sqlx::query("DELETE FROM project_admins WHERE project_id = $1 AND subject = $2")
            .bind(project_id.as_uuid())
            .bind(subject)
            .execute(&mut *transaction)
            .await
            .map_err(|error| AppError::Internal(format!("failed to remove admin: {error}")))?;

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit transaction: {error}"))
        })?;

        Ok(())
    }
}

//! PostgreSQL-backed deployment attempt repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use helmspan_application::DeploymentRepository;
use helmspan_core::{AppError, AppResult, DeploymentId, ProjectId};
use helmspan_domain::{Deployment, DeploymentStatus};
use sqlx::PgPool;
use uuid::Uuid;

/// PostgreSQL-backed deployment repository.
#[derive(Clone)]
pub struct PostgresDeploymentRepository {
    pool: PgPool,
}

impl PostgresDeploymentRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct DeploymentRow {
    id: Uuid,
    project_id: Uuid,
    created_by: String,
    artifact_location: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
}

impl DeploymentRow {
    fn into_deployment(self) -> AppResult<Deployment> {
        Deployment::from_parts(
            DeploymentId::from_uuid(self.id),
            ProjectId::from_uuid(self.project_id),
            self.created_by,
            self.artifact_location,
            DeploymentStatus::parse(self.status.as_str())?,
            self.created_at,
        )
    }
}

#[async_trait]
impl DeploymentRepository for PostgresDeploymentRepository {
    async fn create_deployment(&self, deployment: Deployment) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO deployments (id, project_id, created_by, artifact_location, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(deployment.id().as_uuid())
        .bind(deployment.project_id().as_uuid())
        .bind(deployment.created_by().as_str())
        .bind(deployment.artifact_location())
        .bind(deployment.status().as_str())
        .bind(deployment.created_at())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to create deployment: {error}")))?;

        Ok(())
    }

    async fn find_deployment(
        &self,
        deployment_id: DeploymentId,
    ) -> AppResult<Option<Deployment>> {
        let row = sqlx::query_as::<_, DeploymentRow>(
            r#"
            SELECT id, project_id, created_by, artifact_location, status, created_at
            FROM deployments
            WHERE id = $1
            "#,
        )
        .bind(deployment_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load deployment: {error}")))?;

        row.map(DeploymentRow::into_deployment).transpose()
    }

    async fn set_artifact_location(
        &self,
        deployment_id: DeploymentId,
        location: &str,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE deployments
            SET artifact_location = $2
            WHERE id = $1 AND artifact_location IS NULL
            "#,
        )
        .bind(deployment_id.as_uuid())
        .bind(location)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to record artifact location: {error}"))
        })?;

        if result.rows_affected() == 0 {
            return match self.find_deployment(deployment_id).await? {
                Some(_) => Err(AppError::Conflict(format!(
                    "artifact for deployment {deployment_id} was already recorded"
                ))),
                None => Err(AppError::NotFound(format!(
                    "deployment {deployment_id} not found"
                ))),
            };
        }

        Ok(())
    }

    async fn set_status(
        &self,
        deployment_id: DeploymentId,
        status: DeploymentStatus,
    ) -> AppResult<()> {
        let result = sqlx::query("UPDATE deployments SET status = $2 WHERE id = $1")
            .bind(deployment_id.as_uuid())
            .bind(status.as_str())
            .execute(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to update deployment status: {error}"))
            })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "deployment {deployment_id} not found"
            )));
        }

        Ok(())
    }
}

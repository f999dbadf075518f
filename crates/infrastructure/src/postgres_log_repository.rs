//! PostgreSQL-backed audit log repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use helmspan_application::{LogQuery, LogRepository};
use helmspan_core::{AppError, AppResult, DeploymentId, ProjectId};
use helmspan_domain::LogEntry;
use sqlx::PgPool;
use uuid::Uuid;

/// PostgreSQL-backed append-only audit log.
#[derive(Clone)]
pub struct PostgresLogRepository {
    pool: PgPool,
}

impl PostgresLogRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct LogRow {
    project_id: Uuid,
    deployment_id: Option<Uuid>,
    label: String,
    message: String,
    created_at: DateTime<Utc>,
}

impl LogRow {
    fn into_entry(self) -> AppResult<LogEntry> {
        LogEntry::from_parts(
            ProjectId::from_uuid(self.project_id),
            self.deployment_id.map(DeploymentId::from_uuid),
            self.label,
            self.message,
            self.created_at,
        )
    }
}

#[async_trait]
impl LogRepository for PostgresLogRepository {
    async fn append_log(&self, entry: LogEntry) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (project_id, deployment_id, label, message, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(entry.project_id().as_uuid())
        .bind(entry.deployment_id().map(|id| id.as_uuid()))
        .bind(entry.label().as_str())
        .bind(entry.message())
        .bind(entry.created_at())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to append log entry: {error}")))?;

        Ok(())
    }

    async fn list_logs(
        &self,
        project_id: ProjectId,
        query: LogQuery,
    ) -> AppResult<Vec<LogEntry>> {
        let rows = sqlx::query_as::<_, LogRow>(
            r#"
            SELECT project_id, deployment_id, label, message, created_at
            FROM audit_logs
            WHERE project_id = $1
              AND ($2::uuid IS NULL OR deployment_id = $2)
            ORDER BY id DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(project_id.as_uuid())
        .bind(query.deployment_id.map(|id| id.as_uuid()))
        .bind(i64::try_from(query.limit).unwrap_or(i64::MAX))
        .bind(i64::try_from(query.offset).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list log entries: {error}")))?;

        rows.into_iter().map(LogRow::into_entry).collect()
    }
}

//! PostgreSQL-backed accounting ledger.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use helmspan_application::{AccountingRepository, LedgerQuery};
use helmspan_core::{AppError, AppResult, DeploymentId, ProjectId};
use helmspan_domain::{AccountingEntry, EntryKind};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

/// PostgreSQL-backed append-only accounting ledger.
///
/// Balance mutation and entry append share one transaction: the project row
/// is locked, the balance updated, and the entry inserted with the balance
/// that resulted, so `balance_after` of the latest entry always equals the
/// stored balance.
#[derive(Clone)]
pub struct PostgresAccountingRepository {
    pool: PgPool,
}

impl PostgresAccountingRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn apply_entry(
        &self,
        project_id: ProjectId,
        kind: EntryKind,
        amount: i64,
        deployment_id: Option<DeploymentId>,
        metadata: Value,
    ) -> AppResult<AccountingEntry> {
        if amount <= 0 {
            return Err(AppError::Validation(
                "accounting entry amount must be strictly positive".to_owned(),
            ));
        }

        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to begin transaction: {error}"))
        })?;

        let balance = sqlx::query_scalar::<_, i64>(
            "SELECT balance FROM projects WHERE id = $1 FOR UPDATE",
        )
        .bind(project_id.as_uuid())
        .fetch_optional(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to lock project row: {error}")))?
        .ok_or_else(|| AppError::NotFound(format!("project {project_id} not found")))?;

        let new_balance = match kind {
            EntryKind::Debit => balance - amount,
            EntryKind::Credit => balance + amount,
        };

        sqlx::query("UPDATE projects SET balance = $2 WHERE id = $1")
            .bind(project_id.as_uuid())
            .bind(new_balance)
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to update balance: {error}"))
            })?;

        let created_at = sqlx::query_scalar::<_, DateTime<Utc>>(
            r#"
            INSERT INTO accounting_entries
                (project_id, deployment_id, kind, amount, balance_after, metadata)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING created_at
            "#,
        )
        .bind(project_id.as_uuid())
        .bind(deployment_id.map(|id| id.as_uuid()))
        .bind(kind.as_str())
        .bind(amount)
        .bind(new_balance)
        .bind(&metadata)
        .fetch_one(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to append ledger entry: {error}"))
        })?;

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit transaction: {error}"))
        })?;

        AccountingEntry::from_parts(
            project_id,
            deployment_id,
            kind,
            amount,
            new_balance,
            metadata,
            created_at,
        )
    }
}

#[derive(sqlx::FromRow)]
struct EntryRow {
    project_id: Uuid,
    deployment_id: Option<Uuid>,
    kind: String,
    amount: i64,
    balance_after: i64,
    metadata: Value,
    created_at: DateTime<Utc>,
}

impl EntryRow {
    fn into_entry(self) -> AppResult<AccountingEntry> {
        AccountingEntry::from_parts(
            ProjectId::from_uuid(self.project_id),
            self.deployment_id.map(DeploymentId::from_uuid),
            EntryKind::parse(self.kind.as_str())?,
            self.amount,
            self.balance_after,
            self.metadata,
            self.created_at,
        )
    }
}

#[async_trait]
impl AccountingRepository for PostgresAccountingRepository {
    async fn debit(
        &self,
        project_id: ProjectId,
        amount: i64,
        deployment_id: Option<DeploymentId>,
        metadata: Value,
    ) -> AppResult<AccountingEntry> {
        self.apply_entry(project_id, EntryKind::Debit, amount, deployment_id, metadata)
            .await
    }

    async fn credit(
        &self,
        project_id: ProjectId,
        amount: i64,
        deployment_id: Option<DeploymentId>,
        metadata: Value,
    ) -> AppResult<AccountingEntry> {
        self.apply_entry(project_id, EntryKind::Credit, amount, deployment_id, metadata)
            .await
    }

    async fn list_entries(
        &self,
        project_id: ProjectId,
        query: LedgerQuery,
    ) -> AppResult<Vec<AccountingEntry>> {
        let rows = sqlx::query_as::<_, EntryRow>(
            r#"
            SELECT project_id, deployment_id, kind, amount, balance_after, metadata, created_at
            FROM accounting_entries
            WHERE project_id = $1
            ORDER BY id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(project_id.as_uuid())
        .bind(i64::try_from(query.limit).unwrap_or(i64::MAX))
        .bind(i64::try_from(query.offset).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list ledger entries: {error}")))?;

        rows.into_iter().map(EntryRow::into_entry).collect()
    }
}

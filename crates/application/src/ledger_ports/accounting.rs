use async_trait::async_trait;
use helmspan_core::{AppResult, DeploymentId, ProjectId};
use helmspan_domain::AccountingEntry;
use serde_json::Value;

/// Page filter for reading billing history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerQuery {
    /// Maximum number of entries to return.
    pub limit: usize,
    /// Number of entries to skip.
    pub offset: usize,
}

/// Repository port for the append-only accounting ledger.
///
/// Balance mutation and entry append happen in one transaction scoped to
/// the project row, so the latest entry's `balance_after` always equals the
/// stored balance.
#[async_trait]
pub trait AccountingRepository: Send + Sync {
    /// Atomically debits the project balance and appends the debit entry.
    async fn debit(
        &self,
        project_id: ProjectId,
        amount: i64,
        deployment_id: Option<DeploymentId>,
        metadata: Value,
    ) -> AppResult<AccountingEntry>;

    /// Atomically credits the project balance and appends the credit entry.
    async fn credit(
        &self,
        project_id: ProjectId,
        amount: i64,
        deployment_id: Option<DeploymentId>,
        metadata: Value,
    ) -> AppResult<AccountingEntry>;

    /// Lists ledger entries for a project, newest first.
    async fn list_entries(
        &self,
        project_id: ProjectId,
        query: LedgerQuery,
    ) -> AppResult<Vec<AccountingEntry>>;
}

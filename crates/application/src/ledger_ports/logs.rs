use async_trait::async_trait;
use helmspan_core::{AppResult, DeploymentId, ProjectId};
use helmspan_domain::LogEntry;

/// Filter for reading the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogQuery {
    /// Restrict to one deployment; `None` returns all project entries.
    pub deployment_id: Option<DeploymentId>,
    /// Maximum number of entries to return.
    pub limit: usize,
    /// Number of entries to skip.
    pub offset: usize,
}

/// Repository port for the append-only audit log.
#[async_trait]
pub trait LogRepository: Send + Sync {
    /// Appends one audit entry.
    async fn append_log(&self, entry: LogEntry) -> AppResult<()>;

    /// Lists audit entries for a project, newest first.
    async fn list_logs(&self, project_id: ProjectId, query: LogQuery)
    -> AppResult<Vec<LogEntry>>;
}

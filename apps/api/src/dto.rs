use chrono::{DateTime, Utc};
use helmspan_domain::{AccountingEntry, Deployment, LogEntry, Project, ProjectAdmin};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub display_name: String,
    pub network: String,
    pub funding_key: String,
    pub initial_balance: i64,
    pub engine_config: Value,
    pub frontend_domain: Option<String>,
    pub backend_domain: Option<String>,
    pub admin_subject: String,
    pub admin_email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProjectResponse {
    pub id: Uuid,
    pub display_name: String,
    pub network: String,
    pub balance: i64,
    pub frontend_domain: Option<String>,
    pub backend_domain: Option<String>,
}

impl From<Project> for ProjectResponse {
    fn from(value: Project) -> Self {
        Self {
            id: value.id().as_uuid(),
            display_name: value.display_name().as_str().to_owned(),
            network: value.network().as_str().to_owned(),
            balance: value.balance(),
            frontend_domain: value.frontend_domain().map(str::to_owned),
            backend_domain: value.backend_domain().map(str::to_owned),
        }
    }
}

/// The admin token is returned here and never again.
#[derive(Debug, Serialize)]
pub struct CreateProjectResponse {
    pub project: ProjectResponse,
    pub admin_token: String,
}

#[derive(Debug, Serialize)]
pub struct AdminResponse {
    pub subject: String,
    pub email: Option<String>,
}

impl From<ProjectAdmin> for AdminResponse {
    fn from(value: ProjectAdmin) -> Self {
        Self {
            subject: value.subject().as_str().to_owned(),
            email: value.email().map(str::to_owned),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AddAdminRequest {
    pub subject: String,
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct IssueSlotResponse {
    pub deployment_id: Uuid,
    pub signature: String,
    pub upload_path: String,
}

#[derive(Debug, Serialize)]
pub struct DeploymentResponse {
    pub id: Uuid,
    pub status: String,
    pub artifact_uploaded: bool,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl From<Deployment> for DeploymentResponse {
    fn from(value: Deployment) -> Self {
        Self {
            id: value.id().as_uuid(),
            status: value.status().as_str().to_owned(),
            artifact_uploaded: value.artifact_location().is_some(),
            created_by: value.created_by().as_str().to_owned(),
            created_at: value.created_at(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LogEntryResponse {
    pub deployment_id: Option<Uuid>,
    pub label: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl From<LogEntry> for LogEntryResponse {
    fn from(value: LogEntry) -> Self {
        Self {
            deployment_id: value.deployment_id().map(|id| id.as_uuid()),
            label: value.label().as_str().to_owned(),
            message: value.message().to_owned(),
            created_at: value.created_at(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LedgerEntryResponse {
    pub deployment_id: Option<Uuid>,
    pub kind: String,
    pub amount: i64,
    pub balance_after: i64,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

impl From<AccountingEntry> for LedgerEntryResponse {
    fn from(value: AccountingEntry) -> Self {
        Self {
            deployment_id: value.deployment_id().map(|id| id.as_uuid()),
            kind: value.kind().as_str().to_owned(),
            amount: value.amount(),
            balance_after: value.balance_after(),
            metadata: value.metadata().clone(),
            created_at: value.created_at(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TopUpRequest {
    pub amount: i64,
}

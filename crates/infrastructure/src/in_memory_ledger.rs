//! In-memory ledger store for tests and local development.

use std::collections::HashMap;

use async_trait::async_trait;
use helmspan_application::{
    AccountingRepository, DeploymentRepository, LedgerQuery, LogQuery, LogRepository,
    ProjectRepository,
};
use helmspan_core::{AppError, AppResult, DeploymentId, ProjectId};
use helmspan_domain::{
    AccountingEntry, Deployment, DeploymentStatus, EntryKind, LogEntry, Project, ProjectAdmin,
};
use serde_json::Value;
use tokio::sync::RwLock;

/// In-memory implementation of every ledger port.
///
/// One lock guards all tables so a debit updates the project balance and
/// appends the entry under the same critical section, matching the
/// transactional coupling of the durable adapter.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    state: RwLock<LedgerState>,
}

#[derive(Debug, Default)]
struct LedgerState {
    projects: HashMap<ProjectId, Project>,
    admins: Vec<ProjectAdmin>,
    deployments: HashMap<DeploymentId, Deployment>,
    logs: Vec<LogEntry>,
    entries: Vec<AccountingEntry>,
}

impl InMemoryLedger {
    /// Creates an empty in-memory ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    async fn apply_entry(
        &self,
        project_id: ProjectId,
        kind: EntryKind,
        amount: i64,
        deployment_id: Option<DeploymentId>,
        metadata: Value,
    ) -> AppResult<AccountingEntry> {
        let mut state = self.state.write().await;
        let project = state
            .projects
            .get(&project_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("project {project_id} not found")))?;

        let new_balance = match kind {
            EntryKind::Debit => project.balance() - amount,
            EntryKind::Credit => project.balance() + amount,
        };
        let entry =
            AccountingEntry::new(project_id, deployment_id, kind, amount, new_balance, metadata)?;

        state
            .projects
            .insert(project_id, project.with_balance(new_balance));
        state.entries.push(entry.clone());
        Ok(entry)
    }
}

#[async_trait]
impl ProjectRepository for InMemoryLedger {
    async fn create_project(
        &self,
        project: Project,
        initial_admin: ProjectAdmin,
    ) -> AppResult<()> {
        let mut state = self.state.write().await;
        if state.projects.contains_key(&project.id()) {
            return Err(AppError::Conflict(format!(
                "project {} already exists",
                project.id()
            )));
        }

        state.projects.insert(project.id(), project);
        state.admins.push(initial_admin);
        Ok(())
    }

    async fn find_project(&self, project_id: ProjectId) -> AppResult<Option<Project>> {
        Ok(self.state.read().await.projects.get(&project_id).cloned())
    }

    async fn find_project_by_admin_token(&self, admin_token: &str) -> AppResult<Option<Project>> {
        Ok(self
            .state
            .read()
            .await
            .projects
            .values()
            .find(|project| project.admin_token().as_str() == admin_token)
            .cloned())
    }

    async fn list_project_ids(&self) -> AppResult<Vec<ProjectId>> {
        let mut ids: Vec<ProjectId> =
            self.state.read().await.projects.keys().copied().collect();
        ids.sort_by_key(ProjectId::to_string);
        Ok(ids)
    }

    async fn delete_project(&self, project_id: ProjectId) -> AppResult<()> {
        let mut state = self.state.write().await;
        if state.projects.remove(&project_id).is_none() {
            return Err(AppError::NotFound(format!(
                "project {project_id} not found"
            )));
        }

        state.admins.retain(|admin| admin.project_id() != project_id);
        state
            .deployments
            .retain(|_, deployment| deployment.project_id() != project_id);
        state.logs.retain(|entry| entry.project_id() != project_id);
        state
            .entries
            .retain(|entry| entry.project_id() != project_id);
        Ok(())
    }

    async fn list_admins(&self, project_id: ProjectId) -> AppResult<Vec<ProjectAdmin>> {
        Ok(self
            .state
            .read()
            .await
            .admins
            .iter()
            .filter(|admin| admin.project_id() == project_id)
            .cloned()
            .collect())
    }

    async fn add_admin(&self, admin: ProjectAdmin) -> AppResult<()> {
        let mut state = self.state.write().await;
        let duplicate = state.admins.iter().any(|existing| {
            existing.project_id() == admin.project_id()
                && existing.subject().as_str() == admin.subject().as_str()
        });
        if duplicate {
            return Err(AppError::Conflict(format!(
                "'{}' is already an admin",
                admin.subject()
            )));
        }

        state.admins.push(admin);
        Ok(())
    }

    async fn remove_admin(&self, project_id: ProjectId, subject: &str) -> AppResult<()> {
        let mut state = self.state.write().await;
        let members: Vec<usize> = state
            .admins
            .iter()
            .enumerate()
            .filter(|(_, admin)| admin.project_id() == project_id)
            .map(|(index, _)| index)
            .collect();

        let target = state
            .admins
            .iter()
            .position(|admin| {
                admin.project_id() == project_id && admin.subject().as_str() == subject
            })
            .ok_or_else(|| AppError::NotFound(format!("admin '{subject}' not found")))?;

        if members.len() <= 1 {
            return Err(AppError::Conflict(
                "a project must keep at least one admin".to_owned(),
            ));
        }

        state.admins.remove(target);
        Ok(())
    }
}

#[async_trait]
impl DeploymentRepository for InMemoryLedger {
    async fn create_deployment(&self, deployment: Deployment) -> AppResult<()> {
        let mut state = self.state.write().await;
        if state.deployments.contains_key(&deployment.id()) {
            return Err(AppError::Conflict(format!(
                "deployment {} already exists",
                deployment.id()
            )));
        }

        state.deployments.insert(deployment.id(), deployment);
        Ok(())
    }

    async fn find_deployment(
        &self,
        deployment_id: DeploymentId,
    ) -> AppResult<Option<Deployment>> {
        Ok(self
            .state
            .read()
            .await
            .deployments
            .get(&deployment_id)
            .cloned())
    }

    async fn set_artifact_location(
        &self,
        deployment_id: DeploymentId,
        location: &str,
    ) -> AppResult<()> {
        let mut state = self.state.write().await;
        let current = state
            .deployments
            .get(&deployment_id)
            .cloned()
            .ok_or_else(|| {
                AppError::NotFound(format!("deployment {deployment_id} not found"))
            })?;

        if current.artifact_location().is_some() {
            return Err(AppError::Conflict(format!(
                "artifact for deployment {deployment_id} was already recorded"
            )));
        }

        let updated = Deployment::from_parts(
            current.id(),
            current.project_id(),
            current.created_by().as_str(),
            Some(location.to_owned()),
            current.status(),
            current.created_at(),
        )?;
        state.deployments.insert(deployment_id, updated);
        Ok(())
    }

    async fn set_status(
        &self,
        deployment_id: DeploymentId,
        status: DeploymentStatus,
    ) -> AppResult<()> {
        let mut state = self.state.write().await;
        let current = state
            .deployments
            .get(&deployment_id)
            .cloned()
            .ok_or_else(|| {
                AppError::NotFound(format!("deployment {deployment_id} not found"))
            })?;

        let updated = Deployment::from_parts(
            current.id(),
            current.project_id(),
            current.created_by().as_str(),
            current.artifact_location().map(str::to_owned),
            status,
            current.created_at(),
        )?;
        state.deployments.insert(deployment_id, updated);
        Ok(())
    }
}

#[async_trait]
impl LogRepository for InMemoryLedger {
    async fn append_log(&self, entry: LogEntry) -> AppResult<()> {
        self.state.write().await.logs.push(entry);
        Ok(())
    }

    async fn list_logs(
        &self,
        project_id: ProjectId,
        query: LogQuery,
    ) -> AppResult<Vec<LogEntry>> {
        let state = self.state.read().await;
        let mut matching: Vec<LogEntry> = state
            .logs
            .iter()
            .filter(|entry| entry.project_id() == project_id)
            .filter(|entry| {
                query
                    .deployment_id
                    .is_none_or(|id| entry.deployment_id() == Some(id))
            })
            .cloned()
            .collect();
        matching.reverse();
        Ok(matching
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .collect())
    }
}

#[async_trait]
impl AccountingRepository for InMemoryLedger {
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
        let state = self.state.read().await;
        let mut matching: Vec<AccountingEntry> = state
            .entries
            .iter()
            .filter(|entry| entry.project_id() == project_id)
            .cloned()
            .collect();
        matching.reverse();
        Ok(matching
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .collect())
    }
}

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use async_trait::async_trait;
use helmspan_core::{AppError, AppResult, ProjectId};
use helmspan_domain::{LogEntry, NetworkSelector, Project, ProjectAdmin};
use serde_json::json;

use crate::ledger_ports::{LogQuery, LogRepository, ProjectRepository};

use super::{AddAdminInput, CreateProjectInput, ProjectService};

#[derive(Default)]
struct FakeProjects {
    projects: StdMutex<HashMap<ProjectId, Project>>,
    admins: StdMutex<Vec<ProjectAdmin>>,
}

#[async_trait]
impl ProjectRepository for FakeProjects {
    async fn create_project(
        &self,
        project: Project,
        initial_admin: ProjectAdmin,
    ) -> AppResult<()> {
        self.projects
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(project.id(), project);
        self.admins
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(initial_admin);
        Ok(())
    }

    async fn find_project(&self, project_id: ProjectId) -> AppResult<Option<Project>> {
        Ok(self
            .projects
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&project_id)
            .cloned())
    }

    async fn find_project_by_admin_token(&self, admin_token: &str) -> AppResult<Option<Project>> {
        Ok(self
            .projects
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .values()
            .find(|project| project.admin_token().as_str() == admin_token)
            .cloned())
    }

    async fn list_project_ids(&self) -> AppResult<Vec<ProjectId>> {
        Ok(self
            .projects
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .keys()
            .copied()
            .collect())
    }

    async fn delete_project(&self, project_id: ProjectId) -> AppResult<()> {
        self.projects
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&project_id);
        self.admins
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .retain(|admin| admin.project_id() != project_id);
        Ok(())
    }

    async fn list_admins(&self, project_id: ProjectId) -> AppResult<Vec<ProjectAdmin>> {
        Ok(self
            .admins
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .filter(|admin| admin.project_id() == project_id)
            .cloned()
            .collect())
    }

    async fn add_admin(&self, admin: ProjectAdmin) -> AppResult<()> {
        self.admins
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(admin);
        Ok(())
    }

    async fn remove_admin(&self, project_id: ProjectId, subject: &str) -> AppResult<()> {
        let mut admins = self
            .admins
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let remaining = admins
            .iter()
            .filter(|admin| admin.project_id() == project_id)
            .count();
        if remaining <= 1 {
            return Err(AppError::Conflict(
                "a project must keep at least one admin".to_owned(),
            ));
        }
        admins.retain(|admin| {
            admin.project_id() != project_id || admin.subject().as_str() != subject
        });
        Ok(())
    }
}

#[derive(Default)]
struct FakeLogs {
    entries: StdMutex<Vec<LogEntry>>,
}

#[async_trait]
impl LogRepository for FakeLogs {
    async fn append_log(&self, entry: LogEntry) -> AppResult<()> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(entry);
        Ok(())
    }

    async fn list_logs(
        &self,
        project_id: ProjectId,
        query: LogQuery,
    ) -> AppResult<Vec<LogEntry>> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .filter(|entry| entry.project_id() == project_id)
            .skip(query.offset)
            .take(query.limit)
            .cloned()
            .collect())
    }
}

fn service() -> ProjectService {
    ProjectService::new(
        Arc::new(FakeProjects::default()),
        Arc::new(FakeLogs::default()),
    )
}

fn create_input() -> CreateProjectInput {
    CreateProjectInput {
        display_name: "Orbit Shop".to_owned(),
        network: NetworkSelector::Test,
        funding_key: "fk".to_owned(),
        initial_balance: 1_000,
        engine_config: json!({}),
        frontend_domain: None,
        backend_domain: None,
        admin_subject: "alice".to_owned(),
        admin_email: Some("alice@example.com".to_owned()),
    }
}

#[tokio::test]
async fn create_project_issues_a_hex_token_and_first_admin() {
    let service = service();
    let created = service
        .create_project(create_input())
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(created.admin_token.len(), 64);
    assert!(created.admin_token.chars().all(|c| c.is_ascii_hexdigit()));

    let identity = service
        .resolve_token(&created.admin_token, None)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(identity.subject(), "alice");
    assert_eq!(identity.project_id(), created.project.id());

    let admins = service
        .list_admins(&identity)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(admins.len(), 1);
}

#[tokio::test]
async fn resolve_token_rejects_unknown_credentials() {
    let service = service();
    let result = service.resolve_token("not-a-token", None).await;
    assert!(matches!(result, Err(AppError::Unauthorized(_))));
}

#[tokio::test]
async fn resolve_token_rejects_subjects_outside_the_project() {
    let service = service();
    let created = service
        .create_project(create_input())
        .await
        .unwrap_or_else(|_| unreachable!());

    let result = service
        .resolve_token(&created.admin_token, Some("mallory"))
        .await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));
}

#[tokio::test]
async fn admins_can_be_added_and_removed_but_never_the_last_one() {
    let service = service();
    let created = service
        .create_project(create_input())
        .await
        .unwrap_or_else(|_| unreachable!());
    let identity = service
        .resolve_token(&created.admin_token, None)
        .await
        .unwrap_or_else(|_| unreachable!());

    let last_removal = service.remove_admin(&identity, "alice").await;
    assert!(matches!(last_removal, Err(AppError::Conflict(_))));

    service
        .add_admin(
            &identity,
            AddAdminInput {
                subject: "bob".to_owned(),
                email: None,
            },
        )
        .await
        .unwrap_or_else(|_| unreachable!());

    service
        .remove_admin(&identity, "alice")
        .await
        .unwrap_or_else(|_| unreachable!());

    let admins = service
        .list_admins(&identity)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(admins.len(), 1);
    assert_eq!(admins[0].subject().as_str(), "bob");
}

#[tokio::test]
async fn tokens_are_unique_per_project() {
    let service = service();
    let first = service
        .create_project(create_input())
        .await
        .unwrap_or_else(|_| unreachable!());
    let second = service
        .create_project(create_input())
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_ne!(first.admin_token, second.admin_token);
}

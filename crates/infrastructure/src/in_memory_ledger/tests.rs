use helmspan_application::{
    AccountingRepository, DeploymentRepository, LedgerQuery, LogQuery, LogRepository,
    ProjectRepository,
};
use helmspan_core::{AppError, DeploymentId, ProjectId};
use helmspan_domain::{
    Deployment, DeploymentStatus, EntryKind, LogEntry, NetworkSelector, PipelineStep, Project,
    ProjectAdmin, ProjectInput,
};
use serde_json::json;

use super::InMemoryLedger;

fn project(token: &str) -> Project {
    Project::new(ProjectInput {
        id: ProjectId::new(),
        display_name: "Orbit Shop".to_owned(),
        network: NetworkSelector::Test,
        funding_key: "fk".to_owned(),
        balance: 1_000,
        engine_config: json!({}),
        frontend_domain: None,
        backend_domain: None,
        admin_token: token.to_owned(),
    })
    .unwrap_or_else(|_| unreachable!())
}

fn admin(project_id: ProjectId, subject: &str) -> ProjectAdmin {
    ProjectAdmin::new(project_id, subject, None).unwrap_or_else(|_| unreachable!())
}

async fn seeded(token: &str) -> (InMemoryLedger, Project) {
    let ledger = InMemoryLedger::new();
    let project = project(token);
    let initial_admin = admin(project.id(), "alice");
    ledger
        .create_project(project.clone(), initial_admin)
        .await
        .unwrap_or_else(|_| unreachable!());
    (ledger, project)
}

#[tokio::test]
async fn project_lookup_by_token_matches_exactly() {
    let (ledger, project) = seeded("token-a").await;

    let found = ledger.find_project_by_admin_token("token-a").await;
    assert!(found.is_ok());
    assert_eq!(
        found.unwrap_or_default().map(|p| p.id()),
        Some(project.id())
    );

    let missing = ledger.find_project_by_admin_token("token-b").await;
    assert_eq!(missing.unwrap_or_default(), None);
}

#[tokio::test]
async fn artifact_location_is_written_exactly_once() {
    let (ledger, project) = seeded("token").await;
    let deployment = Deployment::new(DeploymentId::new(), project.id(), "alice")
        .unwrap_or_else(|_| unreachable!());
    let deployment_id = deployment.id();
    ledger
        .create_deployment(deployment)
        .await
        .unwrap_or_else(|_| unreachable!());

    let first = ledger.set_artifact_location(deployment_id, "mem://one").await;
    assert!(first.is_ok());

    let second = ledger.set_artifact_location(deployment_id, "mem://two").await;
    assert!(matches!(second, Err(AppError::Conflict(_))));

    let stored = ledger
        .find_deployment(deployment_id)
        .await
        .unwrap_or_default()
        .unwrap_or_else(|| unreachable!());
    assert_eq!(stored.artifact_location(), Some("mem://one"));
    assert_eq!(stored.status(), DeploymentStatus::Pending);
}

#[tokio::test]
async fn debits_and_credits_keep_balance_after_consistent() {
    let (ledger, project) = seeded("token").await;

    let debit = ledger
        .debit(project.id(), 300, None, json!({}))
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(debit.kind(), EntryKind::Debit);
    assert_eq!(debit.balance_after(), 700);

    let credit = ledger
        .credit(project.id(), 50, None, json!({}))
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(credit.balance_after(), 750);

    let snapshot = ledger
        .find_project(project.id())
        .await
        .unwrap_or_default()
        .unwrap_or_else(|| unreachable!());
    assert_eq!(snapshot.balance(), 750);

    let entries = ledger
        .list_entries(
            project.id(),
            LedgerQuery {
                limit: 10,
                offset: 0,
            },
        )
        .await
        .unwrap_or_default();
    assert_eq!(entries.len(), 2);
    // Newest first.
    assert_eq!(entries[0].balance_after(), 750);
    assert_eq!(entries[1].balance_after(), 700);
}

#[tokio::test]
async fn debit_may_drive_the_balance_negative() {
    let (ledger, project) = seeded("token").await;

    let entry = ledger
        .debit(project.id(), 3_000, None, json!({}))
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(entry.balance_after(), -2_000);
}

#[tokio::test]
async fn last_admin_cannot_be_removed() {
    let (ledger, project) = seeded("token").await;

    let refused = ledger.remove_admin(project.id(), "alice").await;
    assert!(matches!(refused, Err(AppError::Conflict(_))));

    ledger
        .add_admin(admin(project.id(), "bob"))
        .await
        .unwrap_or_else(|_| unreachable!());
    let allowed = ledger.remove_admin(project.id(), "alice").await;
    assert!(allowed.is_ok());
}

#[tokio::test]
async fn log_queries_can_scope_to_one_deployment() {
    let (ledger, project) = seeded("token").await;
    let deployment_id = DeploymentId::new();

    let scoped = LogEntry::for_step(project.id(), deployment_id, PipelineStep::Uploaded, "stored")
        .unwrap_or_else(|_| unreachable!());
    let unscoped = LogEntry::for_project(project.id(), "billing", "debited 10")
        .unwrap_or_else(|_| unreachable!());
    ledger
        .append_log(scoped)
        .await
        .unwrap_or_else(|_| unreachable!());
    ledger
        .append_log(unscoped)
        .await
        .unwrap_or_else(|_| unreachable!());

    let all = ledger
        .list_logs(
            project.id(),
            LogQuery {
                deployment_id: None,
                limit: 10,
                offset: 0,
            },
        )
        .await
        .unwrap_or_default();
    assert_eq!(all.len(), 2);

    let scoped_only = ledger
        .list_logs(
            project.id(),
            LogQuery {
                deployment_id: Some(deployment_id),
                limit: 10,
                offset: 0,
            },
        )
        .await
        .unwrap_or_default();
    assert_eq!(scoped_only.len(), 1);
    assert_eq!(scoped_only[0].label().as_str(), "uploaded");
}

#[tokio::test]
async fn delete_project_removes_dependent_records() {
    let (ledger, project) = seeded("token").await;
    ledger
        .debit(project.id(), 10, None, json!({}))
        .await
        .unwrap_or_else(|_| unreachable!());

    ledger
        .delete_project(project.id())
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(
        ledger.find_project(project.id()).await.unwrap_or_default(),
        None
    );
    let entries = ledger
        .list_entries(
            project.id(),
            LedgerQuery {
                limit: 10,
                offset: 0,
            },
        )
        .await
        .unwrap_or_default();
    assert!(entries.is_empty());
}

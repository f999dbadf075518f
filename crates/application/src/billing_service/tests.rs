use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use async_trait::async_trait;
use helmspan_core::{AdminIdentity, AppError, AppResult, DeploymentId, ProjectId};
use helmspan_domain::{
    AccountingEntry, BillingRates, DeploymentDescriptor, EntryKind, LogEntry, NetworkSelector,
    Project, ProjectAdmin, ProjectInput, ThresholdLadder, UsageSample,
};
use serde_json::{Value, json};

use crate::billing_ports::MetricsBackend;
use crate::ledger_ports::{
    AccountingRepository, LedgerQuery, LogQuery, LogRepository, ProjectRepository,
};
use crate::manifest_synthesizer::project_namespace;
use crate::pipeline_ports::{ClusterApi, NotificationService, RolloutError};

use super::{BillingConfig, BillingService, TopUpInput};

/// Shared in-memory store so debits are reflected in project snapshots,
/// mirroring the transactional coupling of the durable adapter.
#[derive(Default)]
struct FakeLedger {
    projects: StdMutex<HashMap<ProjectId, Project>>,
    admins: StdMutex<Vec<ProjectAdmin>>,
    entries: StdMutex<Vec<AccountingEntry>>,
    // When set, `find_project` reports this balance instead of the stored
    // one, simulating a snapshot gone stale under concurrent mutation.
    stale_snapshot_balance: StdMutex<Option<i64>>,
}

impl FakeLedger {
    fn set_stale_snapshot_balance(&self, balance: i64) {
        *self
            .stale_snapshot_balance
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(balance);
    }

    fn insert_project(&self, project: Project, admin: ProjectAdmin) {
        self.projects
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(project.id(), project);
        self.admins
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(admin);
    }

    fn balance(&self, project_id: ProjectId) -> i64 {
        self.projects
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&project_id)
            .map(Project::balance)
            .unwrap_or_default()
    }

    fn apply(
        &self,
        project_id: ProjectId,
        kind: EntryKind,
        amount: i64,
        deployment_id: Option<DeploymentId>,
        metadata: Value,
    ) -> AppResult<AccountingEntry> {
        let mut projects = self
            .projects
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let project = projects
            .get(&project_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound("project not found".to_owned()))?;

        let new_balance = match kind {
            EntryKind::Debit => project.balance() - amount,
            EntryKind::Credit => project.balance() + amount,
        };
        let entry =
            AccountingEntry::new(project_id, deployment_id, kind, amount, new_balance, metadata)?;

        projects.insert(project_id, project.with_balance(new_balance));
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(entry.clone());
        Ok(entry)
    }
}

#[async_trait]
impl ProjectRepository for FakeLedger {
    async fn create_project(
        &self,
        project: Project,
        initial_admin: ProjectAdmin,
    ) -> AppResult<()> {
        self.insert_project(project, initial_admin);
        Ok(())
    }

    async fn find_project(&self, project_id: ProjectId) -> AppResult<Option<Project>> {
        let project = self
            .projects
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&project_id)
            .cloned();
        let stale = *self
            .stale_snapshot_balance
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(match stale {
            Some(balance) => project.map(|project| project.with_balance(balance)),
            None => project,
        })
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
        let mut ids: Vec<ProjectId> = self
            .projects
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .keys()
            .copied()
            .collect();
        ids.sort_by_key(ProjectId::to_string);
        Ok(ids)
    }

    async fn delete_project(&self, project_id: ProjectId) -> AppResult<()> {
        self.projects
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&project_id);
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
        self.admins
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .retain(|admin| {
                admin.project_id() != project_id || admin.subject().as_str() != subject
            });
        Ok(())
    }
}

#[async_trait]
impl AccountingRepository for FakeLedger {
    async fn debit(
        &self,
        project_id: ProjectId,
        amount: i64,
        deployment_id: Option<DeploymentId>,
        metadata: Value,
    ) -> AppResult<AccountingEntry> {
        self.apply(project_id, EntryKind::Debit, amount, deployment_id, metadata)
    }

    async fn credit(
        &self,
        project_id: ProjectId,
        amount: i64,
        deployment_id: Option<DeploymentId>,
        metadata: Value,
    ) -> AppResult<AccountingEntry> {
        self.apply(project_id, EntryKind::Credit, amount, deployment_id, metadata)
    }

    async fn list_entries(
        &self,
        project_id: ProjectId,
        query: LedgerQuery,
    ) -> AppResult<Vec<AccountingEntry>> {
        let mut entries: Vec<AccountingEntry> = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .filter(|entry| entry.project_id() == project_id)
            .cloned()
            .collect();
        entries.reverse();
        Ok(entries
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .collect())
    }
}

#[derive(Default)]
struct FakeLogs {
    entries: StdMutex<Vec<LogEntry>>,
}

impl FakeLogs {
    fn messages(&self, project_id: ProjectId) -> Vec<String> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .filter(|entry| entry.project_id() == project_id)
            .map(|entry| entry.message().to_owned())
            .collect()
    }
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

#[derive(Default)]
struct FakeMetrics {
    samples: StdMutex<HashMap<String, UsageSample>>,
    fail_for: Option<String>,
}

impl FakeMetrics {
    fn set_sample(&self, namespace: &str, sample: UsageSample) {
        self.samples
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(namespace.to_owned(), sample);
    }
}

#[async_trait]
impl MetricsBackend for FakeMetrics {
    async fn sample_usage(&self, namespace: &str, _interval: Duration) -> AppResult<UsageSample> {
        if self.fail_for.as_deref() == Some(namespace) {
            return Err(AppError::Internal("metrics backend unavailable".to_owned()));
        }
        Ok(self
            .samples
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(namespace)
            .copied()
            .unwrap_or(UsageSample {
                cpu_cores: 0.0,
                memory_gib: 0.0,
                volume_gib: 0.0,
                network_gib: 0.0,
            }))
    }
}

#[derive(Default)]
struct FakeCluster {
    toggles: StdMutex<Vec<(String, bool)>>,
}

#[async_trait]
impl ClusterApi for FakeCluster {
    async fn apply(
        &self,
        _descriptor: &DeploymentDescriptor,
        _release_id: &str,
    ) -> Result<(), RolloutError> {
        Ok(())
    }

    async fn set_ingress_enabled(&self, namespace: &str, enabled: bool) -> AppResult<()> {
        self.toggles
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((namespace.to_owned(), enabled));
        Ok(())
    }
}

#[derive(Default)]
struct FakeNotifier {
    sent: StdMutex<Vec<(Vec<String>, String, String)>>,
}

#[async_trait]
impl NotificationService for FakeNotifier {
    async fn notify(&self, recipients: &[String], subject: &str, body: &str) -> AppResult<()> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((recipients.to_vec(), subject.to_owned(), body.to_owned()));
        Ok(())
    }
}

fn rates() -> BillingRates {
    BillingRates {
        cpu_per_core: 100,
        memory_per_gib: 10,
        volume_per_gib: 1,
        network_per_gib: 5,
    }
}

fn project_with_balance(balance: i64) -> (Project, ProjectAdmin, AdminIdentity) {
    let project = Project::new(ProjectInput {
        id: ProjectId::new(),
        display_name: "Orbit Shop".to_owned(),
        network: NetworkSelector::Test,
        funding_key: "fk".to_owned(),
        balance,
        engine_config: json!({}),
        frontend_domain: None,
        backend_domain: None,
        admin_token: "token".to_owned(),
    })
    .unwrap_or_else(|_| unreachable!());
    let admin = ProjectAdmin::new(project.id(), "alice", Some("alice@example.com".to_owned()))
        .unwrap_or_else(|_| unreachable!());
    let identity = AdminIdentity::new("alice", Some("alice@example.com".to_owned()), project.id());
    (project, admin, identity)
}

struct Harness {
    service: BillingService,
    ledger: Arc<FakeLedger>,
    logs: Arc<FakeLogs>,
    metrics: Arc<FakeMetrics>,
    cluster: Arc<FakeCluster>,
    notifier: Arc<FakeNotifier>,
}

fn harness(gating_enabled: bool, fail_for: Option<String>) -> Harness {
    let ledger = Arc::new(FakeLedger::default());
    let logs = Arc::new(FakeLogs::default());
    let metrics = Arc::new(FakeMetrics {
        samples: StdMutex::new(HashMap::new()),
        fail_for,
    });
    let cluster = Arc::new(FakeCluster::default());
    let notifier = Arc::new(FakeNotifier::default());

    let service = BillingService::new(
        Arc::clone(&ledger) as Arc<dyn ProjectRepository>,
        Arc::clone(&ledger) as Arc<dyn AccountingRepository>,
        Arc::clone(&logs) as Arc<dyn LogRepository>,
        Arc::clone(&metrics) as Arc<dyn MetricsBackend>,
        Arc::clone(&cluster) as Arc<dyn ClusterApi>,
        Arc::clone(&notifier) as Arc<dyn NotificationService>,
        BillingConfig {
            rates: rates(),
            tick_interval: Duration::from_secs(300),
            thresholds: ThresholdLadder::default(),
            gating_enabled,
        },
    );

    Harness {
        service,
        ledger,
        logs,
        metrics,
        cluster,
        notifier,
    }
}

fn cpu_only(cores: f64) -> UsageSample {
    UsageSample {
        cpu_cores: cores,
        memory_gib: 0.0,
        volume_gib: 0.0,
        network_gib: 0.0,
    }
}

#[tokio::test]
async fn zero_usage_produces_no_ledger_entry() {
    let h = harness(true, None);
    let (project, admin, identity) = project_with_balance(5_000);
    h.ledger.insert_project(project, admin);

    h.service
        .run_tick()
        .await
        .unwrap_or_else(|_| unreachable!());

    let history = h
        .service
        .history(
            &identity,
            LedgerQuery {
                limit: 10,
                offset: 0,
            },
        )
        .await
        .unwrap_or_else(|_| unreachable!());
    assert!(history.is_empty());
    assert_eq!(h.ledger.balance(identity.project_id()), 5_000);
}

#[tokio::test]
async fn tick_debits_usage_and_logs_the_charge() {
    let h = harness(true, None);
    let (project, admin, identity) = project_with_balance(5_000);
    let project_id = project.id();
    h.ledger.insert_project(project, admin);
    h.metrics
        .set_sample(&project_namespace(project_id), cpu_only(2.0));

    h.service
        .run_tick()
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(h.ledger.balance(project_id), 4_800);

    let history = h
        .service
        .history(
            &identity,
            LedgerQuery {
                limit: 10,
                offset: 0,
            },
        )
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].kind(), EntryKind::Debit);
    assert_eq!(history[0].amount(), 200);
    assert_eq!(history[0].balance_after(), 4_800);
    assert_eq!(history[0].metadata()["total"], json!(200));

    let messages = h.logs.messages(project_id);
    assert!(messages.iter().any(|m| m.contains("debited 200")));
}

#[tokio::test]
async fn overdraft_crosses_thresholds_and_suspends_ingress() {
    let h = harness(true, None);
    let (project, admin, _identity) = project_with_balance(10_000);
    let project_id = project.id();
    h.ledger.insert_project(project, admin);
    // 120 cores at 100 per core prices to 12_000, driving 10_000 down
    // to -2_000 across four ladder levels.
    h.metrics
        .set_sample(&project_namespace(project_id), cpu_only(120.0));

    h.service
        .run_tick()
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(h.ledger.balance(project_id), -2_000);

    // One alert per crossed threshold, each to every admin; 10_000 was the
    // starting balance and must not fire.
    let sent = h
        .notifier
        .sent
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    assert_eq!(sent.len(), 3);
    for ((recipients, _, body), threshold) in sent.iter().zip([1_000, 0, -2_000]) {
        assert_eq!(recipients, &vec!["alice@example.com".to_owned()]);
        assert!(body.contains(&format!("dropped below {threshold}")), "{body}");
    }

    // And one log line per alert.
    let messages = h.logs.messages(project_id);
    for threshold in [1_000, 0, -2_000] {
        assert!(
            messages
                .iter()
                .any(|m| m.contains(&format!("balance alert: crossed {threshold}"))),
            "{threshold}"
        );
    }

    let toggles = h
        .cluster
        .toggles
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    assert_eq!(
        toggles.as_slice(),
        &[(project_namespace(project_id), false)]
    );
}

#[tokio::test]
async fn crossing_decisions_use_the_transaction_balance_not_the_snapshot() {
    let h = harness(true, None);
    let (project, admin, _identity) = project_with_balance(10_000);
    let project_id = project.id();
    h.ledger.insert_project(project, admin);
    // The snapshot read before the debit reports a balance the ledger no
    // longer holds; crossings must come from the entry itself.
    h.ledger.set_stale_snapshot_balance(50_000);
    h.metrics
        .set_sample(&project_namespace(project_id), cpu_only(120.0));

    h.service
        .run_tick()
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(h.ledger.balance(project_id), -2_000);

    // From a stale 50_000 the 10_000 level would fire too; the true
    // pre-debit balance of 10_000 crosses exactly three levels.
    let sent = h
        .notifier
        .sent
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    assert_eq!(sent.len(), 3);

    let toggles = h
        .cluster
        .toggles
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    assert_eq!(
        toggles.as_slice(),
        &[(project_namespace(project_id), false)]
    );
}

#[tokio::test]
async fn gating_on_top_up_uses_the_transaction_balance_not_the_snapshot() {
    let h = harness(true, None);
    let (project, admin, identity) = project_with_balance(-500);
    let project_id = project.id();
    h.ledger.insert_project(project, admin);
    // A stale non-negative snapshot must not mask the restore transition.
    h.ledger.set_stale_snapshot_balance(500);

    let entry = h
        .service
        .top_up(&identity, TopUpInput { amount: 1_000 })
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(entry.balance_after(), 500);

    let toggles = h
        .cluster
        .toggles
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    assert_eq!(toggles.as_slice(), &[(project_namespace(project_id), true)]);
}

#[tokio::test]
async fn gating_toggle_off_leaves_ingress_alone() {
    let h = harness(false, None);
    let (project, admin, _identity) = project_with_balance(100);
    let project_id = project.id();
    h.ledger.insert_project(project, admin);
    h.metrics
        .set_sample(&project_namespace(project_id), cpu_only(5.0));

    h.service
        .run_tick()
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(h.ledger.balance(project_id), -400);
    assert!(
        h.cluster
            .toggles
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_empty()
    );
}

#[tokio::test]
async fn top_up_restores_ingress_once_balance_is_non_negative() {
    let h = harness(true, None);
    let (project, admin, identity) = project_with_balance(-500);
    let project_id = project.id();
    h.ledger.insert_project(project, admin);

    let entry = h
        .service
        .top_up(&identity, TopUpInput { amount: 1_000 })
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(entry.kind(), EntryKind::Credit);
    assert_eq!(entry.balance_after(), 500);

    let toggles = h
        .cluster
        .toggles
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    assert_eq!(toggles.as_slice(), &[(project_namespace(project_id), true)]);
}

#[tokio::test]
async fn top_up_that_stays_negative_does_not_restore_ingress() {
    let h = harness(true, None);
    let (project, admin, identity) = project_with_balance(-5_000);
    h.ledger.insert_project(project, admin);

    let entry = h
        .service
        .top_up(&identity, TopUpInput { amount: 1_000 })
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(entry.balance_after(), -4_000);
    assert!(
        h.cluster
            .toggles
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_empty()
    );
}

#[tokio::test]
async fn top_up_rejects_non_positive_amounts() {
    let h = harness(true, None);
    let (project, admin, identity) = project_with_balance(100);
    h.ledger.insert_project(project, admin);

    let result = h.service.top_up(&identity, TopUpInput { amount: 0 }).await;
    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn one_failing_project_does_not_stop_the_tick() {
    let (failing, failing_admin, _) = project_with_balance(1_000);
    let failing_namespace = project_namespace(failing.id());
    let h = harness(true, Some(failing_namespace));

    let (healthy, healthy_admin, _) = project_with_balance(1_000);
    let healthy_id = healthy.id();
    let failing_id = failing.id();
    h.ledger.insert_project(failing, failing_admin);
    h.ledger.insert_project(healthy, healthy_admin);
    h.metrics
        .set_sample(&project_namespace(healthy_id), cpu_only(1.0));

    h.service
        .run_tick()
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(h.ledger.balance(healthy_id), 900);
    assert_eq!(h.ledger.balance(failing_id), 1_000);
}

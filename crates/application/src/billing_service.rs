//! Periodic usage metering, the billing ledger, and balance gating.

use std::sync::Arc;
use std::time::Duration;

use helmspan_core::{AdminIdentity, AppError, AppResult, ProjectId};
use helmspan_domain::{
    AccountingEntry, BillingRates, LogEntry, Project, ThresholdLadder, price_interval,
};
use serde_json::json;
use tracing::{info, warn};

use crate::billing_ports::MetricsBackend;
use crate::ledger_ports::{AccountingRepository, LedgerQuery, LogRepository, ProjectRepository};
use crate::manifest_synthesizer::project_namespace;
use crate::pipeline_ports::{ClusterApi, NotificationService};

/// Operator-level billing configuration.
#[derive(Debug, Clone)]
pub struct BillingConfig {
    /// Per-unit prices in the smallest monetary unit.
    pub rates: BillingRates,
    /// Length of one metering interval.
    pub tick_interval: Duration,
    /// Descending balance thresholds that trigger alerts.
    pub thresholds: ThresholdLadder,
    /// Whether ingress is toggled on negative-balance transitions.
    pub gating_enabled: bool,
}

/// Credit applied to a project balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopUpInput {
    /// Amount in the smallest monetary unit; must be strictly positive.
    pub amount: i64,
}

/// Meters usage per tick, maintains the accounting ledger, alerts on
/// threshold crossings, and gates network access on balance sign.
pub struct BillingService {
    projects: Arc<dyn ProjectRepository>,
    accounting: Arc<dyn AccountingRepository>,
    logs: Arc<dyn LogRepository>,
    metrics: Arc<dyn MetricsBackend>,
    cluster: Arc<dyn ClusterApi>,
    notifier: Arc<dyn NotificationService>,
    config: BillingConfig,
}

impl BillingService {
    /// Creates the billing service over its ports.
    pub fn new(
        projects: Arc<dyn ProjectRepository>,
        accounting: Arc<dyn AccountingRepository>,
        logs: Arc<dyn LogRepository>,
        metrics: Arc<dyn MetricsBackend>,
        cluster: Arc<dyn ClusterApi>,
        notifier: Arc<dyn NotificationService>,
        config: BillingConfig,
    ) -> Self {
        Self {
            projects,
            accounting,
            logs,
            metrics,
            cluster,
            notifier,
            config,
        }
    }

    /// Runs one metering tick over every project.
    ///
    /// A failure while billing one project is logged and never stops the
    /// tick for the others.
    pub async fn run_tick(&self) -> AppResult<()> {
        let project_ids = self.projects.list_project_ids().await?;
        info!(projects = project_ids.len(), "billing tick started");

        for project_id in project_ids {
            if let Err(error) = self.bill_project(project_id).await {
                warn!(%project_id, %error, "billing tick failed for project");
            }
        }

        Ok(())
    }

    /// Credits a project balance and re-enables ingress when the credit
    /// brings a negative balance back to zero or above.
    pub async fn top_up(
        &self,
        identity: &AdminIdentity,
        input: TopUpInput,
    ) -> AppResult<AccountingEntry> {
        if input.amount <= 0 {
            return Err(AppError::Validation(
                "top-up amount must be strictly positive".to_owned(),
            ));
        }

        let project = self.require_project(identity.project_id()).await?;

        let entry = self
            .accounting
            .credit(
                project.id(),
                input.amount,
                None,
                json!({ "source": "top-up", "subject": identity.subject() }),
            )
            .await?;
        let new_balance = entry.balance_after();
        // Pre-credit balance from the same transaction as the entry; the
        // earlier snapshot may be stale under concurrent mutation.
        let old_balance = new_balance - entry.amount();

        self.append_billing_log(
            project.id(),
            format!("credited {}; balance {new_balance}", input.amount),
        )
        .await?;

        if self.config.gating_enabled && old_balance < 0 && new_balance >= 0 {
            self.cluster
                .set_ingress_enabled(&project_namespace(project.id()), true)
                .await?;
            self.append_billing_log(project.id(), "network access restored".to_owned())
                .await?;
            info!(project_id = %project.id(), "ingress re-enabled after top-up");
        }

        Ok(entry)
    }

    /// Lists ledger entries for the caller's project, newest first.
    pub async fn history(
        &self,
        identity: &AdminIdentity,
        query: LedgerQuery,
    ) -> AppResult<Vec<AccountingEntry>> {
        self.accounting
            .list_entries(identity.project_id(), query)
            .await
    }

    async fn bill_project(&self, project_id: ProjectId) -> AppResult<()> {
        let project = self.require_project(project_id).await?;

        let namespace = project_namespace(project_id);
        let usage = self
            .metrics
            .sample_usage(&namespace, self.config.tick_interval)
            .await?;

        let breakdown = price_interval(&usage, &self.config.rates);
        let total = breakdown.total();
        if total == 0 {
            // No measurable usage, no ledger line.
            return Ok(());
        }

        let entry = self
            .accounting
            .debit(
                project_id,
                total,
                None,
                breakdown.to_metadata(&self.config.rates),
            )
            .await?;
        let new_balance = entry.balance_after();
        // Pre-debit balance from the same transaction as the entry; the
        // earlier snapshot may be stale under concurrent mutation.
        let old_balance = new_balance + entry.amount();

        self.append_billing_log(
            project_id,
            format!("debited {total}; balance {new_balance}"),
        )
        .await?;

        let crossed = self.config.thresholds.crossed(old_balance, new_balance);
        if !crossed.is_empty() {
            self.alert_thresholds(&project, &crossed, new_balance).await;
        }

        if self.config.gating_enabled && old_balance >= 0 && new_balance < 0 {
            self.cluster
                .set_ingress_enabled(&namespace, false)
                .await?;
            self.append_billing_log(project_id, "network access suspended".to_owned())
                .await?;
            warn!(%project_id, new_balance, "ingress disabled on negative balance");
        }

        Ok(())
    }

    /// Sends one alert per crossed threshold and logs each, best-effort.
    async fn alert_thresholds(&self, project: &Project, crossed: &[i64], new_balance: i64) {
        let recipients = match self.projects.list_admins(project.id()).await {
            Ok(admins) => admins
                .into_iter()
                .filter_map(|admin| admin.email().map(str::to_owned))
                .collect::<Vec<String>>(),
            Err(error) => {
                warn!(project_id = %project.id(), %error, "could not list admins for balance alert");
                return;
            }
        };

        for threshold in crossed {
            let subject = format!("Balance alert for {}", project.display_name());
            let body = format!(
                "The balance of project '{}' dropped below {threshold} and is now {new_balance}.",
                project.display_name()
            );
            if !recipients.is_empty() {
                if let Err(error) = self.notifier.notify(&recipients, &subject, &body).await {
                    warn!(project_id = %project.id(), %error, "balance alert was not delivered");
                }
            }

            if let Err(error) = self
                .append_billing_log(
                    project.id(),
                    format!("balance alert: crossed {threshold}; balance {new_balance}"),
                )
                .await
            {
                warn!(project_id = %project.id(), %error, "balance alert was not logged");
            }
        }
    }

    async fn append_billing_log(&self, project_id: ProjectId, message: String) -> AppResult<()> {
        let entry = LogEntry::for_project(project_id, "billing", message)?;
        self.logs.append_log(entry).await
    }

    async fn require_project(&self, project_id: ProjectId) -> AppResult<Project> {
        self.projects
            .find_project(project_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("project {project_id} not found")))
    }
}

#[cfg(test)]
mod tests;

use chrono::{DateTime, Utc};
use helmspan_core::{AppError, AppResult, DeploymentId, ProjectId};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Direction of one accounting ledger line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Balance increase (top-up).
    Credit,
    /// Balance decrease (usage cost).
    Debit,
}

impl EntryKind {
    /// Returns the stable kind name used in storage.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Credit => "credit",
            Self::Debit => "debit",
        }
    }

    /// Parses an entry kind from its stable name.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "credit" => Ok(Self::Credit),
            "debit" => Ok(Self::Debit),
            other => Err(AppError::Validation(format!(
                "unknown accounting entry kind '{other}'"
            ))),
        }
    }
}

/// Append-only ledger line recording one balance transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountingEntry {
    project_id: ProjectId,
    deployment_id: Option<DeploymentId>,
    kind: EntryKind,
    amount: i64,
    balance_after: i64,
    metadata: Value,
    created_at: DateTime<Utc>,
}

impl AccountingEntry {
    /// Creates a ledger line; the amount must be strictly positive.
    pub fn new(
        project_id: ProjectId,
        deployment_id: Option<DeploymentId>,
        kind: EntryKind,
        amount: i64,
        balance_after: i64,
        metadata: Value,
    ) -> AppResult<Self> {
        Self::from_parts(
            project_id,
            deployment_id,
            kind,
            amount,
            balance_after,
            metadata,
            Utc::now(),
        )
    }

    /// Restores a ledger line from persisted state.
    pub fn from_parts(
        project_id: ProjectId,
        deployment_id: Option<DeploymentId>,
        kind: EntryKind,
        amount: i64,
        balance_after: i64,
        metadata: Value,
        created_at: DateTime<Utc>,
    ) -> AppResult<Self> {
        if amount <= 0 {
            return Err(AppError::Validation(
                "accounting entry amount must be strictly positive".to_owned(),
            ));
        }

        Ok(Self {
            project_id,
            deployment_id,
            kind,
            amount,
            balance_after,
            metadata,
            created_at,
        })
    }

    /// Returns the owning project identifier.
    #[must_use]
    pub fn project_id(&self) -> ProjectId {
        self.project_id
    }

    /// Returns the associated deployment, when any.
    #[must_use]
    pub fn deployment_id(&self) -> Option<DeploymentId> {
        self.deployment_id
    }

    /// Returns the entry direction.
    #[must_use]
    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    /// Returns the absolute amount moved by this entry.
    #[must_use]
    pub fn amount(&self) -> i64 {
        self.amount
    }

    /// Returns the balance immediately after this entry was applied.
    #[must_use]
    pub fn balance_after(&self) -> i64 {
        self.balance_after
    }

    /// Returns the structured cost or top-up metadata.
    #[must_use]
    pub fn metadata(&self) -> &Value {
        &self.metadata
    }

    /// Returns the ledger timestamp.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Resource consumption over one metering interval, in canonical units.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct UsageSample {
    /// Average CPU cores consumed.
    pub cpu_cores: f64,
    /// Average working-set memory in GiB.
    pub memory_gib: f64,
    /// Average persistent-volume usage in GiB; zero when none provisioned.
    pub volume_gib: f64,
    /// Summed network bytes transferred (rx + tx) in GiB.
    pub network_gib: f64,
}

/// Price per canonical unit per metering interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingRates {
    /// Price per average CPU core.
    pub cpu_per_core: i64,
    /// Price per GiB of working-set memory.
    pub memory_per_gib: i64,
    /// Price per GiB of persistent-volume usage.
    pub volume_per_gib: i64,
    /// Price per GiB of network transfer.
    pub network_per_gib: i64,
}

/// Per-dimension cost of one metering interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostBreakdown {
    /// CPU dimension cost.
    pub cpu: i64,
    /// Memory dimension cost.
    pub memory: i64,
    /// Persistent-volume dimension cost.
    pub volume: i64,
    /// Network dimension cost.
    pub network: i64,
}

impl CostBreakdown {
    /// Returns the summed interval cost.
    #[must_use]
    pub fn total(&self) -> i64 {
        self.cpu + self.memory + self.volume + self.network
    }

    /// Returns ledger metadata describing this breakdown and the rates used.
    #[must_use]
    pub fn to_metadata(&self, rates: &BillingRates) -> Value {
        json!({
            "breakdown": {
                "cpu": self.cpu,
                "memory": self.memory,
                "volume": self.volume,
                "network": self.network,
            },
            "rates": {
                "cpu_per_core": rates.cpu_per_core,
                "memory_per_gib": rates.memory_per_gib,
                "volume_per_gib": rates.volume_per_gib,
                "network_per_gib": rates.network_per_gib,
            },
            "total": self.total(),
        })
    }
}

/// Prices one usage sample: per dimension, `ceil(usage × rate)`.
#[must_use]
pub fn price_interval(usage: &UsageSample, rates: &BillingRates) -> CostBreakdown {
    CostBreakdown {
        cpu: dimension_cost(usage.cpu_cores, rates.cpu_per_core),
        memory: dimension_cost(usage.memory_gib, rates.memory_per_gib),
        volume: dimension_cost(usage.volume_gib, rates.volume_per_gib),
        network: dimension_cost(usage.network_gib, rates.network_per_gib),
    }
}

fn dimension_cost(usage: f64, rate: i64) -> i64 {
    if usage <= 0.0 || rate <= 0 {
        return 0;
    }

    let cost = (usage * rate as f64).ceil();
    if cost >= i64::MAX as f64 {
        i64::MAX
    } else {
        cost as i64
    }
}

/// Default descending balance thresholds, including negative levels.
pub const DEFAULT_THRESHOLD_LADDER: &[i64] = &[50_000, 10_000, 1_000, 0, -2_000, -10_000];

/// Fixed, descending, monotonic ladder of alert thresholds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThresholdLadder(Vec<i64>);

impl ThresholdLadder {
    /// Creates a ladder; levels must be strictly descending and non-empty.
    pub fn new(levels: Vec<i64>) -> AppResult<Self> {
        if levels.is_empty() {
            return Err(AppError::Validation(
                "threshold ladder must not be empty".to_owned(),
            ));
        }

        if levels.windows(2).any(|pair| pair[0] <= pair[1]) {
            return Err(AppError::Validation(
                "threshold ladder levels must be strictly descending".to_owned(),
            ));
        }

        Ok(Self(levels))
    }

    /// Returns the ladder levels in descending order.
    #[must_use]
    pub fn levels(&self) -> &[i64] {
        self.0.as_slice()
    }

    /// Returns every threshold crossed downward by the transition.
    ///
    /// A threshold `t` is crossed iff `old > t && new <= t`: a debit
    /// landing exactly on a level fires it, while a balance already at or
    /// below the level cannot re-fire it until it first rises above.
    #[must_use]
    pub fn crossed(&self, old_balance: i64, new_balance: i64) -> Vec<i64> {
        self.0
            .iter()
            .copied()
            .filter(|threshold| old_balance > *threshold && new_balance <= *threshold)
            .collect()
    }
}

impl Default for ThresholdLadder {
    fn default() -> Self {
        Self(DEFAULT_THRESHOLD_LADDER.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use helmspan_core::ProjectId;
    use proptest::prelude::*;
    use serde_json::json;

    use super::{
        AccountingEntry, BillingRates, EntryKind, ThresholdLadder, UsageSample, price_interval,
    };

    fn rates() -> BillingRates {
        BillingRates {
            cpu_per_core: 1_000,
            memory_per_gib: 500,
            volume_per_gib: 100,
            network_per_gib: 200,
        }
    }

    #[test]
    fn pricing_rounds_each_dimension_up() {
        let usage = UsageSample {
            cpu_cores: 0.001,
            memory_gib: 0.25,
            volume_gib: 0.0,
            network_gib: 1.5,
        };

        let breakdown = price_interval(&usage, &rates());
        assert_eq!(breakdown.cpu, 1);
        assert_eq!(breakdown.memory, 125);
        assert_eq!(breakdown.volume, 0);
        assert_eq!(breakdown.network, 300);
        assert_eq!(breakdown.total(), 426);
    }

    #[test]
    fn zero_usage_prices_to_zero() {
        let breakdown = price_interval(&UsageSample::default(), &rates());
        assert_eq!(breakdown.total(), 0);
    }

    #[test]
    fn ladder_rejects_non_descending_levels() {
        assert!(ThresholdLadder::new(vec![0, 0]).is_err());
        assert!(ThresholdLadder::new(vec![-5, 10]).is_err());
        assert!(ThresholdLadder::new(Vec::new()).is_err());
        assert!(ThresholdLadder::new(vec![10, 0, -10]).is_ok());
    }

    #[test]
    fn overdraft_crosses_zero_and_negative_levels_once() {
        let ladder = ThresholdLadder::default();
        // Landing exactly on -2_000 fires it; starting exactly at 10_000
        // does not fire 10_000 again.
        let crossed = ladder.crossed(10_000, -2_000);
        assert_eq!(crossed, vec![1_000, 0, -2_000]);

        // A later tick from the already-negative balance must not re-fire.
        let repeat = ladder.crossed(-2_000, -2_500);
        assert!(repeat.is_empty());
    }

    #[test]
    fn debit_landing_exactly_on_a_threshold_fires_it() {
        let ladder = ThresholdLadder::default();
        assert_eq!(ladder.crossed(500, 0), vec![0]);
        assert_eq!(ladder.crossed(0, -100), Vec::<i64>::new());
    }

    #[test]
    fn upward_transitions_never_fire() {
        let ladder = ThresholdLadder::default();
        assert!(ladder.crossed(-1_000, 3_000).is_empty());
    }

    #[test]
    fn accounting_entry_rejects_non_positive_amount() {
        let entry = AccountingEntry::new(
            ProjectId::new(),
            None,
            EntryKind::Debit,
            0,
            100,
            json!({}),
        );
        assert!(entry.is_err());
    }

    proptest! {
        #[test]
        fn crossing_law_holds_for_all_transitions(old in -20_000_i64..60_000, new in -20_000_i64..60_000) {
            let ladder = ThresholdLadder::default();
            let crossed = ladder.crossed(old, new);

            for threshold in ladder.levels() {
                let expected = old > *threshold && new <= *threshold;
                prop_assert_eq!(crossed.contains(threshold), expected);
            }

            // Each threshold fires at most once per transition.
            let mut unique = crossed.clone();
            unique.dedup();
            prop_assert_eq!(unique.len(), crossed.len());
        }
    }
}

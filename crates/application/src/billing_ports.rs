//! Ports over the usage metrics backend.

use std::time::Duration;

use async_trait::async_trait;
use helmspan_core::AppResult;
use helmspan_domain::UsageSample;

/// Port over the metrics backend the billing tick queries.
#[async_trait]
pub trait MetricsBackend: Send + Sync {
    /// Samples the four usage dimensions for a namespace over the
    /// preceding interval. Missing or empty series read as zero.
    async fn sample_usage(&self, namespace: &str, interval: Duration) -> AppResult<UsageSample>;
}

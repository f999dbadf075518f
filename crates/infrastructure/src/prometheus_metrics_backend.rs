//! Usage sampling against a Prometheus-compatible metrics endpoint.

use std::time::Duration;

use async_trait::async_trait;
use helmspan_application::MetricsBackend;
use helmspan_core::{AppError, AppResult};
use helmspan_domain::UsageSample;
use serde_json::Value;

/// Metrics backend querying a Prometheus HTTP API.
pub struct PrometheusMetricsBackend {
    http_client: reqwest::Client,
    base_url: String,
}

impl PrometheusMetricsBackend {
    /// Creates a backend over the provided HTTP client.
    #[must_use]
    pub fn new(http_client: reqwest::Client, base_url: String) -> Self {
        Self {
            http_client,
            base_url,
        }
    }

    /// Runs one instant query and returns the summed sample value.
    ///
    /// An empty result vector reads as zero; a namespace with no workload
    /// yet simply has no usage.
    async fn query_value(&self, query: &str) -> AppResult<f64> {
        let url = format!("{}/api/v1/query", self.base_url);
        let response = self
            .http_client
            .get(url)
            .query(&[("query", query)])
            .send()
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to reach metrics backend: {error}"))
            })?;

        if !response.status().is_success() {
            return Err(AppError::Internal(format!(
                "metrics query failed with {}",
                response.status()
            )));
        }

        let body = response.json::<Value>().await.map_err(|error| {
            AppError::Internal(format!("invalid metrics response: {error}"))
        })?;

        if body.get("status").and_then(Value::as_str) != Some("success") {
            return Err(AppError::Internal(format!(
                "metrics query was not successful: {body}"
            )));
        }

        let results = body
            .pointer("/data/result")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut total = 0.0;
        for series in results {
            let value = series
                .pointer("/value/1")
                .and_then(Value::as_str)
                .and_then(|raw| raw.parse::<f64>().ok())
                .unwrap_or_default();
            total += value;
        }

        Ok(total)
    }
}

/// Network transfer is billed in both directions.
fn network_query(namespace: &str, window: u64) -> String {
    format!(
        "(sum(increase(container_network_receive_bytes_total{{namespace=\"{namespace}\"}}[{window}s])) \
         + sum(increase(container_network_transmit_bytes_total{{namespace=\"{namespace}\"}}[{window}s]))) / 2^30"
    )
}

#[async_trait]
impl MetricsBackend for PrometheusMetricsBackend {
    async fn sample_usage(&self, namespace: &str, interval: Duration) -> AppResult<UsageSample> {
        let window = interval.as_secs().max(60);

        let cpu_cores = self
            .query_value(&format!(
                "sum(rate(container_cpu_usage_seconds_total{{namespace=\"{namespace}\"}}[{window}s]))"
            ))
            .await?;
        let memory_gib = self
            .query_value(&format!(
                "sum(avg_over_time(container_memory_working_set_bytes{{namespace=\"{namespace}\"}}[{window}s])) / 2^30"
            ))
            .await?;
        let volume_gib = self
            .query_value(&format!(
                "sum(kubelet_volume_stats_used_bytes{{namespace=\"{namespace}\"}}) / 2^30"
            ))
            .await?;
        let network_gib = self.query_value(&network_query(namespace, window)).await?;

        Ok(UsageSample {
            cpu_cores,
            memory_gib,
            volume_gib,
            network_gib,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::network_query;

    #[test]
    fn network_query_counts_both_directions() {
        let query = network_query("helmspan-abc", 300);
        assert!(query.contains("container_network_receive_bytes_total{namespace=\"helmspan-abc\"}"));
        assert!(query.contains("container_network_transmit_bytes_total{namespace=\"helmspan-abc\"}"));
        assert!(query.contains("[300s]"));
    }
}

//! HTTP client for the orchestration cluster controller.

use async_trait::async_trait;
use helmspan_application::{ClusterApi, RolloutError};
use helmspan_core::{AppError, AppResult};
use helmspan_domain::DeploymentDescriptor;
use reqwest::StatusCode;
use serde_json::{Value, json};

/// Configuration for the cluster controller endpoint.
#[derive(Debug, Clone)]
pub struct HttpClusterConfig {
    /// Base URL of the controller API.
    pub base_url: String,
    /// Bearer credential presented to the controller.
    pub api_token: String,
}

/// HTTP-based cluster adapter.
///
/// The controller's apply endpoint blocks until the workload is healthy or
/// it has reverted the change, so one request covers rollout and health
/// confirmation.
pub struct HttpClusterApi {
    http_client: reqwest::Client,
    config: HttpClusterConfig,
}

impl HttpClusterApi {
    /// Creates a cluster adapter over the provided HTTP client.
    #[must_use]
    pub fn new(http_client: reqwest::Client, config: HttpClusterConfig) -> Self {
        Self {
            http_client,
            config,
        }
    }

    async fn failure_detail(response: reqwest::Response) -> String {
        match response.json::<Value>().await {
            Ok(body) => body
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_owned)
                .unwrap_or_else(|| body.to_string()),
            Err(error) => format!("unreadable controller response: {error}"),
        }
    }
}

#[async_trait]
impl ClusterApi for HttpClusterApi {
    async fn apply(
        &self,
        descriptor: &DeploymentDescriptor,
        release_id: &str,
    ) -> Result<(), RolloutError> {
        let url = format!(
            "{}/namespaces/{}/apply",
            self.config.base_url,
            descriptor.namespace()
        );

        let response = self
            .http_client
            .post(url)
            .bearer_auth(self.config.api_token.as_str())
            .json(&json!({
                "release_id": release_id,
                "descriptor": descriptor,
            }))
            .send()
            .await
            .map_err(|error| RolloutError::Unreachable(error.to_string()))?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                Err(RolloutError::Rejected(Self::failure_detail(response).await))
            }
            StatusCode::BAD_GATEWAY | StatusCode::GATEWAY_TIMEOUT => Err(
                RolloutError::HealthCheckFailed(Self::failure_detail(response).await),
            ),
            status => Err(RolloutError::Unreachable(format!(
                "controller returned {status}: {}",
                Self::failure_detail(response).await
            ))),
        }
    }

    async fn set_ingress_enabled(&self, namespace: &str, enabled: bool) -> AppResult<()> {
        let url = format!("{}/namespaces/{namespace}/ingress", self.config.base_url);

        let response = self
            .http_client
            .put(url)
            .bearer_auth(self.config.api_token.as_str())
            .json(&json!({ "enabled": enabled }))
            .send()
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to reach cluster controller: {error}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(AppError::Internal(format!(
                "ingress toggle failed with {status}: {}",
                Self::failure_detail(response).await
            )));
        }

        Ok(())
    }
}

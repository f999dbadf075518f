//! HTTP client for the image build service.

use std::path::Path;

use async_trait::async_trait;
use helmspan_application::ImageBuilder;
use helmspan_core::{AppError, AppResult};
use helmspan_domain::DeployTarget;
use serde_json::{Value, json};

/// Configuration for the build service endpoint.
#[derive(Debug, Clone)]
pub struct HttpImageBuilderConfig {
    /// Base URL of the build service.
    pub base_url: String,
    /// Bearer credential presented to the build service.
    pub api_token: String,
}

/// HTTP-based image builder adapter.
///
/// The build service shares the artifact volume with this process, so a
/// source path is enough for it to locate the tree to build. The request
/// blocks until the image is pushed to the registry.
pub struct HttpImageBuilder {
    http_client: reqwest::Client,
    config: HttpImageBuilderConfig,
}

impl HttpImageBuilder {
    /// Creates a builder adapter over the provided HTTP client.
    #[must_use]
    pub fn new(http_client: reqwest::Client, config: HttpImageBuilderConfig) -> Self {
        Self {
            http_client,
            config,
        }
    }
}

#[async_trait]
impl ImageBuilder for HttpImageBuilder {
    async fn build_and_publish(
        &self,
        source_dir: &Path,
        target: DeployTarget,
        release_id: &str,
    ) -> AppResult<String> {
        let url = format!("{}/builds", self.config.base_url);

        let response = self
            .http_client
            .post(url)
            .bearer_auth(self.config.api_token.as_str())
            .json(&json!({
                "source_path": source_dir.to_string_lossy(),
                "target": target.as_str(),
                "tag": release_id,
            }))
            .send()
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to reach build service: {error}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response
                .text()
                .await
                .unwrap_or_else(|error| format!("unreadable build response: {error}"));
            return Err(AppError::Internal(format!(
                "image build for target '{}' failed with {status}: {detail}",
                target.as_str()
            )));
        }

        let body = response.json::<Value>().await.map_err(|error| {
            AppError::Internal(format!("invalid build service response: {error}"))
        })?;

        body.get("image")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| {
                AppError::Internal("build service response is missing 'image'".to_owned())
            })
    }
}

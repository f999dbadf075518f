//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod console_notification_service;
mod fs_artifact_store;
mod hmac_upload_signer;
mod http_cluster_api;
mod http_image_builder;
mod in_memory_ledger;
mod postgres_accounting_repository;
mod postgres_deployment_repository;
mod postgres_log_repository;
mod postgres_project_repository;
mod prometheus_metrics_backend;
mod smtp_notification_service;

pub use console_notification_service::ConsoleNotificationService;
pub use fs_artifact_store::FsArtifactStore;
pub use hmac_upload_signer::HmacUploadSigner;
pub use http_cluster_api::{HttpClusterApi, HttpClusterConfig};
pub use http_image_builder::{HttpImageBuilder, HttpImageBuilderConfig};
pub use in_memory_ledger::InMemoryLedger;
pub use postgres_accounting_repository::PostgresAccountingRepository;
pub use postgres_deployment_repository::PostgresDeploymentRepository;
pub use postgres_log_repository::PostgresLogRepository;
pub use postgres_project_repository::PostgresProjectRepository;
pub use prometheus_metrics_backend::PrometheusMetricsBackend;
pub use smtp_notification_service::{SmtpNotificationConfig, SmtpNotificationService};

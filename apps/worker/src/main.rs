//! Helmspan billing worker runtime.
//!
//! Drives the periodic metering tick: samples usage, writes ledger
//! entries, sends threshold alerts, and toggles ingress on balance sign
//! changes.

#![forbid(unsafe_code)]

use std::env;
use std::sync::Arc;
use std::time::Duration;

use helmspan_application::{
    BillingConfig, BillingService, ClusterApi, MetricsBackend, NotificationService,
};
use helmspan_core::{AppError, AppResult};
use helmspan_domain::{BillingRates, DEFAULT_THRESHOLD_LADDER, ThresholdLadder};
use helmspan_infrastructure::{
    ConsoleNotificationService, HttpClusterApi, HttpClusterConfig, PostgresAccountingRepository,
    PostgresLogRepository, PostgresProjectRepository, PrometheusMetricsBackend,
    SmtpNotificationConfig, SmtpNotificationService,
};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

struct WorkerConfig {
    database_url: String,
    cluster: HttpClusterConfig,
    metrics_url: String,
    notification_provider: String,
    billing: BillingConfig,
}

impl WorkerConfig {
    fn load() -> AppResult<Self> {
        let rates = BillingRates {
            cpu_per_core: env_i64("BILLING_RATE_CPU", 100)?,
            memory_per_gib: env_i64("BILLING_RATE_MEMORY", 10)?,
            volume_per_gib: env_i64("BILLING_RATE_VOLUME", 1)?,
            network_per_gib: env_i64("BILLING_RATE_NETWORK", 5)?,
        };

        let tick_seconds = env_i64("BILLING_TICK_SECONDS", 300)?;
        if tick_seconds <= 0 {
            return Err(AppError::Validation(
                "BILLING_TICK_SECONDS must be strictly positive".to_owned(),
            ));
        }

        let thresholds = match env::var("BILLING_THRESHOLDS") {
            Ok(raw) => {
                let levels = raw
                    .split(',')
                    .map(|part| {
                        part.trim().parse::<i64>().map_err(|error| {
                            AppError::Validation(format!("invalid BILLING_THRESHOLDS: {error}"))
                        })
                    })
                    .collect::<Result<Vec<i64>, AppError>>()?;
                ThresholdLadder::new(levels)?
            }
            Err(_) => ThresholdLadder::new(DEFAULT_THRESHOLD_LADDER.to_vec())?,
        };

        let gating_enabled = env::var("BILLING_GATING_ENABLED")
            .unwrap_or_else(|_| "true".to_owned())
            .eq_ignore_ascii_case("true");

        Ok(Self {
            database_url: required_env("DATABASE_URL")?,
            cluster: HttpClusterConfig {
                base_url: required_non_empty_env("CLUSTER_API_URL")?,
                api_token: required_non_empty_env("CLUSTER_API_TOKEN")?,
            },
            metrics_url: required_non_empty_env("METRICS_URL")?,
            notification_provider: env::var("NOTIFICATION_PROVIDER")
                .unwrap_or_else(|_| "console".to_owned()),
            billing: BillingConfig {
                rates,
                tick_interval: Duration::from_secs(tick_seconds.unsigned_abs()),
                thresholds,
                gating_enabled,
            },
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WorkerConfig::load()?;
    let tick_interval = config.billing.tick_interval;
    let pool = connect_pool(config.database_url.as_str()).await?;
    let billing_service = build_billing_service(pool, config)?;

    info!(
        tick_seconds = tick_interval.as_secs(),
        "helmspan-worker started"
    );

    loop {
        if let Err(error) = billing_service.run_tick().await {
            warn!(error = %error, "billing tick failed");
        }

        tokio::time::sleep(tick_interval).await;
    }
}

async fn connect_pool(database_url: &str) -> AppResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))
}

fn build_billing_service(pool: PgPool, config: WorkerConfig) -> AppResult<BillingService> {
    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(|error| AppError::Internal(format!("failed to build HTTP client: {error}")))?;

    let cluster_api: Arc<dyn ClusterApi> =
        Arc::new(HttpClusterApi::new(http_client.clone(), config.cluster));
    let metrics_backend: Arc<dyn MetricsBackend> = Arc::new(PrometheusMetricsBackend::new(
        http_client,
        config.metrics_url,
    ));

    let notifier: Arc<dyn NotificationService> = match config.notification_provider.as_str() {
        "smtp" => {
            let smtp_port = required_non_empty_env("SMTP_PORT")?
                .parse::<u16>()
                .map_err(|error| AppError::Validation(format!("invalid SMTP_PORT: {error}")))?;

            let smtp_config = SmtpNotificationConfig {
                host: required_non_empty_env("SMTP_HOST")?,
                port: smtp_port,
                username: required_non_empty_env("SMTP_USERNAME")?,
                password: required_non_empty_env("SMTP_PASSWORD")?,
                from_address: required_non_empty_env("SMTP_FROM_ADDRESS")?,
            };
            Arc::new(SmtpNotificationService::new(smtp_config))
        }
        "console" => Arc::new(ConsoleNotificationService::new()),
        other => {
            return Err(AppError::Validation(format!(
                "NOTIFICATION_PROVIDER must be either 'console' or 'smtp', got '{other}'"
            )));
        }
    };

    Ok(BillingService::new(
        Arc::new(PostgresProjectRepository::new(pool.clone())),
        Arc::new(PostgresAccountingRepository::new(pool.clone())),
        Arc::new(PostgresLogRepository::new(pool)),
        metrics_backend,
        cluster_api,
        notifier,
        config.billing,
    ))
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> Result<String, AppError> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn required_non_empty_env(name: &str) -> Result<String, AppError> {
    let value = required_env(name)?;
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{name} must not be empty")));
    }

    Ok(value)
}

fn env_i64(name: &str, default: i64) -> Result<i64, AppError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse::<i64>()
            .map_err(|error| AppError::Validation(format!("invalid {name}: {error}"))),
        Err(_) => Ok(default),
    }
}

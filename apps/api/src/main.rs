//! Helmspan API composition root.

#![forbid(unsafe_code)]

mod dto;
mod error;
mod handlers;
mod middleware;
mod state;

use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, Method};
use axum::middleware::from_fn_with_state;
use axum::routing::{delete, get, post, put};
use helmspan_application::{
    ArtifactStore, BillingConfig, BillingService, ClusterApi, DeploymentRepository, ImageBuilder,
    LogRepository, ManifestSynthesizer, MetricsBackend, NotificationService, PipelineService,
    ProjectRepository, ProjectService, SynthesizerConfig, UploadSigner,
};
use helmspan_core::AppError;
use helmspan_domain::{BillingRates, DEFAULT_THRESHOLD_LADDER, ThresholdLadder};
use helmspan_infrastructure::{
    ConsoleNotificationService, FsArtifactStore, HmacUploadSigner, HttpClusterApi,
    HttpClusterConfig, HttpImageBuilder, HttpImageBuilderConfig, PostgresAccountingRepository,
    PostgresDeploymentRepository, PostgresLogRepository, PostgresProjectRepository,
    PrometheusMetricsBackend, SmtpNotificationConfig, SmtpNotificationService,
};
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::state::AppState;

/// Upper bound for uploaded artifact archives.
const MAX_ARTIFACT_BYTES: usize = 256 * 1024 * 1024;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let migrate_only = env::args().nth(1).as_deref() == Some("migrate");

    let database_url = required_env("DATABASE_URL")?;
    let api_host = env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_owned());
    let api_port = env::var("API_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(3001);
    let frontend_url =
        env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:3000".to_owned());

    let operator_token = required_non_empty_env("OPERATOR_TOKEN")?;
    let upload_signing_key = required_non_empty_env("UPLOAD_SIGNING_KEY")?;

    let synthesizer_config = SynthesizerConfig {
        base_domain: required_non_empty_env("BASE_DOMAIN")?,
        log_verbosity: env::var("WORKLOAD_LOG_LEVEL").unwrap_or_else(|_| "info".to_owned()),
        main_broadcast_url: required_non_empty_env("MAIN_BROADCAST_URL")?,
        main_broadcast_api_key: required_non_empty_env("MAIN_BROADCAST_API_KEY")?,
        test_broadcast_url: required_non_empty_env("TEST_BROADCAST_URL")?,
        test_broadcast_api_key: required_non_empty_env("TEST_BROADCAST_API_KEY")?,
    };

    let cluster_config = HttpClusterConfig {
        base_url: required_non_empty_env("CLUSTER_API_URL")?,
        api_token: required_non_empty_env("CLUSTER_API_TOKEN")?,
    };
    let builder_config = HttpImageBuilderConfig {
        base_url: required_non_empty_env("BUILD_SERVICE_URL")?,
        api_token: required_non_empty_env("BUILD_SERVICE_TOKEN")?,
    };
    let metrics_url = required_non_empty_env("METRICS_URL")?;

    let archive_dir = PathBuf::from(
        env::var("ARTIFACT_ARCHIVE_DIR")
            .unwrap_or_else(|_| "/var/lib/helmspan/archives".to_owned()),
    );
    let extract_dir = PathBuf::from(
        env::var("ARTIFACT_EXTRACT_DIR")
            .unwrap_or_else(|_| "/var/lib/helmspan/unpacked".to_owned()),
    );

    let billing_config = billing_config_from_env()?;
    let notification_provider =
        env::var("NOTIFICATION_PROVIDER").unwrap_or_else(|_| "console".to_owned());

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))?;

    sqlx::migrate!("../../crates/infrastructure/migrations")
        .run(&pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to run migrations: {error}")))?;

    if migrate_only {
        info!("database migrations applied successfully");
        return Ok(());
    }

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(60))
        .build()
        .map_err(|error| AppError::Internal(format!("failed to build HTTP client: {error}")))?;

    let project_repository: Arc<dyn ProjectRepository> =
        Arc::new(PostgresProjectRepository::new(pool.clone()));
    let deployment_repository: Arc<dyn DeploymentRepository> =
        Arc::new(PostgresDeploymentRepository::new(pool.clone()));
    let log_repository: Arc<dyn LogRepository> = Arc::new(PostgresLogRepository::new(pool.clone()));
    let accounting_repository = Arc::new(PostgresAccountingRepository::new(pool.clone()));

    let artifact_store: Arc<dyn ArtifactStore> =
        Arc::new(FsArtifactStore::new(archive_dir, extract_dir));
    let image_builder: Arc<dyn ImageBuilder> =
        Arc::new(HttpImageBuilder::new(http_client.clone(), builder_config));
    let cluster_api: Arc<dyn ClusterApi> =
        Arc::new(HttpClusterApi::new(http_client.clone(), cluster_config));
    let metrics_backend: Arc<dyn MetricsBackend> =
        Arc::new(PrometheusMetricsBackend::new(http_client.clone(), metrics_url));
    let upload_signer: Arc<dyn UploadSigner> =
        Arc::new(HmacUploadSigner::new(upload_signing_key.into_bytes())?);

    let notifier: Arc<dyn NotificationService> = match notification_provider.as_str() {
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
        _ => {
            return Err(AppError::Validation(format!(
                "NOTIFICATION_PROVIDER must be either 'console' or 'smtp', got '{notification_provider}'"
            )));
        }
    };

    let project_service = Arc::new(ProjectService::new(
        project_repository.clone(),
        log_repository.clone(),
    ));
    let pipeline_service = Arc::new(PipelineService::new(
        project_repository.clone(),
        deployment_repository,
        log_repository.clone(),
        artifact_store,
        image_builder,
        cluster_api.clone(),
        notifier.clone(),
        upload_signer,
        ManifestSynthesizer::new(synthesizer_config),
    ));
    let billing_service = Arc::new(BillingService::new(
        project_repository,
        accounting_repository,
        log_repository,
        metrics_backend,
        cluster_api,
        notifier,
        billing_config,
    ));

    let app_state = AppState {
        project_service,
        pipeline_service,
        billing_service,
        operator_token,
    };

    let protected_routes = Router::new()
        .route(
            "/api/projects/{project_id}",
            get(handlers::projects::project_handler)
                .delete(handlers::projects::delete_project_handler),
        )
        .route(
            "/api/projects/{project_id}/admins",
            get(handlers::projects::list_admins_handler)
                .post(handlers::projects::add_admin_handler),
        )
        .route(
            "/api/projects/{project_id}/admins/{subject}",
            delete(handlers::projects::remove_admin_handler),
        )
        .route(
            "/api/projects/{project_id}/deployments",
            post(handlers::deployments::issue_slot_handler),
        )
        .route(
            "/api/projects/{project_id}/deployments/{deployment_id}",
            get(handlers::deployments::deployment_handler),
        )
        .route(
            "/api/projects/{project_id}/logs",
            get(handlers::deployments::logs_handler),
        )
        .route(
            "/api/projects/{project_id}/billing",
            get(handlers::billing::billing_history_handler),
        )
        .route(
            "/api/projects/{project_id}/billing/topup",
            post(handlers::billing::top_up_handler),
        )
        .route_layer(from_fn_with_state(
            app_state.clone(),
            middleware::require_admin,
        ));

    let cors_layer = CorsLayer::new()
        .allow_origin(
            HeaderValue::from_str(&frontend_url)
                .map_err(|error| AppError::Internal(format!("invalid FRONTEND_URL: {error}")))?,
        )
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE]);

    let app = Router::new()
        .route("/health", get(handlers::health::health_handler))
        .route("/api/projects", post(handlers::projects::create_project_handler))
        .route(
            "/api/projects/{project_id}/deployments/{deployment_id}/artifact",
            put(handlers::deployments::upload_artifact_handler),
        )
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(MAX_ARTIFACT_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(app_state);

    let host = IpAddr::from_str(&api_host)
        .map_err(|error| AppError::Internal(format!("invalid API_HOST '{api_host}': {error}")))?;
    let address = SocketAddr::from((host, api_port));

    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|error| AppError::Internal(format!("failed to bind listener: {error}")))?;

    info!(%address, "helmspan-api listening");

    axum::serve(listener, app)
        .await
        .map_err(|error| AppError::Internal(format!("api server error: {error}")))
}

fn billing_config_from_env() -> Result<BillingConfig, AppError> {
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

    Ok(BillingConfig {
        rates,
        tick_interval: Duration::from_secs(tick_seconds.unsigned_abs()),
        thresholds,
        gating_enabled,
    })
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

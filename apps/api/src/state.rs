use std::sync::Arc;

use helmspan_application::{BillingService, PipelineService, ProjectService};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub project_service: Arc<ProjectService>,
    pub pipeline_service: Arc<PipelineService>,
    pub billing_service: Arc<BillingService>,
    pub operator_token: String,
}

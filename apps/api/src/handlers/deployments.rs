use axum::Json;
use axum::body::Bytes;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;

use helmspan_application::LogQuery;
use helmspan_core::{AdminIdentity, DeploymentId};
use uuid::Uuid;

use crate::dto::{DeploymentResponse, IssueSlotResponse, LogEntryResponse};
use crate::error::ApiResult;
use crate::handlers::ensure_project_scope;
use crate::state::AppState;

const DEFAULT_PAGE_SIZE: usize = 100;
const MAX_PAGE_SIZE: usize = 500;

#[derive(Debug, serde::Deserialize)]
pub struct UploadQuery {
    pub signature: String,
}

#[derive(Debug, serde::Deserialize)]
pub struct LogListQuery {
    pub deployment_id: Option<Uuid>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

pub async fn issue_slot_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<AdminIdentity>,
    Path(project_id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<IssueSlotResponse>)> {
    ensure_project_scope(&identity, project_id)?;

    let slot = state.pipeline_service.issue_slot(&identity).await?;
    let upload_path = format!(
        "/api/projects/{project_id}/deployments/{}/artifact?signature={}",
        slot.deployment_id, slot.signature
    );

    Ok((
        StatusCode::CREATED,
        Json(IssueSlotResponse {
            deployment_id: slot.deployment_id.as_uuid(),
            signature: slot.signature,
            upload_path,
        }),
    ))
}

/// Authenticated by the signed upload credential, not a bearer token.
pub async fn upload_artifact_handler(
    State(state): State<AppState>,
    Path((_project_id, deployment_id)): Path<(Uuid, Uuid)>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> ApiResult<StatusCode> {
    state
        .pipeline_service
        .upload_artifact(DeploymentId::from_uuid(deployment_id), &query.signature, &body)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn deployment_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<AdminIdentity>,
    Path((project_id, deployment_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<DeploymentResponse>> {
    ensure_project_scope(&identity, project_id)?;

    let deployment = state
        .pipeline_service
        .deployment(&identity, DeploymentId::from_uuid(deployment_id))
        .await?;

    Ok(Json(DeploymentResponse::from(deployment)))
}

pub async fn logs_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<AdminIdentity>,
    Path(project_id): Path<Uuid>,
    Query(query): Query<LogListQuery>,
) -> ApiResult<Json<Vec<LogEntryResponse>>> {
    ensure_project_scope(&identity, project_id)?;

    let entries = state
        .pipeline_service
        .logs(
            &identity,
            LogQuery {
                deployment_id: query.deployment_id.map(DeploymentId::from_uuid),
                limit: query.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE),
                offset: query.offset.unwrap_or(0),
            },
        )
        .await?
        .into_iter()
        .map(LogEntryResponse::from)
        .collect();

    Ok(Json(entries))
}

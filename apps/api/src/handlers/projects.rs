use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::{HeaderMap, StatusCode};

use helmspan_application::{AddAdminInput, CreateProjectInput};
use helmspan_core::{AdminIdentity, AppError};
use helmspan_domain::NetworkSelector;
use uuid::Uuid;

use crate::dto::{
    AddAdminRequest, AdminResponse, CreateProjectRequest, CreateProjectResponse, ProjectResponse,
};
use crate::error::ApiResult;
use crate::handlers::ensure_project_scope;
use crate::middleware::bearer_token;
use crate::state::AppState;

pub async fn create_project_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateProjectRequest>,
) -> ApiResult<(StatusCode, Json<CreateProjectResponse>)> {
    if bearer_token(&headers) != Some(state.operator_token.as_str()) {
        return Err(AppError::Unauthorized("invalid operator token".to_owned()).into());
    }

    let created = state
        .project_service
        .create_project(CreateProjectInput {
            display_name: payload.display_name,
            network: NetworkSelector::parse(&payload.network)?,
            funding_key: payload.funding_key,
            initial_balance: payload.initial_balance,
            engine_config: payload.engine_config,
            frontend_domain: payload.frontend_domain,
            backend_domain: payload.backend_domain,
            admin_subject: payload.admin_subject,
            admin_email: payload.admin_email,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateProjectResponse {
            project: ProjectResponse::from(created.project),
            admin_token: created.admin_token,
        }),
    ))
}

pub async fn project_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<AdminIdentity>,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Json<ProjectResponse>> {
    ensure_project_scope(&identity, project_id)?;

    let project = state.project_service.project(&identity).await?;
    Ok(Json(ProjectResponse::from(project)))
}

pub async fn delete_project_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<AdminIdentity>,
    Path(project_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    ensure_project_scope(&identity, project_id)?;

    state.project_service.delete_project(&identity).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_admins_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<AdminIdentity>,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Json<Vec<AdminResponse>>> {
    ensure_project_scope(&identity, project_id)?;

    let admins = state
        .project_service
        .list_admins(&identity)
        .await?
        .into_iter()
        .map(AdminResponse::from)
        .collect();

    Ok(Json(admins))
}

pub async fn add_admin_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<AdminIdentity>,
    Path(project_id): Path<Uuid>,
    Json(payload): Json<AddAdminRequest>,
) -> ApiResult<(StatusCode, Json<AdminResponse>)> {
    ensure_project_scope(&identity, project_id)?;

    let admin = state
        .project_service
        .add_admin(
            &identity,
            AddAdminInput {
                subject: payload.subject,
                email: payload.email,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(AdminResponse::from(admin))))
}

pub async fn remove_admin_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<AdminIdentity>,
    Path((project_id, subject)): Path<(Uuid, String)>,
) -> ApiResult<StatusCode> {
    ensure_project_scope(&identity, project_id)?;

    state
        .project_service
        .remove_admin(&identity, &subject)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

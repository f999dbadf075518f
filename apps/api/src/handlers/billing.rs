use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;

use helmspan_application::{LedgerQuery, TopUpInput};
use helmspan_core::AdminIdentity;
use uuid::Uuid;

use crate::dto::{LedgerEntryResponse, TopUpRequest};
use crate::error::ApiResult;
use crate::handlers::ensure_project_scope;
use crate::state::AppState;

const DEFAULT_PAGE_SIZE: usize = 100;
const MAX_PAGE_SIZE: usize = 500;

#[derive(Debug, serde::Deserialize)]
pub struct LedgerListQuery {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

pub async fn billing_history_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<AdminIdentity>,
    Path(project_id): Path<Uuid>,
    Query(query): Query<LedgerListQuery>,
) -> ApiResult<Json<Vec<LedgerEntryResponse>>> {
    ensure_project_scope(&identity, project_id)?;

    let entries = state
        .billing_service
        .history(
            &identity,
            LedgerQuery {
                limit: query.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE),
                offset: query.offset.unwrap_or(0),
            },
        )
        .await?
        .into_iter()
        .map(LedgerEntryResponse::from)
        .collect();

    Ok(Json(entries))
}

pub async fn top_up_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<AdminIdentity>,
    Path(project_id): Path<Uuid>,
    Json(payload): Json<TopUpRequest>,
) -> ApiResult<(StatusCode, Json<LedgerEntryResponse>)> {
    ensure_project_scope(&identity, project_id)?;

    let entry = state
        .billing_service
        .top_up(
            &identity,
            TopUpInput {
                amount: payload.amount,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(LedgerEntryResponse::from(entry))))
}

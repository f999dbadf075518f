use axum::extract::{Request, State};
use axum::http::{HeaderMap, header};
use axum::middleware::Next;
use axum::response::Response;
use helmspan_core::AppError;

use crate::error::ApiResult;
use crate::state::AppState;

/// Optional header naming the acting admin when a project credential is
/// shared between several admins.
pub const SUBJECT_HEADER: &str = "x-helmspan-subject";

pub async fn require_admin(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    let token = bearer_token(request.headers())
        .ok_or_else(|| AppError::Unauthorized("authentication required".to_owned()))?
        .to_owned();
    let subject = request
        .headers()
        .get(SUBJECT_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    let identity = state
        .project_service
        .resolve_token(&token, subject.as_deref())
        .await?;

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

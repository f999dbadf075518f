use helmspan_core::{AdminIdentity, AppError, ProjectId};
use uuid::Uuid;

use crate::error::ApiResult;

pub mod billing;
pub mod deployments;
pub mod health;
pub mod projects;

/// Rejects requests whose path names a project the credential does not
/// belong to.
pub fn ensure_project_scope(identity: &AdminIdentity, project_id: Uuid) -> ApiResult<()> {
    if identity.project_id() != ProjectId::from_uuid(project_id) {
        return Err(AppError::Forbidden(
            "credential does not grant access to this project".to_owned(),
        )
        .into());
    }

    Ok(())
}

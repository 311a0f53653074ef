use axum::{
    Extension,
    extract::{Path, Request, State},
    middleware::Next,
    response::Response,
};
use db::models::{project::Project, task::Task, user::User};
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError};

/// Loads the project addressed by the path, if the caller owns it.
pub async fn load_project_middleware(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<User>,
    Path(project_id): Path<Uuid>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let project = Project::find_owned(&deployment.db().pool, project_id, user.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Project not found".to_string()))?;

    request.extensions_mut().insert(project);
    Ok(next.run(request).await)
}

/// Loads the task addressed by the path, if it is assigned to the caller.
pub async fn load_task_middleware(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<User>,
    Path(task_id): Path<Uuid>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let task = Task::find_assigned(&deployment.db().pool, task_id, user.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))?;

    request.extensions_mut().insert(task);
    Ok(next.run(request).await)
}

use axum::{
    Extension, Json, Router,
    extract::State,
    http::StatusCode,
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::get,
};
use db::models::{
    project::{CreateProject, Project, ProjectWithTasks, UpdateProject},
    user::User,
};
use services::services::domain_events::DomainEvent;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError, middleware::load_project_middleware};

pub async fn get_projects(
    Extension(user): Extension<User>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<Vec<ProjectWithTasks>>>, ApiError> {
    let projects = Project::find_by_owner_with_tasks(&deployment.db().pool, user.id).await?;
    Ok(ResponseJson(ApiResponse::success(projects)))
}

pub async fn get_project(
    Extension(project): Extension<Project>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<ProjectWithTasks>>, ApiError> {
    let project = project.with_tasks(&deployment.db().pool).await?;
    Ok(ResponseJson(ApiResponse::success(project)))
}

pub async fn create_project(
    Extension(user): Extension<User>,
    State(deployment): State<DeploymentImpl>,
    Json(mut payload): Json<CreateProject>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<ProjectWithTasks>>), ApiError> {
    payload.title = payload.title.trim().to_string();
    if payload.title.is_empty() {
        return Err(ApiError::BadRequest("Title is required".to_string()));
    }

    let pool = &deployment.db().pool;
    let project = Project::create(pool, &payload, Uuid::new_v4(), user.id)
        .await?
        .with_tasks(pool)
        .await?;
    tracing::debug!(project_id = %project.id, owner_id = %user.id, "Created project");

    deployment
        .events()
        .dispatch(DomainEvent::ProjectCreated {
            project: project.clone(),
        })
        .await;

    Ok((StatusCode::CREATED, ResponseJson(ApiResponse::success(project))))
}

pub async fn update_project(
    Extension(existing): Extension<Project>,
    State(deployment): State<DeploymentImpl>,
    Json(mut payload): Json<UpdateProject>,
) -> Result<ResponseJson<ApiResponse<ProjectWithTasks>>, ApiError> {
    if let Some(title) = payload.title.as_mut() {
        *title = title.trim().to_string();
        if title.is_empty() {
            return Err(ApiError::BadRequest("Title cannot be empty".to_string()));
        }
    }

    let pool = &deployment.db().pool;
    let project = Project::update(pool, &existing, &payload)
        .await?
        .with_tasks(pool)
        .await?;

    deployment
        .events()
        .dispatch(DomainEvent::ProjectUpdated {
            project: project.clone(),
        })
        .await;

    Ok(ResponseJson(ApiResponse::success(project)))
}

pub async fn delete_project(
    Extension(project): Extension<Project>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let rows_affected = Project::delete(&deployment.db().pool, project.id).await?;
    if rows_affected == 0 {
        return Err(ApiError::NotFound("Project not found".to_string()));
    }
    tracing::debug!(project_id = %project.id, "Deleted project");
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    let project_id_router = Router::new()
        .route(
            "/",
            get(get_project).put(update_project).delete(delete_project),
        )
        .layer(from_fn_with_state(
            deployment.clone(),
            load_project_middleware,
        ));

    let projects_router = Router::new()
        .route("/", get(get_projects).post(create_project))
        .nest("/{id}", project_id_router);

    Router::new().nest("/projects", projects_router)
}

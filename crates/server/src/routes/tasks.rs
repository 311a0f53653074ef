use axum::{
    Extension, Json, Router,
    extract::{Query, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::get,
};
use db::models::{
    project::Project,
    task::{CreateTask, Task, TaskFilter, TaskWithRelations, UpdateTask},
    user::User,
};
use services::services::domain_events::DomainEvent;
use sqlx::SqlitePool;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError, middleware::load_task_middleware};

async fn with_relations(pool: &SqlitePool, task_id: Uuid) -> Result<TaskWithRelations, ApiError> {
    Task::find_with_relations(pool, task_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))
}

pub async fn get_tasks(
    Extension(user): Extension<User>,
    State(deployment): State<DeploymentImpl>,
    Query(filter): Query<TaskFilter>,
) -> Result<ResponseJson<ApiResponse<Vec<TaskWithRelations>>>, ApiError> {
    let tasks = Task::find_for_assignee(&deployment.db().pool, user.id, &filter).await?;
    Ok(ResponseJson(ApiResponse::success(tasks)))
}

pub async fn get_task(
    Extension(task): Extension<Task>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<TaskWithRelations>>, ApiError> {
    let task = with_relations(&deployment.db().pool, task.id).await?;
    Ok(ResponseJson(ApiResponse::success(task)))
}

pub async fn create_task(
    Extension(user): Extension<User>,
    State(deployment): State<DeploymentImpl>,
    Json(mut payload): Json<CreateTask>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<TaskWithRelations>>), ApiError> {
    payload.title = payload.title.trim().to_string();
    if payload.title.is_empty() {
        return Err(ApiError::BadRequest(
            "Title and projectId are required".to_string(),
        ));
    }

    let pool = &deployment.db().pool;
    if Project::find_owned(pool, payload.project_id, user.id)
        .await?
        .is_none()
    {
        return Err(ApiError::NotFound("Project not found".to_string()));
    }

    tracing::debug!(
        project_id = %payload.project_id,
        "Creating task '{}'",
        payload.title
    );
    let task = Task::create(pool, &payload, Uuid::new_v4(), user.id).await?;
    let task = with_relations(pool, task.id).await?;

    deployment
        .events()
        .dispatch(DomainEvent::TaskCreated { task: task.clone() })
        .await;

    Ok((StatusCode::CREATED, ResponseJson(ApiResponse::success(task))))
}

pub async fn update_task(
    Extension(existing): Extension<Task>,
    State(deployment): State<DeploymentImpl>,
    Json(mut payload): Json<UpdateTask>,
) -> Result<ResponseJson<ApiResponse<TaskWithRelations>>, ApiError> {
    if let Some(title) = payload.title.as_mut() {
        *title = title.trim().to_string();
        if title.is_empty() {
            return Err(ApiError::BadRequest("Title cannot be empty".to_string()));
        }
    }

    let pool = &deployment.db().pool;
    let task = Task::update(pool, &existing, &payload).await?;
    let task = with_relations(pool, task.id).await?;

    deployment
        .events()
        .dispatch(DomainEvent::TaskUpdated { task: task.clone() })
        .await;

    Ok(ResponseJson(ApiResponse::success(task)))
}

pub async fn delete_task(
    Extension(task): Extension<Task>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let rows_affected = Task::delete(&deployment.db().pool, task.id).await?;
    if rows_affected == 0 {
        return Err(ApiError::NotFound("Task not found".to_string()));
    }
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    let task_id_router = Router::new()
        .route("/", get(get_task).put(update_task).delete(delete_task))
        .layer(from_fn_with_state(deployment.clone(), load_task_middleware));

    let tasks_router = Router::new()
        .route("/", get(get_tasks).post(create_task))
        .nest("/{id}", task_id_router);

    Router::new().nest("/tasks", tasks_router)
}

use axum::{
    Extension, Json, Router,
    extract::State,
    http::StatusCode,
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::user::{AuthToken, LoginUser, RegisterUser, User};
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError};

pub async fn register(
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<RegisterUser>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<AuthToken>>), ApiError> {
    let session = deployment.auth().register(&payload).await?;
    Ok((StatusCode::CREATED, ResponseJson(ApiResponse::success(session))))
}

pub async fn login(
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<LoginUser>,
) -> Result<ResponseJson<ApiResponse<AuthToken>>, ApiError> {
    let session = deployment.auth().login(&payload).await?;
    Ok(ResponseJson(ApiResponse::success(session)))
}

pub async fn me(Extension(user): Extension<User>) -> ResponseJson<ApiResponse<User>> {
    ResponseJson(ApiResponse::success(user))
}

/// Routes reachable without a token.
pub fn router() -> Router<DeploymentImpl> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

/// Routes that expect `require_auth` to have run.
pub fn protected_router() -> Router<DeploymentImpl> {
    Router::new().route("/auth/me", get(me))
}

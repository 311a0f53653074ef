use axum::response::Json;
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utils::response::ApiResponse;

#[derive(Debug, Serialize, Deserialize, TS)]
pub struct HealthStatus {
    pub status: String,
    pub message: String,
}

pub async fn health_check() -> Json<ApiResponse<HealthStatus>> {
    Json(ApiResponse::success(HealthStatus {
        status: "OK".to_string(),
        message: "Server is running".to_string(),
    }))
}

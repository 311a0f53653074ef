use std::time::Duration;

use async_trait::async_trait;
use db::models::{
    project::{CreateProject, ProjectWithTasks, UpdateProject},
    task::{CreateTask, TaskFilter, TaskWithRelations, UpdateTask},
    user::{AuthToken, LoginUser, RegisterUser, User},
};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use utils::response::ApiResponse;
use uuid::Uuid;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ApiClientError {
    #[error("Failed to reach the API: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("API returned {status}: {message}")]
    Status { status: StatusCode, message: String },
    #[error("API returned an error: {0}")]
    Rejected(String),
    #[error("API response carried no data")]
    MissingData,
}

impl ApiClientError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport(e) => e.status(),
            _ => None,
        }
    }
}

/// Source of authoritative collections for the reconciler.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch_projects(&self) -> Result<Vec<ProjectWithTasks>, ApiClientError>;

    async fn fetch_tasks(
        &self,
        filter: &TaskFilter,
    ) -> Result<Vec<TaskWithRelations>, ApiClientError>;
}

/// Client of the REST API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// `base_url` is the server origin, e.g. `http://localhost:5000`.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiClientError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ApiClientError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub async fn register(&mut self, payload: &RegisterUser) -> Result<AuthToken, ApiClientError> {
        let auth: AuthToken = self
            .send_json(self.client.post(self.url("/auth/register")).json(payload))
            .await?;
        self.token = Some(auth.token.clone());
        Ok(auth)
    }

    pub async fn login(&mut self, payload: &LoginUser) -> Result<AuthToken, ApiClientError> {
        let auth: AuthToken = self
            .send_json(self.client.post(self.url("/auth/login")).json(payload))
            .await?;
        self.token = Some(auth.token.clone());
        Ok(auth)
    }

    pub async fn me(&self) -> Result<User, ApiClientError> {
        self.send_json(self.authorized(self.client.get(self.url("/auth/me"))))
            .await
    }

    pub async fn list_projects(&self) -> Result<Vec<ProjectWithTasks>, ApiClientError> {
        self.send_json(self.authorized(self.client.get(self.url("/projects"))))
            .await
    }

    pub async fn get_project(&self, id: Uuid) -> Result<ProjectWithTasks, ApiClientError> {
        let url = self.url(&format!("/projects/{id}"));
        self.send_json(self.authorized(self.client.get(url))).await
    }

    pub async fn create_project(
        &self,
        payload: &CreateProject,
    ) -> Result<ProjectWithTasks, ApiClientError> {
        let rb = self.client.post(self.url("/projects")).json(payload);
        self.send_json(self.authorized(rb)).await
    }

    pub async fn update_project(
        &self,
        id: Uuid,
        payload: &UpdateProject,
    ) -> Result<ProjectWithTasks, ApiClientError> {
        let rb = self
            .client
            .put(self.url(&format!("/projects/{id}")))
            .json(payload);
        self.send_json(self.authorized(rb)).await
    }

    pub async fn delete_project(&self, id: Uuid) -> Result<(), ApiClientError> {
        let url = self.url(&format!("/projects/{id}"));
        self.send_unit(self.authorized(self.client.delete(url))).await
    }

    pub async fn list_tasks(
        &self,
        filter: &TaskFilter,
    ) -> Result<Vec<TaskWithRelations>, ApiClientError> {
        let rb = self.client.get(self.url("/tasks")).query(filter);
        self.send_json(self.authorized(rb)).await
    }

    pub async fn get_task(&self, id: Uuid) -> Result<TaskWithRelations, ApiClientError> {
        let url = self.url(&format!("/tasks/{id}"));
        self.send_json(self.authorized(self.client.get(url))).await
    }

    pub async fn create_task(
        &self,
        payload: &CreateTask,
    ) -> Result<TaskWithRelations, ApiClientError> {
        let rb = self.client.post(self.url("/tasks")).json(payload);
        self.send_json(self.authorized(rb)).await
    }

    pub async fn update_task(
        &self,
        id: Uuid,
        payload: &UpdateTask,
    ) -> Result<TaskWithRelations, ApiClientError> {
        let rb = self
            .client
            .put(self.url(&format!("/tasks/{id}")))
            .json(payload);
        self.send_json(self.authorized(rb)).await
    }

    pub async fn delete_task(&self, id: Uuid) -> Result<(), ApiClientError> {
        let url = self.url(&format!("/tasks/{id}"));
        self.send_unit(self.authorized(self.client.delete(url))).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    fn authorized(&self, rb: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => rb.bearer_auth(token),
            None => rb,
        }
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        rb: RequestBuilder,
    ) -> Result<T, ApiClientError> {
        self.send_envelope(rb)
            .await?
            .into_data()
            .ok_or(ApiClientError::MissingData)
    }

    async fn send_unit(&self, rb: RequestBuilder) -> Result<(), ApiClientError> {
        self.send_envelope::<serde_json::Value>(rb).await.map(|_| ())
    }

    async fn send_envelope<T: DeserializeOwned>(
        &self,
        rb: RequestBuilder,
    ) -> Result<ApiResponse<T>, ApiClientError> {
        let resp = rb.send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiResponse<serde_json::Value>>(&body)
                .ok()
                .and_then(|envelope| envelope.message().map(str::to_string))
                .unwrap_or(body);
            return Err(ApiClientError::Status { status, message });
        }

        let envelope = resp.json::<ApiResponse<T>>().await?;
        if !envelope.is_success() {
            let message = envelope.message().unwrap_or("Unknown error").to_string();
            return Err(ApiClientError::Rejected(message));
        }
        Ok(envelope)
    }
}

#[async_trait]
impl Fetcher for ApiClient {
    async fn fetch_projects(&self) -> Result<Vec<ProjectWithTasks>, ApiClientError> {
        self.list_projects().await
    }

    async fn fetch_tasks(
        &self,
        filter: &TaskFilter,
    ) -> Result<Vec<TaskWithRelations>, ApiClientError> {
        self.list_tasks(filter).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalized() {
        let client = ApiClient::new("http://localhost:5000/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:5000");
        assert_eq!(client.url("/projects"), "http://localhost:5000/api/projects");
        assert!(client.token().is_none());

        let client = client.with_token("abc");
        assert_eq!(client.token(), Some("abc"));
    }

    #[test]
    fn status_is_exposed_for_http_failures() {
        let err = ApiClientError::Status {
            status: StatusCode::NOT_FOUND,
            message: "Project not found".to_string(),
        };
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
        assert_eq!(err.to_string(), "API returned 404 Not Found: Project not found");
        assert_eq!(ApiClientError::MissingData.status(), None);
    }
}

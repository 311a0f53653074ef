use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

use super::task::Task;

#[derive(
    Debug, Clone, Type, Serialize, Deserialize, PartialEq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "project_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProjectStatus {
    #[default]
    Active,
    Completed,
    OnHold,
    Archived,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: ProjectStatus,
    pub owner_id: Uuid, // Foreign key to User
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// REST representation of a project: the record plus its tasks.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct ProjectWithTasks {
    #[serde(flatten)]
    #[ts(flatten)]
    pub project: Project,
    pub tasks: Vec<Task>,
    pub task_count: i64,
}

impl std::ops::Deref for ProjectWithTasks {
    type Target = Project;
    fn deref(&self) -> &Self::Target {
        &self.project
    }
}

/// Minimal project reference embedded in task representations.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS, PartialEq)]
pub struct ProjectSummary {
    pub id: Uuid,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateProject {
    #[serde(default)]
    pub title: String,
    pub description: Option<String>,
    pub status: Option<ProjectStatus>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateProject {
    pub title: Option<String>,
    /// `null` clears the description, absence leaves it untouched.
    #[serde(
        default,
        deserialize_with = "super::double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<Option<String>>,
    pub status: Option<ProjectStatus>,
}

const PROJECT_COLUMNS: &str = "id, title, description, status, owner_id, created_at, updated_at";

impl Project {
    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Project>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Finds a project only if it belongs to `owner_id`.
    pub async fn find_owned(
        pool: &SqlitePool,
        id: Uuid,
        owner_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Project>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1 AND owner_id = $2"
        ))
        .bind(id)
        .bind(owner_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_owner(
        pool: &SqlitePool,
        owner_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Project>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE owner_id = $1 ORDER BY created_at DESC, rowid DESC"
        ))
        .bind(owner_id)
        .fetch_all(pool)
        .await
    }

    /// All projects of an owner with their tasks, newest project first.
    pub async fn find_by_owner_with_tasks(
        pool: &SqlitePool,
        owner_id: Uuid,
    ) -> Result<Vec<ProjectWithTasks>, sqlx::Error> {
        let projects = Self::find_by_owner(pool, owner_id).await?;
        let mut tasks_by_project: HashMap<Uuid, Vec<Task>> = HashMap::new();
        for task in Task::find_in_projects_owned_by(pool, owner_id).await? {
            tasks_by_project.entry(task.project_id).or_default().push(task);
        }

        Ok(projects
            .into_iter()
            .map(|project| {
                let tasks = tasks_by_project.remove(&project.id).unwrap_or_default();
                ProjectWithTasks {
                    task_count: tasks.len() as i64,
                    project,
                    tasks,
                }
            })
            .collect())
    }

    pub async fn with_tasks(self, pool: &SqlitePool) -> Result<ProjectWithTasks, sqlx::Error> {
        let tasks = Task::find_by_project_id(pool, self.id).await?;
        Ok(ProjectWithTasks {
            task_count: tasks.len() as i64,
            project: self,
            tasks,
        })
    }

    pub async fn create(
        pool: &SqlitePool,
        data: &CreateProject,
        project_id: Uuid,
        owner_id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        let status = data.status.clone().unwrap_or_default();
        let now = Utc::now();
        sqlx::query_as::<_, Project>(&format!(
            r#"INSERT INTO projects (id, title, description, status, owner_id, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $6)
               RETURNING {PROJECT_COLUMNS}"#
        ))
        .bind(project_id)
        .bind(&data.title)
        .bind(&data.description)
        .bind(status)
        .bind(owner_id)
        .bind(now)
        .fetch_one(pool)
        .await
    }

    /// Applies the provided fields of `data` on top of `existing`.
    pub async fn update(
        pool: &SqlitePool,
        existing: &Project,
        data: &UpdateProject,
    ) -> Result<Self, sqlx::Error> {
        let title = data.title.clone().unwrap_or_else(|| existing.title.clone());
        let description = match &data.description {
            Some(description) => description.clone(),
            None => existing.description.clone(),
        };
        let status = data.status.clone().unwrap_or_else(|| existing.status.clone());

        sqlx::query_as::<_, Project>(&format!(
            r#"UPDATE projects
               SET title = $2, description = $3, status = $4, updated_at = $5
               WHERE id = $1
               RETURNING {PROJECT_COLUMNS}"#
        ))
        .bind(existing.id)
        .bind(title)
        .bind(description)
        .bind(status)
        .bind(Utc::now())
        .fetch_one(pool)
        .await
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

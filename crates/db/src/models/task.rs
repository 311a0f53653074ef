use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

use super::{project::ProjectSummary, user::UserSummary};

#[derive(
    Debug, Clone, Type, Serialize, Deserialize, PartialEq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "task_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Done,
}

#[derive(
    Debug, Clone, Type, Serialize, Deserialize, PartialEq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "task_priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<DateTime<Utc>>,
    pub project_id: Uuid,  // Foreign key to Project
    pub assignee_id: Uuid, // Foreign key to User
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// REST representation of a task: the record plus its project and assignee.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct TaskWithRelations {
    #[serde(flatten)]
    #[ts(flatten)]
    pub task: Task,
    pub project: ProjectSummary,
    pub assignee: UserSummary,
}

impl std::ops::Deref for TaskWithRelations {
    type Target = Task;
    fn deref(&self) -> &Self::Target {
        &self.task
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct CreateTask {
    #[serde(default)]
    pub title: String,
    pub description: Option<String>,
    pub project_id: Uuid,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTask {
    pub title: Option<String>,
    #[serde(
        default,
        deserialize_with = "super::double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<Option<String>>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    /// `null` clears the due date, absence leaves it untouched.
    #[serde(
        default,
        deserialize_with = "super::double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub due_date: Option<Option<DateTime<Utc>>>,
}

/// Optional filters of the task listing; unset fields match everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<TaskPriority>,
}

const TASK_COLUMNS: &str = "t.id, t.title, t.description, t.status, t.priority, t.due_date, t.project_id, t.assignee_id, t.created_at, t.updated_at";

#[derive(FromRow)]
struct TaskWithRelationsRow {
    id: Uuid,
    title: String,
    description: Option<String>,
    status: TaskStatus,
    priority: TaskPriority,
    due_date: Option<DateTime<Utc>>,
    project_id: Uuid,
    assignee_id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    project_title: String,
    assignee_name: String,
    assignee_email: String,
}

impl From<TaskWithRelationsRow> for TaskWithRelations {
    fn from(rec: TaskWithRelationsRow) -> Self {
        TaskWithRelations {
            project: ProjectSummary {
                id: rec.project_id,
                title: rec.project_title,
            },
            assignee: UserSummary {
                id: rec.assignee_id,
                name: rec.assignee_name,
                email: rec.assignee_email,
            },
            task: Task {
                id: rec.id,
                title: rec.title,
                description: rec.description,
                status: rec.status,
                priority: rec.priority,
                due_date: rec.due_date,
                project_id: rec.project_id,
                assignee_id: rec.assignee_id,
                created_at: rec.created_at,
                updated_at: rec.updated_at,
            },
        }
    }
}

fn with_relations_query(filter_sql: &str) -> String {
    format!(
        r#"SELECT {TASK_COLUMNS},
  p.title AS project_title,
  u.name  AS assignee_name,
  u.email AS assignee_email
FROM tasks t
JOIN projects p ON p.id = t.project_id
JOIN users u    ON u.id = t.assignee_id
WHERE {filter_sql}
ORDER BY t.created_at DESC, t.rowid DESC"#
    )
}

impl Task {
    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!("SELECT {TASK_COLUMNS} FROM tasks t WHERE t.id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Finds a task only if it is assigned to `assignee_id`.
    pub async fn find_assigned(
        pool: &SqlitePool,
        id: Uuid,
        assignee_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks t WHERE t.id = $1 AND t.assignee_id = $2"
        ))
        .bind(id)
        .bind(assignee_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_project_id(
        pool: &SqlitePool,
        project_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks t WHERE t.project_id = $1 ORDER BY t.created_at DESC, t.rowid DESC"
        ))
        .bind(project_id)
        .fetch_all(pool)
        .await
    }

    /// Every task that lives in a project owned by `owner_id`.
    pub async fn find_in_projects_owned_by(
        pool: &SqlitePool,
        owner_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!(
            r#"SELECT {TASK_COLUMNS}
               FROM tasks t
               JOIN projects p ON p.id = t.project_id
               WHERE p.owner_id = $1
               ORDER BY t.created_at DESC, t.rowid DESC"#
        ))
        .bind(owner_id)
        .fetch_all(pool)
        .await
    }

    pub async fn find_with_relations(
        pool: &SqlitePool,
        id: Uuid,
    ) -> Result<Option<TaskWithRelations>, sqlx::Error> {
        let row = sqlx::query_as::<_, TaskWithRelationsRow>(&with_relations_query("t.id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(row.map(TaskWithRelations::from))
    }

    /// Tasks assigned to `assignee_id`, newest first, narrowed by `filter`.
    pub async fn find_for_assignee(
        pool: &SqlitePool,
        assignee_id: Uuid,
        filter: &TaskFilter,
    ) -> Result<Vec<TaskWithRelations>, sqlx::Error> {
        let rows = sqlx::query_as::<_, TaskWithRelationsRow>(&with_relations_query(
            r#"t.assignee_id = $1
  AND ($2 IS NULL OR t.project_id = $2)
  AND ($3 IS NULL OR t.status = $3)
  AND ($4 IS NULL OR t.priority = $4)"#,
        ))
        .bind(assignee_id)
        .bind(filter.project_id)
        .bind(filter.status.clone())
        .bind(filter.priority.clone())
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(TaskWithRelations::from).collect())
    }

    pub async fn create(
        pool: &SqlitePool,
        data: &CreateTask,
        task_id: Uuid,
        assignee_id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        let priority = data.priority.clone().unwrap_or_default();
        let now = Utc::now();
        sqlx::query_as::<_, Task>(
            r#"INSERT INTO tasks (id, title, description, status, priority, due_date, project_id, assignee_id, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
               RETURNING id, title, description, status, priority, due_date, project_id, assignee_id, created_at, updated_at"#,
        )
        .bind(task_id)
        .bind(&data.title)
        .bind(&data.description)
        .bind(TaskStatus::default())
        .bind(priority)
        .bind(data.due_date)
        .bind(data.project_id)
        .bind(assignee_id)
        .bind(now)
        .fetch_one(pool)
        .await
    }

    /// Applies the provided fields of `data` on top of `existing`.
    pub async fn update(
        pool: &SqlitePool,
        existing: &Task,
        data: &UpdateTask,
    ) -> Result<Self, sqlx::Error> {
        let title = data.title.clone().unwrap_or_else(|| existing.title.clone());
        let description = match &data.description {
            Some(description) => description.clone(),
            None => existing.description.clone(),
        };
        let status = data.status.clone().unwrap_or_else(|| existing.status.clone());
        let priority = data
            .priority
            .clone()
            .unwrap_or_else(|| existing.priority.clone());
        let due_date = match data.due_date {
            Some(due_date) => due_date,
            None => existing.due_date,
        };

        sqlx::query_as::<_, Task>(
            r#"UPDATE tasks
               SET title = $2, description = $3, status = $4, priority = $5, due_date = $6, updated_at = $7
               WHERE id = $1
               RETURNING id, title, description, status, priority, due_date, project_id, assignee_id, created_at, updated_at"#,
        )
        .bind(existing.id)
        .bind(title)
        .bind(description)
        .bind(status)
        .bind(priority)
        .bind(due_date)
        .bind(Utc::now())
        .fetch_one(pool)
        .await
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

//! Client-side reconciliation of relayed events.
//!
//! Event payloads are never merged into local state. Each event raises a
//! notification and triggers a refetch of the affected collection, whose
//! response replaces the collection wholesale. Refetches may overlap and
//! complete out of order; the last one to complete wins.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use db::models::{
    project::ProjectWithTasks,
    task::{TaskFilter, TaskWithRelations},
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use utils::relay_msg::{EventKind, RelayEvent};
use uuid::Uuid;

use crate::api::{ApiClientError, Fetcher};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    Info,
    Warning,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(kind: NotificationType, title: &str, message: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.to_string(),
            message,
            kind,
            read: false,
            created_at: Utc::now(),
        }
    }

    /// The notification raised for a relayed event.
    pub fn for_event(event: &RelayEvent) -> Self {
        let title = event.title().unwrap_or("Untitled");
        match event.kind {
            EventKind::ProjectCreated => Self::new(
                NotificationType::Success,
                "New Project",
                format!("New project \"{title}\" created!"),
            ),
            EventKind::ProjectUpdated => Self::new(
                NotificationType::Info,
                "Project Updated",
                format!("Project \"{title}\" was updated"),
            ),
            EventKind::TaskCreated => Self::new(
                NotificationType::Success,
                "New Task",
                format!("New task \"{title}\" created!"),
            ),
            EventKind::TaskUpdated => Self::new(
                NotificationType::Info,
                "Task Updated",
                format!("Task \"{title}\" was updated"),
            ),
        }
    }
}

/// Local view of one client session.
#[derive(Debug, Clone, Default)]
pub struct ClientState {
    pub projects: Vec<ProjectWithTasks>,
    pub tasks: Vec<TaskWithRelations>,
    pub notifications: Vec<Notification>,
    pub current_project: Option<ProjectWithTasks>,
    pub error: Option<String>,
}

impl ClientState {
    pub fn unread_count(&self) -> usize {
        self.notifications.iter().filter(|n| !n.read).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Collection {
    Projects,
    Tasks,
}

impl Collection {
    fn of(kind: EventKind) -> Self {
        if kind.is_project_event() {
            Self::Projects
        } else {
            Self::Tasks
        }
    }

    fn failure_message(&self) -> &'static str {
        match self {
            Self::Projects => "Failed to fetch projects",
            Self::Tasks => "Failed to fetch tasks",
        }
    }
}

pub struct Reconciler<F> {
    fetcher: Arc<F>,
    state: Arc<Mutex<ClientState>>,
}

impl<F> Clone for Reconciler<F> {
    fn clone(&self) -> Self {
        Self {
            fetcher: self.fetcher.clone(),
            state: self.state.clone(),
        }
    }
}

impl<F: Fetcher> Reconciler<F> {
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            state: Arc::new(Mutex::new(ClientState::default())),
        }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Snapshot of the current local state.
    pub fn state(&self) -> ClientState {
        self.state.lock().clone()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.state.lock().notifications.clone()
    }

    /// Raises the event's notification, then refetches the affected
    /// collection. A failed refetch keeps the previous collection, records
    /// the error and raises an error notification; it is not retried.
    pub async fn handle_event(&self, event: &RelayEvent) -> Result<(), ApiClientError> {
        self.push_notification(Notification::for_event(event));
        self.refetch(Collection::of(event.kind)).await
    }

    /// Refetches both collections.
    pub async fn refresh(&self) -> Result<(), ApiClientError> {
        let (projects, tasks) = tokio::join!(
            self.refetch(Collection::Projects),
            self.refetch(Collection::Tasks)
        );
        projects.and(tasks)
    }

    /// Focuses a project from the loaded collection. Returns `false` when
    /// the project is not loaded.
    pub fn select_project(&self, id: Uuid) -> bool {
        let mut state = self.state.lock();
        let selected = state.projects.iter().find(|p| p.id == id).cloned();
        let found = selected.is_some();
        state.current_project = selected;
        found
    }

    pub fn clear_current_project(&self) {
        self.state.lock().current_project = None;
    }

    pub fn push_notification(&self, notification: Notification) {
        self.state.lock().notifications.push(notification);
    }

    pub fn mark_read(&self, id: Uuid) -> bool {
        let mut state = self.state.lock();
        match state.notifications.iter_mut().find(|n| n.id == id) {
            Some(notification) => {
                notification.read = true;
                true
            }
            None => false,
        }
    }

    pub fn mark_all_read(&self) {
        for notification in self.state.lock().notifications.iter_mut() {
            notification.read = true;
        }
    }

    pub fn remove_notification(&self, id: Uuid) -> bool {
        let mut state = self.state.lock();
        let before = state.notifications.len();
        state.notifications.retain(|n| n.id != id);
        state.notifications.len() != before
    }

    async fn refetch(&self, collection: Collection) -> Result<(), ApiClientError> {
        // No lock is held across the fetch; whichever response lands last
        // overwrites the collection.
        let result = match collection {
            Collection::Projects => self
                .fetcher
                .fetch_projects()
                .await
                .map(|projects| self.replace_projects(projects)),
            Collection::Tasks => self
                .fetcher
                .fetch_tasks(&TaskFilter::default())
                .await
                .map(|tasks| {
                    let mut state = self.state.lock();
                    state.tasks = tasks;
                    state.error = None;
                }),
        };

        if let Err(e) = &result {
            tracing::warn!(error = %e, "{}", collection.failure_message());
            let mut state = self.state.lock();
            state.error = Some(collection.failure_message().to_string());
            state.notifications.push(Notification::new(
                NotificationType::Error,
                "Refresh Failed",
                collection.failure_message().to_string(),
            ));
        }
        result
    }

    fn replace_projects(&self, projects: Vec<ProjectWithTasks>) {
        let mut state = self.state.lock();
        if let Some(current) = state.current_project.take() {
            state.current_project = projects.iter().find(|p| p.id == current.id).cloned();
        }
        state.projects = projects;
        state.error = None;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use async_trait::async_trait;
    use db::models::{
        project::{Project, ProjectStatus, ProjectSummary},
        task::{Task, TaskPriority, TaskStatus},
        user::UserSummary,
    };
    use reqwest::StatusCode;
    use serde_json::json;
    use tokio::sync::oneshot;

    use super::*;

    type Gate<T> = oneshot::Receiver<Result<Vec<T>, ApiClientError>>;

    /// Fetcher whose responses are released by the test, in any order.
    #[derive(Default)]
    struct GatedFetcher {
        projects: Mutex<VecDeque<Gate<ProjectWithTasks>>>,
        tasks: Mutex<VecDeque<Gate<TaskWithRelations>>>,
    }

    impl GatedFetcher {
        fn gate_projects(&self) -> oneshot::Sender<Result<Vec<ProjectWithTasks>, ApiClientError>> {
            let (tx, rx) = oneshot::channel();
            self.projects.lock().push_back(rx);
            tx
        }

        fn gate_tasks(&self) -> oneshot::Sender<Result<Vec<TaskWithRelations>, ApiClientError>> {
            let (tx, rx) = oneshot::channel();
            self.tasks.lock().push_back(rx);
            tx
        }
    }

    #[async_trait]
    impl Fetcher for GatedFetcher {
        async fn fetch_projects(&self) -> Result<Vec<ProjectWithTasks>, ApiClientError> {
            let gate = self.projects.lock().pop_front().expect("unexpected project fetch");
            gate.await.expect("gate dropped")
        }

        async fn fetch_tasks(
            &self,
            _filter: &TaskFilter,
        ) -> Result<Vec<TaskWithRelations>, ApiClientError> {
            let gate = self.tasks.lock().pop_front().expect("unexpected task fetch");
            gate.await.expect("gate dropped")
        }
    }

    fn project(id: Uuid, title: &str) -> ProjectWithTasks {
        let now = Utc::now();
        ProjectWithTasks {
            project: Project {
                id,
                title: title.to_string(),
                description: None,
                status: ProjectStatus::Active,
                owner_id: Uuid::nil(),
                created_at: now,
                updated_at: now,
            },
            tasks: Vec::new(),
            task_count: 0,
        }
    }

    fn task(id: Uuid, title: &str, status: TaskStatus) -> TaskWithRelations {
        let now = Utc::now();
        TaskWithRelations {
            task: Task {
                id,
                title: title.to_string(),
                description: None,
                status,
                priority: TaskPriority::Medium,
                due_date: None,
                project_id: Uuid::nil(),
                assignee_id: Uuid::nil(),
                created_at: now,
                updated_at: now,
            },
            project: ProjectSummary {
                id: Uuid::nil(),
                title: "Launch".to_string(),
            },
            assignee: UserSummary {
                id: Uuid::nil(),
                name: "Ada".to_string(),
                email: "ada@example.com".to_string(),
            },
        }
    }

    fn event(kind: EventKind, title: &str) -> RelayEvent {
        RelayEvent::new(kind, json!({ "id": "1", "title": title }))
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn notifications_follow_the_event_kind() {
        let created = Notification::for_event(&event(EventKind::ProjectCreated, "Launch"));
        assert_eq!(created.title, "New Project");
        assert_eq!(created.message, "New project \"Launch\" created!");
        assert_eq!(created.kind, NotificationType::Success);
        assert!(!created.read);

        let updated = Notification::for_event(&event(EventKind::ProjectUpdated, "Launch"));
        assert_eq!(updated.title, "Project Updated");
        assert_eq!(updated.message, "Project \"Launch\" was updated");
        assert_eq!(updated.kind, NotificationType::Info);

        let task = Notification::for_event(&event(EventKind::TaskUpdated, "Docs"));
        assert_eq!(task.title, "Task Updated");
        assert_eq!(task.message, "Task \"Docs\" was updated");

        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["type"], "info");
    }

    #[tokio::test]
    async fn payload_is_not_merged_into_state() {
        let fetcher = GatedFetcher::default();
        let gate = fetcher.gate_projects();
        let reconciler = Reconciler::new(fetcher);

        let fetched = project(Uuid::new_v4(), "From the store");
        gate.send(Ok(vec![fetched.clone()])).unwrap();
        reconciler
            .handle_event(&event(EventKind::ProjectCreated, "From the payload"))
            .await
            .unwrap();

        let state = reconciler.state();
        assert_eq!(state.projects.len(), 1);
        assert_eq!(state.projects[0].title, "From the store");
        assert_eq!(state.unread_count(), 1);
        assert!(state.tasks.is_empty());
    }

    #[tokio::test]
    async fn out_of_order_refetches_converge_on_the_last_completion() {
        let fetcher = GatedFetcher::default();
        let first = fetcher.gate_tasks();
        let second = fetcher.gate_tasks();
        let reconciler = Reconciler::new(fetcher);

        let id = Uuid::new_v4();
        let update = event(EventKind::TaskUpdated, "Docs");
        let a = tokio::spawn({
            let reconciler = reconciler.clone();
            let update = update.clone();
            async move { reconciler.handle_event(&update).await }
        });
        settle().await;
        let b = tokio::spawn({
            let reconciler = reconciler.clone();
            async move { reconciler.handle_event(&update).await }
        });
        settle().await;

        // The second refetch completes first, then the first one lands.
        second
            .send(Ok(vec![task(id, "Docs", TaskStatus::Done)]))
            .unwrap();
        b.await.unwrap().unwrap();
        first
            .send(Ok(vec![task(id, "Docs", TaskStatus::InProgress)]))
            .unwrap();
        a.await.unwrap().unwrap();

        let state = reconciler.state();
        assert_eq!(state.tasks.len(), 1);
        assert_eq!(state.tasks[0].status, TaskStatus::InProgress);
        assert_eq!(state.notifications.len(), 2);
    }

    #[tokio::test]
    async fn failed_refetch_keeps_state_and_reports_once() {
        let fetcher = GatedFetcher::default();
        let ok = fetcher.gate_projects();
        let failing = fetcher.gate_projects();
        let reconciler = Reconciler::new(fetcher);

        ok.send(Ok(vec![project(Uuid::new_v4(), "Launch")])).unwrap();
        reconciler
            .handle_event(&event(EventKind::ProjectCreated, "Launch"))
            .await
            .unwrap();

        failing
            .send(Err(ApiClientError::Status {
                status: StatusCode::SERVICE_UNAVAILABLE,
                message: "down".to_string(),
            }))
            .unwrap();
        let result = reconciler
            .handle_event(&event(EventKind::ProjectUpdated, "Launch"))
            .await;
        assert!(result.is_err());

        let state = reconciler.state();
        assert_eq!(state.projects.len(), 1);
        assert_eq!(state.error.as_deref(), Some("Failed to fetch projects"));
        let errors: Vec<_> = state
            .notifications
            .iter()
            .filter(|n| n.kind == NotificationType::Error)
            .collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].title, "Refresh Failed");
        // No retry was attempted: the fetcher has no gates left to consume.
        assert!(reconciler.fetcher().projects.lock().is_empty());
    }

    #[tokio::test]
    async fn error_clears_after_a_successful_refetch() {
        let fetcher = GatedFetcher::default();
        let failing = fetcher.gate_projects();
        let recovered = fetcher.gate_projects();
        let failing_tasks = fetcher.gate_tasks();
        let recovered_tasks = fetcher.gate_tasks();
        let reconciler = Reconciler::new(fetcher);

        failing
            .send(Err(ApiClientError::Status {
                status: StatusCode::SERVICE_UNAVAILABLE,
                message: "down".to_string(),
            }))
            .unwrap();
        let result = reconciler
            .handle_event(&event(EventKind::ProjectCreated, "Launch"))
            .await;
        assert!(result.is_err());
        assert_eq!(
            reconciler.state().error.as_deref(),
            Some("Failed to fetch projects")
        );

        recovered.send(Ok(vec![project(Uuid::new_v4(), "Launch")])).unwrap();
        reconciler
            .handle_event(&event(EventKind::ProjectUpdated, "Launch"))
            .await
            .unwrap();
        let state = reconciler.state();
        assert_eq!(state.projects.len(), 1);
        assert_eq!(state.error, None);

        failing_tasks
            .send(Err(ApiClientError::Status {
                status: StatusCode::SERVICE_UNAVAILABLE,
                message: "down".to_string(),
            }))
            .unwrap();
        let result = reconciler
            .handle_event(&event(EventKind::TaskCreated, "Docs"))
            .await;
        assert!(result.is_err());
        assert_eq!(reconciler.state().error.as_deref(), Some("Failed to fetch tasks"));

        recovered_tasks.send(Ok(Vec::new())).unwrap();
        reconciler
            .handle_event(&event(EventKind::TaskUpdated, "Docs"))
            .await
            .unwrap();
        assert_eq!(reconciler.state().error, None);
    }

    #[tokio::test]
    async fn current_project_follows_refetches() {
        let fetcher = GatedFetcher::default();
        let initial = fetcher.gate_projects();
        let renamed = fetcher.gate_projects();
        let removed = fetcher.gate_projects();
        let reconciler = Reconciler::new(fetcher);
        let id = Uuid::new_v4();

        initial.send(Ok(vec![project(id, "Launch")])).unwrap();
        reconciler
            .handle_event(&event(EventKind::ProjectCreated, "Launch"))
            .await
            .unwrap();
        assert!(reconciler.select_project(id));
        assert!(!reconciler.select_project(Uuid::new_v4()));
        assert!(reconciler.state().current_project.is_none());
        assert!(reconciler.select_project(id));

        renamed.send(Ok(vec![project(id, "Relaunch")])).unwrap();
        reconciler
            .handle_event(&event(EventKind::ProjectUpdated, "Relaunch"))
            .await
            .unwrap();
        let current = reconciler.state().current_project.unwrap();
        assert_eq!(current.title, "Relaunch");

        removed.send(Ok(Vec::new())).unwrap();
        reconciler
            .handle_event(&event(EventKind::ProjectUpdated, "Relaunch"))
            .await
            .unwrap();
        assert!(reconciler.state().current_project.is_none());
    }

    #[tokio::test]
    async fn notifications_can_be_read_and_removed() {
        let fetcher = GatedFetcher::default();
        let gate = fetcher.gate_tasks();
        let reconciler = Reconciler::new(fetcher);

        gate.send(Ok(Vec::new())).unwrap();
        reconciler
            .handle_event(&event(EventKind::TaskCreated, "Docs"))
            .await
            .unwrap();
        reconciler.push_notification(Notification::new(
            NotificationType::Warning,
            "Heads up",
            "Something happened".to_string(),
        ));

        let notifications = reconciler.notifications();
        assert_eq!(notifications[0].title, "New Task");
        assert_eq!(reconciler.state().unread_count(), 2);

        assert!(reconciler.mark_read(notifications[0].id));
        assert_eq!(reconciler.state().unread_count(), 1);
        assert!(!reconciler.mark_read(Uuid::new_v4()));

        assert!(reconciler.remove_notification(notifications[1].id));
        assert!(!reconciler.remove_notification(notifications[1].id));
        reconciler.mark_all_read();
        assert_eq!(reconciler.state().unread_count(), 0);
        assert_eq!(reconciler.notifications().len(), 1);
    }

    #[tokio::test]
    async fn refresh_reloads_both_collections() {
        let fetcher = GatedFetcher::default();
        let projects = fetcher.gate_projects();
        let tasks = fetcher.gate_tasks();
        let reconciler = Reconciler::new(fetcher);

        projects.send(Ok(vec![project(Uuid::new_v4(), "Launch")])).unwrap();
        tasks
            .send(Ok(vec![task(Uuid::new_v4(), "Docs", TaskStatus::Todo)]))
            .unwrap();
        reconciler.refresh().await.unwrap();

        let state = reconciler.state();
        assert_eq!(state.projects.len(), 1);
        assert_eq!(state.tasks.len(), 1);
        assert!(state.notifications.is_empty());
    }
}

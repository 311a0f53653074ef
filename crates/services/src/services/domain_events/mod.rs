mod dispatcher;
mod handler;
pub mod handlers;

pub use dispatcher::{DispatcherBuilder, DomainEventDispatcher};
pub use handler::{EventHandler, ExecutionMode, HandlerContext, HandlerError};
pub use handlers::RelayBroadcastHandler;

use db::models::{project::ProjectWithTasks, task::TaskWithRelations};
use utils::relay_msg::{EventKind, RelayEvent};

/// Committed mutations of projects and tasks.
///
/// Each variant carries the record in its REST representation, which is
/// also the payload broadcast to the real-time layer.
#[derive(Debug, Clone)]
pub enum DomainEvent {
    ProjectCreated { project: ProjectWithTasks },
    ProjectUpdated { project: ProjectWithTasks },
    TaskCreated { task: TaskWithRelations },
    TaskUpdated { task: TaskWithRelations },
}

impl DomainEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::ProjectCreated { .. } => EventKind::ProjectCreated,
            Self::ProjectUpdated { .. } => EventKind::ProjectUpdated,
            Self::TaskCreated { .. } => EventKind::TaskCreated,
            Self::TaskUpdated { .. } => EventKind::TaskUpdated,
        }
    }

    pub fn to_relay_event(&self) -> serde_json::Result<RelayEvent> {
        match self {
            Self::ProjectCreated { project } | Self::ProjectUpdated { project } => {
                RelayEvent::from_record(self.kind(), project)
            }
            Self::TaskCreated { task } | Self::TaskUpdated { task } => {
                RelayEvent::from_record(self.kind(), task)
            }
        }
    }
}

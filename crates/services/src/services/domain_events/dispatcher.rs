//! Routes domain events to registered handlers.

use std::sync::Arc;

use tracing::{debug, warn};

use super::{DomainEvent, EventHandler, ExecutionMode, HandlerContext};

/// Dispatches domain events to registered handlers.
///
/// Inline handlers run sequentially and are awaited; spawned handlers run
/// via `tokio::spawn`. Handlers are sorted by name for deterministic order.
pub struct DomainEventDispatcher {
    inline_handlers: Vec<Arc<dyn EventHandler>>,
    spawned_handlers: Vec<Arc<dyn EventHandler>>,
    ctx: Arc<HandlerContext>,
}

impl DomainEventDispatcher {
    /// Dispatches an event to all handlers that accept it.
    ///
    /// Handler errors are logged, never propagated: the mutation that raised
    /// the event has already been committed.
    pub async fn dispatch(&self, event: DomainEvent) {
        for handler in &self.inline_handlers {
            if handler.handles(&event) {
                debug!(
                    handler = handler.name(),
                    event = %event.kind(),
                    "Dispatching event to inline handler"
                );
                if let Err(e) = handler.handle(event.clone(), &self.ctx).await {
                    warn!(
                        handler = handler.name(),
                        event = %event.kind(),
                        error = %e,
                        "Inline handler failed"
                    );
                }
            }
        }

        for handler in &self.spawned_handlers {
            if handler.handles(&event) {
                let handler = Arc::clone(handler);
                let event = event.clone();
                let ctx = Arc::clone(&self.ctx);

                debug!(
                    handler = handler.name(),
                    event = %event.kind(),
                    "Spawning handler"
                );
                tokio::spawn(async move {
                    if let Err(e) = handler.handle(event, &ctx).await {
                        warn!(
                            handler = handler.name(),
                            error = %e,
                            "Spawned handler failed"
                        );
                    }
                });
            }
        }
    }
}

/// Builder for constructing a [`DomainEventDispatcher`].
pub struct DispatcherBuilder {
    handlers: Vec<Arc<dyn EventHandler>>,
    ctx: HandlerContext,
}

impl DispatcherBuilder {
    pub fn new(ctx: HandlerContext) -> Self {
        Self {
            handlers: Vec::new(),
            ctx,
        }
    }

    pub fn with_handler<H: EventHandler + 'static>(mut self, handler: H) -> Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    pub fn build(mut self) -> DomainEventDispatcher {
        self.handlers.sort_by_key(|h| h.name());

        let (inline, spawned): (Vec<_>, Vec<_>) = self
            .handlers
            .into_iter()
            .partition(|h| h.execution_mode() == ExecutionMode::Inline);

        DomainEventDispatcher {
            inline_handlers: inline,
            spawned_handlers: spawned,
            ctx: Arc::new(self.ctx),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicBool, AtomicUsize, Ordering},
        time::Duration,
    };

    use async_trait::async_trait;
    use chrono::Utc;
    use db::models::project::{Project, ProjectStatus, ProjectWithTasks};
    use utils::config::RelayConfig;
    use uuid::Uuid;

    use super::*;
    use crate::services::{domain_events::HandlerError, realtime::Relay};

    fn test_event() -> DomainEvent {
        DomainEvent::ProjectUpdated {
            project: ProjectWithTasks {
                project: Project {
                    id: Uuid::new_v4(),
                    title: "Test project".to_string(),
                    description: None,
                    status: ProjectStatus::Active,
                    owner_id: Uuid::new_v4(),
                    created_at: Utc::now(),
                    updated_at: Utc::now(),
                },
                tasks: Vec::new(),
                task_count: 0,
            },
        }
    }

    fn test_context() -> HandlerContext {
        HandlerContext::new(Relay::new(RelayConfig::default()))
    }

    struct CountingHandler {
        name: &'static str,
        mode: ExecutionMode,
        accepts: bool,
        fails: bool,
        count: Arc<AtomicUsize>,
    }

    impl CountingHandler {
        fn inline(name: &'static str, count: &Arc<AtomicUsize>) -> Self {
            Self {
                name,
                mode: ExecutionMode::Inline,
                accepts: true,
                fails: false,
                count: Arc::clone(count),
            }
        }
    }

    #[async_trait]
    impl EventHandler for CountingHandler {
        fn name(&self) -> &'static str {
            self.name
        }

        fn execution_mode(&self) -> ExecutionMode {
            self.mode
        }

        fn handles(&self, _event: &DomainEvent) -> bool {
            self.accepts
        }

        async fn handle(
            &self,
            _event: DomainEvent,
            _ctx: &HandlerContext,
        ) -> Result<(), HandlerError> {
            self.count.fetch_add(1, Ordering::SeqCst);
            if self.fails {
                return Err(HandlerError::Failed("intentional failure".to_string()));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_dispatcher_calls_matching_handlers_only() {
        let count = Arc::new(AtomicUsize::new(0));
        let dispatcher = DispatcherBuilder::new(test_context())
            .with_handler(CountingHandler::inline("matching", &count))
            .with_handler(CountingHandler {
                accepts: false,
                ..CountingHandler::inline("non_matching", &count)
            })
            .build();

        dispatcher.dispatch(test_event()).await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failing_handler_does_not_stop_others() {
        let count = Arc::new(AtomicUsize::new(0));
        let dispatcher = DispatcherBuilder::new(test_context())
            .with_handler(CountingHandler {
                fails: true,
                ..CountingHandler::inline("a_failing", &count)
            })
            .with_handler(CountingHandler::inline("b_counting", &count))
            .build();

        dispatcher.dispatch(test_event()).await;

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_spawned_handlers_do_not_block() {
        let started = Arc::new(AtomicBool::new(false));
        let completed = Arc::new(AtomicBool::new(false));

        struct SlowHandler {
            started: Arc<AtomicBool>,
            completed: Arc<AtomicBool>,
        }

        #[async_trait]
        impl EventHandler for SlowHandler {
            fn name(&self) -> &'static str {
                "slow"
            }

            fn execution_mode(&self) -> ExecutionMode {
                ExecutionMode::Spawned
            }

            fn handles(&self, _event: &DomainEvent) -> bool {
                true
            }

            async fn handle(
                &self,
                _event: DomainEvent,
                _ctx: &HandlerContext,
            ) -> Result<(), HandlerError> {
                self.started.store(true, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                self.completed.store(true, Ordering::SeqCst);
                Ok(())
            }
        }

        let dispatcher = DispatcherBuilder::new(test_context())
            .with_handler(SlowHandler {
                started: Arc::clone(&started),
                completed: Arc::clone(&completed),
            })
            .build();

        dispatcher.dispatch(test_event()).await;
        assert!(!completed.load(Ordering::SeqCst));

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(started.load(Ordering::SeqCst));
        assert!(completed.load(Ordering::SeqCst));
    }
}

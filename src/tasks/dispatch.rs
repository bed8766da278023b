// Copyright (c) 2026 edgebridge contributors
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/edgebridge/edgebridge

//! Event dispatch stage - drain the tick's queue to named handlers

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::core::{DispatchEvent, Task, TaskContext, TaskResult};

/// A named delivery target for dispatch events (external API client, DB
/// writer, monitor). Deliveries must bound their latency.
#[async_trait]
pub trait DispatchHandler: Send + Sync {
    async fn deliver(&self, event: &DispatchEvent) -> Result<()>;
}

/// Default handler that logs the event.
pub struct LogHandler;

#[async_trait]
impl DispatchHandler for LogHandler {
    async fn deliver(&self, event: &DispatchEvent) -> Result<()> {
        info!(
            id = %event.id,
            origin = %event.origin,
            data = %event.data,
            "dispatch event"
        );
        Ok(())
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub dispatched: usize,
    pub failed: usize,
}

/// Routes drained events to handlers.
#[async_trait]
pub trait DispatchEngine: Send + Sync {
    async fn dispatch(&self, events: Vec<DispatchEvent>) -> DispatchOutcome;
}

/// Default engine: per-handler routing with timeout and one retry. A failing
/// handler never blocks deliveries to the other handlers of the same event.
pub struct HandlerDispatchEngine {
    handlers: HashMap<String, Arc<dyn DispatchHandler>>,
    timeout: Duration,
}

impl HandlerDispatchEngine {
    pub fn new(timeout: Duration) -> Self {
        Self {
            handlers: HashMap::new(),
            timeout,
        }
    }

    /// Engine preloaded with the built-in log/monitor handlers.
    pub fn with_builtin_handlers(timeout: Duration) -> Self {
        let mut engine = Self::new(timeout);
        engine.register_handler("log", Arc::new(LogHandler));
        engine.register_handler("monitor", Arc::new(LogHandler));
        engine
    }

    pub fn register_handler(&mut self, name: &str, handler: Arc<dyn DispatchHandler>) {
        self.handlers.insert(name.to_string(), handler);
    }

    async fn deliver_once(
        &self,
        handler: &Arc<dyn DispatchHandler>,
        event: &DispatchEvent,
    ) -> Result<()> {
        match tokio::time::timeout(self.timeout, handler.deliver(event)).await {
            Ok(result) => result,
            Err(_) => Err(anyhow!("delivery timed out after {:?}", self.timeout)),
        }
    }
}

#[async_trait]
impl DispatchEngine for HandlerDispatchEngine {
    async fn dispatch(&self, events: Vec<DispatchEvent>) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();
        for event in &events {
            for name in &event.handlers {
                let handler = match self.handlers.get(name) {
                    Some(handler) => handler,
                    None => {
                        warn!(handler = %name, id = %event.id, "no such dispatch handler");
                        outcome.failed += 1;
                        continue;
                    }
                };
                match self.deliver_once(handler, event).await {
                    Ok(()) => outcome.dispatched += 1,
                    Err(first) => {
                        debug!(handler = %name, "delivery failed, retrying once: {first}");
                        match self.deliver_once(handler, event).await {
                            Ok(()) => outcome.dispatched += 1,
                            Err(second) => {
                                error!(
                                    handler = %name,
                                    id = %event.id,
                                    "dispatch failed after retry, dropping: {second}"
                                );
                                outcome.failed += 1;
                            }
                        }
                    }
                }
            }
        }
        outcome
    }
}

/// Last stage of every pipeline: drains the event queue atomically and
/// forwards the buffered events to the dispatch engine.
pub struct EventDispatchTask {
    engine: Box<dyn DispatchEngine>,
}

impl EventDispatchTask {
    pub fn new(engine: Box<dyn DispatchEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Task for EventDispatchTask {
    fn name(&self) -> &str {
        "event_dispatch"
    }

    async fn run(&mut self, ctx: &mut TaskContext) -> Result<TaskResult> {
        let events = ctx.drain_events();
        if events.is_empty() {
            return Ok(TaskResult::ok().with_field("dispatched", json!(0)));
        }
        let outcome = self.engine.dispatch(events).await;
        info!(
            dispatched = outcome.dispatched,
            failed = outcome.failed,
            "event dispatch completed"
        );
        Ok(TaskResult::ok()
            .with_field("dispatched", json!(outcome.dispatched))
            .with_field("failed", json!(outcome.failed)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::testing::NullAdapter;
    use crate::config::Config;
    use crate::store::EdgeEventStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingHandler {
        delivered: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl DispatchHandler for RecordingHandler {
        async fn deliver(&self, event: &DispatchEvent) -> Result<()> {
            self.delivered.lock().unwrap().push(event.origin.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct FailingHandler {
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl DispatchHandler for FailingHandler {
        async fn deliver(&self, _event: &DispatchEvent) -> Result<()> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(anyhow!("endpoint unavailable"))
        }
    }

    fn context() -> TaskContext {
        TaskContext::new(
            Arc::new(Config::default()),
            Arc::new(EdgeEventStore::new(60.0, 2.0)),
            Arc::new(NullAdapter::default()),
        )
    }

    #[tokio::test]
    async fn drains_queue_to_empty() {
        let mut ctx = context();
        ctx.enqueue_event(DispatchEvent::new("rules", ["log"], json!({})));
        ctx.enqueue_event(DispatchEvent::new("rules", ["log"], json!({})));

        let engine = HandlerDispatchEngine::with_builtin_handlers(Duration::from_secs(5));
        let mut task = EventDispatchTask::new(Box::new(engine));
        let result = task.run(&mut ctx).await.unwrap();

        assert!(ctx.event_queue.is_empty());
        assert_eq!(result.payload["dispatched"], json!(2));
    }

    #[tokio::test]
    async fn failing_handler_does_not_block_others() {
        let mut ctx = context();
        ctx.enqueue_event(DispatchEvent::new(
            "rules",
            ["api", "db"],
            json!({"kind": "violation"}),
        ));

        let mut engine = HandlerDispatchEngine::new(Duration::from_secs(5));
        let api = Arc::new(FailingHandler::default());
        let db = Arc::new(RecordingHandler::default());
        engine.register_handler("api", Arc::clone(&api) as Arc<dyn DispatchHandler>);
        engine.register_handler("db", Arc::clone(&db) as Arc<dyn DispatchHandler>);

        let mut task = EventDispatchTask::new(Box::new(engine));
        let result = task.run(&mut ctx).await.unwrap();

        // api retried once then dropped; db still delivered; queue empty.
        assert_eq!(api.attempts.load(Ordering::SeqCst), 2);
        assert_eq!(db.delivered.lock().unwrap().len(), 1);
        assert_eq!(result.payload["dispatched"], json!(1));
        assert_eq!(result.payload["failed"], json!(1));
        assert!(ctx.event_queue.is_empty());
    }

    #[tokio::test]
    async fn unknown_handler_counts_as_failed() {
        let mut ctx = context();
        ctx.enqueue_event(DispatchEvent::new("rules", ["ghost"], json!({})));

        let engine = HandlerDispatchEngine::with_builtin_handlers(Duration::from_secs(5));
        let mut task = EventDispatchTask::new(Box::new(engine));
        let result = task.run(&mut ctx).await.unwrap();

        assert_eq!(result.payload["failed"], json!(1));
        assert!(ctx.event_queue.is_empty());
    }

    #[tokio::test]
    async fn slow_handler_hits_timeout() {
        struct SlowHandler;

        #[async_trait]
        impl DispatchHandler for SlowHandler {
            async fn deliver(&self, _event: &DispatchEvent) -> Result<()> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            }
        }

        tokio::time::pause();
        let mut engine = HandlerDispatchEngine::new(Duration::from_millis(50));
        engine.register_handler("slow", Arc::new(SlowHandler));

        let events = vec![DispatchEvent::new("rules", ["slow"], json!({}))];
        let outcome = engine.dispatch(events).await;
        assert_eq!(outcome.failed, 1);
    }
}

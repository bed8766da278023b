// Copyright (c) 2026 edgebridge contributors
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/edgebridge/edgebridge

//! Ingestion stage - expose the store snapshot to the pipeline

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::info;

use crate::core::{Task, TaskContext, TaskResult};
use crate::store::{EdgeEvent, EdgeEventStore};

#[derive(Debug, Default)]
pub struct IngestionOutcome {
    pub events: Vec<EdgeEvent>,
    pub raw_count: usize,
    pub dropped: usize,
}

/// Collects the per-camera latest events for one tick.
pub trait IngestionEngine: Send + Sync {
    fn collect(&self, store: &EdgeEventStore, now: DateTime<Utc>) -> IngestionOutcome;
}

/// Default engine: prune entries that aged out while parked, then snapshot.
pub struct DefaultIngestionEngine;

impl IngestionEngine for DefaultIngestionEngine {
    fn collect(&self, store: &EdgeEventStore, now: DateTime<Utc>) -> IngestionOutcome {
        let dropped = store.prune(now);
        let mut events = store.snapshot();
        events.sort_by(|a, b| a.camera_id.cmp(&b.camera_id));
        let raw_count = events.len() + dropped;
        IngestionOutcome {
            events,
            raw_count,
            dropped,
        }
    }
}

pub struct IngestionTask {
    engine: Box<dyn IngestionEngine>,
}

impl IngestionTask {
    pub fn new(engine: Box<dyn IngestionEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Task for IngestionTask {
    fn name(&self) -> &str {
        "ingestion"
    }

    async fn run(&mut self, ctx: &mut TaskContext) -> Result<TaskResult> {
        let outcome = self.engine.collect(&ctx.store, Utc::now());
        info!(
            cameras = outcome.events.len(),
            raw = outcome.raw_count,
            dropped = outcome.dropped,
            "ingested latest events"
        );
        let result = TaskResult::ok()
            .with_field("events", json!(outcome.events.len()))
            .with_field("raw", json!(outcome.raw_count))
            .with_field("dropped", json!(outcome.dropped));
        ctx.scratch.events = outcome.events;
        ctx.scratch.raw_count = outcome.raw_count;
        ctx.scratch.dropped = outcome.dropped;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::testing::NullAdapter;
    use crate::config::Config;
    use crate::store::EdgeEventPayload;
    use std::sync::Arc;

    #[tokio::test]
    async fn snapshot_lands_in_scratch() {
        let store = Arc::new(EdgeEventStore::new(60.0, 2.0));
        let now = Utc::now();
        for camera in ["cam02", "cam01"] {
            store.add_event(EdgeEventPayload {
                camera_id: camera.to_string(),
                timestamp: now.timestamp() as f64,
                detections: vec![],
                models: vec![],
            });
        }

        let mut ctx = TaskContext::new(
            Arc::new(Config::default()),
            Arc::clone(&store),
            Arc::new(NullAdapter::default()),
        );
        let mut task = IngestionTask::new(Box::new(DefaultIngestionEngine));
        let result = task.run(&mut ctx).await.unwrap();

        assert!(result.ok);
        assert_eq!(ctx.scratch.events.len(), 2);
        assert_eq!(ctx.scratch.raw_count, 2);
        // Deterministic ordering for downstream stages.
        assert_eq!(ctx.scratch.events[0].camera_id, "cam01");
    }
}
